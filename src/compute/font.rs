//! Built-in 5×7 bitmap font.
//!
//! Each glyph is seven rows of five bits, most significant bit leftmost.
//! Covers Latin capitals, digits, common punctuation and the Cyrillic
//! capitals; lowercase letters fold to uppercase.

/// Glyph width in cells.
pub const GLYPH_WIDTH: usize = 5;
/// Glyph height in cells.
pub const GLYPH_HEIGHT: usize = 7;
/// Horizontal advance in cells (glyph plus one blank column).
pub const GLYPH_ADVANCE: usize = GLYPH_WIDTH + 1;

pub type Glyph = [u8; GLYPH_HEIGHT];

const BLANK: Glyph = [0; GLYPH_HEIGHT];

const A: Glyph = [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001];
const B: Glyph = [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110];
const C: Glyph = [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110];
const D: Glyph = [0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110];
const E: Glyph = [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111];
const F: Glyph = [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000];
const G: Glyph = [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111];
const H: Glyph = [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001];
const I: Glyph = [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110];
const J: Glyph = [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100];
const K: Glyph = [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001];
const L: Glyph = [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111];
const M: Glyph = [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001];
const N: Glyph = [0b10001, 0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001];
const O: Glyph = [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110];
const P: Glyph = [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000];
const Q: Glyph = [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101];
const R: Glyph = [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001];
const S: Glyph = [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110];
const T: Glyph = [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100];
const U: Glyph = [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110];
const V: Glyph = [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100];
const W: Glyph = [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010];
const X: Glyph = [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001];
const Y: Glyph = [0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100];
const Z: Glyph = [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111];

static DIGITS: [Glyph; 10] = [
    [0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110],
    [0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
    [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111],
    [0b11111, 0b00010, 0b00100, 0b00010, 0b00001, 0b10001, 0b01110],
    [0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010],
    [0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110],
    [0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110],
    [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000],
    [0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110],
    [0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100],
];

// Cyrillic letters without a Latin look-alike.
const CYR_BE: Glyph = [0b11111, 0b10000, 0b10000, 0b11110, 0b10001, 0b10001, 0b11110];
const CYR_GHE: Glyph = [0b11111, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000];
const CYR_DE: Glyph = [0b00110, 0b01010, 0b01010, 0b01010, 0b01010, 0b11111, 0b10001];
const CYR_IO: Glyph = [0b01010, 0b00000, 0b11111, 0b10000, 0b11110, 0b10000, 0b11111];
const CYR_ZHE: Glyph = [0b10101, 0b10101, 0b10101, 0b01110, 0b10101, 0b10101, 0b10101];
const CYR_ZE: Glyph = [0b01110, 0b10001, 0b00001, 0b00110, 0b00001, 0b10001, 0b01110];
const CYR_I: Glyph = [0b10001, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b10001];
const CYR_SHORT_I: Glyph = [0b01010, 0b00100, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001];
const CYR_EL: Glyph = [0b00111, 0b01001, 0b01001, 0b01001, 0b01001, 0b01001, 0b10001];
const CYR_PE: Glyph = [0b11111, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001];
const CYR_U: Glyph = [0b10001, 0b10001, 0b10001, 0b01111, 0b00001, 0b00001, 0b01110];
const CYR_EF: Glyph = [0b00100, 0b01110, 0b10101, 0b10101, 0b10101, 0b01110, 0b00100];
const CYR_TSE: Glyph = [0b10010, 0b10010, 0b10010, 0b10010, 0b10010, 0b11111, 0b00001];
const CYR_CHE: Glyph = [0b10001, 0b10001, 0b10001, 0b01111, 0b00001, 0b00001, 0b00001];
const CYR_SHA: Glyph = [0b10101, 0b10101, 0b10101, 0b10101, 0b10101, 0b10101, 0b11111];
const CYR_SHCHA: Glyph = [0b10101, 0b10101, 0b10101, 0b10101, 0b10101, 0b11111, 0b00001];
const CYR_HARD: Glyph = [0b11000, 0b01000, 0b01000, 0b01110, 0b01001, 0b01001, 0b01110];
const CYR_YERU: Glyph = [0b10001, 0b10001, 0b10001, 0b11101, 0b10011, 0b10011, 0b11101];
const CYR_SOFT: Glyph = [0b10000, 0b10000, 0b10000, 0b11110, 0b10001, 0b10001, 0b11110];
const CYR_E: Glyph = [0b01110, 0b10001, 0b00001, 0b00111, 0b00001, 0b10001, 0b01110];
const CYR_YU: Glyph = [0b10010, 0b10101, 0b10101, 0b11101, 0b10101, 0b10101, 0b10010];
const CYR_YA: Glyph = [0b01111, 0b10001, 0b10001, 0b01111, 0b00101, 0b01001, 0b10001];

const PERIOD: Glyph = [0, 0, 0, 0, 0, 0b01100, 0b01100];
const COMMA: Glyph = [0, 0, 0, 0, 0b01100, 0b00100, 0b01000];
const EXCLAIM: Glyph = [0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0, 0b00100];
const QUESTION: Glyph = [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0, 0b00100];
const HYPHEN: Glyph = [0, 0, 0, 0b11111, 0, 0, 0];
const COLON: Glyph = [0, 0b01100, 0b01100, 0, 0b01100, 0b01100, 0];
const APOSTROPHE: Glyph = [0b00100, 0b00100, 0b01000, 0, 0, 0, 0];
const QUOTE: Glyph = [0b01010, 0b01010, 0, 0, 0, 0, 0];
const AMPERSAND: Glyph = [0b01100, 0b10010, 0b10100, 0b01000, 0b10101, 0b10010, 0b01101];
const SLASH: Glyph = [0, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0];
const PLUS: Glyph = [0, 0b00100, 0b00100, 0b11111, 0b00100, 0b00100, 0];
const LPAREN: Glyph = [0b00010, 0b00100, 0b01000, 0b01000, 0b01000, 0b00100, 0b00010];
const RPAREN: Glyph = [0b01000, 0b00100, 0b00010, 0b00010, 0b00010, 0b00100, 0b01000];
const HASH: Glyph = [0b01010, 0b01010, 0b11111, 0b01010, 0b11111, 0b01010, 0b01010];

/// Bitmap for `c`, or `None` for characters the font does not cover.
pub fn glyph(c: char) -> Option<&'static Glyph> {
    let upper = c.to_uppercase().next().unwrap_or(c);
    let g = match upper {
        ' ' => &BLANK,
        'A' | 'А' => &A,
        'B' | 'В' => &B,
        'C' | 'С' => &C,
        'D' => &D,
        'E' | 'Е' => &E,
        'F' => &F,
        'G' => &G,
        'H' | 'Н' => &H,
        'I' => &I,
        'J' => &J,
        'K' | 'К' => &K,
        'L' => &L,
        'M' | 'М' => &M,
        'N' => &N,
        'O' | 'О' => &O,
        'P' | 'Р' => &P,
        'Q' => &Q,
        'R' => &R,
        'S' => &S,
        'T' | 'Т' => &T,
        'U' => &U,
        'V' => &V,
        'W' => &W,
        'X' | 'Х' => &X,
        'Y' => &Y,
        'Z' => &Z,
        '0'..='9' => &DIGITS[upper as usize - '0' as usize],
        'Б' => &CYR_BE,
        'Г' => &CYR_GHE,
        'Д' => &CYR_DE,
        'Ё' => &CYR_IO,
        'Ж' => &CYR_ZHE,
        'З' => &CYR_ZE,
        'И' => &CYR_I,
        'Й' => &CYR_SHORT_I,
        'Л' => &CYR_EL,
        'П' => &CYR_PE,
        'У' => &CYR_U,
        'Ф' => &CYR_EF,
        'Ц' => &CYR_TSE,
        'Ч' => &CYR_CHE,
        'Ш' => &CYR_SHA,
        'Щ' => &CYR_SHCHA,
        'Ъ' => &CYR_HARD,
        'Ы' => &CYR_YERU,
        'Ь' => &CYR_SOFT,
        'Э' => &CYR_E,
        'Ю' => &CYR_YU,
        'Я' => &CYR_YA,
        '.' => &PERIOD,
        ',' => &COMMA,
        '!' => &EXCLAIM,
        '?' => &QUESTION,
        '-' => &HYPHEN,
        ':' => &COLON,
        '\'' => &APOSTROPHE,
        '"' => &QUOTE,
        '&' => &AMPERSAND,
        '/' => &SLASH,
        '+' => &PLUS,
        '(' => &LPAREN,
        ')' => &RPAREN,
        '#' => &HASH,
        _ => return None,
    };
    Some(g)
}

/// Whether cell `(col, row)` of a glyph is lit.
#[inline]
pub fn is_lit(glyph: &Glyph, col: usize, row: usize) -> bool {
    glyph[row] & (1 << (GLYPH_WIDTH - 1 - col)) != 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lit_count(g: &Glyph) -> usize {
        g.iter().map(|row| row.count_ones() as usize).sum()
    }

    #[test]
    fn test_lowercase_folds() {
        assert_eq!(glyph('a'), glyph('A'));
        assert_eq!(glyph('ю'), glyph('Ю'));
    }

    #[test]
    fn test_cyrillic_coverage() {
        for c in "АБВГДЕЁЖЗИЙКЛМНОПРСТУФХЦЧШЩЪЫЬЭЮЯ".chars() {
            let g = glyph(c).unwrap_or_else(|| panic!("missing {}", c));
            assert!(lit_count(g) > 0, "blank glyph for {}", c);
        }
    }

    #[test]
    fn test_rows_fit_width() {
        for c in ('A'..='Z').chain('0'..='9').chain("ЮРАЛЬЯНС.,!?".chars()) {
            let g = glyph(c).unwrap();
            assert!(g.iter().all(|&row| row < 1 << GLYPH_WIDTH), "{}", c);
        }
    }

    #[test]
    fn test_unknown_and_space() {
        assert!(glyph('€').is_none());
        assert_eq!(lit_count(glyph(' ').unwrap()), 0);
    }

    #[test]
    fn test_is_lit() {
        let t = glyph('T').unwrap();
        assert!((0..GLYPH_WIDTH).all(|c| is_lit(t, c, 0)));
        assert!(is_lit(t, 2, 6));
        assert!(!is_lit(t, 0, 6));
    }
}
