//! Vortex Particles CLI - offline export of the particle animations.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

use vortex_particles::{
    animation::{ExportOptions, ExportStats, export_ambient, export_formation, write_snapshot_png},
    schema::{EngineConfig, ForceMode, FormationConfig},
};

#[derive(Parser)]
#[command(name = "vortex-particles")]
#[command(about = "Render flow-field and text-formation particle animations", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export the looping text-formation GIF used as a social preview
    OgGif {
        /// Text the particles assemble into
        #[arg(long)]
        text: Option<String>,

        /// Glyph height in logical pixels
        #[arg(long)]
        font_size: Option<f32>,

        #[command(flatten)]
        surface: SurfaceArgs,

        #[arg(short, long, default_value = "og.gif")]
        output: PathBuf,
    },
    /// Export a GIF of the ambient flow-field background
    Ambient {
        /// Use the drifting-dot background instead of the flow field
        #[arg(long)]
        drift: bool,

        #[command(flatten)]
        surface: SurfaceArgs,

        #[arg(short, long, default_value = "ambient.gif")]
        output: PathBuf,
    },
    /// Write a PNG still of the ambient background
    Snapshot {
        /// Use the drifting-dot background instead of the flow field
        #[arg(long)]
        drift: bool,

        #[command(flatten)]
        surface: SurfaceArgs,

        /// Steps to advance past the static frame before capturing
        #[arg(long, default_value = "0")]
        warmup: usize,

        #[arg(short, long, default_value = "snapshot.png")]
        output: PathBuf,
    },
    /// Print the default configuration as JSON
    PrintConfig {
        /// Print the formation variant instead of the ambient one
        #[arg(long, conflicts_with = "drift")]
        formation: bool,

        /// Print the drifting-dot variant
        #[arg(long)]
        drift: bool,
    },
}

#[derive(Args)]
struct SurfaceArgs {
    /// JSON configuration file (fields not given use defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    /// RNG seed for reproducible output
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, default_value = "1200")]
    width: u32,

    #[arg(long, default_value = "630")]
    height: u32,

    #[arg(long, default_value = "50")]
    frames: usize,

    #[arg(long, default_value = "20")]
    fps: f32,

    /// Device pixel ratio of the output
    #[arg(long, default_value = "1")]
    scale: f32,
}

impl SurfaceArgs {
    fn options(&self) -> ExportOptions {
        ExportOptions {
            width: self.width,
            height: self.height,
            frames: self.frames,
            fps: self.fps,
            device_pixel_ratio: self.scale,
        }
    }

    /// Load `--config` (or `fallback`) and apply `--seed`.
    fn engine_config(&self, fallback: EngineConfig) -> EngineConfig {
        let mut config = match &self.config {
            Some(path) => load_config(path),
            None => fallback,
        };
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        config
    }
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::OgGif {
            text,
            font_size,
            surface,
            output,
        } => {
            let defaults = FormationConfig::default();
            let fallback = EngineConfig::formation(
                text.as_deref().unwrap_or(&defaults.text),
                font_size.unwrap_or(defaults.font_size),
            );
            let mut config = surface.engine_config(fallback);
            if let ForceMode::Formation(formation) = &mut config.mode {
                if let Some(text) = text {
                    formation.text = text;
                }
                if let Some(font_size) = font_size {
                    formation.font_size = font_size;
                }
            }

            println!("Vortex Particles - formation export");
            println!("===================================");
            print_run(&surface, &output);
            finish(export_formation(&config, &surface.options(), &output), &output);
        }
        Commands::Ambient {
            drift,
            surface,
            output,
        } => {
            let config = surface.engine_config(background(drift));

            println!("Vortex Particles - {} export", config.mode.name());
            println!("=================================");
            print_run(&surface, &output);
            finish(export_ambient(&config, &surface.options(), &output), &output);
        }
        Commands::Snapshot {
            drift,
            surface,
            warmup,
            output,
        } => {
            let config = surface.engine_config(background(drift));
            finish(
                write_snapshot_png(&config, &surface.options(), warmup, &output),
                &output,
            );
        }
        Commands::PrintConfig { formation, drift } => {
            let config = if formation {
                EngineConfig::formation(
                    &FormationConfig::default().text,
                    FormationConfig::default().font_size,
                )
            } else {
                background(drift)
            };
            match serde_json::to_string_pretty(&config) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    eprintln!("Error serializing config: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }
}

fn background(drift: bool) -> EngineConfig {
    if drift {
        EngineConfig::drift()
    } else {
        EngineConfig::default()
    }
}

fn load_config(path: &Path) -> EngineConfig {
    let config_str = fs::read_to_string(path).unwrap_or_else(|e| {
        eprintln!("Error reading config file: {}", e);
        std::process::exit(1);
    });
    serde_json::from_str(&config_str).unwrap_or_else(|e| {
        eprintln!("Error parsing config: {}", e);
        std::process::exit(1);
    })
}

fn print_run(surface: &SurfaceArgs, output: &Path) {
    println!(
        "Surface: {}x{} @{}x",
        surface.width, surface.height, surface.scale
    );
    println!("Frames: {} at {} fps", surface.frames, surface.fps);
    println!("Output: {}", output.display());
    println!();
}

fn finish(result: Result<ExportStats, vortex_particles::animation::ExportError>, output: &Path) {
    match result {
        Ok(stats) => {
            println!("Wrote {}", output.display());
            println!("  {}", stats);
        }
        Err(e) => {
            eprintln!("Export failed: {}", e);
            std::process::exit(1);
        }
    }
}
