//! Benchmarks for the particle engine.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use vortex_particles::{
    compute::{Engine, ManualScheduler},
    render::Canvas,
    schema::{EngineConfig, FormationConfig, Rgb},
};

fn bench_engine_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_step");

    for count in [100, 500, 2000] {
        let config = EngineConfig {
            particle_count: count,
            seed: Some(42),
            ..EngineConfig::default()
        };
        let mut engine = Engine::new(config, ManualScheduler::new()).unwrap();
        engine.mount(800, 450, 1.0).unwrap();

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}_particles", count)),
            &count,
            |b, _| {
                b.iter(|| {
                    black_box(engine.step());
                });
            },
        );
    }

    group.finish();
}

fn bench_formation_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("formation_step");

    for (width, height) in [(600, 315), (1200, 630)] {
        let defaults = FormationConfig::default();
        let config = EngineConfig {
            seed: Some(42),
            ..EngineConfig::formation(&defaults.text, defaults.font_size)
        };
        let mut engine = Engine::new(config, ManualScheduler::new()).unwrap();
        engine.mount(width, height, 1.0).unwrap();

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}", width, height)),
            &width,
            |b, _| {
                b.iter(|| {
                    black_box(engine.step());
                });
            },
        );
    }

    group.finish();
}

fn bench_glow_blur(c: &mut Criterion) {
    let mut group = c.benchmark_group("gaussian_blur");

    for scale in [1.0f32, 2.0] {
        let mut canvas = Canvas::new(800, 450, scale);
        canvas.clear(Rgb::from_u8(11, 11, 12));
        canvas.stroke_segment((100.0, 100.0), (700.0, 350.0), 3.0, Rgb::WHITE, 0.7);

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("dpr_{}", scale)),
            &scale,
            |b, _| {
                b.iter(|| {
                    canvas.gaussian_blur(black_box(6.0));
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_engine_step,
    bench_formation_step,
    bench_glow_blur
);
criterion_main!(benches);
