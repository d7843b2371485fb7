use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use earthtones::cluster::{ClusterOptions, cluster};
use earthtones::color::{Perceptual, to_perceptual};
use earthtones::Method;
use palette::Srgb;

fn terrain_samples(n: usize) -> Vec<Perceptual> {
    let pixels: Vec<Srgb<f64>> = (0..n)
        .map(|i| {
            let t = i as f64 / n as f64;
            Srgb::new(0.3 + 0.4 * (t * 13.0).fract(), 0.25 + 0.5 * (t * 5.0).fract(), 0.2 + 0.3 * t)
        })
        .collect();
    to_perceptual(&pixels)
}

fn benchmark_methods(c: &mut Criterion) {
    let options = ClusterOptions::default().with_seed(1);
    let mut group = c.benchmark_group("cluster");
    for n in [200, 800] {
        let samples = terrain_samples(n);
        for method in Method::ALL {
            group.bench_with_input(BenchmarkId::new(method.name(), n), &samples, |b, samples| {
                b.iter(|| cluster(black_box(samples), 5, method, &options))
            });
        }
    }
    group.finish();
}

criterion_group!(benches, benchmark_methods);
criterion_main!(benches);
