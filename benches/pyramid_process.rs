use ceo_pyramid::*;
use criterion::*;

// 4 uniform pupil images of `n_lenslet` pixels across in a frame of `2*n_lenslet+16` pixels
fn pupils(n_lenslet: usize) -> Frame {
    let n_px = 2 * n_lenslet + 16;
    let (c0, c1) = ((n_px / 4) as f64, (3 * n_px / 4) as f64);
    let radius = n_lenslet as f64 * 0.5;
    Frame::from_fn((n_px, n_px), |x, y| {
        let inside = [(c0, c0), (c0, c1), (c1, c0), (c1, c1)]
            .iter()
            .any(|(cx, cy)| (x as f64 - cx).powi(2) + (y as f64 - cy).powi(2) <= radius * radius);
        if inside {
            1f32
        } else {
            0f32
        }
    })
}

pub fn process_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("pyramid_process");
    for n_lenslet in [30usize, 60, 92] {
        let mut gs = pupils(n_lenslet);
        let mut pym = PyramidWfsBuilder::new()
            .n_lenslet(n_lenslet)
            .build(IdealDetector::new(gs.resolution))
            .unwrap();
        pym.calibrate(&mut gs).unwrap();
        group.bench_with_input(
            BenchmarkId::new("Calibration", n_lenslet),
            &n_lenslet,
            |b, _| b.iter(|| pym.calibrate(&mut gs).map(|_| ()).unwrap()),
        );
        group.bench_with_input(
            BenchmarkId::new("Slopes", n_lenslet),
            &n_lenslet,
            |b, _| b.iter(|| pym.process().unwrap()),
        );
    }
    group.finish();
}

criterion_group!(benches, process_benchmark);
criterion_main!(benches);
