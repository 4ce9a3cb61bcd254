use std::f64::consts::PI;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use image::{GrayImage, Luma, Rgba, RgbaImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use kinetrack::{
    adaptive_edge_map, detect_color, fit_ellipse, hough_circle, to_grayscale, CandidateKind,
    HoughConfig, HsvBand, KalmanConfig, KalmanTracker2D, PreprocessConfig,
};

fn make_disk_gray(w: u32, h: u32, center: [f32; 2], r: f32) -> GrayImage {
    let mut img = GrayImage::from_pixel(w, h, Luma([25]));
    for y in 0..h {
        for x in 0..w {
            let dx = x as f32 - center[0];
            let dy = y as f32 - center[1];
            if dx * dx + dy * dy <= r * r {
                img.put_pixel(x, y, Luma([230]));
            }
        }
    }
    img
}

fn make_ball_frame(w: u32, h: u32, seed: u64) -> RgbaImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut frame = RgbaImage::new(w, h);
    for p in frame.pixels_mut() {
        let v = rng.gen_range(10..60u8);
        *p = Rgba([v, v, v, 255]);
    }
    let (cx, cy, r) = (w as f32 * 0.4, h as f32 * 0.6, 30.0f32);
    for y in 0..h {
        for x in 0..w {
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;
            if dx * dx + dy * dy <= r * r {
                frame.put_pixel(x, y, Rgba([250, 140, 10, 255]));
            }
        }
    }
    frame
}

fn make_ellipse_points(n: usize, seed: u64) -> Vec<[f64; 2]> {
    let mut rng = StdRng::seed_from_u64(seed);
    let (cx, cy, a, b, tilt) = (320.0, 240.0, 80.0, 45.0, 0.4f64);
    let (s, c) = tilt.sin_cos();
    (0..n)
        .map(|i| {
            let t = 2.0 * PI * i as f64 / n as f64;
            let u = a * t.cos();
            let v = b * t.sin();
            [
                cx + c * u - s * v + rng.gen_range(-0.3..0.3),
                cy + s * u + c * v + rng.gen_range(-0.3..0.3),
            ]
        })
        .collect()
}

fn bench_hough(c: &mut Criterion) {
    let gray = make_disk_gray(480, 360, [200.0, 170.0], 40.0);
    let edges = adaptive_edge_map(&gray, &PreprocessConfig::default());
    let cfg = HoughConfig::default();

    c.bench_function("hough_circle_480x360", |b| {
        b.iter(|| {
            let found = hough_circle(black_box(&edges), black_box(&cfg));
            black_box(found.map(|c| c.votes))
        })
    });
}

fn bench_edge_map(c: &mut Criterion) {
    let gray = make_disk_gray(640, 480, [320.0, 240.0], 60.0);
    let cfg = PreprocessConfig::default();

    c.bench_function("adaptive_edge_map_640x480", |b| {
        b.iter(|| black_box(adaptive_edge_map(black_box(&gray), black_box(&cfg)).count()))
    });
}

fn bench_ellipse_fit(c: &mut Criterion) {
    let pts = make_ellipse_points(200, 5);

    c.bench_function("fit_ellipse_200pts", |b| {
        b.iter(|| black_box(fit_ellipse(black_box(&pts))))
    });
}

fn bench_color_scan(c: &mut Criterion) {
    let frame = make_ball_frame(640, 480, 17);
    let band = HsvBand::ball();

    c.bench_function("detect_color_640x480_stride2", |b| {
        b.iter(|| {
            let blob = detect_color(black_box(&frame), &band, 2, 40, CandidateKind::Ball);
            black_box(blob.map(|b| b.count()))
        })
    });

    c.bench_function("to_grayscale_640x480", |b| {
        b.iter(|| black_box(to_grayscale(black_box(&frame))))
    });
}

fn bench_kalman(c: &mut Criterion) {
    c.bench_function("kalman_step_1000", |b| {
        b.iter(|| {
            let mut kf = KalmanTracker2D::new(KalmanConfig::default());
            let mut last = None;
            for i in 0..1000 {
                let t = i as f64 / 60.0;
                last = Some(kf.step(t, [0.5 * t, 1.0 - 0.25 * t]));
            }
            black_box(last)
        })
    });
}

criterion_group!(
    benches,
    bench_hough,
    bench_edge_map,
    bench_ellipse_fit,
    bench_color_scan,
    bench_kalman
);
criterion_main!(benches);
