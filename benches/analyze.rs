use criterion::{black_box, criterion_group, criterion_main, Criterion};
use cropsight::{AnalysisSession, CropType, Frame, MetricExtractor, ThresholdResolver, WeatherCondition};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn field_frame(width: u32, height: u32) -> Frame {
    let mut rng = StdRng::seed_from_u64(11);
    let mut frame = Frame::new(width, height);
    for px in frame.data.chunks_exact_mut(3) {
        px[0] = rng.gen_range(20..80);
        px[1] = rng.gen_range(80..220);
        px[2] = rng.gen_range(10..60);
    }
    frame
}

fn bench_extract(c: &mut Criterion) {
    let frame = field_frame(640, 480);
    let thresholds = ThresholdResolver::resolve(CropType::Wheat, WeatherCondition::Clear);
    let extractor = MetricExtractor::default();

    c.bench_function("extract_640x480", |b| {
        b.iter(|| extractor.extract(black_box(&frame), &thresholds))
    });
}

fn bench_session(c: &mut Criterion) {
    let frame = field_frame(640, 480);
    let mut session = AnalysisSession::new(CropType::Corn, WeatherCondition::Sunny);

    c.bench_function("analyze_640x480", |b| b.iter(|| session.analyze(black_box(&frame))));
}

criterion_group!(benches, bench_extract, bench_session);
criterion_main!(benches);
