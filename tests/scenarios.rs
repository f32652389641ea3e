use anyhow::Result;
use cropsight::feedback::OPTIMAL_MESSAGE;
use cropsight::height::HeightStatus;
use cropsight::score;
use cropsight::status::classify_all;
use cropsight::{
    classify, AnalysisSession, CropType, FeedbackEngine, Frame, FrameMetrics, HeightAdvisor,
    Metric, QualityError, ThresholdResolver, WeatherCondition,
};
use image::{imageops, Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn healthy_wheat_metrics() -> FrameMetrics {
    FrameMetrics {
        brightness: 125.0,
        contrast: 45.0,
        sharpness: 150.0,
        green_coverage: 0.65,
        texture_variance: 90.0,
        focus: 0.7,
        noise: 3.0,
        crop_health: 0.9,
        ..FrameMetrics::default()
    }
}

fn textured_field(seed: u64, size: u32) -> RgbImage {
    let mut rng = StdRng::seed_from_u64(seed);
    RgbImage::from_fn(size, size, |_, _| {
        let g: u8 = rng.gen_range(90..230);
        let r: u8 = rng.gen_range(20..70);
        Rgb([r, g, r / 2])
    })
}

#[test]
fn optimal_wheat_frame_maintains_position() -> Result<()> {
    let t = ThresholdResolver::resolve(CropType::Wheat, WeatherCondition::Clear);
    let statuses = classify_all(&healthy_wheat_metrics(), &t);
    let height = HeightAdvisor::new(CropType::Wheat).feedback();
    let result = FeedbackEngine::evaluate(&statuses, &height, None);

    assert_eq!(result.priority, 0);
    assert!(score::score(&statuses) >= 80.0);
    assert_eq!(result.messages, vec![OPTIMAL_MESSAGE.to_string()]);
    Ok(())
}

#[test]
fn blurry_wheat_frame_descends() -> Result<()> {
    let t = ThresholdResolver::resolve(CropType::Wheat, WeatherCondition::Clear);
    let mut statuses = classify_all(&healthy_wheat_metrics(), &t);
    let blurry = classify(Metric::Sharpness, 40.0, &t);
    assert_eq!(blurry.label(), "Blurry");
    statuses.insert(Metric::Sharpness, blurry);

    let height = HeightAdvisor::new(CropType::Wheat).feedback();
    let result = FeedbackEngine::evaluate(&statuses, &height, None);
    assert!(result.priority >= 2);
    assert!(result.altitude_change_m < 0.0);
    assert!(result
        .adjustments
        .iter()
        .any(|a| a.delta_m.map(|d| d < 0.0).unwrap_or(false)));
    Ok(())
}

#[test]
fn corn_above_band_descends_by_four_tenths() -> Result<()> {
    let mut advisor = HeightAdvisor::new(CropType::Corn);
    advisor.update_height(5.2)?;
    let fb = advisor.feedback();
    assert_eq!(fb.status, HeightStatus::TooHigh);
    assert!((fb.delta_m - -0.4).abs() < 1e-9);
    Ok(())
}

#[test]
fn unknown_crop_uses_general_thresholds() {
    let session = AnalysisSession::from_names("barleyXYZ", "clear");
    assert_eq!(session.crop(), CropType::General);
    assert_eq!(
        *session.thresholds(),
        ThresholdResolver::resolve(CropType::General, WeatherCondition::Clear)
    );
}

#[test]
fn negative_height_is_rejected_and_previous_kept() {
    let mut session = AnalysisSession::new(CropType::Wheat, WeatherCondition::Clear);
    session.update_height(3.2).unwrap();
    let err = session.update_height(-3.0).unwrap_err();
    assert!(matches!(err, QualityError::InvalidHeight { .. }));
    assert_eq!(session.height().current_height_m(), Some(3.2));
}

#[test]
fn priority_zero_only_when_everything_is_in_its_best_class() {
    let mut rng = StdRng::seed_from_u64(42);
    for crop in CropType::ALL {
        for weather in WeatherCondition::ALL {
            let t = ThresholdResolver::resolve(crop, weather);
            for _ in 0..50 {
                let metrics = FrameMetrics {
                    brightness: rng.gen_range(0.0..255.0),
                    contrast: rng.gen_range(0.0..100.0),
                    sharpness: rng.gen_range(0.0..300.0),
                    green_coverage: rng.gen_range(0.0..1.0),
                    texture_variance: rng.gen_range(0.0..200.0),
                    focus: rng.gen_range(0.0..1.0),
                    noise: rng.gen_range(0.0..25.0),
                    crop_health: rng.gen_range(0.0..1.0),
                    ..FrameMetrics::default()
                };
                let statuses = classify_all(&metrics, &t);
                let mut advisor = HeightAdvisor::new(crop);
                advisor.update_height(rng.gen_range(0.5..8.0)).unwrap();
                let height = advisor.feedback();
                let result = FeedbackEngine::evaluate(&statuses, &height, None);

                let worst = statuses
                    .values()
                    .map(|s| s.severity())
                    .chain(std::iter::once(height.severity))
                    .max()
                    .unwrap();
                assert_eq!(result.priority, worst.priority());

                let all_best = statuses.values().all(|s| s.is_best_class())
                    && height.status == HeightStatus::Optimal;
                assert_eq!(result.priority == 0, all_best);
            }
        }
    }
}

#[test]
fn blurring_a_frame_lowers_its_score() -> Result<()> {
    let sharp = textured_field(3, 96);
    let blurred = imageops::blur(&sharp, 4.0);

    let mut session = AnalysisSession::new(CropType::Wheat, WeatherCondition::Clear);
    let sharp_report = session.analyze(&Frame::from_raw(96, 96, 3, sharp.into_raw())?)?;
    let blurred_report = session.analyze(&Frame::from_raw(96, 96, 3, blurred.into_raw())?)?;

    assert!(sharp_report.metrics.sharpness > blurred_report.metrics.sharpness);
    assert!(sharp_report.metrics.focus > blurred_report.metrics.focus);
    assert!(sharp_report.metrics.green_coverage > 0.9);
    assert!(sharp_report.score > blurred_report.score);
    assert!(blurred_report.feedback.priority >= 2);
    assert_eq!(session.frame_count(), 2);
    Ok(())
}

#[test]
fn empty_frame_is_rejected() {
    let mut session = AnalysisSession::new(CropType::Rice, WeatherCondition::Rainy);
    let frame = Frame {
        data: Vec::new(),
        width: 0,
        height: 0,
        channels: 3,
    };
    assert!(matches!(
        session.analyze(&frame),
        Err(QualityError::InvalidFrame(_))
    ));
}
