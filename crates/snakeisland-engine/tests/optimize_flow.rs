//! Integration test: build energy fields from synthetic coastline images and
//! optimize snakes on them end to end.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use image::{GrayImage, Luma};
use snakeisland_engine::{
    ControlPoint, EnergyField, EnergyKind, ExternalEnergy, GreedyOptimizer, Snake, SnakeConfig,
    SnakeFile, SourceImage,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Dark water left of x = 60, bright land to the right.
fn straight_coast() -> GrayImage {
    GrayImage::from_fn(120, 120, |x, _| if x < 60 { Luma([20]) } else { Luma([220]) })
}

fn encode_png(img: &GrayImage) -> Vec<u8> {
    let mut buf = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut buf);
    image::ImageEncoder::write_image(
        encoder,
        img.as_raw(),
        img.width(),
        img.height(),
        image::ExtendedColorType::L8,
    )
    .unwrap();
    buf
}

fn column(x: i32) -> Vec<ControlPoint> {
    (0..5).map(|i| ControlPoint::new(x, 10 + 25 * i)).collect()
}

#[test]
fn gradient_magnitude_snake_finds_the_coastline() {
    init_logging();
    let source = SourceImage::from_gray(&straight_coast());
    let field = EnergyKind::GradientMagnitude
        .build(&source, 3, 2.0)
        .expect("field should build");

    let mut snake = Snake::new(&field, 25.0).unwrap();
    snake.add_control_points(column(45)).unwrap();
    let initial = snake.energy();

    let snapshots = GreedyOptimizer::new().optimize(&mut snake, 25.0, 9).unwrap();
    assert_eq!(snapshots.len(), 9);

    for p in snake.control_points() {
        assert!(
            (f64::from(p.x) - 59.5).abs() <= 3.0,
            "control point {p:?} did not reach the coastline"
        );
    }
    assert!(snake.energy() < initial);
    // Moves along the coast only cost spacing energy.
    let ys: Vec<i32> = snake.control_points().iter().map(|p| p.y).collect();
    assert_eq!(ys, vec![10, 35, 60, 85, 110]);
}

#[test]
fn decoded_png_runs_through_the_direction_energy() {
    init_logging();
    let source = snakeisland_engine::decode(&encode_png(&straight_coast()), 0.0).unwrap();
    assert_eq!(source.channel_count(), 1);

    let config = SnakeConfig {
        scale_space_depth: 3,
        base_sigma: 2.0,
        goal_length: 25.0,
        optimization_steps: 6,
        ..SnakeConfig::default()
    };
    let field = EnergyField::from_name("GradientDirectionEnergy", &source, &config).unwrap();
    assert_eq!(field.kind(), EnergyKind::GradientDirection);

    let mut snake = Snake::new(&field, config.goal_length).unwrap();
    snake.add_control_points(column(55)).unwrap();

    let mut seen = 0;
    let snapshots = GreedyOptimizer::new()
        .optimize_with(&mut snake, config.goal_length, config.optimization_steps, |_| {
            seen += 1;
        })
        .unwrap();
    assert_eq!(seen, 6);
    assert_eq!(snapshots.len(), 6);
    for snapshot in &snapshots {
        assert_eq!(snapshot.control_points.len(), 5);
        assert_eq!(snapshot.external_energies.len(), 5);
        assert!(!snapshot.contour.is_empty());
        assert!(
            snapshot
                .external_energies
                .iter()
                .all(|e| (0.0..=field.maximum()).contains(e))
        );
    }

    let json = serde_json::to_value(&snapshots[0]).unwrap();
    for key in ["controlpoints", "contour", "flip", "externalEnergies"] {
        assert!(json.get(key).is_some(), "snapshot JSON lacks {key}");
    }
}

#[test]
fn two_snakes_share_one_field() {
    init_logging();
    let source = SourceImage::from_gray(&straight_coast());
    let field = EnergyKind::GradientMagnitude.build(&source, 2, 2.0).unwrap();

    let mut reference = Snake::new(&field, 25.0).unwrap();
    reference.add_control_points(column(50)).unwrap();
    let mut editable = Snake::new(&field, 25.0).unwrap();
    editable.reset_to(reference.control_points()).unwrap();

    GreedyOptimizer::new().optimize(&mut editable, 25.0, 4).unwrap();
    assert_eq!(reference.control_points(), column(50).as_slice());
    assert_ne!(editable.control_points(), reference.control_points());

    editable.reset_to(reference.control_points()).unwrap();
    assert_eq!(editable.snapshot().contour, reference.snapshot().contour);
    assert!(!editable.is_optimized());
}

#[test]
fn saved_snake_survives_a_trace() {
    init_logging();
    let source = SourceImage::from_gray(&straight_coast());
    let saved = SnakeFile {
        controlpoints: column(50),
        flip: true,
    };
    let config = SnakeConfig {
        energy: EnergyKind::GradientMagnitude,
        scale_space_depth: 2,
        base_sigma: 2.0,
        goal_length: 25.0,
        optimization_steps: 4,
        ..SnakeConfig::default()
    };

    let snapshots = snakeisland_engine::trace(&source, &saved, &config).unwrap();
    let last = snapshots.last().expect("four snapshots");
    assert!(last.flip);

    let reloaded = SnakeFile::from_json(
        &SnakeFile {
            controlpoints: last.control_points.clone(),
            flip: last.flip,
        }
        .to_json()
        .unwrap(),
    )
    .unwrap();
    assert_eq!(reloaded.controlpoints, last.control_points);
    assert!(reloaded.flip);
}
