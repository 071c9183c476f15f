use rand::Rng;
use terrane_algorithms::segmentation::{segment_points, SegmentationParams};
use terrane_core::cloud::VecPointSource;
use terrane_core::progress::SilentProgress;

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    // undulating ground with scattered vegetation points above it
    let mut rng = rand::thread_rng();
    let mut points = Vec::new();
    for _ in 0..20000 {
        let x: f64 = rng.gen_range(0.0..100.0);
        let y: f64 = rng.gen_range(0.0..100.0);
        let ground = (x / 20.0).sin() + (y / 15.0).cos();
        points.push((x, y, ground));
        if rng.gen_bool(0.1) {
            points.push((x, y, ground + rng.gen_range(2.0..15.0)));
        }
    }
    let source = VecPointSource::from_xyz(&points);

    let params = SegmentationParams {
        search_distance: 2.0,
        ..Default::default()
    };
    let output = segment_points(&source, &params, &SilentProgress)?;
    println!("grew {} segments", output.segment_count);

    let ground_points = output
        .records
        .iter()
        .filter(|record| record.class_value == 1)
        .count();
    println!(
        "largest-seed segment holds {} of {} points",
        ground_points,
        output.records.len()
    );
    Ok(())
}
