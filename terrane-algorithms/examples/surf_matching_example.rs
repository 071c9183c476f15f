use terrane_algorithms::surf::{DetectorParams, SurfEngine};
use terrane_core::image::IntegralImage;

/// A synthetic image with a few bright blobs of different sizes
fn blob_image(offset: usize) -> IntegralImage {
    let blobs = [(40 + offset, 40, 4usize), (120, 80 + offset, 6), (200, 180, 9)];
    IntegralImage::from_fn(256, 256, |row, column| {
        for &(blob_row, blob_column, radius) in &blobs {
            let dr = row as i64 - blob_row as i64;
            let dc = column as i64 - blob_column as i64;
            if dr * dr + dc * dc <= (radius * radius) as i64 {
                return 1.0;
            }
        }
        0.0
    })
    .unwrap()
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let params = DetectorParams {
        threshold: 0.004,
        ..Default::default()
    };
    let mut first = SurfEngine::new(blob_image(0), params)?;
    let mut second = SurfEngine::new(blob_image(3), params)?;
    println!(
        "detected {} / {} interest points",
        first.detections().len(),
        second.detections().len()
    );

    let matches = first.matching_points(&mut second, 0.65, false);
    println!("found {} matches", matches.len());
    for found in &matches {
        println!(
            "({:6.1}, {:6.1}) -> ({:6.1}, {:6.1})  scale {:.2}  distance {:.4}",
            found.query.x, found.query.y, found.target.x, found.target.y, found.query.scale, found.distance
        );
    }
    Ok(())
}
