use rand::Rng;
use terrane_algorithms::interpolation::{
    derive_grid_spec, interpolate_idw, interpolate_max, IdwParams, MaxParams,
};
use terrane_core::cloud::{PointFilter, VecPointSource};
use terrane_core::progress::SilentProgress;
use terrane_core::raster::{DataScale, MemoryRaster, RasterSource};

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let mut rng = rand::thread_rng();
    let points: Vec<(f64, f64, f64)> = (0..50000)
        .map(|_| {
            let x: f64 = rng.gen_range(0.0..500.0);
            let y: f64 = rng.gen_range(0.0..500.0);
            let z = 100.0 + (x / 50.0).sin() * 10.0 + (y / 80.0).cos() * 5.0;
            (x, y, z)
        })
        .collect();
    let source = VecPointSource::from_xyz(&points);
    let filter = PointFilter::keep_all();
    let grid = derive_grid_spec(&source, &filter, 2.0)?;
    println!("output grid is {} x {}", grid.rows, grid.columns);

    // the two surfaces are independent jobs, run them on separate workers
    let (dem, dsm) = rayon::join(
        || -> anyhow::Result<MemoryRaster> {
            let mut sink = MemoryRaster::filled_with_no_data(
                grid.rows,
                grid.columns,
                DataScale::Continuous,
            )?;
            interpolate_idw(
                &source,
                &grid,
                &IdwParams::default(),
                &mut sink,
                &SilentProgress,
            )?;
            Ok(sink)
        },
        || -> anyhow::Result<MemoryRaster> {
            let mut sink = MemoryRaster::filled_with_no_data(
                grid.rows,
                grid.columns,
                DataScale::Continuous,
            )?;
            interpolate_max(
                &source,
                &grid,
                &MaxParams::default(),
                &mut sink,
                &SilentProgress,
            )?;
            Ok(sink)
        },
    );
    let dem = dem?;
    let dsm = dsm?;

    let center = (grid.rows / 2, grid.columns / 2);
    println!(
        "center cell: idw {:.2}, max {:.2}",
        dem.value(center.0, center.1),
        dsm.value(center.0, center.1)
    );
    Ok(())
}
