use pv_geometry::{
    write_csv, EstimatorConfig, GeometryEstimator, GeometryResult, SyntheticSite,
};

fn main() -> GeometryResult<()> {
    tracing_subscriber::fmt::init();

    let site = SyntheticSite {
        num_days: 2 * 365,
        noise_std: 0.01,
        cloudy_fraction: 0.3,
        seed: 42,
        ..SyntheticSite::default()
    };
    let data = site.generate()?;

    let config = EstimatorConfig::from_toml_str(
        r#"
        estimator = "fit_huber"
        n_random = 2
        seed = 7
        "#,
    )?;
    let mut estimator = GeometryEstimator::new(&data, config)?;
    let geometry = estimator.estimate_all(None, None)?;
    estimator.sweep_longitude();
    estimator.sweep_latitude();

    println!("=== PV System Geometry Estimation ===");
    println!(
        "True:      lon {:8.3}  lat {:7.3}  tilt {:6.2}  azimuth {:7.2}",
        site.longitude, site.latitude, site.tilt, site.azimuth
    );
    println!(
        "Estimated: lon {:8.3}  lat {:7.3}  tilt {:6.2}  azimuth {:7.2}",
        geometry.longitude.unwrap_or(f64::NAN),
        geometry.latitude.unwrap_or(f64::NAN),
        geometry.tilt.unwrap_or(f64::NAN),
        geometry.azimuth.unwrap_or(f64::NAN),
    );
    println!();
    println!("--- Diagnostics ---");
    if let Err(err) = write_csv(estimator.results(), std::io::stdout()) {
        eprintln!("cannot write diagnostics: {err}");
    }
    Ok(())
}
