//! Detect trend changepoints in a synthetic daily series and export the
//! plot series to CSV.
//!
//! Run with: cargo run --example detect_trend -- [output.csv]
//! Set `RUST_LOG=debug` to see the detection steps.

use std::error::Error;
use std::f64::consts::PI;

use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use trend_changepoint::{find_trend_changepoints, plot_series, Frame, PlotComponents, TrendConfig};

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let out_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "trend_plot.csv".to_string());

    // Four years of daily data: growth slows at day 500 and reverses at day 1000
    let start = NaiveDate::from_ymd_opt(2016, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or("bad start date")?;
    let mut rng = StdRng::seed_from_u64(2024);
    let days = 1461;
    let ts: Vec<_> = (0..days).map(|d| start + Duration::days(d)).collect();
    let y: Vec<f64> = (0..days)
        .map(|d| {
            let t = d as f64;
            let trend = 200.0 + 0.2 * t - 0.15 * (t - 500.0).max(0.0) - 0.1 * (t - 1000.0).max(0.0);
            let yearly = 8.0 * (2.0 * PI * t / 365.25).sin();
            let weekly = 3.0 * (2.0 * PI * t / 7.0).cos();
            trend + yearly + weekly + rng.gen_range(-4.0..4.0)
        })
        .collect();
    let frame = Frame::new()
        .with_time_column("date", ts)
        .with_numeric_column("sales", y);

    let config = TrendConfig {
        resample_freq: "7D".to_string(),
        potential_changepoint_n: 40,
        no_changepoint_proportion_from_end: 0.1,
        actual_changepoint_min_distance: "60D".to_string(),
        ..Default::default()
    };

    let result = find_trend_changepoints(&frame, "date", "sales", &config)?;

    println!("=== Trend changepoints ===");
    println!(
        "{} observations, {} aggregated, {} candidates, strength {:.5}",
        result.original.len(),
        result.aggregated.len(),
        result.candidates.len(),
        result.regularization_strength
    );
    for (cp, coef) in result.changepoints.iter().zip(&result.coefficients) {
        println!(
            "  {}  slope change {:+.3}/day  slope after {:+.3}/day",
            cp.date(),
            coef / 365.25,
            result.trend_model.slope_per_day(*cp)
        );
    }

    let components = PlotComponents {
        seasonality_change_by_component: false,
        yearly_seasonality_estimate: true,
        adaptive_lasso_estimate: true,
        ..Default::default()
    };
    let series = plot_series(&result, None, &components)?;

    let mut writer = csv::Writer::from_path(&out_path)?;
    for s in &series {
        for row in s.rows() {
            writer.serialize(row)?;
        }
    }
    writer.flush()?;
    println!("\nWrote {} series to {out_path}", series.len());
    Ok(())
}
