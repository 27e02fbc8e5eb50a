//! Trend detection followed by seasonality change detection.
//!
//! Run with: cargo run --example seasonality_changes

use std::error::Error;
use std::f64::consts::PI;

use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use trend_changepoint::{
    find_seasonality_changepoints, find_trend_changepoints, Frame, SeasonalityComponent,
    SeasonalityConfig, TrendConfig,
};

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let start = NaiveDate::from_ymd_opt(2018, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or("bad start date")?;
    let mut rng = StdRng::seed_from_u64(7);
    let days = 730;
    let ts: Vec<_> = (0..days).map(|d| start + Duration::days(d)).collect();
    // the weekly pattern triples in amplitude from day 400
    let y: Vec<f64> = (0..days)
        .map(|d| {
            let t = d as f64;
            let amp = if d < 400 { 2.0 } else { 6.0 };
            50.0 + 0.05 * t + amp * (2.0 * PI * t / 7.0).sin() + rng.gen_range(-0.5..0.5)
        })
        .collect();
    let frame = Frame::new()
        .with_time_column("date", ts)
        .with_numeric_column("visits", y);

    let trend_config = TrendConfig {
        resample_freq: "7D".to_string(),
        potential_changepoint_n: 20,
        yearly_seasonality_order: 0,
        ..Default::default()
    };
    let trend = find_trend_changepoints(&frame, "date", "visits", &trend_config)?;
    println!("Trend changepoints: {:?}", trend.changepoints);

    let season_config = SeasonalityConfig {
        components: vec![SeasonalityComponent::new("weekly", "7D", 3)],
        regularization_strength: Some(0.01),
        potential_changepoint_distance: Some("28D".to_string()),
        no_changepoint_proportion_from_end: 0.05,
        ..Default::default()
    };
    let season = find_seasonality_changepoints(&frame, "date", "visits", &season_config, &trend)?;

    println!("Seasonality strength {:.5}", season.regularization_strength);
    for (name, points) in &season.changepoints {
        let strengths = &season.strengths[name];
        println!("  {name}:");
        for (p, s) in points.iter().zip(strengths) {
            println!("    {}  block norm {s:.4}", p.date());
        }
    }
    Ok(())
}
