//! Sample data for the form's waveform plot.

use polars::prelude::*;
use rand_distr::{Distribution, Normal};
use std::f64::consts::PI;

use crate::generator::WaveformType;

pub const TIME_COLUMN_NAME: &str = "time";
pub const AMPLITUDE_COLUMN_NAME: &str = "amplitude";
pub const DEFAULT_POINTS: usize = 500;

/// `points` evenly spaced values from 0 to 1 inclusive.
fn linspace(points: usize) -> Vec<f64> {
    match points {
        0 => Vec::new(),
        1 => vec![0.0],
        n => (0..n).map(|i| i as f64 / (n - 1) as f64).collect(),
    }
}

fn shape(waveform_type: &WaveformType, frequency_hz: f64, t: &[f64]) -> Vec<f64> {
    let sine = |t: f64| (2.0 * PI * frequency_hz * t).sin();

    match waveform_type {
        WaveformType::Sine => t.iter().map(|&t| sine(t)).collect(),
        WaveformType::Square => t
            .iter()
            .map(|&t| {
                let s = sine(t);
                if s == 0.0 {
                    0.0
                } else {
                    s.signum()
                }
            })
            .collect(),
        WaveformType::Ramp => t.iter().map(|&t| 2.0 * (t - (t + 0.5).floor())).collect(),
        WaveformType::Pulse => t
            .iter()
            .map(|&t| if sine(t) > 0.0 { 1.0 } else { 0.0 })
            .collect(),
        WaveformType::Noise => {
            let mut rng = rand::thread_rng();
            match Normal::new(0.0, 1.0) {
                Ok(normal) => t.iter().map(|_| normal.sample(&mut rng)).collect(),
                Err(_) => vec![0.0; t.len()],
            }
        }
        WaveformType::Dc => vec![1.0; t.len()],
        WaveformType::Arb | WaveformType::Other(_) => vec![0.0; t.len()],
    }
}

/// One second of the selected basic wave, `points` samples, as `time` / `amplitude` columns.
pub fn render(
    waveform_type: &WaveformType,
    frequency_hz: f64,
    points: usize,
) -> Result<DataFrame, PolarsError> {
    let time = linspace(points);
    let amplitude = shape(waveform_type, frequency_hz, &time);

    polars::df!(
        TIME_COLUMN_NAME => time,
        AMPLITUDE_COLUMN_NAME => amplitude
    )
}

/// Write a rendered preview as CSV.
pub fn write_csv<W: std::io::Write>(df: &mut DataFrame, writer: W) -> Result<(), PolarsError> {
    CsvWriter::new(writer).include_header(true).finish(df)
}
