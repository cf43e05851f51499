// src/plot.rs
// Optional plotting collaborator. The simulation core does not keep any history beyond the
// trails, so the observer samples θ1, θ2, ω1, ω2, both bob positions and elapsed time into a
// TimeSeriesRecorder (a bounded ring buffer) once per observed tick.
// render_time_series_png draws two stacked charts (angles, angular velocities) against time;
// render_trajectory_png draws the x-y path of both bobs around the pivot. Both go through
// plotters into an RGB buffer and are encoded as PNG; to_data_url base64-wraps for the browser.

use crate::config::PendulumConfig;
use crate::driver::{Snapshot, TrajectoryPoint};
use base64::{engine::general_purpose, Engine as _};
use image::ImageFormat;
use plotters::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::io::Cursor;
use thiserror::Error;

pub const DEFAULT_SAMPLE_CAPACITY: usize = 1000;

const W: u32 = 640;
const H: u32 = 480;

#[derive(Debug, Error)]
pub enum PlotError {
    #[error("need at least two samples to plot, have {0}")]
    NotEnoughSamples(usize),
    #[error("drawing failed: {0}")]
    Draw(String),
    #[error("png encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    pub time: f64,
    pub theta_1: f64,
    pub theta_2: f64,
    pub omega_1: f64,
    pub omega_2: f64,
    pub positions: [f64; 4], // [x1, y1, x2, y2] in render space
}

impl From<&Snapshot> for Sample {
    fn from(snapshot: &Snapshot) -> Self {
        let s = &snapshot.state;
        Self {
            time: snapshot.elapsed,
            theta_1: s.theta_1,
            theta_2: s.theta_2,
            omega_1: s.omega_1,
            omega_2: s.omega_2,
            positions: [s.x_1, s.y_1, s.x_2, s.y_2],
        }
    }
}

impl From<&TrajectoryPoint> for Sample {
    fn from(point: &TrajectoryPoint) -> Self {
        Self {
            time: point.time,
            theta_1: point.theta_1,
            theta_2: point.theta_2,
            omega_1: point.omega_1,
            omega_2: point.omega_2,
            positions: point.positions,
        }
    }
}

/// Which picture `/api/plot` draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlotKind {
    #[default]
    Series,
    Trajectory,
}

/// Keeps the most recent `capacity` samples.
#[derive(Debug, Clone)]
pub struct TimeSeriesRecorder {
    capacity: usize,
    samples: VecDeque<Sample>,
}

impl Default for TimeSeriesRecorder {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_CAPACITY)
    }
}

impl TimeSeriesRecorder {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, sample: Sample) {
        self.samples.push_back(sample);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    pub fn record(&mut self, snapshot: &Snapshot) {
        self.push(Sample::from(snapshot));
    }

    pub fn samples(&self) -> impl Iterator<Item = &Sample> + '_ {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// (min, max) of the selected series across all samples, padded so a flat line still plots.
    fn range_of(&self, pick: impl Fn(&Sample) -> [f64; 2]) -> (f64, f64) {
        let (lo, hi) = self
            .samples
            .iter()
            .flat_map(|s| pick(s))
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
        if lo > hi {
            return (-1.0, 1.0);
        }
        let pad = ((hi - lo) * 0.05).max(1e-3);
        (lo - pad, hi + pad)
    }

    fn time_range(&self) -> (f64, f64) {
        let start = self.samples.front().map_or(0.0, |s| s.time);
        let end = self.samples.back().map_or(1.0, |s| s.time);
        if end > start {
            (start, end)
        } else {
            (start, start + 1.0)
        }
    }
}

fn draw_err<E: std::fmt::Display>(err: E) -> PlotError {
    PlotError::Draw(err.to_string())
}

/// Draws one chart with the bob-1 series in blue and the bob-2 series in green.
fn draw_panel<DB: DrawingBackend>(
    area: &DrawingArea<DB, plotters::coord::Shift>,
    recorder: &TimeSeriesRecorder,
    caption: &str,
    y_desc: &str,
    pick: impl Fn(&Sample) -> [f64; 2] + Copy,
) -> Result<(), PlotError>
where
    DB::ErrorType: 'static,
{
    let (t0, t1) = recorder.time_range();
    let (y0, y1) = recorder.range_of(pick);
    let mut chart = ChartBuilder::on(area)
        .caption(caption, ("sans-serif", 18).into_font())
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(50)
        .build_cartesian_2d(t0..t1, y0..y1)
        .map_err(draw_err)?;

    chart
        .configure_mesh()
        .x_desc("t (s)")
        .y_desc(y_desc)
        .draw()
        .map_err(draw_err)?;

    let series = [(0usize, "B1", BLUE), (1usize, "B2", GREEN)];
    for (idx, label, color) in series {
        chart
            .draw_series(LineSeries::new(
                recorder.samples().map(|s| (s.time, pick(s)[idx])),
                color.stroke_width(1),
            ))
            .map_err(draw_err)?
            .label(label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(draw_err)?;
    Ok(())
}

/// Bob positions relative to the pivot, y flipped to point up: ((x1, y1), (x2, y2)).
fn pivot_relative(sample: &Sample, config: &PendulumConfig) -> ((f64, f64), (f64, f64)) {
    let [x_1, y_1, x_2, y_2] = sample.positions;
    (
        (x_1 - config.origin_x, config.origin_y - y_1),
        (x_2 - config.origin_x, config.origin_y - y_2),
    )
}

/// Draws the x-y path of each bob on a square chart centred on the pivot.
fn draw_trajectory<DB: DrawingBackend>(
    area: &DrawingArea<DB, plotters::coord::Shift>,
    recorder: &TimeSeriesRecorder,
    config: &PendulumConfig,
) -> Result<(), PlotError>
where
    DB::ErrorType: 'static,
{
    let limit = (config.length_rod_1 + config.length_rod_2) * 1.05; // Full reach plus padding.
    let mut chart = ChartBuilder::on(area)
        .caption("Trajectories", ("sans-serif", 18).into_font())
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(40)
        .build_cartesian_2d(-limit..limit, -limit..limit)
        .map_err(draw_err)?;

    chart.configure_mesh().x_desc("x").y_desc("y").draw().map_err(draw_err)?;

    let series = [("B1", BLUE), ("B2", GREEN)];
    for (idx, (label, color)) in series.into_iter().enumerate() {
        chart
            .draw_series(LineSeries::new(
                recorder.samples().map(|s| {
                    let (bob_1, bob_2) = pivot_relative(s, config);
                    if idx == 0 {
                        bob_1
                    } else {
                        bob_2
                    }
                }),
                color.mix(0.75).stroke_width(1),
            ))
            .map_err(draw_err)?
            .label(label)
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
    }

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()
        .map_err(draw_err)?;
    Ok(())
}

/// Runs `draw` on a fresh W×H white canvas and returns the PNG bytes.
fn render_png<F>(draw: F) -> Result<Vec<u8>, PlotError>
where
    F: FnOnce(&DrawingArea<BitMapBackend<'_>, plotters::coord::Shift>) -> Result<(), PlotError>,
{
    let mut pixel_buffer = vec![0u8; (W * H * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut pixel_buffer, (W, H)).into_drawing_area();
        root.fill(&WHITE).map_err(draw_err)?;
        draw(&root)?;
        root.present().map_err(draw_err)?;
    }

    let img_buffer = image::RgbImage::from_raw(W, H, pixel_buffer)
        .ok_or_else(|| PlotError::Draw("pixel buffer has the wrong size".to_string()))?;
    let mut png = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img_buffer).write_to(&mut png, ImageFormat::Png)?;
    Ok(png.into_inner())
}

/// Renders angles and angular velocities against time as a PNG.
pub fn render_time_series_png(recorder: &TimeSeriesRecorder) -> Result<Vec<u8>, PlotError> {
    if recorder.len() < 2 {
        return Err(PlotError::NotEnoughSamples(recorder.len()));
    }
    render_png(|root| {
        let (upper, lower) = root.split_vertically(H as i32 / 2);
        draw_panel(&upper, recorder, "Angles", "theta (rad)", |s| [s.theta_1, s.theta_2])?;
        draw_panel(&lower, recorder, "Angular velocities", "omega (rad/s)", |s| [s.omega_1, s.omega_2])
    })
}

/// Renders the x-y path of both bobs as a PNG.
pub fn render_trajectory_png(recorder: &TimeSeriesRecorder, config: &PendulumConfig) -> Result<Vec<u8>, PlotError> {
    if recorder.len() < 2 {
        return Err(PlotError::NotEnoughSamples(recorder.len()));
    }
    render_png(|root| draw_trajectory(root, recorder, config))
}

pub fn render(kind: PlotKind, recorder: &TimeSeriesRecorder, config: &PendulumConfig) -> Result<Vec<u8>, PlotError> {
    match kind {
        PlotKind::Series => render_time_series_png(recorder),
        PlotKind::Trajectory => render_trajectory_png(recorder, config),
    }
}

pub fn to_data_url(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", general_purpose::STANDARD.encode(png))
}
