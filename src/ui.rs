// src/ui.rs
// HTTP front end: the render/input collaborator of the simulation.
//   POST   /api/simulate  batch run, returns frames for animation + θ/ω and x-y plots
//   POST   /api/session   start (or replace) a live session ticking in the background; replies
//                         with the config (pivot, rods) and the first snapshot
//   GET    /api/state     latest snapshot of the live session (also records a plot sample)
//   POST   /api/pause     toggle pause on the live session
//   GET    /api/plot      PNG of the samples recorded so far (?kind=series|trajectory)
//   DELETE /api/session   stop the live session's ticker
// Form fields arrive as text and are resolved through config::ParamForm, so a blank or garbled
// field falls back to its default instead of failing the request.

use crate::config::{ConfigError, ParamForm, PendulumConfig};
use crate::driver::{solve_batch, spawn_ticker, SharedSimulation, Simulation, Snapshot, TickerHandle};
use crate::logic::DEFAULT_DT;
use crate::plot::{
    render, render_time_series_png, render_trajectory_png, to_data_url, PlotError, PlotKind, Sample,
    TimeSeriesRecorder,
};
use crate::state::PendulumState;
use actix_web::{http::StatusCode, web, HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub const DEFAULT_STEPS: usize = 500;
pub const MAX_STEPS: usize = 20_000;

#[derive(Debug, Deserialize)]
pub struct SimParams {
    #[serde(flatten)]
    pub form: ParamForm, // mass1, mass2, theta1, theta2, omega1, omega2 as text
    pub steps: Option<usize>,
    pub dt: Option<f64>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("no live session; POST /api/session first")]
    NoSession,
    #[error(transparent)]
    Plot(#[from] PlotError),
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Config(_) => StatusCode::BAD_REQUEST,
            ApiError::NoSession => StatusCode::NOT_FOUND,
            ApiError::Plot(PlotError::NotEnoughSamples(_)) => StatusCode::CONFLICT,
            ApiError::Plot(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            success: false,
            error: self.to_string(),
        })
    }
}

#[derive(Serialize)]
struct SimResponse {
    success: bool,
    trajectory_image: Option<String>, // θ/ω against time, base64 PNG data URL; None if plotting failed
    path_image: Option<String>,       // x-y path of both bobs
    animation_data: AnimationData,
    energy_drift: f64, // |E_end − E_0| / |E_0|
    singular_at: Option<usize>,
}

#[derive(Serialize)]
struct AnimationData {
    config: PendulumConfig,
    times: Vec<f64>,
    positions: Vec<[f64; 4]>, // per frame: [x1, y1, x2, y2]
    trail_1: Vec<(f64, f64)>,
    trail_2: Vec<(f64, f64)>,
}

#[derive(Serialize)]
struct SessionResponse {
    config: PendulumConfig,
    snapshot: Snapshot,
}

#[derive(Debug, Default, Deserialize)]
pub struct PlotQuery {
    #[serde(default)]
    pub kind: PlotKind,
}

#[derive(Serialize)]
struct PauseResponse {
    paused: bool,
}

#[derive(Serialize)]
struct StopResponse {
    ticks: u64,
}

struct LiveSession {
    sim: SharedSimulation,
    ticker: TickerHandle,
    recorder: TimeSeriesRecorder,
}

/// Shared across workers via `web::Data`.
pub struct AppState {
    live: Mutex<Option<LiveSession>>,
    tick_interval: Duration,
}

impl AppState {
    pub fn new(tick_hz: u32) -> Self {
        Self {
            live: Mutex::new(None),
            tick_interval: Duration::from_secs_f64(1.0 / f64::from(tick_hz.max(1))),
        }
    }
}

/// Registers all API routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/simulate", web::post().to(simulate_handler))
            .route("/session", web::post().to(start_session_handler))
            .route("/session", web::delete().to(stop_session_handler))
            .route("/state", web::get().to(state_handler))
            .route("/pause", web::post().to(pause_handler))
            .route("/plot", web::get().to(plot_handler)),
    );
}

/// Plot failures never fail a batch run; the image is just left out.
fn as_data_url(what: &str, rendered: Result<Vec<u8>, PlotError>) -> Option<String> {
    match rendered {
        Ok(png) => Some(to_data_url(&png)),
        Err(err) => {
            warn!(%err, plot = what, "could not render plot");
            None
        }
    }
}

pub async fn simulate_handler(params: web::Json<SimParams>) -> Result<HttpResponse, ApiError> {
    let (config, initial) = params.form.resolve()?;
    let dt = params.dt.unwrap_or(DEFAULT_DT);
    let steps = params.steps.unwrap_or(DEFAULT_STEPS).min(MAX_STEPS);

    let trajectory = solve_batch(config, initial, dt, steps)?;

    let mut recorder = TimeSeriesRecorder::new(trajectory.points.len());
    for point in &trajectory.points {
        recorder.push(Sample::from(point));
    }
    let trajectory_image = as_data_url("time-series", render_time_series_png(&recorder));
    let path_image = as_data_url("trajectory", render_trajectory_png(&recorder, &trajectory.config));

    let e0 = PendulumState::initialize(&trajectory.config, initial).total_energy(&trajectory.config);
    let e1 = trajectory.final_state.total_energy(&trajectory.config);
    let energy_drift = if e0 != 0.0 { ((e1 - e0) / e0).abs() } else { (e1 - e0).abs() };

    Ok(HttpResponse::Ok().json(SimResponse {
        success: true,
        trajectory_image,
        path_image,
        animation_data: AnimationData {
            times: trajectory.points.iter().map(|p| p.time).collect(),
            positions: trajectory.points.iter().map(|p| p.positions).collect(),
            trail_1: trajectory.final_state.trail_1.to_vec(),
            trail_2: trajectory.final_state.trail_2.to_vec(),
            config: trajectory.config,
        },
        energy_drift,
        singular_at: trajectory.singular_at,
    }))
}

pub async fn start_session_handler(
    app: web::Data<AppState>,
    params: web::Json<SimParams>,
) -> Result<HttpResponse, ApiError> {
    let (config, initial) = params.form.resolve()?;
    let sim = Simulation::new(config, initial, params.dt.unwrap_or(DEFAULT_DT))?;
    let config = sim.config().clone();
    let shared = SharedSimulation::new(sim);
    let snapshot = shared.snapshot();

    let mut live = app.live.lock().await;
    if let Some(previous) = live.take() {
        let ticks = previous.ticker.stop().await;
        info!(ticks, "replaced live session");
    }
    let ticker = spawn_ticker(shared.clone(), app.tick_interval);
    let mut recorder = TimeSeriesRecorder::default();
    recorder.record(&snapshot);
    *live = Some(LiveSession {
        sim: shared,
        ticker,
        recorder,
    });
    info!("live session started");
    Ok(HttpResponse::Ok().json(SessionResponse { config, snapshot }))
}

pub async fn state_handler(app: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let mut live = app.live.lock().await;
    let session = live.as_mut().ok_or(ApiError::NoSession)?;
    let snapshot: Snapshot = session.sim.snapshot();
    session.recorder.record(&snapshot);
    Ok(HttpResponse::Ok().json(snapshot))
}

pub async fn pause_handler(app: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let live = app.live.lock().await;
    let session = live.as_ref().ok_or(ApiError::NoSession)?;
    let paused = session.sim.toggle_pause();
    Ok(HttpResponse::Ok().json(PauseResponse { paused }))
}

pub async fn plot_handler(
    app: web::Data<AppState>,
    query: web::Query<PlotQuery>,
) -> Result<HttpResponse, ApiError> {
    let live = app.live.lock().await;
    let session = live.as_ref().ok_or(ApiError::NoSession)?;
    let png = render(query.kind, &session.recorder, &session.sim.config())?;
    Ok(HttpResponse::Ok().content_type("image/png").body(png))
}

pub async fn stop_session_handler(app: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let session = app.live.lock().await.take().ok_or(ApiError::NoSession)?;
    let ticks = session.ticker.stop().await;
    info!(ticks, "live session stopped");
    Ok(HttpResponse::Ok().json(StopResponse { ticks }))
}
