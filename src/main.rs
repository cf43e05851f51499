// src/main.rs
// Entry point: settings from the environment, tracing subscriber, then the actix server with
// the API routes and the static frontend.

use actix_files::Files;
use actix_web::{web, App, HttpServer};
use double_pendulum_sim::config::ServerSettings;
use double_pendulum_sim::ui::{self, AppState};
use std::io;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::FmtSubscriber;

#[actix_web::main]
async fn main() -> io::Result<()> {
    let settings = ServerSettings::from_env();
    let level = settings.log_level.parse::<LevelFilter>().unwrap_or(LevelFilter::INFO);
    tracing::subscriber::set_global_default(FmtSubscriber::builder().with_max_level(level).finish())
        .map_err(io::Error::other)?;

    let app_state = web::Data::new(AppState::new(settings.tick_hz));
    let static_dir = settings.static_dir.clone();
    info!(bind = %settings.bind, static_dir = %static_dir, tick_hz = settings.tick_hz, "starting server");

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .configure(ui::configure)
            .service(Files::new("/", static_dir.clone()).index_file("index.html"))
    })
    .bind(settings.bind.as_str())?
    .run()
    .await
}
