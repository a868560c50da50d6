mod config;
mod db;
mod geo;
mod location;
mod rate_limit;
mod routes;
mod services;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::config::{AppConfig, AuthBackendKind, ConfigError};
use crate::geo::{Coordinate, GeoError, GpsFix};
use crate::location::headless::{self, LocateStep, StaticProvider};
use crate::location::{
    GeocodeError, GeolocationError, GeolocationOptions, GeolocationProvider, MapboxGeocoder, PickerError,
    ReverseGeocoder,
};
use crate::services::accounts::SessionAuthService;
use crate::services::auth::AuthBackend;
use crate::services::mock_auth::{MemoryStorage, MockAuthService};
use crate::services::seed::{self, SeedError};
use crate::services::session;

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("seed failed: {0}")]
    Seed(#[from] SeedError),
    #[error("mock user fixture is malformed: {0}")]
    Fixture(#[from] serde_json::Error),
    #[error("geocoder setup failed: {0}")]
    Geocode(#[from] GeocodeError),
    #[error("invalid coordinate: {0}")]
    Coordinate(#[from] GeoError),
    #[error("location picker failed: {0}")]
    Picker(#[from] PickerError),
}

#[derive(Parser, Debug)]
#[command(name = "eas-server", about = "University event attendance API server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API (default).
    Serve,
    /// Insert the campuses and demo accounts.
    Seed {
        /// Truncate campus-owned tables first.
        #[arg(long)]
        clear: bool,
    },
    /// Run the location picker headlessly and print the final Selected
    /// Location as JSON. Without a position, the device is treated as
    /// unsupported and the fallback coordinate is used.
    Locate {
        #[arg(long, requires = "lng", allow_negative_numbers = true)]
        lat: Option<f64>,
        #[arg(long, requires = "lat", allow_negative_numbers = true)]
        lng: Option<f64>,
        /// Reported horizontal accuracy in metres.
        #[arg(long)]
        accuracy: Option<f64>,
        /// Give up on the device position after this many milliseconds.
        #[arg(long, default_value_t = 10_000)]
        timeout_ms: u64,
        /// Input applied once the map is ready, in order. One of
        /// `click:LAT,LNG`, `drag:LAT,LNG`, `set:LAT,LNG` or `remeasure`.
        #[arg(long = "step")]
        steps: Vec<LocateStep>,
    },
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Seed { clear } => run_seed(&config, clear).await,
        Command::Locate { lat, lng, accuracy, timeout_ms, steps } => {
            let options = GeolocationOptions {
                timeout: Duration::from_millis(timeout_ms),
                ..GeolocationOptions::default()
            };
            locate(&config, lat.zip(lng), accuracy, options, &steps).await
        }
    }
}

fn build_geocoder(config: &AppConfig) -> Result<Option<Arc<dyn ReverseGeocoder>>, GeocodeError> {
    let Some(token) = config.mapbox_access_token.clone() else {
        return Ok(None);
    };
    let geocoder: Arc<dyn ReverseGeocoder> = Arc::new(MapboxGeocoder::new(token, &config.mapbox_base_url)?);
    Ok(Some(geocoder))
}

async fn serve(config: AppConfig) -> Result<(), AppError> {
    let pool = db::init_pool(config.database_url()?, config.db_max_connections).await?;

    let auth: Arc<dyn AuthBackend> = match config.auth_backend {
        AuthBackendKind::Session => Arc::new(SessionAuthService::new(pool.clone(), config.session_ttl)),
        AuthBackendKind::Mock => {
            tracing::warn!("mock auth backend enabled; fixture accounts only, one shared client store");
            Arc::new(MockAuthService::from_fixture(config.mock_auth_delay, Arc::new(MemoryStorage::new()))?)
        }
    };
    let geocoder = build_geocoder(&config)?;
    if geocoder.is_none() {
        tracing::info!("MAPBOX_ACCESS_TOKEN not set; reverse geocoding disabled");
    }

    let _purge = session::spawn_purge_task(pool.clone());

    let port = config.port;
    let state = state::AppState::new(pool, config, auth, geocoder);
    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;

    tracing::info!(%port, "eas-server listening");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}

async fn run_seed(config: &AppConfig, clear: bool) -> Result<(), AppError> {
    let pool = db::init_pool(config.database_url()?, config.db_max_connections).await?;
    let report = seed::run(&pool, clear).await?;
    tracing::info!(
        campuses = report.campuses_created,
        users = report.users_created,
        "seed complete"
    );
    Ok(())
}

async fn locate(
    config: &AppConfig,
    position: Option<(f64, f64)>,
    accuracy: Option<f64>,
    options: GeolocationOptions,
    steps: &[LocateStep],
) -> Result<(), AppError> {
    let provider: Arc<dyn GeolocationProvider> = match position {
        Some((lat, lng)) => Arc::new(StaticProvider::fix(GpsFix {
            coordinate: Coordinate::new(lat, lng)?,
            accuracy_m: accuracy,
        })),
        None => Arc::new(StaticProvider::failing(GeolocationError::Unsupported)),
    };

    let history = headless::locate(provider, config.fallback, build_geocoder(config)?, options, steps).await?;
    for (index, selected) in history.iter().enumerate() {
        tracing::debug!(index, source = selected.source.as_str(), address = %selected.address, "selection reported");
    }
    let Some(selected) = history.last() else {
        return Ok(());
    };
    if selected.source.is_fallback() {
        tracing::warn!("device position unavailable; reporting the fallback coordinate");
    }
    println!("{}", serde_json::to_string_pretty(selected)?);
    Ok(())
}
