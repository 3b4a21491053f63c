//! Questline API server entry point.

use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;

use questline_core::clock::SystemClock;
use questline_core::peer::PeerId;
use questline_quest::domain::catalog::QuestCatalog;
use questline_session::application::session::Session;
use tracing_subscriber::EnvFilter;

use questline_api::config::AppConfig;
use questline_api::error::AppError;
use questline_api::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize tracing subscriber.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    tracing::info!("Starting Questline API server");

    let config = AppConfig::from_env()?;

    let catalog = match &config.catalog_path {
        Some(path) => {
            let source = std::fs::read_to_string(path)?;
            QuestCatalog::from_yaml(&source)?
        }
        None => QuestCatalog::builtin()?,
    };
    tracing::info!(
        fingerprint = %catalog.fingerprint(),
        quests = catalog.document().quests.len(),
        "quest catalog loaded"
    );

    let mut session = Session::new(catalog, Arc::new(SystemClock));
    bootstrap_peers(&mut session, config.peers)?;

    let app = questline_api::app(AppState::new(session));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app).await?;

    Ok(())
}

/// Joins peers `1..=count` and starts the first quest from the authority.
fn bootstrap_peers(session: &mut Session, count: u32) -> Result<(), AppError> {
    if count == 0 {
        return Ok(());
    }
    for id in 1..=count {
        session.join(PeerId(id))?;
    }
    session.pump()?;
    if let Some(authority) = session.authority() {
        session.runtime_mut(authority)?.start_quest(0)?;
        session.pump()?;
    }
    tracing::info!(peers = count, "session bootstrapped");
    Ok(())
}
