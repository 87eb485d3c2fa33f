//! docshift server.
//!
//! Opens the document store, runs every pending migration before the
//! service is considered ready, and reports progress over HTTP:
//!
//! - `GET /health` - liveness
//! - `GET /health/ready` - 200 once migrations completed, 503 while
//!   migrating or in maintenance mode

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod health;

pub use bootstrap::{run_migrations, Outcome};
pub use config::{Args, ServerConfig};
pub use error::Error;
pub use health::{HealthState, Readiness};

use std::future::Future;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Create the router with all routes.
pub fn create_router(state: HealthState) -> Router {
    Router::new()
        .merge(health::routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the health endpoints until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: HealthState, shutdown: F) -> Result<(), Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
