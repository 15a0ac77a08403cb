//! # gfi-sweep
//!
//! Harvests feature attributes from a WMS layer by issuing GetFeatureInfo
//! requests on a regular pixel grid over a rendered map.
//!
//! ## Design Philosophy
//!
//! - **Fail fast on configuration** - a bad bounding box or grid is rejected
//!   before any request is sent
//! - **Absorb remote failures** - timeouts, error statuses and empty answers
//!   only ever mean "nothing found here"
//! - **One file per document** - responses are deduplicated by content, so the
//!   same feature returned for many pixels is written once
//! - **Polite by default** - sequential, with a minimum spacing between requests
//!
//! ## Quick Start
//!
//! ```no_run
//! use gfi_sweep::{BBox, SweepConfig, Sweeper};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = SweepConfig::default();
//!     config.service.base_url = "https://maps.example.com/lizmap/service".to_string();
//!     config.service.layer = "impianti".to_string();
//!     config.raster.bbox = Some("1252852.5,5568056.2,1556460.4,5936176.9".parse::<BBox>()?);
//!     config.raster.width = 993;
//!     config.raster.height = 1204;
//!
//!     let sweeper = Sweeper::new(config)?;
//!
//!     let mut events = sweeper.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let result = sweeper.run().await.into_result()?;
//!     println!("saved {} documents", result.hits);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Content deduplication
pub mod dedup;
/// Error types
pub mod error;
/// Per-coordinate fetch with protocol fallback
pub mod fetch;
/// Sampling grid
pub mod grid;
/// Minimum spacing between requests
pub mod pacer;
/// GetFeatureInfo parameter sets
pub mod query;
/// Per-sweep state
pub mod session;
/// Persistence and progress reporting
pub mod sink;
/// Sweep driver
pub mod sweeper;
/// Request transport
pub mod transport;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::SweepConfig;
pub use dedup::{DedupStore, Offer};
pub use error::{Error, Result, ToExitCode, TransportError};
pub use fetch::{Classification, Classifier, FetchOrchestrator};
pub use grid::GridGenerator;
pub use pacer::RequestPacer;
pub use query::{QueryBuilder, QueryRequest};
pub use session::SweepSession;
pub use sink::ResultSink;
pub use sweeper::{SweepReport, Sweeper};
pub use transport::{HttpTransport, Transport, TransportResponse};
pub use types::{
    BBox, Coordinate, Event, Fingerprint, ProtocolVariant, ResponseOutcome, SweepResult,
    SweepTarget,
};

use tokio_util::sync::CancellationToken;

/// Cancel `token` when the process receives a termination signal
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// A cancelled sweep stops starting new coordinates, lets in-flight ones
/// finish and still reports its partial result.
///
/// # Example
///
/// ```no_run
/// use gfi_sweep::{SweepConfig, Sweeper, cancel_on_signal};
///
/// # async fn example(config: SweepConfig) -> gfi_sweep::Result<()> {
/// let sweeper = Sweeper::new(config)?;
/// tokio::spawn(cancel_on_signal(sweeper.cancellation_token()));
///
/// let report = sweeper.run().await;
/// println!("cancelled: {}", report.result.cancelled);
/// # Ok(())
/// # }
/// ```
pub async fn cancel_on_signal(token: CancellationToken) {
    tokio::select! {
        _ = wait_for_signal() => {
            tracing::info!("Stopping sweep after in-flight coordinates");
            token.cancel();
        }
        _ = token.cancelled() => {}
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments (containers, tests)
    match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                _ = sigint.recv() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
            }
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("Received SIGINT signal (Ctrl+C)");
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("Received SIGTERM signal");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "Could not register any signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C signal"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C signal"),
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn cancel_on_signal_returns_when_token_is_cancelled_elsewhere() {
        let token = CancellationToken::new();
        let handle = tokio::spawn(cancel_on_signal(token.clone()));

        token.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("listener should stop once the token is cancelled")
            .unwrap();
    }
}
