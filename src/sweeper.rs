//! Sweep driver
//!
//! Walks the grid in row-major order, resolves each coordinate through the
//! [`FetchOrchestrator`] and hands accepted documents to the [`ResultSink`].
//! With `pacing.workers > 1` coordinates run on a bounded pool; the pacer,
//! dedup store and counters are shared so the observable behavior matches the
//! sequential sweep apart from hit order.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::SweepConfig;
use crate::error::{Error, Result};
use crate::fetch::{Classifier, FetchOrchestrator};
use crate::grid::GridGenerator;
use crate::pacer::RequestPacer;
use crate::query::QueryBuilder;
use crate::session::SweepSession;
use crate::sink::ResultSink;
use crate::transport::{HttpTransport, Transport};
use crate::types::{Coordinate, Event, ResponseOutcome, SweepResult, SweepTarget};

/// Outcome of [`Sweeper::run`]
///
/// A sweep always produces counters, even when it stopped early on a fatal
/// error, so callers can report what was saved before failing.
#[derive(Debug)]
pub struct SweepReport {
    /// Counters at the time the sweep stopped
    pub result: SweepResult,
    /// Fatal error that stopped the sweep, if any
    pub error: Option<Error>,
}

impl SweepReport {
    /// Turn the report into a `Result`, dropping the partial counters on error
    pub fn into_result(self) -> Result<SweepResult> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.result),
        }
    }
}

/// Runs GetFeatureInfo sweeps over a pixel grid
pub struct Sweeper {
    config: SweepConfig,
    grid: GridGenerator,
    target: SweepTarget,
    orchestrator: FetchOrchestrator,
    sink: ResultSink,
    event_tx: broadcast::Sender<Event>,
    cancel_token: CancellationToken,
}

impl Sweeper {
    /// Create a sweeper talking to the configured WMS over HTTP
    ///
    /// The configuration is validated first, so a malformed bounding box or
    /// grid fails here without any network activity.
    pub fn new(config: SweepConfig) -> Result<Self> {
        config.validate()?;
        let transport = Arc::new(HttpTransport::new(&config.service)?);
        Self::assemble(config, transport)
    }

    /// Create a sweeper using a custom [`Transport`]
    pub fn with_transport(config: SweepConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;
        Self::assemble(config, transport)
    }

    fn assemble(config: SweepConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        let grid = GridGenerator::from_config(&config.raster, &config.grid)?;
        let target = SweepTarget {
            layer: config.service.layer.clone(),
            bbox: config.bbox()?,
            width: config.raster.width,
            height: config.raster.height,
        };
        let pacer = RequestPacer::new(config.pacing.delay);
        tracing::debug!(
            interval = ?pacer.interval(),
            transport = transport.name(),
            "Request pacing configured"
        );
        let orchestrator = FetchOrchestrator::new(
            transport,
            QueryBuilder::new(config.query.clone()),
            Classifier::new(&config.classifier),
            pacer,
        );
        let sink = ResultSink::new(&config.output);
        let (event_tx, _rx) = broadcast::channel(1024);

        Ok(Self {
            config,
            grid,
            target,
            orchestrator,
            sink,
            event_tx,
            cancel_token: CancellationToken::new(),
        })
    }

    /// Subscribe to sweep events
    ///
    /// Events sent before subscribing are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Token that stops the sweep between coordinates when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// Effective configuration
    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// Coordinates that will be visited
    pub fn grid(&self) -> &GridGenerator {
        &self.grid
    }

    /// Run one sweep over the whole grid
    ///
    /// Each call starts from an empty dedup store. Transport failures and
    /// responses without feature data are absorbed; only a persistence failure
    /// stops the sweep early, and it is returned in [`SweepReport::error`]
    /// alongside the counters gathered up to that point.
    pub async fn run(&self) -> SweepReport {
        let total = self.grid.len() as u64;
        let workers = self.config.pacing.workers.max(1);
        let session = SweepSession::new(total, self.event_tx.clone());

        tracing::info!(
            total,
            workers,
            layer = %self.target.layer,
            bbox = %self.target.bbox,
            out_dir = %self.sink.out_dir().display(),
            "Starting sweep"
        );
        session.emit(Event::SweepStarted { total, workers });

        // After a fatal error no new coordinate starts, but in-flight ones are
        // drained so none is dropped halfway through a write
        let aborted = AtomicBool::new(false);
        let mut error = None;
        {
            let mut pending = stream::iter(self.grid.iter())
                .take_while(|_| {
                    let stop = aborted.load(Ordering::SeqCst) || self.cancel_token.is_cancelled();
                    futures::future::ready(!stop)
                })
                .map(|coordinate| self.process(&session, coordinate))
                .buffer_unordered(workers);

            while let Some(step) = pending.next().await {
                if let Err(e) = step {
                    if error.is_none() {
                        tracing::error!(error = %e, "Sweep aborted");
                        aborted.store(true, Ordering::SeqCst);
                        error = Some(e);
                    } else {
                        tracing::error!(error = %e, "Further failure while draining");
                    }
                }
            }
        }

        let cancelled = self.cancel_token.is_cancelled() && session.processed() < total;
        if cancelled {
            tracing::warn!(
                processed = session.processed(),
                total,
                "Sweep cancelled before the grid was exhausted"
            );
        }

        let result = session.result(self.sink.out_dir().to_path_buf(), cancelled);

        if self.config.output.summary_json {
            match self.sink.write_summary(&result).await {
                Ok(path) => tracing::debug!(path = %path.display(), "Summary written"),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to write summary");
                    if error.is_none() {
                        error = Some(e);
                    }
                }
            }
        }

        self.sink.report_summary(&session, &result);
        SweepReport { result, error }
    }

    async fn process(&self, session: &SweepSession, coordinate: Coordinate) -> Result<()> {
        let outcome = self
            .orchestrator
            .fetch(session, &self.target, coordinate)
            .await;

        let done = match outcome {
            ResponseOutcome::Accepted {
                variant,
                fingerprint,
                body,
            } => {
                let path = self
                    .sink
                    .persist(coordinate, variant, &fingerprint, &body)
                    .await?;
                session.record_hit();
                let done = session.record_processed();
                self.sink
                    .report_hit(session, done, coordinate, variant, fingerprint, path);
                done
            }
            other => {
                tracing::debug!(%coordinate, outcome = other.label(), "No new document");
                session.record_processed()
            }
        };

        self.sink.report_progress(session, done);
        Ok(())
    }
}
