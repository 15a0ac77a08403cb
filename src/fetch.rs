//! Per-coordinate fetch with protocol fallback
//!
//! Each coordinate goes through a small state machine:
//!
//! ```text
//! Attempt(1.3.0) --accepted--------------------------> Resolved
//!      |
//!      +--empty / invalid / duplicate / transport--> Attempt(1.1.1) --any--> Resolved
//! ```
//!
//! Failed attempts are returned as [`ResponseOutcome`] values and never raised,
//! so a coordinate can only ever resolve to "one new document" or "nothing".

use std::sync::Arc;

use crate::config::ClassifierConfig;
use crate::dedup::Offer;
use crate::pacer::RequestPacer;
use crate::query::QueryBuilder;
use crate::session::SweepSession;
use crate::transport::{Transport, TransportResponse};
use crate::types::{Coordinate, ProtocolVariant, ResponseOutcome, SweepTarget};

/// How a raw response looks before deduplication
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Classification {
    /// Successful, non-empty and carries a feature marker
    Candidate,
    /// Successful but whitespace-only
    Empty,
    /// Non-success status, or no feature marker in the body
    Invalid {
        /// HTTP status code
        status: u16,
    },
}

/// Heuristic "does this response contain feature data" check
///
/// A body qualifies if the status is 2xx, it is not whitespace-only and it
/// contains at least one marker (a popup container class or an HTML table).
/// The check is deliberately loose: stray HTML with a table is accepted rather
/// than risking a missed feature.
#[derive(Clone, Debug)]
pub struct Classifier {
    markers: Vec<Vec<u8>>,
}

impl Classifier {
    /// Create a classifier from configuration
    pub fn new(config: &ClassifierConfig) -> Self {
        Self {
            markers: config
                .markers
                .iter()
                .filter(|m| !m.is_empty())
                .map(|m| m.as_bytes().to_vec())
                .collect(),
        }
    }

    /// Classify one response
    pub fn classify(&self, response: &TransportResponse) -> Classification {
        if !response.is_success() {
            return Classification::Invalid {
                status: response.status,
            };
        }
        if response.body.iter().all(u8::is_ascii_whitespace) {
            return Classification::Empty;
        }
        if self
            .markers
            .iter()
            .any(|marker| contains(&response.body, marker))
        {
            Classification::Candidate
        } else {
            Classification::Invalid {
                status: response.status,
            }
        }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(&ClassifierConfig::default())
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Where the fallback state machine currently is
enum AttemptState {
    Attempt(ProtocolVariant),
    Resolved(ResponseOutcome),
}

/// Resolves one coordinate to a [`ResponseOutcome`]
pub struct FetchOrchestrator {
    transport: Arc<dyn Transport>,
    builder: QueryBuilder,
    classifier: Classifier,
    pacer: RequestPacer,
}

impl FetchOrchestrator {
    /// Create an orchestrator
    ///
    /// `pacer` is consulted before every request, so pass the same pacer to
    /// every orchestrator that talks to one service.
    pub fn new(
        transport: Arc<dyn Transport>,
        builder: QueryBuilder,
        classifier: Classifier,
        pacer: RequestPacer,
    ) -> Self {
        Self {
            transport,
            builder,
            classifier,
            pacer,
        }
    }

    /// Resolve `coordinate`, trying the primary protocol variant then its fallback
    ///
    /// Returns `Accepted` from the first attempt that yields a new document;
    /// otherwise the outcome of the last attempt. Every attempt is counted in
    /// `session`, and accepted bodies are registered in its dedup store.
    pub async fn fetch(
        &self,
        session: &SweepSession,
        target: &SweepTarget,
        coordinate: Coordinate,
    ) -> ResponseOutcome {
        let mut state = AttemptState::Attempt(ProtocolVariant::primary());

        loop {
            state = match state {
                AttemptState::Attempt(variant) => {
                    let outcome = self.attempt(session, target, coordinate, variant).await;
                    session.record_attempt(&outcome);

                    match variant.fallback() {
                        Some(next) if !outcome.is_accepted() => {
                            tracing::debug!(
                                %coordinate,
                                from = %variant,
                                to = %next,
                                outcome = outcome.label(),
                                "Falling back to next protocol version"
                            );
                            AttemptState::Attempt(next)
                        }
                        _ => AttemptState::Resolved(outcome),
                    }
                }
                AttemptState::Resolved(outcome) => return outcome,
            };
        }
    }

    async fn attempt(
        &self,
        session: &SweepSession,
        target: &SweepTarget,
        coordinate: Coordinate,
        variant: ProtocolVariant,
    ) -> ResponseOutcome {
        let request = self.builder.build(
            &target.layer,
            &target.bbox,
            target.width,
            target.height,
            coordinate,
            variant,
        );

        self.pacer.acquire().await;

        let response = match self.transport.send(&request).await {
            Ok(response) => response,
            Err(error) => {
                tracing::debug!(
                    %coordinate,
                    %variant,
                    transport = self.transport.name(),
                    error = %error,
                    "Request failed"
                );
                return ResponseOutcome::TransportError { variant, error };
            }
        };

        match self.classifier.classify(&response) {
            Classification::Empty => ResponseOutcome::Empty { variant },
            Classification::Invalid { status } => {
                tracing::trace!(%coordinate, %variant, status, "No feature data in response");
                ResponseOutcome::Invalid { variant, status }
            }
            Classification::Candidate => match session.dedup().offer(&response.body) {
                Offer::New(fingerprint) => ResponseOutcome::Accepted {
                    variant,
                    fingerprint,
                    body: response.body,
                },
                Offer::Duplicate(fingerprint) => {
                    tracing::trace!(%coordinate, %variant, %fingerprint, "Duplicate document");
                    ResponseOutcome::Duplicate {
                        variant,
                        fingerprint,
                    }
                }
            },
        }
    }
}
