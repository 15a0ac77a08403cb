//! Persistence and progress reporting
//!
//! Accepted documents are written to `gfi_{J}_{I}_{tag}_{hash}.{ext}`. Writes
//! go to a hidden `.partial` file first and are renamed into place, so an
//! interrupted sweep never leaves a truncated artifact under its final name.

use std::path::{Path, PathBuf};

use crate::config::OutputConfig;
use crate::error::{Error, Result};
use crate::session::SweepSession;
use crate::types::{Coordinate, Event, Fingerprint, ProtocolVariant, SweepResult};

/// Name of the optional machine-readable summary written next to the artifacts
pub const SUMMARY_FILE_NAME: &str = "summary.json";

/// Artifact file name for a document
///
/// The row (`J`) comes before the column (`I`).
pub fn file_name(
    coordinate: Coordinate,
    variant: ProtocolVariant,
    fingerprint: &Fingerprint,
    extension: &str,
) -> String {
    format!(
        "gfi_{}_{}_{}_{}.{}",
        coordinate.j,
        coordinate.i,
        variant.tag(),
        fingerprint.to_hex(),
        extension
    )
}

/// Writes accepted documents and reports progress
#[derive(Clone, Debug)]
pub struct ResultSink {
    out_dir: PathBuf,
    extension: String,
    progress_interval: u64,
}

impl ResultSink {
    /// Create a sink from output settings
    pub fn new(config: &OutputConfig) -> Self {
        Self {
            out_dir: config.out_dir.clone(),
            extension: config.extension.clone(),
            progress_interval: config.progress_interval.max(1),
        }
    }

    /// Output directory
    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Write `body` verbatim and return the artifact path
    ///
    /// The output directory is created on first use. Any I/O failure is
    /// returned as [`Error::Persist`].
    pub async fn persist(
        &self,
        coordinate: Coordinate,
        variant: ProtocolVariant,
        fingerprint: &Fingerprint,
        body: &[u8],
    ) -> Result<PathBuf> {
        let name = file_name(coordinate, variant, fingerprint, &self.extension);
        let path = self.out_dir.join(&name);
        let partial = self.out_dir.join(format!(".{name}.partial"));

        let persist_err = |source| Error::Persist {
            path: path.clone(),
            source,
        };

        tokio::fs::create_dir_all(&self.out_dir)
            .await
            .map_err(persist_err)?;

        if let Err(source) = tokio::fs::write(&partial, body).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(persist_err(source));
        }
        if let Err(source) = tokio::fs::rename(&partial, &path).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(persist_err(source));
        }

        tracing::debug!(path = %path.display(), bytes = body.len(), "Document persisted");
        Ok(path)
    }

    /// Announce a persisted document
    pub fn report_hit(
        &self,
        session: &SweepSession,
        done: u64,
        coordinate: Coordinate,
        variant: ProtocolVariant,
        fingerprint: Fingerprint,
        path: PathBuf,
    ) {
        tracing::info!(
            done,
            total = session.total(),
            %coordinate,
            %variant,
            path = %path.display(),
            "Hit"
        );
        session.emit(Event::Hit {
            done,
            total: session.total(),
            coordinate,
            variant,
            fingerprint,
            path,
        });
    }

    /// Emit a progress marker if `done` lands on the reporting interval
    ///
    /// Returns whether a marker was emitted.
    pub fn report_progress(&self, session: &SweepSession, done: u64) -> bool {
        if done == 0 || done % self.progress_interval != 0 {
            return false;
        }
        let hits = session.hits();
        tracing::info!(done, total = session.total(), hits, "Progress");
        session.emit(Event::Progress {
            done,
            total: session.total(),
            hits,
        });
        true
    }

    /// Emit the final summary
    pub fn report_summary(&self, session: &SweepSession, result: &SweepResult) {
        tracing::info!(
            hits = result.hits,
            processed = result.processed,
            total = result.total,
            attempts = result.attempts,
            duplicates = result.duplicates,
            cancelled = result.cancelled,
            out_dir = %result.output_dir.display(),
            "Sweep finished"
        );
        session.emit(Event::SweepFinished {
            result: result.clone(),
        });
    }

    /// Write `summary.json` into the output directory
    pub async fn write_summary(&self, result: &SweepResult) -> Result<PathBuf> {
        let path = self.out_dir.join(SUMMARY_FILE_NAME);
        let json = serde_json::to_vec_pretty(result)?;

        tokio::fs::create_dir_all(&self.out_dir)
            .await
            .map_err(|source| Error::Persist {
                path: path.clone(),
                source,
            })?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|source| Error::Persist {
                path: path.clone(),
                source,
            })?;

        Ok(path)
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::sync::broadcast;

    fn sink(dir: &Path) -> ResultSink {
        ResultSink::new(&OutputConfig {
            out_dir: dir.to_path_buf(),
            progress_interval: 3,
            ..OutputConfig::default()
        })
    }

    #[test]
    fn file_name_puts_row_before_column() {
        let fp = Fingerprint::of(b"");
        assert_eq!(
            file_name(Coordinate::new(25, 75), ProtocolVariant::V1_3_0, &fp, "html"),
            "gfi_75_25_v13_d41d8cd98f00b204e9800998ecf8427e.html"
        );
        assert_eq!(
            file_name(Coordinate::new(1, 2), ProtocolVariant::V1_1_1, &fp, "xml"),
            "gfi_2_1_v111_d41d8cd98f00b204e9800998ecf8427e.xml"
        );
    }

    #[tokio::test]
    async fn persist_writes_body_verbatim_and_creates_directory() {
        let temp = TempDir::new().unwrap();
        let out = temp.path().join("nested").join("out");
        let sink = sink(&out);
        let body = b"<table>\xff raw bytes</table>".to_vec();
        let fp = Fingerprint::of(&body);

        let path = sink
            .persist(Coordinate::new(3, 4), ProtocolVariant::V1_3_0, &fp, &body)
            .await
            .unwrap();

        assert_eq!(path.parent().unwrap(), out);
        assert_eq!(std::fs::read(&path).unwrap(), body);

        let names: Vec<String> = std::fs::read_dir(&out)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![format!("gfi_4_3_v13_{}.html", fp.to_hex())]);
    }

    #[tokio::test]
    async fn persist_into_a_file_path_fails_with_persist_error() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();
        let sink = sink(&blocker);

        let err = sink
            .persist(
                Coordinate::new(0, 0),
                ProtocolVariant::V1_3_0,
                &Fingerprint::of(b"a"),
                b"a",
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Persist { .. }), "got {err:?}");
        assert!(!err.is_configuration());
    }

    #[tokio::test]
    async fn progress_fires_on_the_interval_only() {
        let temp = TempDir::new().unwrap();
        let sink = sink(temp.path());
        let (tx, mut rx) = broadcast::channel(16);
        let session = SweepSession::new(10, tx);

        let fired: Vec<u64> = (0..=10)
            .filter(|done| sink.report_progress(&session, *done))
            .collect();
        assert_eq!(fired, vec![3, 6, 9]);

        match rx.recv().await.unwrap() {
            Event::Progress { done, total, .. } => assert_eq!((done, total), (3, 10)),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn hit_and_summary_are_published() {
        let temp = TempDir::new().unwrap();
        let sink = sink(temp.path());
        let (tx, mut rx) = broadcast::channel(16);
        let session = SweepSession::new(2, tx);

        sink.report_hit(
            &session,
            1,
            Coordinate::new(5, 6),
            ProtocolVariant::V1_1_1,
            Fingerprint::of(b"doc"),
            temp.path().join("doc.html"),
        );
        let result = session.result(temp.path().to_path_buf(), false);
        sink.report_summary(&session, &result);

        match rx.recv().await.unwrap() {
            Event::Hit {
                coordinate,
                variant,
                ..
            } => {
                assert_eq!(coordinate, Coordinate::new(5, 6));
                assert_eq!(variant, ProtocolVariant::V1_1_1);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        match rx.recv().await.unwrap() {
            Event::SweepFinished { result: published } => assert_eq!(published, result),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn summary_json_contains_counters() {
        let temp = TempDir::new().unwrap();
        let sink = sink(temp.path());
        let (tx, _rx) = broadcast::channel(1);
        let session = SweepSession::new(7, tx);
        session.record_processed();
        session.record_hit();

        let path = sink
            .write_summary(&session.result(temp.path().to_path_buf(), false))
            .await
            .unwrap();
        assert_eq!(path.file_name().unwrap(), SUMMARY_FILE_NAME);

        let json: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(json["total"], 7);
        assert_eq!(json["processed"], 1);
        assert_eq!(json["hits"], 1);
        assert_eq!(json["cancelled"], false);
    }
}
