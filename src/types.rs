//! Core types for gfi-sweep

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::path::PathBuf;

use crate::error::{Error, TransportError};

/// Device-pixel position `(i, j)` within the sampled raster
///
/// `i` is the column (X axis), `j` the row (Y axis).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coordinate {
    /// Pixel column
    pub i: u32,
    /// Pixel row
    pub j: u32,
}

impl Coordinate {
    /// Create a new Coordinate
    pub fn new(i: u32, j: u32) -> Self {
        Self { i, j }
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "I={} J={}", self.i, self.j)
    }
}

/// WMS protocol version used for a GetFeatureInfo attempt
///
/// Variants are ordered: [`ProtocolVariant::V1_3_0`] is always tried first and
/// [`ProtocolVariant::V1_1_1`] is the fallback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProtocolVariant {
    /// WMS 1.3.0 (`CRS`, `I`/`J` pixel parameters)
    #[serde(rename = "1.3.0")]
    V1_3_0,
    /// WMS 1.1.1 (`SRS`, `X`/`Y` pixel parameters)
    #[serde(rename = "1.1.1")]
    V1_1_1,
}

impl ProtocolVariant {
    /// The variant every coordinate is attempted with first
    pub fn primary() -> Self {
        ProtocolVariant::V1_3_0
    }

    /// The variant to try after this one fails, if any
    pub fn fallback(self) -> Option<Self> {
        match self {
            ProtocolVariant::V1_3_0 => Some(ProtocolVariant::V1_1_1),
            ProtocolVariant::V1_1_1 => None,
        }
    }

    /// Value of the `VERSION` request parameter
    pub fn version(self) -> &'static str {
        match self {
            ProtocolVariant::V1_3_0 => "1.3.0",
            ProtocolVariant::V1_1_1 => "1.1.1",
        }
    }

    /// Short tag used in artifact file names
    pub fn tag(self) -> &'static str {
        match self {
            ProtocolVariant::V1_3_0 => "v13",
            ProtocolVariant::V1_1_1 => "v111",
        }
    }

    /// Name of the spatial reference parameter
    pub fn srs_param(self) -> &'static str {
        match self {
            ProtocolVariant::V1_3_0 => "CRS",
            ProtocolVariant::V1_1_1 => "SRS",
        }
    }
}

impl std::fmt::Display for ProtocolVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.version())
    }
}

/// Bounding box `(minx, miny, maxx, maxy)` in the configured planar reference system
///
/// A `BBox` can only be constructed with four finite values and a non-empty
/// extent, so holders never need to re-validate it. It serializes as the
/// `"minx,miny,maxx,maxy"` string used on the command line.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BBox {
    minx: f64,
    miny: f64,
    maxx: f64,
    maxy: f64,
}

impl BBox {
    /// Create a bounding box, rejecting non-finite or degenerate extents
    pub fn new(minx: f64, miny: f64, maxx: f64, maxy: f64) -> crate::Result<Self> {
        if ![minx, miny, maxx, maxy].iter().all(|v| v.is_finite()) {
            return Err(Error::InvalidBBox(
                "all four components must be finite numbers".to_string(),
            ));
        }
        if minx >= maxx || miny >= maxy {
            return Err(Error::InvalidBBox(format!(
                "expected minx < maxx and miny < maxy, got {minx},{miny},{maxx},{maxy}"
            )));
        }
        Ok(Self {
            minx,
            miny,
            maxx,
            maxy,
        })
    }

    /// Minimum X
    pub fn minx(&self) -> f64 {
        self.minx
    }

    /// Minimum Y
    pub fn miny(&self) -> f64 {
        self.miny
    }

    /// Maximum X
    pub fn maxx(&self) -> f64 {
        self.maxx
    }

    /// Maximum Y
    pub fn maxy(&self) -> f64 {
        self.maxy
    }
}

impl std::fmt::Display for BBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{},{},{}", self.minx, self.miny, self.maxx, self.maxy)
    }
}

impl std::str::FromStr for BBox {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(Error::InvalidBBox(format!(
                "expected minx,miny,maxx,maxy but got {} component(s) in {s:?}",
                parts.len()
            )));
        }

        let mut values = [0.0_f64; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| Error::InvalidBBox(format!("{part:?} is not a number")))?;
        }

        BBox::new(values[0], values[1], values[2], values[3])
    }
}

impl TryFrom<String> for BBox {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BBox> for String {
    fn from(bbox: BBox) -> Self {
        bbox.to_string()
    }
}

/// What a sweep probes: one layer rendered into one raster
///
/// Mirrors the `LAYERS`, `BBOX`, `WIDTH` and `HEIGHT` of the GetMap request
/// whose pixels are being queried.
#[derive(Clone, Debug, PartialEq)]
pub struct SweepTarget {
    /// Layer to query
    pub layer: String,
    /// Map extent of the raster
    pub bbox: BBox,
    /// Raster width in pixels
    pub width: u32,
    /// Raster height in pixels
    pub height: u32,
}

/// MD5 digest of a response body, used as the deduplication key
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(pub [u8; 16]);

impl Fingerprint {
    /// Fingerprint the exact byte sequence of a response body
    pub fn of(body: &[u8]) -> Self {
        Self(md5::compute(body).0)
    }

    /// Lowercase hex representation (32 characters)
    pub fn to_hex(&self) -> String {
        use std::fmt::Write;
        self.0.iter().fold(String::with_capacity(32), |mut out, b| {
            let _ = write!(out, "{b:02x}");
            out
        })
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Fingerprint({})", self.to_hex())
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// Outcome of one GetFeatureInfo attempt, or of a whole coordinate once resolved
#[derive(Clone, Debug, PartialEq)]
pub enum ResponseOutcome {
    /// Valid feature document not seen before in this sweep
    Accepted {
        /// Variant that produced the document
        variant: ProtocolVariant,
        /// Content fingerprint
        fingerprint: Fingerprint,
        /// Raw response body
        body: Vec<u8>,
    },
    /// Valid feature document already seen in this sweep
    Duplicate {
        /// Variant that produced the document
        variant: ProtocolVariant,
        /// Fingerprint of the repeated document
        fingerprint: Fingerprint,
    },
    /// Successful response with a whitespace-only body
    Empty {
        /// Variant that produced the response
        variant: ProtocolVariant,
    },
    /// Non-success status or a body without any feature marker
    Invalid {
        /// Variant that produced the response
        variant: ProtocolVariant,
        /// HTTP status code of the response
        status: u16,
    },
    /// The request did not complete
    TransportError {
        /// Variant that was attempted
        variant: ProtocolVariant,
        /// What went wrong
        error: TransportError,
    },
}

impl ResponseOutcome {
    /// Variant this outcome belongs to
    pub fn variant(&self) -> ProtocolVariant {
        match self {
            ResponseOutcome::Accepted { variant, .. }
            | ResponseOutcome::Duplicate { variant, .. }
            | ResponseOutcome::Empty { variant }
            | ResponseOutcome::Invalid { variant, .. }
            | ResponseOutcome::TransportError { variant, .. } => *variant,
        }
    }

    /// Whether this outcome resolves the coordinate with a new document
    pub fn is_accepted(&self) -> bool {
        matches!(self, ResponseOutcome::Accepted { .. })
    }

    /// Short label for logging
    pub fn label(&self) -> &'static str {
        match self {
            ResponseOutcome::Accepted { .. } => "accepted",
            ResponseOutcome::Duplicate { .. } => "duplicate",
            ResponseOutcome::Empty { .. } => "empty",
            ResponseOutcome::Invalid { .. } => "invalid",
            ResponseOutcome::TransportError { .. } => "transport_error",
        }
    }
}

/// Aggregate counters for one sweep
///
/// Attempt-level counters (`duplicates`, `empty`, `invalid`, `transport_errors`)
/// count individual requests, so a coordinate that fails both variants adds two.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SweepResult {
    /// Number of coordinates in the grid
    pub total: u64,
    /// Number of coordinates fully processed
    pub processed: u64,
    /// Unique documents persisted
    pub hits: u64,
    /// Requests issued
    pub attempts: u64,
    /// Attempts that returned an already-seen document
    pub duplicates: u64,
    /// Attempts that returned an empty body
    pub empty: u64,
    /// Attempts with a non-success status or no feature marker
    pub invalid: u64,
    /// Attempts that failed at the transport level
    pub transport_errors: u64,
    /// Whether the sweep was stopped by cancellation before finishing the grid
    pub cancelled: bool,
    /// Directory holding the persisted documents
    pub output_dir: PathBuf,
    /// When the sweep started
    pub started_at: DateTime<Utc>,
    /// When the sweep finished
    pub finished_at: DateTime<Utc>,
}

/// Events emitted by a sweep
///
/// Subscribers receive these through [`crate::Sweeper::subscribe`].
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Sweep started
    SweepStarted {
        /// Coordinates to process
        total: u64,
        /// Size of the worker pool
        workers: usize,
    },

    /// A unique document was persisted
    Hit {
        /// Coordinates processed so far, including this one
        done: u64,
        /// Coordinates in the grid
        total: u64,
        /// Where the document was found
        coordinate: Coordinate,
        /// Variant that produced it
        variant: ProtocolVariant,
        /// Content fingerprint
        fingerprint: Fingerprint,
        /// Artifact path
        path: PathBuf,
    },

    /// Periodic progress marker
    Progress {
        /// Coordinates processed so far
        done: u64,
        /// Coordinates in the grid
        total: u64,
        /// Unique documents persisted so far
        hits: u64,
    },

    /// Sweep finished, failed or was cancelled
    SweepFinished {
        /// Final counters
        result: SweepResult,
    },
}
