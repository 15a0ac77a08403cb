//! Configuration types for gfi-sweep

use crate::error::{Error, Result};
use crate::types::BBox;
use serde::{Deserialize, Serialize};
use std::{path::Path, path::PathBuf, time::Duration};

/// Remote WMS endpoint and request headers
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// WMS base URL (query parameters are appended to it)
    #[serde(default)]
    pub base_url: String,

    /// Layer to query and display
    #[serde(default)]
    pub layer: String,

    /// Cookie header forwarded verbatim on every request (session authentication)
    #[serde(default)]
    pub cookie: Option<String>,

    /// User-Agent header (default: "Mozilla/5.0 (DataGrab/1.0)")
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Optional Referer header; some map front-ends reject requests without one
    #[serde(default)]
    pub referer: Option<String>,

    /// Per-request timeout in seconds (default: 40)
    #[serde(default = "default_timeout", with = "duration_secs_serde")]
    pub timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            layer: String::new(),
            cookie: None,
            user_agent: default_user_agent(),
            referer: None,
            timeout: default_timeout(),
        }
    }
}

/// The raster the pixel coordinates refer to
///
/// Must match the `BBOX`, `WIDTH` and `HEIGHT` of the GetMap request whose
/// image is being probed.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RasterConfig {
    /// Map extent (required)
    #[serde(default)]
    pub bbox: Option<BBox>,

    /// Raster width in pixels (required, positive)
    #[serde(default)]
    pub width: u32,

    /// Raster height in pixels (required, positive)
    #[serde(default)]
    pub height: u32,
}

/// Sampling grid density
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GridConfig {
    /// Samples along X (default: 25)
    #[serde(default = "default_gridx")]
    pub gridx: u32,

    /// Samples along Y (default: 30)
    #[serde(default = "default_gridy")]
    pub gridy: u32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            gridx: default_gridx(),
            gridy: default_gridy(),
        }
    }
}

/// Static GetFeatureInfo parameters shared by both protocol variants
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Spatial reference of the bounding box (default: "EPSG:3857")
    #[serde(default = "default_crs")]
    pub crs: String,

    /// STYLES parameter (default: "predefinito")
    #[serde(default = "default_style")]
    pub style: String,

    /// Output image format (default: "image/png")
    #[serde(default = "default_format")]
    pub format: String,

    /// Request a transparent image (default: true)
    #[serde(default = "default_true")]
    pub transparent: bool,

    /// DPI parameter (default: 96)
    #[serde(default = "default_dpi")]
    pub dpi: u32,

    /// Maximum features per response (default: 1000)
    #[serde(default = "default_feature_count")]
    pub feature_count: u32,

    /// Pixel tolerance for point geometries (default: 60)
    #[serde(default = "default_point_tolerance")]
    pub point_tolerance: u32,

    /// Pixel tolerance for line geometries (default: 20)
    #[serde(default = "default_line_tolerance")]
    pub line_tolerance: u32,

    /// Pixel tolerance for polygon geometries (default: 10)
    #[serde(default = "default_polygon_tolerance")]
    pub polygon_tolerance: u32,

    /// EXCEPTIONS parameter (default: "application/vnd.ogc.se_inimage")
    #[serde(default = "default_exceptions")]
    pub exceptions: String,

    /// INFO_FORMAT parameter (default: "text/html")
    #[serde(default = "default_info_format")]
    pub info_format: String,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            crs: default_crs(),
            style: default_style(),
            format: default_format(),
            transparent: true,
            dpi: default_dpi(),
            feature_count: default_feature_count(),
            point_tolerance: default_point_tolerance(),
            line_tolerance: default_line_tolerance(),
            polygon_tolerance: default_polygon_tolerance(),
            exceptions: default_exceptions(),
            info_format: default_info_format(),
        }
    }
}

/// Response classification
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// A successful, non-empty body counts as feature data if it contains any
    /// of these byte sequences (default: ["lizmapPopup", "<table"])
    #[serde(default = "default_markers")]
    pub markers: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            markers: default_markers(),
        }
    }
}

/// Where and how accepted documents are written
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output directory (default: "./gfi_out")
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,

    /// Artifact file extension without the dot (default: "html")
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Emit a progress marker every N coordinates (default: 50)
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,

    /// Write `summary.json` into the output directory when the sweep ends (default: false)
    #[serde(default)]
    pub summary_json: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            out_dir: default_out_dir(),
            extension: default_extension(),
            progress_interval: default_progress_interval(),
            summary_json: false,
        }
    }
}

/// Request pacing and parallelism
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PacingConfig {
    /// Minimum spacing between two requests in seconds (default: 0.02)
    ///
    /// Shared by all workers, so raising `workers` never raises the request rate
    /// above `1 / delay`.
    #[serde(default = "default_delay", with = "duration_secs_serde")]
    pub delay: Duration,

    /// Coordinates processed concurrently (default: 1 = strictly sequential)
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            delay: default_delay(),
            workers: default_workers(),
        }
    }
}

/// Main configuration for a sweep
///
/// Every section can be omitted from a configuration file; omitted fields take
/// their defaults. `service.base_url`, `service.layer`, `raster.bbox`,
/// `raster.width` and `raster.height` have no usable default and are checked by
/// [`SweepConfig::validate`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Remote endpoint and headers
    #[serde(default)]
    pub service: ServiceConfig,

    /// Raster extent and size
    #[serde(default)]
    pub raster: RasterConfig,

    /// Sampling grid
    #[serde(default)]
    pub grid: GridConfig,

    /// Static query parameters
    #[serde(default)]
    pub query: QueryConfig,

    /// Response classification
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Output settings
    #[serde(default)]
    pub output: OutputConfig,

    /// Pacing and parallelism
    #[serde(default)]
    pub pacing: PacingConfig,
}

impl SweepConfig {
    /// Load a configuration from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("cannot read {}: {e}", path.display()),
            key: None,
        })?;
        serde_json::from_str(&raw).map_err(|e| Error::Config {
            message: format!("cannot parse {}: {e}", path.display()),
            key: None,
        })
    }

    /// Bounding box, or an error if none was configured
    pub fn bbox(&self) -> Result<BBox> {
        self.raster
            .bbox
            .ok_or_else(|| Error::InvalidBBox("a bounding box is required".to_string()))
    }

    /// Check that the configuration can drive a sweep
    ///
    /// Runs before any network activity. Raster and grid sizes fail with
    /// [`Error::InvalidGridConfig`], a missing bounding box with
    /// [`Error::InvalidBBox`], everything else with [`Error::Config`].
    pub fn validate(&self) -> Result<()> {
        let base = self.service.base_url.trim();
        if base.is_empty() {
            return Err(Error::config("service.base_url", "base URL is required"));
        }
        let url = url::Url::parse(base).map_err(|e| {
            Error::config("service.base_url", format!("invalid URL {base:?}: {e}"))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::config(
                "service.base_url",
                format!("unsupported scheme {:?}", url.scheme()),
            ));
        }
        if self.service.layer.trim().is_empty() {
            return Err(Error::config("service.layer", "layer name is required"));
        }
        if self.service.timeout.is_zero() {
            return Err(Error::config("service.timeout", "timeout must be positive"));
        }

        self.bbox()?;
        if self.raster.width == 0 || self.raster.height == 0 {
            return Err(Error::InvalidGridConfig(format!(
                "raster must be at least 1x1 pixels, got {}x{}",
                self.raster.width, self.raster.height
            )));
        }
        if self.grid.gridx == 0 || self.grid.gridy == 0 {
            return Err(Error::InvalidGridConfig(format!(
                "grid must have at least one sample per axis, got {}x{}",
                self.grid.gridx, self.grid.gridy
            )));
        }

        if self.classifier.markers.iter().all(|m| m.is_empty()) {
            return Err(Error::config(
                "classifier.markers",
                "at least one non-empty marker is required",
            ));
        }

        let ext = &self.output.extension;
        if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::config(
                "output.extension",
                format!("extension must be non-empty and alphanumeric, got {ext:?}"),
            ));
        }
        if self.output.progress_interval == 0 {
            return Err(Error::config(
                "output.progress_interval",
                "progress interval must be positive",
            ));
        }
        if self.pacing.workers == 0 {
            return Err(Error::config("pacing.workers", "at least one worker is required"));
        }

        Ok(())
    }
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (DataGrab/1.0)".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(40)
}

fn default_gridx() -> u32 {
    25
}

fn default_gridy() -> u32 {
    30
}

fn default_crs() -> String {
    "EPSG:3857".to_string()
}

fn default_style() -> String {
    "predefinito".to_string()
}

fn default_format() -> String {
    "image/png".to_string()
}

fn default_true() -> bool {
    true
}

fn default_dpi() -> u32 {
    96
}

fn default_feature_count() -> u32 {
    1000
}

fn default_point_tolerance() -> u32 {
    60
}

fn default_line_tolerance() -> u32 {
    20
}

fn default_polygon_tolerance() -> u32 {
    10
}

fn default_exceptions() -> String {
    "application/vnd.ogc.se_inimage".to_string()
}

fn default_info_format() -> String {
    "text/html".to_string()
}

fn default_markers() -> Vec<String> {
    vec!["lizmapPopup".to_string(), "<table".to_string()]
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("./gfi_out")
}

fn default_extension() -> String {
    "html".to_string()
}

fn default_progress_interval() -> u64 {
    50
}

fn default_delay() -> Duration {
    Duration::from_millis(20)
}

fn default_workers() -> usize {
    1
}

// Fractional-seconds Duration serialization helper
mod duration_secs_serde {
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}
