//! Test configuration helpers

use gfi_sweep::{BBox, SweepConfig};
use std::path::Path;
use std::time::Duration;

/// Configuration for a `width x height` raster over a matching bounding box
///
/// Pacing is disabled so sweeps finish quickly; tests that exercise pacing set
/// `pacing.delay` themselves.
pub fn sweep_config(out_dir: &Path, width: u32, height: u32, gridx: u32, gridy: u32) -> SweepConfig {
    let mut config = SweepConfig::default();
    config.service.base_url = "http://127.0.0.1:9/wms".to_string();
    config.service.layer = "impianti".to_string();
    config.service.timeout = Duration::from_secs(5);
    config.raster.bbox = Some(
        BBox::new(0.0, 0.0, f64::from(width), f64::from(height))
            .unwrap_or_else(|e| panic!("test bbox must be valid: {e}")),
    );
    config.raster.width = width;
    config.raster.height = height;
    config.grid.gridx = gridx;
    config.grid.gridy = gridy;
    config.pacing.delay = Duration::ZERO;
    config.output.out_dir = out_dir.to_path_buf();
    config
}
