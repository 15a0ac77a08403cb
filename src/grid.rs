//! Pixel grid generation
//!
//! The raster is split into `gridx × gridy` cells and the center pixel of each
//! cell is sampled. Coordinates are produced row by row (Y outer, X inner) so
//! progress reads top to bottom.

use crate::config::{GridConfig, RasterConfig};
use crate::error::{Error, Result};
use crate::types::Coordinate;

/// Ordered, restartable sequence of pixel coordinates to sample
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GridGenerator {
    xs: Vec<u32>,
    ys: Vec<u32>,
}

impl GridGenerator {
    /// Build the grid for a `width × height` raster sampled `gridx × gridy` times
    ///
    /// All four values must be positive; otherwise this fails with
    /// [`Error::InvalidGridConfig`].
    pub fn new(width: u32, height: u32, gridx: u32, gridy: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidGridConfig(format!(
                "raster must be at least 1x1 pixels, got {width}x{height}"
            )));
        }
        if gridx == 0 || gridy == 0 {
            return Err(Error::InvalidGridConfig(format!(
                "grid must have at least one sample per axis, got {gridx}x{gridy}"
            )));
        }

        Ok(Self {
            xs: cell_centers(width, gridx),
            ys: cell_centers(height, gridy),
        })
    }

    /// Build the grid from configuration sections
    pub fn from_config(raster: &RasterConfig, grid: &GridConfig) -> Result<Self> {
        Self::new(raster.width, raster.height, grid.gridx, grid.gridy)
    }

    /// Sampled pixel columns, left to right
    pub fn xs(&self) -> &[u32] {
        &self.xs
    }

    /// Sampled pixel rows, top to bottom
    pub fn ys(&self) -> &[u32] {
        &self.ys
    }

    /// Number of coordinates (`gridx * gridy`)
    pub fn len(&self) -> usize {
        self.xs.len() * self.ys.len()
    }

    /// Always false for a constructed grid
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Coordinates in row-major order
    pub fn iter(&self) -> impl Iterator<Item = Coordinate> + '_ {
        self.ys
            .iter()
            .flat_map(move |&j| self.xs.iter().map(move |&i| Coordinate::new(i, j)))
    }
}

/// `round((k + 0.5) * extent / cells)` for each cell, kept inside `[0, extent)`
///
/// Ties round to even, matching the usual "round half to even" of the float
/// value; clamping only matters when there are more cells than pixels.
fn cell_centers(extent: u32, cells: u32) -> Vec<u32> {
    // Multiply before dividing: `(k + 0.5) * extent` is exact, so the only
    // rounding is the division and exact half-pixel ties survive it
    (0..cells)
        .map(|k| {
            let center = ((f64::from(k) + 0.5) * f64::from(extent) / f64::from(cells))
                .round_ties_even();
            (center as u32).min(extent - 1)
        })
        .collect()
}
