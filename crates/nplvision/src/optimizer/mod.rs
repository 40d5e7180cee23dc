//! Document optimizer: rasterize, grayscale, optionally downscale, reassemble.
//!
//! Scanned collateral often carries colour noise (stamps, yellowed paper,
//! coloured ink) that hurts text detection. Re-rendering every page as a
//! grayscale bitmap and rebuilding the PDF from those bitmaps gives the
//! recognition service a clean, uniform input.

pub mod assemble;
pub mod page;
pub mod raster;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::GenericImageView;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{OptimizerProfile, OptimizerSettings};
use crate::error::RepairError;
use crate::sanitize;

pub use assemble::ProcessedPage;
pub use raster::{PageRasterizer, PdftoppmRasterizer};

const POINTS_PER_INCH: f32 = 72.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizerConfig {
    pub dpi: u32,
    /// Pages wider than this (in pixels, after rasterization) are downsampled.
    pub max_page_width: Option<u32>,
    /// Parent directory for per-document scratch space. `None` uses the
    /// system temp directory.
    pub scratch_root: Option<PathBuf>,
}

impl OptimizerConfig {
    /// Full 300 DPI renders, no size cap.
    pub fn quality() -> Self {
        Self {
            dpi: 300,
            max_page_width: None,
            scratch_root: None,
        }
    }

    /// Lower DPI and a 1500px width cap, for hosts that can't hold several
    /// full-resolution bitmaps at once.
    pub fn memory_conscious() -> Self {
        Self {
            dpi: 200,
            max_page_width: Some(1500),
            scratch_root: None,
        }
    }

    pub fn from_settings(settings: &OptimizerSettings, scratch_root: Option<PathBuf>) -> Self {
        let base = match settings.profile {
            OptimizerProfile::Quality => Self::quality(),
            OptimizerProfile::MemoryConscious => Self::memory_conscious(),
        };

        Self {
            dpi: settings.dpi.unwrap_or(base.dpi),
            max_page_width: settings.max_page_width.or(base.max_page_width),
            scratch_root,
        }
    }
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::quality()
    }
}

/// Pixel size of an optimized page plus the physical size of the source page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageDimensions {
    pub width: u32,
    pub height: u32,
    pub width_pt: f32,
    pub height_pt: f32,
}

impl PageDimensions {
    /// `rendered_*` is the rasterizer output at `dpi`; the page keeps that
    /// physical size even when the bitmap was downsampled.
    pub fn from_render(
        width: u32,
        height: u32,
        rendered_width: u32,
        rendered_height: u32,
        dpi: u32,
    ) -> Self {
        let scale = POINTS_PER_INCH / dpi as f32;
        Self {
            width,
            height,
            width_pt: rendered_width as f32 * scale,
            height_pt: rendered_height as f32 * scale,
        }
    }
}

/// A freshly written optimized PDF. Its existence means optimization of the
/// source succeeded.
#[derive(Debug, Clone)]
pub struct OptimizedDocument {
    pub path: PathBuf,
    pub pages: Vec<PageDimensions>,
}

impl OptimizedDocument {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

pub struct Optimizer {
    config: OptimizerConfig,
    rasterizer: Arc<dyn PageRasterizer>,
}

impl Optimizer {
    /// Production constructor, rasterizing with poppler.
    pub fn new(config: OptimizerConfig) -> Self {
        Self::with_rasterizer(config, Arc::new(PdftoppmRasterizer::new()))
    }

    pub fn with_rasterizer(config: OptimizerConfig, rasterizer: Arc<dyn PageRasterizer>) -> Self {
        Self { config, rasterizer }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Produces an OCR-friendly copy of `source` at `destination`.
    ///
    /// Scratch files live in a directory owned by this call and are removed
    /// on every return path, so nothing leaks between documents.
    pub fn optimize(
        &self,
        source: &Path,
        destination: &Path,
    ) -> Result<OptimizedDocument, RepairError> {
        let _span = tracing::info_span!(
            "optimizer.optimize",
            filename = %sanitize::redact_path(source),
            dpi = self.config.dpi,
        )
        .entered();

        let scratch = self.create_scratch()?;
        let rendered = self
            .rasterizer
            .rasterize(source, self.config.dpi, scratch.path())?;
        debug!("Rasterized {} pages", rendered.len());

        let mut pages = Vec::with_capacity(rendered.len());
        for (idx, raster_path) in rendered.iter().enumerate() {
            let page_number = idx + 1;
            let image = page::load_page(raster_path, page_number)?;
            let (rendered_width, rendered_height) = image.dimensions();

            let gray = page::normalize_page(&image, self.config.max_page_width);
            drop(image);

            let dimensions = PageDimensions::from_render(
                gray.width(),
                gray.height(),
                rendered_width,
                rendered_height,
                self.config.dpi,
            );

            let page_path = scratch.path().join(format!("page_{}.png", page_number));
            gray.save(&page_path).map_err(|e| RepairError::Page {
                page: page_number,
                message: format!("Failed to save grayscale page: {}", e),
            })?;

            // The colour render is no longer needed; keep scratch usage to
            // roughly one bitmap per page.
            let _ = std::fs::remove_file(raster_path);

            pages.push(ProcessedPage {
                path: page_path,
                dimensions,
            });
        }

        assemble::write_pdf(&pages, destination)?;

        if let Err(e) = scratch.close() {
            warn!("Failed to remove scratch directory: {}", e);
        }

        Ok(OptimizedDocument {
            path: destination.to_path_buf(),
            pages: pages.into_iter().map(|p| p.dimensions).collect(),
        })
    }

    fn create_scratch(&self) -> Result<tempfile::TempDir, RepairError> {
        let builder = {
            let mut builder = tempfile::Builder::new();
            builder.prefix("nplvision-");
            builder
        };

        match &self.config.scratch_root {
            Some(root) => {
                std::fs::create_dir_all(root).map_err(|e| RepairError::Scratch {
                    path: root.clone(),
                    source: e,
                })?;
                builder.tempdir_in(root).map_err(|e| RepairError::Scratch {
                    path: root.clone(),
                    source: e,
                })
            }
            None => builder.tempdir().map_err(|e| RepairError::Scratch {
                path: std::env::temp_dir(),
                source: e,
            }),
        }
    }
}
