use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, warn};

use crate::error::RepairError;

const RASTER_PREFIX: &str = "raster";

/// Renders every page of a paged document into bitmap files.
pub trait PageRasterizer: Send + Sync {
    /// Returns the rendered page images in page order. All files are created
    /// inside `scratch`, which the caller owns and removes.
    fn rasterize(&self, source: &Path, dpi: u32, scratch: &Path)
        -> Result<Vec<PathBuf>, RepairError>;
}

/// Rasterizes PDFs with poppler's `pdftoppm`.
#[derive(Debug, Clone, Default)]
pub struct PdftoppmRasterizer;

impl PdftoppmRasterizer {
    pub fn new() -> Self {
        Self
    }
}

impl PageRasterizer for PdftoppmRasterizer {
    fn rasterize(
        &self,
        source: &Path,
        dpi: u32,
        scratch: &Path,
    ) -> Result<Vec<PathBuf>, RepairError> {
        let _span = tracing::info_span!("optimizer.rasterize", dpi).entered();

        std::fs::metadata(source).map_err(|e| RepairError::ReadSource {
            path: source.to_path_buf(),
            source: e,
        })?;

        let page_count = count_pages(source)?;
        if page_count == 0 {
            debug!("Document has no pages, skipping pdftoppm");
            return Ok(Vec::new());
        }

        let prefix = scratch.join(RASTER_PREFIX);
        let output = Command::new("pdftoppm")
            .arg("-png")
            .arg("-r")
            .arg(dpi.to_string())
            .arg(source)
            .arg(&prefix)
            .output()
            .map_err(|e| {
                RepairError::Rasterize(format!(
                    "Failed to run pdftoppm: {}. Make sure poppler-utils is installed.",
                    e
                ))
            })?;

        if !output.status.success() {
            return Err(RepairError::Rasterize(format!(
                "pdftoppm failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let pages = collect_rendered_pages(scratch)?;
        if pages.len() != page_count {
            warn!(
                "pdftoppm rendered {} pages, document reports {}",
                pages.len(),
                page_count
            );
        }
        if pages.is_empty() {
            return Err(RepairError::Rasterize(
                "pdftoppm produced no page images".to_string(),
            ));
        }

        Ok(pages)
    }
}

/// Page count via lopdf, falling back to `pdfinfo` for files lopdf can't parse
/// (broken xref tables are common in scanner output).
fn count_pages(source: &Path) -> Result<usize, RepairError> {
    match lopdf::Document::load(source) {
        Ok(doc) => Ok(doc.get_pages().len()),
        Err(e) => {
            warn!("lopdf failed to parse document: {}. Asking pdfinfo.", e);
            count_pages_with_pdfinfo(source)
        }
    }
}

fn count_pages_with_pdfinfo(source: &Path) -> Result<usize, RepairError> {
    let output = Command::new("pdfinfo").arg(source).output().map_err(|e| {
        RepairError::Rasterize(format!(
            "Failed to run pdfinfo: {}. Make sure poppler-utils is installed.",
            e
        ))
    })?;

    if !output.status.success() {
        return Err(RepairError::Rasterize(format!(
            "pdfinfo failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    parse_pdfinfo_pages(&String::from_utf8_lossy(&output.stdout)).ok_or_else(|| {
        RepairError::Rasterize("pdfinfo output has no page count".to_string())
    })
}

fn parse_pdfinfo_pages(stdout: &str) -> Option<usize> {
    stdout
        .lines()
        .filter_map(|line| line.strip_prefix("Pages:"))
        .find_map(|count| count.trim().parse::<usize>().ok())
}

/// pdftoppm names pages `<prefix>-<n>.png`, zero-padding `n` to the width of
/// the last page number, so order by the parsed number rather than the name.
fn collect_rendered_pages(scratch: &Path) -> Result<Vec<PathBuf>, RepairError> {
    let entries = std::fs::read_dir(scratch).map_err(|e| RepairError::Scratch {
        path: scratch.to_path_buf(),
        source: e,
    })?;

    let mut pages: Vec<(u32, PathBuf)> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter_map(|path| {
            let name = path.file_name()?.to_str()?;
            rendered_page_number(name).map(|n| (n, path.clone()))
        })
        .collect();

    pages.sort_by_key(|(n, _)| *n);
    Ok(pages.into_iter().map(|(_, path)| path).collect())
}

fn rendered_page_number(file_name: &str) -> Option<u32> {
    file_name
        .strip_prefix(RASTER_PREFIX)?
        .strip_prefix('-')?
        .strip_suffix(".png")?
        .parse()
        .ok()
}
