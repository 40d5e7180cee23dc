use std::path::{Path, PathBuf};

use lopdf::{dictionary, Document, Object, ObjectId, Stream};

use crate::error::RepairError;
use crate::optimizer::PageDimensions;

/// A normalized page image waiting to be placed in the optimized document.
pub struct ProcessedPage {
    pub path: PathBuf,
    pub dimensions: PageDimensions,
}

/// Writes the pages, in order, into a new PDF at `destination`. Each page is a
/// single full-bleed `DeviceGray` image sized to the source page's physical
/// dimensions.
///
/// Pages are decoded one at a time, so at most one uncompressed bitmap is
/// alive. The encoded image streams of every page stay in the document, and
/// the serialized output is buffered whole before it is written.
pub fn write_pdf(pages: &[ProcessedPage], destination: &Path) -> Result<(), RepairError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut page_ids: Vec<ObjectId> = Vec::with_capacity(pages.len());
    for (idx, page) in pages.iter().enumerate() {
        let page_id = add_page(&mut doc, pages_id, page, idx + 1)?;
        page_ids.push(page_id);
    }

    let kids: Vec<Object> = page_ids.iter().map(|id| (*id).into()).collect();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_ids.len() as i64,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| RepairError::Assemble(e.to_string()))?;

    write_atomically(destination, &buffer)
}

fn add_page(
    doc: &mut Document,
    pages_id: ObjectId,
    page: &ProcessedPage,
    page_number: usize,
) -> Result<ObjectId, RepairError> {
    let gray = image::open(&page.path)
        .map_err(|e| RepairError::Page {
            page: page_number,
            message: format!("Failed to reload processed page: {}", e),
        })?
        .into_luma8();

    let (width, height) = gray.dimensions();
    let mut image_stream = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => width as i64,
            "Height" => height as i64,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        },
        gray.into_raw(),
    );
    // Raw samples are kept if compression fails; the page is still valid.
    let _ = image_stream.compress();
    let image_id = doc.add_object(image_stream);

    let resources_id = doc.add_object(dictionary! {
        "XObject" => dictionary! {
            "Im0" => image_id,
        },
    });

    let width_pt = page.dimensions.width_pt;
    let height_pt = page.dimensions.height_pt;
    let content = format!(
        "q\n{:.2} 0 0 {:.2} 0 0 cm\n/Im0 Do\nQ\n",
        width_pt, height_pt
    );
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), width_pt.into(), height_pt.into()],
        "Resources" => resources_id,
        "Contents" => content_id,
    });

    Ok(page_id)
}

/// Writes next to the destination and renames, so a failed write never leaves
/// a truncated optimized document behind.
fn write_atomically(destination: &Path, bytes: &[u8]) -> Result<(), RepairError> {
    if let Some(parent) = destination.parent() {
        std::fs::create_dir_all(parent).map_err(|e| RepairError::WriteOutput {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    let partial = destination.with_extension("pdf.partial");
    if let Err(e) = std::fs::write(&partial, bytes) {
        let _ = std::fs::remove_file(&partial);
        return Err(RepairError::WriteOutput {
            path: partial,
            source: e,
        });
    }

    std::fs::rename(&partial, destination).map_err(|e| {
        let _ = std::fs::remove_file(&partial);
        RepairError::WriteOutput {
            path: destination.to_path_buf(),
            source: e,
        }
    })
}
