use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use tracing::debug;

/// Language hint passed to the OCR engine. Portal documents are in Spanish.
pub const SOURCE_LANG: &str = "spa";

/// Page rasterisation and image text recognition.
pub trait Ocr {
    /// Render every page of `pdf` as an image inside `out_dir`, in page order.
    fn pdf_to_images(&self, pdf: &Path, out_dir: &Path) -> Result<Vec<PathBuf>>;
    fn image_to_text(&self, image: &Path, lang: &str) -> Result<String>;
}

/// Text of every page of `pdf`, concatenated in page order.
/// Page images live in a scratch directory that is removed before returning.
pub fn pdf_to_text<O: Ocr + ?Sized>(ocr: &O, pdf: &Path, lang: &str) -> Result<String> {
    let scratch = tempfile::tempdir().context("Failed to create scratch directory")?;
    let images = ocr.pdf_to_images(pdf, scratch.path())?;
    debug!(pages = images.len(), pdf = %pdf.display(), "Rendered pages");

    let mut text = String::new();
    for image in &images {
        text.push_str(&ocr.image_to_text(image, lang)?);
    }
    Ok(text)
}

/// `pdftoppm` (poppler) for rendering and `tesseract` for recognition.
pub struct Tesseract {
    pub dpi: u32,
}

impl Default for Tesseract {
    fn default() -> Self {
        Self { dpi: 300 }
    }
}

impl Ocr for Tesseract {
    fn pdf_to_images(&self, pdf: &Path, out_dir: &Path) -> Result<Vec<PathBuf>> {
        let output = Command::new("pdftoppm")
            .arg("-png")
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg(pdf)
            .arg(out_dir.join("page"))
            .output()
            .context("failed to execute pdftoppm")?;
        if !output.status.success() {
            bail!(
                "pdftoppm failed on {}: {}",
                pdf.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let mut pages: Vec<(u32, PathBuf)> = std::fs::read_dir(out_dir)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|x| x == "png"))
            .filter_map(|p| page_number(&p).map(|n| (n, p)))
            .collect();
        pages.sort_by_key(|(n, _)| *n);
        Ok(pages.into_iter().map(|(_, p)| p).collect())
    }

    fn image_to_text(&self, image: &Path, lang: &str) -> Result<String> {
        let output = Command::new("tesseract")
            .arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(lang)
            .output()
            .context("failed to execute tesseract")?;
        if !output.status.success() {
            bail!(
                "tesseract failed on {}: {}",
                image.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// `page-7.png` / `page-07.png` -> 7
fn page_number(path: &Path) -> Option<u32> {
    let stem = path.file_stem()?.to_str()?;
    stem.rsplit('-').next()?.parse().ok()
}
