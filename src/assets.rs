use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client;
use rusqlite::Connection;
use tracing::{debug, info};

use crate::db;
use crate::model::{now, AssetProvenance, Record, STORE_DATE_FORMAT};
use crate::ocr::{self, Ocr};
use crate::progress_bar;

const SUBJECT_PREFIX_CHARS: usize = 30;

/// Fetches a remote document to a local path.
pub trait Downloader {
    fn download(&self, url: &str, dest: &Path) -> Result<()>;
}

impl Downloader for Client {
    /// Streams into `<dest>.part` and renames on success, so an interrupted
    /// download never leaves a file at `dest`.
    fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let mut response = self
            .get(url)
            .send()
            .with_context(|| format!("Failed to download {}", url))?;
        if !response.status().is_success() {
            bail!("Failed to download {}: HTTP {}", url, response.status());
        }
        let partial = dest.with_extension("part");
        let mut file = File::create(&partial)
            .with_context(|| format!("Failed to create {}", partial.display()))?;
        response.copy_to(&mut file)?;
        drop(file);
        fs::rename(&partial, dest)?;
        Ok(())
    }
}

/// Local PDF and text paths for a record's attached document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPaths {
    pub pdf: PathBuf,
    pub text: PathBuf,
}

/// `<date>-<first 30 chars of subject>-<sponsor>.{pdf,txt}` under `dir`.
/// Depends only on the record's identity, never on the document content.
pub fn asset_paths(dir: &Path, record: &Record) -> AssetPaths {
    let subject: String = record.subject.text.chars().take(SUBJECT_PREFIX_CHARS).collect();
    let stem = format!(
        "{}-{}-{}",
        record.presented_date.format(STORE_DATE_FORMAT),
        subject,
        record.presented_by.text
    )
    .replace(['/', '\\'], "_");
    AssetPaths {
        pdf: dir.join(format!("{}.pdf", stem)),
        text: dir.join(format!("{}.txt", stem)),
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct AssetStats {
    pub downloaded: usize,
    pub extracted: usize,
    /// Records without a linked document.
    pub ineligible: usize,
    /// Records whose provenance fields were written.
    pub refreshed: usize,
}

/// Download and OCR the attached document of every stored record that has one.
///
/// Files that already exist are trusted and never refetched or re-read, but the
/// provenance fields are always rewritten, which also bumps `modified`.
pub fn download_assets<D, O>(
    conn: &Connection,
    dir: &Path,
    downloader: &D,
    engine: &O,
) -> Result<AssetStats>
where
    D: Downloader + ?Sized,
    O: Ocr + ?Sized,
{
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let records = db::fetch_all(conn)?;
    let pb = progress_bar(records.len())?;
    let mut stats = AssetStats::default();

    for stored in records {
        pb.inc(1);
        let Some(url) = stored
            .record
            .subject_info
            .as_ref()
            .and_then(|i| i.asset_url())
        else {
            stats.ineligible += 1;
            continue;
        };
        let paths = asset_paths(dir, &stored.record);

        if paths.pdf.exists() {
            debug!(path = %paths.pdf.display(), "PDF already present");
        } else {
            info!("Downloading {} -> {}", url, paths.pdf.display());
            downloader.download(url, &paths.pdf)?;
            stats.downloaded += 1;
        }

        if paths.text.exists() {
            debug!(path = %paths.text.display(), "Text already present");
        } else {
            info!("Extracting text from {}", paths.pdf.display());
            let text = ocr::pdf_to_text(engine, &paths.pdf, ocr::SOURCE_LANG)?;
            fs::write(&paths.text, text)
                .with_context(|| format!("Failed to write {}", paths.text.display()))?;
            stats.extracted += 1;
        }

        let provenance = AssetProvenance {
            pdf_url: url.to_string(),
            pdf_filename: paths.pdf.display().to_string(),
            text_filename: paths.text.display().to_string(),
        };
        db::update_assets(conn, stored.id, &provenance, now())?;
        stats.refreshed += 1;
    }

    pb.finish_and_clear();
    Ok(stats)
}
