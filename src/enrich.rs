use anyhow::Result;
use rusqlite::Connection;
use tracing::{debug, warn};

use crate::browser::Browser;
use crate::db;
use crate::model::now;
use crate::parser::detail::parse_detail;
use crate::progress_bar;

pub struct EnrichStats {
    pub total: usize,
    pub filled: usize,
    pub skipped: usize,
}

/// Visit the subject page of every stored record and merge its detail table
/// into `subject_info`. Every run refetches every record.
pub fn fill_subject_info<B: Browser>(conn: &Connection, browser: &mut B) -> Result<EnrichStats> {
    let records = db::fetch_all(conn)?;
    let total = records.len();
    let pb = progress_bar(total)?;
    let mut filled = 0usize;
    let mut skipped = 0usize;

    for stored in records {
        let mut record = stored.record;
        if !record.subject.has_link() {
            warn!(id = stored.id, subject = %record.subject.text, "No subject link, skipping");
            skipped += 1;
            pb.inc(1);
            continue;
        }

        debug!(url = %record.subject.url, "Visiting subject");
        browser.goto(&record.subject.url)?;
        let scraped = parse_detail(browser.content(), browser.url());

        let key = record.key();
        let info = record.subject_info.get_or_insert_with(Default::default);
        info.merge(scraped);
        db::update_subject_info(conn, &key, info, now())?;

        filled += 1;
        pb.inc(1);
    }

    pb.finish_and_clear();
    Ok(EnrichStats {
        total,
        filled,
        skipped,
    })
}
