use anyhow::Result;
use rusqlite::Connection;
use tracing::{debug, warn};

use crate::db;
use crate::model::{now, Record};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Inserted,
    Updated,
}

/// Insert-or-update of crawled records against the store, by natural key.
///
/// A record seen for the first time is stored whole. A record already stored
/// only has its `status` and `modified` refreshed. With `save` off the decision
/// is made and counted but nothing is written.
pub struct Reconciler<'c> {
    conn: &'c Connection,
    save: bool,
    inserted: usize,
    updated: usize,
}

impl<'c> Reconciler<'c> {
    pub fn new(conn: &'c Connection, save: bool) -> Self {
        Self {
            conn,
            save,
            inserted: 0,
            updated: 0,
        }
    }

    /// Empty the store before a fresh crawl. A dry run writes nothing, so the
    /// request is only reported. Returns how many records were removed.
    pub fn purge(&self) -> Result<usize> {
        if !self.save {
            warn!("Dry run: purge requested but the store is left untouched");
            return Ok(0);
        }
        let removed = db::purge(self.conn)?;
        warn!("Purged {} records from the store", removed);
        Ok(removed)
    }

    pub fn reconcile(&mut self, mut record: Record) -> Result<Outcome> {
        let key = record.key();
        let outcome = match db::find_by_key(self.conn, &key)? {
            Some(existing) => {
                debug!(id = existing.id, subject = %key.subject, "Record already present, updating status");
                if self.save {
                    db::update_status(self.conn, &key, &record.status, now())?;
                }
                self.updated += 1;
                Outcome::Updated
            }
            None => {
                debug!(subject = %key.subject, "New record");
                if self.save {
                    record.stamp_created(now());
                    db::insert_record(self.conn, &record)?;
                }
                self.inserted += 1;
                Outcome::Inserted
            }
        };
        Ok(outcome)
    }

    pub fn inserted(&self) -> usize {
        self.inserted
    }

    pub fn updated(&self) -> usize {
        self.updated
    }
}
