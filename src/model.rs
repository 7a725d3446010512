use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Date format used by the portal's result table.
pub const SOURCE_DATE_FORMAT: &str = "%d/%m/%Y";
/// Date format used for keys and filenames.
pub const STORE_DATE_FORMAT: &str = "%Y-%m-%d";

/// A label that may also link to a detail page. `url` is empty when the cell carried no link.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedText {
    pub text: String,
    #[serde(default)]
    pub url: String,
}

impl LinkedText {
    pub fn new(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            url: url.into(),
        }
    }

    pub fn has_link(&self) -> bool {
        !self.url.is_empty()
    }
}

/// Key/value table scraped from a subject detail page, plus every outbound link found in it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectInfo {
    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,
    #[serde(default)]
    pub links: Vec<String>,
}

impl SubjectInfo {
    /// The attached document, if the detail page linked one.
    pub fn asset_url(&self) -> Option<&str> {
        self.links.first().map(String::as_str)
    }

    /// Upsert `other`'s fields over ours; links are replaced wholesale.
    pub fn merge(&mut self, other: SubjectInfo) {
        self.fields.extend(other.fields);
        self.links = other.links;
    }
}

/// One legislative initiative as listed in the search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Row ordinal on the results page. Not stable across runs.
    pub num: i64,
    pub subject_type: String,
    pub subject: LinkedText,
    pub classification: String,
    pub presented_in: String,
    pub presented_date: NaiveDate,
    pub presented_by: LinkedText,
    pub party: String,
    pub legislation: String,
    pub turn_to: LinkedText,
    pub status: LinkedText,
    pub topic: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_info: Option<SubjectInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_filename: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<NaiveDateTime>,
}

impl Record {
    pub fn key(&self) -> NaturalKey {
        NaturalKey {
            subject: self.subject.text.clone(),
            presented_date: self.presented_date,
            presented_by: self.presented_by.text.clone(),
        }
    }

    /// Set both timestamps, as done on first insert.
    pub fn stamp_created(&mut self, now: NaiveDateTime) {
        self.created = Some(now);
        self.modified = Some(now);
    }
}

/// The (subject, date, sponsor) triple that identifies a record across crawls.
///
/// Matching is exact text equality; whitespace or encoding variants of the
/// same initiative are distinct keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NaturalKey {
    pub subject: String,
    pub presented_date: NaiveDate,
    pub presented_by: String,
}

impl NaturalKey {
    pub fn date_text(&self) -> String {
        self.presented_date.format(STORE_DATE_FORMAT).to_string()
    }
}

/// A record together with the store's row id.
#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub id: i64,
    pub record: Record,
}

/// Where an attached document was fetched from and where its files live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetProvenance {
    pub pdf_url: String,
    pub pdf_filename: String,
    pub text_filename: String,
}

pub fn now() -> NaiveDateTime {
    chrono::Local::now().naive_local()
}

#[cfg(test)]
pub(crate) fn sample_record(subject: &str, date: (i32, u32, u32), sponsor: &str) -> Record {
    Record {
        num: 1,
        subject_type: "Iniciativa".into(),
        subject: LinkedText::new(subject, "http://sil.gobernacion.gob.mx/Librerias/pp_ReporteSeguimiento.php?Seguimiento=1"),
        classification: "Con proyecto de decreto".into(),
        presented_in: "Cámara de Diputados".into(),
        presented_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
        presented_by: LinkedText::new(sponsor, ""),
        party: "MORENA".into(),
        legislation: "LXIV".into(),
        turn_to: LinkedText::new("Comisión de Ciencia", ""),
        status: LinkedText::new("Pendiente", ""),
        topic: "Tecnología".into(),
        subject_info: None,
        pdf_url: None,
        pdf_filename: None,
        text_filename: None,
        created: None,
        modified: None,
    }
}
