use std::path::{Path, PathBuf};

use config::Config;
use ini::{Ini, ParseOption, Properties};
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_SECTION: &str = "DEFAULT";
pub const DEFAULT_CONFIG_FILE: &str = "config.ini";

/// Exit status for a configuration section that does not exist.
pub const MISSING_SECTION_EXIT: u8 = 100;

#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("'{section}' section not found in {path:?}")]
    MissingSection { section: String, path: PathBuf },
    #[error("cannot read config file: {0}")]
    Read(#[from] ini::Error),
    #[error("invalid configuration: {0}")]
    Invalid(#[from] config::ConfigError),
}

/// Settings shared by every command. Built once per invocation and read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Options {
    pub query: String,
    pub database_filename: PathBuf,
    pub legislation: String,
    pub document_type: String,
    pub download_dir: PathBuf,
    pub save_into_db: bool,
    pub purge: bool,
    pub verbose: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            query: "\"Inteligencia Artificial\"".into(),
            database_filename: PathBuf::from("iniciativas_ia.sqlite"),
            legislation: "LXIV".into(),
            document_type: "Iniciativa".into(),
            download_dir: PathBuf::from("downloads"),
            save_into_db: true,
            purge: false,
            verbose: false,
        }
    }
}

/// Command-line values. `None` leaves the configured value in place.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub query: Option<String>,
    pub database_filename: Option<PathBuf>,
    pub legislation: Option<String>,
    pub document_type: Option<String>,
    pub download_dir: Option<PathBuf>,
    pub save_into_db: Option<bool>,
    pub purge: Option<bool>,
    pub verbose: Option<bool>,
}

impl Options {
    pub fn with_overrides(self, o: Overrides) -> Self {
        Self {
            query: o.query.unwrap_or(self.query),
            database_filename: o.database_filename.unwrap_or(self.database_filename),
            legislation: o.legislation.unwrap_or(self.legislation),
            document_type: o.document_type.unwrap_or(self.document_type),
            download_dir: o.download_dir.unwrap_or(self.download_dir),
            save_into_db: o.save_into_db.unwrap_or(self.save_into_db),
            purge: o.purge.unwrap_or(self.purge),
            verbose: o.verbose.unwrap_or(self.verbose),
        }
    }
}

/// Read `section` from the INI file at `path`.
///
/// Values are taken literally, quotes included. A named section inherits any
/// key it does not set from [`DEFAULT_SECTION`]. A missing file yields the
/// defaults. A missing section is an error unless it is [`DEFAULT_SECTION`].
pub fn load(path: &Path, section: &str) -> Result<Options, OptionsError> {
    let ini = if path.exists() {
        Ini::load_from_file_opt(path, literal_values())?
    } else {
        Ini::new()
    };

    let defaults = find_section(&ini, DEFAULT_SECTION);
    let named = if section.eq_ignore_ascii_case(DEFAULT_SECTION) {
        None
    } else {
        Some(
            find_section(&ini, section).ok_or_else(|| OptionsError::MissingSection {
                section: section.to_string(),
                path: path.to_path_buf(),
            })?,
        )
    };

    let mut builder = Config::builder();
    for props in defaults.into_iter().chain(named) {
        for (key, value) in props.iter() {
            builder = builder.set_override(key.to_ascii_lowercase(), value)?;
        }
    }
    Ok(builder.build()?.try_deserialize()?)
}

fn literal_values() -> ParseOption {
    ParseOption {
        enabled_quote: false,
        enabled_escape: false,
        ..ParseOption::default()
    }
}

fn find_section<'a>(ini: &'a Ini, name: &str) -> Option<&'a Properties> {
    ini.iter()
        .find(|(s, _)| s.is_some_and(|s| s.eq_ignore_ascii_case(name)))
        .map(|(_, props)| props)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn ini(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::Builder::new().suffix(".ini").tempfile().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let opts = load(&dir.path().join("nope.ini"), DEFAULT_SECTION).unwrap();
        assert_eq!(opts, Options::default());
    }

    #[test]
    fn reads_named_section_with_typed_values() {
        let f = ini(
            "[DEFAULT]\nlegislation = LXIV\n\n[lxv]\nquery = blockchain\nlegislation = LXV\nsave_into_db = false\ndownload_dir = /tmp/pdfs\n",
        );
        let opts = load(f.path(), "lxv").unwrap();
        assert_eq!(opts.query, "blockchain");
        assert_eq!(opts.legislation, "LXV");
        assert!(!opts.save_into_db);
        assert_eq!(opts.download_dir, PathBuf::from("/tmp/pdfs"));
        assert_eq!(opts.document_type, "Iniciativa");
    }

    #[test]
    fn named_section_inherits_default_keys() {
        let f = ini(
            "[DEFAULT]\nquery = robotica\ndatabase_filename = shared.sqlite\n\n[lxv]\nlegislation = LXV\n",
        );
        let opts = load(f.path(), "lxv").unwrap();
        assert_eq!(opts.query, "robotica");
        assert_eq!(opts.database_filename, PathBuf::from("shared.sqlite"));
        assert_eq!(opts.legislation, "LXV");

        let base = load(f.path(), DEFAULT_SECTION).unwrap();
        assert_eq!(base.legislation, "LXIV");
        assert_eq!(base.query, "robotica");
    }

    #[test]
    fn quoted_values_keep_their_quotes() {
        let f = ini("[DEFAULT]\nquery = \"Inteligencia Artificial\"\n\n[frase]\nquery = \"X Y\"\n");
        assert_eq!(load(f.path(), "frase").unwrap().query, "\"X Y\"");
        assert_eq!(load(f.path(), DEFAULT_SECTION).unwrap(), Options::default());
    }

    #[test]
    fn keys_and_section_names_ignore_case() {
        let f = ini("[Produccion]\nSave_Into_DB = false\n");
        assert!(!load(f.path(), "produccion").unwrap().save_into_db);
    }

    #[test]
    fn missing_section_is_reported() {
        let f = ini("[DEFAULT]\nquery = x\n");
        let err = load(f.path(), "produccion").unwrap_err();
        assert!(matches!(err, OptionsError::MissingSection { ref section, .. } if section == "produccion"));
    }

    #[test]
    fn overrides_win_over_file_values() {
        let opts = Options::default().with_overrides(Overrides {
            query: Some("robótica".into()),
            save_into_db: Some(false),
            ..Default::default()
        });
        assert_eq!(opts.query, "robótica");
        assert!(!opts.save_into_db);
        assert_eq!(opts.legislation, "LXIV");
    }
}
