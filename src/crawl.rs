use anyhow::Result;
use tracing::{debug, info, warn};

use crate::browser::Browser;
use crate::model::Record;
use crate::options::Options;
use crate::parser::{pager, row};

pub const SEARCH_URL: &str = "http://sil.gobernacion.gob.mx/Busquedas/Avanzada/avanzada.php";

const LEGISLATION_SELECT: &str = "select#LEGISLATURA";
const DOCUMENT_TYPE_SELECT: &str = "select#tipo";
const QUERY_INPUT: &str = r#"input[name="VALOR_TEXTO"]"#;
const SUBMIT_BUTTON: &str = r#"input[type="image"][value="Continuar"]"#;

/// Fill and submit the advanced search form. Returns the first results page address.
pub fn open_search<B: Browser>(browser: &mut B, opts: &Options) -> Result<String> {
    info!("Visiting: {}", SEARCH_URL);
    browser.goto(SEARCH_URL)?;
    debug!(
        legislation = %opts.legislation,
        document_type = %opts.document_type,
        query = %opts.query,
        "Filling search form"
    );
    browser.select_option(LEGISLATION_SELECT, &opts.legislation)?;
    browser.select_option(DOCUMENT_TYPE_SELECT, &opts.document_type)?;
    browser.fill(QUERY_INPUT, &opts.query)?;
    browser.click_popup(SUBMIT_BUTTON)
}

/// Walks the result set one page at a time, following "next page" links until
/// a page has none. Each item is the parsed rows of one page; the first error ends
/// the walk.
pub struct Pages<'b, B: Browser> {
    browser: &'b mut B,
    next: Option<String>,
    visited: usize,
}

impl<'b, B: Browser> Pages<'b, B> {
    pub fn new(browser: &'b mut B, first: String) -> Self {
        Self {
            browser,
            next: Some(first),
            visited: 0,
        }
    }

    pub fn visited(&self) -> usize {
        self.visited
    }

    fn visit(&mut self, url: &str) -> Result<Vec<Record>> {
        info!("Visiting page with results: {}", url);
        self.browser.goto(url)?;
        self.visited += 1;

        let html = self.browser.content();
        let records = row::parse_rows(html)?;
        debug!(rows = records.len(), page = self.visited, "Parsed results page");

        self.next = pager::next_page(html).filter(|next| {
            if next == url {
                warn!("Next page link points back to {}; stopping", url);
                false
            } else {
                true
            }
        });
        Ok(records)
    }
}

impl<B: Browser> Iterator for Pages<'_, B> {
    type Item = Result<Vec<Record>>;

    fn next(&mut self) -> Option<Self::Item> {
        let url = self.next.take()?;
        Some(self.visit(&url))
    }
}
