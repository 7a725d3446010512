pub mod detail;
pub mod onclick;
pub mod pager;
pub mod row;

use std::sync::LazyLock;

use scraper::ElementRef;
use url::Url;

/// Every relative address on the portal is rooted here.
pub const ORIGIN: &str = "http://sil.gobernacion.gob.mx";

static ORIGIN_URL: LazyLock<Url> = LazyLock::new(|| Url::parse(ORIGIN).unwrap());

/// Resolve a portal-relative path against [`ORIGIN`]. Absolute addresses pass through.
pub fn rebase(path: &str) -> Option<String> {
    ORIGIN_URL.join(path.trim()).ok().map(String::from)
}

/// Like [`rebase`], but only addresses on the portal itself are kept.
pub fn rooted(path: &str) -> Option<String> {
    ORIGIN_URL
        .join(path.trim())
        .ok()
        .filter(|url| url.origin() == ORIGIN_URL.origin())
        .map(String::from)
}

/// Text of a data cell: text nodes joined by single spaces, NBSPs removed, trimmed.
pub fn cell_text(cell: ElementRef) -> String {
    cell.text()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('\u{a0}', "")
        .trim()
        .to_string()
}

/// True for `<td>` elements whose class attribute starts with `prefix`.
pub fn is_cell_with_class(el: &ElementRef, prefix: &str) -> bool {
    el.value().name() == "td"
        && el
            .value()
            .attr("class")
            .is_some_and(|c| c.starts_with(prefix))
}
