use std::sync::LazyLock;

use scraper::{Html, Selector};

use super::rebase;

static ANCHOR_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static STRONG_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("strong").unwrap());

/// Continuation markers the portal puts inside the "next page" anchor.
const NEXT_MARKERS: &[char] = &['»', '>'];

/// Absolute address of the next results page, if the page has one.
pub fn next_page(html: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    doc.select(&ANCHOR_SEL)
        .find(|a| {
            a.select(&STRONG_SEL)
                .any(|s| s.text().any(|t| t.contains(NEXT_MARKERS)))
        })
        .and_then(|a| a.value().attr("href"))
        .and_then(rebase)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_next_link_and_ignores_previous() {
        let html = std::fs::read_to_string("tests/fixtures/results_page1.html").unwrap();
        assert_eq!(
            next_page(&html).as_deref(),
            Some("http://sil.gobernacion.gob.mx/Busquedas/Avanzada/ResultadosBusquedaAvanzada.php?SID=abc&Pagina=2")
        );
    }

    #[test]
    fn last_page_has_no_next() {
        let html = std::fs::read_to_string("tests/fixtures/results_page2.html").unwrap();
        assert_eq!(next_page(&html), None);
    }

    #[test]
    fn marker_outside_strong_does_not_count() {
        let html = r#"<a href="/p?2">Siguiente &raquo;</a><a href="/p?3"><strong>&gt;&gt;</strong></a>"#;
        assert_eq!(next_page(html).as_deref(), Some("http://sil.gobernacion.gob.mx/p?3"));
    }
}
