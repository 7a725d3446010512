use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::{is_cell_with_class, ORIGIN};
use crate::model::SubjectInfo;

static TD_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());
static HREF_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

const KEY_CLASS: &str = "tdcriterio";
const VALUE_CLASS: &str = "tddatos";

/// Parse a subject detail page.
///
/// Keys and values are paired by position; the first key cell is the table's
/// title and has no value. Hrefs are resolved against `page_url`.
pub fn parse_detail(html: &str, page_url: &str) -> SubjectInfo {
    let doc = Html::parse_document(html);
    let cells: Vec<ElementRef> = doc.select(&TD_SEL).collect();
    let keys = cells.iter().filter(|c| is_cell_with_class(c, KEY_CLASS));
    let values: Vec<&ElementRef> = cells
        .iter()
        .filter(|c| is_cell_with_class(c, VALUE_CLASS))
        .collect();

    let base = Url::parse(page_url).or_else(|_| Url::parse(ORIGIN)).ok();
    let mut info = SubjectInfo::default();

    for (key, value) in keys.skip(1).zip(values.iter()) {
        let k = key.text().collect::<String>().trim().to_string();
        let v = value.text().collect::<Vec<_>>().join(" ").trim().to_string();
        info.fields.insert(k, v);
    }

    for value in &values {
        for a in value.select(&HREF_SEL) {
            let Some(href) = a.value().attr("href") else { continue };
            let resolved = match &base {
                Some(b) => b.join(href).map(String::from).unwrap_or_else(|_| href.to_string()),
                None => href.to_string(),
            };
            info.links.push(resolved);
        }
    }
    info
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "http://sil.gobernacion.gob.mx/Librerias/pp_ReporteSeguimiento.php?Seguimiento=4137231";

    #[test]
    fn detail_table_pairs_keys_with_values() {
        let html = std::fs::read_to_string("tests/fixtures/detail_page.html").unwrap();
        let info = parse_detail(&html, PAGE);

        assert_eq!(info.fields.len(), 3);
        assert_eq!(info.fields["Tipo de asunto:"], "Iniciativa");
        assert_eq!(
            info.fields["Denominación del asunto:"],
            "Que expide la  Ley  de Inteligencia Artificial"
        );
        assert!(!info.fields.contains_key("Reporte de seguimiento"));
    }

    #[test]
    fn links_are_absolute_and_first_is_asset() {
        let html = std::fs::read_to_string("tests/fixtures/detail_page.html").unwrap();
        let info = parse_detail(&html, PAGE);
        assert_eq!(
            info.links,
            vec![
                "http://sil.gobernacion.gob.mx/Archivos/Documentos/2021/09/asun_4137230_20210901_1630.pdf".to_string(),
                "https://gaceta.diputados.gob.mx/PDF/64/2021/sep/20210901-II.pdf".to_string(),
            ]
        );
        assert_eq!(info.asset_url(), Some(info.links[0].as_str()));
    }

    #[test]
    fn page_without_table_is_empty() {
        let info = parse_detail("<html><body><p>Sin información</p></body></html>", PAGE);
        assert_eq!(info, SubjectInfo::default());
        assert_eq!(info.asset_url(), None);
    }
}
