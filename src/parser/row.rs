use std::sync::LazyLock;

use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

use super::onclick::cell_link;
use super::{cell_text, is_cell_with_class};
use crate::model::{LinkedText, Record, SOURCE_DATE_FORMAT};

static ROW_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table tr").unwrap());

/// Data rows carry exactly this many `tddatos*` cells. Anything else is layout.
pub const DATA_COLUMNS: usize = 12;
const DATA_CLASS: &str = "tddatos";

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("invalid presentation date {value:?} (expected DD/MM/YYYY)")]
    Date { value: String },
    #[error("invalid row number {value:?}")]
    Number { value: String },
}

/// Parse every data row on a results page, in document order.
pub fn parse_rows(html: &str) -> Result<Vec<Record>, ParseError> {
    let doc = Html::parse_document(html);
    let mut records = Vec::new();
    for row in doc.select(&ROW_SEL) {
        if let Some(record) = parse_row(row)? {
            records.push(record);
        }
    }
    Ok(records)
}

/// `Ok(None)` for rows that are not data rows.
pub fn parse_row(row: ElementRef) -> Result<Option<Record>, ParseError> {
    let cells: Vec<ElementRef> = row
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|el| is_cell_with_class(el, DATA_CLASS))
        .collect();
    if cells.len() != DATA_COLUMNS {
        return Ok(None);
    }

    let text: Vec<String> = cells.iter().map(|c| cell_text(*c)).collect();
    let linked = |i: usize| LinkedText::new(text[i].clone(), cell_link(cells[i]));

    let num: i64 = text[0]
        .parse()
        .map_err(|_| ParseError::Number { value: text[0].clone() })?;
    let presented_date = NaiveDate::parse_from_str(&text[5], SOURCE_DATE_FORMAT)
        .map_err(|_| ParseError::Date { value: text[5].clone() })?;

    Ok(Some(Record {
        num,
        subject_type: text[1].clone(),
        subject: linked(2),
        classification: text[3].clone(),
        presented_in: text[4].clone(),
        presented_date,
        presented_by: linked(6),
        party: text[7].clone(),
        legislation: text[8].clone(),
        turn_to: linked(9),
        status: linked(10),
        topic: text[11].clone(),
        subject_info: None,
        pdf_url: None,
        pdf_filename: None,
        text_filename: None,
        created: None,
        modified: None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ORIGIN;

    fn fixture() -> String {
        std::fs::read_to_string("tests/fixtures/results_page1.html").unwrap()
    }

    fn row_html(cells: &[&str]) -> String {
        let tds: String = cells
            .iter()
            .map(|c| format!("<td class=\"tddatos\">{}</td>", c))
            .collect();
        format!("<html><body><table><tr>{}</tr></table></body></html>", tds)
    }

    #[test]
    fn results_page_rows() {
        let records = parse_rows(&fixture()).unwrap();
        assert_eq!(records.len(), 2);

        let r = &records[0];
        assert_eq!(r.num, 1);
        assert_eq!(r.subject_type, "Iniciativa");
        assert_eq!(r.subject.text, "Ley de IA");
        assert_eq!(r.presented_date, NaiveDate::from_ymd_opt(2021, 9, 1).unwrap());
        assert_eq!(r.party, "MORENA");
        assert_eq!(r.legislation, "LXIV");
        assert_eq!(r.topic, "Tecnología");
        for link in [&r.subject, &r.presented_by, &r.turn_to, &r.status] {
            assert!(link.url.starts_with(ORIGIN), "{:?}", link);
        }
        assert_eq!(
            r.presented_by.url,
            "http://sil.gobernacion.gob.mx/Librerias/pp_PerfilLegislador.php?SID=&Referencia=9221"
        );
    }

    #[test]
    fn missing_links_degrade_to_empty_url() {
        let records = parse_rows(&fixture()).unwrap();
        let r = &records[1];
        assert_eq!(r.presented_by.text, "Dip. María López");
        assert_eq!(r.presented_by.url, "");
        assert_eq!(r.status.text, "Dictaminada");
        assert_eq!(r.status.url, "");
        assert!(r.subject.has_link());
    }

    #[test]
    fn layout_rows_are_skipped() {
        let eleven = row_html(&["1"; 11]);
        assert!(parse_rows(&eleven).unwrap().is_empty());
        let thirteen = row_html(&["1"; 13]);
        assert!(parse_rows(&thirteen).unwrap().is_empty());
    }

    #[test]
    fn foreign_link_targets_are_dropped() {
        let html = row_html(&[
            "3",
            "Iniciativa",
            r#"<a onclick='window.open("http://other.host/x")'>Ley</a>"#,
            "c",
            "p",
            "01/09/2021",
            r#"<a onclick='mUtil.winLeft("//other.host/x",1,1)'>Dip</a>"#,
            "PAN",
            "LXIV",
            r#"<a onclick='window.open("/Librerias/pp_Comision.php?C=1")'>Com</a>"#,
            "Pend",
            "T",
        ]);
        let r = &parse_rows(&html).unwrap()[0];
        assert_eq!(r.subject, LinkedText::new("Ley", ""));
        assert_eq!(r.presented_by, LinkedText::new("Dip", ""));
        assert_eq!(r.turn_to.url, format!("{}/Librerias/pp_Comision.php?C=1", ORIGIN));
    }

    #[test]
    fn bad_date_is_an_error() {
        let html = row_html(&[
            "1", "Iniciativa", "Ley", "c", "p", "2021-09-01", "Dip", "PAN", "LXIV", "Com", "Pend", "T",
        ]);
        let err = parse_rows(&html).unwrap_err();
        assert!(matches!(err, ParseError::Date { value } if value == "2021-09-01"));
    }

    #[test]
    fn plain_row_without_links() {
        let html = row_html(&[
            "7", "Iniciativa", "Ley", "c", "p", "15/02/2020", "Dip", "PAN", "LXIV", "Com", "Pend", "T",
        ]);
        let records = parse_rows(&html).unwrap();
        assert_eq!(records[0].num, 7);
        assert_eq!(records[0].subject, LinkedText::new("Ley", ""));
        assert_eq!(records[0].presented_date, NaiveDate::from_ymd_opt(2020, 2, 15).unwrap());
    }
}
