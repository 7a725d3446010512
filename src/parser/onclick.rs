use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Selector};

use super::rooted;

static HANDLER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^(window\.open|mUtil\.winLeft)\("([^"]+)""#).unwrap());
static ONCLICK_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[onclick]").unwrap());

/// The script call behind a link-bearing cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OnClick {
    /// `window.open("<path>", ...)`
    WindowOpen(String),
    /// `mUtil.winLeft("<path>", ...)`
    WinLeft(String),
    /// Any other handler. Treated as "no link".
    Unrecognized,
}

impl OnClick {
    pub fn parse(handler: &str) -> Self {
        let Some(caps) = HANDLER_RE.captures(handler.trim_start()) else {
            return Self::Unrecognized;
        };
        let path = caps[2].to_string();
        match &caps[1] {
            "window.open" => Self::WindowOpen(path),
            _ => Self::WinLeft(path),
        }
    }

    pub fn path(&self) -> Option<&str> {
        match self {
            Self::WindowOpen(p) | Self::WinLeft(p) => Some(p),
            Self::Unrecognized => None,
        }
    }
}

/// Absolute URL of the first `onclick` anchor in `cell`, or empty when there is none,
/// its handler is not one of the known calls, or its path leaves the portal.
pub fn cell_link(cell: ElementRef) -> String {
    cell.select(&ONCLICK_SEL)
        .next()
        .and_then(|a| a.value().attr("onclick"))
        .map(OnClick::parse)
        .and_then(|h| h.path().and_then(rooted))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn window_open() {
        let h = OnClick::parse(r#"window.open("/Librerias/pp_Comision.php?Comision=5","Ventana","width=600")"#);
        assert_eq!(h, OnClick::WindowOpen("/Librerias/pp_Comision.php?Comision=5".into()));
    }

    #[test]
    fn win_left() {
        let h = OnClick::parse(r#"mUtil.winLeft("/Librerias/pp_PerfilLegislador.php?Referencia=9",500,400);return false;"#);
        assert_eq!(h.path(), Some("/Librerias/pp_PerfilLegislador.php?Referencia=9"));
        assert!(matches!(h, OnClick::WinLeft(_)));
    }

    #[test]
    fn other_handlers_are_unrecognized() {
        assert_eq!(OnClick::parse("alert('hola')"), OnClick::Unrecognized);
        assert_eq!(OnClick::parse("window.open('/single/quotes')"), OnClick::Unrecognized);
        assert_eq!(OnClick::parse(""), OnClick::Unrecognized);
        assert_eq!(OnClick::Unrecognized.path(), None);
    }

    fn first_td(html: &str) -> String {
        let doc = Html::parse_fragment(&format!("<table><tr>{}</tr></table>", html));
        let td = doc.select(&Selector::parse("td").unwrap()).next().unwrap();
        cell_link(td)
    }

    #[test]
    fn cell_link_rebases_onto_origin() {
        let url = first_td(r##"<td><a href="#" onclick='window.open("/Librerias/x.php?a=1&amp;b=2")'>X</a></td>"##);
        assert_eq!(url, "http://sil.gobernacion.gob.mx/Librerias/x.php?a=1&b=2");
    }

    #[test]
    fn cell_link_missing_or_unknown_is_empty() {
        assert_eq!(first_td("<td>Sin liga</td>"), "");
        assert_eq!(first_td(r#"<td><a href="/x" onclick="doSomething()">X</a></td>"#), "");
    }

    #[test]
    fn cell_link_off_portal_is_empty() {
        assert_eq!(first_td(r#"<td><a onclick='window.open("http://other.host/x.php")'>X</a></td>"#), "");
        assert_eq!(first_td(r#"<td><a onclick='mUtil.winLeft("//other.host/x.php",1,1)'>X</a></td>"#), "");
    }
}
