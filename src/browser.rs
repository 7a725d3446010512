use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use reqwest::blocking::{Client, RequestBuilder};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

const USER_AGENT: &str = "sil_scraper/0.1";
const TIMEOUT_SECS: u64 = 120;

static OPTION_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("option").unwrap());
static CONTROL_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("input, select, textarea").unwrap());

/// What the crawler needs from a page-rendering engine.
pub trait Browser {
    /// Navigate to `url` and make its markup current.
    fn goto(&mut self, url: &str) -> Result<()>;
    /// Address of the current page.
    fn url(&self) -> &str;
    /// Markup of the current page.
    fn content(&self) -> &str;
    /// Choose the option labelled `label` in the `<select>` matched by `selector`.
    fn select_option(&mut self, selector: &str, label: &str) -> Result<()>;
    /// Type `value` into the control matched by `selector`.
    fn fill(&mut self, selector: &str, value: &str) -> Result<()>;
    /// Click the element matched by `selector` and return the address of the
    /// browsing context the click opens.
    fn click_popup(&mut self, selector: &str) -> Result<String>;
}

/// HTTP client shared by page fetches and document downloads.
pub fn http_client() -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .cookie_store(true)
        .timeout(Duration::from_secs(TIMEOUT_SECS))
        .build()
        .context("Failed to build HTTP client")
}

/// A [`Browser`] over plain HTTP: pages are fetched markup, form interaction is
/// recorded locally and replayed as a form submission on click.
pub struct HttpBrowser {
    client: Client,
    url: Option<Url>,
    html: String,
    /// Pending form values, keyed by control name.
    fields: Vec<(String, String)>,
    /// Page opened by the last `click_popup`, served once to a `goto` of its address.
    popup: Option<(Url, String)>,
}

impl HttpBrowser {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            url: None,
            html: String::new(),
            fields: Vec::new(),
            popup: None,
        }
    }

    fn set_field(&mut self, name: String, value: String) {
        self.fields.retain(|(n, _)| *n != name);
        self.fields.push((name, value));
    }

    /// The request a click on `selector` sends: the enclosing form's controls,
    /// overlaid with pending `select_option`/`fill` values, to the form action.
    fn submission(&self, selector: &str) -> Result<RequestBuilder> {
        let base = self
            .url
            .clone()
            .ok_or_else(|| anyhow!("No page loaded"))?;
        let doc = Html::parse_document(&self.html);
        let button = find(&doc, selector)?;
        let form = button
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|e| e.value().name() == "form")
            .ok_or_else(|| anyhow!("{} is not inside a form", selector))?;

        let mut fields = form_fields(form);
        for (name, value) in &self.fields {
            fields.retain(|(n, _)| n != name);
            fields.push((name.clone(), value.clone()));
        }
        if let Some(name) = button.value().attr("name") {
            if button.value().attr("type") == Some("image") {
                fields.push((format!("{}.x", name), "0".into()));
                fields.push((format!("{}.y", name), "0".into()));
            } else {
                let value = button.value().attr("value").unwrap_or_default();
                fields.push((name.to_string(), value.to_string()));
            }
        }

        let action = match form.value().attr("action").filter(|a| !a.trim().is_empty()) {
            Some(a) => base.join(a)?,
            None => base,
        };
        let post = form
            .value()
            .attr("method")
            .is_some_and(|m| m.eq_ignore_ascii_case("post"));

        debug!(%action, post, fields = fields.len(), "Submitting form");
        Ok(if post {
            self.client.post(action).form(&fields)
        } else {
            let mut url = action;
            url.query_pairs_mut().clear().extend_pairs(&fields);
            self.client.get(url)
        })
    }
}

impl Browser for HttpBrowser {
    fn goto(&mut self, url: &str) -> Result<()> {
        let target = Url::parse(url).with_context(|| format!("Invalid address {:?}", url))?;
        self.fields.clear();

        if let Some((popup_url, body)) = self.popup.take() {
            if popup_url == target {
                self.url = Some(target);
                self.html = body;
                return Ok(());
            }
        }

        debug!(%url, "GET");
        let response = self
            .client
            .get(target)
            .send()
            .with_context(|| format!("Failed to load {}", url))?
            .error_for_status()?;
        self.url = Some(response.url().clone());
        self.html = response.text()?;
        Ok(())
    }

    fn url(&self) -> &str {
        self.url.as_ref().map(Url::as_str).unwrap_or("")
    }

    fn content(&self) -> &str {
        &self.html
    }

    fn select_option(&mut self, selector: &str, label: &str) -> Result<()> {
        let doc = Html::parse_document(&self.html);
        let select = find(&doc, selector)?;
        let name = control_name(select, selector)?;
        let option = select
            .select(&OPTION_SEL)
            .find(|o| o.text().collect::<String>().trim() == label)
            .ok_or_else(|| anyhow!("No option labelled {:?} in {}", label, selector))?;
        let value = option_value(option);
        self.set_field(name, value);
        Ok(())
    }

    fn fill(&mut self, selector: &str, value: &str) -> Result<()> {
        let doc = Html::parse_document(&self.html);
        let name = control_name(find(&doc, selector)?, selector)?;
        self.set_field(name, value.to_string());
        Ok(())
    }

    fn click_popup(&mut self, selector: &str) -> Result<String> {
        let request = self.submission(selector)?;
        let response = request.send().context("Form submission failed")?.error_for_status()?;
        let opened = response.url().clone();
        let body = response.text()?;

        self.popup = Some((opened.clone(), body));
        Ok(opened.to_string())
    }
}

fn find<'a>(doc: &'a Html, selector: &str) -> Result<ElementRef<'a>> {
    let sel = Selector::parse(selector).map_err(|e| anyhow!("Bad selector {}: {}", selector, e))?;
    doc.select(&sel)
        .next()
        .ok_or_else(|| anyhow!("Nothing matches {}", selector))
}

fn control_name(control: ElementRef, selector: &str) -> Result<String> {
    control
        .value()
        .attr("name")
        .map(str::to_string)
        .ok_or_else(|| anyhow!("{} has no name attribute", selector))
}

fn option_value(option: ElementRef) -> String {
    match option.value().attr("value") {
        Some(v) => v.to_string(),
        None => option.text().collect::<String>().trim().to_string(),
    }
}

/// Successful controls of a form with their initial values.
fn form_fields(form: ElementRef) -> Vec<(String, String)> {
    let mut fields: Vec<(String, String)> = Vec::new();
    for control in form.select(&CONTROL_SEL) {
        let el = control.value();
        let Some(name) = el.attr("name") else { continue };
        if el.attr("disabled").is_some() {
            continue;
        }
        match el.name() {
            "input" => {
                let kind = el.attr("type").unwrap_or("text").to_ascii_lowercase();
                match kind.as_str() {
                    "submit" | "image" | "button" | "reset" | "file" => {}
                    "checkbox" | "radio" => {
                        if el.attr("checked").is_some() {
                            fields.push((name.into(), el.attr("value").unwrap_or("on").into()));
                        }
                    }
                    _ => fields.push((name.into(), el.attr("value").unwrap_or_default().into())),
                }
            }
            "select" => {
                let options: Vec<ElementRef> = control.select(&OPTION_SEL).collect();
                let chosen = options
                    .iter()
                    .find(|o| o.value().attr("selected").is_some())
                    .or(options.first());
                if let Some(o) = chosen {
                    fields.push((name.into(), option_value(*o)));
                }
            }
            "textarea" => fields.push((name.into(), control.text().collect())),
            _ => {}
        }
    }
    fields
}

/// Serves canned pages from memory and records every navigation.
#[cfg(test)]
pub(crate) mod fake {
    use std::collections::HashMap;

    use super::*;

    #[derive(Default)]
    pub struct StaticBrowser {
        pub pages: HashMap<String, String>,
        pub visits: Vec<String>,
        pub actions: Vec<String>,
        pub popup_url: String,
        url: String,
        html: String,
    }

    impl StaticBrowser {
        pub fn page(mut self, url: &str, html: &str) -> Self {
            self.pages.insert(url.to_string(), html.to_string());
            self
        }
    }

    impl Browser for StaticBrowser {
        fn goto(&mut self, url: &str) -> Result<()> {
            self.visits.push(url.to_string());
            let html = self
                .pages
                .get(url)
                .ok_or_else(|| anyhow!("404 for {}", url))?;
            self.url = url.to_string();
            self.html = html.clone();
            Ok(())
        }

        fn url(&self) -> &str {
            &self.url
        }

        fn content(&self) -> &str {
            &self.html
        }

        fn select_option(&mut self, selector: &str, label: &str) -> Result<()> {
            self.actions.push(format!("select {} = {}", selector, label));
            Ok(())
        }

        fn fill(&mut self, selector: &str, value: &str) -> Result<()> {
            self.actions.push(format!("fill {} = {}", selector, value));
            Ok(())
        }

        fn click_popup(&mut self, selector: &str) -> Result<String> {
            self.actions.push(format!("click {}", selector));
            Ok(self.popup_url.clone())
        }
    }
}
