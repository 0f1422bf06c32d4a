use std::collections::HashMap;

use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, ScrapeError};
use crate::utils::{is_external, normalize_url};

/// A fetched page: the raw HTML plus the URL it came from.
///
/// Extraction methods parse on demand so the type stays `Send` and can be
/// carried across await points; the parse itself is delegated entirely to
/// the `scraper` crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    url: String,
    html: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    pub text: String,
    pub href: String,
    pub is_external: bool,
}

/// One `<table>` element as headers plus cell rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Rows as column-name → cell maps. Cells beyond the header count get
    /// positional `column_N` names, as do all cells of a headerless table.
    pub fn records(&self) -> Vec<HashMap<String, String>> {
        self.rows
            .iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .map(|(i, cell)| {
                        let name = self
                            .headers
                            .get(i)
                            .filter(|h| !h.is_empty())
                            .cloned()
                            .unwrap_or_else(|| format!("column_{}", i));
                        (name, cell.clone())
                    })
                    .collect()
            })
            .collect()
    }
}

fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| ScrapeError::Parsing(format!("invalid selector '{}': {}", css, e)))
}

impl Document {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: html.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    /// Contents of the `<title>` element, if any.
    pub fn title(&self) -> Option<String> {
        let document = Html::parse_document(&self.html);
        let selector = Selector::parse("title").ok()?;
        document
            .select(&selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
    }

    /// Whitespace-normalized text content of the page body.
    pub fn text(&self) -> String {
        let document = Html::parse_document(&self.html);
        let selector = Selector::parse("body").expect("static selector");
        let raw: String = match document.select(&selector).next() {
            Some(body) => body.text().collect(),
            None => document.root_element().text().collect(),
        };
        raw.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Every anchor with an href, text and absolutized target.
    pub fn links(&self) -> Vec<Link> {
        let document = Html::parse_document(&self.html);
        let selector = Selector::parse("a[href]").expect("static selector");
        let base = Url::parse(&self.url).ok();

        let mut links = Vec::new();
        let mut seen = std::collections::HashSet::new();

        for element in document.select(&selector) {
            let Some(href) = element.value().attr("href") else {
                continue;
            };
            let text = element.text().collect::<String>().trim().to_string();

            let (absolute, external) = match base.as_ref() {
                Some(base) => match normalize_url(base, href) {
                    Some(abs) => {
                        let ext = is_external(base, &abs);
                        (abs, ext)
                    }
                    None => (href.to_string(), false),
                },
                None => (href.to_string(), false),
            };

            if seen.insert(absolute.clone()) {
                links.push(Link {
                    text: if text.is_empty() {
                        href.to_string()
                    } else {
                        text
                    },
                    href: absolute,
                    is_external: external,
                });
            }
        }

        links
    }

    /// Every `<table>` on the page as headers plus td rows.
    pub fn tables(&self) -> Vec<Table> {
        let document = Html::parse_document(&self.html);
        let table_selector = Selector::parse("table").expect("static selector");
        let th_selector = Selector::parse("th").expect("static selector");
        let tr_selector = Selector::parse("tr").expect("static selector");
        let td_selector = Selector::parse("td").expect("static selector");

        document
            .select(&table_selector)
            .filter_map(|table| {
                let headers: Vec<String> = table
                    .select(&th_selector)
                    .map(|th| th.text().collect::<String>().trim().to_string())
                    .collect();

                let rows: Vec<Vec<String>> = table
                    .select(&tr_selector)
                    .filter_map(|tr| {
                        let cells: Vec<String> = tr
                            .select(&td_selector)
                            .map(|td| td.text().collect::<String>().trim().to_string())
                            .collect();
                        if cells.is_empty() { None } else { Some(cells) }
                    })
                    .collect();

                if headers.is_empty() && rows.is_empty() {
                    None
                } else {
                    Some(Table { headers, rows })
                }
            })
            .collect()
    }

    /// Text of every element matching a CSS selector. An empty result is
    /// not an error; a selector that does not parse is.
    pub fn select(&self, css: &str) -> Result<Vec<String>> {
        let selector = parse_selector(css)?;
        let document = Html::parse_document(&self.html);
        Ok(document
            .select(&selector)
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect())
    }

    /// Text of the first element matching a CSS selector. No match is a
    /// parsing error, for callers that require the element to exist.
    pub fn select_first(&self, css: &str) -> Result<String> {
        self.select(css)?
            .into_iter()
            .next()
            .ok_or_else(|| ScrapeError::Parsing(format!("no element matched '{}'", css)))
    }

    pub fn find_by_tag(&self, tag: &str) -> Result<Vec<String>> {
        self.select(tag)
    }

    pub fn find_by_class(&self, class: &str) -> Result<Vec<String>> {
        self.select(&format!(".{}", class))
    }

    /// Text of the element with the given id. Ids are unique, so a missing
    /// one is a parsing error.
    pub fn find_by_id(&self, id: &str) -> Result<String> {
        self.select_first(&format!("#{}", id))
    }
}
