//! In-process readability engine.
//!
//! CPU-bound and synchronous: callers run it through
//! [`super::BlockingPool`] so HTML parsing never stalls the event loop.

use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use url::Url;

use super::PageContent;
use crate::error::{ExtractError, ExtractResult};
use crate::utils::normalize_text;

static AUTHOR_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"meta[name="author"], meta[property="article:author"], meta[name="byl"], meta[name="dc.creator"]"#)
        .unwrap()
});
static DATE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"meta[property="article:published_time"], meta[name="pubdate"], meta[name="date"], meta[name="dc.date"]"#)
        .unwrap()
});
static TIME_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("time[datetime]").unwrap());
static HTML_LANG_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("html[lang]").unwrap());
static LANG_META_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"meta[http-equiv="content-language"], meta[property="og:locale"]"#).unwrap()
});
static IMAGE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"meta[property="og:image"], meta[name="twitter:image"]"#).unwrap()
});
static TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"meta[property="og:title"], meta[name="twitter:title"]"#).unwrap()
});
static BODY_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());

/// Extract the main content and metadata of `html`, fetched from `url`.
pub fn extract_page(html: &str, url: &Url) -> ExtractResult<PageContent> {
    let product = readability::extractor::extract(&mut html.as_bytes(), url)
        .map_err(|e| ExtractError::Readability(e.to_string()))?;

    let document = Html::parse_document(html);
    let readability_title = normalize_text(&product.title);
    let text = normalize_text(&product.text);
    // readability falls back to the <title> when the body has nothing to offer.
    if text.is_empty() || text == readability_title || !has_body_text(&document) {
        return Err(ExtractError::NoContent);
    }

    let meta = PageMeta::from_document(&document, url);
    let title = Some(readability_title).filter(|t| !t.is_empty()).or(meta.title);

    Ok(PageContent {
        title,
        authors: meta.authors,
        date: meta.date,
        language: meta.language,
        top_image: meta.top_image,
        text,
        html: Some(product.content).filter(|h| !h.trim().is_empty()),
    })
}

#[derive(Debug, Default)]
struct PageMeta {
    title: Option<String>,
    authors: Vec<String>,
    date: Option<String>,
    language: Option<String>,
    top_image: Option<String>,
}

impl PageMeta {
    fn from_document(document: &Html, url: &Url) -> Self {
        let authors = meta_contents(document, &AUTHOR_SELECTOR)
            .flat_map(|v| {
                v.split([',', '|'])
                    .flat_map(|part| part.split(" and "))
                    .map(|a| a.trim().trim_start_matches("By ").trim().to_string())
                    .collect::<Vec<_>>()
            })
            .filter(|a| !a.is_empty() && !a.starts_with("http"))
            .unique()
            .collect();

        let date = meta_contents(document, &DATE_SELECTOR).next().or_else(|| {
            document
                .select(&TIME_SELECTOR)
                .filter_map(|e| e.value().attr("datetime"))
                .map(|d| d.trim().to_string())
                .find(|d| !d.is_empty())
        });

        let language = document
            .select(&HTML_LANG_SELECTOR)
            .filter_map(|e| e.value().attr("lang"))
            .map(|l| l.trim().to_string())
            .find(|l| !l.is_empty())
            .or_else(|| meta_contents(document, &LANG_META_SELECTOR).next())
            .map(|l| primary_language(&l));

        // og:image is often relative on smaller sites.
        let top_image = meta_contents(document, &IMAGE_SELECTOR)
            .next()
            .and_then(|src| url.join(&src).ok())
            .map(|u| u.to_string());

        Self {
            title: meta_contents(document, &TITLE_SELECTOR).next(),
            authors,
            date,
            language,
            top_image,
        }
    }
}

fn has_body_text(document: &Html) -> bool {
    document
        .select(&BODY_SELECTOR)
        .flat_map(|body| body.text())
        .any(|t| !t.trim().is_empty())
}

fn meta_contents<'a>(document: &'a Html, selector: &'a Selector) -> impl Iterator<Item = String> + 'a {
    document
        .select(selector)
        .filter_map(|e| e.value().attr("content"))
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}

/// `en-US` / `en_US` -> `en`.
fn primary_language(tag: &str) -> String {
    tag.split(['-', '_'])
        .next()
        .unwrap_or(tag)
        .to_ascii_lowercase()
}

#[cfg(test)]
pub(crate) fn sample_article_html() -> String {
    let paragraph = "The city council voted on Tuesday to approve a new transit plan that \
        expands bus service to the northern districts, adds protected bike lanes along the \
        river and funds a feasibility study for a light rail line connecting the airport.";
    format!(
        r#"<!DOCTYPE html>
<html lang="en-US">
<head>
  <title>Council approves transit plan</title>
  <meta name="author" content="Jane Doe, John Roe">
  <meta property="article:published_time" content="2024-05-01T12:30:00Z">
  <meta property="og:image" content="/images/transit.jpg">
</head>
<body>
  <nav><a href="/">Home</a> <a href="/news">News</a></nav>
  <article>
    <h1>Council approves transit plan</h1>
    <p>{paragraph}</p>
    <p>{paragraph}</p>
    <p>{paragraph}</p>
    <p>Officials said construction on the first phase would begin next spring, pending final budget approval.</p>
  </article>
  <footer>Copyright Example News</footer>
</body>
</html>"#
    )
}
