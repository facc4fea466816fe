//! Field extraction from result and detail pages.
//!
//! Extraction never fails: a field whose node is missing comes back as
//! `None`, so one malformed card cannot cost the rest of the page.
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

use crate::config::{ConfigError, Selectors};
use crate::fetch::Document;
use crate::model::Listing;

static NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid regex"));

/// Parsed form of [`Selectors`].
#[derive(Debug, Clone)]
pub struct CompiledSelectors {
    page_count: Selector,
    results: Selector,
    card: Selector,
    title: Selector,
    company: Selector,
    location: Selector,
    location_fallback: Selector,
    rating: Selector,
    post_age: Selector,
    link: Selector,
    summary: Selector,
    description: Selector,
}

impl CompiledSelectors {
    pub fn compile(s: &Selectors) -> Result<Self, ConfigError> {
        let parse = |sel: &str, msg: &'static str| {
            Selector::parse(sel).map_err(|_| ConfigError::Invalid(msg))
        };
        Ok(Self {
            page_count: parse(&s.page_count, "selectors.page_count")?,
            results: parse(&s.results, "selectors.results")?,
            card: parse(&s.card, "selectors.card")?,
            title: parse(&s.title, "selectors.title")?,
            company: parse(&s.company, "selectors.company")?,
            location: parse(&s.location, "selectors.location")?,
            location_fallback: parse(&s.location_fallback, "selectors.location_fallback")?,
            rating: parse(&s.rating, "selectors.rating")?,
            post_age: parse(&s.post_age, "selectors.post_age")?,
            link: parse(&s.link, "selectors.link")?,
            summary: parse(&s.summary, "selectors.summary")?,
            description: parse(&s.description, "selectors.description")?,
        })
    }
}

/// What one result page yields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultsPage {
    /// First number in the page-count indicator, `None` when the indicator is absent.
    pub reported_page_count: Option<u32>,
    pub listings: Vec<Listing>,
}

pub fn parse_results_page(doc: &Document, sel: &CompiledSelectors, link_base: &Url) -> ResultsPage {
    let html = doc.html();
    ResultsPage {
        reported_page_count: reported_page_count(&html, sel),
        listings: cards(&html, sel)
            .map(|card| extract(card, sel, link_base))
            .collect(),
    }
}

fn reported_page_count(html: &Html, sel: &CompiledSelectors) -> Option<u32> {
    let node = html.select(&sel.page_count).next()?;
    let text = node.text().collect::<String>();
    NUMBER_RE.find(&text)?.as_str().parse().ok()
}

fn cards<'a>(html: &'a Html, sel: &'a CompiledSelectors) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    html.select(&sel.results)
        .next()
        .into_iter()
        .flat_map(move |container| container.select(&sel.card))
}

/// Extract one listing card. The description is taken from the card summary;
/// the crawler replaces it with the detail page text when configured to.
pub fn extract(card: ElementRef<'_>, sel: &CompiledSelectors, link_base: &Url) -> Listing {
    Listing {
        title: text_of(card, &sel.title),
        company: text_of(card, &sel.company),
        location: text_of(card, &sel.location).or_else(|| text_of(card, &sel.location_fallback)),
        company_rating: text_of(card, &sel.rating),
        post_age: text_of(card, &sel.post_age),
        job_link: link_of(card, &sel.link, link_base),
        job_description: text_of(card, &sel.summary),
    }
}

/// Description text of a detail page.
pub fn extract_description(doc: &Document, sel: &CompiledSelectors) -> Option<String> {
    let html = doc.html();
    let node = html.select(&sel.description).next()?;
    non_empty(node.text().collect::<String>())
}

fn text_of(scope: ElementRef<'_>, selector: &Selector) -> Option<String> {
    let node = scope.select(selector).next()?;
    non_empty(node.text().collect::<String>())
}

fn non_empty(text: String) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn link_of(scope: ElementRef<'_>, selector: &Selector, link_base: &Url) -> Option<String> {
    let href = scope
        .select(selector)
        .find_map(|a| a.value().attr("href"))?
        .trim();
    if href.is_empty() {
        return None;
    }
    let absolute = link_base.join(href).ok()?;
    Some(absolute.as_str().replace(';', "&"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sel() -> CompiledSelectors {
        CompiledSelectors::compile(&Selectors::default()).unwrap()
    }

    fn base() -> Url {
        Url::parse("https://www.indeed.com").unwrap()
    }

    fn page(cards: &str, count: Option<&str>) -> Document {
        let indicator = count
            .map(|c| format!(r#"<div id="searchCountPages">{c}</div>"#))
            .unwrap_or_default();
        Document::parse(
            "https://www.indeed.com/jobs?q=x",
            format!(
                r#"<html><head><title>Jobs</title></head><body>{indicator}
                <table><tr><td id="resultsCol">{cards}</td></tr></table></body></html>"#
            ),
        )
        .unwrap()
    }

    const FULL_CARD: &str = r#"
        <div class="jobsearch-SerpJobCard">
          <h2 class="title"><a href="/rc/clk?jk=abc;fccid=1">Data Scientist</a></h2>
          <span class="company"> Acme Corp </span>
          <span class="ratingsContent">4.1</span>
          <div class="location accessible-contrast-color-location">Austin, TX</div>
          <div class="summary">Build models.</div>
          <span class="date">3 days ago</span>
        </div>"#;

    #[test]
    fn full_card_extracts_every_field() {
        let p = parse_results_page(&page(FULL_CARD, Some("Page 1 of 120 jobs")), &sel(), &base());
        assert_eq!(p.reported_page_count, Some(1));
        assert_eq!(p.listings.len(), 1);
        let l = &p.listings[0];
        assert_eq!(l.title.as_deref(), Some("Data Scientist"));
        assert_eq!(l.company.as_deref(), Some("Acme Corp"));
        assert_eq!(l.company_rating.as_deref(), Some("4.1"));
        assert_eq!(l.location.as_deref(), Some("Austin, TX"));
        assert_eq!(l.post_age.as_deref(), Some("3 days ago"));
        assert_eq!(l.job_description.as_deref(), Some("Build models."));
        assert_eq!(
            l.job_link.as_deref(),
            Some("https://www.indeed.com/rc/clk?jk=abc&fccid=1")
        );
    }

    #[test]
    fn missing_nodes_become_none() {
        let card = r#"<div class="jobsearch-SerpJobCard">
            <span class="location accessible-contrast-color-location">Remote</span>
        </div>"#;
        let p = parse_results_page(&page(card, Some("Page 2 of 40 jobs")), &sel(), &base());
        let l = &p.listings[0];
        assert_eq!(l.title, None);
        assert_eq!(l.company, None);
        assert_eq!(l.company_rating, None);
        assert_eq!(l.job_link, None);
        assert_eq!(l.location.as_deref(), Some("Remote"));
        assert_eq!(p.reported_page_count, Some(2));
    }

    #[test]
    fn malformed_card_does_not_affect_neighbours() {
        let cards = format!(r#"<div class="jobsearch-SerpJobCard"></div>{FULL_CARD}"#);
        let p = parse_results_page(&page(&cards, Some("Page 1")), &sel(), &base());
        assert_eq!(p.listings.len(), 2);
        assert_eq!(p.listings[0], Listing::default());
        assert_eq!(p.listings[1].title.as_deref(), Some("Data Scientist"));
    }

    #[test]
    fn missing_indicator_and_container() {
        let p = parse_results_page(&page(FULL_CARD, None), &sel(), &base());
        assert_eq!(p.reported_page_count, None);

        let doc = Document::parse("u", "<html><head><title>Blocked</title></head></html>").unwrap();
        let p = parse_results_page(&doc, &sel(), &base());
        assert!(p.listings.is_empty());
    }

    #[test]
    fn description_from_detail_page() {
        let doc = Document::parse(
            "u",
            r#"<html><head><title>Job</title></head><body>
               <div id="jobDescriptionText"><p>Python</p><p>SQL</p></div></body></html>"#,
        )
        .unwrap();
        assert_eq!(extract_description(&doc, &sel()).as_deref(), Some("PythonSQL"));

        let doc = Document::parse("u", "<html><head><title>Gone</title></head></html>").unwrap();
        assert_eq!(extract_description(&doc, &sel()), None);
    }
}
