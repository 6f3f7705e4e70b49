use regex::Regex;
use scraper::{Html, Selector};
use std::collections::BTreeSet;
use tracing::debug;

use crate::error::ScrapingError;

/// Maximum length of a valid address per RFC 5321.
const MAX_EMAIL_LENGTH: usize = 254;

/// Domains that only ever appear in boilerplate and documentation.
const PLACEHOLDER_DOMAINS: [&str; 7] = [
    "example.com",
    "test.com",
    "domain.com",
    "company.com",
    "yourcompany.com",
    "yourdomain.com",
    "sentry.io",
];

/// Fragments that mark machine or role addresses nobody wants to contact.
/// Checked as case-insensitive substrings of the whole address.
const SUSPICIOUS_FRAGMENTS: [&str; 10] = [
    "noreply",
    "no-reply",
    "donotreply",
    "postmaster",
    "webmaster",
    "abuse",
    "root@",
    "admin@",
    "test@",
    "example@",
];

/// DOM locations likely to carry contact addresses.
const CONTACT_SELECTORS: [&str; 9] = [
    r#"a[href^="mailto:"]"#,
    "[data-email]",
    ".email",
    ".contact-email",
    ".e-mail",
    ".mail",
    r#"span[title*="email"]"#,
    r#"div[title*="email"]"#,
    r#"p[title*="contact"]"#,
];

/// Pulls email addresses out of raw page content. An ordered battery of
/// patterns covers the obfuscations real pages use against naive scrapers
/// (spaced @, bracketed at/dot, entity and percent encodings); a separate
/// DOM pass inspects mailto links and contact-flavored elements. Every
/// candidate is cleaned to canonical lowercase form and validated against
/// syntax plus placeholder/noise blacklists before it counts.
pub struct EmailExtractor {
    patterns: Vec<Regex>,
    syntax: Regex,
    at_marker: Regex,
    dot_marker: Regex,
    at_spacing: Regex,
    percent_dot: Regex,
    anchor_selector: Selector,
    contact_selectors: Vec<Selector>,
}

impl EmailExtractor {
    pub fn new() -> Result<Self, ScrapingError> {
        let pattern_sources = [
            // Standard local@domain.tld
            r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
            // Spaces around @
            r"\b[A-Za-z0-9._%+-]+\s*@\s*[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
            // [at] / (at) with a literal dotted domain
            r"\b[A-Za-z0-9._%+-]+\s*[\[\(]at[\]\)]\s*[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b",
            // [at] ... [dot] fully bracketed
            r"\b[A-Za-z0-9._%+-]+\s*[\[\(]at[\]\)]\s*[A-Za-z0-9.-]+\s*[\[\(]dot[\]\)]\s*[A-Za-z]{2,}\b",
            // @ with a [dot] / (dot) TLD separator
            r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\s*[\[\(]dot[\]\)]\s*[A-Za-z]{2,}\b",
            // Quoted / script-escaped
            r#"['"]\s*[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\s*['"]"#,
            // HTML-entity encoded (&#64; / &#46;)
            r"[A-Za-z0-9._%+-]+&#64;[A-Za-z0-9.-]+&#46;[A-Za-z]{2,}",
            // Percent encoded (%40 / %2E)
            r"[A-Za-z0-9._%+-]+%40[A-Za-z0-9.-]+%2[Ee][A-Za-z]{2,}",
        ];

        let patterns = pattern_sources
            .iter()
            .map(|source| {
                Regex::new(source)
                    .map_err(|e| ScrapingError::ParseError(format!("Invalid email pattern: {}", e)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let contact_selectors = CONTACT_SELECTORS
            .iter()
            .map(|source| {
                Selector::parse(source)
                    .map_err(|e| ScrapingError::ParseError(format!("Invalid contact selector: {}", e)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            patterns,
            contact_selectors,
            syntax: Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$")
                .map_err(|e| ScrapingError::ParseError(format!("Invalid syntax pattern: {}", e)))?,
            at_marker: Regex::new(r"(?i)\s*[\[\(]at[\]\)]\s*")
                .map_err(|e| ScrapingError::ParseError(format!("Invalid at marker pattern: {}", e)))?,
            dot_marker: Regex::new(r"(?i)\s*[\[\(]dot[\]\)]\s*")
                .map_err(|e| ScrapingError::ParseError(format!("Invalid dot marker pattern: {}", e)))?,
            at_spacing: Regex::new(r"\s*@\s*")
                .map_err(|e| ScrapingError::ParseError(format!("Invalid at spacing pattern: {}", e)))?,
            percent_dot: Regex::new(r"(?i)%2e")
                .map_err(|e| ScrapingError::ParseError(format!("Invalid percent pattern: {}", e)))?,
            anchor_selector: Selector::parse("a[href]")
                .map_err(|e| ScrapingError::ParseError(format!("Invalid anchor selector: {}", e)))?,
        })
    }

    /// Full extraction over one page: pattern pass on the raw content plus
    /// the DOM-targeted pass. Returns validated, deduplicated, sorted
    /// lowercase addresses.
    pub fn extract(&self, content: &str) -> Vec<String> {
        let mut found = BTreeSet::new();
        self.extract_text_into(content, &mut found);
        self.extract_dom_into(content, &mut found);
        found.into_iter().collect()
    }

    /// Pattern pass only, for plain text that is not HTML.
    pub fn extract_text(&self, text: &str) -> Vec<String> {
        let mut found = BTreeSet::new();
        self.extract_text_into(text, &mut found);
        found.into_iter().collect()
    }

    /// Normalize a raw candidate: strip quotes and whitespace, undo
    /// [at]/[dot] obfuscation, decode entity and percent forms, lowercase.
    pub fn clean(&self, raw: &str) -> String {
        let mut email = raw.trim().replace(['\'', '"'], "");
        email = self.at_marker.replace_all(&email, "@").into_owned();
        email = self.dot_marker.replace_all(&email, ".").into_owned();
        email = self.at_spacing.replace_all(&email, "@").into_owned();
        email = email.replace("&#64;", "@").replace("&#46;", ".");
        email = email.replace("%40", "@");
        email = self.percent_dot.replace_all(&email, ".").into_owned();
        email.trim().to_lowercase()
    }

    /// Accept or reject one cleaned candidate. Deterministic: the same
    /// input always yields the same outcome.
    pub fn validate(&self, email: &str) -> bool {
        if email.is_empty() || email.len() > MAX_EMAIL_LENGTH {
            return false;
        }

        if !self.syntax.is_match(email) {
            return false;
        }

        // Consecutive or edge dots slip past the coarse syntax pattern.
        if email.contains("..") || email.starts_with('.') {
            return false;
        }

        let lower = email.to_lowercase();
        let domain = match lower.split('@').nth(1) {
            Some(domain) if !domain.is_empty() => domain,
            _ => return false,
        };

        if PLACEHOLDER_DOMAINS.contains(&domain) {
            return false;
        }

        if SUSPICIOUS_FRAGMENTS.iter().any(|fragment| lower.contains(fragment)) {
            return false;
        }

        true
    }

    /// All anchor hrefs on a page, for link discovery.
    pub fn collect_hrefs(&self, html: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        document
            .select(&self.anchor_selector)
            .filter_map(|element| element.value().attr("href"))
            .map(|href| href.to_string())
            .collect()
    }

    fn extract_text_into(&self, text: &str, found: &mut BTreeSet<String>) {
        for pattern in &self.patterns {
            for candidate in pattern.find_iter(text) {
                let email = self.clean(candidate.as_str());
                if self.validate(&email) {
                    debug!("Found email: {}", email);
                    found.insert(email);
                }
            }
        }
    }

    fn extract_dom_into(&self, html: &str, found: &mut BTreeSet<String>) {
        let document = Html::parse_document(html);

        for selector in &self.contact_selectors {
            for element in document.select(selector) {
                // mailto: targets, minus any query string
                if let Some(href) = element.value().attr("href") {
                    if let Some(target) = href.strip_prefix("mailto:") {
                        let address = target.split('?').next().unwrap_or("");
                        let email = self.clean(address);
                        if self.validate(&email) {
                            debug!("Found email in mailto: {}", email);
                            found.insert(email);
                        }
                    }
                }

                // data-email attributes
                if let Some(data_email) = element.value().attr("data-email") {
                    let email = self.clean(data_email);
                    if self.validate(&email) {
                        debug!("Found email in data-email: {}", email);
                        found.insert(email);
                    }
                }

                // element text, re-run through the pattern pass
                let text = element.text().collect::<String>();
                if !text.trim().is_empty() {
                    self.extract_text_into(&text, found);
                }
            }
        }
    }
}
