use std::collections::{HashSet, VecDeque};
use tracing::debug;
use url::Url;

/// A URL waiting to be fetched, with its distance from the seed that led
/// to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    pub url: String,
    pub depth: usize,
}

/// FIFO queue of URLs still to visit. Discovered links are admitted only
/// when they stay on a seed site (same host or a subdomain of it), have not
/// been seen before, and sit within the depth bound. URLs are normalized
/// with the fragment stripped before dedup so `/a` and `/a#top` count once.
pub struct CrawlFrontier {
    queue: VecDeque<FrontierEntry>,
    seen: HashSet<String>,
    seed_hosts: Vec<String>,
    max_depth: usize,
    total_discovered: usize,
}

impl CrawlFrontier {
    pub fn new(max_depth: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            seen: HashSet::new(),
            seed_hosts: Vec::new(),
            max_depth,
            total_discovered: 0,
        }
    }

    /// Admit the starting URLs at depth 0 and record their hosts as the
    /// crawl's site boundary. Unparseable seeds are skipped.
    pub fn seed(&mut self, seeds: &[String]) {
        for seed in seeds {
            let Some((normalized, host)) = normalize(seed) else {
                debug!("Skipping unparseable seed: {}", seed);
                continue;
            };

            if !self.seed_hosts.contains(&host) {
                self.seed_hosts.push(host);
            }

            if self.seen.insert(normalized.clone()) {
                self.total_discovered += 1;
                self.queue.push_back(FrontierEntry {
                    url: normalized,
                    depth: 0,
                });
            }
        }
    }

    /// Offer links found on a page at `parent_depth`. Returns how many were
    /// admitted.
    pub fn discover(&mut self, base_url: &str, hrefs: &[String], parent_depth: usize) -> usize {
        let depth = parent_depth + 1;
        if depth > self.max_depth {
            return 0;
        }

        let Ok(base) = Url::parse(base_url) else {
            return 0;
        };

        let mut admitted = 0;
        for href in hrefs {
            let Ok(resolved) = base.join(href) else {
                continue;
            };

            if !matches!(resolved.scheme(), "http" | "https") {
                continue;
            }

            let Some((normalized, host)) = normalize(resolved.as_str()) else {
                continue;
            };

            if !self.is_on_seed_site(&host) {
                continue;
            }

            if self.seen.insert(normalized.clone()) {
                self.total_discovered += 1;
                admitted += 1;
                self.queue.push_back(FrontierEntry {
                    url: normalized,
                    depth,
                });
            }
        }

        if admitted > 0 {
            debug!("Discovered {} new URLs from {}", admitted, base_url);
        }
        admitted
    }

    pub fn next(&mut self) -> Option<FrontierEntry> {
        self.queue.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn total_discovered(&self) -> usize {
        self.total_discovered
    }

    fn is_on_seed_site(&self, host: &str) -> bool {
        self.seed_hosts
            .iter()
            .any(|seed| host == seed || host.ends_with(&format!(".{}", seed)))
    }
}

/// Parse, drop the fragment, and return the canonical string plus lowercase
/// host. Returns None for URLs without a host.
fn normalize(raw: &str) -> Option<(String, String)> {
    let mut url = Url::parse(raw).ok()?;
    let host = url.host_str()?.to_lowercase();
    url.set_fragment(None);
    Some((url.to_string(), host))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_and_fifo_order() {
        let mut frontier = CrawlFrontier::new(2);
        frontier.seed(&["https://a.test/".to_string(), "https://b.test/".to_string()]);

        assert_eq!(frontier.pending(), 2);
        assert_eq!(frontier.next().unwrap().url, "https://a.test/");
        assert_eq!(frontier.next().unwrap().url, "https://b.test/");
        assert!(frontier.is_empty());
    }

    #[test]
    fn test_discover_stays_on_seed_site() {
        let mut frontier = CrawlFrontier::new(2);
        frontier.seed(&["https://a.test/".to_string()]);
        frontier.next();

        let hrefs = vec![
            "/about".to_string(),
            "https://blog.a.test/post".to_string(),
            "https://other.test/".to_string(),
            "https://nota.test/".to_string(),
        ];
        let admitted = frontier.discover("https://a.test/", &hrefs, 0);

        assert_eq!(admitted, 2);
        assert_eq!(frontier.next().unwrap().url, "https://a.test/about");
        assert_eq!(frontier.next().unwrap().url, "https://blog.a.test/post");
    }

    #[test]
    fn test_discover_respects_depth_bound() {
        let mut frontier = CrawlFrontier::new(1);
        frontier.seed(&["https://a.test/".to_string()]);
        frontier.next();

        assert_eq!(frontier.discover("https://a.test/", &["/p1".to_string()], 0), 1);
        let entry = frontier.next().unwrap();
        assert_eq!(entry.depth, 1);

        // Children of a depth-1 page would sit at depth 2, past the bound.
        assert_eq!(frontier.discover(&entry.url, &["/p2".to_string()], entry.depth), 0);
        assert!(frontier.is_empty());
    }

    #[test]
    fn test_duplicates_and_fragments_seen_once() {
        let mut frontier = CrawlFrontier::new(2);
        frontier.seed(&["https://a.test/".to_string()]);
        frontier.next();

        let hrefs = vec![
            "/contact".to_string(),
            "/contact".to_string(),
            "/contact#form".to_string(),
        ];
        assert_eq!(frontier.discover("https://a.test/", &hrefs, 0), 1);
        assert_eq!(frontier.total_discovered(), 2);
    }

    #[test]
    fn test_non_http_links_skipped() {
        let mut frontier = CrawlFrontier::new(2);
        frontier.seed(&["https://a.test/".to_string()]);
        frontier.next();

        let hrefs = vec![
            "mailto:info@a.test".to_string(),
            "javascript:void(0)".to_string(),
            "tel:+15550100".to_string(),
        ];
        assert_eq!(frontier.discover("https://a.test/", &hrefs, 0), 0);
    }

    #[test]
    fn test_unparseable_seed_skipped() {
        let mut frontier = CrawlFrontier::new(2);
        frontier.seed(&["not a url".to_string(), "https://a.test/".to_string()]);
        assert_eq!(frontier.pending(), 1);
    }
}
