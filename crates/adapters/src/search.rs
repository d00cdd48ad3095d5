//! Web search over the DuckDuckGo HTML endpoint.

use std::time::Duration;

use log::debug;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use reqwest::blocking::Client;
use reqwest::{header, StatusCode, Url};

use blog_core::config::SearchConfig;
use blog_core::{SearchError, SearchTool, NO_SEARCH_RESULTS};

use crate::base_url::resolve_base_url;
use crate::error::AdapterError;

const DUCKDUCKGO_HTML_URL: &str = "https://html.duckduckgo.com/html";
const SEARCH_TIMEOUT_SECS: u64 = 30;
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) blogctl";

pub const SEARCH_TOOL_NAME: &str = "duckduckgo_search";
pub const SEARCH_TOOL_DESCRIPTION: &str =
    r#"Search the web using DuckDuckGo. Give argument - {"query": "<Whatever you want to search>"}"#;

static RESULT_LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?s)<a\b([^>]*\bclass="[^"]*\bresult__a\b[^"]*"[^>]*)>(.*?)</a>"#).unwrap()
});
static SNIPPET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?s)<(a|div|td)\b[^>]*\bclass="[^"]*\bresult__snippet\b[^"]*"[^>]*>(.*?)</(?:a|div|td)>"#,
    )
    .unwrap()
});
static HREF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"\bhref="([^"]*)""#).unwrap());
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static NUMERIC_ENTITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&#(?:[xX]([0-9a-fA-F]{1,6})|([0-9]{1,7}));").unwrap());

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub link: String,
    pub snippet: String,
}

pub struct DuckDuckGoSearch {
    client: Client,
    url: String,
    max_results: usize,
}

impl DuckDuckGoSearch {
    pub fn from_config(config: &SearchConfig) -> Result<Self, AdapterError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(SEARCH_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            url: format!("{}/", resolve_base_url(&config.base_url, DUCKDUCKGO_HTML_URL)),
            max_results: config.max_results.max(1),
        })
    }

    pub fn search_hits(&self, query: &str) -> Result<Vec<SearchHit>, AdapterError> {
        debug!("GET {} q={}", self.url, query);
        let response = self
            .client
            .get(&self.url)
            .header(header::USER_AGENT, USER_AGENT)
            .query(&[("q", query)])
            .send()?;

        // DuckDuckGo answers 202 with an empty page when it throttles.
        if response.status() != StatusCode::OK {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(AdapterError::HttpStatus { status, body });
        }

        let html = response.text()?;
        Ok(parse_results(&html, self.max_results))
    }
}

impl SearchTool for DuckDuckGoSearch {
    fn name(&self) -> &str {
        SEARCH_TOOL_NAME
    }

    fn description(&self) -> &str {
        SEARCH_TOOL_DESCRIPTION
    }

    fn search(&self, query: &str) -> Result<String, SearchError> {
        let hits = self.search_hits(query)?;
        if hits.is_empty() {
            return Ok(NO_SEARCH_RESULTS.to_string());
        }
        Ok(format_hits(&hits))
    }
}

pub fn format_hits(hits: &[SearchHit]) -> String {
    hits.iter()
        .map(|hit| {
            let mut entry = format!("Title: {}", hit.title);
            if !hit.snippet.is_empty() {
                entry.push_str(&format!("\nSnippet: {}", hit.snippet));
            }
            entry.push_str(&format!("\nLink: {}", hit.link));
            entry
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Extracts organic results from a DuckDuckGo HTML results page. Ads are
/// skipped.
pub fn parse_results(html: &str, max_results: usize) -> Vec<SearchHit> {
    let links: Vec<_> = RESULT_LINK_RE.captures_iter(html).collect();
    let mut hits = Vec::new();

    for (index, captures) in links.iter().enumerate() {
        if hits.len() >= max_results {
            break;
        }
        let (Some(whole), Some(attributes), Some(inner)) =
            (captures.get(0), captures.get(1), captures.get(2))
        else {
            continue;
        };

        let Some(href) = HREF_RE
            .captures(attributes.as_str())
            .and_then(|caps| caps.get(1))
            .map(|href| decode_entities(href.as_str()))
        else {
            continue;
        };
        let Some(link) = resolve_link(&href) else {
            continue;
        };

        let block_end = links
            .get(index + 1)
            .and_then(|next| next.get(0))
            .map(|next| next.start())
            .unwrap_or(html.len());
        let snippet = SNIPPET_RE
            .captures(&html[whole.end()..block_end])
            .and_then(|caps| caps.get(2))
            .map(|snippet| clean_text(snippet.as_str()))
            .unwrap_or_default();

        hits.push(SearchHit {
            title: clean_text(inner.as_str()),
            link,
            snippet,
        });
    }

    hits
}

/// Unwraps DuckDuckGo's `/l/?uddg=` redirect. Ad links resolve to `None`.
fn resolve_link(href: &str) -> Option<String> {
    let absolute = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    };
    let url = Url::parse(&absolute).ok()?;

    if url.path().ends_with("/y.js") {
        return None;
    }
    if url.domain().map_or(false, |domain| domain.ends_with("duckduckgo.com")) {
        return url
            .query_pairs()
            .find(|(key, _)| key == "uddg")
            .map(|(_, target)| target.into_owned());
    }
    Some(absolute)
}

fn clean_text(fragment: &str) -> String {
    let stripped = TAG_RE.replace_all(fragment, "");
    let decoded = decode_entities(&stripped);
    WHITESPACE_RE.replace_all(decoded.trim(), " ").into_owned()
}

fn decode_entities(text: &str) -> String {
    let numeric = NUMERIC_ENTITY_RE.replace_all(text, |caps: &Captures<'_>| {
        let code = match (caps.get(1), caps.get(2)) {
            (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok(),
            (_, Some(decimal)) => decimal.as_str().parse().ok(),
            _ => None,
        };
        code.and_then(char::from_u32)
            .map_or_else(|| caps[0].to_string(), String::from)
    });
    numeric
        .replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    const RESULTS_PAGE: &str = r#"
<div class="result results_links results_links_deep result--ad">
  <a rel="nofollow" class="result__a" href="https://duckduckgo.com/y.js?ad_domain=shop.example">Buy now</a>
  <a class="result__snippet" href="https://duckduckgo.com/y.js?ad_domain=shop.example">Sponsored</a>
</div>
<div class="result results_links results_links_deep web-result">
  <h2 class="result__title">
    <a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com%2Frust%2Dasync&amp;rut=abc">Async <b>Rust</b> in 2024</a>
  </h2>
  <a class="result__snippet" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com%2Frust%2Dasync">Tokio &amp; friends are
     <b>maturing</b> fast.</a>
</div>
<div class="result results_links results_links_deep web-result">
  <h2 class="result__title">
    <a rel="nofollow" class="result__a" href="https://blog.example.org/post">Second &quot;hit&quot;</a>
  </h2>
</div>
"#;

    #[test]
    fn parses_organic_results_and_skips_ads() {
        let hits = parse_results(RESULTS_PAGE, 5);
        assert_eq!(
            hits,
            vec![
                SearchHit {
                    title: "Async Rust in 2024".into(),
                    link: "https://example.com/rust-async".into(),
                    snippet: "Tokio & friends are maturing fast.".into(),
                },
                SearchHit {
                    title: "Second \"hit\"".into(),
                    link: "https://blog.example.org/post".into(),
                    snippet: String::new(),
                },
            ]
        );
    }

    #[test]
    fn decodes_numeric_entities() {
        assert_eq!(
            decode_entities("It&#8217;s &#x27;fast&#X27; &amp; &#39;safe&#39;"),
            "It\u{2019}s 'fast' & 'safe'"
        );
        assert_eq!(decode_entities("&amp;#39; &#xD800;"), "&#39; &#xD800;");
    }

    #[test]
    fn respects_max_results() {
        assert_eq!(parse_results(RESULTS_PAGE, 1).len(), 1);
    }

    #[test]
    fn formats_hits_for_the_model() {
        let formatted = format_hits(&parse_results(RESULTS_PAGE, 5));
        assert_eq!(
            formatted,
            "Title: Async Rust in 2024\nSnippet: Tokio & friends are maturing fast.\nLink: https://example.com/rust-async\n\nTitle: Second \"hit\"\nLink: https://blog.example.org/post"
        );
    }

    #[test]
    fn empty_page_yields_the_no_results_observation() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/html/")
            .match_query(Matcher::UrlEncoded("q".into(), "nothing here".into()))
            .with_status(200)
            .with_body("<html><body>No results.</body></html>")
            .create();

        let search = DuckDuckGoSearch::from_config(&SearchConfig {
            base_url: format!("{}/html", server.url()),
            ..SearchConfig::default()
        })
        .unwrap();
        assert_eq!(search.search("nothing here").unwrap(), NO_SEARCH_RESULTS);
        mock.assert();
    }

    #[test]
    fn throttled_response_is_an_error() {
        let mut server = mockito::Server::new();
        let mock = server.mock("GET", "/html/").match_query(Matcher::Any).with_status(202).create();

        let search = DuckDuckGoSearch::from_config(&SearchConfig {
            base_url: format!("{}/html", server.url()),
            ..SearchConfig::default()
        })
        .unwrap();
        assert!(search.search("rust").is_err());
        mock.assert();
    }
}
