use std::sync::Arc;

use async_trait::async_trait;
use percent_encoding::percent_decode_str;
use reqwest::header::LOCATION;
use reqwest::{redirect, Client, Url};
use tracing::debug;

use crate::config::ResolverConfig;
use crate::errors::{AppError, AppResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedUrl {
    pub expanded: String,
    pub decoded: String,
}

#[async_trait]
pub trait LinkExpander: Send + Sync {
    async fn resolve_redirect(&self, url: &str) -> AppResult<Option<String>>;
}

#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, url: &str) -> AppResult<String>;
}

#[derive(Clone)]
pub struct MapsWebClient {
    redirects: Client,
    pages: Client,
}

impl MapsWebClient {
    pub fn new(config: &ResolverConfig) -> AppResult<Self> {
        let redirects = Client::builder()
            .timeout(config.http_timeout())
            .user_agent(config.browser_user_agent.as_str())
            .redirect(redirect::Policy::none())
            .build()?;
        let pages = Client::builder()
            .timeout(config.http_timeout())
            .user_agent(config.browser_user_agent.as_str())
            .build()?;
        Ok(Self { redirects, pages })
    }
}

#[async_trait]
impl LinkExpander for MapsWebClient {
    async fn resolve_redirect(&self, url: &str) -> AppResult<Option<String>> {
        let response = self.redirects.head(url).send().await?;
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty());
        let Some(location) = location else {
            return Ok(None);
        };
        let absolute = match Url::parse(url).and_then(|base| base.join(location)) {
            Ok(joined) => joined.to_string(),
            Err(_) => location.to_string(),
        };
        Ok(Some(absolute))
    }
}

#[async_trait]
impl PageFetcher for MapsWebClient {
    async fn fetch_page(&self, url: &str) -> AppResult<String> {
        let response = self.pages.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::UpstreamStatus {
                service: "map page",
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ShortLinkPattern {
    host: String,
    path_prefix: Option<String>,
}

impl ShortLinkPattern {
    fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim().trim_end_matches('/').to_ascii_lowercase();
        if raw.is_empty() {
            return None;
        }
        let (host, path) = match raw.split_once('/') {
            Some((host, path)) => (host.to_string(), Some(format!("/{path}"))),
            None => (raw.clone(), None),
        };
        Some(Self {
            host,
            path_prefix: path,
        })
    }

    fn matches(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        if !host.eq_ignore_ascii_case(&self.host) {
            return false;
        }
        match &self.path_prefix {
            Some(prefix) => url.path().to_ascii_lowercase().starts_with(prefix.as_str()),
            None => true,
        }
    }
}

#[derive(Clone)]
pub struct UrlNormalizer {
    expander: Arc<dyn LinkExpander>,
    short_links: Vec<ShortLinkPattern>,
}

impl UrlNormalizer {
    pub fn new(expander: Arc<dyn LinkExpander>, short_link_patterns: &[String]) -> Self {
        Self {
            expander,
            short_links: short_link_patterns
                .iter()
                .filter_map(|raw| ShortLinkPattern::parse(raw))
                .collect(),
        }
    }

    pub fn is_short_link(&self, url: &Url) -> bool {
        self.short_links.iter().any(|pattern| pattern.matches(url))
    }

    pub async fn normalize(&self, raw: &str) -> AppResult<NormalizedUrl> {
        let raw = raw.trim();
        let parsed = parse_http_url(raw)?;

        let expanded = if self.is_short_link(&parsed) {
            let location = self
                .expander
                .resolve_redirect(raw)
                .await
                .map_err(|err| AppError::UrlExpansion {
                    url: raw.to_string(),
                    reason: err.to_string(),
                })?
                .ok_or_else(|| AppError::UrlExpansion {
                    url: raw.to_string(),
                    reason: "no redirect location found".into(),
                })?;
            let target = unwrap_redirect_target(&location);
            debug!(short = raw, expanded = %target, "expanded shortened link");
            target
        } else {
            raw.to_string()
        };

        Ok(NormalizedUrl {
            decoded: percent_decode(&expanded),
            expanded,
        })
    }
}

fn parse_http_url(raw: &str) -> AppResult<Url> {
    let parsed = Url::parse(raw).map_err(|err| AppError::UnsupportedUrl(format!("{raw}: {err}")))?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(parsed),
        _ => Err(AppError::UnsupportedUrl(raw.to_string())),
    }
}

pub fn unwrap_redirect_target(location: &str) -> String {
    let Some((_, encoded)) = location.split_once("url=") else {
        return location.to_string();
    };
    let encoded = encoded.split('&').next().unwrap_or(encoded);
    let decoded = percent_decode(encoded);
    if decoded.starts_with("http://") || decoded.starts_with("https://") {
        decoded
    } else {
        location.to_string()
    }
}

pub fn percent_decode(value: &str) -> String {
    percent_decode_str(value).decode_utf8_lossy().into_owned()
}
