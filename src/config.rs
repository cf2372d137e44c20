use std::time::Duration;
use std::{env, io};

use secrecy::SecretString;
use serde::Serialize;
use tracing::debug;

const DEFAULT_PLACES_API_BASE: &str = "https://places.googleapis.com";
const DEFAULT_GEOCODER_API_BASE: &str = "https://nominatim.openstreetmap.org";
const DEFAULT_BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
const DEFAULT_SHORT_LINK_PATTERNS: &str = "maps.app.goo.gl,goo.gl/maps";
const DEFAULT_POSTAL_CODE_PATTERN: &str = r"〒\s*\d{3}[-−]?\d{4}";
const PLACEHOLDER_API_KEY: &str = "your_google_maps_api_key_here";

pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.3;
pub const DEFAULT_NEARBY_RADIUS_METERS: f64 = 50.0;
pub const DEFAULT_TEXT_SEARCH_BIAS_RADIUS_METERS: f64 = 1000.0;

#[derive(Clone, Debug)]
pub struct ResolverConfig {
    pub google_maps_api_key: Option<SecretString>,
    pub places_api_base: String,
    pub geocoder_api_base: String,
    pub language_code: String,
    pub http_timeout_secs: u64,
    pub user_agent: String,
    pub browser_user_agent: String,
    pub short_link_patterns: Vec<String>,
    pub nearby_radius_meters: f64,
    pub text_search_bias_radius_meters: f64,
    pub similarity_threshold: f64,
    pub postal_code_pattern: String,
    pub text_search_max_results: u8,
    pub nearby_max_results: u8,
}

#[derive(Clone, Debug, Serialize)]
pub struct PublicResolverConfig {
    pub places_api_base: String,
    pub geocoder_api_base: String,
    pub language_code: String,
    pub http_timeout_secs: u64,
    pub short_link_patterns: Vec<String>,
    pub nearby_radius_meters: f64,
    pub text_search_bias_radius_meters: f64,
    pub similarity_threshold: f64,
    pub postal_code_pattern: String,
    pub has_google_maps_key: bool,
}

impl ResolverConfig {
    pub fn from_env() -> Self {
        load_dotenv_if_applicable();
        Self {
            google_maps_api_key: env::var("GOOGLE_MAPS_API_KEY")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty() && v != PLACEHOLDER_API_KEY)
                .map(|v| SecretString::new(v.into_boxed_str())),
            places_api_base: parse_base("PLACES_API_BASE", DEFAULT_PLACES_API_BASE),
            geocoder_api_base: parse_base("GEOCODER_API_BASE", DEFAULT_GEOCODER_API_BASE),
            language_code: env::var("PLACES_LANGUAGE_CODE")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| "ja".to_string()),
            http_timeout_secs: parse_u64("HTTP_TIMEOUT_SECS", 10).max(1),
            user_agent: env::var("RESOLVER_USER_AGENT")
                .unwrap_or_else(|_| format!("place-resolver/{}", env!("CARGO_PKG_VERSION"))),
            browser_user_agent: env::var("BROWSER_USER_AGENT")
                .unwrap_or_else(|_| DEFAULT_BROWSER_USER_AGENT.to_string()),
            short_link_patterns: parse_list("SHORT_LINK_PATTERNS", DEFAULT_SHORT_LINK_PATTERNS),
            nearby_radius_meters: parse_f64("NEARBY_RADIUS_METERS", DEFAULT_NEARBY_RADIUS_METERS),
            text_search_bias_radius_meters: parse_f64(
                "TEXT_SEARCH_BIAS_RADIUS_METERS",
                DEFAULT_TEXT_SEARCH_BIAS_RADIUS_METERS,
            ),
            similarity_threshold: parse_f64("SIMILARITY_THRESHOLD", DEFAULT_SIMILARITY_THRESHOLD)
                .clamp(0.0, 1.0),
            postal_code_pattern: env::var("POSTAL_CODE_PATTERN")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_POSTAL_CODE_PATTERN.to_string()),
            text_search_max_results: parse_u8("TEXT_SEARCH_MAX_RESULTS", 5).clamp(1, 20),
            nearby_max_results: parse_u8("NEARBY_MAX_RESULTS", 10).clamp(1, 20),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn public_profile(&self) -> PublicResolverConfig {
        PublicResolverConfig {
            places_api_base: self.places_api_base.clone(),
            geocoder_api_base: self.geocoder_api_base.clone(),
            language_code: self.language_code.clone(),
            http_timeout_secs: self.http_timeout_secs,
            short_link_patterns: self.short_link_patterns.clone(),
            nearby_radius_meters: self.nearby_radius_meters,
            text_search_bias_radius_meters: self.text_search_bias_radius_meters,
            similarity_threshold: self.similarity_threshold,
            postal_code_pattern: self.postal_code_pattern.clone(),
            has_google_maps_key: self.google_maps_api_key.is_some(),
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            google_maps_api_key: None,
            places_api_base: DEFAULT_PLACES_API_BASE.to_string(),
            geocoder_api_base: DEFAULT_GEOCODER_API_BASE.to_string(),
            language_code: "ja".to_string(),
            http_timeout_secs: 10,
            user_agent: format!("place-resolver/{}", env!("CARGO_PKG_VERSION")),
            browser_user_agent: DEFAULT_BROWSER_USER_AGENT.to_string(),
            short_link_patterns: split_list(DEFAULT_SHORT_LINK_PATTERNS),
            nearby_radius_meters: DEFAULT_NEARBY_RADIUS_METERS,
            text_search_bias_radius_meters: DEFAULT_TEXT_SEARCH_BIAS_RADIUS_METERS,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            postal_code_pattern: DEFAULT_POSTAL_CODE_PATTERN.to_string(),
            text_search_max_results: 5,
            nearby_max_results: 10,
        }
    }
}

fn load_dotenv_if_applicable() {
    if !should_load_dotenv() {
        debug!("skipping .env load outside dev mode");
        return;
    }

    if let Err(err) = dotenvy::dotenv() {
        match &err {
            dotenvy::Error::Io(io_err) if io_err.kind() == io::ErrorKind::NotFound => {}
            _ => debug!(?err, "unable to load .env file"),
        }
    }
}

fn should_load_dotenv() -> bool {
    cfg!(debug_assertions) || parse_bool("ALLOW_DOTENV", false)
}

fn parse_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "True"))
        .unwrap_or(default)
}

fn parse_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn parse_u8(key: &str, default: u8) -> u8 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u8>().ok())
        .unwrap_or(default)
}

fn parse_f64(key: &str, default: f64) -> f64 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(default)
}

fn parse_base(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
        .trim_end_matches('/')
        .to_string()
}

fn parse_list(key: &str, default: &str) -> Vec<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => split_list(&value),
        _ => split_list(default),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|item| item.trim().trim_end_matches('/').to_ascii_lowercase())
        .filter(|item| !item.is_empty())
        .collect()
}
