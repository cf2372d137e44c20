use reqwest::Url;
use tracing::debug;

use crate::errors::{AppError, AppResult};
use crate::model::PlaceDetails;
use crate::places::PlacesService;

const SNS_HOSTS: &[&str] = &[
    "instagram.com",
    "facebook.com",
    "twitter.com",
    "x.com",
    "tiktok.com",
    "youtube.com",
    "linkedin.com",
];
const COUNTRY_PREFIXES: &[&str] = &["日本、", "日本,", "Japan,", "Japan、"];
const COUNTRY_SUFFIXES: &[&str] = &[", Japan", ", 日本", "、日本"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WebPresence {
    pub website_url: Option<String>,
    pub sns_urls: Vec<String>,
}

pub async fn fetch_details(places: &PlacesService, place_id: &str) -> AppResult<PlaceDetails> {
    let details = places
        .details(place_id)
        .await
        .map_err(|err| AppError::PlaceDetails {
            place_id: place_id.to_string(),
            reason: err.to_string(),
        })?;

    if details.display_name.is_none() && details.formatted_address.is_none() {
        return Err(AppError::PlaceDetails {
            place_id: place_id.to_string(),
            reason: "response carried neither a name nor an address".into(),
        });
    }
    debug!(
        place_id,
        hours = details.weekday_descriptions.len(),
        has_location = details.coordinates.is_some(),
        "fetched place details"
    );
    Ok(details)
}

pub fn strip_country(address: &str) -> String {
    let mut trimmed = address.trim();
    for prefix in COUNTRY_PREFIXES {
        if let Some(rest) = trimmed.strip_prefix(*prefix) {
            trimmed = rest.trim_start();
            break;
        }
    }
    for suffix in COUNTRY_SUFFIXES {
        if let Some(rest) = trimmed.strip_suffix(*suffix) {
            trimmed = rest.trim_end();
            break;
        }
    }
    trimmed.to_string()
}

pub fn classify_website(uri: Option<&str>) -> WebPresence {
    let Some(uri) = uri.map(str::trim).filter(|uri| !uri.is_empty()) else {
        return WebPresence::default();
    };
    if is_sns_url(uri) {
        WebPresence {
            website_url: None,
            sns_urls: vec![uri.to_string()],
        }
    } else {
        WebPresence {
            website_url: Some(uri.to_string()),
            sns_urls: Vec::new(),
        }
    }
}

pub fn is_sns_url(uri: &str) -> bool {
    let Some(host) = Url::parse(uri)
        .ok()
        .and_then(|url| url.host_str().map(str::to_ascii_lowercase))
    else {
        return false;
    };
    SNS_HOSTS.iter().any(|sns| {
        host == *sns
            || host
                .strip_suffix(*sns)
                .is_some_and(|subdomain| subdomain.ends_with('.'))
    })
}
