use serde::Serialize;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("unsupported map URL: {0}")]
    UnsupportedUrl(String),
    #[error("failed to expand shortened link {url}: {reason}")]
    UrlExpansion { url: String, reason: String },
    #[error("legacy place identifier {cid} could not be converted: {reason}")]
    UnsupportedLegacyIdentifier { cid: String, reason: String },
    #[error("no confident match for \"{name}\": {reason}")]
    NoConfidentMatch { name: String, reason: String },
    #[error("place details lookup failed for {place_id}: {reason}")]
    PlaceDetails { place_id: String, reason: String },
    #[error("{service} returned status {status}")]
    UpstreamStatus { service: &'static str, status: u16 },
    #[error("place resolution deadline exceeded")]
    DeadlineExceeded,
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Config(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Degradation {
    #[error("no usable place name in URL segment \"{segment}\"")]
    NameExtractionAmbiguous { segment: String },
    #[error("opening hours degraded: {reason}")]
    HoursParseDegraded { reason: String },
    #[error("reverse geocoding unavailable: {reason}")]
    ReverseGeocodeUnavailable { reason: String },
}
