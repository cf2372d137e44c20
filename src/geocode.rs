use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::trace;

use crate::config::ResolverConfig;
use crate::details::strip_country;
use crate::errors::{AppError, AppResult};
use crate::model::Coordinates;

#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    async fn reverse(&self, coordinates: Coordinates) -> AppResult<Option<String>>;
}

#[derive(Deserialize)]
struct ReverseResponse {
    display_name: Option<String>,
    error: Option<String>,
}

pub struct NominatimClient {
    http: Client,
    base: String,
    language_code: String,
}

impl NominatimClient {
    pub fn new(config: &ResolverConfig) -> AppResult<Self> {
        let http = Client::builder()
            .timeout(config.http_timeout())
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self {
            http,
            base: config.geocoder_api_base.clone(),
            language_code: config.language_code.clone(),
        })
    }
}

#[async_trait]
impl ReverseGeocoder for NominatimClient {
    async fn reverse(&self, coordinates: Coordinates) -> AppResult<Option<String>> {
        let latitude = coordinates.latitude.to_string();
        let longitude = coordinates.longitude.to_string();
        let response = self
            .http
            .get(format!("{}/reverse", self.base))
            .query(&[
                ("format", "jsonv2"),
                ("lat", latitude.as_str()),
                ("lon", longitude.as_str()),
                ("accept-language", self.language_code.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::UpstreamStatus {
                service: "reverse geocoder",
                status: status.as_u16(),
            });
        }

        let parsed: ReverseResponse = response.json().await?;
        if let Some(error) = parsed.error {
            trace!(%error, "reverse geocoder found no address");
            return Ok(None);
        }
        Ok(parsed
            .display_name
            .map(|name| strip_country(&name))
            .filter(|name| !name.is_empty()))
    }
}
