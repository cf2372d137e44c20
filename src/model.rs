use std::fmt;

use serde::Serialize;

use crate::errors::Degradation;
use crate::hours::WeeklySchedule;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        let plausible = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude)
            && !(latitude == 0.0 && longitude == 0.0);
        plausible.then_some(Self {
            latitude,
            longitude,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyCid {
    pub feature: u64,
    pub cid: u64,
}

impl LegacyCid {
    pub fn parse(raw: &str) -> Option<Self> {
        let (feature, cid) = raw.trim().split_once(':')?;
        Some(Self {
            feature: parse_hex(feature)?,
            cid: parse_hex(cid)?,
        })
    }
}

impl fmt::Display for LegacyCid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}:{:#x}", self.feature, self.cid)
    }
}

fn parse_hex(value: &str) -> Option<u64> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))?;
    u64::from_str_radix(digits, 16).ok()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceIdentifier {
    Modern(String),
    Legacy(LegacyCid),
}

impl PlaceIdentifier {
    // Hex-prefixed values are always legacy; a malformed pair is no identifier at all.
    pub fn classify(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.starts_with("0x") || raw.starts_with("0X") {
            return LegacyCid::parse(raw).map(PlaceIdentifier::Legacy);
        }
        let end = raw
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
            .unwrap_or(raw.len());
        let id = &raw[..end];
        (!id.is_empty()).then(|| PlaceIdentifier::Modern(id.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaceCandidate {
    pub place_id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaceDetails {
    pub place_id: String,
    pub display_name: Option<String>,
    pub formatted_address: Option<String>,
    pub coordinates: Option<Coordinates>,
    pub website_uri: Option<String>,
    pub weekday_descriptions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalPlace {
    pub name: String,
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub business_hours: WeeklySchedule,
    pub website_url: Option<String>,
    pub sns_urls: Vec<String>,
    pub google_map_url: String,
    pub place_id: String,
}

impl CanonicalPlace {
    pub fn coordinates(&self) -> Option<Coordinates> {
        Coordinates::new(self.latitude?, self.longitude?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub place: CanonicalPlace,
    pub degradations: Vec<Degradation>,
}
