use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{Coordinates, PlaceIdentifier};

const MIN_EMBEDDED_ID_LEN: usize = 11;

static URL_COORDINATE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"@(-?\d+\.\d+),(-?\d+\.\d+)",
        r"!3d(-?\d+\.\d+)!4d(-?\d+\.\d+)",
        r"[?&]ll=(-?\d+\.\d+),(-?\d+\.\d+)",
        r"[?&]center=(-?\d+\.\d+),(-?\d+\.\d+)",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("valid coordinate pattern"))
    .collect()
});

static PAGE_COORDINATE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"\[null,null,(-?\d{1,3}\.\d{3,}),(-?\d{1,3}\.\d{3,})\]",
        r#""?lat"?\s*[:=]\s*(-?\d{1,3}\.\d+)\s*,\s*"?(?:lng|lon)"?\s*[:=]\s*(-?\d{1,3}\.\d+)"#,
        r#""latitude"\s*:\s*(-?\d{1,3}\.\d+)\s*,\s*"longitude"\s*:\s*(-?\d{1,3}\.\d+)"#,
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("valid page coordinate pattern"))
    .collect()
});

static PAGE_PLACE_ID_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r#""place_id"\s*:\s*"([A-Za-z0-9_:-]+)""#,
        r#""placeId"\s*:\s*"([A-Za-z0-9_:-]+)""#,
        r#"data-place-id="([A-Za-z0-9_:-]+)""#,
        r"place_id=([A-Za-z0-9_:-]+)",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("valid place id pattern"))
    .collect()
});

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageHints {
    pub coordinates: Option<Coordinates>,
    pub identifier: Option<PlaceIdentifier>,
}

pub fn coordinates_from_url(decoded_url: &str) -> Option<Coordinates> {
    first_pair(&URL_COORDINATE_PATTERNS, decoded_url)
}

pub fn scan_page(body: &str) -> PageHints {
    PageHints {
        coordinates: first_pair(&PAGE_COORDINATE_PATTERNS, body),
        identifier: embedded_identifier(body),
    }
}

fn first_pair(patterns: &[Regex], haystack: &str) -> Option<Coordinates> {
    patterns.iter().find_map(|pattern| {
        pattern.captures_iter(haystack).find_map(|captures| {
            let lat = captures.get(1)?.as_str().parse::<f64>().ok()?;
            let lng = captures.get(2)?.as_str().parse::<f64>().ok()?;
            Coordinates::new(lat, lng)
        })
    })
}

fn embedded_identifier(body: &str) -> Option<PlaceIdentifier> {
    PAGE_PLACE_ID_PATTERNS.iter().find_map(|pattern| {
        pattern
            .captures_iter(body)
            .filter_map(|captures| PlaceIdentifier::classify(captures.get(1)?.as_str()))
            .find(|identifier| match identifier {
                PlaceIdentifier::Modern(id) => id.len() >= MIN_EMBEDDED_ID_LEN,
                PlaceIdentifier::Legacy(_) => true,
            })
    })
}
