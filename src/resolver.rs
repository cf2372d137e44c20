use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::ResolverConfig;
use crate::errors::{AppError, AppResult};
use crate::model::{Coordinates, LegacyCid, PlaceIdentifier};
use crate::name::ResolvedName;
use crate::places::{NearbySearchRequest, PlacesService, TextSearchRequest};
use crate::similarity::rank_candidates;

static PLACE_ID_PARAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"place_id=([^&#\s]+)").expect("valid place id regex"));
static LEGACY_DATA_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"!1s(0x[0-9a-fA-F]+:0x[0-9a-fA-F]+)").expect("valid legacy data regex")
});
static LEGACY_FTID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[?&]ftid=(0x[0-9a-fA-F]+:0x[0-9a-fA-F]+)").expect("valid ftid regex")
});

pub fn detect_identifier(decoded_url: &str) -> Option<PlaceIdentifier> {
    if let Some(identifier) = PLACE_ID_PARAM
        .captures(decoded_url)
        .and_then(|captures| PlaceIdentifier::classify(captures.get(1)?.as_str()))
    {
        return Some(identifier);
    }

    // The trailing data block names the place itself; earlier ones are context.
    LEGACY_DATA_ID
        .captures_iter(decoded_url)
        .chain(LEGACY_FTID.captures_iter(decoded_url))
        .filter_map(|captures| LegacyCid::parse(captures.get(1)?.as_str()))
        .last()
        .map(PlaceIdentifier::Legacy)
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResolutionStrategy {
    ById(String),
    LegacyConvert {
        cid: LegacyCid,
        name: String,
        bias: Option<Coordinates>,
    },
    NameOnlySearch {
        query: String,
    },
    GeoAnchoredSearch {
        center: Coordinates,
        name: Option<String>,
    },
}

impl ResolutionStrategy {
    pub fn label(&self) -> &'static str {
        match self {
            ResolutionStrategy::ById(_) => "by_id",
            ResolutionStrategy::LegacyConvert { .. } => "legacy_convert",
            ResolutionStrategy::NameOnlySearch { .. } => "name_only_search",
            ResolutionStrategy::GeoAnchoredSearch { .. } => "geo_anchored_search",
        }
    }
}

pub fn plan(
    identifier: Option<&PlaceIdentifier>,
    name: &ResolvedName,
    coordinates: Option<Coordinates>,
    postal_code: &Regex,
) -> AppResult<ResolutionStrategy> {
    match identifier {
        Some(PlaceIdentifier::Modern(id)) => return Ok(ResolutionStrategy::ById(id.clone())),
        Some(PlaceIdentifier::Legacy(cid)) => {
            let name = name
                .usable()
                .ok_or_else(|| AppError::UnsupportedLegacyIdentifier {
                    cid: cid.to_string(),
                    reason: "no usable place name to search with".into(),
                })?;
            return Ok(ResolutionStrategy::LegacyConvert {
                cid: *cid,
                name: name.to_string(),
                bias: coordinates,
            });
        }
        None => {}
    }

    if name.carries_postal_code(postal_code) {
        return Ok(ResolutionStrategy::NameOnlySearch {
            query: name.raw_segment.clone(),
        });
    }
    if let Some(center) = coordinates {
        return Ok(ResolutionStrategy::GeoAnchoredSearch {
            center,
            name: name.usable().map(str::to_string),
        });
    }
    match name.usable() {
        Some(query) => Ok(ResolutionStrategy::NameOnlySearch {
            query: query.to_string(),
        }),
        None => Err(AppError::NoConfidentMatch {
            name: name.raw_segment.clone(),
            reason: "URL carries neither a place name nor coordinates".into(),
        }),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchedPlace {
    pub place_id: String,
    pub score: Option<f64>,
}

#[derive(Clone)]
pub struct PlaceResolver {
    places: PlacesService,
    similarity_threshold: f64,
    nearby_radius_meters: f64,
    bias_radius_meters: f64,
    text_search_max_results: u8,
    nearby_max_results: u8,
}

impl PlaceResolver {
    pub fn new(places: PlacesService, config: &ResolverConfig) -> Self {
        Self {
            places,
            similarity_threshold: config.similarity_threshold,
            nearby_radius_meters: config.nearby_radius_meters,
            bias_radius_meters: config.text_search_bias_radius_meters,
            text_search_max_results: config.text_search_max_results,
            nearby_max_results: config.nearby_max_results,
        }
    }

    pub async fn execute(&self, strategy: &ResolutionStrategy) -> AppResult<MatchedPlace> {
        debug!(strategy = strategy.label(), "executing resolution strategy");
        match strategy {
            ResolutionStrategy::ById(place_id) => Ok(MatchedPlace {
                place_id: place_id.clone(),
                score: None,
            }),
            ResolutionStrategy::LegacyConvert { cid, name, bias } => {
                self.convert_legacy(*cid, name, *bias).await
            }
            ResolutionStrategy::NameOnlySearch { query } => self.search_by_name(query).await,
            ResolutionStrategy::GeoAnchoredSearch { center, name } => {
                self.search_nearby(*center, name.as_deref()).await
            }
        }
    }

    async fn convert_legacy(
        &self,
        cid: LegacyCid,
        name: &str,
        bias: Option<Coordinates>,
    ) -> AppResult<MatchedPlace> {
        let unsupported = |reason: String| AppError::UnsupportedLegacyIdentifier {
            cid: cid.to_string(),
            reason,
        };
        let candidates = self
            .places
            .text_search(&self.text_request(name, bias))
            .await
            .map_err(|err| unsupported(err.to_string()))?;
        let best = rank_candidates(name, candidates)
            .into_iter()
            .next()
            .ok_or_else(|| unsupported(format!("text search for \"{name}\" returned nothing")))?;

        info!(
            %cid,
            place_id = %best.candidate.place_id,
            score = best.score,
            "converted legacy identifier"
        );
        Ok(MatchedPlace {
            place_id: best.candidate.place_id,
            score: Some(best.score),
        })
    }

    async fn search_by_name(&self, query: &str) -> AppResult<MatchedPlace> {
        let candidates = self
            .places
            .text_search(&self.text_request(query, None))
            .await?;
        let first = candidates
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NoConfidentMatch {
                name: query.to_string(),
                reason: "text search returned no candidates".into(),
            })?;
        Ok(MatchedPlace {
            place_id: first.place_id,
            score: None,
        })
    }

    async fn search_nearby(&self, center: Coordinates, name: Option<&str>) -> AppResult<MatchedPlace> {
        let request = NearbySearchRequest {
            center,
            radius_meters: self.nearby_radius_meters,
            keyword: None,
            max_results: self.nearby_max_results,
        };
        let candidates = self.places.nearby_search(&request).await?;

        let Some(name) = name else {
            let nearest = candidates
                .into_iter()
                .next()
                .ok_or_else(|| AppError::NoConfidentMatch {
                    name: String::new(),
                    reason: "no places near the URL coordinates".into(),
                })?;
            warn!(
                place_id = %nearest.place_id,
                "no usable name in URL; adopting nearest place"
            );
            return Ok(MatchedPlace {
                place_id: nearest.place_id,
                score: None,
            });
        };

        let ranked = rank_candidates(name, candidates);
        let best_score = ranked.first().map(|scored| scored.score);
        let best = ranked
            .into_iter()
            .next()
            .filter(|scored| scored.score >= self.similarity_threshold)
            .ok_or_else(|| AppError::NoConfidentMatch {
                name: name.to_string(),
                reason: match best_score {
                    Some(score) => format!(
                        "best nearby similarity {score:.2} is below {:.2}",
                        self.similarity_threshold
                    ),
                    None => "no places near the URL coordinates".into(),
                },
            })?;

        debug!(
            place_id = %best.candidate.place_id,
            score = best.score,
            "matched nearby candidate"
        );
        Ok(MatchedPlace {
            place_id: best.candidate.place_id,
            score: Some(best.score),
        })
    }

    fn text_request(&self, query: &str, bias: Option<Coordinates>) -> TextSearchRequest {
        TextSearchRequest {
            query: query.to_string(),
            bias,
            bias_radius_meters: self.bias_radius_meters,
            max_results: self.text_search_max_results,
        }
    }
}
