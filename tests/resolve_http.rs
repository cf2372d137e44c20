use httptest::matchers::{all_of, contains, eq, json_decoded, request, url_decoded};
use httptest::responders::{json_encoded, status_code};
use httptest::{Expectation, Server};
use secrecy::SecretString;
use serde_json::{json, Value};

use place_resolver_lib::places::{NearbySearchRequest, PlacesService};
use place_resolver_lib::{AppError, Coordinates, Degradation, PlacePipeline, ResolverConfig};

// The short-link pattern in `config` names 127.0.0.1, so servers that serve
// short links must listen on IPv4 loopback rather than httptest's IPv6 default.
fn ipv4_server() -> Server {
    httptest::ServerBuilder::new()
        .bind_addr(([127, 0, 0, 1], 0).into())
        .run()
        .unwrap()
}

fn config(server: &Server) -> ResolverConfig {
    let base = server.url_str("").trim_end_matches('/').to_string();
    ResolverConfig {
        google_maps_api_key: Some(SecretString::new("test-key".into())),
        places_api_base: base.clone(),
        geocoder_api_base: base,
        short_link_patterns: vec!["127.0.0.1/short".into()],
        ..ResolverConfig::default()
    }
}

fn details_body(id: &str, address: Option<&str>) -> Value {
    let mut body = json!({
        "id": id,
        "displayName": {"text": "サンプルカフェ 渋谷店", "languageCode": "ja"},
        "location": {"latitude": 35.6595, "longitude": 139.7005},
        "websiteUri": "https://samplecafe.jp/",
        "regularOpeningHours": {
            "weekdayDescriptions": [
                "月曜日: 11時00分～14時00分、17時00分～22時00分",
                "火曜日: 11時00分～22時00分",
                "水曜日: 11時00分～22時00分",
                "木曜日: 11時00分～22時00分",
                "金曜日: 11時00分～23時00分",
                "土曜日: 24 時間営業",
                "日曜日: 定休日"
            ]
        }
    });
    if let Some(address) = address {
        body["formattedAddress"] = json!(address);
    }
    body
}

fn expect_details(server: &Server, id: &str, address: Option<&str>) {
    server.expect(
        Expectation::matching(all_of![
            request::method("GET"),
            request::path(eq(format!("/v1/places/{id}"))),
            request::query(url_decoded(contains(("languageCode", "ja")))),
            request::headers(contains(("x-goog-api-key", "test-key"))),
        ])
        .respond_with(json_encoded(details_body(id, address))),
    );
}

#[tokio::test]
async fn short_link_resolves_through_nearby_search() {
    let server = ipv4_server();
    let expanded = server.url_str("/maps/place/%E3%82%B5%E3%83%B3%E3%83%97%E3%83%AB%E3%82%AB%E3%83%95%E3%82%A7/@35.6595,139.7005,17z");

    server.expect(
        Expectation::matching(all_of![
            request::method("HEAD"),
            request::path("/short/abc")
        ])
        .respond_with(status_code(302).append_header("Location", expanded.clone())),
    );
    server.expect(
        Expectation::matching(all_of![
            request::method("POST"),
            request::path("/v1/places:searchNearby"),
            request::headers(contains((
                "x-goog-fieldmask",
                "places.id,places.displayName,places.location"
            ))),
            request::body(json_decoded(|body: &Value| {
                body["rankPreference"] == "DISTANCE"
                    && body["locationRestriction"]["circle"]["radius"] == 50.0
                    && body["languageCode"] == "ja"
            })),
        ])
        .respond_with(json_encoded(json!({
            "places": [
                {"id": "ChIJother", "displayName": {"text": "Lawson"}},
                {"id": "ChIJcafe", "displayName": {"text": "サンプルカフェ"}}
            ]
        }))),
    );
    expect_details(
        &server,
        "ChIJcafe",
        Some("日本、〒150-0043 東京都渋谷区道玄坂2丁目1"),
    );

    let pipeline = PlacePipeline::new(&config(&server)).unwrap();
    let resolution = pipeline
        .resolve(&server.url_str("/short/abc"))
        .await
        .unwrap();
    let place = resolution.place;

    assert_eq!(place.place_id, "ChIJcafe");
    assert_eq!(place.name, "サンプルカフェ 渋谷店");
    assert_eq!(place.address, "〒150-0043 東京都渋谷区道玄坂2丁目1");
    assert_eq!(place.google_map_url, expanded);
    assert_eq!(place.website_url.as_deref(), Some("https://samplecafe.jp/"));
    assert!(place.sns_urls.is_empty());

    let monday = &place.business_hours.monday.time_slots;
    assert_eq!(monday.len(), 2);
    assert_eq!(monday[1].close_time, "22:00");
    assert_eq!(monday[1].last_order_time, "21:30");
    assert_eq!(place.business_hours.saturday.time_slots[0].open_time, "00:00");
    assert!(place.business_hours.sunday.is_closed);
    assert!(resolution.degradations.is_empty());

    let record = serde_json::to_value(&place).unwrap();
    assert_eq!(
        record["business_hours"]["friday"]["time_slots"][0]["last_order_time"],
        "22:30"
    );
    assert_eq!(record["business_hours"]["sunday"]["is_closed"], true);
}

#[tokio::test]
async fn explicit_place_id_goes_straight_to_details() {
    let server = Server::run();
    // Only the details endpoint is registered; any search request fails the test.
    expect_details(&server, "ChIJdirect01", Some("東京都渋谷区道玄坂2丁目1"));

    let pipeline = PlacePipeline::new(&config(&server)).unwrap();
    let resolution = pipeline
        .resolve("https://www.google.com/maps/search/?api=1&query=Cafe&query_place_id=ChIJdirect01")
        .await
        .unwrap();

    assert_eq!(resolution.place.place_id, "ChIJdirect01");
    assert_eq!(resolution.place.latitude, Some(35.6595));
}

#[tokio::test]
async fn legacy_identifier_converts_through_biased_text_search() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method("POST"),
            request::path("/v1/places:searchText"),
            request::body(json_decoded(|body: &Value| {
                body["textQuery"] == "Sample Cafe"
                    && body["locationBias"]["circle"]["radius"] == 1000.0
                    && body["maxResultCount"] == 5
            })),
        ])
        .respond_with(json_encoded(json!({
            "places": [
                {"id": "ChIJwrong", "displayName": {"text": "Bookstore"}},
                {"id": "ChIJlegacy", "displayName": {"text": "Sample Cafe"}}
            ]
        }))),
    );
    expect_details(&server, "ChIJlegacy", Some("東京都渋谷区"));

    let pipeline = PlacePipeline::new(&config(&server)).unwrap();
    let resolution = pipeline
        .resolve("https://www.google.com/maps/place/Sample+Cafe/@35.6595,139.7005,17z/data=!4m6!3m5!1s0x60188b5:0x1234abcd!8m2!3d35.6595!4d139.7005")
        .await
        .unwrap();

    assert_eq!(resolution.place.place_id, "ChIJlegacy");
}

#[tokio::test]
async fn missing_address_is_filled_by_reverse_geocoding() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("POST", "/v1/places:searchNearby"))
            .respond_with(json_encoded(json!({
                "places": [{"id": "ChIJcafe", "displayName": {"text": "Sample Cafe"}}]
            }))),
    );
    expect_details(&server, "ChIJcafe", None);
    server.expect(
        Expectation::matching(all_of![
            request::method("GET"),
            request::path("/reverse"),
            request::query(url_decoded(contains(("format", "jsonv2")))),
            request::query(url_decoded(contains(("accept-language", "ja")))),
        ])
        .respond_with(json_encoded(json!({
            "display_name": "道玄坂二丁目, 渋谷区, 東京都, 150-0043, 日本"
        }))),
    );

    let pipeline = PlacePipeline::new(&config(&server)).unwrap();
    let resolution = pipeline
        .resolve("https://www.google.com/maps/place/Sample+Cafe/@35.6595,139.7005,17z")
        .await
        .unwrap();

    assert_eq!(
        resolution.place.address,
        "道玄坂二丁目, 渋谷区, 東京都, 150-0043"
    );
    assert!(!resolution
        .degradations
        .iter()
        .any(|d| matches!(d, Degradation::ReverseGeocodeUnavailable { .. })));
}

#[tokio::test]
async fn rejected_details_lookup_is_fatal() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path("GET", "/v1/places/ChIJgone01"))
            .respond_with(status_code(404)),
    );

    let pipeline = PlacePipeline::new(&config(&server)).unwrap();
    let err = pipeline
        .resolve("https://maps.google.com/?place_id=ChIJgone01")
        .await
        .unwrap_err();

    match err {
        AppError::PlaceDetails { place_id, reason } => {
            assert_eq!(place_id, "ChIJgone01");
            assert!(reason.contains("404"));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn short_link_without_redirect_is_fatal() {
    let server = ipv4_server();
    server.expect(
        Expectation::matching(request::method_path("HEAD", "/short/dead"))
            .respond_with(status_code(200)),
    );

    let pipeline = PlacePipeline::new(&config(&server)).unwrap();
    let err = pipeline
        .resolve(&server.url_str("/short/dead"))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::UrlExpansion { .. }));
}

#[tokio::test]
async fn keyword_nearby_search_uses_bounding_box_text_search() {
    let server = Server::run();
    server.expect(
        Expectation::matching(all_of![
            request::method("POST"),
            request::path("/v1/places:searchText"),
            request::body(json_decoded(|body: &Value| {
                let rectangle = &body["locationRestriction"]["rectangle"];
                body["textQuery"] == "ramen"
                    && rectangle["low"]["latitude"].as_f64() < Some(35.6595)
                    && rectangle["high"]["latitude"].as_f64() > Some(35.6595)
                    && body.get("locationBias").is_none()
            })),
        ])
        .respond_with(json_encoded(json!({
            "places": [{"id": "ChIJramen", "displayName": {"text": "Ramen Shop"}}]
        }))),
    );

    let places = PlacesService::new(&config(&server)).unwrap();
    let candidates = places
        .nearby_search(&NearbySearchRequest {
            center: Coordinates::new(35.6595, 139.7005).unwrap(),
            radius_meters: 50.0,
            keyword: Some("ramen".into()),
            max_results: 10,
        })
        .await
        .unwrap();

    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].place_id, "ChIJramen");
    assert_eq!(candidates[0].display_name, "Ramen Shop");
}
