use super::*;
use crate::error::ClientError;
use crate::metrics::RecordingMetrics;
use chrono::TimeZone;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const STATUS: &[u8] = include_bytes!("../../testdata/status.json");
const CONFIGURATION: &[u8] = include_bytes!("../../testdata/configuration.json");
const PROFILE: &[u8] = include_bytes!("../../testdata/profile.json");
const DATA: &[u8] = include_bytes!("../../testdata/data.json");

fn build_source(server: &MockServer, metrics: Arc<RecordingMetrics>) -> FlowerPower {
    let client = Client::new(Duration::from_secs(1), metrics.clone()).unwrap();
    FlowerPower::new(
        client,
        FlowerPowerConfig {
            base_url: server.uri(),
        },
        metrics,
    )
}

async fn mount(server: &MockServer, route: &str, code: u16, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(route))
        .and(header("Authorization", "Bearer foo"))
        .respond_with(ResponseTemplate::new(code).set_body_bytes(body.to_vec()))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_get_user() {
    let server = MockServer::start().await;
    mount(&server, PROFILE_PATH, 200, PROFILE).await;

    let source = build_source(&server, Arc::new(RecordingMetrics::default()));
    let user = source.user("foo").await.unwrap();

    assert_eq!("barnabas@example.com", user.parrot_id);
}

#[tokio::test]
async fn test_get_user_invalid_token() {
    let server = MockServer::start().await;
    mount(&server, PROFILE_PATH, 401, b"Unauthorized").await;

    let source = build_source(&server, Arc::new(RecordingMetrics::default()));
    let res = source.user("foo").await;

    assert!(matches!(
        res,
        Err(SourceError::Client(ClientError::Unauthorized))
    ));
}

#[tokio::test]
async fn test_get_locations() {
    let server = MockServer::start().await;
    mount(&server, STATUS_PATH, 200, STATUS).await;
    mount(&server, CONFIGURATION_PATH, 200, CONFIGURATION).await;
    let metrics = Arc::new(RecordingMetrics::default());

    let source = build_source(&server, metrics.clone());
    let locations = source.locations("foo").await.unwrap();

    // idle, never sampled, unconfigured and serial-less locations are dropped
    assert_eq!(2, locations.len());
    let basil = &locations[0];
    assert_eq!("Gu80jTmwyq1539530459586", basil.location_id);
    assert_eq!("PI040AAB5C9A5B2A", basil.serial_num);
    assert_eq!("Basil", basil.nickname);
    assert_eq!(Utc.with_ymd_and_hms(2018, 11, 1, 0, 0, 0).unwrap(), basil.first_sample);
    assert_eq!(Utc.with_ymd_and_hms(2018, 11, 25, 0, 0, 0).unwrap(), basil.last_sample);
    assert_eq!(48.8566, basil.latitude);
    assert_eq!("Tomato", locations[1].nickname);
    assert_eq!(2, metrics.count(Counter::RetrievedLocations));
}

#[tokio::test]
async fn test_get_locations_not_found() {
    let server = MockServer::start().await;
    mount(&server, STATUS_PATH, 404, b"not found").await;

    let source = build_source(&server, Arc::new(RecordingMetrics::default()));
    let res = source.locations("foo").await;

    assert!(matches!(res, Err(SourceError::Client(ClientError::NotFound))));
}

#[tokio::test]
async fn test_get_locations_invalid_response() {
    let server = MockServer::start().await;
    mount(&server, STATUS_PATH, 200, b"{\"locations").await;

    let source = build_source(&server, Arc::new(RecordingMetrics::default()));
    let res = source.locations("foo").await;

    assert!(matches!(res, Err(SourceError::Parse(_))));
}

#[tokio::test]
async fn test_get_readings() {
    let server = MockServer::start().await;
    let location_id = "Gu80jTmwyq1539530459586";
    Mock::given(method("GET"))
        .and(path(format!("{}/{}", DATA_PATH, location_id)))
        .and(query_param("from_datetime_utc", "2018-11-09T15:43:00Z"))
        .and(query_param("to_datetime_utc", "2018-11-09T16:30:00Z"))
        .and(header("Authorization", "Bearer foo"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(DATA.to_vec()))
        .expect(1)
        .mount(&server)
        .await;
    let metrics = Arc::new(RecordingMetrics::default());
    let window = Window {
        from: Utc.with_ymd_and_hms(2018, 11, 9, 15, 43, 0).unwrap(),
        to: Utc.with_ymd_and_hms(2018, 11, 9, 16, 30, 0).unwrap(),
    };

    let source = build_source(&server, metrics.clone());
    let readings = source.readings("foo", location_id, &window).await.unwrap();

    assert_eq!(3, readings.len());
    // the source answers most recent first
    assert!(readings[0].timestamp > readings[2].timestamp);
    assert_eq!(3, metrics.count(Counter::RetrievedReadings));
}
