use super::*;
use crate::metrics::NoopMetrics;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(timeout_ms: u64) -> Client {
    Client::new(Duration::from_millis(timeout_ms), Arc::new(NoopMetrics)).unwrap()
}

#[tokio::test]
async fn test_get() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ok"))
        .and(header("Authorization", "Bearer foo"))
        .and(header("User-Agent", USER_AGENT))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let body = client(1000)
        .get(&format!("{}/ok", server.uri()), "foo")
        .await
        .unwrap();

    assert_eq!(b"ok".to_vec(), body);
}

#[tokio::test]
async fn test_post_sends_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/things"))
        .and(header("Content-Type", "application/json"))
        .and(body_string("{}"))
        .respond_with(ResponseTemplate::new(201).set_body_string("created"))
        .expect(1)
        .mount(&server)
        .await;

    let body = client(1000)
        .post(&format!("{}/things", server.uri()), "foo", b"{}".to_vec())
        .await
        .unwrap();

    assert_eq!(b"created".to_vec(), body);
}

#[tokio::test]
async fn test_error_classification() {
    let server = MockServer::start().await;
    for (route, code) in [("/missing", 404), ("/denied", 401), ("/broken", 500)] {
        Mock::given(path(route))
            .respond_with(ResponseTemplate::new(code))
            .mount(&server)
            .await;
    }
    let cl = client(1000);

    let missing = cl.get(&format!("{}/missing", server.uri()), "foo").await;
    let denied = cl.patch(&format!("{}/denied", server.uri()), "foo", vec![]).await;
    let broken = cl.get(&format!("{}/broken", server.uri()), "foo").await;

    assert!(matches!(missing, Err(ClientError::NotFound)));
    assert!(matches!(denied, Err(ClientError::Unauthorized)));
    match broken {
        Err(ClientError::Unexpected(status)) => {
            assert_eq!(500, status.as_u16());
        }
        other => panic!("unexpected result {:?}", other),
    }
}

#[tokio::test]
async fn test_timeout() {
    let server = MockServer::start().await;
    Mock::given(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(1500)))
        .mount(&server)
        .await;

    let res = client(100)
        .get(&format!("{}/slow", server.uri()), "foo")
        .await;

    assert!(matches!(res, Err(ClientError::Timeout)));
}

#[tokio::test]
async fn test_connection_refused() {
    let res = client(500).get("http://127.0.0.1:1/nothing", "foo").await;
    let err = res.unwrap_err();
    assert!(err.is_transport());
}
