//! Response behavior driven by defaults and query parameters.

mod common;

use std::time::{Duration, Instant};

use common::{client, quiet_config, spawn_server};
use http_echo::config::schema::OverrideMode;

#[tokio::test]
async fn default_response_is_ok() {
    let server = spawn_server(quiet_config()).await;

    let response = client().get(server.url("/")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["server"], "http-echo");
    assert_eq!(response.text().await.unwrap(), "OK\n");
}

#[tokio::test]
async fn any_method_and_path() {
    let server = spawn_server(quiet_config()).await;
    let client = client();

    let response = client
        .post(server.url("/some/deep/path?code=201"))
        .body("payload")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    assert_eq!(response.text().await.unwrap(), "Created\n");

    let response = client.delete(server.url("/x")).send().await.unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn code_parameter_sets_status_and_body() {
    let server = spawn_server(quiet_config()).await;

    let response = client().get(server.url("/?code=404")).send().await.unwrap();
    assert_eq!(response.status(), 404);
    assert_eq!(response.text().await.unwrap(), "Not Found\n");
}

#[tokio::test]
async fn code_is_not_sticky() {
    let server = spawn_server(quiet_config()).await;
    let client = client();

    assert_eq!(client.get(server.url("/?code=503")).send().await.unwrap().status(), 503);
    assert_eq!(client.get(server.url("/")).send().await.unwrap().status(), 200);
}

#[tokio::test]
async fn malformed_code_falls_back_to_default() {
    let server = spawn_server(quiet_config()).await;

    let response = client().get(server.url("/?code=abc")).send().await.unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn random_codes_cover_the_pool() {
    let server = spawn_server(quiet_config()).await;
    let client = client();

    let (mut ok, mut unavailable) = (0, 0);
    for _ in 0..200 {
        let response = client
            .get(server.url("/?code=random&codes=200,503"))
            .send()
            .await
            .unwrap();
        match response.status().as_u16() {
            200 => ok += 1,
            503 => unavailable += 1,
            other => panic!("unexpected status {other}"),
        }
    }

    assert!(ok > 50, "200 drawn {ok} times");
    assert!(unavailable > 50, "503 drawn {unavailable} times");
}

#[tokio::test]
async fn custom_headers_are_sent() {
    let server = spawn_server(quiet_config()).await;

    let response = client()
        .get(server.url("/?headers=X-Alpha,one,X-Beta,two"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["x-alpha"], "one");
    assert_eq!(response.headers()["x-beta"], "two");
}

#[tokio::test]
async fn odd_header_list_is_rejected() {
    let server = spawn_server(quiet_config()).await;

    let response = client()
        .get(server.url("/?headers=X-Alpha,one,X-Beta"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    assert_eq!(response.headers()["server"], "http-echo");
    assert!(!response.text().await.unwrap().is_empty());
}

#[tokio::test]
async fn location_header() {
    let server = spawn_server(quiet_config()).await;
    let client = reqwest::Client::builder()
        .no_proxy()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    let response = client
        .get(server.url("/?code=302&location=/elsewhere"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 302);
    assert_eq!(response.headers()["location"], "/elsewhere");
}

#[tokio::test]
async fn delay_is_applied() {
    let server = spawn_server(quiet_config()).await;

    let started = Instant::now();
    let response = client()
        .get(server.url("/?delay=100&jitter=0"))
        .send()
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(response.status(), 200);
    assert!(elapsed >= Duration::from_millis(100), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(150), "elapsed {elapsed:?}");
}

#[tokio::test]
async fn jitter_stays_below_bound() {
    let server = spawn_server(quiet_config()).await;

    let started = Instant::now();
    client().get(server.url("/?jitter=50")).send().await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn repeated_requests_are_identical() {
    let server = spawn_server(quiet_config()).await;
    let client = client();

    let mut seen = Vec::new();
    for _ in 0..2 {
        let response = client.get(server.url("/?code=418")).send().await.unwrap();
        let status = response.status();
        let mut headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter(|(name, _)| *name != "date")
            .map(|(name, value)| (name.to_string(), value.to_str().unwrap().to_string()))
            .collect();
        headers.sort();
        let body = response.bytes().await.unwrap();
        seen.push((status, headers, body));
    }

    assert_eq!(seen[0], seen[1]);
}

#[tokio::test]
async fn sticky_overrides_apply_to_later_requests() {
    let server = spawn_server(quiet_config()).await;
    let client = client();

    client.get(server.url("/?headers=X-Sticky,1")).send().await.unwrap();
    let response = client.get(server.url("/")).send().await.unwrap();
    assert_eq!(response.headers()["x-sticky"], "1");
}

#[tokio::test]
async fn request_mode_overrides_stay_local() {
    let mut config = quiet_config();
    config.response.override_mode = OverrideMode::Request;
    let server = spawn_server(config).await;
    let client = client();

    let first = client.get(server.url("/?headers=X-Local,1")).send().await.unwrap();
    assert_eq!(first.headers()["x-local"], "1");

    let second = client.get(server.url("/")).send().await.unwrap();
    assert!(second.headers().get("x-local").is_none());
}

#[tokio::test]
async fn configured_defaults_are_used() {
    let mut config = quiet_config();
    config.response.code = "202".into();
    config.response.headers = vec!["X-Default".into(), "yes".into()];
    let server = spawn_server(config).await;

    let response = client().get(server.url("/")).send().await.unwrap();
    assert_eq!(response.status(), 202);
    assert_eq!(response.headers()["x-default"], "yes");
    assert_eq!(response.text().await.unwrap(), "Accepted\n");
}

#[tokio::test]
async fn body_file_replaces_status_text() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("body.txt");
    std::fs::write(&path, "canned\n").unwrap();

    let mut config = quiet_config();
    config.response.body_file = Some(path.to_string_lossy().into_owned());
    let server = spawn_server(config).await;

    let response = client().get(server.url("/?code=500")).send().await.unwrap();
    assert_eq!(response.status(), 500);
    assert_eq!(response.text().await.unwrap(), "canned\n");
}

#[tokio::test]
async fn unsendable_status_becomes_server_error() {
    let server = spawn_server(quiet_config()).await;
    let client = client();

    for code in ["42", "1000", "70000", "-1"] {
        let response = client
            .get(server.url(&format!("/?code={code}")))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 500, "code={code}");
        assert_eq!(
            response.text().await.unwrap(),
            format!("status code {code} cannot be sent\n")
        );
    }
}

#[tokio::test]
async fn wide_codes_stay_in_the_random_pool() {
    let server = spawn_server(quiet_config()).await;

    let response = client()
        .get(server.url("/?code=random&codes=70000"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 500);
}
