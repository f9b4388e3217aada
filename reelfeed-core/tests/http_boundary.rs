use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use reelfeed_core::{
    FetchError, HttpFetcher, PageFetcher, PublishError, Publisher, PublisherSection,
    TelegramPublisher,
};

const USER_AGENT: &str = "reelfeed-test/1.0";

fn fetcher() -> HttpFetcher {
    HttpFetcher::with_identity(USER_AGENT, Duration::from_secs(5)).unwrap()
}

fn publisher_section(api_base: String) -> PublisherSection {
    PublisherSection {
        api_base,
        channel_id: "-1001234567890".into(),
        token_env: "REELFEED_BOT_TOKEN".into(),
        header: "Recently Posted Movie".into(),
        timeout_seconds: 5,
    }
}

#[tokio::test]
async fn fetch_returns_body_and_sends_configured_user_agent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/movie-a"))
        .and(header("user-agent", USER_AGENT))
        .respond_with(ResponseTemplate::new(200).set_body_string("<h1>Download Movie A</h1>"))
        .expect(1)
        .mount(&server)
        .await;

    let body = fetcher()
        .fetch(&format!("{}/movie-a", server.uri()))
        .await
        .unwrap();

    assert_eq!(body, "<h1>Download Movie A</h1>");
}

#[tokio::test]
async fn non_success_status_is_a_fetch_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/movie-b"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let url = format!("{}/movie-b", server.uri());
    let err = fetcher().fetch(&url).await.unwrap_err();

    match err {
        FetchError::Status { url: failed, status } => {
            assert_eq!(failed, url);
            assert_eq!(status, 503);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn publisher_posts_html_message_to_the_channel() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123-abc/sendMessage"))
        .and(body_json(json!({
            "chat_id": "-1001234567890",
            "text": "<b>Movie A</b>",
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "ok": true, "result": {} })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let publisher = TelegramPublisher::with_token(&publisher_section(server.uri()), "123-abc")
        .unwrap();

    publisher.post("<b>Movie A</b>").await.unwrap();
}

#[tokio::test]
async fn refused_message_is_rejected_with_description() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123-abc/sendMessage"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "ok": false,
            "error_code": 400,
            "description": "Bad Request: chat not found",
        })))
        .mount(&server)
        .await;

    let publisher = TelegramPublisher::with_token(&publisher_section(server.uri()), "123-abc")
        .unwrap();
    let err = publisher.post("<b>Movie A</b>").await.unwrap_err();

    match err {
        PublishError::Rejected {
            status,
            description,
        } => {
            assert_eq!(status, 400);
            assert_eq!(description, "Bad Request: chat not found");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn ok_false_with_success_status_is_still_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bot123-abc/sendMessage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": false })))
        .mount(&server)
        .await;

    let publisher = TelegramPublisher::with_token(&publisher_section(server.uri()), "123-abc")
        .unwrap();
    let err = publisher.post("<b>Movie A</b>").await.unwrap_err();

    assert!(matches!(err, PublishError::Rejected { status: 200, .. }));
}
