use std::sync::{Arc, Mutex};

use alpha_feed::{
    dashboard_router, AlphaApiClient, ApiRequest, ApiResponse, FeedError, HttpMethod,
    TokenListMode, Transport, API_KEY_HEADER,
};
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::util::ServiceExt;

type Handler = dyn Fn(&ApiRequest) -> ApiResponse + Send + Sync;

#[derive(Clone)]
struct FakeBackend {
    handler: Arc<Handler>,
    requests: Arc<Mutex<Vec<ApiRequest>>>,
}

impl FakeBackend {
    fn new(handler: impl Fn(&ApiRequest) -> ApiResponse + Send + Sync + 'static) -> Self {
        Self {
            handler: Arc::new(handler),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn requests(&self) -> Vec<ApiRequest> {
        self.requests
            .lock()
            .expect("request log should not be poisoned")
            .clone()
    }
}

impl Transport for FakeBackend {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, FeedError> {
        let response = (self.handler)(&request);
        self.requests
            .lock()
            .expect("request log should not be poisoned")
            .push(request);
        Ok(response)
    }
}

fn ok(body: impl Into<String>) -> ApiResponse {
    ApiResponse {
        status: 200,
        body: body.into(),
    }
}

fn status(code: u16) -> ApiResponse {
    ApiResponse {
        status: code,
        body: "unavailable".to_string(),
    }
}

fn app(backend: &FakeBackend, api_key: Option<&str>, mode: TokenListMode) -> Router {
    let client = AlphaApiClient::new(backend.clone(), api_key.map(str::to_string), 2);
    dashboard_router(client, mode)
}

async fn get(app: Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

async fn post_form(app: Router, uri: &str, form: &str) -> (StatusCode, Option<String>, String) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(form.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let location = response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, location, String::from_utf8(body.to_vec()).unwrap())
}

fn token_json(address: &str, chain: &str, opportunity_at: Option<String>) -> Value {
    let opportunities = opportunity_at
        .map(|created_at| {
            json!([{
                "name": "FOO",
                "created_at": created_at,
                "recommendation": "buy",
                "market_cap": 2500000.0,
                "justification": "momentum",
                "sources": ["https://warpcast.com/kol/1"]
            }])
        })
        .unwrap_or(Value::Null);
    json!({
        "address": address,
        "symbol": "FOO",
        "name": "Foo Token",
        "chain": chain,
        "created_at": "2024-01-01T00:00:00",
        "token_reports": [{
            "id": 42,
            "mentions_purchasable_token": true,
            "token_symbol": "FOO",
            "token_chain": chain,
            "token_address": address,
            "is_listed_on_dex": true,
            "trading_pairs": null,
            "confidence_score": 8,
            "reasoning": "kols are buying",
            "created_at": "2024-01-01T00:00:00",
            "social_media_post": {
                "post_id": "p1",
                "text": "$FOO is live",
                "author_username": "kol",
                "reactions_count": 3,
                "replies_count": 1,
                "reposts_count": 0
            }
        }],
        "token_opportunities": opportunities
    })
}

fn scout_result() -> String {
    json!({
        "name": "FOO",
        "chain": "base",
        "justification": "fresh analysis",
        "sources": ["https://example.com"],
        "recommendation": "SELL"
    })
    .to_string()
}

#[tokio::test]
async fn alpha_page_repairs_groups_and_dedups_reports() {
    // Missing comma between objects, ":"-prefixed timestamps and address.
    let body = r#"[{"id":1,"token_chain":"base","created_at":":2024-03-15T09:00:00","message":"$FOO","contract_address":":0xabc","recommendation":"buy"}{"id":2,"token_chain":"base","created_at":":2024-03-15T11:00:00.123","message":"$FOO again","recommendation":"buy"},{"id":3,"created_at":":2024-03-14T08:00:00","message":"$BAR"}]"#;
    let backend = FakeBackend::new(move |_| ok(body));

    let (status, html) = get(app(&backend, None, TokenListMode::Full), "/?date=2024-03-15").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(html.matches("<h3>FOO</h3>").count(), 1);
    assert!(html.contains("<h3>BAR</h3>"));
    assert!(html.contains("2024-03-15 11:00 UTC"));
    assert!(html.contains("recommendation-buy"));
    assert!(html.find("data-date=\"2024-03-15\"") < html.find("data-date=\"2024-03-14\""));

    let requests = backend.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path, "/api/alpha_reports");
    assert_eq!(requests[0].query_value("date"), Some("2024-03-15"));
}

#[tokio::test]
async fn alpha_page_without_date_sends_no_date_upstream() {
    let backend = FakeBackend::new(|_| ok("[]"));

    let (status, html) = get(app(&backend, None, TokenListMode::Full), "/").await;

    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("No alpha reports for this date."));
    assert!(html.contains("Today"));
    assert_eq!(backend.requests()[0].query_value("date"), None);
}

#[tokio::test]
async fn alpha_page_shows_retry_block_on_upstream_failure() {
    let backend = FakeBackend::new(|_| status(500));

    let (status, html) = get(app(&backend, None, TokenListMode::Full), "/?date=2024-03-15").await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(html.contains("HTTP error! status: 500. unavailable"));
    assert!(html.contains("Try Again"));
    assert!(html.contains("href=\"/?date=2024-03-15\""));
}

#[tokio::test]
async fn unrepairable_payload_is_a_parse_error() {
    let backend = FakeBackend::new(|_| ok("{not json"));

    let (status, html) = get(app(&backend, None, TokenListMode::Full), "/").await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(html.contains("Failed to parse API response"));
}

#[tokio::test]
async fn feed_snapshot_returns_grouped_json() {
    let body = json!({
        "created_at": "2024-03-15T09:00:00",
        "opportunities": [
            {"name": "FOO", "created_at": "2024-03-15T09:00:00"},
            {"name": "FOO", "created_at": "2024-03-15T10:00:00", "market_cap": 5}
        ]
    })
    .to_string();
    let backend = FakeBackend::new(move |_| ok(body.clone()));

    let (status, text) = get(app(&backend, None, TokenListMode::Full), "/feed/snapshot").await;
    assert_eq!(status, StatusCode::OK);

    let groups: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(groups.as_array().unwrap().len(), 1);
    assert_eq!(groups[0]["date"], "2024-03-15");
    assert_eq!(groups[0]["opportunities"].as_array().unwrap().len(), 1);
    assert_eq!(groups[0]["opportunities"][0]["market_cap"], json!(5.0));
}

fn card_addresses(html: &str) -> Vec<&str> {
    html.split("data-address=\"")
        .skip(1)
        .filter_map(|rest| rest.split('"').next())
        .collect()
}

fn cursor_page(addresses: &[&str], next_cursor: Option<&str>) -> ApiResponse {
    let tokens: Vec<Value> = addresses
        .iter()
        .map(|address| token_json(address, "base", None))
        .collect();
    ok(json!({
        "tokens": tokens,
        "has_more": next_cursor.is_some(),
        "next_cursor": next_cursor
    })
    .to_string())
}

#[tokio::test]
async fn token_grid_full_mode_pages_locally_with_filters() {
    let tokens = json!([
        token_json("0xaaaaaaaaaaaa1111", "base", None),
        token_json("So1anaAddress2222", "solana", None),
        token_json("0xbbbbbbbbbbbb3333", "base", None),
        token_json("0xcccccccccccc4444", "base", None)
    ])
    .to_string();
    let backend = FakeBackend::new(move |_| ok(tokens.clone()));

    let (status, html) = get(
        app(&backend, None, TokenListMode::Full),
        "/tokens?chains=base&sort=kol_events",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        card_addresses(&html),
        vec!["0xaaaaaaaaaaaa1111", "0xbbbbbbbbbbbb3333"]
    );
    assert!(!html.contains("So1anaAddress2222"));
    assert!(html.contains("0xaa...1111"));
    assert!(html.contains("page=1"));

    let (_, html) = get(
        app(&backend, None, TokenListMode::Full),
        "/tokens?chains=base&sort=kol_events&page=1",
    )
    .await;
    assert_eq!(
        card_addresses(&html),
        vec![
            "0xaaaaaaaaaaaa1111",
            "0xbbbbbbbbbbbb3333",
            "0xcccccccccccc4444"
        ]
    );
    assert!(!html.contains("id=\"load-more\""));

    let requests = backend.requests();
    assert!(requests
        .iter()
        .all(|r| r.path == "/api/tokens" && r.query.is_empty()));
}

#[tokio::test]
async fn token_grid_full_mode_keeps_every_earlier_page() {
    let tokens = Value::Array(
        (0..5)
            .map(|i| token_json(&format!("0x{i}{i}{i}{i}{i}{i}{i}{i}{i}{i}"), "base", None))
            .collect(),
    )
    .to_string();
    let backend = FakeBackend::new(move |_| ok(tokens.clone()));

    let (_, html) = get(app(&backend, None, TokenListMode::Full), "/tokens?page=1").await;
    assert_eq!(card_addresses(&html).len(), 4);
    assert!(html.contains("page=2"));

    let (_, html) = get(app(&backend, None, TokenListMode::Full), "/tokens?page=2").await;
    let shown = card_addresses(&html);
    assert_eq!(shown.len(), 5);
    assert_eq!(shown[0], "0x0000000000");
    assert_eq!(shown[4], "0x4444444444");
    assert!(!html.contains("id=\"load-more\""));
}

#[tokio::test]
async fn token_grid_ignores_malformed_page_numbers() {
    let tokens = json!([
        token_json("0xaaaaaaaaaaaa1111", "base", None),
        token_json("0xbbbbbbbbbbbb2222", "base", None),
        token_json("0xcccccccccccc3333", "base", None)
    ])
    .to_string();
    let backend = FakeBackend::new(move |_| ok(tokens.clone()));

    let (status, html) = get(app(&backend, None, TokenListMode::Full), "/tokens?page=next").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(card_addresses(&html).len(), 2);
}

#[tokio::test]
async fn token_grid_cursor_mode_forwards_filters_and_cursor() {
    let backend = FakeBackend::new(|request| match request.query_value("cursor") {
        None => cursor_page(&["0xaaaaaaaaaaaa1111"], Some("c2")),
        Some(_) => cursor_page(&["0xbbbbbbbbbbbb2222"], None),
    });

    let (_, html) = get(
        app(&backend, None, TokenListMode::Cursor),
        "/tokens?chains=base&market_cap=1000000&sort=market_cap",
    )
    .await;
    assert!(html.contains("cursor=c2"));

    let (_, html) = get(
        app(&backend, None, TokenListMode::Cursor),
        "/tokens?chains=base&market_cap=1000000&sort=market_cap&cursor=c2",
    )
    .await;
    assert_eq!(
        card_addresses(&html),
        vec!["0xaaaaaaaaaaaa1111", "0xbbbbbbbbbbbb2222"]
    );
    assert!(!html.contains("id=\"load-more\""));

    let requests = backend.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[0].query_value("chains"), Some("base"));
    assert_eq!(requests[0].query_value("sort_by"), Some("market_cap"));
    assert_eq!(requests[0].query_value("market_cap_max"), Some("1000000"));
    assert_eq!(requests[0].query_value("per_page"), Some("2"));
    assert_eq!(requests[0].query_value("cursor"), None);
    assert_eq!(requests[1].query_value("cursor"), None);
    assert_eq!(requests[2].query_value("cursor"), Some("c2"));
    assert!(requests
        .iter()
        .all(|r| r.query_value("sort_by") == Some("market_cap")));
}

#[tokio::test]
async fn token_grid_cursor_overlap_is_shown_once() {
    let backend = FakeBackend::new(|request| match request.query_value("cursor") {
        None => cursor_page(&["0xaaaaaaaaaaaa1111", "0xbbbbbbbbbbbb2222"], Some("c2")),
        Some("c2") => cursor_page(&["0xbbbbbbbbbbbb2222", "0xcccccccccccc3333"], Some("c3")),
        Some(_) => cursor_page(&["0xdddddddddddd4444"], None),
    });

    let (status, html) = get(app(&backend, None, TokenListMode::Cursor), "/tokens?cursor=c2").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        card_addresses(&html),
        vec![
            "0xaaaaaaaaaaaa1111",
            "0xbbbbbbbbbbbb2222",
            "0xcccccccccccc3333"
        ]
    );
    assert!(html.contains("cursor=c3"));
    assert_eq!(backend.requests().len(), 2);
}

#[tokio::test]
async fn token_grid_empty_state() {
    let backend = FakeBackend::new(|_| ok("[]"));
    let (status, html) = get(app(&backend, None, TokenListMode::Full), "/tokens").await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("No tokens found."));
}

#[tokio::test]
async fn token_detail_errors_are_inline() {
    let backend = FakeBackend::new(|_| status(404));

    let (status, html) = get(app(&backend, None, TokenListMode::Full), "/token").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(html.contains("No token address provided"));

    let (status, html) = get(app(&backend, None, TokenListMode::Full), "/token?address=0xdead").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(html.contains("No opportunities found for token address"));

    let requests = backend.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].path, "/api/token/0xdead");
    assert_eq!(requests[0].query_value("include_latest_report"), Some("true"));
}

#[tokio::test]
async fn token_detail_shows_gate_while_cooling_down() {
    let recent = (Utc::now() - Duration::minutes(20))
        .format("%Y-%m-%dT%H:%M:%S")
        .to_string();
    let token = token_json("0xaaaaaaaaaaaa1111", "base", Some(recent)).to_string();
    let backend = FakeBackend::new(move |_| ok(token.clone()));

    let (status, html) = get(
        app(&backend, Some("key"), TokenListMode::Full),
        "/token?address=0xaaaaaaaaaaaa1111",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("Foo Token"));
    assert!(html.contains("Available in"));
    assert!(html.contains("http-equiv=\"refresh\""));
    assert!(html.contains("dexscreener.com/base/0xaaaaaaaaaaaa1111"));
    assert!(html.contains("$FOO is live"));
    assert!(!html.contains("Run Analysis"));
}

#[tokio::test]
async fn analysis_posts_linked_report_then_redirects() {
    let old = (Utc::now() - Duration::hours(3))
        .format("%Y-%m-%dT%H:%M:%S")
        .to_string();
    let token = token_json("0xaaaaaaaaaaaa1111", "base", Some(old)).to_string();
    let backend = FakeBackend::new(move |request| match request.method {
        HttpMethod::Get => ok(token.clone()),
        HttpMethod::Post => ok(scout_result()),
    });

    let (status, location, _) = post_form(
        app(&backend, Some("secret"), TokenListMode::Full),
        "/token/analyze?address=0xaaaaaaaaaaaa1111",
        "",
    )
    .await;

    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location.as_deref(), Some("/token?address=0xaaaaaaaaaaaa1111"));

    let requests = backend.requests();
    let scout = requests
        .iter()
        .find(|r| r.method == HttpMethod::Post)
        .expect("scout request should be sent");
    assert_eq!(scout.path, "/api/multi_agent_alpha_scout");
    assert!(scout
        .headers
        .iter()
        .any(|(name, value)| *name == API_KEY_HEADER && value == "secret"));
    let body: Value = serde_json::from_str(scout.body.as_deref().unwrap()).unwrap();
    assert_eq!(body["token_report_id"], json!(42));
    assert_eq!(body["token_report"]["trading_pairs"], json!([]));
    assert_eq!(body["token_report"]["confidence_score"], json!(8));
}

#[tokio::test]
async fn analysis_without_api_key_never_reaches_the_scout() {
    let token = token_json("0xaaaaaaaaaaaa1111", "base", None).to_string();
    let backend = FakeBackend::new(move |_| ok(token.clone()));

    let (status, _, html) = post_form(
        app(&backend, None, TokenListMode::Full),
        "/token/analyze?address=0xaaaaaaaaaaaa1111",
        "",
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(html.contains("API key is missing or empty"));
    assert!(backend
        .requests()
        .iter()
        .all(|r| r.method == HttpMethod::Get));
}

#[tokio::test]
async fn report_validation_happens_before_any_request() {
    let backend = FakeBackend::new(|_| ok(scout_result()));

    let (status, _, html) = post_form(
        app(&backend, Some("secret"), TokenListMode::Full),
        "/reports",
        "token_symbol=FOO&confidence_score=11&reasoning=solid",
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(html.contains("Confidence score must be between 1 and 10"));

    let (status, _, html) = post_form(
        app(&backend, Some("secret"), TokenListMode::Full),
        "/reports",
        "token_symbol=FOO&confidence_score=5&reasoning=",
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(html.contains("Reasoning is required"));

    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn valid_report_renders_the_analysis() {
    let backend = FakeBackend::new(|_| ok(scout_result()));

    let (status, _, html) = post_form(
        app(&backend, Some("secret"), TokenListMode::Full),
        "/reports",
        "mentions_purchasable_token=on&token_symbol=FOO&token_chain=base&trading_pairs=FOO%2FWETH&confidence_score=6&reasoning=solid",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("recommendation-sell"));
    assert!(html.contains("fresh analysis"));

    let requests = backend.requests();
    assert_eq!(requests.len(), 1);
    let body: Value = serde_json::from_str(requests[0].body.as_deref().unwrap()).unwrap();
    assert_eq!(body["mentions_purchasable_token"], json!(true));
    assert_eq!(body["is_listed_on_dex"], json!(false));
    assert_eq!(body["trading_pairs"], json!(["FOO/WETH"]));
}
