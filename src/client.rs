//! Backend API client.
//!
//! All I/O goes through [`Transport`] so the feed logic can be exercised
//! against an in-memory backend. [`ReqwestTransport`] is the production
//! implementation.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Url};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::assembler::{MarketCapCeiling, TokenFilters};
use crate::config::require_api_key;
use crate::error::{FeedError, ParseError};
use crate::extract::{extract_opportunities, ReportPayload};
use crate::feed_state::{LoadStep, TokenFeed, TokenListMode, TokenPage};
use crate::opportunity::Opportunity;
use crate::repair::{parse_with_repair, sanitize};
use crate::submission::{ReportForm, ScoutRequest, ScoutResult};
use crate::token::Token;

pub const API_KEY_HEADER: &str = "x-key";

/// Upper bound on pages fetched when rebuilding a cursor feed.
pub const MAX_CURSOR_REPLAY_PAGES: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(&'static str, String)>,
    pub body: Option<String>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn post_json(path: impl Into<String>, body: String) -> Self {
        Self {
            method: HttpMethod::Post,
            path: path.into(),
            query: Vec::new(),
            headers: vec![("content-type", "application/json".to_string())],
            body: Some(body),
        }
    }

    pub fn with_query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub trait Transport: Send + Sync + 'static {
    fn execute(
        &self,
        request: ApiRequest,
    ) -> impl Future<Output = Result<ApiResponse, FeedError>> + Send;
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: Url,
}

impl ReqwestTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FeedError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| FeedError::Transport(format!("failed to build HTTP client: {err}")))?;
        let base_url = Url::parse(base_url)
            .map_err(|err| FeedError::Transport(format!("invalid base URL {base_url}: {err}")))?;
        Ok(Self { client, base_url })
    }

    fn url_for(&self, request: &ApiRequest) -> Result<Url, FeedError> {
        let mut url = self
            .base_url
            .join(&request.path)
            .map_err(|err| FeedError::Transport(format!("invalid path {}: {err}", request.path)))?;
        if !request.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &request.query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }
}

impl Transport for ReqwestTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, FeedError> {
        let url = self.url_for(&request)?;
        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let value = HeaderValue::from_str(value)
                .map_err(|err| FeedError::Transport(format!("invalid header {name}: {err}")))?;
            if *name == "content-type" {
                headers.insert(CONTENT_TYPE, value);
            } else {
                headers.insert(HeaderName::from_static(*name), value);
            }
        }

        let builder = match request.method {
            HttpMethod::Get => self.client.get(url.clone()),
            HttpMethod::Post => self.client.post(url.clone()),
        };
        let builder = match request.body {
            Some(body) => builder.headers(headers).body(body),
            None => builder.headers(headers),
        };

        let response = builder
            .send()
            .await
            .map_err(|err| FeedError::Transport(format!("request to {url} failed: {err}")))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|err| FeedError::Transport(format!("reading body from {url} failed: {err}")))?;

        Ok(ApiResponse { status, body })
    }
}

#[derive(Debug, Clone)]
pub struct AlphaApiClient<T> {
    transport: T,
    api_key: Option<String>,
    page_size: usize,
    settle_delay: Duration,
}

impl<T: Transport> AlphaApiClient<T> {
    pub fn new(transport: T, api_key: Option<String>, page_size: usize) -> Self {
        Self {
            transport,
            api_key,
            page_size: page_size.max(1),
            settle_delay: Duration::ZERO,
        }
    }

    /// Pause after a re-analysis before the caller reloads the token.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// `GET /api/alpha_reports`: repaired, sanitized and extracted.
    pub async fn fetch_alpha_reports(
        &self,
        date: Option<NaiveDate>,
    ) -> Result<Vec<Opportunity>, FeedError> {
        let mut request = ApiRequest::get("/api/alpha_reports");
        if let Some(day) = date {
            request = request.with_query("date", day.format("%Y-%m-%d").to_string());
        }

        let body = self.send_ok(request).await?;
        let value = sanitize(parse_with_repair(&body)?);
        let opportunities = extract_opportunities(ReportPayload::decode(value)?);

        info!(
            component = "alpha_api",
            event = "reports.fetch.ok",
            date = ?date,
            opportunities = opportunities.len()
        );
        Ok(opportunities)
    }

    /// `GET /api/tokens` in cursor mode.
    pub async fn fetch_token_page(
        &self,
        feed: &TokenFeed,
        cursor: Option<&str>,
    ) -> Result<TokenPage, FeedError> {
        let filters = feed.filters();
        let mut request = ApiRequest::get("/api/tokens")
            .with_query("per_page", feed.page_size().to_string())
            .with_query("chains", filters.chains_param())
            .with_query("sort_by", filters.sort.as_str());
        if let Some(cursor) = cursor {
            request = request.with_query("cursor", cursor);
        }
        if let MarketCapCeiling::Max(max) = filters.market_cap {
            request = request.with_query("market_cap_max", max.to_string());
        }

        let body = self.send_ok(request).await?;
        decode_json(&body)
    }

    /// `GET /api/tokens` in full-collection mode.
    pub async fn fetch_all_tokens(&self) -> Result<Vec<Token>, FeedError> {
        let body = self.send_ok(ApiRequest::get("/api/tokens")).await?;
        decode_json(&body)
    }

    /// `GET /api/token/{address}`; a 404 is `Ok(None)`.
    pub async fn fetch_token(&self, address: &str) -> Result<Option<Token>, FeedError> {
        let request = ApiRequest::get(format!("/api/token/{}", urlencoding::encode(address)))
            .with_query("include_latest_report", "true");
        let response = self.transport.execute(request).await?;
        if response.status == 404 {
            return Ok(None);
        }
        let body = ensure_success(response)?;
        decode_json(&body).map(Some)
    }

    /// `POST /api/multi_agent_alpha_scout`. Fails before dispatch when no
    /// API key is configured.
    pub async fn run_alpha_scout(&self, payload: &ScoutRequest) -> Result<ScoutResult, FeedError> {
        let api_key = require_api_key(self.api_key.as_deref())?;
        let body = serde_json::to_string(payload)
            .map_err(|err| FeedError::Transport(format!("failed to encode request: {err}")))?;
        let request = ApiRequest::post_json("/api/multi_agent_alpha_scout", body)
            .with_header(API_KEY_HEADER, api_key);

        let body = self.send_ok(request).await?;
        let value: Value = decode_json(&body)?;
        let result = ScoutResult::from_value(value)?;
        info!(
            component = "alpha_api",
            event = "scout.ok",
            name = %result.name,
            recommendation = %result.recommendation
        );
        Ok(result)
    }

    /// Validates the form, then submits it for analysis. Validation errors
    /// never reach the network.
    pub async fn submit_report(&self, form: &ReportForm) -> Result<ScoutResult, FeedError> {
        let report = form.validate()?;
        self.run_alpha_scout(&ScoutRequest::Report(report)).await
    }

    /// Re-runs the analysis for a token from its latest report, then waits
    /// for the backend to persist the new opportunity.
    pub async fn reanalyze_token(&self, token: &Token) -> Result<ScoutResult, FeedError> {
        let request = ScoutRequest::for_token(token)?;
        let result = self.run_alpha_scout(&request).await?;
        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }
        info!(
            component = "alpha_api",
            event = "token.reanalyzed",
            address = %token.address
        );
        Ok(result)
    }

    /// Pulls the next page of the feed, honouring its in-flight guard.
    /// Returns an empty list when a load is already running or nothing
    /// remains.
    pub async fn load_more(&self, feed: &mut TokenFeed) -> Result<Vec<Token>, FeedError> {
        let Some(ticket) = feed.begin_load() else {
            debug!(
                component = "token_feed",
                event = "feed.load.skipped",
                loading = feed.is_loading(),
                has_more = feed.has_more()
            );
            return Ok(Vec::new());
        };

        match ticket.step.clone() {
            LoadStep::FetchPage { cursor } => {
                match self.fetch_token_page(feed, cursor.as_deref()).await {
                    Ok(page) => Ok(feed.complete_page(ticket, page)),
                    Err(err) => {
                        feed.fail(ticket);
                        Err(err)
                    }
                }
            }
            LoadStep::FetchCollection => match self.fetch_all_tokens().await {
                Ok(tokens) => Ok(feed.complete_collection(ticket, tokens)),
                Err(err) => {
                    feed.fail(ticket);
                    Err(err)
                }
            },
            LoadStep::FromPager => Ok(feed.complete_from_pager(ticket)),
        }
    }

    /// Rebuilds a cursor feed from its first page through the page fetched
    /// with `cursor`. Repeated addresses merge into the entry already shown.
    /// Stops early when the chain ends, a cursor repeats or the replay limit
    /// is reached.
    pub async fn load_through_cursor(
        &self,
        feed: &mut TokenFeed,
        cursor: &str,
    ) -> Result<(), FeedError> {
        let mut visited = HashSet::new();
        for _ in 0..MAX_CURSOR_REPLAY_PAGES {
            let requested = feed.next_cursor().map(str::to_string);
            self.load_more(feed).await?;
            if requested.as_deref() == Some(cursor) || !feed.has_more() {
                return Ok(());
            }
            if let Some(next) = feed.next_cursor() {
                if !visited.insert(next.to_string()) {
                    warn!(
                        component = "token_feed",
                        event = "feed.replay.cursor_repeated",
                        cursor = next
                    );
                    return Ok(());
                }
            }
        }
        warn!(
            component = "token_feed",
            event = "feed.replay.limit_reached",
            target = cursor,
            pages = MAX_CURSOR_REPLAY_PAGES
        );
        Ok(())
    }

    pub fn token_feed(&self, mode: TokenListMode, filters: TokenFilters) -> TokenFeed {
        TokenFeed::new(mode, filters, self.page_size)
    }

    async fn send_ok(&self, request: ApiRequest) -> Result<String, FeedError> {
        let path = request.path.clone();
        let response = self.transport.execute(request).await.inspect_err(|err| {
            warn!(
                component = "alpha_api",
                event = "request.transport_error",
                path = %path,
                error = %err
            );
        })?;
        ensure_success(response).inspect_err(|err| {
            warn!(
                component = "alpha_api",
                event = "request.http_error",
                path = %path,
                error = %err
            );
        })
    }
}

fn ensure_success(response: ApiResponse) -> Result<String, FeedError> {
    if response.is_success() {
        Ok(response.body)
    } else {
        Err(FeedError::Fetch {
            status: response.status,
            body: response.body,
        })
    }
}

fn decode_json<D: serde::de::DeserializeOwned>(body: &str) -> Result<D, FeedError> {
    serde_json::from_str(body).map_err(|err| FeedError::Parse(ParseError::Malformed(err.to_string())))
}
