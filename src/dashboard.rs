//! HTTP routes for the alpha feed, token grid, token detail and report form.

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::assembler::{MarketCapCeiling, SortOrder, TokenFilters};
use crate::client::{AlphaApiClient, Transport};
use crate::error::FeedError;
use crate::feed_state::TokenListMode;
use crate::grouping::build_daily_feed;
use crate::render::{
    render_alpha_page, render_report_page, render_token_detail, render_token_error,
    render_token_grid, token_href, tokens_href, ResumePoint, TokenDetailView,
};
use crate::submission::{AnalysisAvailability, ReportForm};
use crate::timestamp::parse_date_param;
use crate::token::{Chain, ALL_CHAINS};

pub const MISSING_ADDRESS_MESSAGE: &str = "No token address provided";
pub const UNKNOWN_TOKEN_MESSAGE: &str = "No opportunities found for token address";

/// Every path the router serves, as reported in the bind event.
pub const DASHBOARD_ROUTES: [&str; 6] = [
    "/",
    "/feed/snapshot",
    "/tokens",
    "/token",
    "/token/analyze",
    "/reports",
];

pub fn dashboard_router<T: Transport>(client: AlphaApiClient<T>, mode: TokenListMode) -> Router {
    let [alpha, snapshot, tokens, token, analyze, reports] = DASHBOARD_ROUTES;
    Router::new()
        .route(alpha, get(get_alpha_feed::<T>))
        .route(snapshot, get(get_feed_snapshot::<T>))
        .route(tokens, get(get_tokens::<T>))
        .route(token, get(get_token_detail::<T>))
        .route(analyze, post(post_token_analysis::<T>))
        .route(reports, get(get_report_form).post(post_report::<T>))
        .with_state(DashboardAppState {
            client: Arc::new(client),
            mode,
        })
}

struct DashboardAppState<T> {
    client: Arc<AlphaApiClient<T>>,
    mode: TokenListMode,
}

impl<T> Clone for DashboardAppState<T> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            mode: self.mode,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AlphaQuery {
    #[serde(default)]
    pub date: Option<String>,
}

impl AlphaQuery {
    fn requested_date(&self) -> Option<chrono::NaiveDate> {
        let raw = self.date.as_deref()?.trim();
        if raw.is_empty() {
            return None;
        }
        let parsed = parse_date_param(raw);
        if parsed.is_none() {
            warn!(
                component = "dashboard",
                event = "alpha.invalid_date_param",
                date = raw
            );
        }
        parsed
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    #[serde(default)]
    pub chains: Option<String>,
    #[serde(default)]
    pub market_cap: Option<String>,
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub page: Option<String>,
}

impl TokenQuery {
    /// Unknown values fall back to the defaults rather than failing the page.
    pub fn filters(&self) -> TokenFilters {
        let mut chains: BTreeSet<Chain> = self
            .chains
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .filter_map(|raw| raw.parse().ok())
            .collect();
        if chains.is_empty() {
            chains = ALL_CHAINS.into_iter().collect();
        }

        TokenFilters {
            chains,
            market_cap: self
                .market_cap
                .as_deref()
                .and_then(MarketCapCeiling::parse)
                .unwrap_or_default(),
            sort: self
                .sort
                .as_deref()
                .and_then(|raw| raw.parse::<SortOrder>().ok())
                .unwrap_or_default(),
        }
    }

    /// Full mode: pages already on screen before this "load more".
    pub fn pages_shown(&self) -> usize {
        lenient_number(self.page.as_deref()).unwrap_or(0)
    }

    pub fn cursor(&self) -> Option<&str> {
        self.cursor
            .as_deref()
            .map(str::trim)
            .filter(|cursor| !cursor.is_empty())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TokenDetailQuery {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub past_page: Option<String>,
}

impl TokenDetailQuery {
    pub fn past_page(&self) -> usize {
        lenient_number(self.past_page.as_deref())
            .filter(|page| *page > 0)
            .unwrap_or(1)
    }

    fn address(&self) -> Option<&str> {
        self.address
            .as_deref()
            .map(str::trim)
            .filter(|address| !address.is_empty())
    }
}

/// Malformed numbers fall back to the caller's default instead of a 400.
fn lenient_number(raw: Option<&str>) -> Option<usize> {
    raw?.trim().parse().ok()
}

fn error_status(err: &FeedError) -> StatusCode {
    match err {
        FeedError::Fetch { .. } | FeedError::Transport(_) | FeedError::Parse(_) => {
            StatusCode::BAD_GATEWAY
        }
        FeedError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        FeedError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn get_alpha_feed<T: Transport>(
    State(state): State<DashboardAppState<T>>,
    Query(query): Query<AlphaQuery>,
) -> Response {
    let requested = query.requested_date();
    let today = Utc::now().date_naive();

    match state.client.fetch_alpha_reports(requested).await {
        Ok(opportunities) => {
            let feed = build_daily_feed(opportunities);
            Html(render_alpha_page(requested, today, Ok(&feed))).into_response()
        }
        Err(err) => {
            warn!(
                component = "dashboard",
                event = "alpha.load_failed",
                error = %err
            );
            (
                error_status(&err),
                Html(render_alpha_page(requested, today, Err(err.to_string()))),
            )
                .into_response()
        }
    }
}

async fn get_feed_snapshot<T: Transport>(
    State(state): State<DashboardAppState<T>>,
    Query(query): Query<AlphaQuery>,
) -> Response {
    let requested = query.requested_date();
    info!(
        component = "dashboard",
        event = "http.snapshot.request",
        date = ?requested
    );
    match state.client.fetch_alpha_reports(requested).await {
        Ok(opportunities) => Json(build_daily_feed(opportunities)).into_response(),
        Err(err) => (
            error_status(&err),
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
    }
}

async fn get_tokens<T: Transport>(
    State(state): State<DashboardAppState<T>>,
    Query(query): Query<TokenQuery>,
) -> Response {
    let filters = query.filters();
    let mut feed = state.client.token_feed(state.mode, filters.clone());
    let loaded = match (state.mode, query.cursor()) {
        (TokenListMode::Cursor, Some(cursor)) => {
            state.client.load_through_cursor(&mut feed, cursor).await
        }
        (TokenListMode::Cursor, None) => state.client.load_more(&mut feed).await.map(drop),
        (TokenListMode::Full, _) => {
            feed.replay_pages(query.pages_shown());
            state.client.load_more(&mut feed).await.map(drop)
        }
    };

    match loaded {
        Ok(()) => {
            let resume = match (feed.has_more(), state.mode) {
                (false, _) => None,
                (true, TokenListMode::Cursor) => {
                    feed.next_cursor().map(|c| ResumePoint::Cursor(c.to_string()))
                }
                (true, TokenListMode::Full) => Some(ResumePoint::Page(feed.pages_rendered())),
            };
            info!(
                component = "dashboard",
                event = "tokens.page_rendered",
                mode = %state.mode,
                sort = filters.sort.as_str(),
                tokens = feed.displayed().len(),
                has_more = resume.is_some()
            );
            Html(render_token_grid(&filters, Ok(feed.displayed()), resume.as_ref())).into_response()
        }
        Err(err) => {
            warn!(
                component = "dashboard",
                event = "tokens.load_failed",
                href = %tokens_href(&filters, None),
                error = %err
            );
            (
                error_status(&err),
                Html(render_token_grid(&filters, Err(err.to_string()), None)),
            )
                .into_response()
        }
    }
}

async fn get_token_detail<T: Transport>(
    State(state): State<DashboardAppState<T>>,
    Query(query): Query<TokenDetailQuery>,
) -> Response {
    let Some(address) = query.address() else {
        return (
            StatusCode::BAD_REQUEST,
            Html(render_token_error(MISSING_ADDRESS_MESSAGE, None)),
        )
            .into_response();
    };

    match state.client.fetch_token(address).await {
        Ok(Some(token)) => {
            let view = TokenDetailView {
                availability: AnalysisAvailability::for_token(&token, Utc::now()),
                token: &token,
                past_page: query.past_page(),
                notice: None,
            };
            Html(render_token_detail(&view)).into_response()
        }
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Html(render_token_error(UNKNOWN_TOKEN_MESSAGE, None)),
        )
            .into_response(),
        Err(err) => (
            error_status(&err),
            Html(render_token_error(
                &err.to_string(),
                Some(&token_href(address)),
            )),
        )
            .into_response(),
    }
}

async fn post_token_analysis<T: Transport>(
    State(state): State<DashboardAppState<T>>,
    Query(query): Query<TokenDetailQuery>,
) -> Response {
    let Some(address) = query.address() else {
        return (
            StatusCode::BAD_REQUEST,
            Html(render_token_error(MISSING_ADDRESS_MESSAGE, None)),
        )
            .into_response();
    };

    let token = match state.client.fetch_token(address).await {
        Ok(Some(token)) => token,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Html(render_token_error(UNKNOWN_TOKEN_MESSAGE, None)),
            )
                .into_response()
        }
        Err(err) => {
            return (
                error_status(&err),
                Html(render_token_error(&err.to_string(), Some(&token_href(address)))),
            )
                .into_response()
        }
    };

    let availability = AnalysisAvailability::for_token(&token, Utc::now());
    if !availability.is_ready() {
        info!(
            component = "dashboard",
            event = "analysis.gated",
            address,
            message = %availability.message()
        );
        return Redirect::to(&token_href(address)).into_response();
    }

    match state.client.reanalyze_token(&token).await {
        Ok(_) => Redirect::to(&token_href(address)).into_response(),
        Err(err) => {
            warn!(
                component = "dashboard",
                event = "analysis.failed",
                address,
                error = %err
            );
            let view = TokenDetailView {
                token: &token,
                availability,
                past_page: 1,
                notice: Some(err.to_string()),
            };
            (error_status(&err), Html(render_token_detail(&view))).into_response()
        }
    }
}

async fn get_report_form() -> impl IntoResponse {
    Html(render_report_page(None))
}

async fn post_report<T: Transport>(
    State(state): State<DashboardAppState<T>>,
    Form(form): Form<ReportForm>,
) -> Response {
    match state.client.submit_report(&form).await {
        Ok(result) => Html(render_report_page(Some(Ok(&result)))).into_response(),
        Err(err) => {
            warn!(
                component = "dashboard",
                event = "report.rejected",
                error = %err
            );
            (
                error_status(&err),
                Html(render_report_page(Some(Err(err.to_string())))),
            )
                .into_response()
        }
    }
}
