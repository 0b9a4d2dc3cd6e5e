//! Alpha feed core crate.
//!
//! Current implemented scope:
//! - tolerant decoding of the alpha-report endpoint (repair, sanitize, extract)
//! - per-day grouping with one record per token
//! - token list assembly: merge by address, filter, sort, page
//! - report submission, re-analysis and the hourly analysis gate
//! - server-rendered dashboard over the backend API

mod assembler;
mod client;
mod config;
mod dashboard;
mod error;
mod extract;
mod feed_state;
mod format;
mod grouping;
mod observability;
mod opportunity;
mod render;
mod repair;
mod submission;
mod timestamp;
mod token;

pub use assembler::{
    apply_filters, assemble_token_list, merge_token_pages, sort_tokens, MarketCapCeiling, Pager,
    SortOrder, TokenFilters, TokenIndex, ALL_SORT_ORDERS, DEFAULT_PAGE_SIZE,
};
pub use client::{
    AlphaApiClient, ApiRequest, ApiResponse, HttpMethod, ReqwestTransport, Transport,
    API_KEY_HEADER, MAX_CURSOR_REPLAY_PAGES,
};
pub use config::{api_key_from_meta, require_api_key, DashboardConfig};
pub use dashboard::{
    dashboard_router, AlphaQuery, TokenDetailQuery, TokenQuery, DASHBOARD_ROUTES,
    MISSING_ADDRESS_MESSAGE, UNKNOWN_TOKEN_MESSAGE,
};
pub use error::{ConfigError, FeedError, ParseError, ValidationError};
pub use extract::{dollar_symbol, extract_opportunities, ReportPayload, UNKNOWN_TOKEN};
pub use feed_state::{LoadStep, LoadTicket, TokenFeed, TokenListMode, TokenPage};
pub use format::{
    adjust_date, escape_html, format_count, format_date_label, format_market_cap_compact,
    format_usd, truncate_address,
};
pub use grouping::{
    build_daily_feed, filter_most_recent_per_token, group_by_date, sort_newest_first, DateGroup,
};
pub use observability::{
    init_logging, log_app_bind, log_app_start, log_backend_selected, logging_config_from_env,
    logging_config_from_lookup, LogFormat, LoggingConfig, LoggingInitError,
};
pub use opportunity::{
    score_label, Opportunity, Recommendation, RejectReason, NO_ANALYSIS, UNKNOWN_CHAIN,
};
pub use render::{
    opportunity_card, render_alpha_page, render_report_page, render_token_detail,
    render_token_grid, token_card, ResumePoint, TokenDetailView, PAST_ANALYSIS_PAGE_SIZE,
};
pub use repair::{apply_repairs, parse_with_repair, repair_rules, sanitize, RepairRule};
pub use submission::{
    AnalysisAvailability, ReportForm, ScoutRequest, ScoutResult, ANALYSIS_COOLDOWN_MINUTES,
};
pub use timestamp::{date_key, normalize_timestamp, parse_date_param};
pub use token::{Chain, SocialPost, Token, TokenReport, ALL_CHAINS};
