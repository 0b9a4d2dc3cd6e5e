//! Token list assembly: merge pages by address, filter, sort and slice into
//! append-only pages.

use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::token::{Chain, Token, ALL_CHAINS};

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    RecentOpportunity,
    MarketCap,
    KolEvents,
    RecentSocial,
}

pub const ALL_SORT_ORDERS: [SortOrder; 4] = [
    SortOrder::RecentOpportunity,
    SortOrder::MarketCap,
    SortOrder::KolEvents,
    SortOrder::RecentSocial,
];

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RecentOpportunity => "recent_opportunity",
            Self::MarketCap => "market_cap",
            Self::KolEvents => "kol_events",
            Self::RecentSocial => "recent_social",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::RecentOpportunity => "Most recent opportunity",
            Self::MarketCap => "Market cap",
            Self::KolEvents => "KOL events",
            Self::RecentSocial => "Most recent social post",
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        ALL_SORT_ORDERS
            .into_iter()
            .find(|order| order.as_str() == raw.trim())
            .ok_or_else(|| format!("unknown sort order: {raw}"))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum MarketCapCeiling {
    #[default]
    All,
    Max(f64),
}

impl MarketCapCeiling {
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            return Some(Self::All);
        }
        trimmed
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .map(Self::Max)
    }

    /// Tokens without a reported market cap count as 0.
    pub fn admits(self, market_cap: Option<f64>) -> bool {
        match self {
            Self::All => true,
            Self::Max(ceiling) => market_cap.unwrap_or(0.0) <= ceiling,
        }
    }
}

impl fmt::Display for MarketCapCeiling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Max(value) => write!(f, "{value}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TokenFilters {
    pub chains: BTreeSet<Chain>,
    pub market_cap: MarketCapCeiling,
    pub sort: SortOrder,
}

impl Default for TokenFilters {
    fn default() -> Self {
        Self {
            chains: ALL_CHAINS.into_iter().collect(),
            market_cap: MarketCapCeiling::All,
            sort: SortOrder::default(),
        }
    }
}

impl TokenFilters {
    pub fn chains_param(&self) -> String {
        self.chains
            .iter()
            .map(|chain| chain.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Accumulates tokens keyed by address in first-seen order. A repeated
/// address has its reports and opportunities appended, never overwritten.
#[derive(Debug, Clone, Default)]
pub struct TokenIndex {
    tokens: Vec<Token>,
    positions: HashMap<String, usize>,
}

impl TokenIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when the address was not seen before.
    pub fn insert(&mut self, token: Token) -> bool {
        match self.positions.get(&token.address) {
            Some(&idx) => {
                let existing = &mut self.tokens[idx];
                existing.token_reports.extend(token.token_reports);
                existing.token_opportunities.extend(token.token_opportunities);
                if existing.latest_report.is_none() {
                    existing.latest_report = token.latest_report;
                }
                false
            }
            None => {
                self.positions.insert(token.address.clone(), self.tokens.len());
                self.tokens.push(token);
                true
            }
        }
    }

    pub fn contains(&self, address: &str) -> bool {
        self.positions.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn into_tokens(self) -> Vec<Token> {
        self.tokens
    }
}

pub fn merge_token_pages<I>(pages: I) -> Vec<Token>
where
    I: IntoIterator<Item = Vec<Token>>,
{
    let mut index = TokenIndex::new();
    for token in pages.into_iter().flatten() {
        index.insert(token);
    }
    index.into_tokens()
}

pub fn apply_filters(tokens: Vec<Token>, filters: &TokenFilters) -> Vec<Token> {
    tokens
        .into_iter()
        .filter(|token| filters.chains.contains(&token.chain))
        .filter(|token| filters.market_cap.admits(token.latest_market_cap()))
        .collect()
}

/// Stable descending sort. Tokens missing the sort key go last.
pub fn sort_tokens(tokens: &mut [Token], order: SortOrder) {
    match order {
        SortOrder::RecentOpportunity => {
            tokens.sort_by_key(|token| {
                let latest = token.latest_opportunity().and_then(|opp| opp.timestamp());
                (latest.is_none(), Reverse(latest))
            });
        }
        SortOrder::MarketCap => {
            tokens.sort_by(|a, b| market_cap_key(a).cmp_desc(&market_cap_key(b)));
        }
        SortOrder::KolEvents => {
            tokens.sort_by_key(|token| Reverse(token.engagement_score()));
        }
        SortOrder::RecentSocial => {
            tokens.sort_by_key(|token| {
                let latest = token.latest_social_at();
                (latest.is_none(), Reverse(latest))
            });
        }
    }
}

/// `None` for tokens with no opportunity; a missing market cap on an existing
/// opportunity counts as 0.
struct MarketCapKey(Option<f64>);

impl MarketCapKey {
    fn cmp_desc(&self, other: &Self) -> Ordering {
        match (self.0, other.0) {
            (Some(a), Some(b)) => b.total_cmp(&a),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

fn market_cap_key(token: &Token) -> MarketCapKey {
    MarketCapKey(
        token
            .latest_opportunity()
            .map(|opp| opp.market_cap.unwrap_or(0.0)),
    )
}

/// Filter then sort: the full-collection view before pagination.
pub fn assemble_token_list(tokens: Vec<Token>, filters: &TokenFilters) -> Vec<Token> {
    let mut selected = apply_filters(tokens, filters);
    sort_tokens(&mut selected, filters.sort);
    selected
}

/// Append-only pagination over an assembled list.
#[derive(Debug, Clone)]
pub struct Pager {
    items: Vec<Token>,
    page_size: usize,
    rendered: usize,
}

impl Pager {
    pub fn new(items: Vec<Token>, page_size: usize) -> Self {
        Self {
            items,
            page_size: page_size.max(1),
            rendered: 0,
        }
    }

    pub fn next_page(&mut self) -> Option<&[Token]> {
        if !self.has_more() {
            return None;
        }
        let start = self.rendered;
        let end = start.saturating_add(self.page_size).min(self.items.len());
        self.rendered = end;
        Some(&self.items[start..end])
    }

    pub fn has_more(&self) -> bool {
        self.rendered < self.items.len()
    }

    pub fn pages_rendered(&self) -> usize {
        self.rendered.div_ceil(self.page_size)
    }

    pub fn total(&self) -> usize {
        self.items.len()
    }
}
