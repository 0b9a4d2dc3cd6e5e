//! Explicit state for the infinite-scroll token feed.
//!
//! The feed is driven in two steps: [`TokenFeed::begin_load`] hands out a
//! ticket (or `None` while a load is outstanding or nothing remains), and one
//! of the `complete_*` methods applies the fetched data. Tickets from before
//! a [`TokenFeed::reset`] are stale and their results are ignored.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::assembler::{assemble_token_list, merge_token_pages, Pager, TokenFilters, TokenIndex};
use crate::token::Token;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenListMode {
    /// Server-side paging with `has_more` / `next_cursor`.
    Cursor,
    /// One request for the whole collection; filter, sort and page locally.
    #[default]
    Full,
}

impl TokenListMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cursor => "cursor",
            Self::Full => "full",
        }
    }
}

impl FromStr for TokenListMode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "cursor" => Ok(Self::Cursor),
            "full" => Ok(Self::Full),
            other => Err(format!("unknown token list mode: {other}")),
        }
    }
}

impl fmt::Display for TokenListMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One page of the cursor-paginated token list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPage {
    pub tokens: Vec<Token>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStep {
    FetchPage { cursor: Option<String> },
    FetchCollection,
    FromPager,
}

#[derive(Debug)]
pub struct LoadTicket {
    generation: u64,
    pub step: LoadStep,
}

#[derive(Debug)]
pub struct TokenFeed {
    mode: TokenListMode,
    filters: TokenFilters,
    page_size: usize,
    generation: u64,
    in_flight: bool,
    started: bool,
    has_more: bool,
    next_cursor: Option<String>,
    replay_pages: usize,
    pager: Option<Pager>,
    displayed: TokenIndex,
}

impl TokenFeed {
    pub fn new(mode: TokenListMode, filters: TokenFilters, page_size: usize) -> Self {
        Self {
            mode,
            filters,
            page_size: page_size.max(1),
            generation: 0,
            in_flight: false,
            started: false,
            has_more: true,
            next_cursor: None,
            replay_pages: 0,
            pager: None,
            displayed: TokenIndex::new(),
        }
    }

    /// New filters or sort: drop everything and start over from the top.
    pub fn reset(&mut self, filters: TokenFilters) {
        *self = Self {
            generation: self.generation + 1,
            ..Self::new(self.mode, filters, self.page_size)
        };
    }

    /// Full mode: the first load renders `pages` earlier pages together with
    /// the next one, so a "load more" request shows the whole grid so far.
    pub fn replay_pages(&mut self, pages: usize) {
        self.replay_pages = pages;
    }

    pub fn mode(&self) -> TokenListMode {
        self.mode
    }

    pub fn filters(&self) -> &TokenFilters {
        &self.filters
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn next_cursor(&self) -> Option<&str> {
        self.next_cursor.as_deref()
    }

    /// Number of full-mode pages rendered so far.
    pub fn pages_rendered(&self) -> usize {
        self.pager.as_ref().map(Pager::pages_rendered).unwrap_or(0)
    }

    /// Every token seen so far, merged by address.
    pub fn displayed(&self) -> &[Token] {
        self.displayed.tokens()
    }

    pub fn begin_load(&mut self) -> Option<LoadTicket> {
        if self.in_flight || !self.has_more {
            return None;
        }

        let step = match self.mode {
            TokenListMode::Cursor => {
                if self.started && self.next_cursor.is_none() {
                    self.has_more = false;
                    return None;
                }
                LoadStep::FetchPage {
                    cursor: self.next_cursor.clone(),
                }
            }
            TokenListMode::Full if self.pager.is_none() => LoadStep::FetchCollection,
            TokenListMode::Full => LoadStep::FromPager,
        };

        self.in_flight = true;
        Some(LoadTicket {
            generation: self.generation,
            step,
        })
    }

    /// Applies a cursor page. Returns the tokens to append (addresses not yet
    /// displayed); repeated addresses are merged into the existing entry.
    pub fn complete_page(&mut self, ticket: LoadTicket, page: TokenPage) -> Vec<Token> {
        if !self.accept(&ticket) {
            return Vec::new();
        }

        self.started = true;
        self.has_more = page.has_more && page.next_cursor.is_some();
        self.next_cursor = page.next_cursor;

        let mut appended = Vec::with_capacity(page.tokens.len());
        for token in page.tokens {
            if !self.displayed.contains(&token.address) {
                appended.push(token.clone());
            }
            self.displayed.insert(token);
        }
        appended
    }

    /// Applies the full collection and returns the first page to render,
    /// preceded by any replayed pages.
    pub fn complete_collection(&mut self, ticket: LoadTicket, tokens: Vec<Token>) -> Vec<Token> {
        if !self.accept(&ticket) {
            return Vec::new();
        }

        let assembled = assemble_token_list(merge_token_pages([tokens]), &self.filters);
        self.pager = Some(Pager::new(assembled, self.page_size));

        let mut rendered = self.next_from_pager();
        for _ in 0..self.replay_pages {
            if !self.has_more {
                break;
            }
            rendered.extend(self.next_from_pager());
        }
        rendered
    }

    /// Serves the next locally-held page in full mode.
    pub fn complete_from_pager(&mut self, ticket: LoadTicket) -> Vec<Token> {
        if !self.accept(&ticket) {
            return Vec::new();
        }
        self.next_from_pager()
    }

    /// A failed fetch releases the in-flight guard so the user can retry.
    pub fn fail(&mut self, ticket: LoadTicket) {
        if ticket.generation == self.generation {
            self.in_flight = false;
        }
    }

    fn accept(&mut self, ticket: &LoadTicket) -> bool {
        if ticket.generation != self.generation {
            debug!(
                component = "token_feed",
                event = "feed.load.stale_result_ignored",
                ticket_generation = ticket.generation,
                current_generation = self.generation
            );
            return false;
        }
        self.in_flight = false;
        true
    }

    fn next_from_pager(&mut self) -> Vec<Token> {
        let Some(pager) = self.pager.as_mut() else {
            return Vec::new();
        };
        let page: Vec<Token> = pager.next_page().map(<[Token]>::to_vec).unwrap_or_default();
        self.has_more = pager.has_more();
        for token in &page {
            self.displayed.insert(token.clone());
        }
        page
    }
}
