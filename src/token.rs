//! Token aggregate as served by `/api/tokens` and `/api/token/{address}`.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::opportunity::Opportunity;
use crate::timestamp::normalize_timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Chain {
    Base,
    Solana,
}

pub const ALL_CHAINS: [Chain; 2] = [Chain::Base, Chain::Solana];

impl Chain {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Solana => "solana",
        }
    }
}

impl FromStr for Chain {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "base" => Ok(Self::Base),
            "solana" => Ok(Self::Solana),
            other => Err(format!("unsupported chain: {other}")),
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Chain {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Chain {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialPost {
    #[serde(default)]
    pub post_id: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub author_username: Option<String>,
    #[serde(default)]
    pub author_display_name: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub reactions_count: Option<u64>,
    #[serde(default)]
    pub replies_count: Option<u64>,
    #[serde(default)]
    pub reposts_count: Option<u64>,
}

impl SocialPost {
    /// One event for the post itself plus its engagement counts.
    pub fn engagement(&self) -> u64 {
        1 + self.reactions_count.unwrap_or(0)
            + self.replies_count.unwrap_or(0)
            + self.reposts_count.unwrap_or(0)
    }

    pub fn posted_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp.as_deref().and_then(normalize_timestamp)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub mentions_purchasable_token: bool,
    #[serde(default)]
    pub token_symbol: Option<String>,
    #[serde(default)]
    pub token_chain: Option<String>,
    #[serde(default)]
    pub token_address: Option<String>,
    #[serde(default)]
    pub is_listed_on_dex: bool,
    #[serde(default)]
    pub trading_pairs: Option<Vec<String>>,
    #[serde(default)]
    pub confidence_score: Option<i64>,
    #[serde(default)]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub social_media_post: Option<SocialPost>,
}

impl TokenReport {
    /// A report can be re-analyzed only when its required fields are present.
    pub fn is_analyzable(&self) -> bool {
        let confidence_ok = self
            .confidence_score
            .map(|score| (1..=10).contains(&score))
            .unwrap_or(false);
        let reasoning_ok = self
            .reasoning
            .as_deref()
            .map(|text| !text.trim().is_empty())
            .unwrap_or(false);
        confidence_ok && reasoning_ok
    }

    pub fn reported_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
            .as_deref()
            .and_then(normalize_timestamp)
            .or_else(|| self.social_media_post.as_ref().and_then(SocialPost::posted_at))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub address: String,
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub name: Option<String>,
    pub chain: Chain,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub website_url: Option<String>,
    #[serde(default)]
    pub warpcast_url: Option<String>,
    #[serde(default)]
    pub twitter_url: Option<String>,
    #[serde(default)]
    pub telegram_url: Option<String>,
    #[serde(default)]
    pub signal_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub token_reports: Vec<TokenReport>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub token_opportunities: Vec<Opportunity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_report: Option<TokenReport>,
}

impl Token {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.symbol)
    }

    /// Max by `created_at`; ties keep the earliest entry.
    pub fn latest_opportunity(&self) -> Option<&Opportunity> {
        let mut latest: Option<&Opportunity> = None;
        for opp in &self.token_opportunities {
            match latest {
                Some(current) if opp.timestamp() <= current.timestamp() => {}
                _ => latest = Some(opp),
            }
        }
        latest
    }

    /// Opportunities newest first.
    pub fn opportunities_newest_first(&self) -> Vec<&Opportunity> {
        let mut out: Vec<&Opportunity> = self.token_opportunities.iter().collect();
        out.sort_by_key(|opp| std::cmp::Reverse(opp.timestamp()));
        out
    }

    /// Server-provided latest report when it is analyzable, otherwise the most
    /// recent analyzable report in the collection.
    pub fn latest_report(&self) -> Option<&TokenReport> {
        if let Some(report) = self.latest_report.as_ref().filter(|r| r.is_analyzable()) {
            return Some(report);
        }

        let mut latest: Option<&TokenReport> = None;
        for report in self.token_reports.iter().filter(|r| r.is_analyzable()) {
            match latest {
                Some(current) if report.reported_at() < current.reported_at() => {}
                _ => latest = Some(report),
            }
        }
        latest
    }

    pub fn social_posts(&self) -> impl Iterator<Item = &SocialPost> {
        self.token_reports
            .iter()
            .filter_map(|report| report.social_media_post.as_ref())
    }

    /// "KOL events": unique posts by `post_id`, each counted once as
    /// `1 + reactions + replies + reposts`.
    pub fn engagement_score(&self) -> u64 {
        let mut seen: HashSet<Option<&str>> = HashSet::new();
        self.social_posts()
            .filter(|post| seen.insert(post.post_id.as_deref()))
            .map(SocialPost::engagement)
            .sum()
    }

    pub fn latest_social_at(&self) -> Option<DateTime<Utc>> {
        self.social_posts().filter_map(SocialPost::posted_at).max()
    }

    /// Market cap of the latest opportunity, if any was reported.
    pub fn latest_market_cap(&self) -> Option<f64> {
        self.latest_opportunity().and_then(|opp| opp.market_cap)
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
