//! Date buckets and per-token dedup for the alpha feed.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::warn;

use crate::opportunity::Opportunity;
use crate::timestamp::date_key;

/// Buckets records by UTC calendar day. Records whose `created_at` cannot be
/// parsed are dropped with a warning.
pub fn group_by_date(records: Vec<Opportunity>) -> BTreeMap<NaiveDate, Vec<Opportunity>> {
    let mut groups: BTreeMap<NaiveDate, Vec<Opportunity>> = BTreeMap::new();

    for record in records {
        match date_key(&record.created_at) {
            Some(day) => groups.entry(day).or_default().push(record),
            None => warn!(
                component = "grouping",
                event = "feed.drop.unparseable_timestamp",
                name = %record.name,
                created_at = %record.created_at
            ),
        }
    }

    groups
}

/// Keeps the chronologically latest record per `name` (exact match). Ties go
/// to the record seen last. Output follows first appearance of each name.
pub fn filter_most_recent_per_token(records: Vec<Opportunity>) -> Vec<Opportunity> {
    let mut slots: Vec<Opportunity> = Vec::with_capacity(records.len());
    let mut index_by_name: HashMap<String, usize> = HashMap::with_capacity(records.len());

    for record in records {
        match index_by_name.get(&record.name) {
            Some(&idx) => {
                if record.timestamp() >= slots[idx].timestamp() {
                    slots[idx] = record;
                }
            }
            None => {
                index_by_name.insert(record.name.clone(), slots.len());
                slots.push(record);
            }
        }
    }

    slots
}

/// Display order within a bucket: newest first.
pub fn sort_newest_first(records: &mut [Opportunity]) {
    records.sort_by_key(|record| Reverse(record.timestamp()));
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateGroup {
    pub date: NaiveDate,
    pub opportunities: Vec<Opportunity>,
}

/// Full feed pipeline after extraction: bucket by day, dedup per token within
/// each day, newest first at both levels.
pub fn build_daily_feed(records: Vec<Opportunity>) -> Vec<DateGroup> {
    group_by_date(records)
        .into_iter()
        .rev()
        .map(|(date, bucket)| {
            let mut opportunities = filter_most_recent_per_token(bucket);
            sort_newest_first(&mut opportunities);
            DateGroup {
                date,
                opportunities,
            }
        })
        .collect()
}
