//! "Latest trades" summary
//!
//! Derived from the trades collection on demand and never persisted.

use crate::format::format_trade_line;
use crate::model::{Platform, TradeListing};

/// Number of rows the summary covers unless configured otherwise
pub const DEFAULT_SUMMARY_LIMIT: usize = 10;

/// Title the platform shows above the summary text
pub const SUMMARY_TITLE: &str = "📌 Latest Trades";

/// Render the most recent `limit` rows, one line per listing index.
///
/// Rows are ordered newest first (ties by higher index first). Rows sharing
/// an index collapse into one line listing each platform once, in the order
/// they were seen. The output depends only on `trades`, so recomputing from
/// the same input yields the same text.
pub fn project(trades: &[TradeListing], limit: usize) -> String {
    let mut recent: Vec<&TradeListing> = trades.iter().collect();
    recent.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.index.cmp(&a.index))
    });
    recent.truncate(limit);

    let mut groups: Vec<(&TradeListing, Vec<Platform>)> = Vec::new();
    for trade in recent {
        match groups.iter_mut().find(|(head, _)| head.index == trade.index) {
            Some((_, platforms)) => {
                if !platforms.contains(&trade.platform) {
                    platforms.push(trade.platform);
                }
            }
            None => groups.push((trade, vec![trade.platform])),
        }
    }

    groups
        .iter()
        .map(|(head, platforms)| format_trade_line(head, platforms))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Ladder, Mode, Region};
    use chrono::{Duration, TimeZone, Utc};

    fn row(index: u64, platform: Platform, minutes: i64) -> TradeListing {
        TradeListing {
            index,
            owner_id: "U1".into(),
            item: format!("item {}", index),
            wanted_in_return: "ist".into(),
            mode: Mode::Softcore,
            ladder: Ladder::Ladder,
            platform,
            region: Region::Americas,
            base: None,
            socket_count: None,
            is_ethereal: false,
            notes: None,
            external_link: None,
            created_at: Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
                + Duration::minutes(minutes),
            origin_channel_ref: None,
            origin_message_ref: None,
        }
    }

    #[test]
    fn empty_input_projects_to_empty_text() {
        assert_eq!(project(&[], DEFAULT_SUMMARY_LIMIT), "");
    }

    #[test]
    fn newest_first_and_bounded() {
        let trades: Vec<_> = (1..=12).map(|i| row(i, Platform::Pc, i as i64)).collect();
        let text = project(&trades, DEFAULT_SUMMARY_LIMIT);

        let blocks: Vec<&str> = text.split("\n\n").collect();
        assert_eq!(blocks.len(), 10);
        assert!(blocks[0].starts_with("**#12**"));
        assert!(blocks[9].starts_with("**#3**"));
        assert!(!text.contains("**#2**"));
    }

    #[test]
    fn shared_index_collapses_platforms() {
        let trades = vec![
            row(1, Platform::Pc, 0),
            row(1, Platform::Xbox, 0),
            row(1, Platform::Pc, 0),
            row(2, Platform::Switch, 5),
        ];
        let text = project(&trades, DEFAULT_SUMMARY_LIMIT);

        let blocks: Vec<&str> = text.split("\n\n").collect();
        assert_eq!(blocks.len(), 2);
        assert!(blocks[1].contains("**Platforms:** PC, Xbox\n"));
        assert_eq!(blocks[1].matches("PC").count(), 1);
    }

    #[test]
    fn projection_is_idempotent() {
        let trades = vec![
            row(3, Platform::Pc, 1),
            row(4, Platform::Xbox, 1),
            row(4, Platform::PlayStation, 1),
        ];
        let first = project(&trades, 10);
        assert_eq!(first, project(&trades.clone(), 10));
        assert!(first.starts_with("**#4**"));
        assert!(first.contains("**Platforms:** Xbox, PlayStation\n"));
    }
}
