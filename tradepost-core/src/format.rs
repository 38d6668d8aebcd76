//! Text rendering of listings and offers
//!
//! Output uses the platform's markdown dialect: `**bold**`, `<@user>`
//! mentions and `<t:unix:R>` relative timestamps.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::model::{Offer, Platform, TradeListing};

/// Longest message body sent in one piece
pub const MAX_MESSAGE_LEN: usize = 1900;

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w\S*").expect("invalid word regex"));

/// Upper-case the first character of every word, lower-case the rest.
pub fn capitalize_each_word(text: &str) -> String {
    WORD_RE
        .replace_all(text, |caps: &Captures| {
            let word = &caps[0];
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .into_owned()
}

pub fn mention(user_id: &str) -> String {
    format!("<@{}>", user_id)
}

pub fn relative_time(at: &DateTime<Utc>) -> String {
    format!("<t:{}:R>", at.timestamp())
}

fn or_none(value: Option<String>) -> String {
    value.filter(|v| !v.is_empty()).unwrap_or_else(|| "None".to_string())
}

/// Render one listing. `platforms` lists every platform the listing spans.
pub fn format_trade_line(trade: &TradeListing, platforms: &[Platform]) -> String {
    let platform_list = if platforms.is_empty() {
        trade.platform.to_string()
    } else {
        platforms
            .iter()
            .map(Platform::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut lines = vec![
        format!(
            "**#{}** • {} — **{}**",
            trade.index,
            mention(&trade.owner_id),
            capitalize_each_word(&trade.item)
        ),
        format!("  **Platforms:** {}", platform_list),
        format!(
            "  **Base:** {} | **ISO:** {} | **Sockets:** {} | **Ethereal:** {} | **Notes:** {} | *Posted:* {}",
            or_none(trade.base.as_deref().map(capitalize_each_word)),
            capitalize_each_word(&trade.wanted_in_return),
            or_none(trade.socket_count.map(|s| s.to_string())),
            if trade.is_ethereal { "Yes" } else { "No" },
            or_none(trade.notes.as_deref().map(capitalize_each_word)),
            relative_time(&trade.created_at)
        ),
    ];
    if let Some(link) = &trade.external_link {
        lines.push(format!("🔗 {}", link));
    }
    lines.join("\n")
}

/// Render an offer for notifications and logs
pub fn format_offer_line(offer: &Offer) -> String {
    let mut lines = vec![
        format!("**Offer ID:** {}", offer.offer_id),
        format!("**Trade Listing Index:** {}", offer.trade_index),
        format!("**Seller:** {}", mention(&offer.seller_id)),
        format!("**Buyer:** {}", mention(&offer.buyer_id)),
        format!("**Offer:** {}", offer.proposed_terms),
        format!("**Notes:** {}", or_none(offer.notes.clone())),
        format!("**Status:** {}", offer.status),
        format!("**Posted:** {}", relative_time(&offer.created_at)),
    ];
    if let Some(counter) = &offer.counter_terms {
        lines.push(format!("**Counter Offer:** {}", counter));
    }
    lines.join("\n")
}

/// Pack blocks into messages of at most `max_len` bytes, blocks separated by
/// a blank line. Every message starts with `header` when one is given.
///
/// A single block longer than `max_len` is sent on its own rather than split.
pub fn chunk_messages<S: AsRef<str>>(header: Option<&str>, blocks: &[S], max_len: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = header.map(str::to_owned).unwrap_or_default();
    let mut has_block = false;

    for block in blocks {
        let block = block.as_ref();
        let separator = if current.is_empty() { "" } else { "\n\n" };
        if has_block && current.len() + separator.len() + block.len() > max_len {
            chunks.push(std::mem::take(&mut current));
            current = header.map(str::to_owned).unwrap_or_default();
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(block);
        has_block = true;
    }

    if has_block {
        chunks.push(current);
    }
    chunks
}
