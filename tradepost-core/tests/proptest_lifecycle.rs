use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use tradepost_core::projection::project;
use tradepost_core::{Ladder, Mode, OfferAction, OfferStatus, Platform, Region, TradeListing};

fn arb_action() -> impl Strategy<Value = OfferAction> {
    prop::sample::select(OfferAction::ALL.to_vec())
}

fn arb_platform() -> impl Strategy<Value = Platform> {
    prop::sample::select(Platform::ALL.to_vec())
}

fn row(index: u64, platform: Platform, minutes: i64) -> TradeListing {
    TradeListing {
        index,
        owner_id: format!("U{}", index),
        item: format!("item {}", index),
        wanted_in_return: "ist".into(),
        mode: Mode::Softcore,
        ladder: Ladder::Ladder,
        platform,
        region: Region::Europe,
        base: None,
        socket_count: None,
        is_ethereal: false,
        notes: None,
        external_link: None,
        created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes),
        origin_channel_ref: None,
        origin_message_ref: None,
    }
}

proptest! {
    /// Property: no action sequence leaves a terminal status, and Archived is
    /// only reached from Accepted
    #[test]
    fn prop_terminal_states_are_final(actions in prop::collection::vec(arb_action(), 0..40)) {
        let mut status = OfferStatus::Pending;
        for action in actions {
            if let Some(next) = status.after(action) {
                prop_assert!(!status.is_terminal());
                if next == OfferStatus::Archived {
                    prop_assert_eq!(status, OfferStatus::Accepted);
                }
                status = next;
            }
        }
    }

    /// Property: the summary never shows more than `limit` rows and is stable
    /// under recomputation
    #[test]
    fn prop_projection_bounded_and_stable(
        rows in prop::collection::vec((1u64..20, arb_platform(), 0i64..500), 0..60),
        limit in 1usize..15,
    ) {
        let trades: Vec<TradeListing> = rows
            .iter()
            .map(|(index, platform, minutes)| row(*index, *platform, *minutes))
            .collect();

        let text = project(&trades, limit);
        prop_assert_eq!(&text, &project(&trades, limit));

        let entries = if text.is_empty() { 0 } else { text.split("\n\n").count() };
        prop_assert!(entries <= limit);
        prop_assert!(entries <= trades.len());
    }
}
