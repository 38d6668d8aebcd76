//! Outbound side effects queued for the platform relay
//!
//! The core calls its ports synchronously, but only the relay can talk to
//! the chat platform. [`Outbox`] implements both ports by queueing an
//! [`OutboundEvent`] per call and answering with provisional references
//! (`outbox-7` message ids, `{category}/{channel}` private channel refs) that
//! the relay maps to the platform objects it creates.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tradepost_core::model::CategoryKey;
use tradepost_core::ports::{Announcement, Announcer, ChannelRef, ChannelResolver, MessageRef};
use tradepost_core::projection::SUMMARY_TITLE;
use tradepost_core::{PrivateContext, SideEffectError, TradeConfig};

/// Oldest events are dropped beyond this many undrained entries
pub const MAX_QUEUED_EVENTS: usize = 10_000;

/// One side effect for the relay to perform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundEvent {
    Post {
        channel: ChannelRef,
        message_id: String,
        announcement: Announcement,
    },
    Delete {
        message: MessageRef,
    },
    DirectMessage {
        user_id: String,
        text: String,
    },
    PublishSummary {
        channel: String,
        title: String,
        text: String,
    },
    OpenPrivate {
        channel: ChannelRef,
        category_name: String,
        channel_name: String,
        context: PrivateContext,
    },
    ClosePrivate {
        channel: ChannelRef,
    },
}

/// A queued event with its position in the stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub seq: u64,
    pub queued_at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: OutboundEvent,
}

pub struct Outbox {
    queue: Mutex<VecDeque<Envelope>>,
    next_seq: AtomicU64,
    next_message: AtomicU64,
    summary_channel: Option<String>,
    category_channels: BTreeMap<String, String>,
}

impl Outbox {
    pub fn new(summary_channel: Option<String>, category_channels: BTreeMap<String, String>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            next_seq: AtomicU64::new(1),
            next_message: AtomicU64::new(1),
            summary_channel,
            category_channels,
        }
    }

    pub fn from_config(config: &TradeConfig) -> Self {
        Self::new(config.summary_channel.clone(), config.category_channels.clone())
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<Envelope>> {
        self.queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push(&self, event: OutboundEvent) {
        let envelope = Envelope {
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            queued_at: Utc::now(),
            event,
        };
        let mut queue = self.queue();
        if queue.len() >= MAX_QUEUED_EVENTS {
            if let Some(dropped) = queue.pop_front() {
                tracing::warn!(seq = dropped.seq, "outbox full, dropping oldest event");
            }
        }
        queue.push_back(envelope);
    }

    /// Remove and return up to `limit` events, oldest first.
    pub fn drain(&self, limit: usize) -> Vec<Envelope> {
        let mut queue = self.queue();
        let take = limit.min(queue.len());
        queue.drain(..take).collect()
    }

    pub fn len(&self) -> usize {
        self.queue().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Announcer for Outbox {
    async fn post(
        &self,
        channel: &ChannelRef,
        announcement: &Announcement,
    ) -> Result<MessageRef, SideEffectError> {
        let message_id = format!("outbox-{}", self.next_message.fetch_add(1, Ordering::Relaxed));
        self.push(OutboundEvent::Post {
            channel: channel.clone(),
            message_id: message_id.clone(),
            announcement: announcement.clone(),
        });
        Ok(MessageRef {
            channel: channel.clone(),
            message_id,
        })
    }

    async fn delete(&self, message: &MessageRef) -> Result<(), SideEffectError> {
        self.push(OutboundEvent::Delete {
            message: message.clone(),
        });
        Ok(())
    }

    async fn direct_message(&self, user_id: &str, text: &str) -> Result<(), SideEffectError> {
        self.push(OutboundEvent::DirectMessage {
            user_id: user_id.to_owned(),
            text: text.to_owned(),
        });
        Ok(())
    }

    async fn publish_summary(&self, text: &str) -> Result<(), SideEffectError> {
        let channel = self
            .summary_channel
            .clone()
            .ok_or_else(|| SideEffectError::new("publish summary", "no summary channel configured"))?;
        self.push(OutboundEvent::PublishSummary {
            channel,
            title: SUMMARY_TITLE.to_string(),
            text: text.to_owned(),
        });
        Ok(())
    }
}

#[async_trait]
impl ChannelResolver for Outbox {
    async fn category_channel(&self, category: &CategoryKey) -> Result<ChannelRef, SideEffectError> {
        let wanted = category.to_string();
        self.category_channels
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(&wanted))
            .map(|(_, channel)| ChannelRef::new(channel.clone()))
            .ok_or_else(|| {
                SideEffectError::new(
                    "resolve category channel",
                    format!("no channel configured for {}", wanted),
                )
            })
    }

    async fn open_private(&self, context: &PrivateContext) -> Result<ChannelRef, SideEffectError> {
        let category_name = context.category_name();
        let channel_name = context.channel_name();
        let channel = ChannelRef::new(format!("{}/{}", category_name, channel_name));
        self.push(OutboundEvent::OpenPrivate {
            channel: channel.clone(),
            category_name,
            channel_name,
            context: context.clone(),
        });
        Ok(channel)
    }

    async fn close_private(&self, channel: &ChannelRef) -> Result<(), SideEffectError> {
        self.push(OutboundEvent::ClosePrivate {
            channel: channel.clone(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tradepost_core::{Ladder, Mode, Platform};

    fn outbox() -> Outbox {
        let mut channels = BTreeMap::new();
        channels.insert("PC Hardcore Ladder".to_string(), "111".to_string());
        Outbox::new(Some("999".into()), channels)
    }

    #[tokio::test]
    async fn posts_get_provisional_ids_in_order() {
        let outbox = outbox();
        let channel = ChannelRef::new("111");
        let first = outbox.post(&channel, &Announcement::text("a")).await.unwrap();
        let second = outbox.post(&channel, &Announcement::text("b")).await.unwrap();

        assert_eq!(first.message_id, "outbox-1");
        assert_eq!(second.message_id, "outbox-2");

        let events = outbox.drain(10);
        assert_eq!(events.len(), 2);
        assert!(events[0].seq < events[1].seq);
        assert!(outbox.is_empty());
    }

    #[tokio::test]
    async fn category_lookup_uses_config() {
        let outbox = outbox();
        let known = CategoryKey {
            platform: Platform::Pc,
            mode: Mode::Hardcore,
            ladder: Ladder::Ladder,
        };
        assert_eq!(outbox.category_channel(&known).await.unwrap().as_str(), "111");

        let unknown = CategoryKey {
            platform: Platform::Switch,
            ..known
        };
        assert!(outbox.category_channel(&unknown).await.is_err());
    }

    #[tokio::test]
    async fn summary_requires_a_channel() {
        let outbox = Outbox::new(None, BTreeMap::new());
        assert!(outbox.publish_summary("text").await.is_err());
        assert!(outbox.is_empty());

        let outbox = self::outbox();
        outbox.publish_summary("text").await.unwrap();
        let json = serde_json::to_value(&outbox.drain(1)[0]).unwrap();
        assert_eq!(json["type"], "publish_summary");
        assert_eq!(json["channel"], "999");
    }

    #[tokio::test]
    async fn drain_respects_limit() {
        let outbox = outbox();
        for i in 0..5 {
            outbox.direct_message("U1", &i.to_string()).await.unwrap();
        }
        assert_eq!(outbox.drain(2).len(), 2);
        assert_eq!(outbox.len(), 3);
    }
}
