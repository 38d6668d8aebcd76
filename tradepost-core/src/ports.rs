//! Outbound ports to the chat platform
//!
//! Managers never talk to the platform directly; they are handed an
//! [`Announcer`] and a [`ChannelResolver`]. Every call is a best-effort side
//! effect: failures come back as [`SideEffectError`] and the caller logs them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SideEffectError;
use crate::model::{CategoryKey, PrivateContext};
use crate::interaction::ActionId;

/// Opaque platform channel id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelRef(pub String);

impl ChannelRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Location of a posted message, kept so it can be deleted later
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    pub channel: ChannelRef,
    pub message_id: String,
}

/// A message for the platform to render
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    /// Users to mention alongside the message
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mentions: Vec<String>,
    pub content: String,
    /// Buttons, rendered in order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<ActionId>,
}

impl Announcement {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            mentions: Vec::new(),
            content: content.into(),
            actions: Vec::new(),
        }
    }
}

/// Messages, direct notifications and the pinned summary
#[async_trait]
pub trait Announcer: Send + Sync {
    /// Post a message in a channel
    async fn post(
        &self,
        channel: &ChannelRef,
        announcement: &Announcement,
    ) -> Result<MessageRef, SideEffectError>;

    /// Delete a previously posted message
    async fn delete(&self, message: &MessageRef) -> Result<(), SideEffectError>;

    /// Send a private notification to one user
    async fn direct_message(&self, user_id: &str, text: &str) -> Result<(), SideEffectError>;

    /// Create or update the pinned "latest trades" message
    async fn publish_summary(&self, text: &str) -> Result<(), SideEffectError>;
}

/// Channel lookup and provisioning
#[async_trait]
pub trait ChannelResolver: Send + Sync {
    /// Announcement channel for a listing category
    async fn category_channel(&self, category: &CategoryKey) -> Result<ChannelRef, SideEffectError>;

    /// Find or create the private conversation for a buyer on a listing
    async fn open_private(&self, context: &PrivateContext) -> Result<ChannelRef, SideEffectError>;

    /// Tear down a private conversation
    async fn close_private(&self, channel: &ChannelRef) -> Result<(), SideEffectError>;
}

/// Ports for running without a platform connection (offline moderation).
///
/// Every side effect fails, so managers log what could not be delivered and
/// keep going.
#[derive(Debug, Clone, Copy, Default)]
pub struct Detached;

const DETACHED: &str = "no platform connection";

#[async_trait]
impl Announcer for Detached {
    async fn post(&self, _: &ChannelRef, _: &Announcement) -> Result<MessageRef, SideEffectError> {
        Err(SideEffectError::new("post message", DETACHED))
    }

    async fn delete(&self, _: &MessageRef) -> Result<(), SideEffectError> {
        Err(SideEffectError::new("delete message", DETACHED))
    }

    async fn direct_message(&self, _: &str, _: &str) -> Result<(), SideEffectError> {
        Err(SideEffectError::new("direct message", DETACHED))
    }

    async fn publish_summary(&self, _: &str) -> Result<(), SideEffectError> {
        Err(SideEffectError::new("publish summary", DETACHED))
    }
}

#[async_trait]
impl ChannelResolver for Detached {
    async fn category_channel(&self, _: &CategoryKey) -> Result<ChannelRef, SideEffectError> {
        Err(SideEffectError::new("resolve category channel", DETACHED))
    }

    async fn open_private(&self, _: &PrivateContext) -> Result<ChannelRef, SideEffectError> {
        Err(SideEffectError::new("open private channel", DETACHED))
    }

    async fn close_private(&self, _: &ChannelRef) -> Result<(), SideEffectError> {
        Err(SideEffectError::new("close private channel", DETACHED))
    }
}

/// Log a failed best-effort side effect and continue.
pub(crate) fn log_side_effect<T>(result: Result<T, SideEffectError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(operation = e.operation, reason = %e.reason, "side effect failed");
            None
        }
    }
}

/// Recording ports for tests
#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Event {
        Post(ChannelRef, Announcement),
        Delete(MessageRef),
        Direct(String, String),
        Summary(String),
        OpenPrivate(PrivateContext),
        ClosePrivate(ChannelRef),
    }

    #[derive(Default)]
    pub struct Recorder {
        pub events: Mutex<Vec<Event>>,
        pub fail_direct_messages: bool,
        pub missing_categories: HashSet<CategoryKey>,
        pub next_id: AtomicU64,
    }

    impl Recorder {
        pub fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }

        pub fn summaries(&self) -> Vec<String> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    Event::Summary(text) => Some(text),
                    _ => None,
                })
                .collect()
        }

        pub fn directs_to(&self, user: &str) -> Vec<String> {
            self.events()
                .into_iter()
                .filter_map(|e| match e {
                    Event::Direct(to, text) if to == user => Some(text),
                    _ => None,
                })
                .collect()
        }

        fn record(&self, event: Event) {
            self.events.lock().unwrap().push(event);
        }
    }

    #[async_trait]
    impl Announcer for Recorder {
        async fn post(
            &self,
            channel: &ChannelRef,
            announcement: &Announcement,
        ) -> Result<MessageRef, SideEffectError> {
            self.record(Event::Post(channel.clone(), announcement.clone()));
            let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(MessageRef {
                channel: channel.clone(),
                message_id: format!("m{}", id),
            })
        }

        async fn delete(&self, message: &MessageRef) -> Result<(), SideEffectError> {
            self.record(Event::Delete(message.clone()));
            Ok(())
        }

        async fn direct_message(&self, user_id: &str, text: &str) -> Result<(), SideEffectError> {
            self.record(Event::Direct(user_id.to_owned(), text.to_owned()));
            if self.fail_direct_messages {
                return Err(SideEffectError::new("direct message", "user has DMs closed"));
            }
            Ok(())
        }

        async fn publish_summary(&self, text: &str) -> Result<(), SideEffectError> {
            self.record(Event::Summary(text.to_owned()));
            Ok(())
        }
    }

    #[async_trait]
    impl ChannelResolver for Recorder {
        async fn category_channel(
            &self,
            category: &CategoryKey,
        ) -> Result<ChannelRef, SideEffectError> {
            if self.missing_categories.contains(category) {
                return Err(SideEffectError::new("resolve category channel", "not configured"));
            }
            Ok(ChannelRef::new(category.to_string().to_lowercase().replace(' ', "-")))
        }

        async fn open_private(
            &self,
            context: &PrivateContext,
        ) -> Result<ChannelRef, SideEffectError> {
            self.record(Event::OpenPrivate(context.clone()));
            Ok(ChannelRef::new(format!(
                "{}/{}",
                context.category_name(),
                context.channel_name()
            )))
        }

        async fn close_private(&self, channel: &ChannelRef) -> Result<(), SideEffectError> {
            self.record(Event::ClosePrivate(channel.clone()));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Ladder, Mode, Platform};

    #[tokio::test]
    async fn detached_ports_fail_every_side_effect() {
        let key = CategoryKey {
            platform: Platform::Pc,
            mode: Mode::Softcore,
            ladder: Ladder::Ladder,
        };

        assert!(Detached.category_channel(&key).await.is_err());
        assert!(Detached.publish_summary("x").await.is_err());
        assert_eq!(log_side_effect(Detached.direct_message("U1", "hi").await), None);
    }
}
