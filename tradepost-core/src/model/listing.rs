//! Trade listings and their descriptive categories

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::validation::{non_empty, optional_text, ValidationError};

/// Declares a closed set of display labels with `as_str`, `Display` and a
/// case-insensitive `FromStr` that reports `ValidationError::InvalidVariant`.
macro_rules! labelled_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $field:literal {
            $($variant:ident => $label:literal $(| $alias:literal)*),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $label $(, alias = $alias)*)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim().to_lowercase();
                $(
                    if wanted == $label.to_lowercase() $(|| wanted == $alias.to_lowercase())* {
                        return Ok(Self::$variant);
                    }
                )+
                Err(ValidationError::InvalidVariant {
                    field: $field,
                    value: s.to_owned(),
                })
            }
        }
    };
}

labelled_enum! {
    /// Game mode
    Mode, "mode" {
        Softcore => "Softcore" | "sc",
        Hardcore => "Hardcore" | "hc",
    }
}

labelled_enum! {
    /// Ladder season flag
    Ladder, "ladder" {
        Ladder => "Ladder",
        NonLadder => "Non-Ladder" | "NonLadder" | "Non Ladder",
    }
}

labelled_enum! {
    /// Platform the item lives on
    Platform, "platform" {
        Pc => "PC",
        PlayStation => "PlayStation" | "PS",
        Xbox => "Xbox",
        Switch => "Switch",
    }
}

labelled_enum! {
    /// Trading region
    Region, "region" {
        Americas => "Americas",
        Europe => "Europe",
        Asia => "Asia",
    }
}

/// Grouping key for listings: one announcement channel per key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryKey {
    pub platform: Platform,
    pub mode: Mode,
    pub ladder: Ladder,
}

impl fmt::Display for CategoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.platform, self.mode, self.ladder)
    }
}

/// A single persisted listing row.
///
/// A multi-platform listing is stored as one row per platform, all sharing
/// the same `index`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeListing {
    pub index: u64,
    #[serde(alias = "userId")]
    pub owner_id: String,
    pub item: String,
    #[serde(alias = "tradeFor")]
    pub wanted_in_return: String,
    pub mode: Mode,
    pub ladder: Ladder,
    pub platform: Platform,
    pub region: Region,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::text")]
    pub base: Option<String>,
    #[serde(
        default,
        alias = "sockets",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::socket_count"
    )]
    pub socket_count: Option<u8>,
    #[serde(default, alias = "ethereal")]
    pub is_ethereal: bool,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::text")]
    pub notes: Option<String>,
    #[serde(
        default,
        alias = "link",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::text"
    )]
    pub external_link: Option<String>,
    #[serde(alias = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, alias = "channelId", skip_serializing_if = "Option::is_none")]
    pub origin_channel_ref: Option<String>,
    #[serde(default, alias = "messageId", skip_serializing_if = "Option::is_none")]
    pub origin_message_ref: Option<String>,
}

impl TradeListing {
    pub fn category(&self) -> CategoryKey {
        CategoryKey {
            platform: self.platform,
            mode: self.mode,
            ladder: self.ladder,
        }
    }

    /// Case-insensitive substring match over item, wanted-in-return and notes.
    ///
    /// `needle` must already be lowercase.
    pub fn matches_keyword(&self, needle: &str) -> bool {
        self.item.to_lowercase().contains(needle)
            || self.wanted_in_return.to_lowercase().contains(needle)
            || self
                .notes
                .as_deref()
                .map(|n| n.to_lowercase().contains(needle))
                .unwrap_or(false)
    }
}

/// Request to list an item, possibly across several platforms.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewListing {
    pub owner_id: String,
    pub item: String,
    pub wanted_in_return: String,
    pub mode: Option<Mode>,
    pub ladder: Option<Ladder>,
    #[serde(default)]
    pub platforms: Vec<Platform>,
    pub region: Option<Region>,
    #[serde(default)]
    pub base: Option<String>,
    #[serde(default)]
    pub socket_count: Option<u8>,
    #[serde(default)]
    pub is_ethereal: bool,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub external_link: Option<String>,
}

impl NewListing {
    /// Validate the request and expand it into one row per platform.
    ///
    /// Duplicate platforms collapse into a single row.
    pub fn into_rows(
        self,
        index: u64,
        created_at: DateTime<Utc>,
    ) -> Result<Vec<TradeListing>, ValidationError> {
        let owner_id = non_empty("owner", &self.owner_id)?;
        let item = non_empty("item", &self.item)?;
        let wanted_in_return = non_empty("wanted in return", &self.wanted_in_return)?;
        let mode = self.mode.ok_or(ValidationError::Empty { field: "mode" })?;
        let ladder = self.ladder.ok_or(ValidationError::Empty { field: "ladder" })?;
        let region = self.region.ok_or(ValidationError::Empty { field: "region" })?;

        let mut platforms: Vec<Platform> = Vec::with_capacity(self.platforms.len());
        for platform in self.platforms {
            if !platforms.contains(&platform) {
                platforms.push(platform);
            }
        }
        if platforms.is_empty() {
            return Err(ValidationError::Empty { field: "platform" });
        }

        if let Some(sockets) = self.socket_count {
            if !(1..=MAX_SOCKETS).contains(&sockets) {
                return Err(ValidationError::OutOfRange {
                    field: "sockets",
                    min: 1,
                    max: MAX_SOCKETS as u64,
                });
            }
        }

        let external_link = optional_text(self.external_link.as_deref());
        if let Some(link) = &external_link {
            if !(link.starts_with("https://") || link.starts_with("http://")) {
                return Err(ValidationError::InvalidFormat {
                    field: "link",
                    reason: "must be an http(s) URL",
                });
            }
        }

        let base = optional_text(self.base.as_deref());
        let notes = optional_text(self.notes.as_deref());

        Ok(platforms
            .into_iter()
            .map(|platform| TradeListing {
                index,
                owner_id: owner_id.clone(),
                item: item.clone(),
                wanted_in_return: wanted_in_return.clone(),
                mode,
                ladder,
                platform,
                region,
                base: base.clone(),
                socket_count: self.socket_count,
                is_ethereal: self.is_ethereal,
                notes: notes.clone(),
                external_link: external_link.clone(),
                created_at,
                origin_channel_ref: None,
                origin_message_ref: None,
            })
            .collect())
    }
}

/// Highest socket count an item can carry
pub const MAX_SOCKETS: u8 = 6;

/// Deserializers tolerant of the loosely typed records the first release wrote
/// (empty strings for absent text, socket counts stored as strings).
pub(super) mod lenient {
    use serde::{Deserialize, Deserializer};

    use super::MAX_SOCKETS;

    pub fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value: Option<String> = Option::deserialize(deserializer)?;
        Ok(value.filter(|v| !v.trim().is_empty()))
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawSockets {
        Number(u64),
        Text(String),
    }

    pub fn socket_count<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<RawSockets> = Option::deserialize(deserializer)?;
        let count = match raw {
            None => return Ok(None),
            Some(RawSockets::Number(n)) => n,
            Some(RawSockets::Text(s)) if s.trim().is_empty() => return Ok(None),
            Some(RawSockets::Text(s)) => s.trim().parse::<u64>().map_err(|_| {
                serde::de::Error::custom(format!("invalid socket count '{}'", s))
            })?,
        };
        if count == 0 {
            return Ok(None);
        }
        if count > MAX_SOCKETS as u64 {
            return Err(serde::de::Error::custom(format!(
                "socket count {} exceeds {}",
                count, MAX_SOCKETS
            )));
        }
        Ok(Some(count as u8))
    }
}
