//! Contracts for the text channel a session reports into, the persistent
//! "now playing" message and its reaction controls.

pub mod notice;
pub mod renderer;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

pub use notice::{Notice, post_ephemeral, post_notice};
pub use renderer::{DisplayRenderer, EmbedRenderer};

use crate::common::{AnyResult, UserId};

/// Message body: plain content plus rich embeds.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DisplayPayload {
    pub content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<serde_json::Value>,
}

impl DisplayPayload {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            embeds: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reaction {
    pub emoji: String,
    pub user_id: UserId,
}

/// The fixed set of reactions attached to the now-playing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    Skip,
    PlayPause,
    Mute,
    VolumeDown,
    VolumeUp,
    Loop,
    Shuffle,
    Stop,
}

impl Control {
    /// In the order the reactions are added to the message.
    pub const ALL: [Control; 8] = [
        Control::Skip,
        Control::PlayPause,
        Control::Mute,
        Control::VolumeDown,
        Control::VolumeUp,
        Control::Loop,
        Control::Shuffle,
        Control::Stop,
    ];

    pub fn emoji(self) -> &'static str {
        match self {
            Self::Skip => "⏭",
            Self::PlayPause => "⏯",
            Self::Mute => "🔇",
            Self::VolumeDown => "🔉",
            Self::VolumeUp => "🔊",
            Self::Loop => "🔁",
            Self::Shuffle => "🔀",
            Self::Stop => "⏹",
        }
    }

    pub fn from_emoji(emoji: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.emoji() == emoji)
    }
}

#[async_trait]
pub trait TextChannel: Send + Sync {
    /// The bot's own user; its reactions are never treated as input.
    fn self_user_id(&self) -> UserId;
    async fn send(&self, payload: DisplayPayload) -> AnyResult<Arc<dyn DisplayMessage>>;
}

#[async_trait]
pub trait DisplayMessage: Send + Sync {
    async fn edit(&self, payload: DisplayPayload) -> AnyResult<()>;
    async fn delete(&self) -> AnyResult<()>;
    async fn react(&self, emoji: &str) -> AnyResult<()>;
    async fn remove_reaction(&self, reaction: &Reaction) -> AnyResult<()>;
    /// Reactions added to this message by anyone, in arrival order.
    fn reactions(&self) -> flume::Receiver<Reaction>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_control_round_trips_through_its_emoji() {
        for control in Control::ALL {
            assert_eq!(Control::from_emoji(control.emoji()), Some(control));
        }
        assert_eq!(Control::from_emoji("👍"), None);
    }
}
