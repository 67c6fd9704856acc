use std::{sync::Arc, time::Duration};

use tracing::{error, warn};

use super::{DisplayPayload, TextChannel};
use crate::common::UserId;

/// Confirmation and status messages posted to the session's channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    QueueEnded,
    LeftChannel,
    Skipped { by: UserId },
    Paused { by: UserId },
    Resumed { by: UserId },
    Loop { by: UserId, enabled: bool },
    Shuffled { by: UserId },
    Stopped { by: UserId },
    Muted { by: UserId },
    Unmuted { by: UserId },
    VolumeChanged { by: UserId, percent: u8 },
    Failure(String),
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::QueueEnded => write!(f, "❌ Music queue ended."),
            Self::LeftChannel => write!(f, "Left the voice channel because the queue is empty."),
            Self::Skipped { by } => write!(f, "<@{}> ⏭ skipped the song", by),
            Self::Paused { by } => write!(f, "<@{}> ⏸ paused the music.", by),
            Self::Resumed { by } => write!(f, "<@{}> ▶ resumed the music!", by),
            Self::Loop { by, enabled } => write!(
                f,
                "<@{}> loop is now {}",
                by,
                if *enabled { "**on**" } else { "**off**" }
            ),
            Self::Shuffled { by } => write!(f, "<@{}> 🔀 shuffled the queue", by),
            Self::Stopped { by } => write!(f, "<@{}> ⏹ stopped the music!", by),
            Self::Muted { by } => write!(f, "<@{}> 🔇 muted the music!", by),
            Self::Unmuted { by } => write!(f, "<@{}> 🔊 unmuted the music!", by),
            Self::VolumeChanged { by, percent } => {
                write!(f, "<@{}> 🔊 set the volume to {}%", by, percent)
            }
            Self::Failure(message) => write!(f, "{}", message),
        }
    }
}

/// Posts a notice that stays in the channel.
pub fn post_notice(channel: Arc<dyn TextChannel>, notice: Notice) {
    tokio::spawn(async move {
        if let Err(e) = channel.send(DisplayPayload::text(notice.to_string())).await {
            error!("Failed to post notice: {}", e);
        }
    });
}

/// Posts a notice and deletes it again after `ttl`.
pub fn post_ephemeral(channel: Arc<dyn TextChannel>, notice: Notice, ttl: Duration) {
    tokio::spawn(async move {
        let message = match channel.send(DisplayPayload::text(notice.to_string())).await {
            Ok(message) => message,
            Err(e) => {
                error!("Failed to post feedback: {}", e);
                return;
            }
        };
        tokio::time::sleep(ttl).await;
        if let Err(e) = message.delete().await {
            warn!("Failed to delete feedback message: {}", e);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loopback::LoopbackChannel;

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn notices_mention_the_user() {
        let notice = Notice::VolumeChanged {
            by: UserId(42),
            percent: 70,
        };
        assert_eq!(notice.to_string(), "<@42> 🔊 set the volume to 70%");
    }

    #[tokio::test(start_paused = true)]
    async fn ephemeral_feedback_is_removed_after_ttl() {
        let channel = LoopbackChannel::new(UserId(1));
        post_ephemeral(
            channel.clone(),
            Notice::Shuffled { by: UserId(7) },
            Duration::from_secs(5),
        );
        settle().await;
        assert_eq!(channel.live_texts(), vec!["<@7> 🔀 shuffled the queue"]);

        tokio::time::sleep(Duration::from_millis(4_999)).await;
        settle().await;
        assert_eq!(channel.live_texts().len(), 1);

        tokio::time::sleep(Duration::from_millis(2)).await;
        settle().await;
        assert!(channel.live_texts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_send_is_swallowed() {
        let channel = LoopbackChannel::new(UserId(1));
        channel.set_failing(true);
        post_ephemeral(channel.clone(), Notice::QueueEnded, Duration::from_secs(5));
        post_notice(channel.clone(), Notice::LeftChannel);
        settle().await;
        assert!(channel.messages().is_empty());
    }
}
