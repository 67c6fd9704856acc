use serde_json::json;
use time::format_description::well_known::Rfc3339;

use super::DisplayPayload;
use crate::track::TrackInfo;

/// Turns the session's queue into the now-playing message body.
pub trait DisplayRenderer: Send + Sync {
    fn render(&self, now_playing: Option<&TrackInfo>, queue: &[TrackInfo]) -> DisplayPayload;
}

/// Queue list as content, current track as a single embed.
#[derive(Debug, Clone)]
pub struct EmbedRenderer {
    pub heading: String,
    pub color: u32,
    pub footer: Option<String>,
}

impl Default for EmbedRenderer {
    fn default() -> Self {
        Self {
            heading: "Now playing".to_string(),
            color: 0xfa4d4d,
            footer: None,
        }
    }
}

impl EmbedRenderer {
    fn queue_list(queue: &[TrackInfo]) -> String {
        queue
            .iter()
            .map(|track| format!("🎶 {}\n", track.title))
            .collect()
    }
}

impl DisplayRenderer for EmbedRenderer {
    fn render(&self, now_playing: Option<&TrackInfo>, queue: &[TrackInfo]) -> DisplayPayload {
        let embeds = now_playing
            .map(|track| {
                let mut embed = json!({
                    "color": self.color,
                    "author": { "name": self.heading },
                    "title": track.title,
                    "url": track.url,
                });
                if let Ok(stamp) = time::OffsetDateTime::now_utc().format(&Rfc3339) {
                    embed["timestamp"] = json!(stamp);
                }
                if let Some(footer) = &self.footer {
                    embed["footer"] = json!({ "text": footer });
                }
                vec![embed]
            })
            .unwrap_or_default();

        DisplayPayload {
            content: Self::queue_list(queue),
            embeds,
        }
    }
}
