pub mod resource;

use std::{sync::Arc, time::Duration};

use serde::Serialize;

pub use resource::{AudioResource, ResourceFactory};

use crate::common::{ResourceError, TrackId};

/// Immutable description of a requested track.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackInfo {
    pub id: TrackId,
    pub title: String,
    pub url: String,
    /// `None` for live streams or when the source did not report a length.
    pub duration: Option<Duration>,
}

/// A queued track: its descriptor plus the factory that opens it.
///
/// Cloning is cheap and keeps the same [`TrackId`], which is what loop mode
/// relies on when it moves a finished track to the back of the queue.
#[derive(Clone)]
pub struct Track {
    info: Arc<TrackInfo>,
    factory: Arc<dyn ResourceFactory>,
}

impl Track {
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        duration: Option<Duration>,
        factory: Arc<dyn ResourceFactory>,
    ) -> Self {
        Self {
            info: Arc::new(TrackInfo {
                id: TrackId::generate(),
                title: title.into(),
                url: url.into(),
                duration,
            }),
            factory,
        }
    }

    pub fn id(&self) -> TrackId {
        self.info.id
    }

    pub fn title(&self) -> &str {
        &self.info.title
    }

    pub fn url(&self) -> &str {
        &self.info.url
    }

    pub fn duration(&self) -> Option<Duration> {
        self.info.duration
    }

    pub fn info(&self) -> &TrackInfo {
        &self.info
    }

    /// Opens a fresh playable resource. Safe to call again after a failure.
    pub async fn make_resource(&self) -> Result<AudioResource, ResourceError> {
        self.factory.create(&self.info).await
    }
}

impl std::fmt::Debug for Track {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Track")
            .field("id", &self.info.id)
            .field("title", &self.info.title)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loopback::{LoopbackFactory, LoopbackStream};

    #[tokio::test]
    async fn clones_share_identity_and_resource_metadata() {
        let factory = Arc::new(LoopbackFactory::new());
        let track = Track::new(
            "Never Gonna Give You Up",
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            Some(Duration::from_secs(212)),
            factory.clone(),
        );
        let copy = track.clone();
        assert_eq!(track.id(), copy.id());

        let resource = copy.make_resource().await.expect("resource");
        assert_eq!(resource.metadata().id, track.id());
        assert_eq!(
            resource.payload::<LoopbackStream>().map(|s| s.url.as_str()),
            Some(track.url())
        );
        assert!(resource.payload::<String>().is_none());
        assert_eq!(factory.calls(), 1);
    }

    #[tokio::test]
    async fn failed_creation_can_be_retried() {
        let factory = Arc::new(LoopbackFactory::failing_first(1));
        let track = Track::new("flaky", "https://example.com/a.mp3", None, factory.clone());

        assert!(track.make_resource().await.is_err());
        assert!(track.make_resource().await.is_ok());
        assert_eq!(factory.calls(), 2);
        assert_eq!(track.title(), "flaky");
    }
}
