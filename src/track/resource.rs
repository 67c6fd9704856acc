use std::any::Any;

use async_trait::async_trait;

use super::TrackInfo;
use crate::common::ResourceError;

/// An opened, ready-to-play audio stream.
///
/// The payload is owned by whatever decoder the player primitive uses; the
/// queue only needs the metadata back when the player reports on it.
pub struct AudioResource {
    metadata: TrackInfo,
    payload: Box<dyn Any + Send + Sync>,
}

impl AudioResource {
    pub fn new<P: Any + Send + Sync>(metadata: TrackInfo, payload: P) -> Self {
        Self {
            metadata,
            payload: Box::new(payload),
        }
    }

    pub fn metadata(&self) -> &TrackInfo {
        &self.metadata
    }

    pub fn payload<P: Any>(&self) -> Option<&P> {
        self.payload.downcast_ref::<P>()
    }
}

impl std::fmt::Debug for AudioResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioResource")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// Resolves a track into a playable resource.
#[async_trait]
pub trait ResourceFactory: Send + Sync {
    async fn create(&self, track: &TrackInfo) -> Result<AudioResource, ResourceError>;
}
