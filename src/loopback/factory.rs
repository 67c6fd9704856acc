use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::{
    common::ResourceError,
    track::{AudioResource, ResourceFactory, TrackInfo},
};

/// Payload of loopback resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopbackStream {
    pub url: String,
}

#[derive(Default)]
pub struct LoopbackFactory {
    calls: AtomicUsize,
    failures_left: AtomicUsize,
    failing_titles: Vec<String>,
    gate: Option<Arc<Semaphore>>,
}

impl LoopbackFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the first `failures` calls, then succeeds.
    pub fn failing_first(failures: usize) -> Self {
        Self {
            failures_left: AtomicUsize::new(failures),
            ..Self::default()
        }
    }

    /// Always fails for tracks with one of these titles.
    pub fn failing_titles(titles: &[&str]) -> Self {
        Self {
            failing_titles: titles.iter().map(|t| t.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Each call waits for a permit from `gate` before resolving.
    pub fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Acquire)
    }
}

#[async_trait]
impl ResourceFactory for LoopbackFactory {
    async fn create(&self, track: &TrackInfo) -> Result<AudioResource, ResourceError> {
        self.calls.fetch_add(1, Ordering::AcqRel);

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| ResourceError::Other(Box::new(e)))?
                .forget();
        }

        if self.failing_titles.iter().any(|t| *t == track.title) {
            return Err(ResourceError::Unavailable(track.title.clone()));
        }
        if self
            .failures_left
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(ResourceError::Decode {
                url: track.url.clone(),
                reason: "unexpected end of stream".to_string(),
            });
        }

        Ok(AudioResource::new(
            track.clone(),
            LoopbackStream {
                url: track.url.clone(),
            },
        ))
    }
}
