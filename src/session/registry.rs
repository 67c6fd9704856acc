use std::sync::Arc;

use dashmap::DashMap;

use crate::{common::RoomId, session::SessionController};

/// Lookup, insert and remove of live sessions by room.
///
/// A session looked up here may be tearing down concurrently; callers must
/// be ready for operations on it to fail with `CommandError::NoSession`.
pub trait SessionStore: Send + Sync {
    fn get(&self, room_id: &RoomId) -> Option<Arc<SessionController>>;
    fn insert(&self, room_id: RoomId, session: Arc<SessionController>);
    fn remove(&self, room_id: &RoomId) -> Option<Arc<SessionController>>;
    /// Removes the entry only if it still maps to `session`.
    fn evict(&self, room_id: &RoomId, session: &SessionController) -> bool;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-wide session map.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<RoomId, Arc<SessionController>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the room's session, creating it with `make` if there is none.
    pub fn get_or_insert_with<F>(&self, room_id: &RoomId, make: F) -> Arc<SessionController>
    where
        F: FnOnce() -> Arc<SessionController>,
    {
        self.sessions
            .entry(room_id.clone())
            .or_insert_with(make)
            .value()
            .clone()
    }

    pub fn room_ids(&self) -> Vec<RoomId> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }
}

impl SessionStore for SessionRegistry {
    fn get(&self, room_id: &RoomId) -> Option<Arc<SessionController>> {
        self.sessions.get(room_id).map(|s| s.value().clone())
    }

    fn insert(&self, room_id: RoomId, session: Arc<SessionController>) {
        self.sessions.insert(room_id, session);
    }

    fn remove(&self, room_id: &RoomId) -> Option<Arc<SessionController>> {
        self.sessions.remove(room_id).map(|(_, s)| s)
    }

    fn evict(&self, room_id: &RoomId, session: &SessionController) -> bool {
        self.sessions
            .remove_if(room_id, |_, current| std::ptr::eq(Arc::as_ptr(current), session))
            .is_some()
    }

    fn len(&self) -> usize {
        self.sessions.len()
    }
}
