//! Scoped boolean guards.
//!
//! A [`Latch`] is a flag that can be held by at most one owner at a time. The
//! holder gets a [`LatchGuard`] that clears the flag when dropped, so every
//! exit path (early return, `?`, task abort) releases it.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

#[derive(Clone, Default)]
pub struct Latch {
    held: Arc<AtomicBool>,
}

impl Latch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the latch, or returns `None` if someone else holds it.
    pub fn try_acquire(&self) -> Option<LatchGuard> {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| LatchGuard {
                held: self.held.clone(),
            })
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for Latch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Latch").field("held", &self.is_held()).finish()
    }
}

#[must_use = "the latch is released as soon as the guard is dropped"]
pub struct LatchGuard {
    held: Arc<AtomicBool>,
}

impl Drop for LatchGuard {
    fn drop(&mut self) {
        self.held.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_while_held() {
        let latch = Latch::new();
        let guard = latch.try_acquire().expect("first acquire");
        assert!(latch.is_held());
        assert!(latch.try_acquire().is_none());
        drop(guard);
        assert!(!latch.is_held());
        assert!(latch.try_acquire().is_some());
    }

    #[test]
    fn guard_released_on_early_return() {
        fn work(latch: &Latch) -> Result<(), ()> {
            let _guard = latch.try_acquire().ok_or(())?;
            Err(())
        }

        let latch = Latch::new();
        assert!(work(&latch).is_err());
        assert!(!latch.is_held());
    }
}
