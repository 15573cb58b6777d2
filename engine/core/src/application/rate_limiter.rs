// Copyright (c) 2026 antbox.io
// SPDX-License-Identifier: AGPL-3.0

//! Feature Rate Limiter
//!
//! Process-wide counter keyed by `(feature uuid, channel)`. Each key admits
//! at most 10 invocations within a 10-second rolling window; the counter
//! resets when the window expires. Completions release the execution slot
//! (the permit) but do not return window capacity early, so a feature whose
//! node mutations retrigger it keeps consuming its window and eventually
//! fails with `TooMany`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::trace;

use crate::domain::error::{AntboxError, AntboxResult};

pub const DEFAULT_MAX_PER_WINDOW: u32 = 10;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(10);

/// Invocation channel: action vs. tool vs. extension counters are
/// independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvocationChannel {
    Action,
    AiTool,
    Extension,
}

struct WindowSlot {
    started: u32,
    live: u32,
    window_start: Instant,
}

#[derive(Clone)]
pub struct FeatureRateLimiter {
    slots: Arc<DashMap<(String, InvocationChannel), WindowSlot>>,
    max_per_window: u32,
    window: Duration,
}

impl FeatureRateLimiter {
    pub fn new(max_per_window: u32, window: Duration) -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
            max_per_window,
            window,
        }
    }

    /// Acquire one execution slot for the key. Fails with `TooMany` when
    /// the key's window budget is spent. The slot itself is released when
    /// the returned permit drops, success or error alike.
    pub fn acquire(
        &self,
        feature_uuid: &str,
        channel: InvocationChannel,
    ) -> AntboxResult<RateLimitPermit> {
        let key = (feature_uuid.to_string(), channel);
        let mut slot = self.slots.entry(key.clone()).or_insert_with(|| WindowSlot {
            started: 0,
            live: 0,
            window_start: Instant::now(),
        });

        if slot.window_start.elapsed() >= self.window {
            slot.started = 0;
            slot.window_start = Instant::now();
        }

        if slot.started >= self.max_per_window {
            return Err(AntboxError::TooMany(format!(
                "Feature {} exceeded {} invocations in the current window",
                feature_uuid, self.max_per_window
            )));
        }
        slot.started += 1;
        slot.live += 1;
        drop(slot);

        Ok(RateLimitPermit {
            slots: self.slots.clone(),
            key,
        })
    }

    /// Live (not yet completed) invocations for a key.
    pub fn live(&self, feature_uuid: &str, channel: InvocationChannel) -> u32 {
        self.slots
            .get(&(feature_uuid.to_string(), channel))
            .map(|s| s.live)
            .unwrap_or(0)
    }
}

impl Default for FeatureRateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PER_WINDOW, DEFAULT_WINDOW)
    }
}

/// Live execution slot. Dropping marks the invocation complete.
pub struct RateLimitPermit {
    slots: Arc<DashMap<(String, InvocationChannel), WindowSlot>>,
    key: (String, InvocationChannel),
}

impl Drop for RateLimitPermit {
    fn drop(&mut self) {
        if let Some(mut slot) = self.slots.get_mut(&self.key) {
            slot.live = slot.live.saturating_sub(1);
            trace!(feature = %self.key.0, live = slot.live, "execution slot released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_is_per_key() {
        let limiter = FeatureRateLimiter::new(2, Duration::from_secs(10));

        limiter.acquire("f1", InvocationChannel::Action).unwrap();
        limiter.acquire("f1", InvocationChannel::Action).unwrap();
        assert!(matches!(
            limiter.acquire("f1", InvocationChannel::Action),
            Err(AntboxError::TooMany(_))
        ));

        // Other channels and features have their own counters.
        assert!(limiter.acquire("f1", InvocationChannel::Extension).is_ok());
        assert!(limiter.acquire("f2", InvocationChannel::Action).is_ok());
    }

    #[test]
    fn test_completion_does_not_refill_the_window() {
        let limiter = FeatureRateLimiter::new(2, Duration::from_secs(10));

        drop(limiter.acquire("f1", InvocationChannel::Action).unwrap());
        drop(limiter.acquire("f1", InvocationChannel::Action).unwrap());
        // Both invocations completed, but the window budget stays spent.
        assert!(matches!(
            limiter.acquire("f1", InvocationChannel::Action),
            Err(AntboxError::TooMany(_))
        ));
    }

    #[test]
    fn test_window_expiry_resets_counter() {
        let limiter = FeatureRateLimiter::new(1, Duration::from_millis(20));

        limiter.acquire("f1", InvocationChannel::Action).unwrap();
        assert!(limiter.acquire("f1", InvocationChannel::Action).is_err());

        std::thread::sleep(Duration::from_millis(30));
        assert!(limiter.acquire("f1", InvocationChannel::Action).is_ok());
    }

    #[test]
    fn test_permit_drop_releases_execution_slot() {
        let limiter = FeatureRateLimiter::new(5, Duration::from_secs(10));

        let permit = limiter.acquire("f1", InvocationChannel::Action).unwrap();
        assert_eq!(limiter.live("f1", InvocationChannel::Action), 1);
        drop(permit);
        assert_eq!(limiter.live("f1", InvocationChannel::Action), 0);
    }

    #[test]
    fn test_eleventh_invocation_is_rejected() {
        let limiter = FeatureRateLimiter::default();
        for _ in 0..10 {
            limiter.acquire("burst", InvocationChannel::Action).unwrap();
        }
        assert!(matches!(
            limiter.acquire("burst", InvocationChannel::Action),
            Err(AntboxError::TooMany(_))
        ));
    }
}
