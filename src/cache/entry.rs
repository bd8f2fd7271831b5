//! Cache entry snapshots.

use super::key::CacheKey;
use crate::LoadError;
use std::time::Duration;
use tokio::time::Instant;

/// Request state of one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Empty,
    Loading,
    Ready,
    Failed,
}

/// Point-in-time view of a cached key, as returned by [`super::TtlCache::get`].
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub key: CacheKey,
    pub payload: Option<T>,
    pub fetched_at: Option<Instant>,
    pub state: EntryState,
    pub error: Option<LoadError>,
    pub(crate) ttl: Duration,
}

impl<T> CacheEntry<T> {
    pub(crate) fn empty(key: CacheKey, ttl: Duration) -> Self {
        Self {
            key,
            payload: None,
            fetched_at: None,
            state: EntryState::Empty,
            error: None,
            ttl,
        }
    }

    /// Ready entries expire once `ttl` has elapsed since they were fetched.
    /// Failed entries are always expired so the next fetch retries.
    pub fn is_expired(&self) -> bool {
        match self.state {
            EntryState::Ready => self
                .fetched_at
                .map(|at| at.elapsed() >= self.ttl)
                .unwrap_or(true),
            EntryState::Failed | EntryState::Empty => true,
            EntryState::Loading => false,
        }
    }

    /// Ready and within TTL.
    pub fn is_fresh(&self) -> bool {
        self.state == EntryState::Ready && !self.is_expired()
    }

    /// Time left before this entry goes stale.
    pub fn remaining_ttl(&self) -> Option<Duration> {
        if self.state != EntryState::Ready {
            return None;
        }
        self.fetched_at
            .map(|at| self.ttl.saturating_sub(at.elapsed()))
            .filter(|d| !d.is_zero())
    }
}
