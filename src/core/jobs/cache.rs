//! Result cache keyed by job identity.
//!
//! Entries outlive the job record that produced them, so a result stays
//! servable after the sweeper has dropped the record from the live index.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

use super::identity::JobIdentity;
use super::job::{JobOutcome, JobRecord};

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub outcome: JobOutcome,
    pub cached_at: Instant,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: DateTime<Utc>,
    pub last_heartbeat_at: DateTime<Utc>,
}

impl CacheEntry {
    pub(crate) fn from_record(record: &JobRecord, outcome: JobOutcome) -> Self {
        Self {
            outcome,
            cached_at: Instant::now(),
            submitted_at: record.submitted_at,
            started_at: record.started_at,
            completed_at: record.completed_at.unwrap_or_else(Utc::now),
            last_heartbeat_at: record.last_heartbeat_at,
        }
    }

    pub fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.cached_at) > ttl
    }
}

pub struct ResultCache {
    entries: HashMap<JobIdentity, CacheEntry>,
    ttl: Duration,
}

impl ResultCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    /// Store an outcome. Entries are write-once: returns false and keeps the
    /// existing entry if the identity already has one.
    pub fn insert(&mut self, identity: JobIdentity, entry: CacheEntry) -> bool {
        if self.entries.contains_key(&identity) {
            return false;
        }
        self.entries.insert(identity, entry);
        true
    }

    pub fn get(&self, identity: &JobIdentity) -> Option<&CacheEntry> {
        self.entries.get(identity)
    }

    pub fn outcome(&self, identity: &JobIdentity) -> Option<JobOutcome> {
        self.entries.get(identity).map(|entry| entry.outcome.clone())
    }

    pub fn contains(&self, identity: &JobIdentity) -> bool {
        self.entries.contains_key(identity)
    }

    /// Drop an entry ahead of its TTL, making room for a fresh outcome.
    pub fn remove(&mut self, identity: &JobIdentity) -> Option<CacheEntry> {
        self.entries.remove(identity)
    }

    pub fn expired_count(&self, now: Instant) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.is_expired(self.ttl, now))
            .count()
    }

    /// Evict at most `limit` expired entries, oldest first.
    pub fn evict_expired(&mut self, now: Instant, limit: usize) -> Vec<JobIdentity> {
        if limit == 0 {
            return Vec::new();
        }

        let mut expired: Vec<(Instant, JobIdentity)> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(self.ttl, now))
            .map(|(identity, entry)| (entry.cached_at, identity.clone()))
            .collect();
        expired.sort();
        expired.truncate(limit);

        expired
            .into_iter()
            .map(|(_, identity)| {
                self.entries.remove(&identity);
                identity
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
