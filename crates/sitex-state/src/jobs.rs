//! Deferred jobs: `schedule(hook, key, run_at, payload)` registers work that
//! a later `take_due` hands to the caller's handler.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::{Result, StateStore, load};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScheduledJob {
    pub hook: String,
    pub key: String,
    pub run_at: DateTime<Utc>,
    pub payload: Value,
}

/// A job queue persisted under a single state-store key.
#[derive(Clone)]
pub struct JobQueue {
    store: Arc<dyn StateStore>,
}

impl JobQueue {
    pub const KEY: &'static str = "scheduled_jobs";

    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    fn jobs(&self) -> Result<Vec<ScheduledJob>> {
        Ok(load(self.store.as_ref(), Self::KEY)?.unwrap_or_default())
    }

    /// Register a job. Returns `false` without changes when a job with the
    /// same hook and key is already pending.
    pub fn schedule(
        &self,
        hook: &str,
        key: &str,
        run_at: DateTime<Utc>,
        payload: Value,
    ) -> Result<bool> {
        let mut inserted = false;
        let mut malformed = None;
        self.store.update(Self::KEY, &mut |current| {
            let mut jobs: Vec<ScheduledJob> = match current {
                None => Vec::new(),
                Some(value) => match serde_json::from_value(value.clone()) {
                    Ok(jobs) => jobs,
                    Err(e) => {
                        malformed = Some(e);
                        return Some(value);
                    }
                },
            };
            if !jobs.iter().any(|j| j.hook == hook && j.key == key) {
                jobs.push(ScheduledJob {
                    hook: hook.to_string(),
                    key: key.to_string(),
                    run_at,
                    payload: payload.clone(),
                });
                inserted = true;
            }
            serde_json::to_value(jobs).ok()
        })?;

        if let Some(source) = malformed {
            return Err(crate::Error::Malformed {
                key: Self::KEY.to_string(),
                source,
            });
        }
        if inserted {
            debug!(hook, key, %run_at, "job scheduled");
        }
        Ok(inserted)
    }

    pub fn is_scheduled(&self, hook: &str, key: &str) -> Result<bool> {
        Ok(self
            .jobs()?
            .iter()
            .any(|j| j.hook == hook && j.key == key))
    }

    /// Pending jobs ordered by due time.
    pub fn pending(&self) -> Result<Vec<ScheduledJob>> {
        let mut jobs = self.jobs()?;
        jobs.sort_by_key(|j| j.run_at);
        Ok(jobs)
    }

    /// Remove and return every job due at or before `now`.
    ///
    /// Jobs are removed before they run, so each fires at most once.
    pub fn take_due(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledJob>> {
        let mut due = Vec::new();
        let mut malformed = None;
        self.store.update(Self::KEY, &mut |current| {
            let value = current?;
            let jobs: Vec<ScheduledJob> = match serde_json::from_value(value.clone()) {
                Ok(jobs) => jobs,
                Err(e) => {
                    malformed = Some(e);
                    return Some(value);
                }
            };
            let (ready, rest): (Vec<_>, Vec<_>) = jobs.into_iter().partition(|j| j.run_at <= now);
            due = ready;
            if rest.is_empty() {
                None
            } else {
                serde_json::to_value(rest).ok()
            }
        })?;

        if let Some(source) = malformed {
            return Err(crate::Error::Malformed {
                key: Self::KEY.to_string(),
                source,
            });
        }
        due.sort_by_key(|j| j.run_at);
        Ok(due)
    }
}

impl std::fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobQueue").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use chrono::Duration;
    use serde_json::json;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn test_schedule_is_idempotent_by_key() {
        let queue = JobQueue::new(Arc::new(MemoryStore::new()));
        assert!(queue.schedule("delete", "/a.zip", at(100), json!(["/a.zip"])).unwrap());
        assert!(!queue.schedule("delete", "/a.zip", at(200), json!(["/a.zip"])).unwrap());
        assert!(queue.schedule("delete", "/b.zip", at(100), json!(["/b.zip"])).unwrap());

        let pending = queue.pending().unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].run_at, at(100));
    }

    #[test]
    fn test_take_due_removes_only_due_jobs() {
        let queue = JobQueue::new(Arc::new(MemoryStore::new()));
        queue.schedule("delete", "early", at(100), json!(null)).unwrap();
        queue.schedule("delete", "late", at(100) + Duration::seconds(300), json!(null)).unwrap();

        let due = queue.take_due(at(150)).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].key, "early");
        assert!(!queue.is_scheduled("delete", "early").unwrap());
        assert!(queue.is_scheduled("delete", "late").unwrap());

        assert!(queue.take_due(at(150)).unwrap().is_empty());
        assert_eq!(queue.take_due(at(400)).unwrap().len(), 1);
        assert!(queue.pending().unwrap().is_empty());
    }
}
