//! Keyed map of in-progress reassembly jobs behind one coarse lock.

use std::{
    collections::{HashMap, hash_map::Entry},
    sync::{Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use tracing::{debug, error};

use super::{
    Notification,
    NotificationId,
    NotificationPart,
    PushMessage,
    PushMessageError,
    job::ReassemblyJob,
};

/// Reassembles notifications split across several push messages.
///
/// Every message for a notification (the metadata message and each fragment)
/// goes through [`accept`](Self::accept). The first message for an identifier
/// creates a job whose outstanding-part counter comes from the count that
/// message declares; every later message decrements it by one. Once the
/// counter reaches zero and the metadata is present, the fragments are
/// ordered, inflated and merged into the metadata, and the job is removed.
///
/// The manager never evicts jobs on its own. Abandoned jobs stay until
/// [`remove_assembly`](Self::remove_assembly) or
/// [`purge_stale_at`](Self::purge_stale_at) is called.
///
/// Duplicate deliveries are not detected: a repeated fragment decrements the
/// counter a second time, which can complete a job early or push the counter
/// below zero so that it never completes.
///
/// # Examples
///
/// ```
/// use courier::assembly::{AssemblyManager, PushMessage};
///
/// let manager = AssemblyManager::new();
/// let metadata = PushMessage::new()
///     .with("notificationId", "n-1")
///     .with("payload", r#"{"title":"hi","bodyPartCount":2}"#);
/// let second = PushMessage::new()
///     .with("notificationId", "n-1")
///     .with("field", "body")
///     .with("sequence", 1)
///     .with("totalParts", 2)
///     .with("data", "IFdvcmxk");
/// let first = second.clone().with("sequence", 0).with("data", "SGVsbG8=");
///
/// assert!(manager.accept_message(&metadata).expect("valid").is_none());
/// assert!(manager.accept_message(&second).expect("valid").is_none());
/// let notification = manager
///     .accept_message(&first)
///     .expect("valid")
///     .expect("all parts delivered");
/// assert_eq!(notification.body(), Some("Hello World"));
/// assert_eq!(manager.pending_len(), 0);
/// ```
#[derive(Debug, Default)]
pub struct AssemblyManager {
    jobs: Mutex<HashMap<NotificationId, ReassemblyJob>>,
}

impl AssemblyManager {
    /// Create an empty manager.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Classify a raw push message and feed it to the matching job.
    ///
    /// # Errors
    ///
    /// Returns [`PushMessageError`] when the message is malformed. Malformed
    /// messages never touch the job map.
    pub fn accept_message(
        &self,
        message: &PushMessage,
    ) -> Result<Option<Notification>, PushMessageError> {
        let part = NotificationPart::try_from(message)?;
        Ok(self.accept(part))
    }

    /// Feed one classified part using the current time.
    ///
    /// Returns the completed notification exactly once, when this part was the
    /// last one missing; `None` while the job is still buffering.
    pub fn accept(&self, part: NotificationPart) -> Option<Notification> {
        self.accept_at(part, Instant::now())
    }

    /// Feed one classified part using an explicit clock reading.
    ///
    /// The clock only stamps newly created jobs for
    /// [`purge_stale_at`](Self::purge_stale_at).
    pub fn accept_at(&self, part: NotificationPart, now: Instant) -> Option<Notification> {
        let id = part.id().clone();
        let mut jobs = self.lock();

        let job = match jobs.entry(id.clone()) {
            Entry::Vacant(vacant) => vacant.insert(ReassemblyJob::new(part.declared_parts(), now)),
            Entry::Occupied(occupied) => {
                let job = occupied.into_mut();
                job.decrement();
                job
            }
        };
        job.record(part);
        debug!(notification = %id, missing = job.missing_parts(), "notification part recorded");

        let Some(outcome) = job.try_assemble(&id) else {
            crate::metrics::set_pending_assemblies(jobs.len());
            return None;
        };

        let notification = match outcome {
            Ok(notification) => {
                jobs.remove(&id);
                crate::metrics::inc_notifications_assembled();
                Some(notification)
            }
            Err(err) => {
                error!(notification = %id, error = %err, "failed to decode notification fragments");
                crate::metrics::inc_decode_errors();
                None
            }
        };
        crate::metrics::set_pending_assemblies(jobs.len());
        notification
    }

    /// Drop the job for `id`, if any. Calling this for an unknown identifier
    /// is a no-op.
    pub fn remove_assembly(&self, id: &str) {
        let mut jobs = self.lock();
        if jobs.remove(id).is_some() {
            debug!(notification = id, "assembly removed");
        }
        crate::metrics::set_pending_assemblies(jobs.len());
    }

    /// Remove every job created at least `max_age` before `now`.
    ///
    /// Returns the identifiers that were evicted. The manager never calls this
    /// itself; callers schedule it when they want abandoned jobs cleaned up.
    pub fn purge_stale_at(&self, now: Instant, max_age: Duration) -> Vec<NotificationId> {
        let mut evicted = Vec::new();
        let mut jobs = self.lock();
        jobs.retain(|id, job| {
            let stale = now.saturating_duration_since(job.started_at()) >= max_age;
            if stale {
                evicted.push(id.clone());
            }
            !stale
        });
        crate::metrics::set_pending_assemblies(jobs.len());
        evicted
    }

    /// Number of notifications still buffering.
    #[must_use]
    pub fn pending_len(&self) -> usize { self.lock().len() }

    /// Identifiers of notifications still buffering, in sorted order.
    #[must_use]
    pub fn pending_ids(&self) -> Vec<NotificationId> {
        let mut ids: Vec<_> = self.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Outstanding-part counter of the job for `id`.
    #[must_use]
    pub fn missing_parts(&self, id: &str) -> Option<i64> {
        self.lock().get(id).map(ReassemblyJob::missing_parts)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<NotificationId, ReassemblyJob>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
