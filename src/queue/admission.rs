//! Admission gate: combined capacity and per-user quota check.
//!
//! Admission is the only writer to the queue, and it runs under a single
//! mutex, so no concurrent admission can observe a state where the quota
//! is incremented but the job not yet enqueued (or vice versa).

use crate::audio::{AudioFormat, AudioItem};
use crate::queue::job::{Job, JobId, UserId};
use crate::queue::job_queue::JobQueue;
use crate::queue::rate_limiter::{QuotaGuard, RateLimiter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Outcome of an admission attempt.
///
/// Capacity is checked before the user quota: when both would reject, the
/// scarcer system-wide resource is the reason reported.
#[derive(Debug, PartialEq, Eq)]
pub enum Admission {
    /// Job enqueued; `position` is its place in the queue (1-based).
    Admitted { job_id: JobId, position: usize },
    /// The global queue is at capacity.
    RejectedCapacity,
    /// The user already has `in_queue` jobs queued or running, at the
    /// per-user maximum.
    RejectedUserQuota { in_queue: u32 },
}

/// Gate that admits jobs into the queue under capacity and fairness limits.
#[derive(Debug)]
pub struct AdmissionGate {
    queue: JobQueue,
    limiter: Arc<RateLimiter>,
    max_per_user: u32,
    next_id: AtomicU64,
    // Serializes check + increment + enqueue into one logical operation.
    admit_lock: Mutex<()>,
}

impl AdmissionGate {
    pub fn new(queue: JobQueue, limiter: Arc<RateLimiter>, max_per_user: u32) -> Self {
        Self {
            queue,
            limiter,
            max_per_user,
            next_id: AtomicU64::new(1),
            admit_lock: Mutex::new(()),
        }
    }

    /// Attempts to admit a validated audio item for `user`.
    ///
    /// On success the user's quota is incremented and the job enqueued
    /// atomically with respect to other admission attempts. Rejection
    /// leaves no state change behind.
    pub fn try_admit(&self, user: UserId, audio: AudioItem, format: AudioFormat) -> Admission {
        let _guard = match self.admit_lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if self.queue.is_full() {
            return Admission::RejectedCapacity;
        }

        let in_queue = self.limiter.current_count(user);
        if in_queue >= self.max_per_user {
            return Admission::RejectedUserQuota { in_queue };
        }

        self.limiter.increment(user);
        let quota = QuotaGuard::new(self.limiter.clone(), user);
        let job_id = JobId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let job = Job::new(job_id, user, audio, format, quota);

        // Position is read before the enqueue: a worker may claim the job
        // the instant it lands, and a post-enqueue len() could report 0.
        let position = self.queue.len() + 1;
        match self.queue.try_enqueue(job) {
            Ok(()) => Admission::Admitted { job_id, position },
            // Unreachable while admission holds the only producer, but a
            // rejection must not leak the quota slot. The dropped job's
            // guard releases it.
            Err(_job) => Admission::RejectedCapacity,
        }
    }

    /// Current number of queued, not-yet-claimed jobs.
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue.capacity()
    }

    pub fn max_per_user(&self) -> u32 {
        self.max_per_user
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    fn ogg_item() -> AudioItem {
        AudioItem::new(vec![0u8; 64], "audio/ogg", None)
    }

    fn gate(capacity: usize, max_per_user: u32) -> (AdmissionGate, JobQueue, Arc<RateLimiter>) {
        let queue = JobQueue::new(capacity);
        let limiter = Arc::new(RateLimiter::new());
        let gate = AdmissionGate::new(queue.clone(), limiter.clone(), max_per_user);
        (gate, queue, limiter)
    }

    #[test]
    fn test_admits_within_limits() {
        let (gate, queue, limiter) = gate(4, 2);
        let user = UserId(1);

        match gate.try_admit(user, ogg_item(), AudioFormat::Ogg) {
            Admission::Admitted { job_id, position } => {
                assert_eq!(job_id, JobId(1));
                assert_eq!(position, 1);
            }
            other => panic!("Expected Admitted, got {:?}", other),
        }
        assert_eq!(queue.len(), 1);
        assert_eq!(limiter.current_count(user), 1);
    }

    #[test]
    fn test_rejects_at_user_quota() {
        let (gate, _queue, limiter) = gate(10, 2);
        let user = UserId(1);

        assert!(matches!(
            gate.try_admit(user, ogg_item(), AudioFormat::Ogg),
            Admission::Admitted { .. }
        ));
        assert!(matches!(
            gate.try_admit(user, ogg_item(), AudioFormat::Ogg),
            Admission::Admitted { .. }
        ));
        assert_eq!(
            gate.try_admit(user, ogg_item(), AudioFormat::Ogg),
            Admission::RejectedUserQuota { in_queue: 2 }
        );
        // Rejection left no state change behind.
        assert_eq!(limiter.current_count(user), 2);
        assert_eq!(gate.queue_len(), 2);
    }

    #[test]
    fn test_rejects_at_capacity() {
        let (gate, _queue, limiter) = gate(2, 5);
        assert!(matches!(
            gate.try_admit(UserId(1), ogg_item(), AudioFormat::Ogg),
            Admission::Admitted { .. }
        ));
        assert!(matches!(
            gate.try_admit(UserId(2), ogg_item(), AudioFormat::Ogg),
            Admission::Admitted { .. }
        ));

        assert_eq!(
            gate.try_admit(UserId(3), ogg_item(), AudioFormat::Ogg),
            Admission::RejectedCapacity
        );
        assert_eq!(limiter.current_count(UserId(3)), 0);
    }

    #[test]
    fn test_capacity_reported_before_quota() {
        // User is over quota AND the queue is full; capacity wins.
        let (gate, _queue, _limiter) = gate(1, 1);
        let user = UserId(1);
        assert!(matches!(
            gate.try_admit(user, ogg_item(), AudioFormat::Ogg),
            Admission::Admitted { .. }
        ));
        assert_eq!(
            gate.try_admit(user, ogg_item(), AudioFormat::Ogg),
            Admission::RejectedCapacity
        );
    }

    #[test]
    fn test_job_ids_are_unique_and_monotonic() {
        let (gate, queue, _limiter) = gate(8, 8);
        let mut ids = Vec::new();
        for _ in 0..5 {
            if let Admission::Admitted { job_id, .. } =
                gate.try_admit(UserId(1), ogg_item(), AudioFormat::Ogg)
            {
                ids.push(job_id);
            }
        }
        assert_eq!(ids, vec![JobId(1), JobId(2), JobId(3), JobId(4), JobId(5)]);

        // Queue holds them in admission order.
        let consumer = queue.consumer();
        for id in ids {
            assert_eq!(consumer.claim(Duration::from_millis(10)).unwrap().id, id);
        }
    }

    #[test]
    fn test_position_stays_positive_with_concurrent_claims() {
        // A worker draining the queue as fast as jobs land must never make
        // an admission report position 0.
        let (gate, queue, _limiter) = gate(16, 1000);
        let consumer = queue.consumer();
        let done = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let drainer = {
            let done = done.clone();
            thread::spawn(move || {
                while !done.load(Ordering::Relaxed) {
                    let _ = consumer.claim(Duration::from_millis(1));
                }
            })
        };

        for i in 0..200 {
            if let Admission::Admitted { position, .. } =
                gate.try_admit(UserId(i), ogg_item(), AudioFormat::Ogg)
            {
                assert!(position >= 1, "admission {} reported position 0", i);
            }
        }

        done.store(true, Ordering::Relaxed);
        drainer.join().unwrap();
    }

    #[test]
    fn test_concurrent_admissions_never_exceed_capacity() {
        let capacity = 8;
        let (gate, queue, _limiter) = gate(capacity, 100);
        let gate = Arc::new(gate);

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let gate = gate.clone();
                thread::spawn(move || {
                    let mut admitted = 0;
                    for _ in 0..10 {
                        if matches!(
                            gate.try_admit(UserId(i), ogg_item(), AudioFormat::Ogg),
                            Admission::Admitted { .. }
                        ) {
                            admitted += 1;
                        }
                    }
                    admitted
                })
            })
            .collect();

        let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, capacity, "exactly capacity jobs admitted");
        assert_eq!(queue.len(), capacity);
    }

    #[test]
    fn test_concurrent_same_user_never_exceeds_quota() {
        let (gate, _queue, limiter) = gate(100, 2);
        let gate = Arc::new(gate);
        let user = UserId(42);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = gate.clone();
                thread::spawn(move || {
                    let mut admitted = 0;
                    for _ in 0..10 {
                        if matches!(
                            gate.try_admit(user, ogg_item(), AudioFormat::Ogg),
                            Admission::Admitted { .. }
                        ) {
                            admitted += 1;
                        }
                    }
                    admitted
                })
            })
            .collect();

        let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, 2, "same user admitted at most max_per_user jobs");
        assert_eq!(limiter.current_count(user), 2);
    }
}
