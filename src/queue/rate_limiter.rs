//! Per-user in-flight job accounting.
//!
//! Tracks how many jobs each user currently has queued or running. Consulted
//! by the admission gate and decremented exactly once per job when it leaves
//! the system, via [`QuotaGuard`].

use crate::queue::job::UserId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Thread-safe per-user counter of queued-or-running jobs.
///
/// Entries are created lazily on a user's first job and removed again when
/// their count returns to zero, so the map does not grow with the lifetime
/// user population.
#[derive(Debug, Default)]
pub struct RateLimiter {
    counts: Mutex<HashMap<UserId, u32>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of jobs this user currently has queued or running.
    pub fn current_count(&self, user: UserId) -> u32 {
        self.lock().get(&user).copied().unwrap_or(0)
    }

    /// Records one more in-flight job for the user.
    pub fn increment(&self, user: UserId) {
        *self.lock().entry(user).or_insert(0) += 1;
    }

    /// Records that one of the user's jobs left the system.
    ///
    /// Driving a count below zero indicates a job was double-completed or
    /// completed without being admitted; that is a programming error, logged
    /// and asserted in debug builds, and the count saturates at zero.
    pub fn decrement(&self, user: UserId) {
        let mut counts = self.lock();
        match counts.get_mut(&user) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                counts.remove(&user);
            }
            None => {
                drop(counts);
                eprintln!("scribeq: quota underflow for {user}, job released twice?");
                debug_assert!(false, "quota underflow for {user}");
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<UserId, u32>> {
        // A poisoned lock means another thread panicked mid-update; the map
        // holds only plain counters, so continuing is safe.
        match self.counts.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Number of users with at least one in-flight job.
    pub fn active_users(&self) -> usize {
        self.lock().len()
    }
}

/// Releases one user's quota slot exactly once.
///
/// Carried inside the job from admission to completion. The worker releases
/// it explicitly after handing the result off; dropping an unreleased guard
/// (job discarded on an error path) releases as a fallback. Duplicate
/// release attempts are ignored.
#[derive(Debug)]
pub struct QuotaGuard {
    limiter: Arc<RateLimiter>,
    user: UserId,
    released: AtomicBool,
}

impl QuotaGuard {
    /// Takes ownership of one already-incremented quota slot.
    pub fn new(limiter: Arc<RateLimiter>, user: UserId) -> Self {
        Self {
            limiter,
            user,
            released: AtomicBool::new(false),
        }
    }

    /// Releases the slot. Safe to call more than once; only the first call
    /// decrements.
    pub fn release(&self) {
        if !self.released.swap(true, Ordering::AcqRel) {
            self.limiter.decrement(self.user);
        }
    }
}

impl Drop for QuotaGuard {
    fn drop(&mut self) {
        self.release();
    }
}
