//! Sleep and wakeup.
//!
//! A `WaitQueue` is a channel a thread sleeps on until another thread
//! calls `wake_up`. Every wakeup wakes all sleepers; they re-check the
//! condition they were waiting for and go back to sleep if it still
//! does not hold.

use std::sync::{ Condvar, Mutex, PoisonError };

pub struct WaitQueue {
    name: &'static str,
    generation: Mutex<u64>,
    cond: Condvar,
}

impl WaitQueue {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            generation: Mutex::new(0),
            cond: Condvar::new(),
        }
    }

    /// Release `guard` and sleep until the next `wake_up`.
    ///
    /// The caller checked its condition under `guard`. A waker that
    /// takes the same lock after that check is guaranteed to wake us,
    /// because our ticket is taken before the guard is dropped.
    pub fn sleep_on<G>(&self, guard: G) {
        let mut generation = self.generation.lock().unwrap_or_else(PoisonError::into_inner);
        let ticket = *generation;
        drop(guard);
        log::trace!("sleep on {}", self.name);
        while *generation == ticket {
            generation = self.cond.wait(generation).unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub fn wake_up(&self) {
        let mut generation = self.generation.lock().unwrap_or_else(PoisonError::into_inner);
        *generation = generation.wrapping_add(1);
        self.cond.notify_all();
    }
}
