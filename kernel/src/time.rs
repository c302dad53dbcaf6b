//! Wall clock used for inode timestamps.

use std::sync::atomic::{ AtomicU32, Ordering };
use std::time::{ Instant, SystemTime, UNIX_EPOCH };

use lazy_static::lazy_static;

pub trait Clock: Send + Sync {
    /// Seconds since the epoch.
    fn now(&self) -> u32;
}

lazy_static! {
    static ref STARTUP: (u32, Instant) = {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);
        (secs, Instant::now())
    };
}

/// Boot time plus a monotonic tick count.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u32 {
        STARTUP.0.wrapping_add(STARTUP.1.elapsed().as_secs() as u32)
    }
}

/// A clock that only moves when told to.
pub struct FixedClock(AtomicU32);

impl FixedClock {
    pub fn new(now: u32) -> Self {
        Self(AtomicU32::new(now))
    }

    pub fn set(&self, now: u32) {
        self.0.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u32) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }
}

impl<C: Clock> Clock for std::sync::Arc<C> {
    fn now(&self) -> u32 {
        (**self).now()
    }
}
