//! spinlock

/// A named busy-waiting mutex guarding one of the file system tables.
///
/// Guards must never be held across a sleep on a `WaitQueue`; pass the
/// guard to `WaitQueue::sleep_on` instead.
pub struct Spinlock<T> {
    name: &'static str,
    inner: spin::Mutex<T>,
}

pub type SpinlockGuard<'a, T> = spin::MutexGuard<'a, T>;

impl<T> Spinlock<T> {
    pub const fn new(data: T, name: &'static str) -> Self {
        Self {
            name,
            inner: spin::Mutex::new(data),
        }
    }

    pub fn acquire(&self) -> SpinlockGuard<'_, T> {
        if let Some(guard) = self.inner.try_lock() {
            return guard;
        }
        log::trace!("{}: contended", self.name);
        self.inner.lock()
    }
}
