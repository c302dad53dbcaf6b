mod spinlock;
mod sleeplock;

pub use spinlock::{ Spinlock, SpinlockGuard };
pub use sleeplock::WaitQueue;
