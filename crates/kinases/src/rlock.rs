/*
   ___   __        _   __
  / _ | / /__  ___| | / /__ _______ _
 / __ |/ / _ \/ -_) |/ / -_) __/ _ `/
/_/ |_/_/\___/\__/|___/\__/_/  \_,_/

Copyright 2025 Gavin Kellam

Permission is hereby granted, free of charge, to any person obtaining a copy of this software and
associated documentation files (the "Software"), to deal in the Software without restriction,
including without limitation the rights to use, copy, modify, merge, publish, distribute,
sublicense, and/or sell copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:

The above copyright notice and this permission notice shall be included in all copies or substantial
portions of the Software.

THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING BUT
NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT
OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.
*/

//! A re-entrant lock, built by wrapping [`crate::lock::Lock`] with a recursion counter
//! keyed on owner identity, exactly as the non-reentrant primitive it wraps.

use crate::error::{LockError, RLockError};
use crate::event::CancelSignal;
use crate::identity::Identity;
use crate::lock::Lock;
use crate::spin::mutex::SpinMutex;
use core::future::Future;
use core::mem;

#[cfg(feature = "std")]
use core::time::Duration;

/// A re-entrant lock: the identity that already owns it may acquire it again, incrementing
/// a recursion counter instead of parking. Every acquire must be matched by a release; the
/// underlying [`Lock`] is only actually released once the counter returns to zero.
pub struct RLock {
    lock: Lock,
    count: SpinMutex<usize>,
}

impl RLock {
    /// A fresh, unlocked `RLock`.
    pub fn new() -> Self {
        Self {
            lock: Lock::new(),
            count: SpinMutex::new(0),
        }
    }

    /// Whether the lock is currently held.
    pub fn locked(&self) -> bool {
        self.lock.locked()
    }

    /// The current owner, if any.
    pub fn owner(&self) -> Option<Identity> {
        self.lock.owner()
    }

    /// Current parked-waiter count on the underlying lock.
    pub fn waiting(&self) -> usize {
        self.lock.waiting()
    }

    /// The current recursion count. Meaningful only while the lock is held; `0` when free.
    pub fn count(&self) -> usize {
        *self.count.lock()
    }

    /// Acquire `count` units of recursion without waiting if possible.
    pub fn try_acquire(&self, identity: Identity, count: usize) -> Result<RLockGuard<'_>, RLockError> {
        if self.lock.owner() == Some(identity) {
            *self.count.lock() += count;
            return Ok(RLockGuard::new(self, identity, count));
        }

        match self.lock.try_lock(identity) {
            Ok(guard) => {
                mem::forget(guard);
                *self.count.lock() = count;
                Ok(RLockGuard::new(self, identity, count))
            }
            Err(LockError::WouldBlock) => Err(RLockError::WouldBlock),
            Err(LockError::Cancelled) => Err(RLockError::Cancelled),
            Err(LockError::Recursion | LockError::NotOwner) => {
                unreachable!("try_lock only raises WouldBlock when identity is not the owner")
            }
        }
    }

    /// Block the calling thread until `identity` holds `count` units of recursion,
    /// optionally bounded by `timeout`.
    #[cfg(feature = "std")]
    pub fn blocking_acquire(
        &self,
        identity: Identity,
        count: usize,
        timeout: Option<Duration>,
    ) -> Result<RLockGuard<'_>, RLockError> {
        if self.lock.owner() == Some(identity) {
            *self.count.lock() += count;
            return Ok(RLockGuard::new(self, identity, count));
        }

        match self.lock.blocking_acquire(identity, timeout) {
            Ok(guard) => {
                mem::forget(guard);
                *self.count.lock() = count;
                Ok(RLockGuard::new(self, identity, count))
            }
            Err(LockError::WouldBlock) => Err(RLockError::WouldBlock),
            Err(LockError::Cancelled) => Err(RLockError::Cancelled),
            Err(LockError::Recursion | LockError::NotOwner) => {
                unreachable!("blocking_acquire only blocks when identity is not the owner")
            }
        }
    }

    /// Suspend the calling task until `identity` holds `count` units of recursion.
    ///
    /// `cancel`/`shield` behave exactly as in [`Lock::async_acquire`].
    pub fn async_acquire<'a>(
        &'a self,
        identity: Identity,
        count: usize,
        cancel: Option<&'a dyn CancelSignal>,
        shield: bool,
    ) -> impl Future<Output = Result<RLockGuard<'a>, RLockError>> + 'a {
        async move {
            if self.lock.owner() == Some(identity) {
                *self.count.lock() += count;
                return Ok(RLockGuard::new(self, identity, count));
            }

            let guard = self
                .lock
                .async_acquire(identity, cancel, shield)
                .await
                .map_err(RLockError::from)?;
            mem::forget(guard);
            *self.count.lock() = count;
            Ok(RLockGuard::new(self, identity, count))
        }
    }

    /// Release `count` units of recursion held by `identity`. Once the count reaches zero
    /// the underlying [`Lock`] is actually released, performing FIFO handoff as usual.
    pub fn release(&self, identity: Identity, count: usize) -> Result<(), RLockError> {
        if self.lock.owner() != Some(identity) {
            lignan::warnln!("RLock::release called by an identity that does not hold the lock");
            return Err(RLockError::NotOwner);
        }

        let mut counter = self.count.lock();
        if count > *counter {
            lignan::warnln!("RLock::release count exceeds the outstanding recursion count");
            return Err(RLockError::Underflow);
        }

        *counter -= count;
        let fully_released = *counter == 0;
        drop(counter);

        if fully_released {
            self.lock
                .release(identity)
                .expect("identity was just verified as the current owner");
        }

        Ok(())
    }
}

impl Default for RLock {
    fn default() -> Self {
        Self::new()
    }
}

/// Held recursion units. Releasing the same `count` this guard was acquired with happens
/// automatically on drop, on any exit path.
#[must_use = "an RLockGuard releases its recursion units when dropped"]
pub struct RLockGuard<'a> {
    rlock: &'a RLock,
    identity: Identity,
    count: usize,
}

impl<'a> RLockGuard<'a> {
    fn new(rlock: &'a RLock, identity: Identity, count: usize) -> Self {
        Self {
            rlock,
            identity,
            count,
        }
    }

    /// The identity this guard was acquired for.
    pub fn identity(&self) -> Identity {
        self.identity
    }
}

impl Drop for RLockGuard<'_> {
    fn drop(&mut self) {
        let _ = self.rlock.release(self.identity, self.count);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::identity::Identity;

    fn id(id: u64) -> Identity {
        Identity::task(id)
    }

    #[test]
    fn reentrant_acquire_accumulates_count() {
        let lock = RLock::new();
        let t1 = id(1);

        let g1 = lock.try_acquire(t1, 1).unwrap();
        assert_eq!(lock.count(), 1);
        let g2 = lock.try_acquire(t1, 1).unwrap();
        assert_eq!(lock.count(), 2);

        drop(g2);
        assert_eq!(lock.count(), 1);
        assert!(lock.locked());

        drop(g1);
        assert_eq!(lock.count(), 0);
        assert!(!lock.locked());
    }

    #[test]
    fn other_identity_cannot_acquire_while_held() {
        let lock = RLock::new();
        let t1 = id(1);
        let t2 = id(2);

        let _g1 = lock.try_acquire(t1, 1).unwrap();
        assert_eq!(lock.try_acquire(t2, 1).unwrap_err(), RLockError::WouldBlock);
    }

    #[test]
    fn release_underflow_is_rejected() {
        let lock = RLock::new();
        let t1 = id(1);

        let guard = lock.try_acquire(t1, 1).unwrap();
        assert_eq!(lock.release(t1, 5).unwrap_err(), RLockError::Underflow);
        drop(guard);
    }

    #[test]
    fn release_by_non_owner_is_rejected() {
        let lock = RLock::new();
        let t1 = id(1);
        let t2 = id(2);

        let _guard = lock.try_acquire(t1, 1).unwrap();
        assert_eq!(lock.release(t2, 1).unwrap_err(), RLockError::NotOwner);
    }

    #[cfg(feature = "std")]
    #[test]
    fn s4_three_acquires_two_releases_then_waiter_takes_over() {
        use std::sync::Arc;
        use std::thread;
        use std::time::Duration;

        let lock = Arc::new(RLock::new());
        let t1 = id(1);
        let t2 = id(2);

        // Manage the recursion count through explicit `release` calls rather than the RAII
        // guard: the guard's own `Drop` would release all 3 units at the end of this test,
        // double-releasing against the explicit releases below.
        core::mem::forget(lock.try_acquire(t1, 3).unwrap());
        lock.release(t1, 2).unwrap();
        assert_eq!(lock.count(), 1);
        assert_eq!(lock.owner(), Some(t1));

        let waiter_lock = lock.clone();
        let waiter = thread::spawn(move || {
            waiter_lock
                .blocking_acquire(t2, 1, None)
                .expect("t2 should eventually own the lock")
        });

        thread::sleep(Duration::from_millis(20));
        lock.release(t1, 1).unwrap();

        let guard = waiter.join().unwrap();
        assert_eq!(lock.owner(), Some(t2));
        drop(guard);
        assert!(!lock.locked());
    }
}
