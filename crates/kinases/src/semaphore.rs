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

//! Counting semaphores, shared between blocking threads and cooperative tasks.
//!
//! `Semaphore`, `BoundedSemaphore`, `BinarySemaphore`, and `BoundedBinarySemaphore` are thin
//! newtypes over one [`RawSemaphore`] -- the hot counter update is a lock-free
//! `compare_exchange_weak` loop, falling back to the [`WaitQueue`] only once the fast path
//! fails, the same split `sync::semaphore::Semaphore` used.

extern crate alloc;

use crate::error::{AcquireError, ReleaseError};
use crate::event::CancelSignal;
use crate::wait_queue::{Token, WaitQueue};
use alloc::sync::Arc;
use core::future::Future;
use core::pin::Pin;
use core::sync::atomic::{AtomicUsize, Ordering};
use core::task::{Context, Poll};

#[cfg(feature = "std")]
use core::time::Duration;

/// Strict-fairness toggle from the source this crate's design is modeled on: `true` means
/// the fast path always inspects the waiter queue before taking a unit (no barging ever
/// possible); `false` would permit a narrow barging window when the queue last looked
/// empty. Only `true` is implemented and tested; this constant documents the knob rather
/// than exposing it, matching the "deployment constant, not a public knob" framing.
const _PERFECT_FAIRNESS_ENABLED: bool = true;

struct RawSemaphore {
    value: AtomicUsize,
    max_value: Option<usize>,
    initial_value: usize,
    queue: WaitQueue,
}

impl RawSemaphore {
    fn new(initial_value: usize, max_value: Option<usize>) -> Self {
        if let Some(max) = max_value {
            assert!(
                initial_value <= max,
                "initial_value must not exceed max_value"
            );
        }

        Self {
            value: AtomicUsize::new(initial_value),
            max_value,
            initial_value,
            queue: WaitQueue::new(),
        }
    }

    fn value(&self) -> usize {
        self.value.load(Ordering::Acquire)
    }

    fn waiting(&self) -> usize {
        self.queue.waiting()
    }

    /// Fast path: requires both `value > 0` and no live waiter, so a late arriver can never
    /// barge past an already-parked waiter.
    fn try_acquire_fast(&self) -> bool {
        loop {
            let current = self.value.load(Ordering::Acquire);
            if current == 0 {
                return false;
            }

            if self.queue.has_live_waiter() {
                return false;
            }

            match self.value.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(_) => continue,
            }
        }
    }

    /// Hand a unit off to the next waiter if one exists, otherwise credit `value`.
    fn release_one(&self) -> Result<(), ReleaseError> {
        if let Some(token) = self.queue.dequeue_claim() {
            token.event().set();
            return Ok(());
        }

        loop {
            let current = self.value.load(Ordering::Acquire);

            if let Some(max) = self.max_value {
                if current + 1 > max {
                    return Err(ReleaseError::Overflow);
                }
            }

            match self.value.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(()),
                Err(_) => continue,
            }
        }
    }

    fn release(&self, count: usize) -> Result<(), ReleaseError> {
        for _ in 0..count {
            self.release_one()?;
        }
        Ok(())
    }

    /// Return a unit that was removed from circulation (decremented or dequeued) without
    /// ever being consumed by its waiter -- the cancellation-race compensation path.
    /// Overflow can't occur here: the unit being returned was always accounted for.
    fn compensate(&self) {
        let _ = self.release_one();
    }

    #[cfg(feature = "std")]
    fn blocking_acquire(&self, timeout: Option<Duration>) -> Result<(), AcquireError> {
        if self.try_acquire_fast() {
            return Ok(());
        }

        let token = Arc::new(Token::new(None, 1));
        self.queue.enqueue(&token);

        if token.event().wait_blocking(timeout) {
            return Ok(());
        }

        // Timed out. Race the releaser for ownership of the token.
        if token.cancel() {
            return Err(AcquireError::Cancelled);
        }

        // Lost the race: a releaser already claimed and is signalling (or has signalled)
        // this token's event. The permit is ours; wait for the signal to land.
        token.event().wait_blocking(None);
        Ok(())
    }
}

/// Future returned by `async_acquire`. Dropping it before it resolves safely abandons the
/// wait, compensating the semaphore if a releaser already handed off a permit in the race.
struct Acquire<'a> {
    raw: &'a RawSemaphore,
    token: Option<Arc<Token>>,
    cancel: Option<&'a dyn CancelSignal>,
    shield: bool,
}

impl<'a> Future for Acquire<'a> {
    type Output = Result<(), AcquireError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        if this.token.is_none() {
            if this.raw.try_acquire_fast() {
                return Poll::Ready(Ok(()));
            }

            let token = Arc::new(Token::new(None, 1));
            this.raw.queue.enqueue(&token);
            this.token = Some(token);
        }

        let token = this.token.as_ref().expect("token registered above");

        if !this.shield {
            if let Some(cancel) = this.cancel {
                if cancel.is_cancelled() && token.cancel() {
                    this.token = None;
                    return Poll::Ready(Err(AcquireError::Cancelled));
                }
            }
        }

        match token.event().poll_wait(cx) {
            Poll::Ready(()) => {
                this.token = None;
                Poll::Ready(Ok(()))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<'a> Drop for Acquire<'a> {
    fn drop(&mut self) {
        let Some(token) = self.token.take() else {
            return;
        };

        if token.cancel() {
            // We won the race: no releaser ever saw this token, no permit was lost.
            return;
        }

        // Lost the race: a releaser already claimed this token and handed a permit to an
        // event nobody will ever poll again. Credit it back.
        self.raw.compensate();
    }
}

/// A held permit. Releases automatically on drop; call [`Permit::forget`] to permanently
/// remove the unit instead (the ticket never returns to the semaphore).
#[must_use = "a Permit releases its unit when dropped; binding it to `_` drops it immediately"]
pub struct Permit<'a> {
    raw: &'a RawSemaphore,
    forgotten: bool,
}

impl<'a> Permit<'a> {
    fn new(raw: &'a RawSemaphore) -> Self {
        Self {
            raw,
            forgotten: false,
        }
    }

    /// Permanently remove this unit instead of releasing it back to the semaphore.
    pub fn forget(mut self) {
        self.forgotten = true;
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.forgotten {
            self.raw.compensate();
        }
    }
}

macro_rules! semaphore_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        pub struct $name {
            raw: RawSemaphore,
        }

        impl $name {
            /// Current available unit count.
            pub fn value(&self) -> usize {
                self.raw.value()
            }

            /// The value this primitive was constructed with.
            pub fn initial_value(&self) -> usize {
                self.raw.initial_value
            }

            /// The configured upper bound, if any.
            pub fn max_value(&self) -> Option<usize> {
                self.raw.max_value
            }

            /// Current parked-waiter count (may include not-yet-reaped cancellations).
            pub fn waiting(&self) -> usize {
                self.raw.waiting()
            }

            /// Take a unit without waiting if one is immediately available.
            pub fn try_acquire(&self) -> Result<Permit<'_>, AcquireError> {
                if self.raw.try_acquire_fast() {
                    Ok(Permit::new(&self.raw))
                } else {
                    Err(AcquireError::WouldBlock)
                }
            }

            /// Block the calling thread for a unit, optionally bounded by `timeout`.
            #[cfg(feature = "std")]
            pub fn blocking_acquire(
                &self,
                timeout: Option<Duration>,
            ) -> Result<Permit<'_>, AcquireError> {
                self.raw.blocking_acquire(timeout)?;
                Ok(Permit::new(&self.raw))
            }

            /// Suspend the calling task for a unit.
            ///
            /// `cancel`, if given, is polled between each wakeup; observing
            /// `is_cancelled() == true` unwinds the wait unless `shield` is set, in which
            /// case cancellation is ignored until this wait resolves on its own.
            pub fn async_acquire<'a>(
                &'a self,
                cancel: Option<&'a dyn CancelSignal>,
                shield: bool,
            ) -> impl Future<Output = Result<Permit<'a>, AcquireError>> + 'a {
                let raw = &self.raw;
                async move {
                    (Acquire {
                        raw,
                        token: None,
                        cancel,
                        shield,
                    })
                    .await?;
                    Ok(Permit::new(raw))
                }
            }

            /// Release `count` units, handing each to the next waiter in FIFO order if one
            /// is parked, else crediting the counter.
            pub fn release(&self, count: usize) -> Result<(), ReleaseError> {
                self.raw.release(count)
            }
        }
    };
}

semaphore_type!(
    /// An unbounded counting semaphore.
    Semaphore
);
semaphore_type!(
    /// A counting semaphore whose value can never exceed `max_value`.
    BoundedSemaphore
);
semaphore_type!(
    /// A semaphore conventionally used with values in `{0, 1}`. Unlike the bounded form,
    /// over-release is not an error -- nothing enforces the cap.
    BinarySemaphore
);
semaphore_type!(
    /// A binary semaphore with a hard cap of 1: releasing while already at 1 raises
    /// [`ReleaseError::Overflow`].
    BoundedBinarySemaphore
);

impl Semaphore {
    /// Construct with `initial_value` units immediately available.
    pub fn new(initial_value: usize) -> Self {
        Self {
            raw: RawSemaphore::new(initial_value, None),
        }
    }
}

impl BoundedSemaphore {
    /// Construct with `initial_value` units available, capped at `max_value`.
    ///
    /// # Panics
    /// Panics if `initial_value > max_value`.
    pub fn new(initial_value: usize, max_value: usize) -> Self {
        Self {
            raw: RawSemaphore::new(initial_value, Some(max_value)),
        }
    }
}

impl BinarySemaphore {
    /// Construct either unlocked (`1`) or locked (`0`).
    pub fn new(initial_value: usize) -> Self {
        Self {
            raw: RawSemaphore::new(initial_value, None),
        }
    }
}

impl BoundedBinarySemaphore {
    /// Construct either unlocked (`1`) or locked (`0`), capped at 1.
    pub fn new(initial_value: usize) -> Self {
        Self {
            raw: RawSemaphore::new(initial_value, Some(1)),
        }
    }
}

/// Deprecated alias for [`BinarySemaphore`], kept for source compatibility with callers
/// migrating off the historical name.
#[deprecated(note = "use BinarySemaphore instead")]
pub struct PLock {
    inner: BinarySemaphore,
}

#[allow(deprecated)]
impl PLock {
    /// Construct, emitting a deprecation diagnostic.
    pub fn new(initial_value: usize) -> Self {
        lignan::warnln!("PLock is deprecated; construct a BinarySemaphore instead");
        Self {
            inner: BinarySemaphore::new(initial_value),
        }
    }
}

#[allow(deprecated)]
impl core::ops::Deref for PLock {
    type Target = BinarySemaphore;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Deprecated alias for [`BoundedBinarySemaphore`], kept for source compatibility with
/// callers migrating off the historical name.
#[deprecated(note = "use BoundedBinarySemaphore instead")]
pub struct BLock {
    inner: BoundedBinarySemaphore,
}

#[allow(deprecated)]
impl BLock {
    /// Construct, emitting a deprecation diagnostic.
    pub fn new(initial_value: usize) -> Self {
        lignan::warnln!("BLock is deprecated; construct a BoundedBinarySemaphore instead");
        Self {
            inner: BoundedBinarySemaphore::new(initial_value),
        }
    }
}

#[allow(deprecated)]
impl core::ops::Deref for BLock {
    type Target = BoundedBinarySemaphore;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fast_path_acquire_and_release() {
        let sem = Semaphore::new(1);
        let permit = sem.try_acquire().unwrap();
        assert_eq!(sem.value(), 0);
        drop(permit);
        assert_eq!(sem.value(), 1);
    }

    #[test]
    fn try_acquire_fails_when_empty() {
        let sem = Semaphore::new(0);
        assert_eq!(sem.try_acquire().unwrap_err(), AcquireError::WouldBlock);
    }

    #[test]
    fn bounded_release_overflow() {
        let sem = BoundedSemaphore::new(1, 1);
        let permit = sem.try_acquire().unwrap();
        permit.forget();
        assert_eq!(sem.release(1), Ok(()));
        assert_eq!(sem.release(1), Err(ReleaseError::Overflow));
        assert_eq!(sem.value(), 1);
    }

    #[test]
    fn forget_permanently_removes_unit() {
        let sem = Semaphore::new(1);
        let permit = sem.try_acquire().unwrap();
        permit.forget();
        assert_eq!(sem.value(), 0);
    }

    #[cfg(feature = "std")]
    #[test]
    fn s1_two_succeed_third_parks_then_releases() {
        use std::sync::Arc;
        use std::thread;

        let sem = Arc::new(Semaphore::new(2));
        let first = sem.try_acquire().unwrap();
        let second = sem.try_acquire().unwrap();
        assert_eq!(sem.value(), 0);

        let waiter_sem = sem.clone();
        let waiter = thread::spawn(move || {
            waiter_sem.blocking_acquire(None).unwrap();
        });

        // Give the waiter a moment to park, then release.
        thread::sleep(Duration::from_millis(20));
        drop(first);
        waiter.join().unwrap();

        // The waiter's own `Permit` was never bound in its closure, so it already dropped
        // (and released its unit back) before `join()` returned. Between that and `second`
        // below, both units handed off end up credited back to `value`.
        drop(second);
        assert_eq!(sem.value(), 2);
        assert_eq!(sem.waiting(), 0);
    }

    #[cfg(feature = "std")]
    #[test]
    fn s6_timeout_then_release_credits_value() {
        let sem = Semaphore::new(0);
        let result = sem.blocking_acquire(Some(Duration::from_millis(10)));
        assert_eq!(result.unwrap_err(), AcquireError::Cancelled);

        sem.release(1).unwrap();
        assert_eq!(sem.value(), 1);
    }

    #[cfg(feature = "std")]
    #[test]
    fn no_barging_while_waiter_parked() {
        use std::sync::Arc;
        use std::thread;

        let sem = Arc::new(Semaphore::new(0));
        let waiter_sem = sem.clone();
        let waiter = thread::spawn(move || waiter_sem.blocking_acquire(None).is_ok());

        thread::sleep(Duration::from_millis(20));
        // A unit shows up; the queued waiter must win it even though nobody else has
        // registered as a waiter on this side.
        sem.release(1).unwrap();
        assert!(waiter.join().unwrap());
        assert_eq!(sem.value(), 0);
    }

    #[test]
    fn binary_semaphore_over_release_is_not_an_error() {
        let sem = BinarySemaphore::new(1);
        // Nothing enforces the conventional {0, 1} range here -- only the bounded form does.
        assert_eq!(sem.release(1), Ok(()));
        assert_eq!(sem.value(), 2);
    }

    #[test]
    fn s2_bounded_binary_release_overflow() {
        let sem = BoundedBinarySemaphore::new(1);
        let permit = sem.try_acquire().unwrap();
        permit.forget();
        assert_eq!(sem.release(1), Ok(()));
        assert_eq!(sem.release(1), Err(ReleaseError::Overflow));
        assert_eq!(sem.value(), 1);
    }

    #[test]
    #[allow(deprecated)]
    fn plock_behaves_as_binary_semaphore() {
        let lock = PLock::new(1);
        let permit = lock.try_acquire().unwrap();
        assert_eq!(lock.value(), 0);
        drop(permit);
        assert_eq!(lock.value(), 1);
    }

    #[test]
    #[allow(deprecated)]
    fn block_behaves_as_bounded_binary_semaphore() {
        let lock = BLock::new(1);
        let permit = lock.try_acquire().unwrap();
        permit.forget();
        assert_eq!(lock.release(1), Ok(()));
        assert_eq!(lock.release(1), Err(ReleaseError::Overflow));
    }
}

#[cfg(all(test, feature = "std"))]
mod quickcheck_test {
    use super::*;
    use quickcheck_macros::quickcheck;

    /// Invariant 1 (value never exceeds what was ever put in) and invariant 3 (no lost
    /// permit) for a single-threaded sequence of `try_acquire`/release-one operations: no
    /// matter the interleaving, once every acquired permit is released the counter is back
    /// to exactly where it started.
    #[quickcheck]
    fn sequential_acquire_release_returns_to_initial_value(initial: u8, ops: Vec<bool>) -> bool {
        let initial = (initial % 8) as usize;
        let sem = Semaphore::new(initial);
        let mut held = Vec::new();

        for acquire in ops {
            if acquire {
                if let Ok(permit) = sem.try_acquire() {
                    held.push(permit);
                }
            } else if let Some(permit) = held.pop() {
                drop(permit);
            }

            if sem.value() > initial {
                return false;
            }
        }

        drop(held);
        sem.value() == initial
    }
}
