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

//! The single-shot wakeup latch bridging a blocking thread and a cooperative task.
//!
//! A [`CancelSignal`] is distinct: it's a caller-supplied, externally-polled flag used to
//! model cooperative cancellation (see [`crate::semaphore`]'s `shield` handling), not a
//! wakeup mechanism itself.

use crate::wake::WakeCell;
use core::sync::atomic::{AtomicBool, Ordering};
use core::task::{Context, Poll};

#[cfg(feature = "std")]
use std::{
    sync::Mutex as StdMutex,
    thread::Thread,
    time::{Duration, Instant},
};

/// A one-shot latch: exactly one party calls [`Event::set`], and exactly one party waits,
/// either by blocking the current thread (`wait_blocking`, `std` feature only) or by
/// registering a [`core::task::Waker`] through [`Event::poll_wait`].
///
/// Reuse after `set()` is undefined -- construct a fresh `Event` per wait, exactly as each
/// [`crate::wait_queue::Token`] does.
pub struct Event {
    is_set: AtomicBool,
    waker: WakeCell,
    #[cfg(feature = "std")]
    parked: StdMutex<Option<Thread>>,
}

impl Event {
    /// A fresh, unset event.
    pub fn new() -> Self {
        Self {
            is_set: AtomicBool::new(false),
            waker: WakeCell::new(),
            #[cfg(feature = "std")]
            parked: StdMutex::new(None),
        }
    }

    /// Idempotently mark this event set and wake whichever party is waiting, if any.
    pub fn set(&self) {
        if self.is_set.swap(true, Ordering::AcqRel) {
            return;
        }

        self.waker.wake();

        #[cfg(feature = "std")]
        {
            if let Some(thread) = self.parked.lock().unwrap().take() {
                thread.unpark();
            }
        }
    }

    /// Whether [`Event::set`] has already been called.
    pub fn is_set(&self) -> bool {
        self.is_set.load(Ordering::Acquire)
    }

    /// Block the calling thread until set, or until `timeout` elapses. Returns whether the
    /// event was observed set.
    #[cfg(feature = "std")]
    pub fn wait_blocking(&self, timeout: Option<Duration>) -> bool {
        *self.parked.lock().unwrap() = Some(std::thread::current());

        // Close the missed-wakeup race: `set()` may have run between registering interest
        // above and this check.
        if self.is_set() {
            return true;
        }

        match timeout {
            None => loop {
                std::thread::park();
                if self.is_set() {
                    return true;
                }
            },
            Some(duration) => {
                let deadline = Instant::now() + duration;
                loop {
                    if self.is_set() {
                        return true;
                    }

                    let now = Instant::now();
                    if now >= deadline {
                        return self.is_set();
                    }

                    std::thread::park_timeout(deadline - now);
                }
            }
        }
    }

    /// Cooperative half of the wait: attach `cx`'s waker and report whether the event is
    /// already set. Callers poll this from their own `Future::poll` implementation.
    pub fn poll_wait(&self, cx: &mut Context<'_>) -> Poll<()> {
        if self.is_set() {
            return Poll::Ready(());
        }

        self.waker.attach(cx.waker().clone());

        // Re-check after attaching to close the same missed-wakeup race as the blocking path.
        if self.is_set() {
            return Poll::Ready(());
        }

        Poll::Pending
    }
}

impl Default for Event {
    fn default() -> Self {
        Self::new()
    }
}

/// A caller-supplied cancellation flag, checked only between polls of an `async_acquire`
/// future.
///
/// Rust futures are cancelled by being dropped, not by a runtime flipping a flag the
/// primitive can observe mid-wait, so this is the cooperative analogue of the "runtime
/// governs cancellation" contract: the runtime integration owns an implementor and decides
/// when `is_cancelled` flips.
pub trait CancelSignal {
    /// Whether the current wait should be abandoned at the next poll.
    fn is_cancelled(&self) -> bool;
}

/// A [`CancelSignal`] that never cancels -- the default when a caller passes none.
pub struct NeverCancel;

impl CancelSignal for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn set_before_poll_resolves_immediately() {
        let event = Event::new();
        event.set();
        assert!(event.is_set());
    }

    #[test]
    fn set_is_idempotent() {
        let event = Event::new();
        event.set();
        event.set();
        assert!(event.is_set());
    }

    #[cfg(feature = "std")]
    #[test]
    fn wait_blocking_times_out_without_set() {
        let event = Event::new();
        let woke = event.wait_blocking(Some(Duration::from_millis(10)));
        assert!(!woke);
    }

    #[cfg(feature = "std")]
    #[test]
    fn wait_blocking_observes_a_racing_set() {
        use std::sync::Arc;
        use std::thread;

        let event = Arc::new(Event::new());
        let setter = {
            let event = event.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(5));
                event.set();
            })
        };

        assert!(event.wait_blocking(None));
        setter.join().unwrap();
    }
}
