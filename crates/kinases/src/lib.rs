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

//! Synchronization primitives shared across blocking OS threads and cooperative tasks.
//!
//! Every primitive in this crate is parameterized over [`identity::Identity`] rather than
//! assuming a particular runtime: a caller identifies itself once (as a thread, a green
//! thread, or a task) and the primitive's fast path, wait queue, and wakeup mechanism all
//! work the same regardless of which world that identity lives in. [`event::Event`] is the
//! piece that actually bridges the two worlds -- it can be woken by `Thread::unpark` and
//! polled through a [`core::task::Waker`] at the same time, whichever the waiter used to
//! register.
//!
//! - [`Semaphore`], [`BoundedSemaphore`], [`BinarySemaphore`], [`BoundedBinarySemaphore`] --
//!   counting and binary semaphores, fair FIFO handoff, no barging while a waiter is parked.
//! - [`Lock`] -- a non-reentrant, owner-tracked binary lock.
//! - [`RLock`] -- the reentrant form of [`Lock`].
//!
//! Without the `std` feature (on by default) the blocking half of every acquire is
//! unavailable; the async half works unconditionally since it only needs `alloc`.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod error;
pub mod event;
pub mod identity;
pub mod spin;
pub mod wait_queue;

mod lock;
mod rlock;
mod semaphore;
mod wake;

pub use error::{AcquireError, LockError, RLockError, ReleaseError};
pub use event::{CancelSignal, Event, NeverCancel};
pub use identity::{Identity, IdentityKind};
pub use lock::{Lock, LockGuard};
pub use rlock::{RLock, RLockGuard};
#[allow(deprecated)]
pub use semaphore::{BLock, PLock};
pub use semaphore::{BinarySemaphore, BoundedBinarySemaphore, BoundedSemaphore, Permit, Semaphore};
