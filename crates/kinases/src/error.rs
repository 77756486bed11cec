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

//! Error enums shared across the crate's primitives.
//!
//! These are plain value enums, not `std::error::Error` implementors -- this corner of the
//! workspace never reaches for `thiserror`/`anyhow` inside a `no_std` leaf crate, so neither
//! do we.

/// Why an acquire attempt (`try_acquire`, `blocking_acquire`, `async_acquire`) failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireError {
    /// `try_acquire` found no tickets available and no waiting is permitted.
    WouldBlock,
    /// The wait was abandoned: the deadline passed, or the caller's `CancelSignal`
    /// observed a cancellation before a ticket was handed off.
    Cancelled,
}

/// Why a release attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseError {
    /// Releasing this many tickets would push the counter above the semaphore's
    /// configured maximum (bounded semaphores only).
    Overflow,
}

/// Why a `Lock` operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockError {
    /// The wait was abandoned (deadline passed, or cancellation observed).
    Cancelled,
    /// `try_lock` found the lock already held by a different owner.
    WouldBlock,
    /// `release` was called by an [`Identity`](crate::identity::Identity) that is not the
    /// current owner.
    NotOwner,
    /// The current owner called `acquire` again. `Lock` is non-reentrant; re-acquiring from
    /// the same executor is a programming bug, not something to block on.
    Recursion,
}

impl From<AcquireError> for LockError {
    fn from(value: AcquireError) -> Self {
        match value {
            AcquireError::WouldBlock => LockError::WouldBlock,
            AcquireError::Cancelled => LockError::Cancelled,
        }
    }
}

/// Why an `RLock` operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RLockError {
    /// The wait was abandoned (deadline passed, or cancellation observed).
    Cancelled,
    /// `try_acquire` found the lock already held by a different owner.
    WouldBlock,
    /// A release was attempted by an identity that does not hold the lock.
    NotOwner,
    /// A release's `count` exceeded the identity's outstanding recursion count.
    Underflow,
}

impl From<LockError> for RLockError {
    /// Only reachable from a `Lock` acquired through `RLock`'s delegation path, which never
    /// calls `acquire` while already the owner -- `LockError::Recursion` can't surface here.
    fn from(value: LockError) -> Self {
        match value {
            LockError::Cancelled => RLockError::Cancelled,
            LockError::WouldBlock => RLockError::WouldBlock,
            LockError::NotOwner => RLockError::NotOwner,
            LockError::Recursion => unreachable!(
                "RLock only calls Lock::acquire when it is not already the owner"
            ),
        }
    }
}
