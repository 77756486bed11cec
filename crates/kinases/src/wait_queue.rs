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

//! The fair FIFO queue shared by every primitive's slow path.
//!
//! A [`Token`] is a three-state machine (`QUEUED -> CLAIMED` by a releaser,
//! `QUEUED -> CANCELLED` by the waiter) reached through one atomic, mirroring the bit-state
//! CAS loops `sync::semaphore` used for its own request objects. The queue itself holds only
//! `Weak` references; the strong `Arc<Token>` lives on the waiting stack frame or future, so
//! a token that nobody is waiting on anymore simply fails to upgrade the next time a
//! releaser walks past it.

extern crate alloc;

use crate::event::Event;
use crate::identity::Identity;
use crate::spin::mutex::SpinMutex;
use alloc::collections::VecDeque;
use alloc::sync::{Arc, Weak};
use core::sync::atomic::{AtomicU8, Ordering};

const QUEUED: u8 = 0;
const CLAIMED: u8 = 1;
const CANCELLED: u8 = 2;

/// One parked waiter: its wakeup [`Event`], an optional owner identity (locks), a reserved
/// unit count (semaphores, default 1), and the cancellation/claim state machine.
pub struct Token {
    event: Event,
    identity: Option<Identity>,
    count: usize,
    state: AtomicU8,
}

impl Token {
    /// Build a fresh, unclaimed token holding a brand new [`Event`].
    pub fn new(identity: Option<Identity>, count: usize) -> Self {
        Self {
            event: Event::new(),
            identity,
            count,
            state: AtomicU8::new(QUEUED),
        }
    }

    /// The token's wakeup latch.
    pub fn event(&self) -> &Event {
        &self.event
    }

    /// The identity of the waiter this token was enqueued for, if any (Lock/RLock only).
    pub fn identity(&self) -> Option<Identity> {
        self.identity
    }

    /// The number of units this token reserves (Semaphore only; always 1 for Lock/RLock).
    pub fn count(&self) -> usize {
        self.count
    }

    /// Releaser-side: attempt `QUEUED -> CLAIMED`. `true` means this releaser won and must
    /// hand the permit/ownership off by signalling `self.event()`.
    pub fn claim(&self) -> bool {
        self.state
            .compare_exchange(QUEUED, CLAIMED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Waiter-side: attempt `QUEUED -> CANCELLED`. `true` means cancellation won the race
    /// against any concurrent releaser, and no permit was or will be handed off through this
    /// token. `false` means a releaser already claimed it first -- the wake is already (or
    /// about to be) in flight and the caller must honor it instead of propagating
    /// cancellation.
    pub fn cancel(&self) -> bool {
        self.state
            .compare_exchange(QUEUED, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Whether a releaser has already claimed this token.
    pub fn is_claimed(&self) -> bool {
        self.state.load(Ordering::Acquire) == CLAIMED
    }

    /// Whether the waiter has already cancelled this token.
    pub fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::Acquire) == CANCELLED
    }
}

/// Ordered queue of parked tokens, providing fair FIFO handoff with safe removal on
/// cancellation or timeout.
pub struct WaitQueue {
    queue: SpinMutex<VecDeque<Weak<Token>>>,
}

impl WaitQueue {
    /// An empty queue.
    pub const fn new() -> Self {
        Self {
            queue: SpinMutex::new(VecDeque::new()),
        }
    }

    /// Append `token` to the tail. O(1).
    pub fn enqueue(&self, token: &Arc<Token>) {
        self.queue.lock().push_back(Arc::downgrade(token));
    }

    /// Remove and claim the oldest live, unclaimed, uncancelled token, skipping (and
    /// dropping) any dead or cancelled entries found along the way. Amortized O(1).
    pub fn dequeue_claim(&self) -> Option<Arc<Token>> {
        let mut queue = self.queue.lock();
        while let Some(weak) = queue.pop_front() {
            let Some(token) = weak.upgrade() else {
                continue;
            };

            if token.claim() {
                return Some(token);
            }
            // Already cancelled by its waiter: drop and keep scanning.
        }
        None
    }

    /// True iff no live, uncancelled waiter remains at the head of the queue. Purges any
    /// dead/cancelled run it passes over, so repeated calls stay cheap.
    pub fn has_live_waiter(&self) -> bool {
        let mut queue = self.queue.lock();
        while let Some(front) = queue.front() {
            match front.upgrade() {
                Some(token) if !token.is_cancelled() => return true,
                _ => {
                    queue.pop_front();
                }
            }
        }
        false
    }

    /// Current raw token count, including not-yet-reaped cancellations -- matches the
    /// `waiting` introspection contract, which is explicit about not hiding stale entries.
    pub fn waiting(&self) -> usize {
        self.queue.lock().len()
    }
}

impl Default for WaitQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fifo_handoff_order() {
        let queue = WaitQueue::new();
        let a = Arc::new(Token::new(None, 1));
        let b = Arc::new(Token::new(None, 1));
        queue.enqueue(&a);
        queue.enqueue(&b);

        let first = queue.dequeue_claim().unwrap();
        assert!(Arc::ptr_eq(&first, &a));
        let second = queue.dequeue_claim().unwrap();
        assert!(Arc::ptr_eq(&second, &b));
        assert!(queue.dequeue_claim().is_none());
    }

    #[test]
    fn cancelled_head_is_skipped() {
        let queue = WaitQueue::new();
        let a = Arc::new(Token::new(None, 1));
        let b = Arc::new(Token::new(None, 1));
        queue.enqueue(&a);
        queue.enqueue(&b);

        assert!(a.cancel());
        let claimed = queue.dequeue_claim().unwrap();
        assert!(Arc::ptr_eq(&claimed, &b));
    }

    #[test]
    fn claim_and_cancel_are_mutually_exclusive() {
        let token = Arc::new(Token::new(None, 1));
        assert!(token.claim());
        assert!(!token.cancel());
        assert!(token.is_claimed());
        assert!(!token.is_cancelled());
    }

    #[test]
    fn dropped_waiter_is_skipped_without_claim() {
        let queue = WaitQueue::new();
        {
            let transient = Arc::new(Token::new(None, 1));
            queue.enqueue(&transient);
        }
        let b = Arc::new(Token::new(None, 1));
        queue.enqueue(&b);

        let claimed = queue.dequeue_claim().unwrap();
        assert!(Arc::ptr_eq(&claimed, &b));
    }

    #[test]
    fn has_live_waiter_purges_cancelled_prefix() {
        let queue = WaitQueue::new();
        let a = Arc::new(Token::new(None, 1));
        let b = Arc::new(Token::new(None, 1));
        queue.enqueue(&a);
        queue.enqueue(&b);

        assert!(a.cancel());
        assert!(queue.has_live_waiter());
        assert_eq!(queue.waiting(), 1);
    }
}
