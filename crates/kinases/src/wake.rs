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

use core::{
    cell::UnsafeCell,
    mem::MaybeUninit,
    sync::atomic::{AtomicUsize, Ordering},
    task::Waker,
};

/// An atomic-ish optional waker.
///
/// A `WakeCell` can either contain exactly *one* waker, or none at all. All modifications
/// internally are atomic, and could be assumed to hold a `SpinMutex<Option<Waker>>`.
///
/// # Speed
/// `WakeCell` internally uses 'Compare-Exchange' loops and thus in some instances
/// can be undesirable as essentially it's a spinlock. Operations should only block
/// for the duration of one waker write, however, thread scheduling could result in
/// long wait times which eat large amounts of CPU time.
///
/// # Safety
/// This `waker` must remain valid for the duration it is used within this wake cell,
/// and must point to `'static` lifetime memory. Usual `Waker` safety applies.
pub struct WakeCell {
    lock: AtomicUsize,
    waker: UnsafeCell<MaybeUninit<Waker>>,
}

unsafe impl Send for WakeCell {}
unsafe impl Sync for WakeCell {}

impl WakeCell {
    const NONE: usize = 0;
    const SOME: usize = 1 << 0;
    const LOCKING: usize = 1 << 1;

    /// Create a new empty `WakeCell` that internally contains `None` for its waker.
    pub const fn new() -> Self {
        Self {
            lock: AtomicUsize::new(Self::NONE),
            waker: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    /// Write this `waker` to the cell returning the previous waker if one exists.
    pub fn attach(&self, waker: Waker) -> Option<Waker> {
        let mut current = self.lock.load(Ordering::Relaxed);

        // Aquire the `Some` lock
        while let Err(failed) = self.lock.compare_exchange_weak(
            current & !Self::LOCKING,
            Self::SOME | Self::LOCKING,
            Ordering::Acquire,
            Ordering::Relaxed,
        ) {
            current = failed;
        }

        // If `Some(...)` is contained previously
        let old_waker = if current & Self::SOME != 0 {
            Some(unsafe { (*self.waker.get()).assume_init_read() })
        } else {
            None
        };

        // Write our value into our storage
        unsafe { (*self.waker.get()).write(waker) };

        // Unlock
        self.lock.store(Self::SOME, Ordering::SeqCst);

        old_waker
    }

    /// Takes the waker from the `WakeCell` and returns it if one exists, putting `None` in its place.
    pub fn take_waker(&self) -> Option<Waker> {
        let mut current = self.lock.load(Ordering::Relaxed);

        // Optimization: if no waker exists, we don't need to contend for the lock.
        if current & Self::SOME == 0 {
            return None;
        }

        // Aquire the `None` lock
        while let Err(failed) = self.lock.compare_exchange_weak(
            (current & !Self::LOCKING) | Self::SOME,
            Self::NONE | Self::LOCKING,
            Ordering::Acquire,
            Ordering::Relaxed,
        ) {
            // We need to check it here too so this never hangs once it goes None.
            if failed & Self::SOME == 0 {
                return None;
            }

            current = failed;
        }

        let old_waker = Some(unsafe { (*self.waker.get()).assume_init_read() });

        // Unlock
        self.lock.store(Self::NONE, Ordering::SeqCst);

        old_waker
    }

    /// Directly call the contained waker (if one exists), replacing it with `None`.
    pub fn wake(&self) {
        if let Some(waker) = self.take_waker() {
            waker.wake();
        }
    }

    /// Drop the contained waker (if one exists), replacing it with `None`.
    pub fn empty(&self) {
        _ = self.take_waker();
    }

    /// True if a waker is currently attached.
    pub fn is_attached(&self) -> bool {
        self.lock.load(Ordering::Relaxed) & Self::SOME != 0
    }
}

impl Default for WakeCell {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for WakeCell {
    fn drop(&mut self) {
        self.empty();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use core::sync::atomic::AtomicBool;
    use core::task::{RawWaker, RawWakerVTable, Waker};

    extern crate alloc;
    use alloc::sync::Arc;

    fn noop_waker(flag: Arc<AtomicBool>) -> Waker {
        fn clone(ptr: *const ()) -> RawWaker {
            unsafe { Arc::increment_strong_count(ptr as *const AtomicBool) };
            RawWaker::new(ptr, &VTABLE)
        }
        fn wake(ptr: *const ()) {
            let arc = unsafe { Arc::from_raw(ptr as *const AtomicBool) };
            arc.store(true, Ordering::SeqCst);
        }
        fn wake_by_ref(ptr: *const ()) {
            unsafe { &*(ptr as *const AtomicBool) }.store(true, Ordering::SeqCst);
        }
        fn drop_fn(ptr: *const ()) {
            unsafe { drop(Arc::from_raw(ptr as *const AtomicBool)) };
        }

        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, wake, wake_by_ref, drop_fn);

        let ptr = Arc::into_raw(flag) as *const ();
        unsafe { Waker::from_raw(RawWaker::new(ptr, &VTABLE)) }
    }

    #[test]
    fn attach_then_wake_fires_once() {
        let cell = WakeCell::new();
        assert!(!cell.is_attached());

        let flag = Arc::new(AtomicBool::new(false));
        cell.attach(noop_waker(flag.clone()));
        assert!(cell.is_attached());

        cell.wake();
        assert!(flag.load(Ordering::SeqCst));
        assert!(!cell.is_attached());

        // Waking with nothing attached is a silent no-op.
        cell.wake();
    }

    #[test]
    fn reattaching_drops_previous_waker() {
        let cell = WakeCell::new();
        let first = Arc::new(AtomicBool::new(false));
        let second = Arc::new(AtomicBool::new(false));

        cell.attach(noop_waker(first.clone()));
        cell.attach(noop_waker(second.clone()));

        cell.wake();
        assert!(!first.load(Ordering::SeqCst));
        assert!(second.load(Ordering::SeqCst));
    }
}
