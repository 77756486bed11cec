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

//! Caller identity for ownership-tracking primitives (`Lock`/`RLock`).
//!
//! `kinases` does not integrate with any particular cooperative runtime, so it cannot mint
//! ids for green threads or tasks on its own. [`Identity`] is therefore a plain value the
//! runtime integration constructs, with only the native-OS-thread case built in here.

/// What kind of caller an [`Identity`] names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdentityKind {
    /// A native OS thread, identified via [`Identity::current_thread`].
    Thread,
    /// A cooperatively-scheduled green thread, minted by the runtime integration.
    Green,
    /// An async task, minted by the runtime integration (typically the executor's task id).
    Task,
}

/// A stable `(kind, id)` pair naming whoever is acquiring or releasing a primitive.
///
/// Two identities are equal only if both their kind and id match. The `id` is only
/// guaranteed unique within its `kind` -- a `Task` id and a `Thread` id may collide
/// numerically without naming the same caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Identity {
    kind: IdentityKind,
    id: u64,
}

impl Identity {
    /// Build an identity for a green thread. The caller's runtime integration is
    /// responsible for keeping `id` stable for the lifetime of that green thread and
    /// distinct from every other concurrently-live green thread.
    pub const fn green(id: u64) -> Self {
        Self {
            kind: IdentityKind::Green,
            id,
        }
    }

    /// Build an identity for an async task. The caller's runtime integration is
    /// responsible for keeping `id` stable for the lifetime of that task and distinct
    /// from every other concurrently-live task.
    pub const fn task(id: u64) -> Self {
        Self {
            kind: IdentityKind::Task,
            id,
        }
    }

    /// The kind of caller this identity names.
    pub const fn kind(&self) -> IdentityKind {
        self.kind
    }

    /// The raw id, unique only within `self.kind()`.
    pub const fn id(&self) -> u64 {
        self.id
    }
}

#[cfg(feature = "std")]
mod thread_identity {
    use super::{Identity, IdentityKind};
    use std::cell::Cell;
    use std::sync::atomic::{AtomicU64, Ordering};

    static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

    std::thread_local! {
        static THIS_THREAD_ID: Cell<u64> = const { Cell::new(0) };
    }

    impl Identity {
        /// The identity of the calling OS thread.
        ///
        /// The id is minted once per thread on first use and cached in a `thread_local`,
        /// so repeated calls on the same thread always return the same [`Identity`] and
        /// calls from different threads never collide.
        pub fn current_thread() -> Self {
            let id = THIS_THREAD_ID.with(|cell| {
                let current = cell.get();
                if current != 0 {
                    return current;
                }

                let fresh = NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed);
                cell.set(fresh);
                fresh
            });

            Self {
                kind: IdentityKind::Thread,
                id,
            }
        }
    }
}

#[cfg(all(test, feature = "std"))]
mod test {
    use super::*;

    #[test]
    fn current_thread_is_stable_within_a_thread() {
        let a = Identity::current_thread();
        let b = Identity::current_thread();
        assert_eq!(a, b);
        assert_eq!(a.kind(), IdentityKind::Thread);
    }

    #[test]
    fn different_threads_get_different_identities() {
        let here = Identity::current_thread();
        let there = std::thread::spawn(Identity::current_thread)
            .join()
            .unwrap();
        assert_ne!(here, there);
    }

    #[test]
    fn green_and_task_constructors_are_distinguishable() {
        let g = Identity::green(5);
        let t = Identity::task(5);
        assert_ne!(g, t);
        assert_eq!(g.id(), t.id());
    }
}
