// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! A minimal busy-wait lock for critical sections of a handful of instructions
//! (a queue push, a counter bump).
//!
//! Two layers are provided:
//! - [`RawSpinlock`]: the bare `lock` / `try_lock` / `unlock` primitive.
//! - [`Spinlock<T>`]: a data-owning lock whose [`SpinlockGuard`] releases the
//!   lock on every exit path, including early returns, `?` propagation and
//!   unwinding.
//!
//! Neither layer is re-entrant: locking twice from the same thread deadlocks.

use std::cell::UnsafeCell;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};

/// Number of relaxed spins before the waiting thread yields to the OS scheduler.
const SPINS_BEFORE_YIELD: u32 = 64;

/// The bare spinlock primitive.
///
/// `lock` and `unlock` must be paired by the caller. Prefer [`Spinlock<T>`],
/// which pairs them automatically.
#[derive(Debug, Default)]
pub struct RawSpinlock {
    locked: AtomicBool,
}

impl RawSpinlock {
    /// Creates a new, unlocked spinlock.
    pub const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }

    /// Acquires the lock, busy-waiting until it becomes available.
    ///
    /// Between attempts the thread issues a processor spin hint, and after
    /// [`SPINS_BEFORE_YIELD`] failed spins it yields its time slice.
    pub fn lock(&self) {
        let mut spins = 0u32;
        loop {
            if self.try_lock() {
                return;
            }
            // Test-and-test-and-set: wait on a plain load to keep the cache line shared.
            while self.locked.load(Ordering::Relaxed) {
                if spins < SPINS_BEFORE_YIELD {
                    spins += 1;
                    std::hint::spin_loop();
                } else {
                    std::thread::yield_now();
                }
            }
        }
    }

    /// Attempts to acquire the lock with a single compare-and-set.
    ///
    /// Returns `true` if the lock was acquired. Never blocks.
    pub fn try_lock(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Releases the lock with a release store.
    ///
    /// Must only be called by the holder of the lock.
    pub fn unlock(&self) {
        debug_assert!(
            self.locked.load(Ordering::Relaxed),
            "RawSpinlock::unlock called on a lock that is not held"
        );
        self.locked.store(false, Ordering::Release);
    }

    /// Returns `true` if the lock is currently held by some thread.
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}

/// A spinlock protecting a value of type `T`.
///
/// Access to the value is only possible through a [`SpinlockGuard`], so the
/// lock is always released when the guard goes out of scope.
pub struct Spinlock<T: ?Sized> {
    raw: RawSpinlock,
    value: UnsafeCell<T>,
}

// SAFETY: access to `value` is serialized by `raw`; the guard hands out a
// unique reference only while the lock is held.
unsafe impl<T: ?Sized + Send> Send for Spinlock<T> {}
unsafe impl<T: ?Sized + Send> Sync for Spinlock<T> {}

impl<T> Spinlock<T> {
    /// Creates a new, unlocked spinlock holding `value`.
    pub const fn new(value: T) -> Self {
        Self {
            raw: RawSpinlock::new(),
            value: UnsafeCell::new(value),
        }
    }

    /// Consumes the lock and returns the protected value.
    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

impl<T: ?Sized> Spinlock<T> {
    /// Acquires the lock, busy-waiting until it becomes available.
    pub fn lock(&self) -> SpinlockGuard<'_, T> {
        self.raw.lock();
        SpinlockGuard { lock: self }
    }

    /// Attempts to acquire the lock without blocking.
    pub fn try_lock(&self) -> Option<SpinlockGuard<'_, T>> {
        if self.raw.try_lock() {
            Some(SpinlockGuard { lock: self })
        } else {
            None
        }
    }

    /// Returns `true` if the lock is currently held.
    pub fn is_locked(&self) -> bool {
        self.raw.is_locked()
    }

    /// Returns a mutable reference to the value. No locking is needed since
    /// the exclusive borrow statically guarantees no other access.
    pub fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }
}

impl<T: Default> Default for Spinlock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Spinlock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.try_lock() {
            Some(guard) => f
                .debug_struct("Spinlock")
                .field("value", &&*guard)
                .finish(),
            None => f
                .debug_struct("Spinlock")
                .field("value", &format_args!("<locked>"))
                .finish(),
        }
    }
}

/// Scoped acquisition of a [`Spinlock`]. The lock is released on drop.
#[must_use = "if unused the Spinlock will immediately unlock"]
pub struct SpinlockGuard<'a, T: ?Sized> {
    lock: &'a Spinlock<T>,
}

impl<T: ?Sized> SpinlockGuard<'_, T> {
    /// Releases the lock explicitly. Equivalent to dropping the guard.
    pub fn unlock(guard: Self) {
        drop(guard);
    }
}

impl<T: ?Sized> Deref for SpinlockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the guard exists only while the lock is held.
        unsafe { &*self.lock.value.get() }
    }
}

impl<T: ?Sized> DerefMut for SpinlockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the guard exists only while the lock is held.
        unsafe { &mut *self.lock.value.get() }
    }
}

impl<T: ?Sized> Drop for SpinlockGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.raw.unlock();
    }
}
