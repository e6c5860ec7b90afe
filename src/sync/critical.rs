use core::marker::PhantomData;

use super::{InterruptMask, SystemInterrupts};

/// RAII critical section locker
///
/// Interrupts stay masked until the locker is dropped, at which point the status
/// captured on construction is restored. Code inside must be short and must not
/// block.
///
/// Nested lockers must be dropped in reverse order of creation, which scoping
/// does automatically. Dropping an outer locker first restores its status while
/// the inner one is alive, and the inner one then restores the masked status,
/// leaving interrupts masked. Prefer [`critical`] where possible.
#[must_use = "interrupts are restored as soon as the locker is dropped"]
pub struct CriticalSectionLocker<I: InterruptMask = SystemInterrupts> {
    status: I::Status,
    // Status must be restored on the core that captured it
    _marker: PhantomData<(I, *const ())>,
}

impl<I: InterruptMask> CriticalSectionLocker<I> {
    /// Enter critical section using a specific interrupt mask implementation
    #[inline]
    pub fn with_mask() -> Self {
        // NOTE(safety): restored in Drop on the same core; nesting order is up to the caller
        let status = unsafe { I::status_and_lock() };
        Self { status, _marker: PhantomData }
    }
}

impl CriticalSectionLocker {
    /// Enter system critical section
    #[inline]
    pub fn new() -> Self {
        Self::with_mask()
    }
}

impl Default for CriticalSectionLocker {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<I: InterruptMask> Drop for CriticalSectionLocker<I> {
    #[inline]
    fn drop(&mut self) {
        unsafe { I::restore_status(self.status) }
    }
}

/// Execute a closure within a system critical section
#[inline]
pub fn critical<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    let _locker = CriticalSectionLocker::new();
    f()
}
