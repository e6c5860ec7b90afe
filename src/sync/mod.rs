//! Scoped lock guards
//!
//! Both guards acquire their resource when constructed and release it when
//! dropped, including during unwinding or an early return. There is no explicit
//! unlock method: the only way to release is to leave the scope.
//!
//! - [`MutexLocker`]: blocks until a kernel mutex is locked
//! - [`CriticalSectionLocker`]: masks interrupts and restores the *previous* mask
//!   state on drop, so nested critical sections do not re-enable interrupts early
//!
//! The guards only consume two services from the kernel: a blocking mutex
//! ([`lock_api::RawMutex`]) and a way to read-and-lock / restore the interrupt
//! state ([`InterruptMask`]).
//!
//! # Usage
//! ```ignore
//! static MUTEX: KernelMutex = KernelMutex::INIT;
//!
//! fn update() {
//!     let _lock = MutexLocker::new(&MUTEX);
//!     // ... access the protected data
//! }
//!
//! fn poke_register() {
//!     let _cs = CriticalSectionLocker::new();
//!     // ... keep it short, never block here
//! }
//! ```

mod critical;
mod mutex;

pub use critical::{critical, CriticalSectionLocker};
pub use mutex::{locked, MutexLocker};
pub use lock_api::RawMutex;

/// Global interrupt mask control provided by the kernel
///
/// # Safety
///
/// Implementations must mask interrupts (or raise the system to a critical
/// section level) in [`Self::status_and_lock`] and return a status that, when
/// passed to [`Self::restore_status`], brings back exactly the state from before
/// the call.
pub unsafe trait InterruptMask {
    /// State saved when entering critical section
    type Status: Copy;

    /// Lock and return the status from before locking
    ///
    /// # Safety
    ///
    /// Must be paired with [`Self::restore_status`] in LIFO order.
    unsafe fn status_and_lock() -> Self::Status;

    /// Restore status returned from [`Self::status_and_lock`]
    ///
    /// # Safety
    ///
    /// `status` must come from the most recent unmatched call to
    /// [`Self::status_and_lock`] on this core.
    unsafe fn restore_status(status: Self::Status);
}

/// System-wide critical section provided by the `critical-section` implementation
///
/// On Cortex-M single-core this is the PRIMASK based implementation from `cortex-m`,
/// which only re-enables interrupts on release if they were enabled on acquire.
pub struct SystemInterrupts;

unsafe impl InterruptMask for SystemInterrupts {
    type Status = critical_section::RestoreState;

    #[inline]
    unsafe fn status_and_lock() -> Self::Status {
        critical_section::acquire()
    }

    #[inline]
    unsafe fn restore_status(status: Self::Status) {
        critical_section::release(status)
    }
}
