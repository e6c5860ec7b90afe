use core::marker::PhantomData;

use lock_api::RawMutex;

/// RAII mutex locker
///
/// Blocks until `mutex` is locked and unlocks it when dropped. No timeout and no
/// reentrancy beyond what the kernel mutex itself provides.
#[must_use = "the mutex is unlocked as soon as the locker is dropped"]
pub struct MutexLocker<'a, M: RawMutex> {
    mutex: &'a M,
    // Kernel mutexes must be unlocked by the owning thread
    _not_send: PhantomData<*const ()>,
}

impl<'a, M: RawMutex> MutexLocker<'a, M> {
    #[inline]
    pub fn new(mutex: &'a M) -> Self {
        mutex.lock();
        Self { mutex, _not_send: PhantomData }
    }
}

impl<'a, M: RawMutex> Drop for MutexLocker<'a, M> {
    #[inline]
    fn drop(&mut self) {
        // NOTE(safety): locked in `new` by this thread and not unlocked since
        unsafe { self.mutex.unlock() }
    }
}

/// Execute a closure with `mutex` locked
#[inline]
pub fn locked<M, F, R>(mutex: &M, f: F) -> R
where
    M: RawMutex,
    F: FnOnce() -> R,
{
    let _locker = MutexLocker::new(mutex);
    f()
}
