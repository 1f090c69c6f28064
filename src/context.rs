use std::{
    mem::take,
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
};

/// A cloneable cancellation/notification slot shared between the recipe-loop thread and the
/// worker's control surface: one side parks in [`Self::wait_condvar`], the other wakes it
/// with a value via [`Self::cancel_all`]. Used for both the Child Executor's kill signal and
/// the inter-cycle delay's wake signal (spec §5), each its own independent `Context<bool>`.
#[derive(Debug, Clone, Default)]
pub struct Context<T>(Arc<(Mutex<T>, Condvar)>);

impl<T> Context<T>
where
    T: Default,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `val` and wakes every thread parked in [`Self::wait_condvar`].
    pub fn cancel_all(&self, val: T) -> Result<(), PoisonError<MutexGuard<'_, T>>> {
        let (lck, cvar) = &*self.0;
        let mut lck = lck.lock()?;
        *lck = val;
        cvar.notify_all();
        Ok(())
    }

    /// Blocks until [`Self::cancel_all`] is called, returning the value it was given and
    /// resetting the slot to its default.
    pub fn wait_condvar(&self) -> Result<T, PoisonError<MutexGuard<'_, T>>> {
        let (lck, cvar) = &*self.0;
        let mut lck = lck.lock()?;
        lck = cvar.wait(lck)?;
        let current = take(&mut *lck);
        Ok(current)
    }
}
