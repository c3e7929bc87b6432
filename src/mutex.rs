use core::{
    cell::{Cell, UnsafeCell},
    marker::PhantomData,
    ops::{Deref, DerefMut},
    };
use critical_section::RestoreState;


/**
    scoped critical section

    interrupts are disabled while the guard lives, the interrupt state saved at creation is restored when it drops, whatever the exit path.
    Guards nest: an inner guard restores "disabled" so the outer one keeps the section closed.
*/
pub struct CriticalGuard {
    state: RestoreState,
    // restoring must happen on the context that disabled interrupts
    _local: PhantomData<*mut ()>,
}
impl CriticalGuard {
    pub fn enter() -> Self {
        Self {
            state: unsafe { critical_section::acquire() },
            _local: PhantomData,
        }
    }
}
impl Drop for CriticalGuard {
    fn drop(&mut self) {
        unsafe { critical_section::release(self.state) }
    }
}


/**
    data shared between interrupt handlers and the foreground program

    every access goes through a [CriticalGuard], so an interrupt can never observe or produce a torn value.
    Locking the same mutex twice from nested code is refused rather than aliased.
*/
pub struct IrqMutex<T> {
    value: UnsafeCell<T>,
    locked: Cell<bool>,
}
// all accesses to the cells are serialized by the critical section
unsafe impl<T: Send> Sync for IrqMutex<T> {}

impl<T> IrqMutex<T> {
    pub const fn new(value: T) -> Self {
        Self {
            value: UnsafeCell::new(value),
            locked: Cell::new(false),
        }
    }
    /// lock unless this mutex is already locked by an enclosing scope
    pub fn try_lock(&self) -> Option<IrqMutexGuard<'_, T>> {
        IrqMutexGuard::try_new(self)
    }
    /**
        lock for the lifetime of the returned guard

        panics when called while the same mutex is already locked, which can only be a reentrancy bug in this crate
    */
    pub fn lock(&self) -> IrqMutexGuard<'_, T> {
        self.try_lock().expect("interrupt mutex locked twice")
    }
    /// exclusive access without critical section, statically proven by `&mut self`
    pub fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }
}

pub struct IrqMutexGuard<'m, T> {
    mutex: &'m IrqMutex<T>,
    // dropped after the flag is cleared in `drop`
    _critical: CriticalGuard,
}
impl<'m, T> IrqMutexGuard<'m, T> {
    fn try_new(mutex: &'m IrqMutex<T>) -> Option<Self> {
        let critical = CriticalGuard::enter();
        if mutex.locked.replace(true)
            {return None}
        Some(Self {mutex, _critical: critical})
    }
}
impl<T> Deref for IrqMutexGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe {& *self.mutex.value.get()}
    }
}
impl<T> DerefMut for IrqMutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe {&mut *self.mutex.value.get()}
    }
}
impl<T> Drop for IrqMutexGuard<'_, T> {
    fn drop(&mut self) {
        self.mutex.locked.set(false);
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_gives_exclusive_access() {
        let mutex = IrqMutex::new(3u8);
        {
            let mut value = mutex.lock();
            *value += 1;
            assert!(mutex.try_lock().is_none());
        }
        assert_eq!(*mutex.lock(), 4);
    }

    #[test]
    fn critical_sections_nest() {
        let outer = CriticalGuard::enter();
        {
            let _inner = CriticalGuard::enter();
        }
        let mutex = IrqMutex::new(());
        assert!(mutex.try_lock().is_some());
        drop(outer);
    }
}
