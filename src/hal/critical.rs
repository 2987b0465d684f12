//! Interrupt masking for cross-priority state access.

use core::cell::RefCell;

/// Raw interrupt enable/disable primitive.
pub trait InterruptControl {
    /// Mask interrupts. Returns the state to restore.
    fn critical_enter(&self) -> u32;

    /// Restore the state returned by the matching [`critical_enter`](Self::critical_enter).
    fn critical_exit(&self, state: u32);
}

/// RAII guard for critical sections.
///
/// Interrupts stay masked until the guard is dropped, which happens on every
/// exit path including `?` returns.
pub struct CriticalSection<'a, I: InterruptControl + ?Sized> {
    irq: &'a I,
    state: u32,
}

impl<'a, I: InterruptControl + ?Sized> CriticalSection<'a, I> {
    /// Enter critical section
    pub fn new(irq: &'a I) -> Self {
        let state = irq.critical_enter();
        Self { irq, state }
    }
}

impl<'a, I: InterruptControl + ?Sized> Drop for CriticalSection<'a, I> {
    fn drop(&mut self) {
        self.irq.critical_exit(self.state);
    }
}

/// State shared between interrupt priorities.
///
/// The value is only reachable inside a [`CriticalSection`], so a handler
/// that preempts the owner of a lock can never observe a half-written value.
#[derive(Debug, Default)]
pub struct IrqCell<T> {
    value: RefCell<T>,
}

impl<T> IrqCell<T> {
    /// Wrap a value.
    pub const fn new(value: T) -> Self {
        Self {
            value: RefCell::new(value),
        }
    }

    /// Run `f` on the value with interrupts masked.
    ///
    /// `f` must not call back into `lock` on the same cell.
    pub fn lock<I, R>(&self, irq: &I, f: impl FnOnce(&mut T) -> R) -> R
    where
        I: InterruptControl + ?Sized,
    {
        let _cs = CriticalSection::new(irq);
        let mut value = self.value.borrow_mut();
        f(&mut value)
    }
}
