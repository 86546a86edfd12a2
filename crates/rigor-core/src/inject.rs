//! Scoped injection of test values.
//!
//! A [`Slot`] is a shared, named cell that production code reads through a
//! handle instead of a global. Tests inject a replacement value and get back
//! an [`InjectionGuard`]; when the guard is dropped (or [`InjectionGuard::restore`]
//! is called) the slot is put back according to its [`RestoreMode`].

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// What a slot holds once an injection is undone.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RestoreMode<T> {
    /// The value the slot held before the injection.
    #[default]
    OldValue,
    /// Leave the injected value in place.
    Nothing,
    /// The type's default (the "null" of the slot).
    Default,
    /// An explicit value.
    Value(T),
}

/// A named, shared value that tests can replace for the duration of a scope.
pub struct Slot<T> {
    name: Rc<str>,
    value: Rc<RefCell<T>>,
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Self {
            name: Rc::clone(&self.name),
            value: Rc::clone(&self.value),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("name", &self.name)
            .field("value", &self.value.borrow())
            .finish()
    }
}

impl<T> Slot<T> {
    /// Creates a slot holding `value`.
    pub fn new(name: impl Into<String>, value: T) -> Self {
        let name: String = name.into();
        Self {
            name: Rc::from(name),
            value: Rc::new(RefCell::new(value)),
        }
    }

    /// Returns the slot name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replaces the current value, returning the previous one.
    pub fn replace(&self, value: T) -> T {
        self.value.replace(value)
    }

    /// Runs `f` against the current value.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.value.borrow())
    }
}

impl<T: Clone> Slot<T> {
    /// Returns a copy of the current value.
    pub fn get(&self) -> T {
        self.value.borrow().clone()
    }
}

impl<T: Default> Slot<T> {
    /// Injects `value`, remembering the current one for the returned guard.
    pub fn inject(&self, value: T, mode: RestoreMode<T>) -> InjectionGuard<T> {
        debug!(slot = %self.name, "Injecting test value");
        let previous = self.replace(value);
        InjectionGuard {
            slot: self.clone(),
            previous: Some(previous),
            mode: Some(mode),
        }
    }
}

/// Undoes one injection when dropped.
pub struct InjectionGuard<T: Default> {
    slot: Slot<T>,
    previous: Option<T>,
    mode: Option<RestoreMode<T>>,
}

impl<T: Default> InjectionGuard<T> {
    /// Restores the slot now instead of at drop.
    pub fn restore(mut self) {
        self.restore_now();
    }

    fn restore_now(&mut self) {
        let Some(mode) = self.mode.take() else {
            return;
        };
        let previous = self.previous.take();
        let restored = match mode {
            RestoreMode::OldValue => previous,
            RestoreMode::Nothing => None,
            RestoreMode::Default => Some(T::default()),
            RestoreMode::Value(value) => Some(value),
        };
        if let Some(value) = restored {
            self.slot.replace(value);
        }
        debug!(slot = %self.slot.name, "Restored injected value");
    }
}

impl<T: Default> Drop for InjectionGuard<T> {
    fn drop(&mut self) {
        self.restore_now();
    }
}

/// Something that can be undone at scope end.
trait Restorable {
    fn restore_now(&mut self);
}

impl<T: Default> Restorable for InjectionGuard<T> {
    fn restore_now(&mut self) {
        InjectionGuard::restore_now(self);
    }
}

/// Collects guards of several slots and restores them in reverse order.
#[derive(Default)]
pub struct RestoreScope {
    guards: Vec<Box<dyn Restorable>>,
}

impl RestoreScope {
    /// Creates an empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Injects into `slot` and keeps the guard until the scope ends.
    pub fn inject<T: Default + 'static>(&mut self, slot: &Slot<T>, value: T, mode: RestoreMode<T>) {
        self.guards.push(Box::new(slot.inject(value, mode)));
    }

    /// Number of pending restores.
    pub fn len(&self) -> usize {
        self.guards.len()
    }

    /// Returns true if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }

    /// Restores every slot, most recent injection first.
    pub fn restore_all(&mut self) {
        while let Some(mut guard) = self.guards.pop() {
            guard.restore_now();
        }
    }
}

impl Drop for RestoreScope {
    fn drop(&mut self) {
        self.restore_all();
    }
}
