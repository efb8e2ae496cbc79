use crate::core::{PersistenceError, Result};
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

/// Shared handle to an entity instance.
///
/// The persistence context and the caller hold clones of the same handle,
/// so mutations made through [`Managed::borrow_mut`] are what the next flush
/// compares against the snapshot. Two handles are the same instance when
/// [`Managed::ptr_eq`] holds.
pub struct Managed<T>(Rc<RefCell<T>>);

impl<T> Managed<T> {
    pub fn new(entity: T) -> Self {
        Self(Rc::new(RefCell::new(entity)))
    }

    /// # Panics
    ///
    /// Panics if the entity is currently mutably borrowed.
    pub fn borrow(&self) -> Ref<'_, T> {
        self.0.borrow()
    }

    /// # Panics
    ///
    /// Panics if the entity is currently borrowed.
    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.0.borrow_mut()
    }

    pub fn ptr_eq(&self, other: &Managed<T>) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn read(&self) -> Result<Ref<'_, T>> {
        self.0.try_borrow().map_err(|_| {
            PersistenceError::IllegalManagedState(
                "entity is mutably borrowed by the caller".to_string(),
            )
        })
    }

    pub(crate) fn write(&self) -> Result<RefMut<'_, T>> {
        self.0.try_borrow_mut().map_err(|_| {
            PersistenceError::IllegalManagedState("entity is borrowed by the caller".to_string())
        })
    }
}

impl<T: Clone> Managed<T> {
    /// Copy of the current state.
    pub fn get(&self) -> T {
        self.0.borrow().clone()
    }
}

impl<T> Clone for Managed<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T> From<T> for Managed<T> {
    fn from(entity: T) -> Self {
        Self::new(entity)
    }
}

impl<T: fmt::Debug> fmt::Debug for Managed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(entity) => f.debug_tuple("Managed").field(&*entity).finish(),
            Err(_) => f.write_str("Managed(<borrowed>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_state() {
        let a = Managed::new(String::from("x"));
        let b = a.clone();
        b.borrow_mut().push('y');
        assert_eq!(*a.borrow(), "xy");
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&Managed::new(String::from("xy"))));
    }

    #[test]
    fn test_conflicting_borrow_is_an_error() {
        let a = Managed::new(1_i64);
        let _guard = a.borrow_mut();
        assert!(matches!(a.read(), Err(PersistenceError::IllegalManagedState(_))));
        assert!(a.write().is_err());
    }
}
