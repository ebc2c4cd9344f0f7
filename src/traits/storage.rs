//! Namespaced key-value persistence.
//!
//! Modelled on flash preference stores: a namespace must be opened before
//! use and closed afterwards. [`StoreGuard`] pairs the two so that every
//! exit path closes the namespace.

extern crate alloc;
use alloc::vec::Vec;

use core::ops::{Deref, DerefMut};

use crate::error::BridgeError;

/// Key-value store with namespaces.
pub trait PreferenceStore {
    /// Open a namespace. Returns `false` when it cannot be opened.
    fn begin(&mut self, namespace: &str, read_only: bool) -> bool;

    /// Close the open namespace.
    fn end(&mut self);

    /// Bytes stored under `key`, `None` if absent.
    fn get_bytes(&mut self, key: &str) -> Option<Vec<u8>>;

    /// Store bytes under `key`. Returns the number of bytes written.
    fn put_bytes(&mut self, key: &str, bytes: &[u8]) -> usize;

    /// Remove `key`. Returns `false` on failure.
    fn remove(&mut self, key: &str) -> bool;
}

/// An open namespace, closed on drop.
///
/// # Example
///
/// ```rust
/// use rs_trainbridge::hal::MockStore;
/// use rs_trainbridge::traits::{PreferenceStore, StoreGuard};
///
/// let mut store = MockStore::new();
/// {
///     let mut guard = StoreGuard::open(&mut store, "z21", false).unwrap();
///     guard.put_bytes("locomode", &[3, 0, 1, 3]);
/// }
/// assert!(!store.is_open());
/// assert_eq!(store.get_raw("z21", "locomode"), Some(&[3, 0, 1, 3][..]));
/// ```
pub struct StoreGuard<'a, S: PreferenceStore + ?Sized> {
    store: &'a mut S,
}

impl<'a, S: PreferenceStore + ?Sized> StoreGuard<'a, S> {
    /// Open `namespace`, failing with [`BridgeError::StorageUnavailable`].
    pub fn open(store: &'a mut S, namespace: &str, read_only: bool) -> Result<Self, BridgeError> {
        if store.begin(namespace, read_only) {
            Ok(Self { store })
        } else {
            Err(BridgeError::StorageUnavailable)
        }
    }
}

impl<S: PreferenceStore + ?Sized> Deref for StoreGuard<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.store
    }
}

impl<S: PreferenceStore + ?Sized> DerefMut for StoreGuard<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.store
    }
}

impl<S: PreferenceStore + ?Sized> Drop for StoreGuard<'_, S> {
    fn drop(&mut self) {
        self.store.end();
    }
}
