//! Property system for Atlas Table.
//!
//! A [`Property<T>`] is a shared value with change detection. Collaborators
//! use it for state that a coordinator needs to read at subscription time,
//! such as whether a layer is currently visible or the map's last extent,
//! while the matching [`Signal`](crate::Signal) announces changes.
//!
//! # Example
//!
//! ```
//! use atlas_table_core::{Property, Signal};
//!
//! struct Layer {
//!     visible: Property<bool>,
//!     visibility_changed: Signal<bool>,
//! }
//!
//! impl Layer {
//!     fn set_visible(&self, visible: bool) {
//!         if self.visible.set(visible) {
//!             self.visibility_changed.emit(visible);
//!         }
//!     }
//! }
//!
//! let layer = Layer { visible: Property::new(true), visibility_changed: Signal::new() };
//! layer.set_visible(false);
//! assert!(!layer.visible.get());
//! ```

use std::fmt;

use parking_lot::RwLock;

/// A shared value that tracks changes.
///
/// `set()` compares the new value with the current one and reports whether
/// anything changed, so callers only emit notifications for real changes.
pub struct Property<T> {
    value: RwLock<T>,
}

impl<T: Clone> Property<T> {
    /// Create a new property with an initial value.
    pub fn new(value: T) -> Self {
        Self {
            value: RwLock::new(value),
        }
    }

    /// Get the current value.
    pub fn get(&self) -> T {
        self.value.read().clone()
    }

    /// Set the value without change detection.
    pub fn set_silent(&self, value: T) {
        *self.value.write() = value;
    }
}

impl<T: Clone + PartialEq> Property<T> {
    /// Set the value, returning `true` if the value changed.
    pub fn set(&self, value: T) -> bool {
        let mut current = self.value.write();
        if *current != value {
            *current = value;
            true
        } else {
            false
        }
    }
}

impl<T: Clone + Default> Default for Property<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + fmt::Debug> fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("value", &self.get())
            .finish()
    }
}
