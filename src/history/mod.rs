//! History provider boundary.
//!
//! # Data Flow
//! ```text
//! provider (browser, memory, ...)
//!     → listener callback (location)
//!     → Router::request (latest location slot)
//!     → Router drain loop
//!
//! Router revert / navigate
//!     → provider.push / provider.replace
//! ```
//!
//! # Design Decisions
//! - The router only needs four operations; anything else (go, block,
//!   titles) stays on the concrete provider
//! - Listeners fire synchronously from push/replace/back/forward
//! - Single-threaded (`Rc`), matching the router

pub mod memory;

use std::fmt;
use std::rc::Rc;

use crate::location::Location;

pub use memory::MemoryHistory;

/// Callback invoked with every new location.
pub type Listener = Rc<dyn Fn(&Location)>;

/// Undo handle returned by [`History::listen`].
pub struct Unlisten(Option<Box<dyn FnOnce()>>);

impl Unlisten {
    pub fn new(f: impl FnOnce() + 'static) -> Self {
        Self(Some(Box::new(f)))
    }

    pub fn call(mut self) {
        if let Some(f) = self.0.take() {
            f();
        }
    }
}

impl fmt::Debug for Unlisten {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Unlisten").field(&self.0.is_some()).finish()
    }
}

/// Source of locations the router follows.
pub trait History {
    /// Current location.
    fn location(&self) -> Location;

    /// Adds a new entry and notifies listeners.
    fn push(&self, location: Location);

    /// Replaces the current entry and notifies listeners.
    fn replace(&self, location: Location);

    fn listen(&self, listener: Listener) -> Unlisten;
}
