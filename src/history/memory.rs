//! In-memory history provider.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::history::{History, Listener, Unlisten};
use crate::location::Location;

#[derive(Default)]
struct Inner {
    entries: RefCell<Vec<Location>>,
    index: Cell<usize>,
    listeners: RefCell<Vec<(u64, Listener)>>,
    next_id: Cell<u64>,
}

/// A history stack kept in memory. Clones share the same stack.
#[derive(Clone)]
pub struct MemoryHistory {
    inner: Rc<Inner>,
}

impl std::fmt::Debug for MemoryHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryHistory")
            .field("entries", &*self.inner.entries.borrow())
            .field("index", &self.inner.index.get())
            .finish()
    }
}

impl Default for MemoryHistory {
    fn default() -> Self {
        Self::new(Location::parse("/"))
    }
}

impl MemoryHistory {
    pub fn new(initial: impl Into<Location>) -> Self {
        let inner = Inner::default();
        inner.entries.borrow_mut().push(initial.into());
        Self {
            inner: Rc::new(inner),
        }
    }

    /// Every entry, oldest first.
    pub fn entries(&self) -> Vec<Location> {
        self.inner.entries.borrow().clone()
    }

    pub fn index(&self) -> usize {
        self.inner.index.get()
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    /// Moves one entry back; returns false at the start of the stack.
    pub fn back(&self) -> bool {
        self.go(-1)
    }

    /// Moves one entry forward; returns false at the end of the stack.
    pub fn forward(&self) -> bool {
        self.go(1)
    }

    pub fn go(&self, delta: isize) -> bool {
        let len = self.inner.entries.borrow().len();
        let target = self.inner.index.get() as isize + delta;
        if delta == 0 || target < 0 || target as usize >= len {
            return false;
        }
        self.inner.index.set(target as usize);
        self.notify();
        true
    }

    fn notify(&self) {
        let location = self.location();
        // Listeners may push or unlisten while being notified.
        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .borrow()
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for listener in listeners {
            listener(&location);
        }
    }
}

impl History for MemoryHistory {
    fn location(&self) -> Location {
        self.inner.entries.borrow()[self.inner.index.get()].clone()
    }

    fn push(&self, location: Location) {
        {
            let mut entries = self.inner.entries.borrow_mut();
            let index = self.inner.index.get();
            entries.truncate(index + 1);
            entries.push(location);
            self.inner.index.set(index + 1);
        }
        self.notify();
    }

    fn replace(&self, location: Location) {
        {
            let mut entries = self.inner.entries.borrow_mut();
            entries[self.inner.index.get()] = location;
        }
        self.notify();
    }

    fn listen(&self, listener: Listener) -> Unlisten {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner.listeners.borrow_mut().push((id, listener));

        let weak = Rc::downgrade(&self.inner);
        Unlisten::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.listeners.borrow_mut().retain(|(lid, _)| *lid != id);
            }
        })
    }
}
