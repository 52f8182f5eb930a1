//! Observable values.
//!
//! # Responsibilities
//! - Hold a single value readable from anywhere
//! - Notify subscribers synchronously when the value changes
//!
//! # Design Decisions
//! - Single-threaded (`Rc`/`RefCell`); the router never crosses threads
//! - Writes are crate-private: only the navigation commit step assigns
//! - Setting an equal value is not a change and notifies nobody
//! - Subscriptions are RAII guards; dropping one unsubscribes

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

type Subscriber<T> = Rc<dyn Fn(&T)>;

struct Inner<T> {
    value: RefCell<T>,
    subscribers: RefCell<Vec<(u64, Subscriber<T>)>>,
    next_id: Cell<u64>,
}

/// A mutable cell with subscribe/notify semantics.
pub struct Observable<T> {
    inner: Rc<Inner<T>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Observable")
            .field(&*self.inner.value.borrow())
            .finish()
    }
}

impl<T: Default + 'static> Default for Observable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: 'static> Observable<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(Inner {
                value: RefCell::new(value),
                subscribers: RefCell::new(Vec::new()),
                next_id: Cell::new(0),
            }),
        }
    }

    /// Reads the current value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Registers `f` to run after every change.
    pub fn subscribe(&self, f: impl Fn(&T) + 'static) -> Subscription {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        self.inner.subscribers.borrow_mut().push((id, Rc::new(f)));

        let weak: Weak<Inner<T>> = Rc::downgrade(&self.inner);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.subscribers.borrow_mut().retain(|(sid, _)| *sid != id);
                }
            })),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }
}

impl<T: Clone + 'static> Observable<T> {
    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }
}

impl<T: PartialEq + 'static> Observable<T> {
    /// Assigns a new value, returning whether it changed.
    pub(crate) fn set(&self, value: T) -> bool {
        {
            let mut current = self.inner.value.borrow_mut();
            if *current == value {
                return false;
            }
            *current = value;
        }
        self.notify();
        true
    }

    fn notify(&self) {
        // Subscribers may subscribe or unsubscribe while being notified.
        let subscribers: Vec<Subscriber<T>> = self
            .inner
            .subscribers
            .borrow()
            .iter()
            .map(|(_, f)| f.clone())
            .collect();
        let value = self.inner.value.borrow();
        for subscriber in subscribers {
            subscriber(&value);
        }
    }
}

/// Guard returned by [`Observable::subscribe`].
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Keeps the subscription alive for the lifetime of the observable.
    pub fn detach(mut self) {
        self.cancel = None;
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_notifies_only_on_change() {
        let cell = Observable::new(false);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let _sub = cell.subscribe(move |v| sink.borrow_mut().push(*v));

        assert!(cell.set(true));
        assert!(!cell.set(true));
        assert!(cell.set(false));
        assert_eq!(*seen.borrow(), vec![true, false]);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let cell = Observable::new(0u32);
        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        let sub = cell.subscribe(move |_| counter.set(counter.get() + 1));
        cell.set(1);
        drop(sub);
        cell.set(2);
        assert_eq!(hits.get(), 1);
        assert_eq!(cell.subscriber_count(), 0);
    }

    #[test]
    fn test_detach_keeps_subscriber() {
        let cell = Observable::new(String::new());
        cell.subscribe(|_| {}).detach();
        assert_eq!(cell.subscriber_count(), 1);
        cell.set("x".to_string());
        assert_eq!(cell.get(), "x");
    }
}
