// Plain observable primitive: register a callback, get an unsubscribe handle back.
// Delivery is synchronous, in subscription order, on the caller's stack.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

type Callback<T> = Rc<RefCell<dyn FnMut(&T)>>;

struct Registry<T> {
    next_id: u64,
    entries: Vec<(u64, Callback<T>)>,
    /// Values emitted while a delivery pass is running.
    pending: VecDeque<T>,
    delivering: bool,
}

/// A set of subscribers for values of type `T`. Clones share the same set.
pub struct Subscribers<T> {
    inner: Rc<RefCell<Registry<T>>>,
}

impl<T> Clone for Subscribers<T> {
    fn clone(&self) -> Self {
        Subscribers {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + 'static> Default for Subscribers<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Subscribers<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscribers")
            .field("len", &self.inner.borrow().entries.len())
            .finish()
    }
}

impl<T: Clone + 'static> Subscribers<T> {
    pub fn new() -> Self {
        Subscribers {
            inner: Rc::new(RefCell::new(Registry {
                next_id: 0,
                entries: Vec::new(),
                pending: VecDeque::new(),
                delivering: false,
            })),
        }
    }

    pub fn subscribe(&self, callback: impl FnMut(&T) + 'static) -> Subscription {
        let mut registry = self.inner.borrow_mut();
        let id = registry.next_id;
        registry.next_id += 1;
        registry
            .entries
            .push((id, Rc::new(RefCell::new(callback)) as Callback<T>));

        let weak: Weak<RefCell<Registry<T>>> = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.borrow_mut().entries.retain(|(entry, _)| *entry != id);
            }
        })
    }

    /// Deliver `value` to every subscriber.
    ///
    /// Subscribers may subscribe, unsubscribe or emit again from inside the
    /// callback. A nested emit is queued and delivered to everyone once the
    /// current pass finishes, so every subscriber sees every value in order.
    /// A subscriber removed mid-delivery is skipped.
    pub fn emit(&self, value: &T) {
        {
            let mut registry = self.inner.borrow_mut();
            if registry.delivering {
                registry.pending.push_back(value.clone());
                return;
            }
            registry.delivering = true;
        }

        self.deliver(value);
        loop {
            let next = {
                let mut registry = self.inner.borrow_mut();
                let next = registry.pending.pop_front();
                if next.is_none() {
                    registry.delivering = false;
                }
                next
            };
            match next {
                Some(value) => self.deliver(&value),
                None => return,
            }
        }
    }

    fn deliver(&self, value: &T) {
        let snapshot: Vec<(u64, Callback<T>)> = self
            .inner
            .borrow()
            .entries
            .iter()
            .map(|(id, callback)| (*id, Rc::clone(callback)))
            .collect();

        for (id, callback) in snapshot {
            let still_registered = self
                .inner
                .borrow()
                .entries
                .iter()
                .any(|(entry, _)| *entry == id);
            if !still_registered {
                continue;
            }
            (&mut *callback.borrow_mut())(value);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.inner.borrow_mut().entries.clear();
    }
}

/// Handle returned by `subscribe`; call [`Subscription::unsubscribe`] to detach.
pub struct Subscription {
    detach: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(detach: impl FnOnce() + 'static) -> Self {
        Subscription {
            detach: Some(Box::new(detach)),
        }
    }

    /// A handle with nothing to detach.
    pub fn noop() -> Self {
        Subscription { detach: None }
    }

    pub fn unsubscribe(mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("attached", &self.detach.is_some())
            .finish()
    }
}
