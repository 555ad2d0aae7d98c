use std::cell::{Cell, RefCell};
use std::rc::Rc;

pub type SubId = usize;

type Subscriber<T> = Rc<dyn Fn(&T)>;

/// Observable value: `set` stores and notifies every subscriber.
pub struct Signal<T: 'static>(Rc<Inner<T>>);

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

struct Inner<T> {
    value: RefCell<T>,
    subs: RefCell<Vec<(SubId, Subscriber<T>)>>,
    next: Cell<SubId>,
}

impl<T> Signal<T> {
    pub fn new(value: T) -> Self {
        Self(Rc::new(Inner {
            value: RefCell::new(value),
            subs: RefCell::new(Vec::new()),
            next: Cell::new(0),
        }))
    }

    pub fn get(&self) -> T
    where
        T: Clone,
    {
        self.0.value.borrow().clone()
    }

    pub fn set(&self, v: T)
    where
        T: Clone,
    {
        *self.0.value.borrow_mut() = v;
        self.notify();
    }

    pub fn update<F: FnOnce(&mut T)>(&self, f: F)
    where
        T: Clone,
    {
        f(&mut self.0.value.borrow_mut());
        self.notify();
    }

    pub fn subscribe(&self, f: impl Fn(&T) + 'static) -> SubId {
        let id = self.0.next.get();
        self.0.next.set(id + 1);
        self.0.subs.borrow_mut().push((id, Rc::new(f)));
        id
    }

    pub fn unsubscribe(&self, id: SubId) -> bool {
        let mut subs = self.0.subs.borrow_mut();
        let before = subs.len();
        subs.retain(|(sid, _)| *sid != id);
        subs.len() != before
    }

    // Subscribers get a snapshot and run with no borrow held; they may read
    // or set the signal again.
    fn notify(&self)
    where
        T: Clone,
    {
        let subs: Vec<Subscriber<T>> = self.0.subs.borrow().iter().map(|(_, s)| s.clone()).collect();
        let value = self.0.value.borrow().clone();
        for s in subs {
            s(&value);
        }
    }
}

pub fn signal<T>(t: T) -> Signal<T> {
    Signal::new(t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribers_may_set_the_signal_they_observe() {
        let count = signal(0);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let (c, s) = (count.clone(), seen.clone());
        count.subscribe(move |v| {
            s.borrow_mut().push(*v);
            if *v < 3 {
                c.set(v + 1);
            }
        });

        count.set(1);
        assert_eq!(*seen.borrow(), vec![1, 2, 3]);
        assert_eq!(count.get(), 3);
    }
}
