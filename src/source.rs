use std::cell::{Cell, RefCell};
use std::error::Error as StdError;
use std::fmt;
use std::mem;
use std::rc::{Rc, Weak};

use tracing::{debug, error, trace};

type Callback<T> = Rc<dyn Fn(Notification<'_, T>)>;
type Teardown = Box<dyn FnOnce()>;
// Wires one observer into a pipeline and hands back how to unwire it.
type Producer<T> = Rc<dyn Fn(Callback<T>) -> Teardown>;

/// Failure carried by a stream. Cloning shares the same underlying error, so
/// every stage downstream of a failure sees the exact error the source raised.
#[derive(Clone)]
pub struct StreamError(Rc<anyhow::Error>);

impl StreamError {
    pub fn new(err: impl Into<anyhow::Error>) -> Self {
        Self(Rc::new(err.into()))
    }

    pub fn inner(&self) -> &anyhow::Error {
        &self.0
    }

    pub fn ptr_eq(&self, other: &StreamError) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl StdError for StreamError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.0.chain().nth(1)
    }
}

/// A single signal delivered to an observer.
#[derive(Debug)]
pub enum Notification<'a, T> {
    Next(&'a T),
    Error(&'a StreamError),
    Complete,
}

impl<T> Clone for Notification<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Notification<'_, T> {}

impl<'a, T> Notification<'a, T> {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Notification::Next(_))
    }

    // Terminal signals carry no item, so they pass between stream types as is.
    fn retype<U>(self) -> Option<Notification<'a, U>> {
        match self {
            Notification::Next(_) => None,
            Notification::Error(err) => Some(Notification::Error(err)),
            Notification::Complete => Some(Notification::Complete),
        }
    }
}

#[derive(Clone)]
enum Terminal {
    Completed,
    Failed(StreamError),
}

impl Terminal {
    fn notification<T>(&self) -> Notification<'_, T> {
        match self {
            Terminal::Completed => Notification::Complete,
            Terminal::Failed(err) => Notification::Error(err),
        }
    }
}

struct Node<T> {
    observers: RefCell<Vec<(usize, Callback<T>)>>,
    next_id: Cell<usize>,
    terminal: RefCell<Option<Terminal>>,
}

impl<T> Node<T> {
    fn new() -> Self {
        Self {
            observers: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
            terminal: RefCell::new(None),
        }
    }

    fn is_terminated(&self) -> bool {
        self.terminal.borrow().is_some()
    }

    /// Returns `None` when the node already terminated; the callback has then
    /// received the terminal signal and is not retained.
    fn attach(&self, callback: Callback<T>) -> Option<usize> {
        let terminal = self.terminal.borrow().clone();
        if let Some(terminal) = terminal {
            callback(terminal.notification());
            return None;
        }

        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.observers.borrow_mut().push((id, callback));
        Some(id)
    }

    fn detach(&self, id: usize) {
        self.observers
            .borrow_mut()
            .retain(|(existing, _)| *existing != id);
    }

    fn next(&self, item: &T) {
        if self.is_terminated() {
            return;
        }
        let callbacks: Vec<Callback<T>> = self
            .observers
            .borrow()
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();
        for callback in callbacks {
            callback(Notification::Next(item));
        }
    }

    fn terminate(&self, terminal: Terminal) {
        if self.is_terminated() {
            return;
        }
        *self.terminal.borrow_mut() = Some(terminal.clone());

        let observers = mem::take(&mut *self.observers.borrow_mut());
        match &terminal {
            Terminal::Completed => debug!(observers = observers.len(), "stream completed"),
            Terminal::Failed(err) => debug!(observers = observers.len(), error = %err, "stream failed"),
        }

        for (_, callback) in observers {
            callback(terminal.notification());
        }
    }
}

/// Hot push handle: observers see what is emitted after they attach, and
/// anyone attaching after the terminal signal gets only that signal.
pub struct Source<T> {
    node: Rc<Node<T>>,
}

impl<T> Default for Source<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Source<T> {
    pub fn new() -> Self {
        Self {
            node: Rc::new(Node::new()),
        }
    }

    pub fn emit(&self, item: T) {
        self.node.next(&item);
    }

    pub fn emit_all<I>(&self, items: I)
    where
        I: IntoIterator<Item = T>,
    {
        for item in items {
            self.emit(item);
        }
    }

    pub fn complete(&self) {
        self.node.terminate(Terminal::Completed);
    }

    pub fn error(&self, err: impl Into<anyhow::Error>) {
        self.node.terminate(Terminal::Failed(StreamError::new(err)));
    }

    pub fn is_terminated(&self) -> bool {
        self.node.is_terminated()
    }

    pub fn to_stream(&self) -> Stream<T>
    where
        T: 'static,
    {
        let node = self.node.clone();
        Stream::<T>::from_producer(move |sink| match node.attach(sink) {
            Some(id) => {
                let node: Weak<Node<T>> = Rc::downgrade(&node);
                Box::new(move || {
                    if let Some(node) = node.upgrade() {
                        node.detach(id);
                    }
                }) as Teardown
            }
            None => Box::new(|| {}) as Teardown,
        })
    }
}

/// A pipeline description. Nothing runs until an observer subscribes, and
/// every subscription gets its own copy of each stage.
pub struct Stream<T> {
    produce: Producer<T>,
}

impl<T> Stream<T>
where
    T: 'static,
{
    fn from_producer<F>(produce: F) -> Self
    where
        F: Fn(Callback<T>) -> Teardown + 'static,
    {
        Stream {
            produce: Rc::new(produce),
        }
    }

    /// Emits `items` in order and completes, separately for each subscriber.
    pub fn of<I>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let items: Rc<[T]> = items.into_iter().collect();
        Self::from_producer(move |sink| {
            for item in items.iter() {
                sink(Notification::Next(item));
            }
            sink(Notification::Complete);
            Box::new(|| {})
        })
    }

    fn pipe<U, F>(&self, stage: F) -> Stream<U>
    where
        U: 'static,
        F: Fn(Notification<'_, T>, &Callback<U>) + 'static,
    {
        let upstream = self.produce.clone();
        let stage = Rc::new(stage);

        Stream::<U>::from_producer(move |downstream: Callback<U>| {
            let stage = stage.clone();
            upstream(callback(move |notification| {
                (*stage)(notification, &downstream)
            }))
        })
    }

    pub fn map<U, F>(&self, f: F) -> Stream<U>
    where
        U: 'static,
        F: Fn(&T) -> U + 'static,
    {
        self.pipe(move |notification, downstream| match notification {
            Notification::Next(item) => downstream(Notification::Next(&f(item))),
            other => relay(other, downstream),
        })
    }

    pub fn filter<F>(&self, predicate: F) -> Stream<T>
    where
        F: Fn(&T) -> bool + 'static,
    {
        self.pipe(move |notification, downstream| match notification {
            Notification::Next(item) if !predicate(item) => {}
            other => downstream(other),
        })
    }

    pub fn tap<F>(&self, f: F) -> Stream<T>
    where
        F: Fn(&T) + 'static,
    {
        self.pipe(move |notification, downstream| {
            if let Notification::Next(item) = notification {
                f(item);
            }
            downstream(notification);
        })
    }

    /// Re-emits every item and, once this stream completes, emits `values` in
    /// order before completing. A failure skips `values` entirely, and a
    /// stream that never completes never emits them.
    pub fn end_with<I>(&self, values: I) -> Stream<T>
    where
        I: IntoIterator<Item = T>,
    {
        let trailing: Rc<[T]> = values.into_iter().collect();

        self.pipe(move |notification, downstream| match notification {
            Notification::Complete => {
                trace!(values = trailing.len(), "emitting trailing values");
                for value in trailing.iter() {
                    downstream(Notification::Next(value));
                }
                downstream(Notification::Complete);
            }
            other => downstream(other),
        })
    }

    /// Runs `hook` once per subscription: after the subscriber has seen the
    /// terminal signal, or when the subscription is cancelled first.
    pub fn finalize<F>(&self, hook: F) -> Stream<T>
    where
        F: Fn() + 'static,
    {
        let upstream = self.produce.clone();
        let hook = Rc::new(hook);

        Self::from_producer(move |downstream| {
            let teardown = upstream(downstream);
            let hook = hook.clone();
            Box::new(move || {
                teardown();
                (*hook)();
            })
        })
    }

    pub fn observe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(Notification<'_, T>) + 'static,
    {
        let closed = Rc::new(Cell::new(false));
        let teardown: Rc<RefCell<Option<Teardown>>> = Rc::new(RefCell::new(None));

        let flag = closed.clone();
        let pending = teardown.clone();
        let sink = callback(move |notification| {
            if flag.get() {
                return;
            }
            if notification.is_terminal() {
                flag.set(true);
            }
            observer(notification);
            if notification.is_terminal() {
                run_once(&pending);
            }
        });

        let wired = (self.produce)(sink);
        if closed.get() {
            // Terminated while wiring up, e.g. `Stream::of`.
            wired();
        } else {
            *teardown.borrow_mut() = Some(wired);
        }

        Subscription { closed, teardown }
    }

    /// Calls `on_next` for every item. Failures have no handler here and are
    /// reported through `tracing` instead.
    pub fn subscribe<F>(&self, on_next: F) -> Subscription
    where
        F: Fn(&T) + 'static,
    {
        self.observe(move |notification| match notification {
            Notification::Next(item) => on_next(item),
            Notification::Error(err) => {
                let chain = format!("{:#}", err.inner());
                error!(error = %chain, "unhandled stream error");
            }
            Notification::Complete => {}
        })
    }
}

impl<T> Clone for Stream<T> {
    fn clone(&self) -> Self {
        Stream {
            produce: self.produce.clone(),
        }
    }
}

fn callback<T, F>(f: F) -> Callback<T>
where
    F: Fn(Notification<'_, T>) + 'static,
{
    Rc::new(f)
}

fn relay<T, U>(notification: Notification<'_, T>, downstream: &Callback<U>) {
    if let Some(notification) = notification.retype() {
        downstream(notification);
    }
}

fn run_once(teardown: &RefCell<Option<Teardown>>) {
    let teardown = teardown.borrow_mut().take();
    if let Some(teardown) = teardown {
        teardown();
    }
}

/// Handle to an attached observer. Dropping it leaves the observer attached;
/// call [`Subscription::unsubscribe`] to stop delivery.
pub struct Subscription {
    closed: Rc<Cell<bool>>,
    teardown: Rc<RefCell<Option<Teardown>>>,
}

impl Subscription {
    pub fn unsubscribe(&self) {
        if !self.closed.replace(true) {
            trace!("subscription cancelled");
        }
        run_once(&self.teardown);
    }

    /// True once delivery has stopped, either through cancellation or
    /// because a terminal signal was observed.
    pub fn is_closed(&self) -> bool {
        self.closed.get()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("closed", &self.closed.get())
            .finish()
    }
}
