//! Delivery of finished results to a listener.

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::debug;

/// A unit of listener work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Where a listener runs.
#[derive(Debug, Clone, Default)]
pub enum Delivery {
    /// On the publishing task itself.
    #[default]
    Inline,
    /// As a blocking task on a runtime, off the async worker threads.
    Runtime(Handle),
    /// Queued for a [`Dispatcher`] owned by the caller.
    Queue(mpsc::UnboundedSender<Job>),
}

impl Delivery {
    /// Creates a queue delivery and the dispatcher that drains it.
    pub fn queue() -> (Self, Dispatcher) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Delivery::Queue(tx), Dispatcher { jobs: rx })
    }

    /// Runs a job on this delivery's context.
    pub fn deliver(&self, job: Job) {
        match self {
            Delivery::Inline => job(),
            Delivery::Runtime(handle) => {
                handle.spawn_blocking(job);
            }
            Delivery::Queue(tx) => {
                if tx.send(job).is_err() {
                    debug!("Result dropped: dispatcher is gone");
                }
            }
        }
    }
}

/// Caller-side drain for [`Delivery::Queue`].
pub struct Dispatcher {
    jobs: mpsc::UnboundedReceiver<Job>,
}

impl Dispatcher {
    /// Runs the next queued job. Returns false once every sender is gone.
    pub async fn run_next(&mut self) -> bool {
        match self.jobs.recv().await {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Runs jobs until every sender is gone.
    pub async fn run(mut self) {
        while self.run_next().await {}
    }
}

/// Hands one result to one listener, once.
///
/// `publish` consumes the publisher, so a second delivery cannot be
/// expressed.
pub struct ResultPublisher<T> {
    listener: Box<dyn FnOnce(T) + Send + 'static>,
    delivery: Delivery,
}

impl<T: Send + 'static> ResultPublisher<T> {
    /// Creates a publisher that calls `listener` inline.
    pub fn new<F>(listener: F) -> Self
    where
        F: FnOnce(T) + Send + 'static,
    {
        Self {
            listener: Box::new(listener),
            delivery: Delivery::Inline,
        }
    }

    /// Chooses the delivery context.
    pub fn on(mut self, delivery: Delivery) -> Self {
        self.delivery = delivery;
        self
    }

    pub fn publish(self, value: T) {
        let listener = self.listener;
        self.delivery.deliver(Box::new(move || listener(value)));
    }
}
