//! Bounded FIFO channels connecting adjacent pipeline stages.
//!
//! # Design
//! - Thin wrapper over a bounded `tokio::sync::mpsc` channel.
//! - The sender is not `Clone`; closing it consumes the handle, so a queue
//!   carries at most one terminal marker and it is always last.
//! - Blocking variants are for stage workers on the blocking pool; the async
//!   variants are for the coordinator.

use tokio::sync::mpsc;

use crate::error::{PipelineError, PipelineResult};
use crate::model::Message;

/// What a receiver observed when it pulled from its queue.
#[derive(Debug, PartialEq, Eq)]
pub enum Delivery<T> {
    /// A work unit, in enqueue order.
    Unit(T),
    /// The terminal marker; every later pull returns it again.
    EndOfStream,
    /// The sender went away without sending the terminal marker.
    Disconnected,
}

/// Create a bounded queue named `name` holding at most `capacity` messages.
///
/// A zero capacity is raised to one.
#[must_use]
pub fn stage_queue<T>(name: &'static str, capacity: usize) -> (QueueSender<T>, QueueReceiver<T>) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (
        QueueSender {
            name,
            inner: sender,
        },
        QueueReceiver {
            name,
            inner: receiver,
            ended: false,
        },
    )
}

/// Producing half of a stage queue.
#[derive(Debug)]
pub struct QueueSender<T> {
    name: &'static str,
    inner: mpsc::Sender<Message<T>>,
}

impl<T> QueueSender<T> {
    /// Queue name used in logs and errors.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Enqueue a unit, waiting while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::QueueClosed`] if the receiver was dropped.
    pub async fn send(&self, unit: T) -> PipelineResult<()> {
        self.inner
            .send(Message::Unit(unit))
            .await
            .map_err(|_| self.closed())
    }

    /// Enqueue a unit from a blocking worker thread.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::QueueClosed`] if the receiver was dropped.
    pub fn send_blocking(&self, unit: T) -> PipelineResult<()> {
        self.inner
            .blocking_send(Message::Unit(unit))
            .map_err(|_| self.closed())
    }

    /// Send the terminal marker and release the sender.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::QueueClosed`] if the receiver was dropped.
    pub async fn close(self) -> PipelineResult<()> {
        self.inner
            .send(Message::EndOfStream)
            .await
            .map_err(|_| self.closed())
    }

    /// Send the terminal marker from a blocking worker thread.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::QueueClosed`] if the receiver was dropped.
    pub fn close_blocking(self) -> PipelineResult<()> {
        self.inner
            .blocking_send(Message::EndOfStream)
            .map_err(|_| self.closed())
    }

    const fn closed(&self) -> PipelineError {
        PipelineError::QueueClosed { queue: self.name }
    }
}

/// Consuming half of a stage queue.
#[derive(Debug)]
pub struct QueueReceiver<T> {
    name: &'static str,
    inner: mpsc::Receiver<Message<T>>,
    ended: bool,
}

impl<T> QueueReceiver<T> {
    /// Queue name used in logs and errors.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Pull the next message, blocking the current thread.
    ///
    /// Must not be called from inside an async context.
    pub fn recv_blocking(&mut self) -> Delivery<T> {
        if self.ended {
            return Delivery::EndOfStream;
        }
        let message = self.inner.blocking_recv();
        self.deliver(message)
    }

    /// Pull the next message.
    pub async fn recv(&mut self) -> Delivery<T> {
        if self.ended {
            return Delivery::EndOfStream;
        }
        let message = self.inner.recv().await;
        self.deliver(message)
    }

    fn deliver(&mut self, message: Option<Message<T>>) -> Delivery<T> {
        match message {
            Some(Message::Unit(unit)) => Delivery::Unit(unit),
            Some(Message::EndOfStream) => {
                self.ended = true;
                self.inner.close();
                Delivery::EndOfStream
            }
            None => Delivery::Disconnected,
        }
    }
}
