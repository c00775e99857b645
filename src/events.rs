// SPDX-License-Identifier: GPL-3.0-only

//! Typed per-producer event channels
//!
//! Each component owns one [`EventChannel`] for its own event enum. Any
//! number of observers subscribe and get an unbounded receiver; observers
//! that drop their receiver are pruned on the next emit.

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

#[derive(Debug)]
pub struct EventChannel<E> {
    subscribers: Vec<UnboundedSender<E>>,
}

impl<E> Default for EventChannel<E> {
    fn default() -> Self {
        Self {
            subscribers: Vec::new(),
        }
    }
}

impl<E: Clone> EventChannel<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> UnboundedReceiver<E> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn emit(&mut self, event: E) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

/// Drain everything currently buffered in a receiver
pub fn drain<E>(rx: &mut UnboundedReceiver<E>) -> Vec<E> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
