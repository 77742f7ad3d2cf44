//! Command mailbox.
//!
//! Buttons, the display task or the network task may run in a different
//! execution context than the control loop. They must not touch session
//! state directly; instead they enqueue a [`HeaterCommand`] here and the
//! control loop drains the queue at the top of each tick.
//!
//! Built on `heapless::spsc`: one producer, one consumer, no locks, no
//! allocation. A queue of capacity `N` holds `N - 1` commands.

use heapless::spsc::{Consumer, Producer, Queue};
use log::warn;

use super::commands::HeaterCommand;

pub struct CommandMailbox<const N: usize> {
    queue: Queue<HeaterCommand, N>,
}

impl<const N: usize> CommandMailbox<N> {
    pub const fn new() -> Self {
        Self {
            queue: Queue::new(),
        }
    }

    /// Split into the producer half (handed to the other context) and the
    /// consumer half (kept by the control loop).
    pub fn split(&mut self) -> (CommandSender<'_, N>, CommandReceiver<'_, N>) {
        let (tx, rx) = self.queue.split();
        (CommandSender { tx }, CommandReceiver { rx })
    }
}

impl<const N: usize> Default for CommandMailbox<N> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct CommandSender<'a, const N: usize> {
    tx: Producer<'a, HeaterCommand, N>,
}

impl<const N: usize> CommandSender<'_, N> {
    /// Enqueue a command. A full mailbox drops the command and returns it.
    pub fn send(&mut self, cmd: HeaterCommand) -> Result<(), HeaterCommand> {
        self.tx.enqueue(cmd).inspect_err(|cmd| {
            warn!("Command mailbox full, dropped {:?}", cmd);
        })
    }
}

pub struct CommandReceiver<'a, const N: usize> {
    rx: Consumer<'a, HeaterCommand, N>,
}

impl<const N: usize> CommandReceiver<'_, N> {
    pub fn recv(&mut self) -> Option<HeaterCommand> {
        self.rx.dequeue()
    }

    pub fn is_empty(&self) -> bool {
        !self.rx.ready()
    }
}

impl<const N: usize> Iterator for CommandReceiver<'_, N> {
    type Item = HeaterCommand;

    fn next(&mut self) -> Option<HeaterCommand> {
        self.recv()
    }
}
