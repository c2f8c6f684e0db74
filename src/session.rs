//! Communication session management
//!
//! This module defines the trait for tunneling messages from the table to a
//! connected client. The table never holds a transport handle itself; it
//! looks tunnels up by connection [`Id`](crate::connections::Id) whenever it
//! needs to send.

use log::debug;
use tokio::sync::mpsc;

use crate::OutgoingMessage;

/// Trait for sending messages through a communication tunnel
///
/// Implementations might wrap a WebSocket, a channel feeding one, or a test
/// recorder.
pub trait Tunnel {
    /// Sends a message to the client
    fn send_message(&self, message: &OutgoingMessage);

    /// Closes the communication tunnel
    ///
    /// Called when the server shuts down or drops the connection.
    fn close(self);
}

/// A tunnel that queues encoded frames on an unbounded tokio channel
///
/// The receiving half belongs to whatever task writes to the socket. Sending
/// to a closed channel is not an error; the frame is dropped.
#[derive(Debug, Clone)]
pub struct ChannelTunnel {
    sender: mpsc::UnboundedSender<String>,
}

impl ChannelTunnel {
    /// Wraps an existing sender
    pub fn new(sender: mpsc::UnboundedSender<String>) -> Self {
        Self { sender }
    }

    /// Creates a tunnel together with the receiver its frames arrive on
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }
}

impl Tunnel for ChannelTunnel {
    fn send_message(&self, message: &OutgoingMessage) {
        if self.sender.send(message.to_message()).is_err() {
            debug!("dropping frame for a closed connection");
        }
    }

    fn close(self) {
        drop(self.sender);
    }
}
