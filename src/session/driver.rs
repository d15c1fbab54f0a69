//! The outer session loop and the transport contract it drives.

use async_trait::async_trait;

use tracing::{debug, error};

use super::assembler::{InputEvent, LineAssembler};
use super::dispatcher::Dispatcher;
use crate::error::ServerError;

/// Byte-oriented channel a session runs over.
///
/// Authentication and framing happen before the session core sees the
/// transport; the core only sends bytes, receives one input unit at a
/// time, and observes the close.
#[async_trait]
pub trait Transport: Send {
    /// Sends bytes to the client.
    async fn send(&mut self, bytes: &[u8]) -> Result<(), ServerError>;

    /// Receives one input unit, or `None` once the transport is closed.
    async fn recv(&mut self) -> Option<u8>;

    /// Closes the transport.
    async fn close(&mut self);
}

/// Binds a transport to the line assembler and dispatcher.
pub struct SessionDriver<T: Transport> {
    transport: T,
    dispatcher: Dispatcher,
    assembler: LineAssembler,
}

impl<T: Transport> SessionDriver<T> {
    pub fn new(transport: T, dispatcher: Dispatcher) -> Self {
        let assembler = LineAssembler::new(dispatcher.keystroke_intercepts());
        Self {
            transport,
            dispatcher,
            assembler,
        }
    }

    /// Runs the session until the transport closes, the dispatcher
    /// signals termination, or a handler fails unexpectedly.
    ///
    /// Every received byte is echoed back before processing, so the
    /// client always sees its own keystrokes. After a completed line the
    /// client sees either the handler's output or a redrawn prompt.
    ///
    /// # Errors
    ///
    /// Transport failures and dispatch contract violations terminate the
    /// session; the error is logged here with the session context and
    /// propagated to the connection layer.
    pub async fn run(mut self) -> Result<(), ServerError> {
        self.send_prompt().await?;

        while let Some(byte) = self.transport.recv().await {
            self.transport.send(&[byte]).await?;

            match self.assembler.push(byte) {
                InputEvent::Pending => {}
                InputEvent::Intercepted(keystroke) => {
                    let buffer = self.assembler.buffer_text();
                    let reply = self.dispatcher.dispatch_keystroke(keystroke, &buffer).await;
                    if !reply.output.is_empty() {
                        self.transport.send(reply.output.as_bytes()).await?;
                    }
                    if reply.redraw_prompt {
                        self.send_prompt().await?;
                    }
                    self.assembler.erase_last();
                }
                InputEvent::Completed(line) => {
                    let reply = match self.dispatcher.dispatch_line(&line).await {
                        Ok(reply) => reply,
                        Err(err) => {
                            error!(
                                "{}: session failed on '{}': {}",
                                self.dispatcher.hostname(),
                                line,
                                err
                            );
                            self.transport.close().await;
                            return Err(err);
                        }
                    };

                    if !reply.output.is_empty() {
                        self.transport.send(reply.output.as_bytes()).await?;
                    }
                    if reply.close {
                        debug!("{}: closing session", self.dispatcher.hostname());
                        self.transport.close().await;
                        return Ok(());
                    }
                    if reply.redraw_prompt {
                        self.send_prompt().await?;
                    }
                }
            }
        }

        debug!("{}: transport closed by peer", self.dispatcher.hostname());
        Ok(())
    }

    async fn send_prompt(&mut self) -> Result<(), ServerError> {
        let prompt = format!("\r\n{}", self.dispatcher.prompt());
        self.transport.send(prompt.as_bytes()).await
    }
}
