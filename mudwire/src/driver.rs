//! The async driver: one task per connection pumping the bounded ingress
//! queue through the engine and the engine's events into the handler.
//!
//! Operates as an "Actor": the transport pushes inbound bytes through a
//! [`Handle`] (blocking when the queue fills, which is the back-pressure
//! mechanism), application code sends [`Action`]s over an unbounded channel,
//! and the task serialises everything — engine transitions, handler
//! callbacks, outbound writes — so no two callbacks for one connection ever
//! overlap.

use std::fmt::{Debug, Formatter};
use std::ops::ControlFlow;

use tokio::select;
use tokio::sync::mpsc::{
    channel, unbounded_channel, Receiver, Sender, UnboundedReceiver, UnboundedSender,
};
use tokio::task::JoinHandle;
use tokio_util::bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::{error, instrument, trace, warn, Level};

use crate::compress::{Compressor, Decompressor, Direction};
use crate::engine::{Engine, Event, Role};
use crate::error::{Error, ErrorKind};
use crate::handler::TelnetHandler;
use crate::msdp::MsdpValue;
use crate::negotiation::Side;
use crate::telnet::TelnetOption;
use crate::Result;

/// A handle to a running connection driver.
pub struct Handle {
    byte_tx: Sender<u8>,
    action_tx: UnboundedSender<Action>,
    cancel: CancellationToken,
}

impl Handle {
    /// Feed inbound transport bytes. Blocks once the ingress queue is full,
    /// back-pressuring the transport to the engine's speed.
    pub async fn feed(&self, bytes: &[u8]) -> Result<()> {
        for byte in bytes {
            self.byte_tx
                .send(*byte)
                .await
                .map_err(|_| Error::from(ErrorKind::NotRunning))?;
        }
        Ok(())
    }

    /// Queue an application action for the driver task.
    pub fn send(&self, action: impl Into<Action>) -> Result<()> {
        self.action_tx
            .send(action.into())
            .map_err(|_| Error::from(ErrorKind::NotRunning))
    }

    /// Signal the driver to stop. In-flight callback work completes; unread
    /// inbound bytes are dropped.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Debug for Handle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverHandle")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// An application-initiated action.
#[derive(Debug)]
pub enum Action {
    /// Send a line of user data (escaped and CRLF-terminated by the engine).
    SendLine(Bytes),

    /// Send a GMCP message.
    Gmcp {
        package: String,
        json: serde_json::Value,
    },

    /// Send one MSDP variable.
    Msdp { name: String, value: MsdpValue },

    /// Update the server MSDP model, pushing to reporting clients.
    MsdpUpdate { name: String, value: MsdpValue },

    /// Emit a prompt boundary per the EOR/SGA agreement.
    Prompt,

    /// Open a charset negotiation with the configured offer list.
    RequestCharset,

    /// Terminate the connection driver.
    Disconnect,
}

impl From<Bytes> for Action {
    fn from(line: Bytes) -> Self {
        Action::SendLine(line)
    }
}

/// The per-connection driver task.
pub struct Driver {
    engine: Engine,
    handler: Box<dyn TelnetHandler>,
    inbound: Option<Decompressor>,
    outbound: Option<Compressor>,
}

impl Driver {
    /// Spawn the driver for a built engine. Returns the handle and the task;
    /// the task resolves when the connection ends (handle dropped,
    /// `Disconnect`, or cancellation) or a hard error occurs.
    #[must_use]
    pub fn spawn(
        engine: Engine,
        handler: Box<dyn TelnetHandler>,
    ) -> (Handle, JoinHandle<Result<()>>) {
        let (byte_tx, byte_rx) = channel(engine.config.ingress_capacity);
        let (action_tx, action_rx) = unbounded_channel();
        let cancel = CancellationToken::new();

        let driver = Driver {
            engine,
            handler,
            inbound: None,
            outbound: None,
        };
        let task = tokio::spawn(driver.run(byte_rx, action_rx, cancel.clone()));

        (
            Handle {
                byte_tx,
                action_tx,
                cancel,
            },
            task,
        )
    }

    #[instrument(level = Level::TRACE, skip_all, fields(role = ?self.engine.role()))]
    async fn run(
        mut self,
        mut byte_rx: Receiver<u8>,
        mut action_rx: UnboundedReceiver<Action>,
        cancel: CancellationToken,
    ) -> Result<()> {
        trace!("driver starting");

        // Offer discipline: the initial advertisements go out before any
        // inbound byte is processed.
        self.engine.start()?;
        self.pump().await?;

        loop {
            let flow = select! {
                () = cancel.cancelled() => {
                    trace!("driver cancelled");
                    ControlFlow::Break(None)
                }
                byte = byte_rx.recv() => match byte {
                    Some(byte) => self.ingest(byte).await,
                    None => {
                        trace!("ingress closed");
                        ControlFlow::Break(None)
                    }
                },
                action = action_rx.recv() => match action {
                    Some(action) => self.handle_action(action).await,
                    None => ControlFlow::Break(None),
                },
            };
            match flow {
                ControlFlow::Continue(()) => {}
                ControlFlow::Break(None) => break,
                ControlFlow::Break(Some(err)) => {
                    error!("driver loop error: {err}");
                    return Err(err);
                }
            }
        }
        trace!("driver finished");
        Ok(())
    }

    async fn ingest(&mut self, byte: u8) -> ControlFlow<Option<Error>> {
        let plain = match self.inbound.as_mut() {
            Some(decompressor) => match decompressor.feed(&[byte]) {
                Ok(plain) => plain,
                Err(err) => {
                    self.disable_inbound_compression(err);
                    return match self.pump().await {
                        Ok(()) => ControlFlow::Continue(()),
                        Err(err) => ControlFlow::Break(Some(err)),
                    };
                }
            },
            None => vec![byte],
        };
        for byte in plain {
            if let Err(err) = self.engine.receive(byte) {
                return ControlFlow::Break(Some(err));
            }
            if let Err(err) = self.pump().await {
                return ControlFlow::Break(Some(err));
            }
        }
        ControlFlow::Continue(())
    }

    async fn handle_action(&mut self, action: Action) -> ControlFlow<Option<Error>> {
        let res = match action {
            Action::Disconnect => return ControlFlow::Break(None),
            Action::SendLine(line) => {
                self.engine.send_line(&line);
                Ok(())
            }
            Action::Gmcp { package, json } => self.engine.send_gmcp(&package, &json),
            Action::Msdp { name, value } => self.engine.send_msdp(&name, &value),
            Action::MsdpUpdate { name, value } => self.engine.msdp_update(name, value),
            Action::Prompt => {
                self.engine.send_prompt();
                Ok(())
            }
            Action::RequestCharset => {
                self.engine.request_charset();
                Ok(())
            }
        };
        if let Err(err) = res {
            return ControlFlow::Break(Some(err));
        }
        match self.pump().await {
            Ok(()) => ControlFlow::Continue(()),
            Err(err) => ControlFlow::Break(Some(err)),
        }
    }

    /// Drain engine events into handler callbacks, in production order.
    /// Callbacks may queue further sends on the engine; those drain too.
    async fn pump(&mut self) -> Result<()> {
        while let Some(event) = self.engine.pop_event() {
            self.dispatch(event).await?;
        }
        Ok(())
    }

    async fn dispatch(&mut self, event: Event) -> Result<()> {
        match event {
            Event::Negotiate(bytes) => {
                let bytes = match self.outbound.as_mut() {
                    Some(compressor) => compressor.push(&bytes)?,
                    None => bytes,
                };
                self.handler.negotiate(bytes).await?;
            }
            Event::Line { bytes, encoding } => {
                self.handler.submit(bytes, encoding, &mut self.engine).await?;
            }
            Event::UserByte { byte, encoding } => {
                self.handler.per_byte(byte, encoding).await?;
            }
            Event::Naws { width, height } => self.handler.on_naws(height, width).await,
            Event::TerminalType { types, latest } => {
                self.handler.on_ttype(&types, &latest).await;
            }
            Event::Gmcp { package, json } => self.handler.on_gmcp(&package, &json).await,
            Event::Msdp { json } => {
                self.handler.on_msdp(&mut self.engine, &json).await;
            }
            Event::Mssp(config) => self.handler.on_mssp(&config).await,
            Event::CharsetChanged(encoding) => {
                self.handler.on_charset_change(encoding).await;
            }
            Event::Prompt => self.handler.on_prompt().await,
            Event::Echo { enabled } => self.handler.on_echo(enabled).await,
            Event::Compression { direction, active } => {
                match (direction, active) {
                    (Direction::Inbound, true) => self.inbound = Some(Decompressor::new()),
                    (Direction::Inbound, false) => self.inbound = None,
                    (Direction::Outbound, true) => self.outbound = Some(Compressor::new()),
                    (Direction::Outbound, false) => self.outbound = None,
                }
                self.handler.on_compression(direction, active).await;
            }
            Event::Authentication { payload } => {
                self.handler.on_authentication(&payload).await;
            }
            Event::Encryption { payload } => self.handler.on_encryption(&payload).await,
            Event::XDisplay { display } => self.handler.on_xdisploc(&display).await,
            Event::TerminalSpeed { transmit, receive } => {
                self.handler.on_tspeed(&transmit, &receive).await;
            }
            Event::Environ { entries } => self.handler.on_environ(&entries).await,
            Event::LineMode { mask } => self.handler.on_linemode(mask).await,
            Event::FlowControl { action } => self.handler.on_flowcontrol(action).await,
        }
        Ok(())
    }

    /// A broken zlib stream disables MCCP for the rest of the connection:
    /// log it, drop the splice, and send the standard refusal for whichever
    /// option carried the compression.
    fn disable_inbound_compression(&mut self, err: Error) {
        warn!(%err, "inbound decompression failed; disabling MCCP");
        self.inbound = None;
        let refusal = match self.engine.role() {
            Role::Client => self
                .engine
                .opts
                .request_disable(TelnetOption::Mccp2, Side::Remote),
            Role::Server => self
                .engine
                .opts
                .request_disable(TelnetOption::Mccp3, Side::Local),
        };
        if let Some(refusal) = refusal {
            self.engine.send_negotiation(refusal);
        }
    }
}
