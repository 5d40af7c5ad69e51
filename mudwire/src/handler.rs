//! The application-facing callback surface.
//!
//! One [`TelnetHandler`] per connection, driven sequentially by the
//! connection's driver task: no two callbacks for the same connection ever
//! run concurrently, and no further inbound byte is processed while a
//! callback is awaiting.

use async_trait::async_trait;
use encoding_rs::Encoding;
use tokio_util::bytes::Bytes;

use crate::compress::Direction;
use crate::engine::{Engine, FlowControlAction};
use crate::mssp::MsspConfig;
use crate::Result;

/// Callbacks invoked by the driver as the engine produces events.
///
/// `submit` and `negotiate` are the two required methods: every connection
/// delivers lines somewhere and writes negotiation buffers somewhere. The
/// rest default to no-ops.
#[async_trait]
pub trait TelnetHandler: Send {
    /// A full line of user data arrived, terminator stripped. The engine
    /// reference allows replying from inside the callback.
    async fn submit(
        &mut self,
        line: Bytes,
        encoding: &'static Encoding,
        engine: &mut Engine,
    ) -> Result<()>;

    /// Write this buffer to the transport as one atomic write.
    async fn negotiate(&mut self, bytes: Bytes) -> Result<()>;

    /// Every buffered user byte, before its line flushes. Only invoked when
    /// the builder enabled per-byte reporting.
    async fn per_byte(&mut self, _byte: u8, _encoding: &'static Encoding) -> Result<()> {
        Ok(())
    }

    /// NAWS negotiated a window size.
    async fn on_naws(&mut self, _height: u16, _width: u16) {}

    /// A terminal type reply arrived; `types` is the list so far.
    async fn on_ttype(&mut self, _types: &[String], _latest: &str) {}

    /// A GMCP message arrived for `package`.
    async fn on_gmcp(&mut self, _package: &str, _json: &str) {}

    /// An MSDP message arrived (MSDP option or GMCP "MSDP" package), as
    /// interchange JSON.
    async fn on_msdp(&mut self, _engine: &mut Engine, _json: &str) {}

    /// The peer published its MSSP status.
    async fn on_mssp(&mut self, _config: &MsspConfig) {}

    /// Charset negotiation switched the connection encoding.
    async fn on_charset_change(&mut self, _encoding: &'static Encoding) {}

    /// The peer marked a prompt boundary (EOR or GA).
    async fn on_prompt(&mut self) {}

    /// Echo agreement changed.
    async fn on_echo(&mut self, _enabled: bool) {}

    /// MCCP compression turned on or off for one direction.
    async fn on_compression(&mut self, _direction: Direction, _active: bool) {}

    /// An authentication subnegotiation body, verbatim.
    async fn on_authentication(&mut self, _payload: &[u8]) {}

    /// An encryption subnegotiation body, verbatim.
    async fn on_encryption(&mut self, _payload: &[u8]) {}

    /// The peer reported its X display string.
    async fn on_xdisploc(&mut self, _display: &str) {}

    /// The peer reported its terminal speed tuple.
    async fn on_tspeed(&mut self, _transmit: &str, _receive: &str) {}

    /// The peer reported environment variables.
    async fn on_environ(&mut self, _entries: &[(String, String)]) {}

    /// The peer proposed (or acknowledged) a line mode mask.
    async fn on_linemode(&mut self, _mask: u8) {}

    /// The peer toggled flow control.
    async fn on_flowcontrol(&mut self, _action: FlowControlAction) {}
}
