use encoding_rs::Encoding;
use tokio_util::bytes::Bytes;

use crate::compress::Direction;
use crate::mssp::MsspConfig;

/// An outcome produced by feeding bytes to the engine.
///
/// The async driver maps each event to the matching [`crate::TelnetHandler`]
/// callback; synchronous embedders drain them directly with
/// [`crate::Engine::drain_events`]. Events preserve the order in which
/// transitions produced them.
#[derive(Debug)]
pub enum Event {
    /// A full line of user data arrived (terminator stripped).
    Line {
        bytes: Bytes,
        encoding: &'static Encoding,
    },

    /// One buffered user-data byte. Only produced when the builder enabled
    /// per-byte reporting.
    UserByte {
        byte: u8,
        encoding: &'static Encoding,
    },

    /// An outbound buffer to hand to the transport as one atomic write.
    Negotiate(Bytes),

    /// The peer reported its window size.
    Naws { width: u16, height: u16 },

    /// A terminal type reply was received. `types` is the list collected so
    /// far (including MTTS bitfield expansion once the cycle closes).
    TerminalType { types: Vec<String>, latest: String },

    /// A GMCP message addressed to `package`.
    Gmcp { package: String, json: String },

    /// An MSDP message (or a GMCP "MSDP" message), as interchange JSON.
    Msdp { json: String },

    /// The peer published its MSSP status.
    Mssp(MsspConfig),

    /// Charset negotiation settled on a new encoding.
    CharsetChanged(&'static Encoding),

    /// The peer marked a prompt boundary (EOR or GA).
    Prompt,

    /// Echo agreement changed.
    Echo { enabled: bool },

    /// MCCP compression state changed for one direction of the stream.
    Compression { direction: Direction, active: bool },

    /// An authentication subnegotiation body, delivered verbatim.
    Authentication { payload: Bytes },

    /// An encryption subnegotiation body, delivered verbatim.
    Encryption { payload: Bytes },

    /// The peer reported its X display string.
    XDisplay { display: String },

    /// The peer reported its terminal speed tuple.
    TerminalSpeed { transmit: String, receive: String },

    /// The peer reported environment variables.
    Environ { entries: Vec<(String, String)> },

    /// The peer proposed a line mode mask.
    LineMode { mask: u8 },

    /// The peer toggled flow control.
    FlowControl { action: FlowControlAction },
}

/// A decoded flow-control subnegotiation command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowControlAction {
    Off,
    On,
    RestartAny,
    RestartXon,
}
