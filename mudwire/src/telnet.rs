//! Telnet wire constants and low-level framing helpers.
//!
//! Byte values follow [RFC 854](https://tools.ietf.org/html/rfc854) and the
//! option RFCs referenced on each constant. Everything here is plain data;
//! the state machine in [`crate::machine`] decides what the bytes mean in
//! context.

use std::fmt;

use tokio_util::bytes::{BufMut, Bytes, BytesMut};

/// IAC prefixed command codes.
pub mod command {
    /// "Interpret As Command" — starts every Telnet command sequence.
    pub const IAC: u8 = 255;
    /// Indicates the demand that the other party stop performing an option.
    pub const DONT: u8 = 254;
    /// Indicates the request that the other party perform an option.
    pub const DO: u8 = 253;
    /// Indicates the refusal to perform an option.
    pub const WONT: u8 = 252;
    /// Indicates the desire to begin performing an option.
    pub const WILL: u8 = 251;
    /// Subnegotiation Begin.
    pub const SB: u8 = 250;
    /// Go Ahead — end-of-turn / prompt boundary.
    pub const GA: u8 = 249;
    /// No Operation.
    pub const NOP: u8 = 241;
    /// Subnegotiation End.
    pub const SE: u8 = 240;
    /// End of Record — prompt boundary used with [`super::option::EOR`].
    pub const EOR: u8 = 239;
}

/// Negotiable option codes.
pub mod option {
    /// Echo — <https://datatracker.ietf.org/doc/rfc857/>
    pub const ECHO: u8 = 1;
    /// Suppress Go Ahead — <https://datatracker.ietf.org/doc/rfc858/>
    pub const SGA: u8 = 3;
    /// Status — <https://datatracker.ietf.org/doc/rfc859/>
    pub const STATUS: u8 = 5;
    /// Terminal Type — <https://datatracker.ietf.org/doc/rfc1091/>
    pub const TTYPE: u8 = 24;
    /// End of Record negotiation — <https://tintin.mudhalla.net/protocols/eor/>
    pub const EOR: u8 = 25;
    /// Negotiate About Window Size — <https://datatracker.ietf.org/doc/rfc1073/>
    pub const NAWS: u8 = 31;
    /// Terminal Speed — <https://datatracker.ietf.org/doc/rfc1079/>
    pub const TSPEED: u8 = 32;
    /// Remote Flow Control — <https://datatracker.ietf.org/doc/rfc1372/>
    pub const FLOWCONTROL: u8 = 33;
    /// Linemode — <https://datatracker.ietf.org/doc/rfc1184/>
    pub const LINEMODE: u8 = 34;
    /// X Display Location — <https://datatracker.ietf.org/doc/rfc1096/>
    pub const XDISPLOC: u8 = 35;
    /// Environment (old) — <https://datatracker.ietf.org/doc/rfc1408/>
    pub const ENVIRON: u8 = 36;
    /// Authentication — <https://datatracker.ietf.org/doc/rfc2941/>
    pub const AUTHENTICATION: u8 = 37;
    /// Encryption — <https://datatracker.ietf.org/doc/rfc2946/>
    pub const ENCRYPT: u8 = 38;
    /// New Environment — <https://datatracker.ietf.org/doc/rfc1572/>
    pub const NEW_ENVIRON: u8 = 39;
    /// Charset — <https://datatracker.ietf.org/doc/rfc2066/>
    pub const CHARSET: u8 = 42;
    /// Mud Server Data Protocol — <https://tintin.mudhalla.net/protocols/msdp/>
    pub const MSDP: u8 = 69;
    /// Mud Server Status Protocol — <https://tintin.mudhalla.net/protocols/mssp/>
    pub const MSSP: u8 = 70;
    /// Mud Client Compression Protocol v2 — <https://tintin.mudhalla.net/protocols/mccp/>
    pub const MCCP2: u8 = 86;
    /// Mud Client Compression Protocol v3 — <https://tintin.mudhalla.net/protocols/mccp/>
    pub const MCCP3: u8 = 87;
    /// Generic Mud Communication Protocol — <https://tintin.mudhalla.net/protocols/gmcp/>
    pub const GMCP: u8 = 201;
}

/// Option-internal subnegotiation codes.
///
/// These only have meaning inside an `IAC SB <option> … IAC SE` body; outside
/// of one the same byte values are ordinary data or option codes.
pub mod subneg {
    /// TTYPE/TSPEED/XDISPLOC/ENVIRON "here is my value".
    pub const IS: u8 = 0;
    /// TTYPE/TSPEED/XDISPLOC/ENVIRON "send me your value".
    pub const SEND: u8 = 1;
    /// ENVIRON unsolicited update.
    pub const INFO: u8 = 2;

    /// CHARSET request carrying a separated list of names.
    pub const CHARSET_REQUEST: u8 = 1;
    /// CHARSET acceptance carrying the chosen name.
    pub const CHARSET_ACCEPTED: u8 = 2;
    /// CHARSET rejection, empty body.
    pub const CHARSET_REJECTED: u8 = 3;

    /// MSDP variable name marker.
    pub const MSDP_VAR: u8 = 1;
    /// MSDP value marker.
    pub const MSDP_VAL: u8 = 2;
    pub const MSDP_TABLE_OPEN: u8 = 3;
    pub const MSDP_TABLE_CLOSE: u8 = 4;
    pub const MSDP_ARRAY_OPEN: u8 = 5;
    pub const MSDP_ARRAY_CLOSE: u8 = 6;

    /// MSSP variable name marker.
    pub const MSSP_VAR: u8 = 1;
    /// MSSP value marker.
    pub const MSSP_VAL: u8 = 2;

    /// Authentication/Encryption NULL type for the default reject reply.
    pub const AUTH_NULL: u8 = 0;

    /// ENVIRON well-known variable marker.
    pub const ENV_VAR: u8 = 0;
    /// ENVIRON value marker.
    pub const ENV_VALUE: u8 = 1;
    /// ENVIRON escape for a literal marker byte.
    pub const ENV_ESC: u8 = 2;
    /// ENVIRON user-defined variable marker.
    pub const ENV_USERVAR: u8 = 3;

    /// LINEMODE MODE suboption.
    pub const LINEMODE_MODE: u8 = 1;
    /// LINEMODE MODE mask bit: client performs editing.
    pub const LINEMODE_EDIT: u8 = 1;
    /// LINEMODE MODE mask bit: acknowledgement of a mode change.
    pub const LINEMODE_MODE_ACK: u8 = 4;

    /// Flow control off.
    pub const FLOW_OFF: u8 = 0;
    /// Flow control on.
    pub const FLOW_ON: u8 = 1;
    /// Any character restarts output.
    pub const FLOW_RESTART_ANY: u8 = 2;
    /// Only XON restarts output.
    pub const FLOW_RESTART_XON: u8 = 3;
}

/// Carriage return, swallowed by the line deframer.
pub const CR: u8 = 0x0D;
/// Line feed, the flush trigger for buffered user data.
pub const LF: u8 = 0x0A;

/// A recognised Telnet option.
///
/// The engine only builds state-machine structure for options it knows; any
/// other option code is handled generically by the safety net.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TelnetOption {
    Echo,
    SuppressGoAhead,
    Status,
    TerminalType,
    EndOfRecord,
    Naws,
    TerminalSpeed,
    FlowControl,
    LineMode,
    XDisplayLocation,
    Environ,
    Authentication,
    Encryption,
    NewEnviron,
    Charset,
    Msdp,
    Mssp,
    Mccp2,
    Mccp3,
    Gmcp,
}

impl TelnetOption {
    /// All options the engine recognises, in option-code order.
    pub const ALL: [TelnetOption; 20] = [
        TelnetOption::Echo,
        TelnetOption::SuppressGoAhead,
        TelnetOption::Status,
        TelnetOption::TerminalType,
        TelnetOption::EndOfRecord,
        TelnetOption::Naws,
        TelnetOption::TerminalSpeed,
        TelnetOption::FlowControl,
        TelnetOption::LineMode,
        TelnetOption::XDisplayLocation,
        TelnetOption::Environ,
        TelnetOption::Authentication,
        TelnetOption::Encryption,
        TelnetOption::NewEnviron,
        TelnetOption::Charset,
        TelnetOption::Msdp,
        TelnetOption::Mssp,
        TelnetOption::Mccp2,
        TelnetOption::Mccp3,
        TelnetOption::Gmcp,
    ];

    #[must_use]
    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            option::ECHO => TelnetOption::Echo,
            option::SGA => TelnetOption::SuppressGoAhead,
            option::STATUS => TelnetOption::Status,
            option::TTYPE => TelnetOption::TerminalType,
            option::EOR => TelnetOption::EndOfRecord,
            option::NAWS => TelnetOption::Naws,
            option::TSPEED => TelnetOption::TerminalSpeed,
            option::FLOWCONTROL => TelnetOption::FlowControl,
            option::LINEMODE => TelnetOption::LineMode,
            option::XDISPLOC => TelnetOption::XDisplayLocation,
            option::ENVIRON => TelnetOption::Environ,
            option::AUTHENTICATION => TelnetOption::Authentication,
            option::ENCRYPT => TelnetOption::Encryption,
            option::NEW_ENVIRON => TelnetOption::NewEnviron,
            option::CHARSET => TelnetOption::Charset,
            option::MSDP => TelnetOption::Msdp,
            option::MSSP => TelnetOption::Mssp,
            option::MCCP2 => TelnetOption::Mccp2,
            option::MCCP3 => TelnetOption::Mccp3,
            option::GMCP => TelnetOption::Gmcp,
            _ => return None,
        })
    }

    #[must_use]
    pub fn byte(self) -> u8 {
        match self {
            TelnetOption::Echo => option::ECHO,
            TelnetOption::SuppressGoAhead => option::SGA,
            TelnetOption::Status => option::STATUS,
            TelnetOption::TerminalType => option::TTYPE,
            TelnetOption::EndOfRecord => option::EOR,
            TelnetOption::Naws => option::NAWS,
            TelnetOption::TerminalSpeed => option::TSPEED,
            TelnetOption::FlowControl => option::FLOWCONTROL,
            TelnetOption::LineMode => option::LINEMODE,
            TelnetOption::XDisplayLocation => option::XDISPLOC,
            TelnetOption::Environ => option::ENVIRON,
            TelnetOption::Authentication => option::AUTHENTICATION,
            TelnetOption::Encryption => option::ENCRYPT,
            TelnetOption::NewEnviron => option::NEW_ENVIRON,
            TelnetOption::Charset => option::CHARSET,
            TelnetOption::Msdp => option::MSDP,
            TelnetOption::Mssp => option::MSSP,
            TelnetOption::Mccp2 => option::MCCP2,
            TelnetOption::Mccp3 => option::MCCP3,
            TelnetOption::Gmcp => option::GMCP,
        }
    }
}

impl fmt::Display for TelnetOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}({})", self.byte())
    }
}

/// A telnet negotiation command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Negotiation {
    /// "Indicates the desire to begin performing, or confirmation that you
    /// are now performing, the indicated option."
    Will(u8),

    /// "Indicates the refusal to perform, or continue performing, the
    /// indicated option."
    Wont(u8),

    /// "Indicates the request that the other party perform, or confirmation
    /// that you are expecting the other party to perform, the indicated
    /// option."
    Do(u8),

    /// "Indicates the demand that the other party stop performing, or
    /// confirmation that you are no longer expecting the other party to
    /// perform, the indicated option."
    Dont(u8),
}

impl Negotiation {
    #[must_use]
    pub fn option(&self) -> u8 {
        match self {
            Negotiation::Will(opt)
            | Negotiation::Wont(opt)
            | Negotiation::Do(opt)
            | Negotiation::Dont(opt) => *opt,
        }
    }

    /// The three-byte wire form of this negotiation.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let (cmd, opt) = match self {
            Negotiation::Will(opt) => (command::WILL, *opt),
            Negotiation::Wont(opt) => (command::WONT, *opt),
            Negotiation::Do(opt) => (command::DO, *opt),
            Negotiation::Dont(opt) => (command::DONT, *opt),
        };
        Bytes::from(vec![command::IAC, cmd, opt])
    }
}

/// Assemble a complete `IAC SB <opt> <payload> IAC SE` message.
///
/// The payload must already be IAC-escaped where it can contain 0xFF; see
/// [`telnet_safe`].
#[must_use]
pub fn subnegotiation(opt: u8, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(payload.len() + 5);
    buf.put_slice(&[command::IAC, command::SB, opt]);
    buf.put_slice(payload);
    buf.put_slice(&[command::IAC, command::SE]);
    buf.freeze()
}

/// Escape IAC bytes in data that is to be transmitted and treated as a
/// non-IAC sequence.
///
/// # Example
/// `[255, 1, 6, 2]` -> `[255, 255, 1, 6, 2]`
#[must_use]
pub fn telnet_safe(data: &[u8]) -> Bytes {
    let mut res = BytesMut::with_capacity(data.len());
    for byte in data {
        res.put_u8(*byte);
        if *byte == command::IAC {
            res.put_u8(command::IAC);
        }
    }
    res.freeze()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn option_round_trip() {
        for opt in TelnetOption::ALL {
            assert_eq!(TelnetOption::from_byte(opt.byte()), Some(opt));
        }
        assert_eq!(TelnetOption::from_byte(0x63), None);
    }

    #[test]
    fn negotiation_encoding() {
        assert_eq!(
            Negotiation::Wont(0x63).encode().as_ref(),
            &[command::IAC, command::WONT, 0x63]
        );
        assert_eq!(
            Negotiation::Do(option::NAWS).encode().as_ref(),
            &[command::IAC, command::DO, option::NAWS]
        );
    }

    #[test]
    fn telnet_safe_doubles_iac() {
        assert_eq!(
            telnet_safe(&[255, 1, 6, 2]).as_ref(),
            &[255, 255, 1, 6, 2]
        );
        assert_eq!(telnet_safe(&[]).as_ref(), &[] as &[u8]);
        assert_eq!(telnet_safe(&[255, 255]).as_ref(), &[255, 255, 255, 255]);
    }

    #[test]
    fn subnegotiation_framing() {
        let msg = subnegotiation(option::GMCP, b"Core.Hello {}");
        assert_eq!(&msg[..3], &[255, 250, 201]);
        assert_eq!(&msg[msg.len() - 2..], &[255, 240]);
    }
}
