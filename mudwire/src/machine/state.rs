use std::fmt;

use crate::telnet::TelnetOption;

/// A position in the composite state machine.
///
/// The frame-level states are fixed; the option-carrying variants multiply
/// out per recognised option, which is what gives the machine its hundred-plus
/// reachable positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// At rest between bytes; the start state and the recovery target.
    Accepting,

    /// Buffering user data until a line terminator flushes it.
    ReadingCharacters,

    /// A completed line is being delivered. Transient.
    Act,

    /// An IAC was seen; the next byte picks the command.
    StartNegotiation,

    /// `IAC WILL` seen; the next byte is the option code.
    Willing,

    /// `IAC WONT` seen; the next byte is the option code.
    Refusing,

    /// `IAC DO` seen; the next byte is the option code.
    Doing,

    /// `IAC DONT` seen; the next byte is the option code.
    Donting,

    /// `IAC SB` seen; the next byte is the option code.
    SubNegotiation,

    /// A subnegotiation body is complete; awaiting the closing SE.
    EndSubNegotiation,

    /// A command that needs no reaction (NOP, GA). Transient.
    DoNothing,

    /// Peer sent WILL for a claimed option. Transient; entry runs the reply
    /// policy.
    Will(TelnetOption),

    /// Peer sent WONT for a claimed option. Transient.
    Wont(TelnetOption),

    /// Peer sent DO for a claimed option. Transient.
    Do(TelnetOption),

    /// Peer sent DONT for a claimed option. Transient.
    Dont(TelnetOption),

    /// Subnegotiation opened for the option; no body byte seen yet.
    AlmostNegotiating(TelnetOption),

    /// Collecting the subnegotiation body.
    Negotiating(TelnetOption),

    /// Option-specific body interpretation in progress. A substate of
    /// [`State::Negotiating`] for the same option.
    Evaluating(TelnetOption),

    /// An IAC was seen inside the subnegotiation body.
    Escaping(TelnetOption),

    /// The body is complete and the completion action runs. Transient for
    /// most options; NAWS holds here until the closing `IAC SE`.
    Completing(TelnetOption),

    /// Peer sent WILL for an option nothing claimed; entry refuses it.
    BadWilling,

    /// Peer sent WONT for an option nothing claimed; consumed silently.
    BadRefusing,

    /// Peer sent DO for an option nothing claimed; entry refuses it.
    BadDo,

    /// Peer sent DONT for an option nothing claimed; consumed silently.
    BadDont,

    /// Swallowing the body of a subnegotiation nothing claimed.
    BadSubNegotiation,

    /// An IAC inside a swallowed subnegotiation body.
    BadSubNegotiationEscaping,
}

impl State {
    /// Whether this state is inside a subnegotiation body, where no byte may
    /// reach the user-data buffer.
    #[must_use]
    pub fn in_subnegotiation(self) -> bool {
        matches!(
            self,
            State::SubNegotiation
                | State::EndSubNegotiation
                | State::AlmostNegotiating(_)
                | State::Negotiating(_)
                | State::Evaluating(_)
                | State::Escaping(_)
                | State::Completing(_)
                | State::BadSubNegotiation
                | State::BadSubNegotiationEscaping
        )
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Will(opt) => write!(f, "Will({opt})"),
            State::Wont(opt) => write!(f, "Wont({opt})"),
            State::Do(opt) => write!(f, "Do({opt})"),
            State::Dont(opt) => write!(f, "Dont({opt})"),
            State::AlmostNegotiating(opt) => write!(f, "AlmostNegotiating({opt})"),
            State::Negotiating(opt) => write!(f, "Negotiating({opt})"),
            State::Evaluating(opt) => write!(f, "Evaluating({opt})"),
            State::Escaping(opt) => write!(f, "Escaping({opt})"),
            State::Completing(opt) => write!(f, "Completing({opt})"),
            other => write!(f, "{other:?}"),
        }
    }
}
