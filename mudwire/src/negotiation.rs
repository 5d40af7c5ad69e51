//! Option negotiation bookkeeping: which options each side supports, which
//! are currently enabled, and which we have offered and are waiting to hear
//! back about.
//!
//! The pending flags are what keep the exchange loop-free: an option we
//! offered unsolicited is acknowledged silently instead of being re-offered
//! when the peer agrees.

use std::fmt::{Debug, Formatter};

use crate::telnet::{Negotiation, TelnetOption};

/// Which end of the connection an option applies to.
///
/// `Local` options are performed by this engine (we say WILL/WONT about
/// them); `Remote` options are performed by the peer (we say DO/DONT).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Local,
    Remote,
}

/// An enable/disable edge produced by a negotiation exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Edge {
    Enabled(Side),
    Disabled(Side),
}

/// What a received WILL/WONT/DO/DONT calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Outcome {
    /// The counter-negotiation to send, if any.
    pub(crate) reply: Option<Negotiation>,
    /// The state change to notify the option handler about, if any.
    pub(crate) edge: Option<Edge>,
}

impl Outcome {
    const SILENT: Outcome = Outcome {
        reply: None,
        edge: None,
    };
}

/// A table of options and their negotiated state, indexed by option code.
#[derive(Clone, PartialEq, Eq)]
pub(crate) struct Table {
    options: [Entry; TABLE_SIZE],
}

impl Default for Table {
    fn default() -> Self {
        Self {
            options: [Entry::default(); TABLE_SIZE],
        }
    }
}

impl Table {
    /// Declare that `side` of this connection performs `opt`.
    pub(crate) fn set_support(&mut self, opt: TelnetOption, side: Side) {
        self.entry_mut(opt.byte()).set_support(side);
    }

    pub(crate) fn enabled(&self, opt: TelnetOption, side: Side) -> bool {
        self.entry(opt.byte()).enabled(side)
    }

    /// Ask to enable an option unsolicited. Returns the negotiation to send,
    /// or `None` when the option is already enabled or pending.
    pub(crate) fn request_enable(
        &mut self,
        opt: TelnetOption,
        side: Side,
    ) -> Option<Negotiation> {
        let entry = self.entry_mut(opt.byte());
        if entry.enabled(side) || entry.pending(side) {
            return None;
        }
        entry.set_pending(side);
        Some(match side {
            Side::Local => Negotiation::Will(opt.byte()),
            Side::Remote => Negotiation::Do(opt.byte()),
        })
    }

    /// Ask to disable an enabled option. Returns the negotiation to send.
    pub(crate) fn request_disable(
        &mut self,
        opt: TelnetOption,
        side: Side,
    ) -> Option<Negotiation> {
        let entry = self.entry_mut(opt.byte());
        if !entry.enabled(side) {
            return None;
        }
        entry.clear_enabled(side);
        Some(match side {
            Side::Local => Negotiation::Wont(opt.byte()),
            Side::Remote => Negotiation::Dont(opt.byte()),
        })
    }

    /// Peer sent `IAC WILL <opt>`: it wants to perform the option.
    pub(crate) fn peer_will(&mut self, opt: TelnetOption) -> Outcome {
        let byte = opt.byte();
        let entry = self.entry_mut(byte);
        if entry.pending(Side::Remote) {
            // Agreement to our earlier DO; no reply or we would loop.
            entry.clear_pending(Side::Remote);
            entry.set_enabled(Side::Remote);
            return Outcome {
                reply: None,
                edge: Some(Edge::Enabled(Side::Remote)),
            };
        }
        if entry.enabled(Side::Remote) {
            return Outcome::SILENT;
        }
        if entry.support(Side::Remote) {
            entry.set_enabled(Side::Remote);
            return Outcome {
                reply: Some(Negotiation::Do(byte)),
                edge: Some(Edge::Enabled(Side::Remote)),
            };
        }
        Outcome {
            reply: Some(Negotiation::Dont(byte)),
            edge: None,
        }
    }

    /// Peer sent `IAC WONT <opt>`: it refuses or stops performing the option.
    pub(crate) fn peer_wont(&mut self, opt: TelnetOption) -> Outcome {
        let byte = opt.byte();
        let entry = self.entry_mut(byte);
        if entry.pending(Side::Remote) {
            // Refusal of our earlier DO; the option never came up.
            entry.clear_pending(Side::Remote);
            return Outcome::SILENT;
        }
        if entry.enabled(Side::Remote) {
            entry.clear_enabled(Side::Remote);
            return Outcome {
                reply: Some(Negotiation::Dont(byte)),
                edge: Some(Edge::Disabled(Side::Remote)),
            };
        }
        Outcome::SILENT
    }

    /// Peer sent `IAC DO <opt>`: it wants us to perform the option.
    pub(crate) fn peer_do(&mut self, opt: TelnetOption) -> Outcome {
        let byte = opt.byte();
        let entry = self.entry_mut(byte);
        if entry.pending(Side::Local) {
            entry.clear_pending(Side::Local);
            entry.set_enabled(Side::Local);
            return Outcome {
                reply: None,
                edge: Some(Edge::Enabled(Side::Local)),
            };
        }
        if entry.enabled(Side::Local) {
            return Outcome::SILENT;
        }
        if entry.support(Side::Local) {
            entry.set_enabled(Side::Local);
            return Outcome {
                reply: Some(Negotiation::Will(byte)),
                edge: Some(Edge::Enabled(Side::Local)),
            };
        }
        Outcome {
            reply: Some(Negotiation::Wont(byte)),
            edge: None,
        }
    }

    /// Peer sent `IAC DONT <opt>`: it wants us to stop performing the option.
    pub(crate) fn peer_dont(&mut self, opt: TelnetOption) -> Outcome {
        let byte = opt.byte();
        let entry = self.entry_mut(byte);
        if entry.pending(Side::Local) {
            entry.clear_pending(Side::Local);
            return Outcome::SILENT;
        }
        if entry.enabled(Side::Local) {
            entry.clear_enabled(Side::Local);
            return Outcome {
                reply: Some(Negotiation::Wont(byte)),
                edge: Some(Edge::Disabled(Side::Local)),
            };
        }
        Outcome::SILENT
    }

    fn entry(&self, opt: u8) -> &Entry {
        &self.options[opt as usize]
    }

    fn entry_mut(&mut self, opt: u8) -> &mut Entry {
        &mut self.options[opt as usize]
    }
}

impl Debug for Table {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        let mut map = f.debug_map();
        for (code, entry) in self.options.iter().enumerate() {
            if entry.0 != 0 {
                map.entry(&code, entry);
            }
        }
        map.finish()
    }
}

#[derive(Default, Clone, Copy, PartialEq, Eq, Ord, PartialOrd, Hash)]
struct Entry(u8);

impl Entry {
    /// We are able to perform the option.
    const SUPPORT_LOCAL: u8 = 1;
    /// The peer is allowed to perform the option.
    const SUPPORT_REMOTE: u8 = 1 << 1;
    /// The option is currently enabled on our side.
    const LOCAL_STATE: u8 = 1 << 2;
    /// The option is currently enabled on the peer's side.
    const REMOTE_STATE: u8 = 1 << 3;
    /// We sent an unsolicited WILL and await DO/DONT.
    const PENDING_LOCAL: u8 = 1 << 4;
    /// We sent an unsolicited DO and await WILL/WONT.
    const PENDING_REMOTE: u8 = 1 << 5;

    fn support(self, side: Side) -> bool {
        self.0 & Self::support_bit(side) != 0
    }

    fn set_support(&mut self, side: Side) {
        self.0 |= Self::support_bit(side);
    }

    fn enabled(self, side: Side) -> bool {
        self.0 & Self::state_bit(side) != 0
    }

    fn set_enabled(&mut self, side: Side) {
        self.0 |= Self::state_bit(side);
    }

    fn clear_enabled(&mut self, side: Side) {
        self.0 &= !Self::state_bit(side);
    }

    fn pending(self, side: Side) -> bool {
        self.0 & Self::pending_bit(side) != 0
    }

    fn set_pending(&mut self, side: Side) {
        self.0 |= Self::pending_bit(side);
    }

    fn clear_pending(&mut self, side: Side) {
        self.0 &= !Self::pending_bit(side);
    }

    fn support_bit(side: Side) -> u8 {
        match side {
            Side::Local => Self::SUPPORT_LOCAL,
            Side::Remote => Self::SUPPORT_REMOTE,
        }
    }

    fn state_bit(side: Side) -> u8 {
        match side {
            Side::Local => Self::LOCAL_STATE,
            Side::Remote => Self::REMOTE_STATE,
        }
    }

    fn pending_bit(side: Side) -> u8 {
        match side {
            Side::Local => Self::PENDING_LOCAL,
            Side::Remote => Self::PENDING_REMOTE,
        }
    }
}

impl Debug for Entry {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Entry")
            .field("local_support", &self.support(Side::Local))
            .field("local_enabled", &self.enabled(Side::Local))
            .field("remote_support", &self.support(Side::Remote))
            .field("remote_enabled", &self.enabled(Side::Remote))
            .field("pending_local", &self.pending(Side::Local))
            .field("pending_remote", &self.pending(Side::Remote))
            .finish()
    }
}

const TABLE_SIZE: usize = 1 + u8::MAX as usize;

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn unsupported_will_is_refused() {
        let mut table = Table::default();
        let outcome = table.peer_will(TelnetOption::Gmcp);
        assert_eq!(outcome.reply, Some(Negotiation::Dont(201)));
        assert_eq!(outcome.edge, None);
    }

    #[test]
    fn supported_do_enables_once() {
        let mut table = Table::default();
        table.set_support(TelnetOption::Echo, Side::Local);

        let first = table.peer_do(TelnetOption::Echo);
        assert_eq!(first.reply, Some(Negotiation::Will(1)));
        assert_eq!(first.edge, Some(Edge::Enabled(Side::Local)));
        assert!(table.enabled(TelnetOption::Echo, Side::Local));

        // A duplicate DO is acknowledged silently.
        let second = table.peer_do(TelnetOption::Echo);
        assert_eq!(second.reply, None);
        assert_eq!(second.edge, None);
    }

    #[test]
    fn offered_option_is_not_re_offered() {
        let mut table = Table::default();
        table.set_support(TelnetOption::Mssp, Side::Local);

        let offer = table.request_enable(TelnetOption::Mssp, Side::Local);
        assert_eq!(offer, Some(Negotiation::Will(70)));
        // Re-requesting while pending produces nothing.
        assert_eq!(table.request_enable(TelnetOption::Mssp, Side::Local), None);

        let outcome = table.peer_do(TelnetOption::Mssp);
        assert_eq!(outcome.reply, None, "agreement must not echo a second WILL");
        assert_eq!(outcome.edge, Some(Edge::Enabled(Side::Local)));
    }

    #[test]
    fn refusal_of_offer_is_silent() {
        let mut table = Table::default();
        table.set_support(TelnetOption::Naws, Side::Remote);

        assert_eq!(
            table.request_enable(TelnetOption::Naws, Side::Remote),
            Some(Negotiation::Do(31))
        );
        let outcome = table.peer_wont(TelnetOption::Naws);
        assert_eq!(outcome, Outcome::SILENT);
        assert!(!table.enabled(TelnetOption::Naws, Side::Remote));
    }

    #[test]
    fn disable_round_trip() {
        let mut table = Table::default();
        table.set_support(TelnetOption::Echo, Side::Local);
        table.peer_do(TelnetOption::Echo);

        let outcome = table.peer_dont(TelnetOption::Echo);
        assert_eq!(outcome.reply, Some(Negotiation::Wont(1)));
        assert_eq!(outcome.edge, Some(Edge::Disabled(Side::Local)));
        assert!(!table.enabled(TelnetOption::Echo, Side::Local));
    }
}
