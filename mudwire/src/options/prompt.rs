//! EOR and Suppress-Go-Ahead: the stateless prompt-boundary flag options.
//!
//! Neither carries a subnegotiation body. Their agreement state steers
//! [`crate::Engine::send_prompt`]: `IAC EOR` when EOR is agreed, `IAC GA`
//! unless go-aheads are suppressed, otherwise silence. Inbound EOR/GA
//! commands raise the prompt event from the framing layer regardless.

use crate::engine::Role;
use crate::machine::Table;
use crate::negotiation::Side;
use crate::options::{register_negotiation, OptionHandler};
use crate::telnet::TelnetOption;

pub(crate) struct EndOfRecord;

impl OptionHandler for EndOfRecord {
    fn option(&self) -> TelnetOption {
        TelnetOption::EndOfRecord
    }

    fn sides(&self, role: Role) -> (bool, bool) {
        match role {
            Role::Server => (true, false),
            Role::Client => (false, true),
        }
    }

    fn offer(&self, role: Role) -> Option<Side> {
        (role == Role::Server).then_some(Side::Local)
    }

    fn configure(&self, table: &mut Table, _role: Role) {
        register_negotiation(table, self.option());
    }
}

pub(crate) struct SuppressGoAhead;

impl OptionHandler for SuppressGoAhead {
    fn option(&self) -> TelnetOption {
        TelnetOption::SuppressGoAhead
    }

    fn sides(&self, role: Role) -> (bool, bool) {
        match role {
            Role::Server => (true, false),
            Role::Client => (false, true),
        }
    }

    fn offer(&self, role: Role) -> Option<Side> {
        (role == Role::Server).then_some(Side::Local)
    }

    fn configure(&self, table: &mut Table, _role: Role) {
        register_negotiation(table, self.option());
    }
}
