//! Authentication (RFC 2941) and Encryption (RFC 2946) with the null
//! default: any challenge is answered with the NULL type, and the raw body
//! is surfaced so a real mechanism can be layered on by the application.
//!
//! The engine only frames these bodies; it derives no key material.

use tokio_util::bytes::Bytes;

use crate::engine::{Engine, Event, Role};
use crate::machine::Table;
use crate::negotiation::Side;
use crate::options::{register_negotiation, register_subnegotiation, OptionHandler};
use crate::telnet::{subneg, TelnetOption};
use crate::Result;

pub(crate) struct Authentication;

impl OptionHandler for Authentication {
    fn option(&self) -> TelnetOption {
        TelnetOption::Authentication
    }

    fn sides(&self, role: Role) -> (bool, bool) {
        match role {
            Role::Server => (false, true),
            Role::Client => (true, false),
        }
    }

    fn offer(&self, role: Role) -> Option<Side> {
        (role == Role::Server).then_some(Side::Remote)
    }

    fn configure(&self, table: &mut Table, _role: Role) {
        register_negotiation(table, self.option());
        register_subnegotiation(table, self.option());
    }

    fn on_message(&self, engine: &mut Engine, body: Bytes) -> Result<()> {
        // SEND <type-pair-list>: decline with the NULL type pair.
        if body.first() == Some(&subneg::SEND) {
            engine.send_subnegotiation(
                TelnetOption::Authentication,
                &[subneg::IS, subneg::AUTH_NULL, 0],
            );
        }
        engine.push_event(Event::Authentication { payload: body });
        Ok(())
    }
}

pub(crate) struct Encryption;

impl OptionHandler for Encryption {
    fn option(&self) -> TelnetOption {
        TelnetOption::Encryption
    }

    fn sides(&self, role: Role) -> (bool, bool) {
        match role {
            Role::Server => (false, true),
            Role::Client => (true, false),
        }
    }

    fn offer(&self, role: Role) -> Option<Side> {
        (role == Role::Server).then_some(Side::Remote)
    }

    fn configure(&self, table: &mut Table, _role: Role) {
        register_negotiation(table, self.option());
        register_subnegotiation(table, self.option());
    }

    fn on_message(&self, engine: &mut Engine, body: Bytes) -> Result<()> {
        // SUPPORT <type-list>: decline with IS NULL.
        if body.first() == Some(&ENCRYPT_SUPPORT) {
            engine.send_subnegotiation(
                TelnetOption::Encryption,
                &[subneg::IS, subneg::AUTH_NULL],
            );
        }
        engine.push_event(Event::Encryption { payload: body });
        Ok(())
    }
}

/// RFC 2946 SUPPORT command code.
const ENCRYPT_SUPPORT: u8 = 1;
