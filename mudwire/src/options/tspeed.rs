//! Terminal Speed (RFC 1079): a SEND/IS exchange carrying a
//! `transmit,receive` tuple.

use tokio_util::bytes::Bytes;
use tracing::warn;

use crate::engine::{Engine, Event, Role};
use crate::machine::Table;
use crate::negotiation::Side;
use crate::options::{register_negotiation, register_subnegotiation, OptionHandler};
use crate::telnet::{subneg, TelnetOption};
use crate::Result;

pub(crate) struct TerminalSpeed;

impl OptionHandler for TerminalSpeed {
    fn option(&self) -> TelnetOption {
        TelnetOption::TerminalSpeed
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

    fn on_enabled(&self, engine: &mut Engine, side: Side) -> Result<()> {
        if side == Side::Remote {
            engine.send_subnegotiation(TelnetOption::TerminalSpeed, &[subneg::SEND]);
        }
        Ok(())
    }

    fn on_message(&self, engine: &mut Engine, body: Bytes) -> Result<()> {
        match body.first() {
            Some(&subneg::SEND) => {
                let (transmit, receive) = engine.config.terminal_speed.clone();
                let mut payload = vec![subneg::IS];
                payload.extend_from_slice(format!("{transmit},{receive}").as_bytes());
                engine.send_subnegotiation(TelnetOption::TerminalSpeed, &payload);
            }
            Some(&subneg::IS) => {
                let text = String::from_utf8_lossy(&body[1..]).to_string();
                let (transmit, receive) = match text.split_once(',') {
                    Some((tx, rx)) => (tx.to_string(), rx.to_string()),
                    None => (text, String::new()),
                };
                engine.push_event(Event::TerminalSpeed { transmit, receive });
            }
            other => warn!(verb = ?other, "unrecognised TSPEED subnegotiation"),
        }
        Ok(())
    }
}
