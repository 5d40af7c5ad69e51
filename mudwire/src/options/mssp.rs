//! MSSP option handler: the server publishes its configured status payload
//! once the peer agrees; the client decodes inbound payloads into an
//! [`crate::mssp::MsspConfig`].

use tokio_util::bytes::Bytes;
use tracing::warn;

use crate::engine::{Engine, Event, Role};
use crate::machine::Table;
use crate::negotiation::Side;
use crate::options::{register_negotiation, register_subnegotiation, OptionHandler};
use crate::telnet::TelnetOption;
use crate::Result;

pub(crate) struct Mssp;

impl OptionHandler for Mssp {
    fn option(&self) -> TelnetOption {
        TelnetOption::Mssp
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
        register_subnegotiation(table, self.option());
    }

    fn on_enabled(&self, engine: &mut Engine, side: Side) -> Result<()> {
        if side != Side::Local || engine.role() != Role::Server {
            return Ok(());
        }
        let Some(config) = engine.config.mssp.clone() else {
            warn!("MSSP agreed but no config was provided");
            return Ok(());
        };
        match crate::mssp::encode(&config) {
            Ok(body) => engine.send_subnegotiation(TelnetOption::Mssp, &body),
            Err(err) => warn!(%err, "failed to encode MSSP config"),
        }
        Ok(())
    }

    fn on_message(&self, engine: &mut Engine, body: Bytes) -> Result<()> {
        match crate::mssp::decode(&body, engine.current_encoding()) {
            Ok(config) => engine.push_event(Event::Mssp(config)),
            Err(err) => warn!(%err, "discarding malformed MSSP body"),
        }
        Ok(())
    }
}
