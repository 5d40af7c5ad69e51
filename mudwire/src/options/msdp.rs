//! MSDP option handler: parses inbound variable trees, serialises them to
//! interchange JSON, and (server side) runs client requests against the
//! configured [`crate::msdp::ServerModel`].

use tokio_util::bytes::Bytes;
use tracing::warn;

use crate::engine::{Engine, Event, Role};
use crate::machine::Table;
use crate::msdp::MsdpValue;
use crate::negotiation::Side;
use crate::options::{register_negotiation, register_subnegotiation, OptionHandler};
use crate::telnet::TelnetOption;
use crate::Result;

pub(crate) struct Msdp;

impl OptionHandler for Msdp {
    fn option(&self) -> TelnetOption {
        TelnetOption::Msdp
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

    fn on_message(&self, engine: &mut Engine, body: Bytes) -> Result<()> {
        let value = match crate::msdp::parse(&body, engine.current_encoding()) {
            Ok(value) => value,
            Err(err) => {
                warn!(%err, "discarding malformed MSDP body");
                return Ok(());
            }
        };
        deliver(engine, &value)
    }
}

/// Shared with the GMCP handler's "MSDP" package rerouting: run the server
/// model over the request, then deliver the interchange JSON.
pub(crate) fn deliver(engine: &mut Engine, value: &MsdpValue) -> Result<()> {
    if engine.role() == Role::Server {
        if let Some(model) = engine.msdp_model.as_mut() {
            match model.interpret(value) {
                Ok(replies) => {
                    for (name, value) in replies {
                        engine.send_msdp(&name, &value)?;
                    }
                }
                Err(err) => warn!(%err, "discarding malformed MSDP request"),
            }
        }
    }
    engine.push_event(Event::Msdp {
        json: value.to_json().to_string(),
    });
    Ok(())
}
