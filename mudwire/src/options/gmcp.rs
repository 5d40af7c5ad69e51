//! GMCP option handler: `<package> SP <json>` messages, with the literal
//! "MSDP" package rerouted through the MSDP pipeline.

use tokio_util::bytes::Bytes;
use tracing::warn;

use crate::engine::{Engine, Event, Role};
use crate::machine::Table;
use crate::msdp::MsdpValue;
use crate::negotiation::Side;
use crate::options::{msdp, register_negotiation, register_subnegotiation, OptionHandler};
use crate::telnet::TelnetOption;
use crate::Result;

pub(crate) struct Gmcp;

impl OptionHandler for Gmcp {
    fn option(&self) -> TelnetOption {
        TelnetOption::Gmcp
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
        // The package name runs to the first space; the rest is the payload.
        // Packages like Core.Ping legitimately arrive with no payload.
        let (package, info) = match body.iter().position(|byte| *byte == b' ') {
            Some(split) => (&body[..split], &body[split + 1..]),
            None => (&body[..], &body[..0]),
        };
        let Ok(package) = std::str::from_utf8(package) else {
            warn!("discarding GMCP message with non-ASCII package name");
            return Ok(());
        };
        let (info, _, _) = engine.current_encoding().decode(info);
        let info = info.into_owned();

        if package == "MSDP" {
            // MSDP-over-GMCP: same payload, JSON syntax. Reinterpret it
            // through the MSDP pipeline instead of surfacing a GMCP event.
            let Ok(json) = serde_json::from_str::<serde_json::Value>(&info) else {
                warn!("discarding MSDP-over-GMCP message with invalid JSON");
                return Ok(());
            };
            return msdp::deliver(engine, &MsdpValue::from_json(&json));
        }

        engine.push_event(Event::Gmcp {
            package: package.to_string(),
            json: info,
        });
        Ok(())
    }
}
