//! X Display Location (RFC 1096): a SEND/IS string exchange.

use tokio_util::bytes::Bytes;
use tracing::warn;

use crate::engine::{Engine, Event, Role};
use crate::machine::Table;
use crate::negotiation::Side;
use crate::options::{register_negotiation, register_subnegotiation, OptionHandler};
use crate::telnet::{subneg, TelnetOption};
use crate::Result;

pub(crate) struct XDisplayLocation;

impl OptionHandler for XDisplayLocation {
    fn option(&self) -> TelnetOption {
        TelnetOption::XDisplayLocation
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
        // Server: ask for the display string as soon as the peer agrees.
        if side == Side::Remote {
            engine.send_subnegotiation(TelnetOption::XDisplayLocation, &[subneg::SEND]);
        }
        Ok(())
    }

    fn on_message(&self, engine: &mut Engine, body: Bytes) -> Result<()> {
        match body.first() {
            Some(&subneg::SEND) => {
                let display = engine.config.x_display.clone().unwrap_or_default();
                let mut payload = vec![subneg::IS];
                payload.extend_from_slice(display.as_bytes());
                engine.send_subnegotiation(TelnetOption::XDisplayLocation, &payload);
            }
            Some(&subneg::IS) => {
                let display = String::from_utf8_lossy(&body[1..]).to_string();
                engine.push_event(Event::XDisplay { display });
            }
            other => warn!(verb = ?other, "unrecognised XDISPLOC subnegotiation"),
        }
        Ok(())
    }
}
