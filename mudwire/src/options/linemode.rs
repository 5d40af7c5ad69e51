//! Linemode (RFC 1184), MODE subnegotiation only.
//!
//! The default posture is server-managed editing: the server DOes the
//! option and acknowledges acceptable MODE proposals by echoing the mask
//! with the ACK bit set. SLC and FORWARDMASK suboptions are consumed but not
//! interpreted.

use tokio_util::bytes::Bytes;
use tracing::{debug, warn};

use crate::engine::{Engine, Event, Role};
use crate::machine::Table;
use crate::negotiation::Side;
use crate::options::{register_negotiation, register_subnegotiation, OptionHandler};
use crate::telnet::{subneg, TelnetOption};
use crate::Result;

pub(crate) struct LineMode;

impl OptionHandler for LineMode {
    fn option(&self) -> TelnetOption {
        TelnetOption::LineMode
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
        match body.first() {
            Some(&subneg::LINEMODE_MODE) => {
                let Some(&mask) = body.get(1) else {
                    warn!("LINEMODE MODE without a mask byte");
                    return Ok(());
                };
                // A proposal (no ACK bit) gets acknowledged; an ACK is the
                // end of the exchange.
                if mask & subneg::LINEMODE_MODE_ACK == 0 {
                    engine.send_subnegotiation(
                        TelnetOption::LineMode,
                        &[subneg::LINEMODE_MODE, mask | subneg::LINEMODE_MODE_ACK],
                    );
                }
                engine.push_event(Event::LineMode { mask });
            }
            other => {
                debug!(suboption = ?other, "ignoring LINEMODE suboption");
            }
        }
        Ok(())
    }
}
