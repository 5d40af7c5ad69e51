//! Remote Flow Control (RFC 1372).

use tokio_util::bytes::Bytes;
use tracing::warn;

use crate::engine::{Engine, Event, FlowControlAction, Role};
use crate::machine::Table;
use crate::negotiation::Side;
use crate::options::{register_negotiation, register_subnegotiation, OptionHandler};
use crate::telnet::{subneg, TelnetOption};
use crate::Result;

pub(crate) struct FlowControl;

impl OptionHandler for FlowControl {
    fn option(&self) -> TelnetOption {
        TelnetOption::FlowControl
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
        let action = match body.first() {
            Some(&subneg::FLOW_OFF) => FlowControlAction::Off,
            Some(&subneg::FLOW_ON) => FlowControlAction::On,
            Some(&subneg::FLOW_RESTART_ANY) => FlowControlAction::RestartAny,
            Some(&subneg::FLOW_RESTART_XON) => FlowControlAction::RestartXon,
            other => {
                warn!(command = ?other, "unrecognised FLOWCONTROL subnegotiation");
                return Ok(());
            }
        };
        engine.push_event(Event::FlowControl { action });
        Ok(())
    }
}
