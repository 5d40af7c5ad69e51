//! Echo (RFC 857). Off by default; agreement changes surface as events so
//! the application can toggle local echo (password entry being the usual
//! customer).

use crate::engine::{Engine, Event, Role};
use crate::machine::Table;
use crate::negotiation::Side;
use crate::options::{register_negotiation, OptionHandler};
use crate::telnet::TelnetOption;
use crate::Result;

pub(crate) struct Echo;

impl OptionHandler for Echo {
    fn option(&self) -> TelnetOption {
        TelnetOption::Echo
    }

    fn sides(&self, role: Role) -> (bool, bool) {
        match role {
            Role::Server => (true, false),
            Role::Client => (false, true),
        }
    }

    fn configure(&self, table: &mut Table, _role: Role) {
        register_negotiation(table, self.option());
    }

    fn on_enabled(&self, engine: &mut Engine, _side: Side) -> Result<()> {
        engine.push_event(Event::Echo { enabled: true });
        Ok(())
    }

    fn on_disabled(&self, engine: &mut Engine, _side: Side) -> Result<()> {
        engine.push_event(Event::Echo { enabled: false });
        Ok(())
    }
}
