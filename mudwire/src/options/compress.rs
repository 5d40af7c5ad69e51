//! MCCP2 and MCCP3 option handlers.
//!
//! Both options mark a compression start with an empty-body subnegotiation;
//! everything after the marker in the compressed direction is an RFC 1950
//! zlib stream until connection end. The handlers only flip state and emit
//! [`Event::Compression`]; the driver owns the actual zlib splice.

use tokio_util::bytes::Bytes;
use tracing::{debug, warn};

use crate::compress::Direction;
use crate::engine::{Engine, Event, Role};
use crate::machine::Table;
use crate::negotiation::Side;
use crate::options::{register_negotiation, register_subnegotiation, OptionHandler};
use crate::telnet::TelnetOption;
use crate::Result;

/// Server-to-client compression.
pub(crate) struct Mccp2;

impl OptionHandler for Mccp2 {
    fn option(&self) -> TelnetOption {
        TelnetOption::Mccp2
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
        // Peer accepted our WILL MCCP2: send the marker (uncompressed) and
        // compress everything after it.
        if side == Side::Local && engine.role() == Role::Server {
            engine.start_compression();
        }
        Ok(())
    }

    fn on_disabled(&self, engine: &mut Engine, _side: Side) -> Result<()> {
        engine.compression_started = false;
        engine.push_event(Event::Compression {
            direction: Direction::Outbound,
            active: false,
        });
        Ok(())
    }

    fn on_message(&self, engine: &mut Engine, body: Bytes) -> Result<()> {
        // Client side: the server's marker. The body must be empty.
        if !body.is_empty() {
            warn!(len = body.len(), "ignoring MCCP2 marker with a body");
            return Ok(());
        }
        debug!("inbound MCCP2 compression starting");
        engine.push_event(Event::Compression {
            direction: Direction::Inbound,
            active: true,
        });
        Ok(())
    }
}

/// Client-to-server compression.
pub(crate) struct Mccp3;

impl OptionHandler for Mccp3 {
    fn option(&self) -> TelnetOption {
        TelnetOption::Mccp3
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
        // Client: we agreed to compress upstream. Send the marker and start.
        if side == Side::Remote && engine.role() == Role::Client {
            engine.send_subnegotiation(TelnetOption::Mccp3, &[]);
            engine.push_event(Event::Compression {
                direction: Direction::Outbound,
                active: true,
            });
        }
        Ok(())
    }

    fn on_message(&self, engine: &mut Engine, body: Bytes) -> Result<()> {
        // Server side: the client's marker; its upstream is compressed now.
        if !body.is_empty() {
            warn!(len = body.len(), "ignoring MCCP3 marker with a body");
            return Ok(());
        }
        debug!("inbound MCCP3 compression starting");
        engine.push_event(Event::Compression {
            direction: Direction::Inbound,
            active: true,
        });
        Ok(())
    }
}
