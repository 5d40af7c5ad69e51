//! NAWS (RFC 1073): four payload bytes of window size in network order.
//!
//! NAWS is the one option with a dynamic permit: the guard watches the
//! collect buffer and parks the machine in `Completing` once the fourth
//! payload byte (escapes included) lands, so anything other than the closing
//! `IAC SE` afterwards is a framing error.

use tokio_util::bytes::Bytes;
use tracing::warn;

use crate::engine::{actions, Engine, Event, Role};
use crate::machine::{State, Table, Trigger};
use crate::negotiation::Side;
use crate::options::{register_negotiation, OptionHandler};
use crate::telnet::TelnetOption;
use crate::Result;

pub(crate) struct Naws;

impl OptionHandler for Naws {
    fn option(&self) -> TelnetOption {
        TelnetOption::Naws
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
        let opt = self.option();
        register_negotiation(table, opt);

        table
            .permit(
                State::SubNegotiation,
                Trigger::Option(opt),
                State::AlmostNegotiating(opt),
            )
            .on_entry(actions::begin_subnegotiation);
        table
            .permit_dynamic(State::AlmostNegotiating(opt), Trigger::Any, actions::naws_guard)
            .on_entry(actions::append_subneg_byte);
        table.permit(State::AlmostNegotiating(opt), Trigger::Iac, State::Escaping(opt));
        table
            .permit_dynamic(State::Negotiating(opt), Trigger::Any, actions::naws_guard)
            .on_entry(actions::append_subneg_byte);
        table.permit(State::Negotiating(opt), Trigger::Iac, State::Escaping(opt));
        // An escaped 0xFF counts as a payload byte too.
        table
            .permit_dynamic(State::Escaping(opt), Trigger::Iac, actions::naws_guard)
            .on_entry(actions::append_subneg_byte);
        // A short body still terminates cleanly; completion discards it.
        table
            .permit(State::Escaping(opt), Trigger::Se, State::Accepting)
            .on_entry(actions::complete_subnegotiation);
        table.permit(State::Completing(opt), Trigger::Iac, State::EndSubNegotiation);
    }

    fn on_enabled(&self, engine: &mut Engine, side: Side) -> Result<()> {
        // Client: the peer asked for our dimensions; report them once.
        if side == Side::Local {
            if let Some((width, height)) = engine.config.naws_dimensions {
                let payload = [
                    width.to_be_bytes(),
                    height.to_be_bytes(),
                ]
                .concat();
                engine.send_subnegotiation(TelnetOption::Naws, &payload);
            }
        }
        Ok(())
    }

    fn on_message(&self, engine: &mut Engine, body: Bytes) -> Result<()> {
        if body.len() != 4 {
            warn!(len = body.len(), "discarding malformed NAWS payload");
            return Ok(());
        }
        let width = u16::from_be_bytes([body[0], body[1]]);
        let height = u16::from_be_bytes([body[2], body[3]]);
        engine.naws_dims = (width, height);
        engine.push_event(Event::Naws { width, height });
        Ok(())
    }
}
