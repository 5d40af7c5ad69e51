//! Per-option protocol handlers.
//!
//! Each handler owns one RFC option: it declares which side of the
//! connection performs the option for each role, registers its subgraph into
//! the shared transition table at build time, and reacts to enable/disable
//! edges and completed subnegotiation bodies. Handlers are stateless; the
//! engine carries all mutable per-connection state.

pub(crate) mod auth;
pub(crate) mod charset;
pub(crate) mod compress;
pub(crate) mod echo;
pub(crate) mod environ;
pub(crate) mod flowcontrol;
pub(crate) mod gmcp;
pub(crate) mod linemode;
pub(crate) mod msdp;
pub(crate) mod mssp;
pub(crate) mod naws;
pub(crate) mod prompt;
pub(crate) mod safety;
pub(crate) mod tspeed;
pub(crate) mod ttype;
pub(crate) mod xdisploc;

use std::collections::BTreeSet;

use tokio_util::bytes::Bytes;
use tracing::warn;

use crate::engine::{actions, Engine, Role};
use crate::machine::{State, Table, Trigger};
use crate::negotiation::Side;
use crate::telnet::TelnetOption;
use crate::Result;

/// One RFC option's protocol contract.
pub(crate) trait OptionHandler: Send + Sync {
    fn option(&self) -> TelnetOption;

    /// Which sides of the connection perform this option, as
    /// `(local, remote)`, for the given role.
    fn sides(&self, role: Role) -> (bool, bool);

    /// The unsolicited offer a server makes at startup, if any.
    fn offer(&self, _role: Role) -> Option<Side> {
        None
    }

    /// Register this option's states and transitions.
    fn configure(&self, table: &mut Table, role: Role);

    /// The option was agreed for `side`.
    fn on_enabled(&self, _engine: &mut Engine, _side: Side) -> Result<()> {
        Ok(())
    }

    /// The option was disabled for `side`.
    fn on_disabled(&self, _engine: &mut Engine, _side: Side) -> Result<()> {
        Ok(())
    }

    /// A complete, unescaped subnegotiation body arrived.
    fn on_message(&self, _engine: &mut Engine, _body: Bytes) -> Result<()> {
        Ok(())
    }
}

/// The engine's handler registry, indexed by option code.
pub(crate) struct HandlerSet {
    handlers: Vec<Box<dyn OptionHandler>>,
    by_code: [Option<u8>; 256],
}

impl HandlerSet {
    pub(crate) fn build(enabled: &BTreeSet<TelnetOption>) -> Self {
        let mut handlers: Vec<Box<dyn OptionHandler>> = Vec::with_capacity(enabled.len());
        for opt in enabled {
            match handler_for(*opt) {
                Some(handler) => handlers.push(handler),
                None => warn!(option = %opt, "option has no handler; left to the safety net"),
            }
        }

        let mut by_code = [None; 256];
        for (index, handler) in handlers.iter().enumerate() {
            // Index fits: at most one handler per option code.
            by_code[handler.option().byte() as usize] = u8::try_from(index).ok();
        }
        Self { handlers, by_code }
    }

    pub(crate) fn get(&self, opt: TelnetOption) -> Option<&dyn OptionHandler> {
        let index = self.by_code[opt.byte() as usize]?;
        self.handlers.get(index as usize).map(|handler| &**handler)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &dyn OptionHandler> + '_ {
        self.handlers.iter().map(|handler| &**handler)
    }
}

fn handler_for(opt: TelnetOption) -> Option<Box<dyn OptionHandler>> {
    Some(match opt {
        TelnetOption::Echo => Box::new(echo::Echo),
        TelnetOption::SuppressGoAhead => Box::new(prompt::SuppressGoAhead),
        TelnetOption::EndOfRecord => Box::new(prompt::EndOfRecord),
        TelnetOption::TerminalType => Box::new(ttype::TerminalType),
        TelnetOption::Naws => Box::new(naws::Naws),
        TelnetOption::TerminalSpeed => Box::new(tspeed::TerminalSpeed),
        TelnetOption::FlowControl => Box::new(flowcontrol::FlowControl),
        TelnetOption::LineMode => Box::new(linemode::LineMode),
        TelnetOption::XDisplayLocation => Box::new(xdisploc::XDisplayLocation),
        TelnetOption::Environ => Box::new(environ::Environ),
        TelnetOption::NewEnviron => Box::new(environ::NewEnviron),
        TelnetOption::Authentication => Box::new(auth::Authentication),
        TelnetOption::Encryption => Box::new(auth::Encryption),
        TelnetOption::Charset => Box::new(charset::Charset),
        TelnetOption::Msdp => Box::new(msdp::Msdp),
        TelnetOption::Mssp => Box::new(mssp::Mssp),
        TelnetOption::Mccp2 => Box::new(compress::Mccp2),
        TelnetOption::Mccp3 => Box::new(compress::Mccp3),
        TelnetOption::Gmcp => Box::new(gmcp::Gmcp),
        // STATUS has no subnegotiation contract here; the safety net
        // answers it.
        TelnetOption::Status => return None,
    })
}

/// Register the four WILL/WONT/DO/DONT response states for a claimed option.
pub(crate) fn register_negotiation(table: &mut Table, opt: TelnetOption) {
    let trigger = Trigger::Option(opt);
    table
        .permit(State::Willing, trigger, State::Will(opt))
        .on_entry(actions::peer_will);
    table
        .permit(State::Refusing, trigger, State::Wont(opt))
        .on_entry(actions::peer_wont);
    table
        .permit(State::Doing, trigger, State::Do(opt))
        .on_entry(actions::peer_do);
    table
        .permit(State::Donting, trigger, State::Dont(opt))
        .on_entry(actions::peer_dont);
    table.auto_advance(State::Will(opt), State::Accepting);
    table.auto_advance(State::Wont(opt), State::Accepting);
    table.auto_advance(State::Do(opt), State::Accepting);
    table.auto_advance(State::Dont(opt), State::Accepting);
}

/// Register the shared subnegotiation skeleton for an option: collect body
/// bytes, honour `IAC IAC` escapes, complete on `IAC SE`.
pub(crate) fn register_subnegotiation(table: &mut Table, opt: TelnetOption) {
    table
        .permit(
            State::SubNegotiation,
            Trigger::Option(opt),
            State::AlmostNegotiating(opt),
        )
        .on_entry(actions::begin_subnegotiation);
    table
        .permit(State::AlmostNegotiating(opt), Trigger::Any, State::Negotiating(opt))
        .on_entry(actions::append_subneg_byte);
    table.permit(State::AlmostNegotiating(opt), Trigger::Iac, State::Escaping(opt));
    table
        .permit_reentry(State::Negotiating(opt), Trigger::Any)
        .on_entry(actions::append_subneg_byte);
    table.permit(State::Negotiating(opt), Trigger::Iac, State::Escaping(opt));
    table
        .permit(State::Escaping(opt), Trigger::Iac, State::Negotiating(opt))
        .on_entry(actions::append_subneg_byte);
    table
        .permit(State::Escaping(opt), Trigger::Se, State::Completing(opt))
        .on_entry(actions::complete_subnegotiation);
    table.auto_advance(State::Completing(opt), State::Accepting);
}

/// Refine the skeleton with a first-byte interpretation state: the opening
/// body byte (IS/SEND, REQUEST/ACCEPTED/REJECTED, …) lands in
/// `Evaluating`, which inherits the collect behaviour from `Negotiating`.
pub(crate) fn register_evaluating(table: &mut Table, opt: TelnetOption) {
    table
        .permit(State::AlmostNegotiating(opt), Trigger::Any, State::Evaluating(opt))
        .on_entry(actions::append_subneg_byte);
    table.substate_of(State::Evaluating(opt), State::Negotiating(opt));
}
