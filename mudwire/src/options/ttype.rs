//! Terminal Type (RFC 1091) with the MTTS bitfield extension.
//!
//! The server asks `IAC SB TTYPE SEND IAC SE` and loops: every new name is
//! recorded and re-queried; a repeat closes the cycle. A closing list entry
//! of the form `MTTS <n>` expands into the named capability bits. The client
//! cycles its configured list, one entry per SEND.

use tokio_util::bytes::Bytes;
use tracing::{debug, warn};

use crate::engine::{Engine, Event, Role};
use crate::machine::Table;
use crate::negotiation::Side;
use crate::options::{
    register_evaluating, register_negotiation, register_subnegotiation, OptionHandler,
};
use crate::telnet::{subneg, TelnetOption};
use crate::Result;

/// Upper bound on distinct terminal types collected before the cycle is
/// force-closed.
const MAX_TYPES: usize = 64;

/// MTTS capability bits, least significant first.
const MTTS_BITS: [(u32, &str); 11] = [
    (1, "ANSI"),
    (2, "VT100"),
    (4, "UTF8"),
    (8, "256 COLORS"),
    (16, "MOUSE_TRACKING"),
    (32, "OSC_COLOR_PALETTE"),
    (64, "SCREEN_READER"),
    (128, "PROXY"),
    (256, "TRUECOLOR"),
    (512, "MNES"),
    (1024, "MSLP"),
];

pub(crate) struct TerminalType;

impl OptionHandler for TerminalType {
    fn option(&self) -> TelnetOption {
        TelnetOption::TerminalType
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
        register_evaluating(table, self.option());
    }

    fn on_enabled(&self, engine: &mut Engine, side: Side) -> Result<()> {
        // The peer agreed to report its terminal type: open the cycle.
        if side == Side::Remote {
            send_query(engine);
        }
        Ok(())
    }

    fn on_message(&self, engine: &mut Engine, body: Bytes) -> Result<()> {
        match body.first() {
            Some(&subneg::IS) => receive_terminal_type(engine, &body[1..]),
            Some(&subneg::SEND) => answer_query(engine),
            other => {
                warn!(verb = ?other, "unrecognised TTYPE subnegotiation");
            }
        }
        Ok(())
    }
}

fn send_query(engine: &mut Engine) {
    engine.send_subnegotiation(TelnetOption::TerminalType, &[subneg::SEND]);
}

/// Server side: record the reported name and either re-query or close the
/// cycle.
fn receive_terminal_type(engine: &mut Engine, raw: &[u8]) {
    if engine.ttype.complete {
        return;
    }
    let name = String::from_utf8_lossy(raw).trim().to_string();
    if name.is_empty() {
        return;
    }

    if engine.ttype.seen.iter().any(|seen| seen == &name) {
        engine.ttype.complete = true;
        expand_mtts(engine);
        debug!(types = ?engine.ttype.seen, "terminal type cycle complete");
    } else if engine.ttype.seen.len() >= MAX_TYPES {
        // A peer that never repeats itself does not get an unbounded list.
        warn!(limit = MAX_TYPES, "terminal type list full; closing the cycle");
        engine.ttype.complete = true;
        expand_mtts(engine);
    } else {
        engine.ttype.seen.push(name.clone());
        send_query(engine);
    }

    let types = engine.ttype.seen.clone();
    engine.push_event(Event::TerminalType {
        types,
        latest: name,
    });
}

/// Client side: report the next configured type. Repeating the final entry
/// is what tells the server the cycle is over.
fn answer_query(engine: &mut Engine) {
    let types = &engine.config.terminal_types;
    let name = match types.len() {
        0 => "UNKNOWN".to_string(),
        len => {
            let name = types[engine.ttype.cycle.min(len - 1)].clone();
            if engine.ttype.cycle < len {
                engine.ttype.cycle += 1;
            }
            name
        }
    };
    let mut payload = vec![subneg::IS];
    payload.extend_from_slice(name.as_bytes());
    engine.send_subnegotiation(TelnetOption::TerminalType, &payload);
}

/// Extend the collected list with the names of any set MTTS bits.
fn expand_mtts(engine: &mut Engine) {
    let Some(bitfield) = engine.ttype.seen.iter().find_map(|name| {
        name.strip_prefix("MTTS ")
            .and_then(|rest| rest.trim().parse::<u32>().ok())
    }) else {
        return;
    };
    for (bit, name) in MTTS_BITS {
        if bitfield & bit != 0 && !engine.ttype.seen.iter().any(|seen| seen == name) {
            engine.ttype.seen.push(name.to_string());
        }
    }
}
