//! Entry actions referenced by the transition table.
//!
//! Actions are plain `fn` pointers over the engine so the table stays a pure
//! data structure; every byte of mutable state they touch lives on
//! [`Engine`].

use tracing::{debug, warn};

use crate::engine::{Engine, Event};
use crate::telnet::{Negotiation, TelnetOption};
use crate::Result;

/// Append a user-data byte to the line buffer.
pub(crate) fn append_user_byte(engine: &mut Engine, byte: u8) -> Result<()> {
    engine.buffer_user_byte(byte);
    Ok(())
}

/// Deliver the buffered line and reset the buffer.
pub(crate) fn flush_line(engine: &mut Engine, _byte: u8) -> Result<()> {
    engine.flush_user_buffer();
    Ok(())
}

/// The peer marked a prompt boundary with GA or EOR.
pub(crate) fn prompt_received(engine: &mut Engine, _byte: u8) -> Result<()> {
    engine.push_event(Event::Prompt);
    Ok(())
}

/// Open the subnegotiation collect buffer for the option the byte names.
pub(crate) fn begin_subnegotiation(engine: &mut Engine, byte: u8) -> Result<()> {
    if let Some(opt) = TelnetOption::from_byte(byte) {
        engine.begin_subnegotiation(opt);
    }
    Ok(())
}

/// Append one (unescaped) body byte to the subnegotiation buffer.
pub(crate) fn append_subneg_byte(engine: &mut Engine, byte: u8) -> Result<()> {
    engine.buffer_subneg_byte(byte);
    Ok(())
}

/// The closing `IAC SE` arrived: hand the body to the option handler.
pub(crate) fn complete_subnegotiation(engine: &mut Engine, _byte: u8) -> Result<()> {
    engine.complete_subnegotiation()
}

/// Reply policy for `IAC WILL <opt>` on a claimed option.
pub(crate) fn peer_will(engine: &mut Engine, byte: u8) -> Result<()> {
    let Some(opt) = TelnetOption::from_byte(byte) else {
        return Ok(());
    };
    let outcome = engine.opts.peer_will(opt);
    engine.apply_outcome(opt, outcome)
}

/// Reply policy for `IAC WONT <opt>` on a claimed option.
pub(crate) fn peer_wont(engine: &mut Engine, byte: u8) -> Result<()> {
    let Some(opt) = TelnetOption::from_byte(byte) else {
        return Ok(());
    };
    let outcome = engine.opts.peer_wont(opt);
    engine.apply_outcome(opt, outcome)
}

/// Reply policy for `IAC DO <opt>` on a claimed option.
pub(crate) fn peer_do(engine: &mut Engine, byte: u8) -> Result<()> {
    let Some(opt) = TelnetOption::from_byte(byte) else {
        return Ok(());
    };
    let outcome = engine.opts.peer_do(opt);
    engine.apply_outcome(opt, outcome)
}

/// Reply policy for `IAC DONT <opt>` on a claimed option.
pub(crate) fn peer_dont(engine: &mut Engine, byte: u8) -> Result<()> {
    let Some(opt) = TelnetOption::from_byte(byte) else {
        return Ok(());
    };
    let outcome = engine.opts.peer_dont(opt);
    engine.apply_outcome(opt, outcome)
}

/// Safety net: refuse a WILL for an option nothing claimed.
pub(crate) fn reject_will(engine: &mut Engine, byte: u8) -> Result<()> {
    debug!(option = byte, "refusing unclaimed WILL");
    engine.send_negotiation(Negotiation::Dont(byte));
    Ok(())
}

/// Safety net: refuse a DO for an option nothing claimed.
pub(crate) fn reject_do(engine: &mut Engine, byte: u8) -> Result<()> {
    debug!(option = byte, "refusing unclaimed DO");
    engine.send_negotiation(Negotiation::Wont(byte));
    Ok(())
}

/// Safety net: an unclaimed subnegotiation opened; its body will be
/// swallowed without reaching user data.
pub(crate) fn bad_subnegotiation(_engine: &mut Engine, byte: u8) -> Result<()> {
    warn!(option = byte, "swallowing unknown subnegotiation");
    Ok(())
}

/// NAWS dynamic-permit guard: the fourth payload byte parks the machine in
/// `Completing` to await the closing `IAC SE`.
pub(crate) fn naws_guard(engine: &Engine, _byte: u8) -> crate::machine::State {
    use crate::machine::State;
    if engine.subneg.buf.len() >= 3 {
        State::Completing(TelnetOption::Naws)
    } else {
        State::Negotiating(TelnetOption::Naws)
    }
}

