//! Charset negotiation (RFC 2066).
//!
//! As responder: an inbound `REQUEST <sep> name (<sep> name)*` list is
//! filtered against the allow-set, ranked by the configured order, and the
//! first survivor is `ACCEPTED` (switching the connection encoding) or the
//! whole request `REJECTED`. As requester: once the peer DOes our WILL we
//! issue `REQUEST ;<offer-list>` and settle on the peer's ACCEPTED/REJECTED
//! answer.

use encoding_rs::Encoding;
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

/// RFC 2066 fixes the accepted-name buffer at 42 octets.
const ACCEPTED_NAME_MAX: usize = 42;

pub(crate) struct Charset;

impl OptionHandler for Charset {
    fn option(&self) -> TelnetOption {
        TelnetOption::Charset
    }

    fn sides(&self, _role: Role) -> (bool, bool) {
        // Either side may request; either side may answer.
        (true, true)
    }

    fn offer(&self, role: Role) -> Option<Side> {
        (role == Role::Server).then_some(Side::Local)
    }

    fn configure(&self, table: &mut Table, _role: Role) {
        register_negotiation(table, self.option());
        register_subnegotiation(table, self.option());
        register_evaluating(table, self.option());
    }

    fn on_enabled(&self, engine: &mut Engine, side: Side) -> Result<()> {
        // Our WILL was answered with DO: we are the requester now.
        if side == Side::Local {
            engine.request_charset();
        }
        Ok(())
    }

    fn on_message(&self, engine: &mut Engine, body: Bytes) -> Result<()> {
        match body.first() {
            Some(&subneg::CHARSET_REQUEST) => respond(engine, &body[1..]),
            Some(&subneg::CHARSET_ACCEPTED) => accepted(engine, &body[1..]),
            Some(&subneg::CHARSET_REJECTED) => {
                debug!("peer rejected our charset offer");
                engine.charset_requested = false;
            }
            other => warn!(verb = ?other, "unrecognised CHARSET subnegotiation"),
        }
        Ok(())
    }
}

/// Answer an inbound REQUEST list.
fn respond(engine: &mut Engine, body: &[u8]) {
    let Some(choice) = choose(engine, body) else {
        engine.send_subnegotiation(TelnetOption::Charset, &[subneg::CHARSET_REJECTED]);
        return;
    };
    let (name, encoding) = choice;

    let mut payload = vec![subneg::CHARSET_ACCEPTED];
    payload.extend_from_slice(name.as_bytes());
    engine.send_subnegotiation(TelnetOption::Charset, &payload);
    switch_encoding(engine, encoding);
}

/// Filter and rank the requested names, returning the first usable one.
fn choose(engine: &Engine, body: &[u8]) -> Option<(String, &'static Encoding)> {
    let (&separator, names) = body.split_first()?;
    let mut names: Vec<String> = names
        .split(|byte| *byte == separator)
        .filter(|name| !name.is_empty())
        .map(|name| String::from_utf8_lossy(name).trim().to_string())
        // RFC 2066 translation tables are a non-feature here; a TTABLE
        // prefix disqualifies the entry rather than derailing the list.
        .filter(|name| !name.starts_with("[TTABLE]"))
        .filter(|name| allowed(engine, name))
        .collect();
    engine.config.charset_order.rank(&mut names);

    names.into_iter().find_map(|name| {
        if name.len() > ACCEPTED_NAME_MAX {
            warn!(%name, "charset name exceeds the accepted-name buffer");
            return None;
        }
        Encoding::for_label(name.as_bytes()).map(|encoding| (name, encoding))
    })
}

fn allowed(engine: &Engine, name: &str) -> bool {
    match &engine.config.allowed_encodings {
        Some(allowed) => allowed.iter().any(|entry| entry.eq_ignore_ascii_case(name)),
        None => Encoding::for_label(name.as_bytes()).is_some(),
    }
}

/// The peer accepted one of our offered names.
fn accepted(engine: &mut Engine, raw: &[u8]) {
    engine.charset_requested = false;
    if raw.len() > ACCEPTED_NAME_MAX {
        warn!("accepted charset name exceeds the accepted-name buffer");
        return;
    }
    let name = String::from_utf8_lossy(raw).trim().to_string();
    let offered = engine
        .config
        .charset_offer
        .iter()
        .any(|offer| offer.eq_ignore_ascii_case(&name));
    if !offered {
        warn!(%name, "peer accepted a charset we never offered");
        return;
    }
    match Encoding::for_label(name.as_bytes()) {
        Some(encoding) => switch_encoding(engine, encoding),
        None => warn!(%name, "accepted charset has no known encoding"),
    }
}

fn switch_encoding(engine: &mut Engine, encoding: &'static Encoding) {
    if engine.encoding == encoding {
        return;
    }
    debug!(from = engine.encoding.name(), to = encoding.name(), "charset switched");
    engine.encoding = encoding;
    engine.push_event(Event::CharsetChanged(encoding));
}
