//! NEW-ENVIRON (RFC 1572) and the older ENVIRON (RFC 1408).
//!
//! Both carry `VAR`/`USERVAR` name markers, `VALUE` markers, and an `ESC`
//! byte that protects literal marker bytes. The wire shapes are close enough
//! that one codec serves both options; they differ only in the option code
//! negotiated.

use tokio_util::bytes::Bytes;
use tracing::warn;

use crate::engine::{Engine, Event, Role};
use crate::machine::Table;
use crate::negotiation::Side;
use crate::options::{register_negotiation, register_subnegotiation, OptionHandler};
use crate::telnet::{subneg, TelnetOption};
use crate::Result;

pub(crate) struct NewEnviron;

impl OptionHandler for NewEnviron {
    fn option(&self) -> TelnetOption {
        TelnetOption::NewEnviron
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
        if side == Side::Remote {
            engine.send_subnegotiation(self.option(), &[subneg::SEND]);
        }
        Ok(())
    }

    fn on_message(&self, engine: &mut Engine, body: Bytes) -> Result<()> {
        handle_message(engine, self.option(), &body);
        Ok(())
    }
}

pub(crate) struct Environ;

impl OptionHandler for Environ {
    fn option(&self) -> TelnetOption {
        TelnetOption::Environ
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
        if side == Side::Remote {
            engine.send_subnegotiation(self.option(), &[subneg::SEND]);
        }
        Ok(())
    }

    fn on_message(&self, engine: &mut Engine, body: Bytes) -> Result<()> {
        handle_message(engine, self.option(), &body);
        Ok(())
    }
}

fn handle_message(engine: &mut Engine, opt: TelnetOption, body: &[u8]) {
    match body.first() {
        Some(&subneg::SEND) => {
            let entries = engine.config.environ.clone();
            let payload = encode_is(&entries);
            engine.send_subnegotiation(opt, &payload);
        }
        Some(&subneg::IS | &subneg::INFO) => {
            let entries = decode_pairs(&body[1..]);
            engine.push_event(Event::Environ { entries });
        }
        other => warn!(option = %opt, verb = ?other, "unrecognised ENVIRON subnegotiation"),
    }
}

/// Build an `IS (VAR name VALUE value)*` reply, escaping marker bytes.
fn encode_is(entries: &[(String, String)]) -> Vec<u8> {
    let mut payload = vec![subneg::IS];
    for (name, value) in entries {
        payload.push(subneg::ENV_VAR);
        push_escaped(&mut payload, name.as_bytes());
        payload.push(subneg::ENV_VALUE);
        push_escaped(&mut payload, value.as_bytes());
    }
    payload
}

fn push_escaped(payload: &mut Vec<u8>, raw: &[u8]) {
    for byte in raw {
        if matches!(
            *byte,
            subneg::ENV_VAR | subneg::ENV_VALUE | subneg::ENV_ESC | subneg::ENV_USERVAR
        ) {
            payload.push(subneg::ENV_ESC);
        }
        payload.push(*byte);
    }
}

/// Decode a `(VAR|USERVAR name [VALUE value])*` run into pairs. A name with
/// no VALUE decodes to an empty value, per RFC 1572's "variable is defined
/// but has no value" case.
fn decode_pairs(body: &[u8]) -> Vec<(String, String)> {
    #[derive(PartialEq)]
    enum Reading {
        Name,
        Value,
    }

    let mut entries = Vec::new();
    let mut name = Vec::new();
    let mut value = Vec::new();
    let mut reading = None;
    let mut escaped = false;

    let flush =
        |name: &mut Vec<u8>, value: &mut Vec<u8>, entries: &mut Vec<(String, String)>| {
            if !name.is_empty() {
                entries.push((
                    String::from_utf8_lossy(name).to_string(),
                    String::from_utf8_lossy(value).to_string(),
                ));
            }
            name.clear();
            value.clear();
        };

    for &byte in body {
        if escaped {
            escaped = false;
            match reading {
                Some(Reading::Name) => name.push(byte),
                Some(Reading::Value) => value.push(byte),
                None => {}
            }
            continue;
        }
        match byte {
            subneg::ENV_ESC => escaped = true,
            subneg::ENV_VAR | subneg::ENV_USERVAR => {
                flush(&mut name, &mut value, &mut entries);
                reading = Some(Reading::Name);
            }
            subneg::ENV_VALUE => reading = Some(Reading::Value),
            byte => match reading {
                Some(Reading::Name) => name.push(byte),
                Some(Reading::Value) => value.push(byte),
                None => {}
            },
        }
    }
    flush(&mut name, &mut value, &mut entries);
    entries
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn decode_simple_pairs() {
        // VAR "USER" VALUE "mud" USERVAR "CLIENT" VALUE "wire"
        let body = [
            &[0u8][..],
            b"USER",
            &[1],
            b"mud",
            &[3],
            b"CLIENT",
            &[1],
            b"wire",
        ]
        .concat();
        assert_eq!(
            decode_pairs(&body),
            vec![
                ("USER".to_string(), "mud".to_string()),
                ("CLIENT".to_string(), "wire".to_string()),
            ]
        );
    }

    #[test]
    fn decode_escaped_marker() {
        // VAR "A" VALUE ESC <1> "b" — the escaped 0x01 is a literal.
        let body = [0u8, b'A', 1, 2, 1, b'b'];
        assert_eq!(
            decode_pairs(&body),
            vec![("A".to_string(), "\u{1}b".to_string())]
        );
    }

    #[test]
    fn decode_name_without_value() {
        let body = [0u8, b'X'];
        assert_eq!(decode_pairs(&body), vec![("X".to_string(), String::new())]);
    }

    #[test]
    fn encode_round_trips_through_decode() {
        let entries = vec![
            ("USER".to_string(), "grim\u{1}dark".to_string()),
            ("LANG".to_string(), "en_US".to_string()),
        ];
        let payload = encode_is(&entries);
        assert_eq!(payload[0], subneg::IS);
        assert_eq!(decode_pairs(&payload[1..]), entries);
    }
}
