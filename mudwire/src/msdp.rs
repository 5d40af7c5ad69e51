//! MSDP (Mud Server Data Protocol) structures: the recursive value tree, the
//! wire parser and encoder, JSON interchange, and the server-side variable
//! model with its request interpreter.
//!
//! Wire grammar, with `VAR`/`VAL`/`TABLE_OPEN`/… the marker bytes from
//! [`crate::telnet::subneg`]:
//!
//! ```text
//! body  := (VAR name VAL value)*
//! value := TABLE_OPEN (VAR name VAL value)* TABLE_CLOSE
//!        | ARRAY_OPEN (VAL value)* ARRAY_CLOSE
//!        | literal-bytes
//! ```
//!
//! Literal bytes are decoded with the connection's current encoding. The
//! body reaching the parser is already IAC-unescaped by the framing layer.

use std::collections::{BTreeMap, BTreeSet};

use encoding_rs::Encoding;
use tokio_util::bytes::{BufMut, Bytes, BytesMut};
use tracing::warn;

use crate::error::MsdpError;
use crate::telnet::subneg;

/// A value in the MSDP tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MsdpValue {
    /// A leaf string.
    Scalar(String),
    /// An ordered list of values.
    Array(Vec<MsdpValue>),
    /// A named mapping of values.
    Table(BTreeMap<String, MsdpValue>),
}

impl MsdpValue {
    /// Convert to the JSON interchange form: scalars become strings, arrays
    /// become JSON arrays, tables become JSON objects.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            MsdpValue::Scalar(s) => serde_json::Value::String(s.clone()),
            MsdpValue::Array(items) => {
                serde_json::Value::Array(items.iter().map(MsdpValue::to_json).collect())
            }
            MsdpValue::Table(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    /// Build a value from JSON. Non-string leaves (numbers, booleans, null)
    /// become their text form.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Array(items) => {
                MsdpValue::Array(items.iter().map(MsdpValue::from_json).collect())
            }
            serde_json::Value::Object(map) => MsdpValue::Table(
                map.iter()
                    .map(|(k, v)| (k.clone(), MsdpValue::from_json(v)))
                    .collect(),
            ),
            serde_json::Value::String(s) => MsdpValue::Scalar(s.clone()),
            serde_json::Value::Null => MsdpValue::Scalar(String::new()),
            other => MsdpValue::Scalar(other.to_string()),
        }
    }
}

impl From<&str> for MsdpValue {
    fn from(value: &str) -> Self {
        MsdpValue::Scalar(value.to_string())
    }
}

impl From<String> for MsdpValue {
    fn from(value: String) -> Self {
        MsdpValue::Scalar(value)
    }
}

/// Parse a complete subnegotiation body into a table of variables.
pub fn parse(body: &[u8], encoding: &'static Encoding) -> Result<MsdpValue, MsdpError> {
    let mut parser = Parser {
        body,
        pos: 0,
        encoding,
    };
    let table = parser.pairs(None)?;
    Ok(MsdpValue::Table(table))
}

/// Encode one `VAR name VAL value` assignment to wire bytes.
///
/// The output still needs IAC escaping before framing; see
/// [`crate::telnet::telnet_safe`].
#[must_use]
pub fn encode(name: &str, value: &MsdpValue) -> Bytes {
    let mut out = BytesMut::new();
    out.put_u8(subneg::MSDP_VAR);
    out.put_slice(name.as_bytes());
    out.put_u8(subneg::MSDP_VAL);
    encode_value(value, &mut out);
    out.freeze()
}

fn encode_value(value: &MsdpValue, out: &mut BytesMut) {
    match value {
        MsdpValue::Scalar(s) => out.put_slice(s.as_bytes()),
        MsdpValue::Array(items) => {
            out.put_u8(subneg::MSDP_ARRAY_OPEN);
            for item in items {
                out.put_u8(subneg::MSDP_VAL);
                encode_value(item, out);
            }
            out.put_u8(subneg::MSDP_ARRAY_CLOSE);
        }
        MsdpValue::Table(map) => {
            out.put_u8(subneg::MSDP_TABLE_OPEN);
            for (name, item) in map {
                out.put_u8(subneg::MSDP_VAR);
                out.put_slice(name.as_bytes());
                out.put_u8(subneg::MSDP_VAL);
                encode_value(item, out);
            }
            out.put_u8(subneg::MSDP_TABLE_CLOSE);
        }
    }
}

struct Parser<'a> {
    body: &'a [u8],
    pos: usize,
    encoding: &'static Encoding,
}

impl Parser<'_> {
    /// Parse `VAR name VAL value` pairs until `close` (or end of input when
    /// `close` is `None`).
    fn pairs(&mut self, close: Option<u8>) -> Result<BTreeMap<String, MsdpValue>, MsdpError> {
        let mut map = BTreeMap::new();
        loop {
            match self.peek() {
                None if close.is_none() => return Ok(map),
                None => {
                    return Err(MsdpError::Truncated {
                        expected: "TABLE_CLOSE",
                    })
                }
                Some(byte) if Some(byte) == close => {
                    self.pos += 1;
                    return Ok(map);
                }
                Some(subneg::MSDP_VAR) => {
                    self.pos += 1;
                    let name = self.literal();
                    self.expect(subneg::MSDP_VAL, "VAL")?;
                    let value = self.value()?;
                    map.insert(name, value);
                }
                Some(byte) => {
                    return Err(MsdpError::UnexpectedByte {
                        byte,
                        offset: self.pos,
                    })
                }
            }
        }
    }

    fn value(&mut self) -> Result<MsdpValue, MsdpError> {
        match self.peek() {
            Some(subneg::MSDP_TABLE_OPEN) => {
                self.pos += 1;
                Ok(MsdpValue::Table(self.pairs(Some(subneg::MSDP_TABLE_CLOSE))?))
            }
            Some(subneg::MSDP_ARRAY_OPEN) => {
                self.pos += 1;
                let mut items = Vec::new();
                loop {
                    match self.peek() {
                        Some(subneg::MSDP_ARRAY_CLOSE) => {
                            self.pos += 1;
                            return Ok(MsdpValue::Array(items));
                        }
                        Some(subneg::MSDP_VAL) => {
                            self.pos += 1;
                            items.push(self.value()?);
                        }
                        Some(byte) => {
                            return Err(MsdpError::UnexpectedByte {
                                byte,
                                offset: self.pos,
                            })
                        }
                        None => {
                            return Err(MsdpError::Truncated {
                                expected: "ARRAY_CLOSE",
                            })
                        }
                    }
                }
            }
            _ => Ok(MsdpValue::Scalar(self.literal())),
        }
    }

    /// Take literal bytes up to the next structural marker, decoded with the
    /// current encoding.
    fn literal(&mut self) -> String {
        let start = self.pos;
        while let Some(byte) = self.peek() {
            if matches!(
                byte,
                subneg::MSDP_VAR
                    | subneg::MSDP_VAL
                    | subneg::MSDP_TABLE_OPEN
                    | subneg::MSDP_TABLE_CLOSE
                    | subneg::MSDP_ARRAY_OPEN
                    | subneg::MSDP_ARRAY_CLOSE
            ) {
                break;
            }
            self.pos += 1;
        }
        let (text, _, _) = self.encoding.decode(&self.body[start..self.pos]);
        text.into_owned()
    }

    fn expect(&mut self, byte: u8, expected: &'static str) -> Result<(), MsdpError> {
        match self.peek() {
            Some(found) if found == byte => {
                self.pos += 1;
                Ok(())
            }
            Some(found) => Err(MsdpError::UnexpectedByte {
                byte: found,
                offset: self.pos,
            }),
            None => Err(MsdpError::Truncated { expected }),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.body.get(self.pos).copied()
    }
}

/// The names MSDP `LIST` can ask for.
const LIST_NAMES: [&str; 6] = [
    "COMMANDS",
    "LISTS",
    "CONFIGURABLE_VARIABLES",
    "REPORTABLE_VARIABLES",
    "REPORTED_VARIABLES",
    "SENDABLE_VARIABLES",
];

/// The server-side MSDP catalogue: variables, their defaults, the lists a
/// client may query, and the set of variables currently being reported.
///
/// The model is pure bookkeeping; the engine turns the replies it produces
/// into wire messages.
#[derive(Debug, Default, Clone)]
pub struct ServerModel {
    variables: BTreeMap<String, MsdpValue>,
    defaults: BTreeMap<String, MsdpValue>,
    reportable: BTreeSet<String>,
    configurable: BTreeSet<String>,
    sendable: BTreeSet<String>,
    commands: BTreeSet<String>,
    reported: BTreeSet<String>,
}

impl ServerModel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Define a sendable variable with its default value.
    pub fn variable(mut self, name: impl Into<String>, value: impl Into<MsdpValue>) -> Self {
        let name = name.into();
        let value = value.into();
        self.defaults.insert(name.clone(), value.clone());
        self.variables.insert(name.clone(), value);
        self.sendable.insert(name);
        self
    }

    /// Mark a defined variable as reportable.
    pub fn reportable(mut self, name: impl Into<String>) -> Self {
        self.reportable.insert(name.into());
        self
    }

    /// Mark a defined variable as client-configurable.
    pub fn configurable(mut self, name: impl Into<String>) -> Self {
        self.configurable.insert(name.into());
        self
    }

    /// Advertise a command in the `COMMANDS` list.
    pub fn command(mut self, name: impl Into<String>) -> Self {
        self.commands.insert(name.into());
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&MsdpValue> {
        self.variables.get(name)
    }

    /// Replace a variable's current value. Returns the reply to push to the
    /// client when the variable is being reported.
    pub fn set(
        &mut self,
        name: impl Into<String>,
        value: impl Into<MsdpValue>,
    ) -> Option<(String, MsdpValue)> {
        let name = name.into();
        let value = value.into();
        self.variables.insert(name.clone(), value.clone());
        self.reported.contains(&name).then_some((name, value))
    }

    /// Names currently registered for reporting.
    pub fn reported(&self) -> impl Iterator<Item = &str> + '_ {
        self.reported.iter().map(String::as_str)
    }

    /// Interpret a client request (the parsed subnegotiation body) and
    /// produce the variable/value replies to send back.
    pub fn interpret(&mut self, request: &MsdpValue) -> Result<Vec<(String, MsdpValue)>, MsdpError> {
        let MsdpValue::Table(pairs) = request else {
            return Err(MsdpError::MalformedRequest);
        };

        let mut replies = Vec::new();
        for (command, argument) in pairs {
            match command.as_str() {
                "LIST" => {
                    for name in Self::names(argument) {
                        replies.push((name.clone(), self.list(&name)));
                    }
                }
                "REPORT" => {
                    for name in Self::names(argument) {
                        if !self.reportable.contains(&name) {
                            warn!(variable = %name, "REPORT for non-reportable variable");
                            continue;
                        }
                        self.reported.insert(name.clone());
                        if let Some(value) = self.variables.get(&name) {
                            replies.push((name, value.clone()));
                        }
                    }
                }
                "UNREPORT" => {
                    for name in Self::names(argument) {
                        self.reported.remove(&name);
                    }
                }
                "RESET" => {
                    for name in Self::names(argument) {
                        if name == "REPORTED_VARIABLES" {
                            let reported: Vec<_> =
                                self.reported.iter().cloned().collect();
                            for name in reported {
                                replies.extend(self.reset_variable(&name));
                            }
                        } else {
                            replies.extend(self.reset_variable(&name));
                        }
                    }
                }
                "SEND" => {
                    for name in Self::names(argument) {
                        if !self.sendable.contains(&name) {
                            warn!(variable = %name, "SEND for non-sendable variable");
                            continue;
                        }
                        if let Some(value) = self.variables.get(&name) {
                            replies.push((name, value.clone()));
                        }
                    }
                }
                name if self.configurable.contains(name) => {
                    self.variables.insert(name.to_string(), argument.clone());
                }
                name => {
                    warn!(command = %name, "unknown MSDP request");
                }
            }
        }
        Ok(replies)
    }

    fn reset_variable(&mut self, name: &str) -> Option<(String, MsdpValue)> {
        let default = self.defaults.get(name)?.clone();
        self.variables.insert(name.to_string(), default.clone());
        self.reported
            .contains(name)
            .then(|| (name.to_string(), default))
    }

    fn list(&self, name: &str) -> MsdpValue {
        let items: Vec<&str> = match name {
            "COMMANDS" => self.commands.iter().map(String::as_str).collect(),
            "LISTS" => LIST_NAMES.to_vec(),
            "CONFIGURABLE_VARIABLES" => self.configurable.iter().map(String::as_str).collect(),
            "REPORTABLE_VARIABLES" => self.reportable.iter().map(String::as_str).collect(),
            "REPORTED_VARIABLES" => self.reported.iter().map(String::as_str).collect(),
            "SENDABLE_VARIABLES" => self.sendable.iter().map(String::as_str).collect(),
            _ => Vec::new(),
        };
        MsdpValue::Array(items.into_iter().map(MsdpValue::from).collect())
    }

    /// A request argument can name one thing or an array of things.
    fn names(argument: &MsdpValue) -> Vec<String> {
        match argument {
            MsdpValue::Scalar(name) => vec![name.clone()],
            MsdpValue::Array(items) => items
                .iter()
                .filter_map(|item| match item {
                    MsdpValue::Scalar(name) => Some(name.clone()),
                    _ => None,
                })
                .collect(),
            MsdpValue::Table(_) => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use encoding_rs::UTF_8;
    use pretty_assertions::assert_eq;

    use super::*;

    fn scalar(s: &str) -> MsdpValue {
        MsdpValue::Scalar(s.to_string())
    }

    #[test]
    fn parse_flat_pair() {
        // VAR "SEND" VAL "HEALTH"
        let body = [&[1u8][..], b"SEND", &[2], b"HEALTH"].concat();
        let parsed = parse(&body, UTF_8).unwrap();
        let MsdpValue::Table(map) = parsed else {
            panic!("expected table");
        };
        assert_eq!(map.get("SEND"), Some(&scalar("HEALTH")));
    }

    #[test]
    fn parse_nested_table_and_array() {
        // VAR "ROOM" VAL TABLE_OPEN
        //   VAR "VNUM" VAL "100"
        //   VAR "EXITS" VAL ARRAY_OPEN VAL "n" VAL "e" ARRAY_CLOSE
        // TABLE_CLOSE
        let body = [
            &[1u8][..],
            b"ROOM",
            &[2, 3, 1],
            b"VNUM",
            &[2],
            b"100",
            &[1],
            b"EXITS",
            &[2, 5, 2],
            b"n",
            &[2],
            b"e",
            &[6, 4],
        ]
        .concat();
        let parsed = parse(&body, UTF_8).unwrap();

        let mut exits = Vec::new();
        exits.push(scalar("n"));
        exits.push(scalar("e"));
        let mut room = BTreeMap::new();
        room.insert("VNUM".to_string(), scalar("100"));
        room.insert("EXITS".to_string(), MsdpValue::Array(exits));
        let mut expected = BTreeMap::new();
        expected.insert("ROOM".to_string(), MsdpValue::Table(room));
        assert_eq!(parsed, MsdpValue::Table(expected));
    }

    #[test]
    fn parse_rejects_stray_bytes() {
        let body = b"garbage";
        assert!(matches!(
            parse(body, UTF_8),
            Err(MsdpError::UnexpectedByte { .. })
        ));
    }

    #[test]
    fn parse_rejects_unterminated_table() {
        let body = [&[1u8][..], b"T", &[2, 3, 1], b"X", &[2], b"1"].concat();
        assert!(matches!(
            parse(&body, UTF_8),
            Err(MsdpError::Truncated { .. })
        ));
    }

    #[test]
    fn encode_parse_round_trip() {
        let mut table = BTreeMap::new();
        table.insert("A".to_string(), scalar("1"));
        table.insert(
            "B".to_string(),
            MsdpValue::Array(vec![scalar("x"), scalar("y")]),
        );
        let value = MsdpValue::Table(table.clone());

        let wire = encode("STATE", &value);
        let parsed = parse(&wire, UTF_8).unwrap();

        let mut expected = BTreeMap::new();
        expected.insert("STATE".to_string(), MsdpValue::Table(table));
        assert_eq!(parsed, MsdpValue::Table(expected));
    }

    #[test]
    fn json_round_trip() {
        let value = MsdpValue::Table(
            [(
                "EXITS".to_string(),
                MsdpValue::Array(vec![scalar("n"), scalar("s")]),
            )]
            .into_iter()
            .collect(),
        );
        let json = value.to_json();
        assert_eq!(json.to_string(), r#"{"EXITS":["n","s"]}"#);
        assert_eq!(MsdpValue::from_json(&json), value);
    }

    #[test]
    fn model_list_and_send() {
        let mut model = ServerModel::new()
            .variable("HEALTH", "100")
            .variable("MANA", "50")
            .reportable("HEALTH")
            .command("LIST")
            .command("SEND");

        let request = MsdpValue::Table(
            [("LIST".to_string(), scalar("COMMANDS"))].into_iter().collect(),
        );
        let replies = model.interpret(&request).unwrap();
        assert_eq!(
            replies,
            vec![(
                "COMMANDS".to_string(),
                MsdpValue::Array(vec![scalar("LIST"), scalar("SEND")])
            )]
        );

        let request = MsdpValue::Table(
            [("SEND".to_string(), scalar("MANA"))].into_iter().collect(),
        );
        assert_eq!(
            model.interpret(&request).unwrap(),
            vec![("MANA".to_string(), scalar("50"))]
        );
    }

    #[test]
    fn model_report_cycle() {
        let mut model = ServerModel::new()
            .variable("HEALTH", "100")
            .reportable("HEALTH");

        let report = MsdpValue::Table(
            [("REPORT".to_string(), scalar("HEALTH"))].into_iter().collect(),
        );
        let replies = model.interpret(&report).unwrap();
        assert_eq!(replies, vec![("HEALTH".to_string(), scalar("100"))]);

        // A change to a reported variable yields a push.
        assert_eq!(
            model.set("HEALTH", "90"),
            Some(("HEALTH".to_string(), scalar("90")))
        );

        // RESET restores the default and re-sends.
        let reset = MsdpValue::Table(
            [("RESET".to_string(), scalar("HEALTH"))].into_iter().collect(),
        );
        assert_eq!(
            model.interpret(&reset).unwrap(),
            vec![("HEALTH".to_string(), scalar("100"))]
        );

        // UNREPORT stops the pushes.
        let unreport = MsdpValue::Table(
            [("UNREPORT".to_string(), scalar("HEALTH"))].into_iter().collect(),
        );
        model.interpret(&unreport).unwrap();
        assert_eq!(model.set("HEALTH", "80"), None);
    }

    #[test]
    fn model_ignores_unreportable() {
        let mut model = ServerModel::new().variable("SECRET", "42");
        let report = MsdpValue::Table(
            [("REPORT".to_string(), scalar("SECRET"))].into_iter().collect(),
        );
        assert!(model.interpret(&report).unwrap().is_empty());
    }
}
