//! MSSP (Mud Server Status Protocol) configuration and wire codec.
//!
//! Wire variable names come from the serde rename metadata on
//! [`MsspConfig`]'s fields, so the struct serialises straight into the name
//! table the protocol crawlers expect. Unknown variables land in the
//! flattened `extended` map, preserving scalar-vs-list multiplicity.

use std::collections::BTreeMap;

use encoding_rs::Encoding;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use tokio_util::bytes::{BufMut, Bytes, BytesMut};

use crate::error::MsspError;
use crate::telnet::subneg;

/// Server facts published over MSSP.
///
/// Field names on the wire are the serde renames; every field is optional
/// and omitted from the wire when unset. Booleans encode as "1"/"0", numbers
/// as their decimal form, lists as one `MSSP_VAL` per element.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MsspConfig {
    #[serde(rename = "NAME", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(
        rename = "PLAYERS",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "de_number"
    )]
    pub players: Option<u64>,

    /// Unix timestamp of the last boot.
    #[serde(
        rename = "UPTIME",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "de_signed"
    )]
    pub uptime: Option<i64>,

    #[serde(
        rename = "CRAWL DELAY",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "de_signed"
    )]
    pub crawl_delay: Option<i64>,

    #[serde(rename = "HOSTNAME", skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    #[serde(
        rename = "PORT",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "de_number"
    )]
    pub port: Option<u64>,

    #[serde(rename = "CODEBASE", skip_serializing_if = "Option::is_none")]
    pub codebase: Option<String>,

    #[serde(rename = "CONTACT", skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,

    /// Year the MUD was created.
    #[serde(
        rename = "CREATED",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "de_number"
    )]
    pub created: Option<u64>,

    #[serde(rename = "ICON", skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    #[serde(rename = "LANGUAGE", skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    #[serde(rename = "LOCATION", skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    #[serde(
        rename = "MINIMUM AGE",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "de_number"
    )]
    pub minimum_age: Option<u64>,

    #[serde(rename = "WEBSITE", skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,

    #[serde(
        rename = "FAMILY",
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "de_list"
    )]
    pub family: Vec<String>,

    #[serde(rename = "GENRE", skip_serializing_if = "Option::is_none")]
    pub genre: Option<String>,

    #[serde(rename = "GAMEPLAY", skip_serializing_if = "Option::is_none")]
    pub gameplay: Option<String>,

    #[serde(rename = "STATUS", skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(rename = "GAMESYSTEM", skip_serializing_if = "Option::is_none")]
    pub gamesystem: Option<String>,

    #[serde(
        rename = "INTERMUD",
        skip_serializing_if = "Vec::is_empty",
        deserialize_with = "de_list"
    )]
    pub intermud: Vec<String>,

    #[serde(rename = "SUBGENRE", skip_serializing_if = "Option::is_none")]
    pub subgenre: Option<String>,

    #[serde(
        rename = "AREAS",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "de_number"
    )]
    pub areas: Option<u64>,

    #[serde(
        rename = "HELPFILES",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "de_number"
    )]
    pub helpfiles: Option<u64>,

    #[serde(
        rename = "MOBILES",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "de_number"
    )]
    pub mobiles: Option<u64>,

    #[serde(
        rename = "OBJECTS",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "de_number"
    )]
    pub objects: Option<u64>,

    #[serde(
        rename = "ROOMS",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "de_number"
    )]
    pub rooms: Option<u64>,

    #[serde(
        rename = "CLASSES",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "de_number"
    )]
    pub classes: Option<u64>,

    #[serde(rename = "LEVELS", skip_serializing_if = "Option::is_none")]
    pub levels: Option<String>,

    #[serde(
        rename = "RACES",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "de_number"
    )]
    pub races: Option<u64>,

    #[serde(
        rename = "SKILLS",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "de_number"
    )]
    pub skills: Option<u64>,

    #[serde(
        rename = "ANSI",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "de_flag"
    )]
    pub ansi: Option<bool>,

    #[serde(
        rename = "UTF-8",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "de_flag"
    )]
    pub utf8: Option<bool>,

    #[serde(
        rename = "VT100",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "de_flag"
    )]
    pub vt100: Option<bool>,

    #[serde(
        rename = "XTERM 256 COLORS",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "de_flag"
    )]
    pub xterm_256_colors: Option<bool>,

    #[serde(
        rename = "MXP",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "de_flag"
    )]
    pub mxp: Option<bool>,

    #[serde(
        rename = "PUEBLO",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "de_flag"
    )]
    pub pueblo: Option<bool>,

    #[serde(
        rename = "PAY TO PLAY",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "de_flag"
    )]
    pub pay_to_play: Option<bool>,

    /// Variables with no dedicated field. Multiplicity is preserved: a
    /// variable sent with one value decodes as a scalar, with several as a
    /// list.
    #[serde(flatten)]
    pub extended: BTreeMap<String, MsspList>,
}

/// An extended MSSP variable's value: one value or several.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MsspList {
    Scalar(String),
    List(Vec<String>),
}

/// Encode a config to the subnegotiation body (unescaped).
pub fn encode(config: &MsspConfig) -> Result<Bytes, MsspError> {
    let value = serde_json::to_value(config)
        .map_err(|err| MsspError::Invalid(err.to_string()))?;
    let serde_json::Value::Object(fields) = value else {
        return Err(MsspError::NotAnObject);
    };

    let mut out = BytesMut::new();
    for (name, value) in &fields {
        out.put_u8(subneg::MSSP_VAR);
        out.put_slice(name.as_bytes());
        match value {
            serde_json::Value::Array(items) => {
                for item in items {
                    out.put_u8(subneg::MSSP_VAL);
                    put_scalar(&mut out, item);
                }
            }
            scalar => {
                out.put_u8(subneg::MSSP_VAL);
                put_scalar(&mut out, scalar);
            }
        }
    }
    Ok(out.freeze())
}

fn put_scalar(out: &mut BytesMut, value: &serde_json::Value) {
    match value {
        serde_json::Value::Bool(true) => out.put_slice(b"1"),
        serde_json::Value::Bool(false) => out.put_slice(b"0"),
        serde_json::Value::String(s) => out.put_slice(s.as_bytes()),
        other => out.put_slice(other.to_string().as_bytes()),
    }
}

/// Decode a subnegotiation body (already unescaped) into a config.
pub fn decode(body: &[u8], encoding: &'static Encoding) -> Result<MsspConfig, MsspError> {
    let mut fields = serde_json::Map::new();
    let mut pos = 0usize;

    if body.first() != Some(&subneg::MSSP_VAR) {
        return Err(MsspError::MissingVar);
    }

    while pos < body.len() {
        // Cursor sits on MSSP_VAR.
        pos += 1;
        let name = take_token(body, &mut pos, encoding);
        let mut values = Vec::new();
        while body.get(pos) == Some(&subneg::MSSP_VAL) {
            pos += 1;
            values.push(take_token(body, &mut pos, encoding));
        }
        if values.is_empty() {
            return Err(MsspError::MissingValue(name));
        }
        let value = if values.len() == 1 {
            serde_json::Value::String(values.remove(0))
        } else {
            serde_json::Value::Array(
                values.into_iter().map(serde_json::Value::String).collect(),
            )
        };
        fields.insert(name, value);
    }

    MsspConfig::deserialize(serde_json::Value::Object(fields))
        .map_err(|err| MsspError::Invalid(err.to_string()))
}

fn take_token(body: &[u8], pos: &mut usize, encoding: &'static Encoding) -> String {
    let start = *pos;
    while *pos < body.len()
        && !matches!(body[*pos], subneg::MSSP_VAR | subneg::MSSP_VAL)
    {
        *pos += 1;
    }
    let (text, _, _) = encoding.decode(&body[start..*pos]);
    text.into_owned()
}

fn de_number<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(n)) => Ok(n.as_u64()),
        Some(serde_json::Value::String(s)) => {
            s.parse().map(Some).map_err(D::Error::custom)
        }
        Some(other) => Err(D::Error::custom(format!("expected number, got {other}"))),
    }
}

fn de_signed<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(n)) => Ok(n.as_i64()),
        Some(serde_json::Value::String(s)) => {
            s.parse().map(Some).map_err(D::Error::custom)
        }
        Some(other) => Err(D::Error::custom(format!("expected number, got {other}"))),
    }
}

/// A list field arrives as one `MSSP_VAL` (a lone string) or several.
fn de_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(Vec::new()),
        Some(serde_json::Value::String(s)) => Ok(vec![s]),
        Some(serde_json::Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                serde_json::Value::String(s) => Ok(s),
                other => Err(D::Error::custom(format!("expected string, got {other}"))),
            })
            .collect(),
        Some(other) => Err(D::Error::custom(format!("expected list, got {other}"))),
    }
}

fn de_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Bool(b)) => Ok(Some(b)),
        Some(serde_json::Value::String(s)) => match s.as_str() {
            "1" => Ok(Some(true)),
            "0" => Ok(Some(false)),
            other => Err(D::Error::custom(format!("expected 1/0, got '{other}'"))),
        },
        Some(other) => Err(D::Error::custom(format!("expected flag, got {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use encoding_rs::UTF_8;
    use pretty_assertions::assert_eq;

    use super::*;

    fn sample() -> MsspConfig {
        MsspConfig {
            name: Some("Moonshadow Keep".to_string()),
            players: Some(17),
            uptime: Some(1_700_000_000),
            hostname: Some("mud.example.com".to_string()),
            port: Some(4000),
            codebase: Some("mudwire".to_string()),
            ansi: Some(true),
            utf8: Some(true),
            pay_to_play: Some(false),
            family: vec!["DikuMUD".to_string(), "Merc".to_string()],
            extended: [
                (
                    "IP".to_string(),
                    MsspList::List(vec!["10.0.0.1".to_string(), "::1".to_string()]),
                ),
                ("DISCORD".to_string(), MsspList::Scalar("mudwire".to_string())),
            ]
            .into_iter()
            .collect(),
            ..MsspConfig::default()
        }
    }

    #[test]
    fn round_trip_preserves_structure() {
        let config = sample();
        let wire = encode(&config).unwrap();
        let decoded = decode(&wire, UTF_8).unwrap();
        assert_eq!(decoded, config);
    }

    #[test]
    fn booleans_encode_as_digits() {
        let config = MsspConfig {
            ansi: Some(true),
            pay_to_play: Some(false),
            ..MsspConfig::default()
        };
        let wire = encode(&config).unwrap();
        // VAR "ANSI" VAL "1" VAR "PAY TO PLAY" VAL "0"
        let expected = [
            &[1u8][..],
            b"ANSI",
            &[2],
            b"1",
            &[1],
            b"PAY TO PLAY",
            &[2],
            b"0",
        ]
        .concat();
        assert_eq!(wire.as_ref(), expected.as_slice());
    }

    #[test]
    fn list_values_repeat_val_marker() {
        let config = MsspConfig {
            family: vec!["DikuMUD".to_string(), "Merc".to_string()],
            ..MsspConfig::default()
        };
        let wire = encode(&config).unwrap();
        let expected = [
            &[1u8][..],
            b"FAMILY",
            &[2],
            b"DikuMUD",
            &[2],
            b"Merc",
        ]
        .concat();
        assert_eq!(wire.as_ref(), expected.as_slice());
    }

    #[test]
    fn single_value_list_field_round_trips() {
        let config = MsspConfig {
            family: vec!["DikuMUD".to_string()],
            ..MsspConfig::default()
        };
        let wire = encode(&config).unwrap();
        assert_eq!(decode(&wire, UTF_8).unwrap(), config);
    }

    #[test]
    fn decode_rejects_missing_value() {
        let body = [&[1u8][..], b"NAME"].concat();
        assert!(matches!(
            decode(&body, UTF_8),
            Err(MsspError::MissingValue(name)) if name == "NAME"
        ));
    }

    #[test]
    fn decode_rejects_leading_garbage() {
        assert!(matches!(
            decode(b"NAME", UTF_8),
            Err(MsspError::MissingVar)
        ));
    }

    #[test]
    fn extended_multiplicity_round_trips() {
        let config = sample();
        let wire = encode(&config).unwrap();
        let decoded = decode(&wire, UTF_8).unwrap();
        assert_eq!(
            decoded.extended.get("DISCORD"),
            Some(&MsspList::Scalar("mudwire".to_string()))
        );
        assert!(matches!(
            decoded.extended.get("IP"),
            Some(MsspList::List(list)) if list.len() == 2
        ));
    }
}
