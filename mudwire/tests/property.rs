//! Property tests: the engine must make forward progress on arbitrary
//! input — 0xFF-heavy garbage included — and no subnegotiation byte may
//! ever leak into user data.

use mudwire::engine::Event;
use mudwire::{Engine, Role, TelnetOption};
use proptest::prelude::*;

fn engine_with_everything() -> Engine {
    Engine::builder(Role::Server)
        .options(TelnetOption::ALL)
        .build()
        .unwrap()
}

/// Byte sequences biased towards protocol-significant values so the
/// interesting transitions actually get exercised.
fn wire_bytes() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(
        prop_oneof![
            2 => Just(0xFFu8),                 // IAC
            2 => prop::sample::select(vec![
                0xFAu8, 0xFB, 0xFC, 0xFD, 0xFE, 0xF0, 0xF1, 0xF9, 0xEF,
            ]),
            1 => prop::sample::select(vec![
                1u8, 3, 5, 24, 25, 31, 32, 33, 34, 35, 36, 37, 38, 39, 42,
                69, 70, 86, 87, 201,
            ]),
            4 => any::<u8>(),
        ],
        0..512,
    )
}

proptest! {
    /// Feeding any byte sequence neither errors nor wedges: after a short
    /// recovery tail (two IAC SE pairs resolve any half-open frame), the
    /// machine is back in `Accepting`.
    #[test]
    fn forward_progress(bytes in wire_bytes()) {
        let mut engine = engine_with_everything();
        engine.receive_all(&bytes).unwrap();
        engine.receive_all(&[0xFF, 0xF0, 0xFF, 0xF0]).unwrap();
        prop_assert_eq!(engine.state(), mudwire::machine::State::Accepting);
    }

    /// The engine still frames lines correctly after arbitrary garbage.
    #[test]
    fn liveness_after_garbage(bytes in wire_bytes()) {
        let mut engine = engine_with_everything();
        engine.receive_all(&bytes).unwrap();
        engine.receive_all(&[0xFF, 0xF0, 0xFF, 0xF0]).unwrap();
        let _ = engine.drain_events();

        engine.receive_all(b"still alive\r\n").unwrap();
        let lines: Vec<_> = engine
            .drain_events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Line { bytes, .. } => Some(bytes),
                _ => None,
            })
            .collect();
        // The garbage may have left a partial line buffered; our text still
        // flushes at the end of it.
        prop_assert_eq!(lines.len(), 1);
        prop_assert!(lines[0].ends_with(b"still alive"));
    }

    /// No byte of an unknown subnegotiation body may reach user data.
    #[test]
    fn no_leakage_from_unknown_subnegotiation(payload in prop::collection::vec(any::<u8>(), 0..256)) {
        let mut engine = engine_with_everything();
        let mut input = vec![0xFF, 0xFA, 0x7E];
        input.extend_from_slice(&mudwire::telnet_safe(&payload));
        input.extend_from_slice(&[0xFF, 0xF0]);
        engine.receive_all(&input).unwrap();

        for event in engine.drain_events() {
            prop_assert!(
                !matches!(event, Event::Line { .. } | Event::UserByte { .. }),
                "subnegotiation byte leaked into user data",
            );
        }

        engine.receive_all(b"after\r\n").unwrap();
        let lines: Vec<_> = engine
            .drain_events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Line { bytes, .. } => Some(bytes),
                _ => None,
            })
            .collect();
        prop_assert_eq!(lines.len(), 1);
        prop_assert_eq!(lines[0].as_ref(), b"after");
    }

    /// IAC transparency: a telnet_safe payload framed inside a claimed
    /// subnegotiation arrives bit-exact at the handler's capture buffer.
    #[test]
    fn iac_transparency(payload in prop::collection::vec(any::<u8>(), 0..256)) {
        let mut engine = Engine::builder(Role::Server)
            .option(TelnetOption::Authentication)
            .build()
            .unwrap();

        let mut input = vec![0xFF, 0xFA, 0x25];
        input.extend_from_slice(&mudwire::telnet_safe(&payload));
        input.extend_from_slice(&[0xFF, 0xF0]);
        engine.receive_all(&input).unwrap();

        let captured: Vec<_> = engine
            .drain_events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Authentication { payload } => Some(payload),
                _ => None,
            })
            .collect();
        prop_assert_eq!(captured.len(), 1);
        prop_assert_eq!(captured[0].as_ref(), payload.as_slice());
    }

    /// Round-trip: MSDP wire encoding of a flat table parses back to the
    /// same structure.
    #[test]
    fn msdp_flat_round_trip(
        pairs in prop::collection::btree_map("[A-Z_]{1,12}", "[A-Za-z0-9 ]{0,24}", 0..8)
    ) {
        use mudwire::MsdpValue;

        let mut engine = Engine::builder(Role::Client)
            .option(TelnetOption::Msdp)
            .build()
            .unwrap();

        let mut input = vec![0xFF, 0xFA, 0x45];
        for (name, value) in &pairs {
            let wire = mudwire::msdp::encode(name, &MsdpValue::from(value.clone()));
            input.extend_from_slice(&mudwire::telnet_safe(&wire));
        }
        input.extend_from_slice(&[0xFF, 0xF0]);
        engine.receive_all(&input).unwrap();

        let expected = serde_json::Value::Object(
            pairs
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect(),
        );
        let json: Vec<_> = engine
            .drain_events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Msdp { json } => Some(json),
                _ => None,
            })
            .collect();
        prop_assert_eq!(json.len(), 1);
        let parsed: serde_json::Value = serde_json::from_str(&json[0]).unwrap();
        prop_assert_eq!(parsed, expected);
    }
}
