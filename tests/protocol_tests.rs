//! Integration tests for envelope parsing and the bus event codec

use tandem::protocol::{
    deserialize, encode_envelope, envelope_from_event, parse_envelope, parse_payload, serialize,
    BusEvent, Envelope, MessageType, MoveEventPayload, MovePayload, ProtocolError,
    StartGamePayload, TimePayload, MAX_MESSAGE_SIZE,
};
use tandem::Side;

#[test]
fn test_parse_move_envelope() {
    let text = r#"{"type":"move","data":{"fromSquare":"e2","toSquare":"e4"}}"#;
    let envelope = parse_envelope(text, MAX_MESSAGE_SIZE).expect("should parse");
    assert_eq!(envelope.kind, MessageType::Move);

    let payload: MovePayload = parse_payload(&envelope).expect("should decode payload");
    assert_eq!(payload.from_square, "e2");
    assert_eq!(payload.to_square, "e4");
    assert_eq!(payload.promotion, None);
}

#[test]
fn test_parse_time_sync_without_data() {
    let envelope = parse_envelope(r#"{"type":"time_sync"}"#, MAX_MESSAGE_SIZE).unwrap();
    assert_eq!(envelope.kind, MessageType::TimeSync);
    assert!(envelope.data.is_null());
}

#[test]
fn test_unknown_type_is_not_an_error() {
    let envelope = parse_envelope(r#"{"type":"chat","data":{"text":"hi"}}"#, MAX_MESSAGE_SIZE)
        .expect("unknown types still parse");
    assert_eq!(envelope.kind, MessageType::Unknown);
}

#[test]
fn test_malformed_json_rejected() {
    let result = parse_envelope("{not json", MAX_MESSAGE_SIZE);
    assert!(matches!(result, Err(ProtocolError::MalformedMessage(_))));

    let result = parse_envelope(r#"{"data":{}}"#, MAX_MESSAGE_SIZE);
    assert!(matches!(result, Err(ProtocolError::MalformedMessage(_))));
}

#[test]
fn test_oversized_message_rejected() {
    let text = format!(r#"{{"type":"signal","data":{{"message":"{}"}}}}"#, "x".repeat(200));
    let result = parse_envelope(&text, 64);
    match result {
        Err(ProtocolError::MessageTooLarge { size, max }) => {
            assert_eq!(size, text.len());
            assert_eq!(max, 64);
        }
        other => panic!("Expected MessageTooLarge, got {:?}", other),
    }
}

#[test]
fn test_move_payload_missing_square() {
    let envelope = parse_envelope(r#"{"type":"move","data":{"fromSquare":"e2"}}"#, 1024).unwrap();
    let result: Result<MovePayload, _> = parse_payload(&envelope);
    assert!(matches!(
        result,
        Err(ProtocolError::InvalidPayload { kind: "move", .. })
    ));
}

#[test]
fn test_envelope_wire_shape() {
    let envelope = Envelope::new(
        MessageType::TimeSync,
        &TimePayload {
            white_time_ms: 1000,
            black_time_ms: 2000,
        },
    )
    .unwrap();
    let text = encode_envelope(&envelope).unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();

    assert_eq!(value["type"], "time_sync");
    assert_eq!(value["data"]["whiteTimeMs"], 1000);
    assert_eq!(value["data"]["blackTimeMs"], 2000);
}

#[test]
fn test_signal_envelope() {
    let text = encode_envelope(&Envelope::signal("connected")).unwrap();
    assert_eq!(text, r#"{"type":"signal","data":{"message":"connected"}}"#);
}

#[test]
fn test_bus_event_survives_messagepack() {
    let event = BusEvent::new(
        MessageType::Move,
        "session-1",
        Some("guest-a".to_string()),
        &MoveEventPayload {
            from_square: "e2".to_string(),
            to_square: "e4".to_string(),
            board: "some-board".to_string(),
            white_time_ms: 299_000,
            black_time_ms: 300_000,
            ended: false,
        },
    )
    .unwrap();

    let bytes = serialize(&event).expect("serialize failed");
    let decoded: BusEvent = deserialize(&bytes).expect("deserialize failed");
    assert_eq!(decoded, event);

    let envelope = envelope_from_event(&decoded).unwrap();
    assert_eq!(envelope.kind, MessageType::Move);
    assert_eq!(envelope.data["fromSquare"], "e2");
    assert_eq!(envelope.data["whiteTimeMs"], 299_000);
    assert_eq!(envelope.data["ended"], false);
}

#[test]
fn test_bus_event_without_originator() {
    let event = BusEvent::new(
        MessageType::StartGame,
        "session-2",
        None,
        &StartGamePayload {
            board: "start".to_string(),
            player_color: String::new(),
        },
    )
    .unwrap();

    let decoded: BusEvent = deserialize(&serialize(&event).unwrap()).unwrap();
    assert_eq!(decoded.originating_identity, None);
    assert_eq!(decoded.kind, MessageType::StartGame);
}

#[test]
fn test_garbage_bytes_rejected() {
    let result: Result<BusEvent, _> = deserialize(&[0xc1, 0x00, 0xff]);
    assert!(matches!(result, Err(ProtocolError::MalformedMessage(_))));
}

#[test]
fn test_start_game_for_side() {
    let payload = StartGamePayload::for_side("board", Side::Black);
    assert_eq!(payload.player_color, "b");

    let value = serde_json::to_value(&payload).unwrap();
    assert_eq!(value["playerColor"], "b");
    assert_eq!(value["board"], "board");
}
