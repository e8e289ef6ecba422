use querent_core::{EventCallbackInterface, EventDispatcher, EventHandler, EventState, EventType};
use tokio_test::assert_ok;

struct MockCallback;

impl EventCallbackInterface for MockCallback {
    fn handle_event(&mut self, event_type: EventType, event_data: EventState) {
        assert_eq!(event_type.as_str(), "state_transition");
        assert_eq!(event_data.payload, "TestPayload");
    }
}

fn event_data(event_type: &str, payload: &str) -> EventState {
    let mapping = serde_json::json!({
        "event_type": event_type,
        "timestamp": 123.45,
        "payload": payload,
    });
    EventState::from_mapping(&mapping).unwrap()
}

#[test]
fn test_callback_accepts_expected_event() {
    let mut callback = MockCallback;
    let data = event_data("state_transition", "TestPayload");

    assert_eq!(data.timestamp, 123.45);
    callback.handle_event(EventType::StateTransition, data);
}

#[test]
#[should_panic]
fn test_callback_rejects_other_payload() {
    let mut callback = MockCallback;
    callback.handle_event(
        EventType::StateTransition,
        event_data("state_transition", "SomethingElse"),
    );
}

#[test]
#[should_panic]
fn test_callback_rejects_other_event_type() {
    let mut callback = MockCallback;
    callback.handle_event(
        EventType::ChatCompleted,
        event_data("chat_completed", "TestPayload"),
    );
}

#[test]
fn test_event_data_requires_all_keys() {
    let mapping = serde_json::json!({ "event_type": "state_transition", "payload": "x" });
    let err = EventState::from_mapping(&mapping).unwrap_err();
    assert!(err.to_string().contains("timestamp"));

    let mapping = serde_json::json!({
        "event_type": "not_an_event",
        "timestamp": 1,
        "payload": "x",
    });
    assert!(EventState::from_mapping(&mapping).is_err());
}

#[test]
fn test_dispatcher_drives_callback() {
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(EventType::StateTransition, MockCallback);

    let ran = dispatcher.dispatch(
        EventType::StateTransition,
        event_data("state_transition", "TestPayload"),
    );
    assert_eq!(ran, 1);
    assert_eq!(
        dispatcher.dispatch(EventType::TokenProcessed, event_data("token_processed", "")),
        0
    );
}

#[test]
fn test_handler_channel_feeds_callback() {
    let (handler, mut rx) = EventHandler::channel(4);
    tokio_test::block_on(async {
        assert_ok!(
            handler
                .send_event(
                    EventType::StateTransition,
                    event_data("state_transition", "TestPayload"),
                )
                .await
        );
    });

    let (event_type, state) = rx.try_recv().unwrap();
    let mut callback = MockCallback;
    callback.handle_event(event_type, state);
}
