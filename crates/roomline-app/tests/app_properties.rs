//! Property-based tests for the App state machine.
//!
//! Tests verify that invariants hold under arbitrary input sequences.
//! This ensures behavioral correctness across all possible execution paths.

use std::{collections::VecDeque, sync::Arc, time::Duration};

use proptest::prelude::*;
use roomline_app::{App, AppAction, AppEvent, Bridge, Screen, UserInput};
use roomline_client::{Environment, MemoryCredentialStore, SessionConfig, TransportEvent};
use roomline_proto::{Command, Frame, Packet, Topic, headers};

#[derive(Clone)]
struct TestEnv;

impl Environment for TestEnv {
    type Instant = std::time::Instant;

    fn now(&self) -> Self::Instant {
        std::time::Instant::now()
    }

    async fn sleep(&self, _duration: Duration) {}
}

/// Generate random navigation and typing.
fn input_strategy() -> impl Strategy<Value = UserInput> {
    prop_oneof![
        3 => (1u64..5).prop_map(UserInput::Open),
        2 => Just(UserInput::Back),
        1 => Just(UserInput::More),
        1 => Just(UserInput::Refresh),
        1 => "[a-z ]{1,12}".prop_map(UserInput::Text),
    ]
}

/// Process actions from App through Bridge and update App state.
fn process_actions(app: &mut App, bridge: &mut Bridge<TestEnv>, actions: Vec<AppAction>) {
    let mut pending: VecDeque<AppAction> = actions.into();
    while let Some(action) = pending.pop_front() {
        for event in bridge.process_app_action(action) {
            pending.extend(app.handle(event));
        }
    }
}

fn connected() -> (App, Bridge<TestEnv>) {
    let mut app = App::new();
    let mut bridge =
        Bridge::new(TestEnv, 1, Arc::new(MemoryCredentialStore::new()), SessionConfig::default());

    let actions = app.connect();
    process_actions(&mut app, &mut bridge, actions);
    bridge.transport_opened();

    let ack = Frame::new(Command::Connected).with_header(headers::HEART_BEAT, "0,0");
    for event in bridge.handle_transport(TransportEvent::Packet(Packet::Frame(ack))) {
        app.handle(event);
    }
    (app, bridge)
}

proptest! {
    /// The App and the Client always agree on which room is open.
    #[test]
    fn prop_open_room_agrees(inputs in prop::collection::vec(input_strategy(), 0..40)) {
        let (mut app, mut bridge) = connected();

        for input in inputs {
            let actions = app.handle(AppEvent::Input(input));
            process_actions(&mut app, &mut bridge, actions);
            prop_assert_eq!(app.open_room(), bridge.client().active_room());
        }
    }

    /// Live topics are the user feed plus the open room's topics, nothing
    /// else.
    #[test]
    fn prop_only_open_room_subscribed(inputs in prop::collection::vec(input_strategy(), 0..40)) {
        let (mut app, mut bridge) = connected();

        for input in inputs {
            let actions = app.handle(AppEvent::Input(input));
            process_actions(&mut app, &mut bridge, actions);
        }

        let mut expected = vec![Topic::UserRooms(1)];
        if let Screen::Room { room_id } = app.screen() {
            expected.extend(Topic::room_topics(room_id));
        }
        let mut topics = bridge.client().subscribed_topics();
        topics.sort();
        expected.sort();
        prop_assert_eq!(topics, expected);
    }

    /// Plain lines are message text, verbatim.
    #[test]
    fn prop_plain_lines_are_text(line in "[a-zA-Z0-9][a-zA-Z0-9 .,!?]{0,40}") {
        prop_assert_eq!(UserInput::parse(&line), Ok(UserInput::Text(line.clone())));
    }

    /// Parsing never panics, whatever the line.
    #[test]
    fn prop_parse_total(line in ".{0,60}") {
        let _ = UserInput::parse(&line);
    }
}
