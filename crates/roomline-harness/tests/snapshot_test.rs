//! Snapshot tests of a settled session.
//!
//! A short script runs to completion and the observable state is compared
//! against inline JSON snapshots. A change in what the client subscribes to,
//! holds or shows turns up as a snapshot diff.

use roomline_harness::{
    ClientSnapshot, Scenario, SharedSimBroker, SimBroker, create_shared_broker, lock_broker, play,
};
use roomline_proto::UserId;

const ANA: UserId = 1;
const BO: UserId = 2;

fn world() -> SharedSimBroker {
    let mut broker = SimBroker::new();
    broker.add_user(ANA, "ana", "ana-token");
    broker.add_user(BO, "bo", "bo-token");
    broker.create_room(10, "general", &[ANA, BO]);
    broker.create_room(20, "random", &[ANA, BO]);
    create_shared_broker(broker)
}

#[tokio::test(start_paused = true)]
async fn chatting_in_a_room() {
    let broker = world();
    let scenario = Scenario::new().open(10).post(10, BO, "hi").text("hey");
    let mut runtime = scenario.into_runtime(&broker, ANA, "ana-token");

    play(&mut runtime, None).await.unwrap();

    let snapshot = ClientSnapshot::from_runtime(runtime.app(), runtime.bridge());
    insta::assert_json_snapshot!(snapshot, @r###"
    {
      "user_id": 1,
      "connected": true,
      "subscriptions": [
        "rooms-of-user/1",
        "room/10/messages",
        "room/10/read-status"
      ],
      "open_room": 10,
      "shown_room": 10,
      "timeline": [
        1,
        2
      ],
      "view": [
        1,
        2
      ],
      "cached_rooms": [
        10
      ],
      "room_list": [
        10,
        20
      ]
    }
    "###);
}

#[tokio::test(start_paused = true)]
async fn history_after_chatting() {
    let broker = world();
    let scenario = Scenario::new().open(10).post(10, BO, "hi").text("hey");
    let mut runtime = scenario.into_runtime(&broker, ANA, "ana-token");

    play(&mut runtime, None).await.unwrap();

    // Ana read Bo's message; Bo has not read hers
    let history = lock_broker(&broker).history(10, None, 50);
    insta::assert_json_snapshot!(history, { "[].createdAt" => "[time]" }, @r###"
    [
      {
        "messageId": 1,
        "roomId": 10,
        "senderId": 2,
        "senderNickname": "bo",
        "senderProfileImageUrl": null,
        "type": "TEXT",
        "content": "hi",
        "fileUrl": null,
        "fileName": null,
        "createdAt": "[time]",
        "unreadCount": 0
      },
      {
        "messageId": 2,
        "roomId": 10,
        "senderId": 1,
        "senderNickname": "ana",
        "senderProfileImageUrl": null,
        "type": "TEXT",
        "content": "hey",
        "fileUrl": null,
        "fileName": null,
        "createdAt": "[time]",
        "unreadCount": 1
      }
    ]
    "###);
}
