//! Network simulation tests using turmoil.
//!
//! The simulated broker is served over a WebSocket on a turmoil host. The
//! client side uses the production WebSocket transport over a turmoil TCP
//! stream, so frames are really encoded, sent and decoded.

use std::{error::Error, sync::Arc, time::Duration};

use futures::{SinkExt, StreamExt};
use roomline_client::{
    Client, ClientAction, ClientEvent, MemoryCredentialStore, SessionConfig, TransportEvent,
    transport::{self, ConnectedTransport},
};
use roomline_harness::{SharedSimBroker, SimBroker, SimEnv, create_shared_broker, lock_broker};
use roomline_proto::{
    Packet, RoomId, Topic, UserId,
    payloads::{SendMessageRequest, TokenPair},
};
use tokio_tungstenite::tungstenite::Message;
use turmoil::net::{TcpListener, TcpStream};

type BoxError = Box<dyn Error + Send + Sync>;

const ANA: UserId = 1;
const BO: UserId = 2;
const ROOM: RoomId = 10;

fn world() -> SharedSimBroker {
    let mut broker = SimBroker::new();
    broker.add_user(ANA, "ana", "ana-token");
    broker.add_user(BO, "bo", "bo-token");
    broker.create_room(ROOM, "general", &[ANA, BO]);
    create_shared_broker(broker)
}

/// Accept WebSocket connections and hand their frames to the broker.
async fn serve(broker: SharedSimBroker) -> turmoil::Result {
    let listener = TcpListener::bind("0.0.0.0:8080").await?;
    loop {
        let (stream, _) = listener.accept().await?;
        let broker = Arc::clone(&broker);
        tokio::spawn(async move {
            if let Err(e) = serve_connection(broker, stream).await {
                tracing::debug!(error = %e, "broker connection failed");
            }
        });
    }
}

async fn serve_connection(broker: SharedSimBroker, stream: TcpStream) -> Result<(), BoxError> {
    let mut ws = tokio_tungstenite::accept_async(stream).await?;
    let connection = lock_broker(&broker).open()?;

    loop {
        tokio::select! {
            incoming = ws.next() => {
                let bytes = match incoming {
                    Some(Ok(Message::Text(text))) => text.as_bytes().to_vec(),
                    Some(Ok(Message::Binary(data))) => data.to_vec(),
                    Some(Ok(_)) => continue,
                    Some(Err(_)) | None => break,
                };
                let packets = Packet::decode_all(&bytes)?;
                let mut state = lock_broker(&broker);
                for packet in packets {
                    state.receive(connection, packet);
                }
            },
            // Pushes caused by other connections or by the test itself
            () = tokio::time::sleep(Duration::from_millis(10)) => {},
        }

        loop {
            let event = lock_broker(&broker).take_event(connection);
            match event {
                Some(TransportEvent::Packet(packet)) => {
                    let text = String::from_utf8(packet.encode()?)?;
                    ws.send(Message::Text(text.into())).await?;
                },
                Some(TransportEvent::Closed(_)) => {
                    ws.close(None).await?;
                    return Ok(());
                },
                None => break,
            }
        }
    }

    lock_broker(&broker).close(connection);
    Ok(())
}

/// A Client driven over the real WebSocket transport.
struct NetSession {
    client: Client<SimEnv>,
    transport: ConnectedTransport,
}

impl NetSession {
    async fn connect(user_id: UserId, token: &str) -> Result<Self, Box<dyn Error>> {
        let credentials = MemoryCredentialStore::with_tokens(TokenPair {
            access_token: token.to_string(),
            refresh_token: format!("{token}-refresh"),
        });
        let config = SessionConfig::default();
        let mut client = Client::new(SimEnv::new(), Arc::new(credentials), config);

        let actions = client.handle(ClientEvent::Connect { user_id })?;
        assert!(actions.iter().any(|a| matches!(a, ClientAction::OpenTransport)));

        let stream = TcpStream::connect("broker:8080").await?;
        let transport = transport::connect_stream("ws://broker:8080/ws", stream).await?;

        let mut session = Self { client, transport };
        let actions = session.client.handle(ClientEvent::TransportOpened)?;
        session.perform(actions).await?;
        Ok(session)
    }

    async fn handle(
        &mut self,
        event: ClientEvent<tokio::time::Instant>,
    ) -> Result<(), Box<dyn Error>> {
        let actions = self.client.handle(event)?;
        self.perform(actions).await
    }

    async fn perform(&mut self, actions: Vec<ClientAction>) -> Result<(), Box<dyn Error>> {
        for action in actions {
            if let ClientAction::Send(packet) = action {
                self.transport.to_server.send(packet).await?;
            }
        }
        Ok(())
    }

    /// Feed transport events to the client until `done` holds.
    async fn until(
        &mut self,
        done: impl Fn(&Client<SimEnv>) -> bool,
    ) -> Result<(), Box<dyn Error>> {
        while !done(&self.client) {
            let event = self.transport.from_server.recv().await.ok_or("transport task ended")?;
            self.handle(event.into()).await?;
        }
        Ok(())
    }
}

#[test]
fn handshake_subscribes_feed_over_the_network() {
    let broker = world();
    let mut sim = turmoil::Builder::new().build();

    let served = Arc::clone(&broker);
    sim.host("broker", move || serve(Arc::clone(&served)));

    sim.client("ana", async move {
        let mut session = NetSession::connect(ANA, "ana-token").await?;
        session.until(|c| c.is_confirmed(Topic::UserRooms(ANA))).await?;

        assert!(session.client.is_connected());
        assert_eq!(lock_broker(&broker).subscriptions(ANA), vec![Topic::UserRooms(ANA)]);
        Ok(())
    });

    sim.run().unwrap();
}

#[test]
fn pushed_message_reaches_the_open_room() {
    let broker = world();
    let mut sim = turmoil::Builder::new().build();

    let served = Arc::clone(&broker);
    sim.host("broker", move || serve(Arc::clone(&served)));

    sim.client("ana", async move {
        let mut session = NetSession::connect(ANA, "ana-token").await?;
        session.until(|c| c.is_confirmed(Topic::UserRooms(ANA))).await?;

        session.handle(ClientEvent::OpenRoom { room_id: ROOM }).await?;
        session.handle(ClientEvent::HistoryLoaded { room_id: ROOM, messages: Vec::new() }).await?;
        let room_topics = Topic::room_topics(ROOM);
        session.until(|c| room_topics.iter().all(|t| c.is_confirmed(*t))).await?;

        lock_broker(&broker).post_message(ROOM, BO, &SendMessageRequest::text("over the wire"));
        session.until(|c| c.timeline().is_some_and(|t| !t.messages().is_empty())).await?;

        let timeline = session.client.timeline().ok_or("no open room")?;
        assert_eq!(timeline.messages()[0].content.as_deref(), Some("over the wire"));

        // The read receipt travels back and clears Bo's unread count for Ana
        session.until(|_| lock_broker(&broker).history(ROOM, None, 50)[0].unread_count == 0).await?;
        Ok(())
    });

    sim.run().unwrap();
}

#[test]
fn broker_drop_is_reported_as_a_disconnect() {
    let broker = world();
    let mut sim = turmoil::Builder::new().build();

    let served = Arc::clone(&broker);
    sim.host("broker", move || serve(Arc::clone(&served)));

    sim.client("ana", async move {
        let mut session = NetSession::connect(ANA, "ana-token").await?;
        session.until(|c| c.is_confirmed(Topic::UserRooms(ANA))).await?;

        lock_broker(&broker).drop_all();
        session.until(|c| !c.is_connected()).await?;

        assert!(session.client.subscribed_topics().is_empty());
        Ok(())
    });

    sim.run().unwrap();
}
