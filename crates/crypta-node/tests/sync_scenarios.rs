//! End-to-end sync sessions against a node, driven through the transport
//! event interface.

use std::sync::Arc;

use crypta_node::{Node, NodeConfig};
use crypta_protocol::{LockAction, Message, MessageCodec, NotifyKind};
use crypta_store::{InMemoryStorage, PeerDirectory, Storage};
use crypta_sync::testing::RecordingTransport;
use crypta_sync::{TransferStatus, TransportEvents};
use crypta_types::{ObjectType, PeerAddress, PeerRecord};

struct Harness {
    _dir: tempfile::TempDir,
    node: Node,
    events: Arc<dyn TransportEvents>,
    storage: Arc<InMemoryStorage>,
    transport: Arc<RecordingTransport>,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(InMemoryStorage::new());
        let transport = Arc::new(RecordingTransport::new(addr("self-node")));
        let node = Node::create_with_storage(
            NodeConfig::new(dir.path().join("node")),
            transport.clone(),
            storage.clone(),
        )
        .unwrap();
        let events = node.events();
        Self {
            _dir: dir,
            node,
            events,
            storage,
            transport,
        }
    }

    async fn send(&self, from: &PeerAddress, msg: Message) {
        let payload = MessageCodec::encode(&msg).unwrap();
        self.events.on_message(from, &payload).await;
    }

    fn last_to(&self, to: &PeerAddress) -> Option<Message> {
        self.transport.messages_to(to).pop()
    }
}

fn addr(s: &str) -> PeerAddress {
    PeerAddress::new(s).unwrap()
}

#[tokio::test]
async fn lock_handover_between_two_peers() {
    let h = Harness::new();
    let a = addr("peer-a");
    let b = addr("peer-b");

    h.send(&a, Message::lock(LockAction::Request)).await;
    assert_eq!(h.last_to(&a), Some(Message::lock(LockAction::Accept)));

    h.send(&b, Message::lock(LockAction::Request)).await;
    assert_eq!(h.last_to(&b), Some(Message::lock(LockAction::Release)));

    h.send(&a, Message::lock(LockAction::Release)).await;
    h.send(&b, Message::lock(LockAction::Request)).await;
    assert_eq!(h.last_to(&b), Some(Message::lock(LockAction::Accept)));
    assert!(h.node.engine().lock().is_holder(&b));
}

#[tokio::test]
async fn pulling_a_missing_object() {
    let h = Harness::new();
    let a = addr("peer-a");
    h.send(&a, Message::lock(LockAction::Request)).await;
    h.send(&a, Message::request(ObjectType::Object, "X")).await;
    assert_eq!(
        h.last_to(&a),
        Some(Message::notify(NotifyKind::Missing, "X", ObjectType::Object))
    );
}

#[tokio::test]
async fn pulling_an_existing_object() {
    let h = Harness::new();
    let a = addr("peer-a");
    h.storage.store("doc", b"ciphertext").unwrap();
    h.send(&a, Message::lock(LockAction::Request)).await;
    h.send(&a, Message::request(ObjectType::Object, "doc")).await;

    let files = h.transport.files();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].address, a);
    assert_eq!(files[0].contents, b"ciphertext");
    assert!(h.transport.complete_file(0, TransferStatus::Success));
}

#[tokio::test]
async fn pushing_an_object() {
    let h = Harness::new();
    let a = addr("peer-a");
    h.send(&a, Message::lock(LockAction::Request)).await;
    h.send(&a, Message::push(ObjectType::Object, "Y", None)).await;
    assert_eq!(h.last_to(&a), Some(Message::request(ObjectType::Object, "Y")));

    let staging = h.events.on_file_offered(&a, "Y").unwrap();
    tokio::fs::write(&staging, b"new object").await.unwrap();
    h.events.on_file_received(&a, &staging, "Y").await;

    assert_eq!(h.storage.retrieve("Y").unwrap().unwrap(), b"new object");
    assert!(h.node.engine().transfers().is_empty());
    assert!(h.events.on_file_offered(&a, "Y").is_none());
}

#[tokio::test]
async fn pushing_a_peer_record_lands_in_peer_directory() {
    let h = Harness::new();
    let a = addr("peer-a");
    let record = PeerRecord::new(addr("carol-address"), "carol", true);
    h.send(&a, Message::lock(LockAction::Request)).await;
    h.send(&a, Message::push(ObjectType::Peer, "carol", Some("Carol".into()))).await;

    let staging = h.events.on_file_offered(&a, "carol").unwrap();
    tokio::fs::write(&staging, record.to_json().unwrap()).await.unwrap();
    h.events.on_file_received(&a, &staging, "carol").await;

    let peers = PeerDirectory::new(h.node.layout());
    assert_eq!(peers.ids().unwrap(), vec!["carol".to_string()]);
    assert_eq!(peers.load("carol").unwrap(), record);
}

#[tokio::test]
async fn unannounced_file_is_refused() {
    let h = Harness::new();
    let a = addr("peer-a");
    h.send(&a, Message::lock(LockAction::Request)).await;
    assert!(h.events.on_file_offered(&a, "Z").is_none());
}

#[tokio::test]
async fn clearing_the_lock_only_drops_the_holders_permissions() {
    let h = Harness::new();
    let a = addr("peer-a");
    let b = addr("peer-b");
    let engine = h.node.engine();

    engine.transfers().allow(&b, ObjectType::Object, "1", None);
    h.send(&a, Message::lock(LockAction::Request)).await;
    h.send(&a, Message::push(ObjectType::Object, "1", None)).await;
    h.send(&a, Message::push(ObjectType::Object, "2", None)).await;
    assert_eq!(engine.transfers().len(), 3);

    assert_eq!(engine.force_clear(), Some(a.clone()));
    assert!(!engine.transfers().contains(&a, "1"));
    assert!(!engine.transfers().contains(&a, "2"));
    assert!(engine.transfers().contains(&b, "1"));
}

#[tokio::test]
async fn non_holder_cannot_push_or_remove() {
    let h = Harness::new();
    let a = addr("peer-a");
    let intruder = addr("intruder");
    h.storage.store("keep", b"x").unwrap();
    h.send(&a, Message::lock(LockAction::Request)).await;

    h.send(&intruder, Message::push(ObjectType::Object, "evil", None)).await;
    h.send(
        &intruder,
        Message::notify(NotifyKind::Removed, "keep", ObjectType::Object),
    )
    .await;
    h.send(&intruder, Message::lock(LockAction::Release)).await;

    assert!(h.transport.messages_to(&intruder).is_empty());
    assert!(h.storage.contains("keep").unwrap());
    assert!(h.node.engine().lock().is_holder(&a));
}

#[tokio::test]
async fn lifecycle_stops_reconnect_before_closing_transport() {
    let h = Harness::new();
    let Harness {
        _dir,
        mut node,
        transport,
        ..
    } = h;
    node.start();
    assert!(node.is_running());
    node.shutdown().await.unwrap();
    assert!(transport.is_closed());
}
