//! End-to-end engine tests: several clients on one in-process session
//! topic and one shared store, replicas converging through the same
//! event-application rules a real deployment uses.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;

use yoriai_engine::domain::entity::{Item, ItemStatus, TimerPhase};
use yoriai_engine::domain::value_object::{DisplayName, ItemId, SessionId, UserId};
use yoriai_engine::port::bus::LocalHub;
use yoriai_engine::port::store::{EstimationStore, InMemoryEstimationStore};
use yoriai_engine::session::SessionEngine;
use yoriai_engine::sync::video::StubMediaSession;
use yoriai_engine::sync::Identity;
use yoriai_shared::presence::Role;
use yoriai_shared::protocol::{EstimateValue, Scale, ServerFrame};
use yoriai_shared::time::SteppingClock;

struct TestClient {
    engine: SessionEngine,
    rx: UnboundedReceiver<ServerFrame>,
}

async fn connect(
    hub: &Arc<LocalHub>,
    store: &Arc<InMemoryEstimationStore>,
    clock: &Arc<SteppingClock>,
    user: &str,
    role: Role,
) -> TestClient {
    let identity = Identity {
        user_id: UserId::new(user.to_string()).unwrap(),
        display_name: DisplayName::new(user.to_string()).unwrap(),
        role,
    };
    let (bus, rx) = hub.attach(identity.presence_record(clock.as_ref())).await;
    let engine = SessionEngine::new(
        SessionId::new("s-1".to_string()).unwrap(),
        identity,
        Scale::Fibonacci,
        Arc::new(bus),
        store.clone(),
        Arc::new(StubMediaSession),
        clock.clone(),
    );
    engine.bootstrap().await;
    TestClient { engine, rx }
}

/// Deliver every pending frame to its client, repeating until no client
/// produced new traffic.
async fn pump(clients: &mut [TestClient]) {
    loop {
        let mut delivered = false;
        for client in clients.iter_mut() {
            while let Ok(frame) = client.rx.try_recv() {
                delivered = true;
                client.engine.handle_frame(frame).await;
            }
        }
        if !delivered {
            break;
        }
    }
}

fn backlog() -> Vec<Item> {
    vec![
        Item::new(
            ItemId::new("item-a".to_string()).unwrap(),
            "Login form".to_string(),
            Scale::Fibonacci,
        ),
        Item::new(
            ItemId::new("item-b".to_string()).unwrap(),
            "Search index".to_string(),
            Scale::Fibonacci,
        ),
    ]
}

async fn setup() -> (
    Arc<LocalHub>,
    Arc<InMemoryEstimationStore>,
    Arc<SteppingClock>,
) {
    let hub = LocalHub::new("s-1");
    let store = Arc::new(InMemoryEstimationStore::new());
    store
        .seed_items(SessionId::new("s-1".to_string()).unwrap(), backlog())
        .await;
    let clock = Arc::new(SteppingClock::new(0));
    (hub, store, clock)
}

fn item(id: &str) -> ItemId {
    ItemId::new(id.to_string()).unwrap()
}

#[tokio::test]
async fn test_full_estimation_round() {
    // テスト項目: 仕様のエンドツーエンドシナリオ —
    //   モデレーターが 60 秒タイマーを開始し、2 人が 5 と 8 を投票、
    //   タイマー満了で自動リビール、平均 6.5・不一致、8 に上書き、
    //   accept で Estimated / "8" が保存され、全クライアントが次の
    //   アイテムへ移動する
    // given (前提条件):
    let (hub, store, clock) = setup().await;
    let mut clients = vec![
        connect(&hub, &store, &clock, "mod", Role::Moderator).await,
        connect(&hub, &store, &clock, "alice", Role::TeamMember).await,
        connect(&hub, &store, &clock, "bob", Role::TeamMember).await,
    ];
    pump(&mut clients).await;

    // when (操作): タイマー開始、投票、満了
    clients[0].engine.timer.start(Some(60)).await.unwrap();
    pump(&mut clients).await;

    clients[1]
        .engine
        .votes
        .submit_vote(item("item-a"), EstimateValue::Points { points: 5 })
        .await
        .unwrap();
    clients[2]
        .engine
        .votes
        .submit_vote(item("item-a"), EstimateValue::Points { points: 8 })
        .await
        .unwrap();
    pump(&mut clients).await;

    clock.advance(60_000);
    clients[0].engine.drive_second().await;
    pump(&mut clients).await;

    // then (期待する結果): 全レプリカでリビール済み、平均 6.5・不一致
    for client in &clients {
        let replica = client.engine.replica();
        let replica = replica.lock().await;
        assert!(replica.is_revealed(&item("item-a")));
        assert_eq!(replica.timer.phase, TimerPhase::Expired);
        let consensus = replica.consensus_for(&item("item-a"));
        assert!(!consensus.is_unanimous);
        assert_eq!(consensus.average, Some(6.5));
    }

    // モデレーターが 8 に上書きして accept する
    clients[0]
        .engine
        .votes
        .override_consensus(&item("item-a"), EstimateValue::Points { points: 8 })
        .await
        .unwrap();
    pump(&mut clients).await;
    let label = clients[0].engine.navigator.accept().await.unwrap();
    pump(&mut clients).await;

    assert_eq!(label, "8");
    let session_id = SessionId::new("s-1".to_string()).unwrap();
    let items = store.list_session_items(&session_id).await.unwrap();
    assert_eq!(items[0].status, ItemStatus::Estimated);
    assert_eq!(items[0].final_estimate, Some("8".to_string()));

    // 全クライアントが次のアイテムを指している
    for client in &clients {
        let replica = client.engine.replica();
        let replica = replica.lock().await;
        assert_eq!(replica.session.active_index, 1);
    }
}

#[tokio::test]
async fn test_accept_is_a_one_way_snapshot() {
    // テスト項目: accept 後の投票編集が確定済み見積もりを書き換えない
    // given (前提条件): 全会一致で accept 済み
    let (hub, store, clock) = setup().await;
    let mut clients = vec![
        connect(&hub, &store, &clock, "mod", Role::Moderator).await,
        connect(&hub, &store, &clock, "alice", Role::TeamMember).await,
    ];
    pump(&mut clients).await;

    clients[1]
        .engine
        .votes
        .submit_vote(item("item-a"), EstimateValue::Points { points: 5 })
        .await
        .unwrap();
    pump(&mut clients).await;
    clients[0].engine.votes.reveal(&item("item-a")).await.unwrap();
    pump(&mut clients).await;
    clients[0].engine.navigator.accept().await.unwrap();
    pump(&mut clients).await;

    // when (操作): alice がリビール後・accept 後に投票を変更する
    clients[1]
        .engine
        .votes
        .submit_vote(item("item-a"), EstimateValue::Points { points: 13 })
        .await
        .unwrap();
    pump(&mut clients).await;

    // then (期待する結果): 保存済みの見積もりは 5 のまま
    let session_id = SessionId::new("s-1".to_string()).unwrap();
    let items = store.list_session_items(&session_id).await.unwrap();
    assert_eq!(items[0].status, ItemStatus::Estimated);
    assert_eq!(items[0].final_estimate, Some("5".to_string()));
}

#[tokio::test]
async fn test_roster_converges_across_clients() {
    // テスト項目: join/leave の後、全クライアントのロスターが同一集合に収束する
    // given (前提条件):
    let (hub, store, clock) = setup().await;
    let mut clients = vec![
        connect(&hub, &store, &clock, "mod", Role::Moderator).await,
        connect(&hub, &store, &clock, "alice", Role::TeamMember).await,
        connect(&hub, &store, &clock, "bob", Role::TeamMember).await,
    ];
    pump(&mut clients).await;

    // when (操作): bob が離脱し、carol が参加する
    let carol = connect(&hub, &store, &clock, "carol", Role::TeamMember).await;
    clients.push(carol);
    clients[2].engine.leave_session().await;
    let gone = clients.remove(2);
    drop(gone);
    pump(&mut clients).await;

    // then (期待する結果):
    let expected: Vec<&str> = vec!["alice", "carol", "mod"];
    for client in &clients {
        let replica = client.engine.replica();
        let replica = replica.lock().await;
        let ids: Vec<&str> = replica.roster.keys().map(String::as_str).collect();
        assert_eq!(ids, expected);
    }
}

#[tokio::test]
async fn test_video_mesh_negotiates_over_the_topic() {
    // テスト項目: 通話参加者間でオファー/アンサーが交換され、
    //             離脱で接続数がちょうど 1 減る
    // given (前提条件):
    let (hub, store, clock) = setup().await;
    let mut clients = vec![
        connect(&hub, &store, &clock, "alice", Role::Moderator).await,
        connect(&hub, &store, &clock, "bob", Role::TeamMember).await,
        connect(&hub, &store, &clock, "carol", Role::TeamMember).await,
    ];
    pump(&mut clients).await;

    // when (操作): alice → bob → carol の順で通話に参加する
    clients[0].engine.mesh.join_call().await.unwrap();
    pump(&mut clients).await;
    clients[1].engine.mesh.join_call().await.unwrap();
    pump(&mut clients).await;
    clients[2].engine.mesh.join_call().await.unwrap();
    pump(&mut clients).await;

    // then (期待する結果): 3 人の通話で全員が 2 本ずつ接続を持つ
    for client in &clients {
        assert_eq!(client.engine.mesh.connection_count().await, 2);
    }

    // carol が通話から抜けると他の 2 人は 1 本ずつになる
    clients[2].engine.mesh.leave_call().await;
    pump(&mut clients).await;
    assert_eq!(clients[0].engine.mesh.connection_count().await, 1);
    assert_eq!(clients[1].engine.mesh.connection_count().await, 1);
    assert_eq!(clients[2].engine.mesh.connection_count().await, 0);
}

#[tokio::test]
async fn test_missed_broadcast_heals_via_reconciliation() {
    // テスト項目: ブロードキャストを全て失ったクライアントが
    //             リコンシリエーションで追いつく
    // given (前提条件): dave はトピックから切り離された状態で接続している
    let (hub, store, clock) = setup().await;
    let mut clients = vec![
        connect(&hub, &store, &clock, "mod", Role::Moderator).await,
        connect(&hub, &store, &clock, "alice", Role::TeamMember).await,
    ];
    pump(&mut clients).await;

    let dave = connect(&hub, &store, &clock, "dave", Role::TeamMember).await;

    clients[1]
        .engine
        .votes
        .submit_vote(item("item-a"), EstimateValue::Points { points: 8 })
        .await
        .unwrap();
    pump(&mut clients).await;
    clients[0].engine.votes.reveal(&item("item-a")).await.unwrap();
    pump(&mut clients).await;
    // dave のフレームは受信しない（全て失われた想定）

    // when (操作):
    dave.engine.reconcile().await;

    // then (期待する結果): 投票とリビール状態がストア経由で復元される
    let replica = dave.engine.replica();
    let replica = replica.lock().await;
    assert_eq!(replica.votes_for(&item("item-a")).len(), 1);
    assert!(replica.is_revealed(&item("item-a")));
}
