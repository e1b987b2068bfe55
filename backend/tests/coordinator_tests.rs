//! Coordinator Integration Tests
//!
//! Drives the game server directly through connection handles, without a
//! socket in between, against an in-memory ledger.

use async_trait::async_trait;
use game_coordinator::{
    auth::JwtManager,
    config::{CoordinatorConfig, SettlementConfig},
    game::{
        Action, ActionKind, GameError, GameOutcome, GameStatus, GameType, Phase, RoomStatus,
    },
    ledger::{BalanceChange, Ledger, LedgerError},
    ws::{messages::ServerMessage, ConnectionHandle, GameServer},
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::Receiver;

const STARTING_BALANCE: i64 = 1_000;

/// Balances in a map. The first `failures` settle calls fail.
#[derive(Default)]
struct MemoryLedger {
    balances: Mutex<HashMap<String, i64>>,
    settled: Mutex<HashMap<String, Vec<BalanceChange>>>,
    failures: u32,
    settle_calls: AtomicU32,
}

impl MemoryLedger {
    fn flaky(failures: u32) -> Self {
        Self {
            failures,
            ..Default::default()
        }
    }

    fn set_balance(&self, participant_id: &str, balance: i64) {
        self.balances
            .lock()
            .unwrap()
            .insert(participant_id.to_string(), balance);
    }

    fn settled_count(&self) -> usize {
        self.settled.lock().unwrap().len()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn balance(&self, participant_id: &str) -> Result<i64, LedgerError> {
        Ok(*self
            .balances
            .lock()
            .unwrap()
            .get(participant_id)
            .unwrap_or(&STARTING_BALANCE))
    }

    async fn settle(&self, outcome: &GameOutcome) -> Result<Vec<BalanceChange>, LedgerError> {
        let call = self.settle_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            return Err(LedgerError::Unavailable("connection reset".into()));
        }

        let mut settled = self.settled.lock().unwrap();
        if let Some(changes) = settled.get(&outcome.game_id) {
            return Ok(changes.clone());
        }
        let mut balances = self.balances.lock().unwrap();
        let changes: Vec<BalanceChange> = outcome
            .results
            .iter()
            .map(|result| {
                let balance = balances
                    .entry(result.player_id.clone())
                    .or_insert(STARTING_BALANCE);
                *balance += result.net;
                BalanceChange {
                    participant_id: result.player_id.clone(),
                    delta: result.net,
                    balance: *balance,
                }
            })
            .collect();
        settled.insert(outcome.game_id.clone(), changes.clone());
        Ok(changes)
    }
}

fn coordinator_config() -> CoordinatorConfig {
    CoordinatorConfig {
        disconnect_grace: Duration::from_secs(60),
        turn_timeout: Duration::from_secs(30),
        timeout_check_interval: Duration::from_millis(250),
        room_idle_timeout: Duration::from_secs(600),
        game_cooldown: Duration::ZERO,
    }
}

fn fast_settlement() -> SettlementConfig {
    SettlementConfig {
        max_attempts: 5,
        initial_backoff: Duration::from_millis(5),
        max_backoff: Duration::from_millis(50),
    }
}

fn setup_with(ledger: Arc<MemoryLedger>) -> GameServer {
    setup_with_config(ledger, coordinator_config())
}

fn setup_with_config(ledger: Arc<MemoryLedger>, config: CoordinatorConfig) -> GameServer {
    let jwt_manager = Arc::new(JwtManager::new("test_secret_key".to_string()));
    GameServer::new(jwt_manager, ledger, config, fast_settlement())
}

fn setup() -> (GameServer, Arc<MemoryLedger>) {
    let ledger = Arc::new(MemoryLedger::default());
    (setup_with(ledger.clone()), ledger)
}

async fn connect(server: &GameServer, participant_id: &str) -> Receiver<ServerMessage> {
    let (handle, rx) = ConnectionHandle::new();
    server
        .connect(participant_id, participant_id, handle)
        .await
        .expect("connect");
    rx
}

/// Everything queued so far
fn drain(rx: &mut Receiver<ServerMessage>) -> Vec<ServerMessage> {
    let mut messages = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        messages.push(msg);
    }
    messages
}

fn started_game_id(messages: &[ServerMessage]) -> String {
    messages
        .iter()
        .find_map(|msg| match msg {
            ServerMessage::GameStarted { game_id, .. } => Some(game_id.clone()),
            _ => None,
        })
        .expect("game_started message")
}

/// Waits for the settlement of `game_id` to reach this connection
async fn settled_balance(rx: &mut Receiver<ServerMessage>, game_id: &str) -> i64 {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match rx.recv().await {
                Some(ServerMessage::BalanceUpdate {
                    game_id: Some(id),
                    balance,
                    ..
                }) if id == game_id => break balance,
                Some(_) => continue,
                None => panic!("connection closed"),
            }
        }
    })
    .await
    .expect("balance update")
}

fn game_over(messages: &[ServerMessage]) -> Option<GameOutcome> {
    messages.iter().find_map(|msg| match msg {
        ServerMessage::GameOver { outcome } => Some(outcome.clone()),
        _ => None,
    })
}

/// Two connected players in a started, fixed-bet heads-up poker room
async fn heads_up_poker(
    server: &GameServer,
) -> (
    String,
    String,
    Receiver<ServerMessage>,
    Receiver<ServerMessage>,
) {
    let mut host_rx = connect(server, "host").await;
    let mut guest_rx = connect(server, "guest").await;
    let room_id = server
        .create_room("host", GameType::Poker, 10, 2, None, None)
        .await
        .unwrap();
    server.join_room(&room_id, "guest", Some(10)).await.unwrap();

    let game_id = started_game_id(&drain(&mut guest_rx));
    drain(&mut host_rx);
    (room_id, game_id, host_rx, guest_rx)
}

// ============================================================================
// Room lifecycle
// ============================================================================

#[tokio::test]
async fn test_second_player_joining_starts_poker_game() {
    let (server, _) = setup();
    let mut host_rx = connect(&server, "host").await;
    let mut guest_rx = connect(&server, "guest").await;

    let room_id = server
        .create_room("host", GameType::Poker, 10, 2, None, None)
        .await
        .unwrap();
    let host_messages = drain(&mut host_rx);
    assert!(host_messages
        .iter()
        .any(|m| matches!(m, ServerMessage::RoomCreated { room } if room.members == vec!["host".to_string()])));

    server.join_room(&room_id, "guest", Some(10)).await.unwrap();

    let guest_messages = drain(&mut guest_rx);
    assert!(guest_messages
        .iter()
        .any(|m| matches!(m, ServerMessage::RoomJoined { .. })));
    assert!(guest_messages
        .iter()
        .any(|m| matches!(m, ServerMessage::RoomReady { .. })));
    let players = guest_messages
        .iter()
        .find_map(|m| match m {
            ServerMessage::GameStarted { players, .. } => Some(players.clone()),
            _ => None,
        })
        .expect("game_started");
    assert_eq!(players, vec!["host".to_string(), "guest".to_string()]);

    // Host heard about the newcomer, then got the first turn
    let host_messages = drain(&mut host_rx);
    assert!(host_messages.iter().any(|m| matches!(
        m,
        ServerMessage::PlayerJoined { participant_id, player_count: 2, .. } if participant_id == "guest"
    )));
    assert!(host_messages.iter().any(|m| matches!(
        m,
        ServerMessage::PlayerTurn { player_id, .. } if player_id == "host"
    )));

    let details = server.room_status(&room_id, Some("host")).await.unwrap();
    assert_eq!(details.summary.status, RoomStatus::Active);
    assert!(details.current_game_id.is_some());
}

#[tokio::test]
async fn test_join_rejections() {
    let (server, ledger) = setup();
    ledger.set_balance("poor", 5);
    for id in ["host", "a", "b", "c", "poor"] {
        connect(&server, id).await;
    }
    let room_id = server
        .create_room("host", GameType::Blackjack, 10, 3, None, None)
        .await
        .unwrap();

    assert_eq!(
        server.join_room(&room_id, "a", Some(20)).await,
        Err(GameError::BetMismatch {
            required: 10,
            attempted: 20
        })
    );
    assert!(matches!(
        server.join_room(&room_id, "poor", None).await,
        Err(GameError::InsufficientBalance { available: 5, .. })
    ));
    assert_eq!(
        server.join_room("missing", "a", None).await,
        Err(GameError::RoomNotFound)
    );

    server.join_room(&room_id, "a", None).await.unwrap();
    assert_eq!(
        server.join_room(&room_id, "a", None).await,
        Err(GameError::AlreadyInRoom)
    );
    // Joining mid-game is allowed until the room is full
    server.join_room(&room_id, "b", None).await.unwrap();
    assert_eq!(
        server.join_room(&room_id, "c", None).await,
        Err(GameError::RoomFull)
    );

    let details = server.room_status(&room_id, None).await.unwrap();
    assert_eq!(details.members.len(), 3);
}

#[tokio::test]
async fn test_member_count_never_exceeds_capacity() {
    let (server, _) = setup();
    connect(&server, "host").await;
    let room_id = server
        .create_room("host", GameType::Roulette, 5, 4, Some(50), None)
        .await
        .unwrap();

    let mut joined = 1;
    for i in 0..10 {
        let id = format!("p{}", i);
        connect(&server, &id).await;
        match server.join_room(&room_id, &id, None).await {
            Ok(()) => joined += 1,
            Err(e) => assert_eq!(e, GameError::RoomFull),
        }
        let details = server.room_status(&room_id, None).await.unwrap();
        assert!(details.members.len() <= 4);
    }
    assert_eq!(joined, 4);
}

#[tokio::test]
async fn test_leave_room_twice_is_noop() {
    let (server, _) = setup();
    let mut host_rx = connect(&server, "host").await;
    let mut guest_rx = connect(&server, "guest").await;
    let room_id = server
        .create_room("host", GameType::Roulette, 5, 4, None, None)
        .await
        .unwrap();
    drain(&mut host_rx);

    // Last member out closes the room
    server.leave_room(&room_id, "host").await.unwrap();
    assert!(drain(&mut host_rx)
        .iter()
        .any(|m| matches!(m, ServerMessage::RoomLeft { .. })));
    assert_eq!(
        server.room_status(&room_id, None).await.unwrap_err(),
        GameError::RoomNotFound
    );

    server.leave_room(&room_id, "host").await.unwrap();
    assert!(drain(&mut host_rx).is_empty());
    assert!(drain(&mut guest_rx).is_empty());
    assert_eq!(server.room_count().await, 0);
}

#[tokio::test]
async fn test_host_leaving_passes_host_role() {
    let (server, _) = setup();
    for id in ["host", "a", "b"] {
        connect(&server, id).await;
    }
    let room_id = server
        .create_room("host", GameType::Blackjack, 10, 4, None, None)
        .await
        .unwrap();
    server.join_room(&room_id, "a", None).await.unwrap();
    server.join_room(&room_id, "b", None).await.unwrap();

    server.leave_room(&room_id, "host").await.unwrap();
    let details = server.room_status(&room_id, None).await.unwrap();
    assert_eq!(details.summary.host_id, "a");
    assert_eq!(details.members, vec!["a".to_string(), "b".to_string()]);
}

#[tokio::test]
async fn test_start_game_is_host_only() {
    let (server, _) = setup();
    let (room_id, game_id, _host_rx, _guest_rx) = heads_up_poker(&server).await;

    assert_eq!(
        server.start_game(&room_id, "guest").await,
        Err(GameError::NotHost)
    );
    assert_eq!(
        server.start_game(&room_id, "stranger").await,
        Err(GameError::NotInRoom)
    );
    assert!(matches!(
        server.start_game(&room_id, "host").await,
        Err(GameError::IllegalAction { .. })
    ));

    // Finish the hand, then the host may deal the next one
    server
        .apply_action(Action::new(&game_id, "host", ActionKind::Fold))
        .await
        .unwrap();
    server.start_game(&room_id, "host").await.unwrap();
    let details = server.room_status(&room_id, None).await.unwrap();
    assert_ne!(details.current_game_id.as_deref(), Some(game_id.as_str()));
    assert_eq!(details.games_played, 1);
}

#[tokio::test]
async fn test_leaver_cannot_restake_until_game_resolves() {
    let (server, ledger) = setup();
    ledger.set_balance("host", 10);
    let (room_id, game_id, mut host_rx, mut guest_rx) = heads_up_poker(&server).await;
    connect(&server, "other").await;
    let elsewhere = server
        .create_room("other", GameType::Poker, 10, 2, None, None)
        .await
        .unwrap();

    // Whole balance in the pot, then walk away from the hand
    server
        .apply_action(Action::new(&game_id, "host", ActionKind::Bet).with_amount(10))
        .await
        .unwrap();
    server.leave_room(&room_id, "host").await.unwrap();

    assert_eq!(
        server
            .create_room("host", GameType::Poker, 10, 2, None, None)
            .await,
        Err(GameError::AlreadyInRoom)
    );
    assert_eq!(
        server.join_room(&elsewhere, "host", Some(10)).await,
        Err(GameError::AlreadyInRoom)
    );

    // Guest calls; the away seat folds on the flop
    server
        .apply_action(Action::new(&game_id, "guest", ActionKind::Call))
        .await
        .unwrap();
    let outcome = game_over(&drain(&mut guest_rx)).expect("game over");
    assert_eq!(outcome.result_for("host").unwrap().net, -10);

    // Free to sit down again, but with nothing left to stake
    assert_eq!(
        server
            .create_room("host", GameType::Poker, 10, 2, None, None)
            .await,
        Err(GameError::InsufficientBalance {
            required: 10,
            available: 0
        })
    );
    assert_eq!(settled_balance(&mut host_rx, &game_id).await, 0);
    assert_eq!(ledger.balance("host").await.unwrap(), 0);
    assert!(matches!(
        server.join_room(&elsewhere, "host", Some(10)).await,
        Err(GameError::InsufficientBalance { .. })
    ));
}

#[tokio::test]
async fn test_unsettled_losses_are_held_back() {
    let ledger = Arc::new(MemoryLedger::flaky(u32::MAX));
    ledger.set_balance("host", 10);
    let server = setup_with(ledger.clone());
    let (room_id, game_id, _host_rx, _guest_rx) = heads_up_poker(&server).await;

    server
        .apply_action(Action::new(&game_id, "host", ActionKind::Bet).with_amount(10))
        .await
        .unwrap();
    server
        .apply_action(Action::new(&game_id, "guest", ActionKind::Call))
        .await
        .unwrap();
    server.leave_room(&room_id, "host").await.unwrap();

    // The ledger never took the loss, but it is still owed
    assert_eq!(ledger.balance("host").await.unwrap(), 10);
    assert_eq!(server.available_balance("host").await.unwrap(), 0);
    assert_eq!(
        server
            .create_room("host", GameType::Roulette, 5, 4, None, None)
            .await,
        Err(GameError::InsufficientBalance {
            required: 5,
            available: 0
        })
    );
    assert_eq!(
        server.available_balance("guest").await.unwrap(),
        STARTING_BALANCE
    );
}

#[tokio::test]
async fn test_host_cancels_game_without_settlement() {
    let (server, ledger) = setup();
    let (room_id, game_id, _host_rx, mut guest_rx) = heads_up_poker(&server).await;
    server
        .apply_action(Action::new(&game_id, "host", ActionKind::Bet).with_amount(10))
        .await
        .unwrap();

    assert_eq!(
        server.cancel_game(&room_id, "guest").await,
        Err(GameError::NotHost)
    );
    server.cancel_game(&room_id, "host").await.unwrap();

    let refunds = drain(&mut guest_rx)
        .into_iter()
        .find_map(|msg| match msg {
            ServerMessage::GameCancelled { game_id: id, refunds, .. } if id == game_id => {
                Some(refunds)
            }
            _ => None,
        })
        .expect("game_cancelled message");
    assert_eq!(refunds.len(), 1);
    assert_eq!(refunds[0].player_id, "host");
    assert_eq!(refunds[0].amount, 10);

    let details = server.room_status(&room_id, None).await.unwrap();
    assert_eq!(details.summary.status, RoomStatus::Waiting);
    assert_eq!(details.current_game_id, None);
    assert_eq!(
        server
            .apply_action(Action::new(&game_id, "guest", ActionKind::Call))
            .await,
        Err(GameError::GameNotInProgress)
    );
    assert_eq!(
        server.cancel_game(&room_id, "host").await,
        Err(GameError::GameNotFound)
    );

    assert_eq!(ledger.settled_count(), 0);
    assert_eq!(ledger.balance("host").await.unwrap(), STARTING_BALANCE);
    server.start_game(&room_id, "host").await.unwrap();
}

#[tokio::test]
async fn test_cancel_releases_player_who_left() {
    let (server, _) = setup();
    let (room_id, _game_id, _host_rx, _guest_rx) = heads_up_poker(&server).await;

    // Not the guest's turn, so the game carries on without them
    server.leave_room(&room_id, "guest").await.unwrap();
    assert_eq!(
        server
            .create_room("guest", GameType::Roulette, 5, 4, None, None)
            .await,
        Err(GameError::AlreadyInRoom)
    );

    server.cancel_game(&room_id, "host").await.unwrap();
    server
        .create_room("guest", GameType::Roulette, 5, 4, None, None)
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_cooldown_delays_next_game() {
    let config = CoordinatorConfig {
        game_cooldown: Duration::from_secs(10),
        ..coordinator_config()
    };
    let server = setup_with_config(Arc::new(MemoryLedger::default()), config);
    let (room_id, game_id, _host_rx, _guest_rx) = heads_up_poker(&server).await;

    server
        .apply_action(Action::new(&game_id, "host", ActionKind::Fold))
        .await
        .unwrap();
    assert_eq!(
        server.start_game(&room_id, "host").await,
        Err(GameError::Cooldown { remaining_secs: 10 })
    );

    tokio::time::advance(Duration::from_secs(10)).await;
    server.start_game(&room_id, "host").await.unwrap();
    let details = server.room_status(&room_id, None).await.unwrap();
    assert_eq!(details.summary.status, RoomStatus::Active);
}

#[tokio::test(start_paused = true)]
async fn test_idle_waiting_room_is_closed() {
    let (server, _) = setup();
    let mut host_rx = connect(&server, "host").await;
    let room_id = server
        .create_room("host", GameType::Blackjack, 10, 4, None, None)
        .await
        .unwrap();
    drain(&mut host_rx);

    tokio::time::advance(Duration::from_secs(599)).await;
    server.check_timeouts().await;
    assert!(server.room_status(&room_id, None).await.is_ok());

    tokio::time::advance(Duration::from_secs(2)).await;
    server.check_timeouts().await;
    assert_eq!(
        server.room_status(&room_id, None).await.unwrap_err(),
        GameError::RoomNotFound
    );
    assert!(drain(&mut host_rx).iter().any(|m| matches!(
        m,
        ServerMessage::RoomClosed { reason, .. } if reason == "Room closed for inactivity"
    )));
    assert_eq!(server.room_count().await, 0);

    // The host is free again
    server
        .create_room("host", GameType::Blackjack, 10, 4, None, None)
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_finished_game_resets_idle_clock() {
    let (server, _) = setup();
    let (room_id, game_id, _host_rx, _guest_rx) = heads_up_poker(&server).await;

    tokio::time::advance(Duration::from_secs(500)).await;
    server
        .apply_action(Action::new(&game_id, "host", ActionKind::Fold))
        .await
        .unwrap();

    tokio::time::advance(Duration::from_secs(599)).await;
    server.check_timeouts().await;
    assert!(server.room_status(&room_id, None).await.is_ok());

    tokio::time::advance(Duration::from_secs(2)).await;
    server.check_timeouts().await;
    assert_eq!(server.room_count().await, 0);
}

// ============================================================================
// Game flow
// ============================================================================

#[tokio::test]
async fn test_out_of_turn_action_is_rejected() {
    let (server, _) = setup();
    let (_room_id, game_id, _host_rx, _guest_rx) = heads_up_poker(&server).await;

    let result = server
        .apply_action(Action::new(&game_id, "guest", ActionKind::Check))
        .await;
    assert_eq!(result, Err(GameError::NotCurrentActor));
    assert_eq!(result.unwrap_err().to_string(), "Not your turn");
}

#[tokio::test]
async fn test_raise_not_above_highest_is_rejected_and_state_unchanged() {
    let (server, _) = setup();
    let (_room_id, game_id, _host_rx, _guest_rx) = heads_up_poker(&server).await;

    server
        .apply_action(Action::new(&game_id, "host", ActionKind::Bet).with_amount(10))
        .await
        .unwrap();
    let before = server.game_state(&game_id, None).await.unwrap();

    let result = server
        .apply_action(Action::new(&game_id, "guest", ActionKind::Raise).with_amount(10))
        .await;
    assert!(matches!(
        result,
        Err(GameError::BetOutOfBounds { attempted: 10, .. })
    ));

    let after = server.game_state(&game_id, None).await.unwrap();
    assert_eq!(before, after);
    assert_eq!(after.current_actor.as_deref(), Some("guest"));
}

#[tokio::test]
async fn test_fold_out_pays_remaining_player_and_settles() {
    let (server, ledger) = setup();
    let (room_id, game_id, mut host_rx, mut guest_rx) = heads_up_poker(&server).await;

    server
        .apply_action(Action::new(&game_id, "host", ActionKind::Bet).with_amount(10))
        .await
        .unwrap();
    server
        .apply_action(Action::new(&game_id, "guest", ActionKind::Fold))
        .await
        .unwrap();

    let outcome = game_over(&drain(&mut guest_rx)).expect("game over");
    assert_eq!(outcome.winners, vec!["host".to_string()]);
    assert_eq!(outcome.pot, 10);
    let paid: i64 = outcome.results.iter().map(|r| r.payout).sum();
    assert_eq!(paid, outcome.pot);

    let snapshot = server.game_state(&game_id, Some("host")).await.unwrap();
    assert_eq!(snapshot.status, GameStatus::Completed);
    let details = server.room_status(&room_id, None).await.unwrap();
    assert_eq!(details.summary.status, RoomStatus::Waiting);

    // Settlement runs in the background and reports back
    let update = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match host_rx.recv().await {
                Some(ServerMessage::BalanceUpdate { game_id: Some(id), balance, .. }) => {
                    break (id, balance)
                }
                Some(_) => continue,
                None => panic!("connection closed"),
            }
        }
    })
    .await
    .expect("balance update");
    assert_eq!(update, (game_id, STARTING_BALANCE));
    assert_eq!(ledger.settled_count(), 1);
}

#[tokio::test]
async fn test_poker_showdown_pays_out_whole_pot() {
    let (server, _) = setup();
    let (_room_id, game_id, _host_rx, mut guest_rx) = heads_up_poker(&server).await;

    // Bet and call, then check down every street
    server
        .apply_action(Action::new(&game_id, "host", ActionKind::Bet).with_amount(10))
        .await
        .unwrap();
    server
        .apply_action(Action::new(&game_id, "guest", ActionKind::Call))
        .await
        .unwrap();
    for _ in 0..3 {
        for player in ["host", "guest"] {
            server
                .apply_action(Action::new(&game_id, player, ActionKind::Check))
                .await
                .unwrap();
        }
    }

    let outcome = game_over(&drain(&mut guest_rx)).expect("game over");
    assert_eq!(outcome.pot, 20);
    assert!(!outcome.winners.is_empty());
    let paid: i64 = outcome.results.iter().map(|r| r.payout).sum();
    assert_eq!(paid, 20);
    let net: i64 = outcome.results.iter().map(|r| r.net).sum();
    assert_eq!(net, 0);
}

#[tokio::test]
async fn test_hole_cards_are_private() {
    let (server, _) = setup();
    let (_room_id, game_id, _host_rx, _guest_rx) = heads_up_poker(&server).await;

    let view = server.game_state(&game_id, Some("guest")).await.unwrap();
    for seat in &view.seats {
        if seat.player_id == "guest" {
            assert_eq!(seat.hole_cards.as_ref().map(Vec::len), Some(2));
        } else {
            assert!(seat.hole_cards.is_none());
        }
    }
}

#[tokio::test]
async fn test_roulette_round() {
    let (server, _) = setup();
    let mut host_rx = connect(&server, "host").await;
    let _guest_rx = connect(&server, "guest").await;
    let room_id = server
        .create_room("host", GameType::Roulette, 5, 4, Some(100), None)
        .await
        .unwrap();
    server.join_room(&room_id, "guest", None).await.unwrap();
    let game_id = started_game_id(&drain(&mut host_rx));

    server
        .apply_action(
            Action::new(&game_id, "host", ActionKind::BetNumber)
                .with_amount(10)
                .with_number(17),
        )
        .await
        .unwrap();
    server
        .apply_action(
            Action::new(&game_id, "guest", ActionKind::BetNumber)
                .with_amount(10)
                .with_number(99),
        )
        .await
        .expect_err("pocket out of range");
    server
        .apply_action(
            Action::new(&game_id, "guest", ActionKind::BetNumber)
                .with_amount(10)
                .with_number(0),
        )
        .await
        .unwrap();

    // Whoever the wheel is handed to spins it
    let snapshot = server.game_state(&game_id, None).await.unwrap();
    let spinner = snapshot.current_actor.expect("spinner");
    server
        .apply_action(Action::new(&game_id, spinner, ActionKind::Spin))
        .await
        .unwrap();

    let outcome = game_over(&drain(&mut host_rx)).expect("game over");
    assert!(outcome.spin_result.is_some_and(|pocket| pocket < 37));
    let net: i64 = outcome.results.iter().map(|r| r.net).sum();
    assert_eq!(net, 0);
}

// ============================================================================
// Connections, disconnects and timeouts
// ============================================================================

#[tokio::test]
async fn test_duplicate_connection_is_rejected() {
    let (server, _) = setup();
    let _rx = connect(&server, "alice").await;

    let (second, _second_rx) = ConnectionHandle::new();
    assert_eq!(
        server.connect("alice", "alice", second).await,
        Err(GameError::DuplicateConnection)
    );
    assert!(server.registry().is_connected("alice").await);
}

#[tokio::test]
async fn test_disconnect_outside_game_leaves_room() {
    let (server, _) = setup();
    let _host_rx = connect(&server, "host").await;
    let room_id = server
        .create_room("host", GameType::Blackjack, 10, 4, None, None)
        .await
        .unwrap();

    server.disconnect("host").await;
    assert_eq!(server.room_count().await, 0);
    assert_eq!(
        server.room_status(&room_id, None).await.unwrap_err(),
        GameError::RoomNotFound
    );
}

#[tokio::test(start_paused = true)]
async fn test_grace_expiry_folds_disconnected_player() {
    let (server, _) = setup();
    let (room_id, game_id, _host_rx, mut guest_rx) = heads_up_poker(&server).await;

    // Host is first to act and drops
    server.disconnect("host").await;
    assert!(server.is_held("host").await);
    assert!(drain(&mut guest_rx).iter().any(|m| matches!(
        m,
        ServerMessage::PlayerDisconnected { participant_id, grace_secs: 60, .. } if participant_id == "host"
    )));

    // Still inside the grace period: nothing happens
    tokio::time::advance(Duration::from_secs(20)).await;
    server.check_timeouts().await;
    assert_eq!(
        server.game_state(&game_id, None).await.unwrap().status,
        GameStatus::InProgress
    );

    tokio::time::advance(Duration::from_secs(41)).await;
    server.check_timeouts().await;

    let messages = drain(&mut guest_rx);
    assert!(messages.iter().any(|m| matches!(
        m,
        ServerMessage::PlayerLeft { participant_id, .. } if participant_id == "host"
    )));
    let outcome = game_over(&messages).expect("game over");
    assert_eq!(outcome.winners, vec!["guest".to_string()]);
    assert!(!server.is_held("host").await);

    let details = server.room_status(&room_id, None).await.unwrap();
    assert_eq!(details.members, vec!["guest".to_string()]);
    assert_eq!(details.summary.host_id, "guest");
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_within_grace_restores_seat() {
    let (server, _) = setup();
    let (room_id, game_id, _host_rx, mut guest_rx) = heads_up_poker(&server).await;

    server.disconnect("host").await;
    tokio::time::advance(Duration::from_secs(10)).await;

    let mut host_rx = connect(&server, "host").await;
    assert!(!server.is_held("host").await);
    let messages = drain(&mut host_rx);
    assert!(messages
        .iter()
        .any(|m| matches!(m, ServerMessage::RoomJoined { room } if room.summary.room_id == room_id)));
    assert!(messages
        .iter()
        .any(|m| matches!(m, ServerMessage::GameStateUpdate { .. })));
    assert!(drain(&mut guest_rx)
        .iter()
        .any(|m| matches!(m, ServerMessage::PlayerReconnected { .. })));

    server
        .apply_action(Action::new(&game_id, "host", ActionKind::Check))
        .await
        .unwrap();

    // Past the original grace period; the guest's turn runs out instead
    tokio::time::advance(Duration::from_secs(55)).await;
    server.check_timeouts().await;
    assert_eq!(
        server.room_status(&room_id, None).await.unwrap().members.len(),
        2
    );
    let snapshot = server.game_state(&game_id, None).await.unwrap();
    assert_eq!(snapshot.phase, Phase::Flop);
    assert_eq!(snapshot.status, GameStatus::InProgress);
}

#[tokio::test(start_paused = true)]
async fn test_idle_turn_applies_timeout_action() {
    let (server, _) = setup();
    let (_room_id, game_id, _host_rx, _guest_rx) = heads_up_poker(&server).await;

    tokio::time::advance(Duration::from_secs(29)).await;
    server.check_timeouts().await;
    assert_eq!(
        server
            .game_state(&game_id, None)
            .await
            .unwrap()
            .current_actor
            .as_deref(),
        Some("host")
    );

    // Nothing to call, so the host checks
    tokio::time::advance(Duration::from_secs(2)).await;
    server.check_timeouts().await;
    let snapshot = server.game_state(&game_id, None).await.unwrap();
    assert_eq!(snapshot.current_actor.as_deref(), Some("guest"));
    assert_eq!(snapshot.pot, 0);
}

// ============================================================================
// Settlement
// ============================================================================

#[tokio::test]
async fn test_settlement_retries_and_applies_once() {
    let ledger = Arc::new(MemoryLedger::flaky(2));
    let server = setup_with(ledger.clone());
    let (_room_id, game_id, mut host_rx, _guest_rx) = heads_up_poker(&server).await;

    server
        .apply_action(Action::new(&game_id, "host", ActionKind::Bet).with_amount(10))
        .await
        .unwrap();
    server
        .apply_action(Action::new(&game_id, "guest", ActionKind::Call))
        .await
        .unwrap();
    server
        .apply_action(Action::new(&game_id, "host", ActionKind::Fold))
        .await
        .unwrap();

    let delta = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match host_rx.recv().await {
                Some(ServerMessage::BalanceUpdate { delta: Some(delta), .. }) => break delta,
                Some(_) => continue,
                None => panic!("connection closed"),
            }
        }
    })
    .await
    .expect("balance update");

    assert_eq!(delta, -10);
    assert_eq!(ledger.settle_calls.load(Ordering::SeqCst), 3);
    assert_eq!(ledger.settled_count(), 1);
    assert_eq!(ledger.balance("host").await.unwrap(), STARTING_BALANCE - 10);
    assert_eq!(ledger.balance("guest").await.unwrap(), STARTING_BALANCE + 10);
    assert!(server.failed_settlements().await.is_empty());
}
