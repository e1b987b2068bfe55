use crate::game::{
    ActionKind, GameOutcome, GameSnapshot, GameType, Phase, Refund, RoomDetails, RoomSummary,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientMessage {
    // Rooms
    CreateRoom {
        game_type: GameType,
        bet_amount: i64,
        max_players: usize,
        max_bet: Option<i64>,
        name: Option<String>,
    },
    JoinRoom {
        room_id: String,
        bet_amount: Option<i64>,
    },
    LeaveRoom {
        room_id: String,
    },
    GetAvailableRooms {
        game_type: Option<GameType>,
        min_bet: Option<i64>,
        max_bet: Option<i64>,
    },
    GetRoomStatus {
        room_id: String,
    },
    StartGame {
        room_id: String,
    },
    CancelGame {
        room_id: String,
    },

    // Games
    GetGameState {
        game_id: String,
    },
    GameAction {
        game_id: String,
        action: ActionKind,
        amount: Option<i64>,
        number: Option<u8>,
    },

    GetBalance,
    Ping,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
#[allow(clippy::large_enum_variant)] // Snapshots are the bulk of the traffic
pub enum ServerMessage {
    Connected {
        participant_id: String,
        username: String,
        balance: i64,
    },

    // Room lifecycle
    RoomCreated {
        room: RoomDetails,
    },
    RoomJoined {
        room: RoomDetails,
    },
    RoomLeft {
        room_id: String,
    },
    PlayerJoined {
        room_id: String,
        participant_id: String,
        username: String,
        player_count: usize,
    },
    PlayerLeft {
        room_id: String,
        participant_id: String,
        player_count: usize,
    },
    RoomReady {
        room_id: String,
        game_id: String,
    },
    RoomClosed {
        room_id: String,
        reason: String,
    },
    AvailableRooms {
        rooms: Vec<RoomSummary>,
    },
    RoomStatus {
        room: RoomDetails,
    },

    // Game flow
    GameStarted {
        room_id: String,
        game_id: String,
        game_type: GameType,
        players: Vec<String>,
    },
    RoundStarted {
        game_id: String,
        round: u32,
        phase: Phase,
    },
    PlayerTurn {
        game_id: String,
        player_id: String,
        legal_actions: Vec<ActionKind>,
        to_call: i64,
        timeout_secs: u64,
    },
    GameStateUpdate {
        state: GameSnapshot,
    },
    GameOver {
        outcome: GameOutcome,
    },
    GameCancelled {
        room_id: String,
        game_id: String,
        refunds: Vec<Refund>,
    },
    /// The room is resting between games
    CooldownNotification {
        message: String,
        remaining_seconds: u64,
    },
    BalanceUpdate {
        balance: i64,
        delta: Option<i64>,
        game_id: Option<String>,
    },

    // Connection status of other members
    PlayerDisconnected {
        room_id: String,
        participant_id: String,
        grace_secs: u64,
    },
    PlayerReconnected {
        room_id: String,
        participant_id: String,
    },

    Error {
        message: String,
    },
    Pong,
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }
}
