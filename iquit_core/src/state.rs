use crate::card::{shuffled_deck, Card};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;
use uuid::Uuid;

pub type PlayerId = Uuid;

// --- 核心数据结构定义 ---

/// 房间内的一名玩家
/// 是否房主不在这里存储，而是由其在玩家列表中的位置推导（见 PlayerView）
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub hand: Vec<Card>,
    pub eliminated: bool,
}

/// 退出后的亮牌子阶段
/// queue 按加入顺序收录所有未淘汰的非退出者；
/// 节奏完全由客户端的 reveal_card / finished_revealing 意图驱动，服务端没有计时器
#[derive(Debug, Clone)]
pub struct RevealPhase {
    pub queue: Vec<PlayerId>,
    pub cursor: usize,
    pub in_progress: bool,
}

/// 单个房间的全部权威状态
/// 只存在于服务端内存中，永远不直接序列化给客户端（见 RoomSnapshot）
#[derive(Debug, Clone)]
pub struct RoomState {
    pub code: String,
    /// 按加入顺序排列；除移除外永不重排，第一位即房主
    pub players: Vec<Player>,
    /// 服务端持有的完整牌堆，发牌与摸牌从尾部 pop
    pub deck: Vec<Card>,
    /// 最近一次打出的牌，每次出牌整体替换
    pub center_pile: Vec<Card>,
    /// 当前行动玩家在 players 中的索引
    pub turn: usize,
    /// 累计罚分，只在退出结算时增加
    pub scores: HashMap<PlayerId, u32>,
    /// 本轮各玩家已完成的回合数
    pub turns_taken: HashMap<PlayerId, u32>,
    /// 罚分超过该阈值的玩家会被淘汰
    pub elimination_score: u32,
    /// 回合开始时间戳，仅服务端内部使用
    pub turn_started_at: Instant,
    pub reveal: Option<RevealPhase>,
}

impl RoomState {
    /// 创建新房间：创建者是唯一玩家，牌堆已洗好
    pub fn new(code: String, host_id: PlayerId, host_name: String, elimination_score: u32) -> RoomState {
        let host = Player {
            id: host_id,
            name: host_name,
            hand: Vec::new(),
            eliminated: false,
        };
        RoomState {
            code,
            players: vec![host],
            deck: shuffled_deck(),
            center_pile: Vec::new(),
            turn: 0,
            scores: HashMap::new(),
            turns_taken: HashMap::from([(host_id, 0)]),
            elimination_score,
            turn_started_at: Instant::now(),
            reveal: None,
        }
    }

    /// 任何玩家手上有牌即视为游戏已开始（此后禁止加入）
    pub fn game_started(&self) -> bool {
        self.players.iter().any(|p| !p.hand.is_empty())
    }

    /// 生成第 idx 位玩家的对外视图，手牌完整可见
    pub fn view_of(&self, idx: usize) -> PlayerView {
        let player = &self.players[idx];
        PlayerView {
            id: player.id,
            name: player.name.clone(),
            is_host: idx == 0,
            eliminated: player.eliminated,
            hand_count: player.hand.len(),
            hand: Some(player.hand.clone()),
        }
    }

    /// 生成当前房间的完整快照（含所有人的手牌）。
    /// 发送前必须经 for_client 按接收者净化。
    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            players: (0..self.players.len()).map(|i| self.view_of(i)).collect(),
            deck_count: self.deck.len(),
            center_pile: self.center_pile.clone(),
            turn: self.turn,
            scores: self.scores.clone(),
            turns_taken: self.turns_taken.clone(),
            elimination_score: self.elimination_score,
        }
    }
}

// --- 客户端可见的快照 ---

/// 广播给客户端的房间快照：牌堆只暴露剩余张数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub players: Vec<PlayerView>,
    pub deck_count: usize,
    pub center_pile: Vec<Card>,
    pub turn: usize,
    pub scores: HashMap<PlayerId, u32>,
    pub turns_taken: HashMap<PlayerId, u32>,
    pub elimination_score: u32,
}

/// 快照中的玩家条目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    /// 推导属性：玩家列表第一位即房主
    #[serde(rename = "isHost")]
    pub is_host: bool,
    pub eliminated: bool,
    pub hand_count: usize,
    /// 正常对局中只有本人可见；退出后的亮牌广播是唯一的例外
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hand: Option<Vec<Card>>,
}

impl RoomSnapshot {
    /// 为特定客户端净化快照：隐藏其他玩家的手牌
    pub fn for_client(&self, client_id: &PlayerId) -> RoomSnapshot {
        let mut snapshot = self.clone();
        for player in &mut snapshot.players {
            if player.id != *client_id {
                player.hand = None;
            }
        }
        snapshot
    }
}

// --- 单元测试 ---
