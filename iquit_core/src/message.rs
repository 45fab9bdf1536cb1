use crate::card::Card;
use crate::state::{PlayerId, PlayerView, RoomSnapshot};
use serde::{Deserialize, Serialize};

// --- 客户端 -> 服务器 的意图 ---
// 线上格式为 {"type": "create_room", ...} 形式的内部标签 JSON。
// 除创建 / 加入外的意图都携带房间代码，网关据此路由到具体房间。

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    // --- 房间管理意图 ---
    /// 创建新房间，创建者自动成为第一位玩家（即房主）
    CreateRoom {
        code: String,
        name: String,
        /// 缺省时按 100 分淘汰
        #[serde(default = "default_elimination_score")]
        elimination_score: u32,
    },
    /// 加入已存在的房间
    JoinRoom { code: String, name: String },
    /// 房主将玩家踢出房间
    KickPlayer { code: String, target_id: PlayerId },

    // --- 对局内意图 ---
    /// 开始游戏：按加入顺序给每人发 5 张牌
    StartGame { code: String },
    /// 回合动作：打出一组牌并补摸一张牌
    TurnAction {
        code: String,
        throw_cards: Vec<Card>,
        pick: Pick,
    },
    /// 宣告 "IQUIT"，结束本轮并触发比分结算
    Quit { code: String },
    /// 亮牌阶段：翻开某位玩家的一张牌给所有人看
    RevealCard {
        code: String,
        player_id: PlayerId,
        card_index: usize,
    },
    /// 当前玩家亮牌完毕，推进亮牌队列
    FinishedRevealing { code: String },
    /// 上一轮结算完毕，开始下一轮
    StartNextRound { code: String },
}

fn default_elimination_score() -> u32 {
    100
}

impl ClientMessage {
    /// 这条意图要操作的房间
    pub fn room_code(&self) -> &str {
        match self {
            ClientMessage::CreateRoom { code, .. }
            | ClientMessage::JoinRoom { code, .. }
            | ClientMessage::KickPlayer { code, .. }
            | ClientMessage::StartGame { code }
            | ClientMessage::TurnAction { code, .. }
            | ClientMessage::Quit { code }
            | ClientMessage::RevealCard { code, .. }
            | ClientMessage::FinishedRevealing { code }
            | ClientMessage::StartNextRound { code } => code,
        }
    }
}

/// 摸牌的目标
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Pick {
    pub source: PickSource,
    /// 仅从中央牌堆拿牌时有意义，缺省取第 0 张
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PickSource {
    /// 从牌堆摸顶上一张
    Deck,
    /// 从中央牌堆按序号拿一张，其余的牌永久离场
    Center,
}

// --- 服务器 -> 客户端 的广播 ---

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// 房间完整快照，几乎每次状态变更后都会发送。
    /// 网关发送前会按接收者调用 RoomSnapshot::for_client 净化。
    RoomState(RoomSnapshot),
    /// 有人宣告退出：携带此刻所有人的手牌与结算结论。
    /// 这是唯一一处向全房间公开全部手牌的消息，驱动客户端的亮牌动画。
    QuitReveal {
        quit_player: PlayerView,
        all_players: Vec<PlayerView>,
        quit_result: QuitResult,
    },
    /// 轮到该玩家亮牌
    NextRevealingPlayer { player_id: PlayerId },
    /// 亮牌阶段结束，淘汰结果此后才生效
    RevealComplete,
    /// 某玩家的某张牌已翻开
    CardRevealed {
        player_id: PlayerId,
        card_index: usize,
        card: Card,
    },
    /// 新一轮已开始
    NextRoundStarted,
    /// 游戏结束；winner 为空表示没有赢家
    GameOver { winner: Option<PlayerView> },
    /// 定向通知：你已被踢出房间
    Kicked { msg: String },
    /// 房间内的提示信息
    Info { msg: String },
    /// 定向通知：意图被拒绝的原因
    Error { msg: String },
}

/// 退出结算的结论
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct QuitResult {
    pub success: bool,
    pub message: String,
}

// --- 网关投递封套 ---

/// 游戏逻辑产出的待发送消息：发给整个房间，或定向发给某位玩家。
/// 网关只按这个封套投递，不理解消息内容。
#[derive(Debug, Clone)]
pub enum Outbound {
    Room(ServerMessage),
    Target(PlayerId, ServerMessage),
}

// --- 单元测试 ---
