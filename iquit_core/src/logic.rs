//! 房间状态机：所有对局操作都在这里实现。
//!
//! 每个函数接收 `&mut RoomState` 和意图参数，校验全部通过后才改动状态，
//! 返回要由网关投递的消息列表；任何错误都保证房间状态与进入前一致
//! （turn_action 内部的回滚即为此服务）。
//! 并发约束由上层保证：同一房间的意图严格串行处理。

use crate::card::{hand_value, is_valid_play, shuffled_deck, Card, PlayError};
use crate::message::{Outbound, Pick, PickSource, QuitResult, ServerMessage};
use crate::state::{Player, PlayerId, RevealPhase, RoomState};
use std::time::Instant;
use thiserror::Error;

/// 每人每轮的起手牌数
const HAND_SIZE: usize = 5;
/// 房间人数上限
const MAX_PLAYERS: usize = 6;
/// 宣告退出前每人至少要完成的回合数
const MIN_TURNS_BEFORE_QUIT: u32 = 3;
/// 退出失败的固定罚分
const QUIT_PENALTY: u32 = 25;

// --- 错误类型 ---

/// 意图被拒绝的全部原因。
/// Display 文本就是发回给出错连接的 error{msg} 内容，不会广播给其他人。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    #[error("Room not found.")]
    RoomNotFound,
    #[error("Room already exists. Try a different code.")]
    RoomExists,
    #[error("Room is full.")]
    RoomFull,
    #[error("Game has already started. Cannot join.")]
    GameAlreadyStarted,
    #[error("You are already in this room.")]
    AlreadyInRoom,
    #[error("Need at least 2 players to start.")]
    NotEnoughPlayers,
    #[error("Not your turn!")]
    NotYourTurn,
    #[error("You are eliminated and cannot {action}!")]
    PlayerEliminated { action: &'static str },
    #[error(transparent)]
    InvalidPlay(#[from] PlayError),
    #[error("Must pick from deck on first turn.")]
    InvalidPickSource,
    #[error("Deck is empty!")]
    DeckExhausted,
    #[error("No card(s) to pick from center!")]
    CenterPileEmpty,
    #[error("Invalid card index.")]
    InvalidCardIndex,
    #[error("You must take at least 3 turns before quitting.")]
    InsufficientTurns,
    #[error("Only the host can kick players.")]
    NotHost,
    #[error("Cannot kick yourself.")]
    CannotKickSelf,
    #[error("Player not found in room.")]
    PlayerNotFound,
}

// --- 房间操作 ---

/// 加入房间。游戏开始后（任何人手上有牌）不再接受加入。
pub fn join_room(
    state: &mut RoomState,
    player_id: PlayerId,
    name: String,
) -> Result<Vec<Outbound>, GameError> {
    if state.game_started() {
        return Err(GameError::GameAlreadyStarted);
    }
    if state.players.iter().any(|p| p.id == player_id) {
        return Err(GameError::AlreadyInRoom);
    }
    if state.players.len() >= MAX_PLAYERS {
        return Err(GameError::RoomFull);
    }

    state.players.push(Player {
        id: player_id,
        name,
        hand: Vec::new(),
        eliminated: false,
    });
    state.turns_taken.insert(player_id, 0);

    Ok(vec![Outbound::Room(ServerMessage::RoomState(state.snapshot()))])
}

/// 开始游戏：按加入顺序给每人发 5 张牌，并清零所有轮次状态
pub fn start_game(state: &mut RoomState) -> Result<Vec<Outbound>, GameError> {
    if state.players.len() < 2 {
        return Err(GameError::NotEnoughPlayers);
    }

    for i in 0..state.players.len() {
        state.players[i].eliminated = false;
        state.players[i].hand.clear();
        for _ in 0..HAND_SIZE {
            if let Some(card) = state.deck.pop() {
                state.players[i].hand.push(card);
            }
        }
    }

    state.scores = state.players.iter().map(|p| (p.id, 0)).collect();
    state.turns_taken = state.players.iter().map(|p| (p.id, 0)).collect();
    state.turn = 0;
    state.turn_started_at = Instant::now();
    state.center_pile.clear();

    Ok(vec![Outbound::Room(ServerMessage::RoomState(state.snapshot()))])
}

/// 回合动作：打出一组牌并补摸一张。
///
/// 整个操作是一笔事务：任何一步校验失败都会把已移出的牌放回手里，
/// 房间状态与进入前完全一致。
pub fn turn_action(
    state: &mut RoomState,
    actor: PlayerId,
    throw_cards: Vec<Card>,
    pick: Pick,
) -> Result<Vec<Outbound>, GameError> {
    // 断线清理可能刚清空玩家列表而注册表还没删掉房间，
    // 落在这个窗口里的意图按房间不存在处理
    if state.players.is_empty() {
        return Err(GameError::RoomNotFound);
    }
    // turn 在玩家被移除后可能越界，读取时按当前人数取模
    let turn_idx = state.turn % state.players.len();
    let player = &state.players[turn_idx];
    if player.id != actor {
        return Err(GameError::NotYourTurn);
    }
    if player.eliminated {
        return Err(GameError::PlayerEliminated { action: "take turns" });
    }

    is_valid_play(&throw_cards)?;

    // 按 (花色, 点数) 逐张移出手牌；声称的牌不在手里时跳过
    let mut removed = Vec::with_capacity(throw_cards.len());
    for card in &throw_cards {
        let hand = &mut state.players[turn_idx].hand;
        if let Some(pos) = hand.iter().position(|h| h == card) {
            removed.push(hand.remove(pos));
        }
    }

    // 开局规则：房间的第一手只能从牌堆摸
    if state.turn == 0 && state.center_pile.is_empty() && pick.source != PickSource::Deck {
        state.players[turn_idx].hand.extend(removed);
        return Err(GameError::InvalidPickSource);
    }

    match pick.source {
        PickSource::Deck => match state.deck.pop() {
            Some(card) => state.players[turn_idx].hand.push(card),
            None => {
                state.players[turn_idx].hand.extend(removed);
                return Err(GameError::DeckExhausted);
            }
        },
        PickSource::Center => {
            if state.center_pile.is_empty() {
                state.players[turn_idx].hand.extend(removed);
                return Err(GameError::CenterPileEmpty);
            }
            let index = pick.index.unwrap_or(0);
            if index >= state.center_pile.len() {
                state.players[turn_idx].hand.extend(removed);
                return Err(GameError::InvalidCardIndex);
            }
            // 拿走指定的一张，其余的牌永久离场（不回牌堆）
            let picked = state.center_pile[index];
            state.players[turn_idx].hand.push(picked);
            state.center_pile.clear();
        }
    }

    // 中央牌堆整体替换为这次打出的牌
    state.center_pile = throw_cards;
    *state.turns_taken.entry(actor).or_default() += 1;

    // 行动权移交给下一位未淘汰的玩家
    match next_active_idx(state, state.turn) {
        Some(next) => {
            state.turn = next;
            state.turn_started_at = Instant::now();
            Ok(vec![Outbound::Room(ServerMessage::RoomState(state.snapshot()))])
        }
        // 找不到可行动的玩家：对局就此结束
        None => Ok(vec![Outbound::Room(game_over_message(state))]),
    }
}

/// 宣告 "IQUIT"：比较手牌分值并立即记分，然后进入亮牌子阶段。
///
/// 注意两处刻意的时序：分数在此刻就写入 scores，
/// 而淘汰标记要等亮牌全部结束（finished_revealing）才重新计算，
/// 所以亮牌期间的快照里可能出现分数超标但尚未淘汰的玩家。
pub fn quit(state: &mut RoomState, actor: PlayerId) -> Result<Vec<Outbound>, GameError> {
    // 空房间窗口与 turn_action 相同
    if state.players.is_empty() {
        return Err(GameError::RoomNotFound);
    }
    let turn_idx = state.turn % state.players.len();
    let player = &state.players[turn_idx];
    if player.id != actor {
        return Err(GameError::NotYourTurn);
    }
    if player.eliminated {
        return Err(GameError::PlayerEliminated { action: "quit" });
    }
    if state.turns_taken.get(&actor).copied().unwrap_or(0) < MIN_TURNS_BEFORE_QUIT {
        return Err(GameError::InsufficientTurns);
    }

    let quitter_name = player.name.clone();
    let my_value = hand_value(&player.hand);

    // 只与未淘汰的对手比较；被淘汰玩家既不参与比较也不会被记分
    let opponents: Vec<(PlayerId, u32)> = state
        .players
        .iter()
        .filter(|p| p.id != actor && !p.eliminated)
        .map(|p| (p.id, hand_value(&p.hand)))
        .collect();

    // 必须严格低于所有对手才算成功，平分视为失败；
    // 没有对手时按空集上的全称判断算成功
    let success = opponents.iter().all(|&(_, value)| my_value < value);

    let message = if success {
        for &(id, value) in &opponents {
            *state.scores.entry(id).or_default() += value;
        }
        format!(
            "{} quit and had the lowest value! Others get their hand values as score.",
            quitter_name
        )
    } else {
        *state.scores.entry(actor).or_default() += QUIT_PENALTY;
        format!("{} quit but did not have the lowest value. 25 penalty!", quitter_name)
    };

    // 此刻快照所有人的手牌：这份快照是客户端亮牌动画的唯一依据
    let all_players: Vec<_> = (0..state.players.len()).map(|i| state.view_of(i)).collect();
    let mut messages = vec![Outbound::Room(ServerMessage::QuitReveal {
        quit_player: state.view_of(turn_idx),
        all_players,
        quit_result: QuitResult { success, message },
    })];

    // 亮牌队列：按加入顺序排列的未淘汰非退出者
    let queue: Vec<PlayerId> = state
        .players
        .iter()
        .filter(|p| p.id != actor && !p.eliminated)
        .map(|p| p.id)
        .collect();

    if let Some(&first) = queue.first() {
        messages.push(Outbound::Room(ServerMessage::NextRevealingPlayer { player_id: first }));
        state.reveal = Some(RevealPhase { queue, cursor: 0, in_progress: true });
    } else {
        messages.push(Outbound::Room(ServerMessage::RevealComplete));
        state.reveal = Some(RevealPhase { queue, cursor: 0, in_progress: false });
    }

    // 淘汰判定刻意不在这里做，见 finished_revealing
    Ok(messages)
}

/// 亮牌通知：把某位玩家的第 card_index 张牌翻开给所有人看。
/// 除广播外不改动任何状态，亮牌节奏完全由客户端驱动。
pub fn reveal_card(
    state: &RoomState,
    player_id: PlayerId,
    card_index: usize,
) -> Result<Vec<Outbound>, GameError> {
    let player = state
        .players
        .iter()
        .find(|p| p.id == player_id)
        .ok_or(GameError::PlayerNotFound)?;
    let card = *player.hand.get(card_index).ok_or(GameError::InvalidCardIndex)?;
    if player.eliminated {
        return Err(GameError::PlayerEliminated { action: "reveal cards" });
    }

    Ok(vec![Outbound::Room(ServerMessage::CardRevealed { player_id, card_index, card })])
}

/// 当前玩家亮牌完毕，队列前进一位。
/// 队列耗尽时宣布亮牌结束，并在此刻（也只在此刻）重新计算淘汰；
/// 若只剩一名未淘汰玩家则顺带宣布对局结束。
pub fn finished_revealing(state: &mut RoomState) -> Result<Vec<Outbound>, GameError> {
    // 没有进行中的亮牌阶段时静默忽略（客户端的自动兜底可能重复发送）
    let Some(reveal) = state.reveal.as_mut() else {
        return Ok(Vec::new());
    };
    if !reveal.in_progress {
        return Ok(Vec::new());
    }

    reveal.cursor += 1;
    if let Some(&next) = reveal.queue.get(reveal.cursor) {
        return Ok(vec![Outbound::Room(ServerMessage::NextRevealingPlayer { player_id: next })]);
    }

    reveal.in_progress = false;
    let mut messages = vec![Outbound::Room(ServerMessage::RevealComplete)];

    // 亮牌全部结束，现在才把分数超标落实为淘汰
    update_eliminations(state);
    if state.players.iter().filter(|p| !p.eliminated).count() == 1 {
        messages.push(Outbound::Room(game_over_message(state)));
    }
    Ok(messages)
}

/// 开始下一轮：换一副新牌堆，只给未淘汰的玩家发牌
pub fn start_next_round(state: &mut RoomState) -> Result<Vec<Outbound>, GameError> {
    state.deck = shuffled_deck();
    state.center_pile.clear();
    state.reveal = None;

    // 从列表里第一位未淘汰的玩家开始
    state.turn = state.players.iter().position(|p| !p.eliminated).unwrap_or(0);
    state.turn_started_at = Instant::now();
    state.turns_taken = state.players.iter().map(|p| (p.id, 0)).collect();

    for i in 0..state.players.len() {
        state.players[i].hand.clear();
        if state.players[i].eliminated {
            // 被淘汰的玩家保持空手牌，不参与发牌
            continue;
        }
        for _ in 0..HAND_SIZE {
            if let Some(card) = state.deck.pop() {
                state.players[i].hand.push(card);
            }
        }
    }

    Ok(vec![
        Outbound::Room(ServerMessage::RoomState(state.snapshot())),
        Outbound::Room(ServerMessage::NextRoundStarted),
    ])
}

/// 房主把玩家踢出房间。
/// 房主身份按列表位置推导，被踢者会收到定向的 kicked 通知。
pub fn kick_player(
    state: &mut RoomState,
    kicker: PlayerId,
    target: PlayerId,
) -> Result<Vec<Outbound>, GameError> {
    let host_id = state.players.first().map(|p| p.id);
    if host_id != Some(kicker) {
        return Err(GameError::NotHost);
    }
    if target == kicker {
        return Err(GameError::CannotKickSelf);
    }
    let index = state
        .players
        .iter()
        .position(|p| p.id == target)
        .ok_or(GameError::PlayerNotFound)?;
    let removed = state.players.remove(index);

    Ok(vec![
        Outbound::Target(
            target,
            ServerMessage::Kicked { msg: "You have been kicked from the room.".to_string() },
        ),
        Outbound::Room(ServerMessage::RoomState(state.snapshot())),
        Outbound::Room(ServerMessage::Info {
            msg: format!("{} has been kicked from the room.", removed.name),
        }),
    ])
}

/// 连接断开后的移除。不做任何回合修复：turn 指针留待下次操作时取模纠正。
/// 返回空列表时房间已无人，由注册表负责删除。
pub fn remove_player(state: &mut RoomState, player_id: PlayerId) -> Vec<Outbound> {
    let Some(index) = state.players.iter().position(|p| p.id == player_id) else {
        return Vec::new();
    };
    state.players.remove(index);
    state.turns_taken.remove(&player_id);

    if state.players.is_empty() {
        Vec::new()
    } else {
        vec![Outbound::Room(ServerMessage::RoomState(state.snapshot()))]
    }
}

// --- 辅助逻辑函数 ---

/// 从 from 之后开始环形扫描，找下一位未淘汰玩家的索引
fn next_active_idx(state: &RoomState, from: usize) -> Option<usize> {
    let n = state.players.len();
    if n == 0 {
        return None;
    }
    let mut idx = (from + 1) % n;
    for _ in 0..n {
        if !state.players[idx].eliminated {
            return Some(idx);
        }
        idx = (idx + 1) % n;
    }
    None
}

/// 把分数超过阈值的玩家标记为淘汰。
/// 分数在一局内只增不减，所以只需要单向置位。
fn update_eliminations(state: &mut RoomState) {
    for player in &mut state.players {
        let score = state.scores.get(&player.id).copied().unwrap_or(0);
        if score > state.elimination_score {
            player.eliminated = true;
        }
    }
}

/// 对局结束消息：恰好剩一名未淘汰玩家时他就是赢家，否则没有赢家
fn game_over_message(state: &RoomState) -> ServerMessage {
    let mut active = state.players.iter().enumerate().filter(|(_, p)| !p.eliminated);
    let winner = match (active.next(), active.next()) {
        (Some((index, _)), None) => Some(state.view_of(index)),
        _ => None,
    };
    ServerMessage::GameOver { winner }
}

// --- 单元测试 ---
