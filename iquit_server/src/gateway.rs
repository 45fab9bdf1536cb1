//! 连接网关：WebSocket 生命周期、意图解析与消息投递。
//!
//! 网关不持有任何游戏规则：解析出的意图在房间锁内交给
//! iquit_core::logic 处理，产出的 Outbound 列表在锁外投递。
//! 错误只回给出错的连接，绝不广播。

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use iquit_core::logic::{self, GameError};
use iquit_core::{ClientMessage, Outbound, PlayerId, RoomState, ServerMessage};

use crate::registry::{Room, SharedState};

/// 处理 WebSocket 连接请求
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// 处理单个 WebSocket 连接的生命周期
async fn handle_socket(socket: WebSocket, state: SharedState) {
    let (mut sender, mut receiver) = socket.split();

    // 写通道：各处通过 MPSC 投递，由这个任务串行写回 WebSocket
    let (tx, mut rx) = mpsc::channel::<ServerMessage>(32);

    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let payload = serde_json::to_string(&msg).unwrap();
            if sender.send(Message::Text(payload.into())).await.is_err() {
                // 发送失败，说明客户端已断开，退出任务
                break;
            }
        }
    });

    // 连接上下文：创建 / 加入房间成功后填充
    let mut context: Option<(String, PlayerId)> = None;

    while let Some(Ok(msg)) = receiver.next().await {
        if let Message::Text(text) = msg {
            match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => {
                    handle_client_message(client_msg, state.clone(), &tx, &mut context).await;
                }
                Err(e) => {
                    warn!("解析消息失败: {}", e);
                    let _ = tx
                        .send(ServerMessage::Error { msg: "Malformed message.".to_string() })
                        .await;
                }
            }
        }
    }

    // 客户端断开连接，执行清理工作
    if let Some((code, player_id)) = context {
        handle_disconnect(state, &code, player_id).await;
    }
    info!("客户端连接关闭");
}

/// 核心意图分发逻辑
async fn handle_client_message(
    msg: ClientMessage,
    state: SharedState,
    tx: &mpsc::Sender<ServerMessage>,
    context: &mut Option<(String, PlayerId)>,
) {
    match msg {
        ClientMessage::CreateRoom { code, name, elimination_score } => {
            if context_is_active(&state, context) {
                let _ = tx
                    .send(ServerMessage::Error { msg: "You are already in a room.".to_string() })
                    .await;
                return;
            }

            let player_id = Uuid::new_v4();
            let room =
                match state.create(RoomState::new(code.clone(), player_id, name, elimination_score)) {
                    Ok(room) => room,
                    Err(e) => {
                        let _ = tx.send(ServerMessage::Error { msg: e.to_string() }).await;
                        return;
                    }
                };
            room.connections.write().await.insert(player_id, tx.clone());
            *context = Some((code.clone(), player_id));
            info!("玩家 {} 创建了房间 {}", player_id, code);

            // 创建者此刻是房间里唯一的人，快照直接发回去
            let snapshot = room.state.lock().snapshot();
            let _ = tx.send(ServerMessage::RoomState(snapshot.for_client(&player_id))).await;
        }
        ClientMessage::JoinRoom { code, name } => {
            if context_is_active(&state, context) {
                let _ = tx
                    .send(ServerMessage::Error { msg: "You are already in a room.".to_string() })
                    .await;
                return;
            }
            let Some(room) = state.get(&code) else {
                let _ = tx
                    .send(ServerMessage::Error { msg: GameError::RoomNotFound.to_string() })
                    .await;
                return;
            };

            let player_id = Uuid::new_v4();
            // 锁顺序：connections -> state；加入成功才登记连接
            let result = {
                let mut connections = room.connections.write().await;
                let result = {
                    let mut room_state = room.state.lock();
                    logic::join_room(&mut room_state, player_id, name)
                };
                if result.is_ok() {
                    connections.insert(player_id, tx.clone());
                }
                result
            };

            match result {
                Ok(messages) => {
                    *context = Some((code.clone(), player_id));
                    info!("玩家 {} 加入了房间 {}", player_id, code);
                    deliver(&room, messages).await;
                }
                Err(e) => {
                    let _ = tx.send(ServerMessage::Error { msg: e.to_string() }).await;
                }
            }
        }
        // 进入房间之后的意图：按载荷里的房间代码路由
        other => {
            let Some((_, player_id)) = context else {
                let _ = tx
                    .send(ServerMessage::Error { msg: "Join or create a room first.".to_string() })
                    .await;
                return;
            };
            let player_id = *player_id;

            let code = other.room_code().to_string();
            let Some(room) = state.get(&code) else {
                let _ = tx
                    .send(ServerMessage::Error { msg: GameError::RoomNotFound.to_string() })
                    .await;
                return;
            };

            // 被踢者的连接要在投递完通知后再移出房间
            let kicked = match &other {
                ClientMessage::KickPlayer { target_id, .. } => Some(*target_id),
                _ => None,
            };

            // 游戏逻辑在房间锁内处理，消息在锁外投递
            let result = {
                let mut room_state = room.state.lock();
                match other {
                    ClientMessage::StartGame { .. } => logic::start_game(&mut room_state),
                    ClientMessage::TurnAction { throw_cards, pick, .. } => {
                        logic::turn_action(&mut room_state, player_id, throw_cards, pick)
                    }
                    ClientMessage::Quit { .. } => logic::quit(&mut room_state, player_id),
                    ClientMessage::RevealCard { player_id: target, card_index, .. } => {
                        logic::reveal_card(&room_state, target, card_index)
                    }
                    ClientMessage::FinishedRevealing { .. } => {
                        logic::finished_revealing(&mut room_state)
                    }
                    ClientMessage::StartNextRound { .. } => {
                        logic::start_next_round(&mut room_state)
                    }
                    ClientMessage::KickPlayer { target_id, .. } => {
                        logic::kick_player(&mut room_state, player_id, target_id)
                    }
                    // 前面的分支已经拦下这两种意图
                    ClientMessage::CreateRoom { .. } | ClientMessage::JoinRoom { .. } => {
                        unreachable!()
                    }
                }
            };

            match result {
                Ok(messages) => {
                    deliver(&room, messages).await;
                    if let Some(target) = kicked {
                        room.connections.write().await.remove(&target);
                        if state.remove_if_empty(&code) {
                            info!("房间 {} 已空，已被移除", code);
                        }
                    }
                }
                Err(e) => {
                    // 错误只回给出错的连接，房间状态未被改动
                    let _ = tx.send(ServerMessage::Error { msg: e.to_string() }).await;
                }
            }
        }
    }
}

/// 创建 / 加入前校验连接登记的房间上下文是否仍然有效。
/// 玩家被踢或房间已删除后，连接里残留的上下文视为过期：
/// 清除它并放行，这条连接就能重新创建 / 加入房间。
fn context_is_active(state: &SharedState, context: &mut Option<(String, PlayerId)>) -> bool {
    let Some((code, player_id)) = &*context else {
        return false;
    };
    let still_in_room = state
        .get(code)
        .map(|room| room.state.lock().players.iter().any(|p| p.id == *player_id))
        .unwrap_or(false);
    if !still_in_room {
        *context = None;
    }
    still_in_room
}

/// 把逻辑层产出的消息按封套投递到房间内的连接。
/// room_state 快照是唯一需要按接收者净化的消息。
async fn deliver(room: &Room, messages: Vec<Outbound>) {
    let connections = room.connections.read().await;
    for outbound in messages {
        match outbound {
            Outbound::Room(ServerMessage::RoomState(snapshot)) => {
                for (player_id, sender) in connections.iter() {
                    let msg = ServerMessage::RoomState(snapshot.for_client(player_id));
                    if sender.send(msg).await.is_err() {
                        warn!("向玩家 {} 发送消息失败（可能已断开）", player_id);
                    }
                }
            }
            Outbound::Room(msg) => {
                for (player_id, sender) in connections.iter() {
                    if sender.send(msg.clone()).await.is_err() {
                        warn!("向玩家 {} 发送消息失败（可能已断开）", player_id);
                    }
                }
            }
            Outbound::Target(player_id, msg) => {
                if let Some(sender) = connections.get(&player_id) {
                    let _ = sender.send(msg).await;
                }
            }
        }
    }
}

/// 玩家断开连接后的清理
async fn handle_disconnect(state: SharedState, code: &str, player_id: PlayerId) {
    info!("玩家 {} 从房间 {} 断开连接", player_id, code);
    let Some(room) = state.get(code) else {
        return;
    };

    room.connections.write().await.remove(&player_id);
    let messages = {
        let mut room_state = room.state.lock();
        logic::remove_player(&mut room_state, player_id)
    };

    if state.remove_if_empty(code) {
        info!("房间 {} 已空，已被移除", code);
        return;
    }
    deliver(&room, messages).await;
}

// --- 单元测试 ---
