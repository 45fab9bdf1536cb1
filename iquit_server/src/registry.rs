//! 房间注册表：进程内唯一的 "房间代码 -> 房间" 映射。
//!
//! 只有 create / get / remove_if_empty 会碰这张表，
//! 其余代码一律通过拿到的 Arc<Room> 操作具体房间。

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use iquit_core::logic::GameError;
use iquit_core::{PlayerId, RoomState, ServerMessage};
use parking_lot::Mutex as P_Mutex;
use tokio::sync::{mpsc, RwLock};

pub type SharedState = Arc<RoomRegistry>;

/// 单个房间：权威状态加上它的所有活跃连接。
// 重要‼️：严格规定使用锁的顺序，避免死锁：
// connections -> state
pub struct Room {
    /// 每个房间一把互斥锁，同一房间的意图因此严格串行
    pub state: P_Mutex<RoomState>,
    /// 将 PlayerId 映射到该玩家的写通道，广播即逐个投递
    pub connections: RwLock<HashMap<PlayerId, mpsc::Sender<ServerMessage>>>,
}

pub struct RoomRegistry {
    rooms: DashMap<String, Arc<Room>>,
}

impl RoomRegistry {
    pub fn new() -> RoomRegistry {
        RoomRegistry { rooms: DashMap::new() }
    }

    /// 以给定初始状态创建房间。
    /// 两个连接同时用同一代码创建时，entry 保证恰有一个成功，
    /// 另一个拿到 RoomExists。
    pub fn create(&self, state: RoomState) -> Result<Arc<Room>, GameError> {
        match self.rooms.entry(state.code.clone()) {
            Entry::Occupied(_) => Err(GameError::RoomExists),
            Entry::Vacant(entry) => {
                let room = Arc::new(Room {
                    state: P_Mutex::new(state),
                    connections: RwLock::new(HashMap::new()),
                });
                entry.insert(room.clone());
                Ok(room)
            }
        }
    }

    pub fn get(&self, code: &str) -> Option<Arc<Room>> {
        self.rooms.get(code).map(|room| room.clone())
    }

    /// 房间没有玩家时将其移除（踢人 / 断线后调用）
    pub fn remove_if_empty(&self, code: &str) -> bool {
        self.rooms
            .remove_if(code, |_, room| room.state.lock().players.is_empty())
            .is_some()
    }

    /// 当前房间数，仅供健康检查使用
    pub fn len(&self) -> usize {
        self.rooms.len()
    }
}

// --- 单元测试 ---
