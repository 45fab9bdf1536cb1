//! # IQUIT 核心逻辑库
//!
//! 这个 `core` crate 包含了 IQUIT 纸牌游戏的所有房间状态管理、
//! 规则校验、退出结算以及客户端-服务器通信消息的定义。
//! 它的设计目标是与具体实现（如网络服务器、客户端UI）解耦，
//! 使其可以被任何上层应用复用。

mod card;
pub mod logic;
mod message;
mod state;

pub use card::*;

pub use message::*;

pub use state::*;
