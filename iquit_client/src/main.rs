use futures_util::{SinkExt, StreamExt};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use url::Url;

use iquit_core::{Card, ClientMessage, Pick, PickSource, PlayerId, Rank, ServerMessage, Suit};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let url = Url::parse("ws://127.0.0.1:5001/ws").unwrap();

    println!("正在连接到: {}", url);
    let (ws_stream, _) = connect_async(url.as_str()).await.expect("无法连接");
    println!("连接成功!");

    let (mut write, mut read) = ws_stream.split();

    // 启动一个任务来处理从服务器接收的消息
    tokio::spawn(async move {
        while let Some(msg) = read.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    match serde_json::from_str::<ServerMessage>(&text) {
                        Ok(server_msg) => {
                            // 简单地将收到的消息打印到控制台
                            println!("\n<-- [服务器消息]:\n{:#?}\n", server_msg);
                            print!("> "); // 重新显示输入提示符
                            std::io::stdout().flush().unwrap();
                        }
                        Err(e) => eprintln!("解析服务器消息失败: {}", e),
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    eprintln!("接收消息时出错: {}", e);
                    break;
                }
            }
        }
    });

    // 主任务处理用户输入
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    println!("--- IQUIT 纸牌客户端 ---");
    println!("可用命令:");
    println!("  create <房间代码> <昵称> [淘汰分数]  - 创建一个新房间");
    println!("  join <房间代码> <昵称>               - 加入一个房间");
    println!("  start                                - 开始游戏 (仅房主)");
    println!("  turn <牌,牌,...> deck|center [序号]  - 出牌并摸牌, 牌写作 10h/ac/ks");
    println!("  quit                                 - 宣告 IQUIT");
    println!("  reveal <玩家ID> <序号>               - 亮出一张牌");
    println!("  done                                 - 本人亮牌完毕");
    println!("  next                                 - 开始下一轮");
    println!("  kick <玩家ID>                        - 踢出玩家 (仅房主)");
    println!("  exit                                 - 退出");

    // 创建 / 加入成功后记住的房间代码，之后的意图都要带上
    let mut room_code: Option<String> = None;

    loop {
        print!("> ");
        std::io::stdout().flush().unwrap();

        let line = stdin.next_line().await?.unwrap_or_default();
        let parts: Vec<&str> = line.trim().split_whitespace().collect();
        let command = parts.get(0).cloned();

        let client_msg = match command {
            Some("create") => {
                if parts.len() < 3 {
                    println!("用法: create <房间代码> <昵称> [淘汰分数]");
                    continue;
                }
                let code = parts[1].to_string();
                let name = parts[2].to_string();
                let elimination_score: u32 =
                    parts.get(3).and_then(|s| s.parse().ok()).unwrap_or(100);
                room_code = Some(code.clone());
                Some(ClientMessage::CreateRoom { code, name, elimination_score })
            }
            Some("join") => {
                if parts.len() < 3 {
                    println!("用法: join <房间代码> <昵称>");
                    continue;
                }
                let code = parts[1].to_string();
                let name = parts[2].to_string();
                room_code = Some(code.clone());
                Some(ClientMessage::JoinRoom { code, name })
            }
            Some("exit") => {
                println!("正在断开连接...");
                break;
            }
            Some(cmd @ ("start" | "turn" | "quit" | "reveal" | "done" | "next" | "kick")) => {
                let Some(code) = room_code.clone() else {
                    println!("请先 create 或 join 一个房间");
                    continue;
                };
                match cmd {
                    "start" => Some(ClientMessage::StartGame { code }),
                    "turn" => {
                        if parts.len() < 3 {
                            println!("用法: turn <牌,牌,...> deck|center [序号]");
                            continue;
                        }
                        let Some(throw_cards) = parse_cards(parts[1]) else {
                            println!("无法解析牌: {} (示例: 3c,4c,5c)", parts[1]);
                            continue;
                        };
                        let pick = match parts[2] {
                            "deck" => Pick { source: PickSource::Deck, index: None },
                            "center" => Pick {
                                source: PickSource::Center,
                                index: parts.get(3).and_then(|i| i.parse().ok()),
                            },
                            _ => {
                                println!("摸牌来源必须是 deck 或 center");
                                continue;
                            }
                        };
                        Some(ClientMessage::TurnAction { code, throw_cards, pick })
                    }
                    "quit" => Some(ClientMessage::Quit { code }),
                    "reveal" => {
                        if parts.len() < 3 {
                            println!("用法: reveal <玩家ID> <序号>");
                            continue;
                        }
                        let player_id: PlayerId = parts[1].parse().expect("无效的玩家ID格式");
                        let card_index: usize = parts[2].parse().expect("无效的序号");
                        Some(ClientMessage::RevealCard { code, player_id, card_index })
                    }
                    "done" => Some(ClientMessage::FinishedRevealing { code }),
                    "next" => Some(ClientMessage::StartNextRound { code }),
                    "kick" => {
                        if parts.len() < 2 {
                            println!("用法: kick <玩家ID>");
                            continue;
                        }
                        let target_id: PlayerId = parts[1].parse().expect("无效的玩家ID格式");
                        Some(ClientMessage::KickPlayer { code, target_id })
                    }
                    _ => unreachable!(),
                }
            }
            _ => {
                println!("未知命令: {}", line);
                continue;
            }
        };

        if let Some(msg) = client_msg {
            let payload = serde_json::to_string(&msg)?;
            write.send(Message::Text(payload.into())).await?;
        }
    }

    Ok(())
}

/// 解析逗号分隔的一组牌，如 "3c,4c,5c"
fn parse_cards(tokens: &str) -> Option<Vec<Card>> {
    tokens.split(',').map(parse_card).collect()
}

/// 解析单张牌：点数在前、花色字母在后，如 "10h"、"ac"、"ks"
fn parse_card(token: &str) -> Option<Card> {
    let token = token.trim().to_lowercase();
    if !token.is_ascii() || token.len() < 2 {
        return None;
    }
    let (rank_part, suit_part) = token.split_at(token.len() - 1);
    let suit = match suit_part {
        "h" => Suit::Hearts,
        "d" => Suit::Diamonds,
        "c" => Suit::Clubs,
        "s" => Suit::Spades,
        _ => return None,
    };
    let rank = match rank_part {
        "a" => Rank::Ace,
        "2" => Rank::Two,
        "3" => Rank::Three,
        "4" => Rank::Four,
        "5" => Rank::Five,
        "6" => Rank::Six,
        "7" => Rank::Seven,
        "8" => Rank::Eight,
        "9" => Rank::Nine,
        "10" => Rank::Ten,
        "j" => Rank::Jack,
        "q" => Rank::Queen,
        "k" => Rank::King,
        _ => return None,
    };
    Some(Card::new(suit, rank))
}

// --- 单元测试 ---
