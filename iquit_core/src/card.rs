use rand::prelude::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// --- 核心数据结构定义 ---

/// 花色 (Suit)
/// 线上格式与浏览器客户端约定为小写英文单词，如 "hearts"
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Suit {
    Hearts,   // 红心 ♥️
    Diamonds, // 方块 ♦️
    Clubs,    // 梅花 ♣️
    Spades,   // 黑桃 ♠️
}

/// 点数 (Rank)
/// 点数有两张独立的数值表（run_order / point_value），
/// 顺子排序用表和计分用表刻意不同，不要合并。
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum Rank {
    #[serde(rename = "A")]
    Ace,
    #[serde(rename = "2")]
    Two,
    #[serde(rename = "3")]
    Three,
    #[serde(rename = "4")]
    Four,
    #[serde(rename = "5")]
    Five,
    #[serde(rename = "6")]
    Six,
    #[serde(rename = "7")]
    Seven,
    #[serde(rename = "8")]
    Eight,
    #[serde(rename = "9")]
    Nine,
    #[serde(rename = "10")]
    Ten,
    #[serde(rename = "J")]
    Jack,
    #[serde(rename = "Q")]
    Queen,
    #[serde(rename = "K")]
    King,
}

impl Rank {
    /// 顺子校验用的序值：A=1，2..10 按面值，J=11，Q=12，K=13
    pub fn run_order(self) -> u8 {
        match self {
            Rank::Ace => 1,
            Rank::Two => 2,
            Rank::Three => 3,
            Rank::Four => 4,
            Rank::Five => 5,
            Rank::Six => 6,
            Rank::Seven => 7,
            Rank::Eight => 8,
            Rank::Nine => 9,
            Rank::Ten => 10,
            Rank::Jack => 11,
            Rank::Queen => 12,
            Rank::King => 13,
        }
    }

    /// 计分用的分值：A=1，2..10 按面值，J=0，Q=20，K=20
    pub fn point_value(self) -> u32 {
        match self {
            Rank::Ace => 1,
            Rank::Two => 2,
            Rank::Three => 3,
            Rank::Four => 4,
            Rank::Five => 5,
            Rank::Six => 6,
            Rank::Seven => 7,
            Rank::Eight => 8,
            Rank::Nine => 9,
            Rank::Ten => 10,
            Rank::Jack => 0,
            Rank::Queen => 20,
            Rank::King => 20,
        }
    }
}

/// 单张扑克牌 (Card)
/// 按 (花色, 点数) 判等；一副牌里每种组合只出现一次
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize)]
pub struct Card {
    pub suit: Suit,
    pub rank: Rank,
}

impl Card {
    pub fn new(suit: Suit, rank: Rank) -> Card {
        Card { suit, rank }
    }
}

// --- 实现辅助功能 ---

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", match self {
            Suit::Hearts => "♥️",
            Suit::Diamonds => "♦️",
            Suit::Clubs => "♣️",
            Suit::Spades => "♠️",
        })
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", match self {
            Rank::Ace => "A",
            Rank::Two => "2",
            Rank::Three => "3",
            Rank::Four => "4",
            Rank::Five => "5",
            Rank::Six => "6",
            Rank::Seven => "7",
            Rank::Eight => "8",
            Rank::Nine => "9",
            Rank::Ten => "10",
            Rank::Jack => "J",
            Rank::Queen => "Q",
            Rank::King => "K",
        })
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.suit, self.rank)
    }
}

// --- 随机牌组生成 ---

/// 构造一副完整的 52 张牌并均匀洗牌
/// Fisher–Yates 洗牌由 rand 的 shuffle 提供；发牌和摸牌都从尾部 pop
pub fn shuffled_deck() -> Vec<Card> {
    let suits = [Suit::Hearts, Suit::Diamonds, Suit::Clubs, Suit::Spades];
    let ranks = [
        Rank::Ace, Rank::Two, Rank::Three, Rank::Four, Rank::Five, Rank::Six, Rank::Seven,
        Rank::Eight, Rank::Nine, Rank::Ten, Rank::Jack, Rank::Queen, Rank::King,
    ];

    let mut deck = Vec::with_capacity(52);
    for &suit in &suits {
        for &rank in &ranks {
            deck.push(Card { suit, rank });
        }
    }

    let mut rng = rand::rng();
    deck.shuffle(&mut rng);
    deck
}

// --- 出牌校验 ---

/// 出牌不合法的原因，Display 文本直接作为发回给客户端的错误提示
#[derive(Debug, PartialEq, Eq, Clone, Copy, Error)]
pub enum PlayError {
    #[error("No cards selected.")]
    Empty,
    #[error("Series must be same suit.")]
    MixedSuit,
    #[error("Series must be consecutive.")]
    NotConsecutive,
    #[error("Invalid play.")]
    Invalid,
}

/// 校验一组想要打出的牌：
/// - 1 张：任意单牌
/// - 2 张：点数相同的对子（花色不限）
/// - 3 张及以上：同花色且序值连续的顺子
///
/// 与输入顺序无关。纯函数，不触碰任何房间状态。
pub fn is_valid_play(cards: &[Card]) -> Result<(), PlayError> {
    match cards.len() {
        0 => Err(PlayError::Empty),
        1 => Ok(()),
        2 => {
            if cards[0].rank == cards[1].rank {
                Ok(())
            } else {
                Err(PlayError::Invalid)
            }
        }
        _ => {
            if cards.iter().any(|c| c.suit != cards[0].suit) {
                return Err(PlayError::MixedSuit);
            }
            // 序值排序后必须相邻差 1、无重复
            let mut values: Vec<u8> = cards.iter().map(|c| c.rank.run_order()).collect();
            values.sort_unstable();
            if values.windows(2).all(|w| w[1] == w[0] + 1) {
                Ok(())
            } else {
                Err(PlayError::NotConsecutive)
            }
        }
    }
}

// --- 计分 ---

/// 一手牌的总分值，退出结算和淘汰判定共用这张计分表
pub fn hand_value(hand: &[Card]) -> u32 {
    hand.iter().map(|c| c.rank.point_value()).sum()
}

// --- 单元测试 ---
