use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// 경매 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuctionStatus {
    Scheduled,
    Live,
    Ended,
    Cancelled,
}

impl AuctionStatus {
    /// 더 이상 상태가 바뀌지 않는 종료 상태 여부
    pub fn is_terminal(self) -> bool {
        matches!(self, AuctionStatus::Ended | AuctionStatus::Cancelled)
    }
}

// 입찰 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BidStatus {
    Active,
    Outbid,
    Winning,
    Won,
}

// 재고 수량
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub quantity: u32,
    pub reserved: u32,
    pub sold: u32,
}

// 입찰 모델
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    pub id: i64,
    pub auction_id: i64,
    pub bidder_id: i64,
    pub bidder_name: String,
    pub amount: i64,
    pub bid_time: DateTime<Utc>,
    pub is_auto_bid: bool,
    pub max_bid: Option<i64>,
    pub status: BidStatus,
}

// 경매 상품 모델
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuctionItem {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub images: Vec<String>,
    pub starting_price: i64,
    pub current_bid: i64,
    pub bid_increment: i64,
    pub reserve_price: Option<i64>,
    pub buy_now_price: Option<i64>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: AuctionStatus,
    pub seller_id: i64,
    pub bid_history: Vec<Bid>,
    pub watchers: HashSet<i64>,
    pub inventory: Inventory,
}

impl AuctionItem {
    /// 다음 입찰 가능 최소 금액
    pub fn minimum_next_bid(&self) -> i64 {
        self.current_bid + self.bid_increment
    }

    /// 현재 최고(winning) 입찰
    pub fn winning_bid(&self) -> Option<&Bid> {
        self.bid_history
            .iter()
            .find(|b| b.status == BidStatus::Winning)
    }

    /// 해당 사용자가 현재 최고 입찰자인지 여부
    pub fn is_winning(&self, user_id: i64) -> bool {
        self.winning_bid().map_or(false, |b| b.bidder_id == user_id)
    }

    /// 종료 시각까지 남은 시간(초). 음수가 되지 않는다.
    pub fn time_remaining(&self, now: DateTime<Utc>) -> i64 {
        (self.end_time - now).num_seconds().max(0)
    }

    /// 수락된 입찰 반영
    /// 기존 winning 입찰은 outbid 처리하고 현재가를 입찰 금액으로 올린다.
    /// winning 입찰은 항상 최대 1개만 존재한다.
    pub fn apply_bid(&mut self, mut bid: Bid) {
        for prior in self
            .bid_history
            .iter_mut()
            .filter(|b| b.status == BidStatus::Winning)
        {
            prior.status = BidStatus::Outbid;
        }
        bid.status = BidStatus::Winning;
        self.current_bid = bid.amount;
        self.bid_history.push(bid);
    }

    /// 경매 시작 처리 (scheduled -> live 만 허용)
    pub fn mark_live(&mut self) -> bool {
        if self.status != AuctionStatus::Scheduled {
            return false;
        }
        self.status = AuctionStatus::Live;
        true
    }

    /// 경매 종료 처리. 상태 전이는 앞으로만 진행한다.
    /// 이미 종료/취소된 경매에는 아무 일도 하지 않는다.
    pub fn mark_ended(&mut self) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = AuctionStatus::Ended;
        for bid in self
            .bid_history
            .iter_mut()
            .filter(|b| b.status == BidStatus::Winning)
        {
            bid.status = BidStatus::Won;
        }
        true
    }

    /// 종료 시각 연장. 기존 종료 시각보다 늦은 경우에만 반영한다.
    pub fn extend_end(&mut self, new_end_time: DateTime<Utc>) -> bool {
        if self.status.is_terminal() || new_end_time <= self.end_time {
            return false;
        }
        self.end_time = new_end_time;
        true
    }

    /// 관심 상품 등록/해제
    pub fn set_watch(&mut self, user_id: i64, watching: bool) {
        if watching {
            self.watchers.insert(user_id);
        } else {
            self.watchers.remove(&user_id);
        }
    }
}
