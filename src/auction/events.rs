use crate::auction::model::Bid;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 실시간 채널 토픽 이름
pub fn auction_topic(auction_id: i64) -> String {
    format!("auction:{}", auction_id)
}

/// 실시간 경매 이벤트
/// 와이어 포맷은 {type, data} 쌍이며, 알 수 없는 타입은 Unknown 으로 수신한다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum AuctionEvent {
    // 입찰 이벤트
    BidPlaced { bid: Bid },
    // 경매 시작 이벤트
    AuctionStarted { started_at: DateTime<Utc> },
    // 경매 종료 이벤트
    AuctionEnded { ended_at: DateTime<Utc> },
    // 종료 시각 연장 이벤트 (스나이핑 방지)
    TimeExtended { new_end_time: DateTime<Utc> },
    // 입찰 철회 이벤트 (수신만 하고 처리하지 않는다)
    BidRetracted { bid_id: i64 },
    #[serde(other)]
    Unknown,
}

/// 실시간 이벤트 봉투
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub auction_id: i64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: AuctionEvent,
}

impl EventEnvelope {
    pub fn new(auction_id: i64, timestamp: DateTime<Utc>, event: AuctionEvent) -> Self {
        Self {
            auction_id,
            timestamp,
            event,
        }
    }
}
