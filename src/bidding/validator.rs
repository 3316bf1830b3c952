/// 입찰 검증
/// 클라이언트에서는 UX 선검증으로, 서버에서는 권위 판정으로 동일한 함수를 사용한다.
// region:    --- Imports
use crate::auction::model::{AuctionItem, AuctionStatus};
use chrono::{DateTime, Utc};
use thiserror::Error;

// endregion: --- Imports

/// 동일 사용자 연속 입찰 최소 간격 (ms)
pub const BID_COOLDOWN_MS: i64 = 2_000;

// region:    --- Reject Reason
/// 입찰 거부 사유
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("판매자는 자신의 경매에 입찰할 수 없습니다.")]
    SelfBid,
    #[error("경매가 진행 중이 아닙니다.")]
    NotLive,
    #[error("경매가 이미 종료되었습니다.")]
    AlreadyEnded,
    #[error("입찰 간격이 너무 짧습니다. {remaining_ms}ms 후 다시 시도해 주세요.")]
    Cooldown { remaining_ms: i64 },
    #[error("입찰 금액이 현재 가격보다 낮습니다.")]
    TooLow { current_bid: i64 },
    #[error("최소 입찰 단위 미달입니다. 최소 입찰 금액: {minimum}")]
    BelowIncrement { minimum: i64 },
}

impl RejectReason {
    /// 기계 판독용 코드. 클라이언트가 사유별 분기에 사용한다.
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::SelfBid => "SELF_BID",
            RejectReason::NotLive => "NOT_LIVE",
            RejectReason::AlreadyEnded => "ALREADY_ENDED",
            RejectReason::Cooldown { .. } => "COOLDOWN",
            RejectReason::TooLow { .. } => "LOW_BID",
            RejectReason::BelowIncrement { .. } => "BELOW_INCREMENT",
        }
    }
}
// endregion: --- Reject Reason

// region:    --- Validator
/// 입찰 검증. 부수 효과 없는 순수 판정 함수이며 거부 조건은 항상 같은 순서로 검사한다.
pub fn validate_bid(
    item: &AuctionItem,
    amount: i64,
    bidder_id: i64,
    last_bid_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<(), RejectReason> {
    // 1. 판매자 본인 입찰 금지
    if bidder_id == item.seller_id {
        return Err(RejectReason::SelfBid);
    }

    // 2. 진행 중인 경매만 입찰 가능
    if item.status != AuctionStatus::Live {
        return Err(RejectReason::NotLive);
    }

    // 3. 종료 시각 경과 여부
    if now > item.end_time {
        return Err(RejectReason::AlreadyEnded);
    }

    // 4. 연속 입찰 간격
    if let Some(last) = last_bid_at {
        let elapsed = (now - last).num_milliseconds();
        if elapsed < BID_COOLDOWN_MS {
            return Err(RejectReason::Cooldown {
                remaining_ms: BID_COOLDOWN_MS - elapsed,
            });
        }
    }

    // 5. 현재가 이하 금지
    if amount <= item.current_bid {
        return Err(RejectReason::TooLow {
            current_bid: item.current_bid,
        });
    }

    // 6. 최소 입찰 단위 충족
    if amount < item.minimum_next_bid() {
        return Err(RejectReason::BelowIncrement {
            minimum: item.minimum_next_bid(),
        });
    }

    Ok(())
}
// endregion: --- Validator
