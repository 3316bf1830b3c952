/// 자동 입찰 에이전트
/// 다른 입찰자의 입찰을 관찰하고 상한선 안에서 대응 입찰 금액을 결정한다.
/// 상태를 직접 바꾸지 않고 결정만 내리며, 제출은 항상 세션 컨트롤러를 거친다.
// region:    --- Imports
use crate::auction::model::Bid;
use crate::bidding::validator;
use crate::session::state::LocalAuctionState;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

// endregion: --- Imports

// region:    --- Auto-Bid Agent
pub struct AutoBidAgent {
    /// 자동 입찰 상한선. None 이면 비활성.
    ceiling: Option<i64>,
}

impl Default for AutoBidAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl AutoBidAgent {
    pub fn new() -> Self {
        AutoBidAgent { ceiling: None }
    }

    /// 자동 입찰 활성화
    pub fn enable(&mut self, ceiling: i64) {
        info!("{:<12} --> 자동 입찰 활성화, 상한선: {}", "AutoBid", ceiling);
        self.ceiling = Some(ceiling);
    }

    /// 자동 입찰 비활성화. 상한선도 함께 지운다.
    pub fn disable(&mut self) {
        info!("{:<12} --> 자동 입찰 비활성화", "AutoBid");
        self.ceiling = None;
    }

    pub fn is_enabled(&self) -> bool {
        self.ceiling.is_some()
    }

    pub fn ceiling(&self) -> Option<i64> {
        self.ceiling
    }

    /// 수신 입찰에 대한 대응 입찰 금액 결정
    /// 상한선을 넘거나 검증기가 거부할 금액은 제출하지 않는다.
    pub fn react(
        &self,
        owner_id: i64,
        state: &LocalAuctionState,
        incoming: &Bid,
        now: DateTime<Utc>,
    ) -> Option<i64> {
        let ceiling = self.ceiling?;

        // 자신의 입찰에는 대응하지 않는다
        if incoming.bidder_id == owner_id {
            return None;
        }

        let next = incoming.amount + state.item().bid_increment;
        if next > ceiling {
            debug!(
                "{:<12} --> 상한선 초과로 중단: {} > {}",
                "AutoBid", next, ceiling
            );
            return None;
        }

        // 지금 당장 수락될 금액인지 선검증. 거부되면 다음 이벤트를 기다린다.
        if let Err(reason) =
            validator::validate_bid(state.item(), next, owner_id, state.last_bid_at(), now)
        {
            debug!("{:<12} --> 선검증 거부: {}", "AutoBid", reason);
            return None;
        }

        Some(next)
    }
}
// endregion: --- Auto-Bid Agent
