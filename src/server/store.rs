/// 인메모리 권위 상태 저장소
/// 영속 계층 없이 전체 경매 상태를 메모리에 보관하고,
/// 클라이언트와 동일한 검증기로 입찰을 다시 판정한다.
// region:    --- Imports
use crate::api::BidRequest;
use crate::auction::events::{AuctionEvent, EventEnvelope};
use crate::auction::model::{AuctionItem, AuctionStatus, Bid, BidStatus};
use crate::bidding::validator::{self, RejectReason};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use thiserror::Error;
use tokio::sync::RwLock;

// endregion: --- Imports

/// 마감 임박 구간 (초). 이 구간에 수락된 입찰은 종료 시각을 연장한다.
const ANTI_SNIPE_WINDOW_SECS: i64 = 30;
/// 연장된 새 종료 시각은 수락 시점 + 이 값이다.
const ANTI_SNIPE_EXTENSION_SECS: i64 = 60;

// region:    --- Store Error
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("경매를 찾을 수 없습니다.")]
    NotFound,
    #[error(transparent)]
    Rejected(#[from] RejectReason),
}
// endregion: --- Store Error

// region:    --- Auction Store
/// 입찰 수락 결과
#[derive(Debug, Clone)]
pub struct AcceptedBid {
    pub bid: Bid,
    /// 스나이핑 방지로 연장된 새 종료 시각
    pub new_end_time: Option<DateTime<Utc>>,
}

pub struct AuctionStore {
    auctions: RwLock<HashMap<i64, AuctionItem>>,
    /// (입찰자, 경매) 별 마지막 입찰 시각. 서버 측 쿨다운 판정에 사용한다.
    /// 클라이언트 쿨다운은 UX 용도일 뿐이므로 여기서 다시 강제한다.
    last_bid_at: RwLock<HashMap<(i64, i64), DateTime<Utc>>>,
    next_bid_id: AtomicI64,
}

impl Default for AuctionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AuctionStore {
    pub fn new() -> Self {
        AuctionStore {
            auctions: RwLock::new(HashMap::new()),
            last_bid_at: RwLock::new(HashMap::new()),
            next_bid_id: AtomicI64::new(1),
        }
    }

    /// 경매 등록 (시드)
    pub async fn insert(&self, item: AuctionItem) {
        self.auctions.write().await.insert(item.id, item);
    }

    /// 스냅샷 조회
    pub async fn get(&self, auction_id: i64) -> Option<AuctionItem> {
        self.auctions.read().await.get(&auction_id).cloned()
    }

    /// 입찰 이력 조회
    pub async fn bids(&self, auction_id: i64) -> Option<Vec<Bid>> {
        self.auctions
            .read()
            .await
            .get(&auction_id)
            .map(|item| item.bid_history.clone())
    }

    /// 입찰 처리. 검증 통과 시 입찰 id 를 부여하고 상태를 갱신한다.
    /// 마감 임박 입찰은 종료 시각을 늦춰 스나이핑을 막는다.
    pub async fn place_bid(
        &self,
        auction_id: i64,
        request: &BidRequest,
    ) -> Result<AcceptedBid, StoreError> {
        let now = Utc::now();
        let mut auctions = self.auctions.write().await;
        let item = auctions.get_mut(&auction_id).ok_or(StoreError::NotFound)?;

        let mut last_bids = self.last_bid_at.write().await;
        let last = last_bids.get(&(request.bidder_id, auction_id)).copied();
        validator::validate_bid(item, request.amount, request.bidder_id, last, now)?;

        let bid = Bid {
            id: self.next_bid_id.fetch_add(1, Ordering::SeqCst),
            auction_id,
            bidder_id: request.bidder_id,
            bidder_name: request.bidder_name.clone(),
            amount: request.amount,
            bid_time: now,
            is_auto_bid: request.enable_auto_bid,
            max_bid: request.max_bid,
            status: BidStatus::Winning,
        };
        item.apply_bid(bid.clone());
        last_bids.insert((request.bidder_id, auction_id), now);

        let mut new_end_time = None;
        if item.time_remaining(now) <= ANTI_SNIPE_WINDOW_SECS {
            let extended = now + Duration::seconds(ANTI_SNIPE_EXTENSION_SECS);
            if item.extend_end(extended) {
                new_end_time = Some(extended);
            }
        }

        Ok(AcceptedBid { bid, new_end_time })
    }

    /// 관심 상품 반영
    pub async fn set_watch(&self, auction_id: i64, user_id: i64, watching: bool) -> bool {
        let mut auctions = self.auctions.write().await;
        match auctions.get_mut(&auction_id) {
            Some(item) => {
                item.set_watch(user_id, watching);
                true
            }
            None => false,
        }
    }

    /// 시간 경과에 따른 수명 주기 전이를 수행하고 발행할 이벤트를 돌려준다.
    pub async fn advance_lifecycle(&self, now: DateTime<Utc>) -> Vec<EventEnvelope> {
        let mut events = Vec::new();
        let mut auctions = self.auctions.write().await;
        for item in auctions.values_mut() {
            if item.status == AuctionStatus::Scheduled && item.start_time <= now && item.mark_live()
            {
                events.push(EventEnvelope::new(
                    item.id,
                    now,
                    AuctionEvent::AuctionStarted { started_at: now },
                ));
            }
            if item.status == AuctionStatus::Live && item.end_time <= now && item.mark_ended() {
                events.push(EventEnvelope::new(
                    item.id,
                    now,
                    AuctionEvent::AuctionEnded { ended_at: now },
                ));
            }
        }
        events
    }
}
// endregion: --- Auction Store
