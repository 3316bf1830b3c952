/// 경매 상태 업데이트 스케줄러
/// 시작/종료 시각에 따라 상태를 전이시키고 수명 주기 이벤트를 발행한다.
/// 즉시 구매 등 다른 경로의 종료 처리는 이 범위에 없다.
// region:    --- Imports
use crate::auction::events::EventEnvelope;
use crate::server::store::AuctionStore;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::{interval, Duration};
use tracing::debug;

// endregion: --- Imports

// region:    --- Auction Scheduler
pub struct AuctionScheduler {
    store: Arc<AuctionStore>,
    events: broadcast::Sender<EventEnvelope>,
}

impl AuctionScheduler {
    pub fn new(store: Arc<AuctionStore>, events: broadcast::Sender<EventEnvelope>) -> Self {
        AuctionScheduler { store, events }
    }

    /// 스케줄러 시작
    pub async fn start(&self) {
        let store = Arc::clone(&self.store);
        let events = self.events.clone();
        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(1)); // 1초마다 실행
            loop {
                interval.tick().await;
                for envelope in store.advance_lifecycle(Utc::now()).await {
                    debug!(
                        "{:<12} --> 수명 주기 이벤트 발행: {:?}",
                        "Scheduler", envelope.event
                    );
                    let _ = events.send(envelope);
                }
            }
        });
    }
}
// endregion: --- Auction Scheduler
