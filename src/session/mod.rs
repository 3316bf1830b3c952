/// 경매 세션 컨트롤러
/// 한 경매 화면의 수명 주기 전체를 담당한다.
/// 1. 스냅샷 로드와 토픽 구독
/// 2. 낙관적 입찰 반영과 제출, 실패 시 롤백
/// 3. 수신 이벤트 보정 반영
/// 4. 1초 틱과 로컬 종료 처리
// region:    --- Imports
use crate::api::{ApiError, AuctionApi, BidRequest};
use crate::auction::events::{auction_topic, AuctionEvent, EventEnvelope};
use crate::auction::model::{Bid, BidStatus};
use crate::bidding::autobid::AutoBidAgent;
use crate::bidding::validator::{self, RejectReason};
use crate::channel::{ChannelState, ClientFrame, EventChannel, Subscription};
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tokio::time::{interval, Duration};
use tracing::{info, warn};

// endregion: --- Imports

pub mod state;

use state::{BidAttempt, BidPhase, LocalAuctionState};

// region:    --- Session Error
/// 세션 오류 분류
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("로그인이 필요합니다.")]
    Unauthorized,
    #[error("경매 정보가 아직 로드되지 않았습니다.")]
    NotLoaded,
    #[error("경매를 찾을 수 없습니다: {0}")]
    NotFound(i64),
    #[error("네트워크 오류: {0}")]
    Network(String),
    #[error(transparent)]
    Rejected(#[from] RejectReason),
    #[error("입찰이 서버에서 거부되어 롤백되었습니다: {0}")]
    RolledBack(String),
    #[error("채널 오류: {0}")]
    Channel(String),
}
// endregion: --- Session Error

// region:    --- Session Types
/// 세션 사용자. None 이면 비로그인 조회 전용이다.
#[derive(Debug, Clone)]
pub struct Viewer {
    pub user_id: i64,
    pub display_name: String,
}

/// 입찰 옵션
#[derive(Debug, Clone, Copy, Default)]
pub struct BidOptions {
    pub enable_auto_bid: bool,
    pub max_auto_bid: Option<i64>,
}

/// 구동 루프 한 바퀴의 처리 단위
enum Step {
    Event(Option<EventEnvelope>),
    StateChanged,
    Tick,
    Closed,
}
// endregion: --- Session Types

// region:    --- Auction Session
pub struct AuctionSession {
    api: Arc<dyn AuctionApi>,
    channel: Arc<dyn EventChannel>,
    viewer: Option<Viewer>,
    state: Option<LocalAuctionState>,
    subscription: Option<Subscription>,
    auto_bid: AutoBidAgent,
    /// 입찰 시도 기록. 낙관적 반영 -> 확정/롤백 단계를 남긴다.
    attempts: Vec<BidAttempt>,
}

impl AuctionSession {
    pub fn new(
        api: Arc<dyn AuctionApi>,
        channel: Arc<dyn EventChannel>,
        viewer: Option<Viewer>,
    ) -> Self {
        AuctionSession {
            api,
            channel,
            viewer,
            state: None,
            subscription: None,
            auto_bid: AutoBidAgent::new(),
            attempts: Vec::new(),
        }
    }

    pub fn state(&self) -> Option<&LocalAuctionState> {
        self.state.as_ref()
    }

    pub fn attempts(&self) -> &[BidAttempt] {
        &self.attempts
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn auto_bid(&self) -> &AutoBidAgent {
        &self.auto_bid
    }

    /// 자동 입찰 활성화
    pub fn enable_auto_bid(&mut self, ceiling: i64) {
        self.auto_bid.enable(ceiling);
    }

    /// 자동 입찰 비활성화
    pub fn disable_auto_bid(&mut self) {
        self.auto_bid.disable();
    }

    /// 경매 스냅샷을 로드하고, 채널이 연결되어 있으면 토픽을 구독한다.
    /// 실패 시 상태를 만들지 않으므로 호출자가 다시 시도할 수 있다.
    pub async fn load(&mut self, auction_id: i64) -> Result<(), SessionError> {
        info!("{:<12} --> 경매 로드 id: {}", "Session", auction_id);
        let item = self.api.fetch_auction(auction_id).await.map_err(|e| match e {
            ApiError::NotFound => SessionError::NotFound(auction_id),
            other => SessionError::Network(other.to_string()),
        })?;

        let viewer_id = self.viewer.as_ref().map(|v| v.user_id);
        self.state = Some(LocalAuctionState::new(item, viewer_id, Utc::now()));
        self.subscription = None;
        self.attempts.clear();

        if *self.channel.state().borrow() == ChannelState::Connected {
            self.subscribe().await?;
        }
        Ok(())
    }

    /// 이벤트 토픽 구독. 두 번 호출해도 로컬 전달은 중복되지 않는다.
    /// 이미 구독 중이면 재접속 복구를 위해 구독 프레임만 다시 보낸다.
    pub async fn subscribe(&mut self) -> Result<(), SessionError> {
        let state = self.state.as_ref().ok_or(SessionError::NotLoaded)?;
        let topic = auction_topic(state.item().id);

        if self.subscription.is_some() {
            self.channel
                .send(ClientFrame::Subscribe { channel: topic })
                .await
                .map_err(|e| SessionError::Channel(e.to_string()))?;
            return Ok(());
        }

        let subscription = self
            .channel
            .subscribe(&topic)
            .await
            .map_err(|e| SessionError::Channel(e.to_string()))?;
        self.subscription = Some(subscription);
        info!("{:<12} --> 토픽 구독: auction:{}", "Session", state.item().id);
        Ok(())
    }

    /// 입찰 제출
    /// 검증 통과 시 화면에 먼저 반영(낙관적)하고 서버에 제출한다.
    /// 서버가 거부하면 사전 스냅샷으로 되돌린 뒤 오류를 돌려준다.
    pub async fn place_bid(
        &mut self,
        amount: i64,
        options: BidOptions,
    ) -> Result<Bid, SessionError> {
        let viewer = self.viewer.clone().ok_or(SessionError::Unauthorized)?;
        let api = Arc::clone(&self.api);
        let state = self.state.as_mut().ok_or(SessionError::NotLoaded)?;
        let now = Utc::now();
        let auction_id = state.item().id;

        // 로컬 선검증. 거부 시 상태는 건드리지 않는다.
        validator::validate_bid(state.item(), amount, viewer.user_id, state.last_bid_at(), now)?;

        // 낙관적 반영. id 0 은 아직 서버 확정 전이라는 뜻이다.
        let optimistic = Bid {
            id: 0,
            auction_id,
            bidder_id: viewer.user_id,
            bidder_name: viewer.display_name.clone(),
            amount,
            bid_time: now,
            is_auto_bid: options.enable_auto_bid,
            max_bid: options.max_auto_bid,
            status: BidStatus::Winning,
        };
        let snapshot = state.apply_optimistic(optimistic, now);
        self.attempts.push(BidAttempt {
            amount,
            submitted_at: now,
            phase: BidPhase::Pending,
            bid_id: None,
        });
        let attempt = self.attempts.len() - 1;

        let request = BidRequest {
            bidder_id: viewer.user_id,
            bidder_name: viewer.display_name.clone(),
            amount,
            max_bid: options.max_auto_bid,
            enable_auto_bid: options.enable_auto_bid,
        };

        match api.submit_bid(auction_id, &request).await {
            Ok(confirmed) => {
                state.confirm_bid(viewer.user_id, &confirmed);
                self.attempts[attempt].phase = BidPhase::Confirmed;
                self.attempts[attempt].bid_id = Some(confirmed.id);
                // 자동 입찰 옵션과 함께 제출했다면 에이전트도 같은 상한선으로 켠다
                if options.enable_auto_bid {
                    if let Some(ceiling) = options.max_auto_bid {
                        if self.auto_bid.ceiling() != Some(ceiling) {
                            self.auto_bid.enable(ceiling);
                        }
                    }
                }
                info!(
                    "{:<12} --> 입찰 확정 id: {} 금액: {}",
                    "Session", confirmed.id, confirmed.amount
                );
                Ok(confirmed)
            }
            Err(e) => {
                // 낙관적 반영을 사전 스냅샷으로 통째로 복원한다
                state.restore(snapshot);
                self.attempts[attempt].phase = BidPhase::RolledBack;
                warn!("{:<12} --> 입찰 실패, 롤백: {}", "Session", e);
                Err(SessionError::RolledBack(e.to_string()))
            }
        }
    }

    /// 관심 상품 토글. 낙관적으로 반영하며 실패해도 되돌리지 않는다.
    /// 서버와 어긋난 경우 다음 로드에서 재동기화된다.
    pub async fn toggle_watch(&mut self) -> Result<bool, SessionError> {
        let viewer = self.viewer.clone().ok_or(SessionError::Unauthorized)?;
        let api = Arc::clone(&self.api);
        let state = self.state.as_mut().ok_or(SessionError::NotLoaded)?;

        let watching = !state.watching();
        state.set_watching(viewer.user_id, watching);
        let auction_id = state.item().id;

        if let Err(e) = api.update_watch(auction_id, viewer.user_id, watching).await {
            warn!("{:<12} --> 관심 상품 반영 실패: {}", "Session", e);
        }
        Ok(watching)
    }

    /// 입찰 이력 재조회. 실패하면 빈 목록으로 간주하고 치명적으로 다루지 않는다.
    pub async fn refresh_bids(&mut self) -> Vec<Bid> {
        let api = Arc::clone(&self.api);
        let Some(state) = self.state.as_mut() else {
            return Vec::new();
        };
        match api.fetch_bids(state.item().id).await {
            Ok(bids) => {
                if !bids.is_empty() {
                    state.replace_history(bids.clone());
                }
                bids
            }
            Err(e) => {
                warn!("{:<12} --> 입찰 이력 조회 실패: {}", "Session", e);
                Vec::new()
            }
        }
    }

    /// 1초 틱. 남은 시간을 벽시계 기준으로 재계산한다.
    pub fn tick(&mut self) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        if state.tick(Utc::now()) {
            info!(
                "{:<12} --> 종료 시각 도달, 로컬 종료 처리 id: {}",
                "Session",
                state.item().id
            );
        }
    }

    /// 수신 이벤트 보정 반영. 서버 이벤트가 권위를 가지며 낙관적 추정을 덮어쓴다.
    /// 구독 중인 경매의 이벤트만 처리한다.
    pub async fn apply_event(&mut self, envelope: EventEnvelope) {
        let auction_id = match self.state.as_ref() {
            Some(state) => state.item().id,
            None => return,
        };
        if envelope.auction_id != auction_id {
            return;
        }

        match envelope.event {
            AuctionEvent::BidPlaced { bid } => {
                let decision = {
                    let Some(state) = self.state.as_mut() else {
                        return;
                    };
                    state.reconcile_bid(bid.clone());
                    self.viewer
                        .as_ref()
                        .and_then(|v| self.auto_bid.react(v.user_id, state, &bid, Utc::now()))
                };

                if let Some(next) = decision {
                    info!("{:<12} --> 자동 입찰 제출: {}", "AutoBid", next);
                    let options = BidOptions {
                        enable_auto_bid: true,
                        max_auto_bid: self.auto_bid.ceiling(),
                    };
                    if let Err(e) = self.place_bid(next, options).await {
                        // 거부되면 재시도하지 않고 다음 이벤트를 기다린다
                        warn!("{:<12} --> 자동 입찰 거부: {}", "AutoBid", e);
                    }
                }
            }
            AuctionEvent::AuctionStarted { .. } => {
                if let Some(state) = self.state.as_mut() {
                    state.apply_started();
                }
            }
            AuctionEvent::AuctionEnded { .. } => {
                if let Some(state) = self.state.as_mut() {
                    if state.apply_ended() {
                        info!("{:<12} --> 경매 종료 확정 id: {}", "Session", auction_id);
                    }
                }
            }
            AuctionEvent::TimeExtended { new_end_time } => {
                if let Some(state) = self.state.as_mut() {
                    if state.apply_extension(new_end_time, Utc::now()) {
                        info!(
                            "{:<12} --> 종료 시각 연장: {}",
                            "Session", new_end_time
                        );
                    }
                }
            }
            AuctionEvent::BidRetracted { bid_id } => {
                // 철회는 지원하지 않는다. 이력 재구성 규칙이 정해질 때까지 무시한다.
                warn!(
                    "{:<12} --> 입찰 철회 이벤트 무시 bid_id: {}",
                    "Session", bid_id
                );
            }
            // 알 수 없는 이벤트 타입은 무시한다 (전방 호환)
            AuctionEvent::Unknown => {}
        }
    }

    /// 수신 대기 중인 이벤트를 모두 반영한다. 블로킹하지 않으므로
    /// 구동 루프 없이 화면 갱신 주기에 맞춰 호출할 수 있다.
    pub async fn drain_events(&mut self) {
        loop {
            let envelope = match self.subscription.as_mut().and_then(|s| s.try_recv()) {
                Some(envelope) => envelope,
                None => break,
            };
            self.apply_event(envelope).await;
        }
    }

    /// 세션 구동 루프
    /// 구독 이벤트, 채널 연결 상태, 1초 틱을 한 태스크에서 처리한다.
    /// 재접속 시 구독 프레임을 다시 보내고, 끊긴 동안 놓친 이벤트는
    /// 이후 수신분으로 보정한다.
    pub async fn run(&mut self) -> Result<(), SessionError> {
        if self.state.is_none() {
            return Err(SessionError::NotLoaded);
        }
        let mut ticker = interval(Duration::from_secs(1));
        let mut state_rx = self.channel.state();
        let mut was_connected = *state_rx.borrow() == ChannelState::Connected;

        loop {
            let step = match self.subscription.as_mut() {
                Some(subscription) => tokio::select! {
                    event = subscription.recv() => Step::Event(event),
                    changed = state_rx.changed() => {
                        if changed.is_err() { Step::Closed } else { Step::StateChanged }
                    }
                    _ = ticker.tick() => Step::Tick,
                },
                None => tokio::select! {
                    changed = state_rx.changed() => {
                        if changed.is_err() { Step::Closed } else { Step::StateChanged }
                    }
                    _ = ticker.tick() => Step::Tick,
                },
            };

            match step {
                Step::Event(Some(envelope)) => self.apply_event(envelope).await,
                Step::Event(None) => {
                    // 구독 스트림이 끝났다. 재접속 시 다시 구독한다.
                    self.subscription = None;
                }
                Step::StateChanged => {
                    let connected = *state_rx.borrow() == ChannelState::Connected;
                    if connected && !was_connected {
                        info!("{:<12} --> 채널 재접속, 재구독", "Session");
                        if let Err(e) = self.subscribe().await {
                            warn!("{:<12} --> 재구독 실패: {}", "Session", e);
                        }
                    }
                    was_connected = connected;
                }
                Step::Tick => self.tick(),
                Step::Closed => return Ok(()),
            }
        }
    }
}
// endregion: --- Auction Session
