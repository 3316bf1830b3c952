/// 참조 백엔드
/// 인메모리 저장소 + HTTP API + 웹소켓 게이트웨이 + 수명 주기 스케줄러.
// region:    --- Imports
use crate::auction::events::EventEnvelope;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};

// endregion: --- Imports

pub mod gateway;
pub mod handlers;
pub mod scheduler;
pub mod store;

/// 핸들러 공유 상태 (저장소, 이벤트 버스)
pub type AppState = (Arc<store::AuctionStore>, broadcast::Sender<EventEnvelope>);

/// 라우터 구성. 서비스 바이너리와 통합 테스트가 같은 구성을 쓴다.
pub fn router(
    store: Arc<store::AuctionStore>,
    events: broadcast::Sender<EventEnvelope>,
) -> Router {
    // 테스트 페이지를 위한 cors 설정
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/auctions/:id", get(handlers::handle_get_auction))
        .route("/api/auctions/:id/bid", post(handlers::handle_place_bid))
        .route("/api/auctions/:id/bids", get(handlers::handle_get_bids))
        .route("/api/auctions/:id/watch", post(handlers::handle_watch))
        .route("/ws", get(gateway::handle_ws))
        .layer(cors)
        .with_state((store, events))
}
