// region:    --- Imports
use auction_live::auction::model::{AuctionItem, AuctionStatus, Inventory};
use auction_live::server::router;
use auction_live::server::scheduler::AuctionScheduler;
use auction_live::server::store::AuctionStore;
use chrono::{Duration, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{error, info};
// endregion: --- Imports

// region:    --- Main
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // logging 초기화
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .without_time()
        .with_target(false)
        .init();

    // 인메모리 저장소 생성 및 데모 경매 시드
    let store = Arc::new(AuctionStore::new());
    seed_demo_auctions(&store).await;
    info!("{:<12} --> 저장소 초기화 성공", "Main");

    // 실시간 이벤트 버스 생성
    let (events, _) = broadcast::channel(256);

    // 경매 수명 주기 스케줄러 시작
    let scheduler = AuctionScheduler::new(Arc::clone(&store), events.clone());
    scheduler.start().await;

    // 라우터 설정
    let routes_all = router(store, events);

    // 리스너 생성
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = TcpListener::bind(&addr).await?;
    info!(
        "{:<12} --> Web Server: Listening on {}",
        "Main",
        listener.local_addr()?
    );

    // 서버 실행
    if let Err(err) = axum::serve(listener, routes_all.into_make_service()).await {
        error!("{:<12} --> Server error: {}", "Main", err);
    }
    Ok(())
}

/// 데모 경매 시드
async fn seed_demo_auctions(store: &AuctionStore) {
    let now = Utc::now();

    store
        .insert(AuctionItem {
            id: 1,
            title: "빈티지 필름 카메라".to_string(),
            description: "작동 확인 완료, 사용감 있는 중고 필름 카메라입니다.".to_string(),
            images: vec!["/images/camera-1.jpg".to_string()],
            starting_price: 50_000,
            current_bid: 50_000,
            bid_increment: 5_000,
            reserve_price: Some(80_000),
            buy_now_price: Some(200_000),
            start_time: now - Duration::minutes(10),
            end_time: now + Duration::hours(2),
            status: AuctionStatus::Live,
            seller_id: 100,
            bid_history: Vec::new(),
            watchers: HashSet::new(),
            inventory: Inventory {
                quantity: 1,
                reserved: 0,
                sold: 0,
            },
        })
        .await;

    store
        .insert(AuctionItem {
            id: 2,
            title: "한정판 스니커즈 270".to_string(),
            description: "미개봉 새 상품, 정품 박스 포함.".to_string(),
            images: vec!["/images/sneakers-1.jpg".to_string()],
            starting_price: 120_000,
            current_bid: 120_000,
            bid_increment: 10_000,
            reserve_price: None,
            buy_now_price: Some(450_000),
            start_time: now + Duration::minutes(5),
            end_time: now + Duration::hours(3),
            status: AuctionStatus::Scheduled,
            seller_id: 101,
            bid_history: Vec::new(),
            watchers: HashSet::new(),
            inventory: Inventory {
                quantity: 1,
                reserved: 0,
                sold: 0,
            },
        })
        .await;
}
// endregion: --- Main
