use auction_live::api::{ApiError, AuctionApi, BidRequest, HttpAuctionApi};
use auction_live::auction::events::{AuctionEvent, EventEnvelope};
use auction_live::auction::model::{AuctionItem, AuctionStatus, Inventory};
use auction_live::channel::ws::WsEventChannel;
use auction_live::channel::{ChannelState, EventChannel};
use auction_live::server::router;
use auction_live::server::scheduler::AuctionScheduler;
use auction_live::server::store::AuctionStore;
use auction_live::session::{AuctionSession, Viewer};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

/// 트레이싱 초기화
fn init_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .without_time()
        .with_target(false)
        .with_test_writer()
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("트레이싱 구독자 설정 실패");
}

/// 테스트용 경매 생성
fn test_item(
    id: i64,
    status: AuctionStatus,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
) -> AuctionItem {
    AuctionItem {
        id,
        title: format!("통합 테스트 경매 {}", id),
        description: "통합 테스트를 위한 경매 상품입니다.".to_string(),
        images: Vec::new(),
        starting_price: 10_000,
        current_bid: 10_000,
        bid_increment: 1_000,
        reserve_price: None,
        buy_now_price: None,
        start_time,
        end_time,
        status,
        seller_id: 900,
        bid_history: Vec::new(),
        watchers: HashSet::new(),
        inventory: Inventory::default(),
    }
}

fn bid_request(bidder_id: i64, amount: i64) -> BidRequest {
    BidRequest {
        bidder_id,
        bidder_name: format!("입찰자{}", bidder_id),
        amount,
        max_bid: None,
        enable_auto_bid: false,
    }
}

/// 임의 포트에 서버를 띄우고 접속 주소를 돌려준다
async fn spawn_server(
    items: Vec<AuctionItem>,
) -> (String, Arc<AuctionStore>, broadcast::Sender<EventEnvelope>) {
    let store = Arc::new(AuctionStore::new());
    for item in items {
        store.insert(item).await;
    }
    let (events, _) = broadcast::channel(64);

    let routes = router(Arc::clone(&store), events.clone());
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("리스너 바인드 실패");
    let addr = listener.local_addr().expect("주소 조회 실패");
    tokio::spawn(async move {
        let _ = axum::serve(listener, routes.into_make_service()).await;
    });

    (format!("http://{}", addr), store, events)
}

/// 입찰 HTTP 흐름: 수락, 쿨다운, 최소 단위, 현재가 이하, 판매자 본인
#[tokio::test]
async fn bid_flow_over_http() {
    let now = Utc::now();
    let (base, _store, _events) = spawn_server(vec![test_item(
        1,
        AuctionStatus::Live,
        now - Duration::minutes(1),
        now + Duration::hours(1),
    )])
    .await;
    let api = HttpAuctionApi::new(base);

    let item = api.fetch_auction(1).await.expect("조회 실패");
    assert_eq!(item.current_bid, 10_000);

    // 수락되는 입찰
    let bid = api
        .submit_bid(1, &bid_request(1, 11_000))
        .await
        .expect("입찰 실패");
    assert!(bid.id >= 1);
    assert_eq!(bid.amount, 11_000);

    let item = api.fetch_auction(1).await.expect("조회 실패");
    assert_eq!(item.current_bid, 11_000);
    assert_eq!(item.bid_history.len(), 1);

    // 같은 입찰자의 연속 입찰은 서버에서도 쿨다운에 걸린다
    let result = api.submit_bid(1, &bid_request(1, 12_000)).await;
    match result {
        Err(ApiError::Rejected { code, .. }) => assert_eq!(code, "COOLDOWN"),
        other => panic!("쿨다운 거부를 기대했으나: {:?}", other.map(|b| b.id)),
    }

    // 최소 입찰 단위 미달
    let result = api.submit_bid(1, &bid_request(2, 11_500)).await;
    match result {
        Err(ApiError::Rejected { code, .. }) => assert_eq!(code, "BELOW_INCREMENT"),
        other => panic!("최소 단위 거부를 기대했으나: {:?}", other.map(|b| b.id)),
    }

    // 현재가 이하
    let result = api.submit_bid(1, &bid_request(2, 500)).await;
    match result {
        Err(ApiError::Rejected { code, .. }) => assert_eq!(code, "LOW_BID"),
        other => panic!("현재가 이하 거부를 기대했으나: {:?}", other.map(|b| b.id)),
    }

    // 판매자 본인 입찰
    let result = api.submit_bid(1, &bid_request(900, 20_000)).await;
    match result {
        Err(ApiError::Rejected { code, .. }) => assert_eq!(code, "SELF_BID"),
        other => panic!("본인 입찰 거부를 기대했으나: {:?}", other.map(|b| b.id)),
    }

    let bids = api.fetch_bids(1).await.expect("이력 조회 실패");
    assert_eq!(bids.len(), 1);

    // 없는 경매
    assert!(matches!(
        api.fetch_auction(999).await,
        Err(ApiError::NotFound)
    ));
}

/// 관심 상품 등록/해제
#[tokio::test]
async fn watch_endpoint_updates_watchers() {
    let now = Utc::now();
    let (base, store, _events) = spawn_server(vec![test_item(
        1,
        AuctionStatus::Live,
        now - Duration::minutes(1),
        now + Duration::hours(1),
    )])
    .await;
    let api = HttpAuctionApi::new(base);

    api.update_watch(1, 5, true).await.expect("등록 실패");
    let item = store.get(1).await.expect("경매 없음");
    assert!(item.watchers.contains(&5));

    api.update_watch(1, 5, false).await.expect("해제 실패");
    let item = store.get(1).await.expect("경매 없음");
    assert!(!item.watchers.contains(&5));

    assert!(matches!(
        api.update_watch(999, 5, true).await,
        Err(ApiError::NotFound)
    ));
}

/// 다른 입찰자의 입찰이 웹소켓을 타고 세션에 반영되고,
/// 자동 입찰이 실제 전송 계층 위에서 동작한다
#[tokio::test]
async fn ws_events_reach_session_and_drive_autobid() {
    // 테스트 시작 시 tracing 초기화
    init_tracing();

    let now = Utc::now();
    let (base, store, _events) = spawn_server(vec![test_item(
        1,
        AuctionStatus::Live,
        now - Duration::minutes(1),
        now + Duration::hours(1),
    )])
    .await;

    let ws_url = format!("{}/ws", base.replacen("http", "ws", 1));
    let channel = Arc::new(WsEventChannel::new(ws_url));
    let mut state_rx = channel.state();
    tokio::time::timeout(
        std::time::Duration::from_secs(5),
        state_rx.wait_for(|s| *s == ChannelState::Connected),
    )
    .await
    .expect("접속 시간 초과")
    .expect("채널 닫힘");

    let api = Arc::new(HttpAuctionApi::new(base.clone()));
    let mut session = AuctionSession::new(
        Arc::clone(&api) as Arc<dyn AuctionApi>,
        Arc::clone(&channel) as Arc<dyn EventChannel>,
        Some(Viewer {
            user_id: 10,
            display_name: "에이".to_string(),
        }),
    );
    session.load(1).await.expect("로드 실패");
    assert!(session.is_subscribed());

    // 게이트웨이가 구독 프레임을 처리할 시간을 준다
    tokio::time::sleep(std::time::Duration::from_millis(300)).await;

    // 다른 입찰자가 HTTP 로 입찰한다
    let other = HttpAuctionApi::new(base.clone());
    other
        .submit_bid(1, &bid_request(2, 11_000))
        .await
        .expect("입찰 실패");

    // 이벤트가 세션까지 도달할 때까지 대기
    let mut delivered = false;
    for _ in 0..30 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        session.drain_events().await;
        if !session
            .state()
            .expect("상태 없음")
            .item()
            .bid_history
            .is_empty()
        {
            delivered = true;
            break;
        }
    }
    assert!(delivered, "bid_placed 이벤트가 세션에 도달해야 한다");
    assert_eq!(
        session.state().expect("상태 없음").item().current_bid,
        11_000
    );

    // 자동 입찰: 상한선 13,000 이면 12,000 입찰에 13,000 으로 대응한다
    session.enable_auto_bid(13_000);
    let third = HttpAuctionApi::new(base.clone());
    third
        .submit_bid(1, &bid_request(3, 12_000))
        .await
        .expect("입찰 실패");

    let mut followed = false;
    for _ in 0..30 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        session.drain_events().await;
        if store.get(1).await.expect("경매 없음").current_bid == 13_000 {
            followed = true;
            break;
        }
    }
    assert!(followed, "자동 입찰이 서버까지 제출되어야 한다");
    let item = store.get(1).await.expect("경매 없음");
    assert!(item.is_winning(10));
    let last = item.bid_history.last().expect("이력 없음");
    assert!(last.is_auto_bid);
    assert!(last.amount <= 13_000);
}

/// 마감 임박 입찰은 종료 시각을 연장하고 time_extended 를 발행한다
#[tokio::test]
async fn anti_snipe_extends_end_time() {
    let now = Utc::now();
    let original_end = now + Duration::seconds(10);
    let (base, store, events) = spawn_server(vec![test_item(
        1,
        AuctionStatus::Live,
        now - Duration::minutes(1),
        original_end,
    )])
    .await;
    let mut events_rx = events.subscribe();
    let api = HttpAuctionApi::new(base);

    api.submit_bid(1, &bid_request(1, 11_000))
        .await
        .expect("입찰 실패");

    let first = tokio::time::timeout(std::time::Duration::from_secs(2), events_rx.recv())
        .await
        .expect("이벤트 시간 초과")
        .expect("버스 닫힘");
    assert!(matches!(first.event, AuctionEvent::BidPlaced { .. }));

    let second = tokio::time::timeout(std::time::Duration::from_secs(2), events_rx.recv())
        .await
        .expect("이벤트 시간 초과")
        .expect("버스 닫힘");
    let extended = match second.event {
        AuctionEvent::TimeExtended { new_end_time } => new_end_time,
        other => panic!("time_extended 를 기대했으나: {:?}", other),
    };
    assert!(extended > original_end);

    let item = store.get(1).await.expect("경매 없음");
    assert_eq!(item.end_time, extended);
}

/// 스케줄러가 시작/종료 시각에 맞춰 상태를 전이시키고 이벤트를 발행한다
#[tokio::test]
async fn scheduler_drives_auction_lifecycle() {
    let now = Utc::now();
    let (_base, store, events) = spawn_server(vec![test_item(
        1,
        AuctionStatus::Scheduled,
        now + Duration::seconds(1),
        now + Duration::seconds(3),
    )])
    .await;
    let mut events_rx = events.subscribe();

    let scheduler = AuctionScheduler::new(Arc::clone(&store), events.clone());
    scheduler.start().await;

    let started = tokio::time::timeout(std::time::Duration::from_secs(5), events_rx.recv())
        .await
        .expect("시작 이벤트 시간 초과")
        .expect("버스 닫힘");
    assert!(matches!(started.event, AuctionEvent::AuctionStarted { .. }));
    assert_eq!(
        store.get(1).await.expect("경매 없음").status,
        AuctionStatus::Live
    );

    let ended = tokio::time::timeout(std::time::Duration::from_secs(5), events_rx.recv())
        .await
        .expect("종료 이벤트 시간 초과")
        .expect("버스 닫힘");
    assert!(matches!(ended.event, AuctionEvent::AuctionEnded { .. }));
    assert_eq!(
        store.get(1).await.expect("경매 없음").status,
        AuctionStatus::Ended
    );
}
