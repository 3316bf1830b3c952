/// 백엔드 HTTP 핸들러
/// 1. 경매 스냅샷 조회
/// 2. 입찰 제출 (수락 시 실시간 이벤트 발행)
/// 3. 입찰 이력 조회
/// 4. 관심 상품 반영
// region:    --- Imports
use crate::api::{BidRequest, WatchRequest};
use crate::auction::events::{AuctionEvent, EventEnvelope};
use crate::bidding::validator::RejectReason;
use crate::server::store::StoreError;
use crate::server::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use tracing::info;

// endregion: --- Imports

// region:    --- Command Handlers

/// 입찰 요청 처리
pub async fn handle_place_bid(
    State((store, events)): State<AppState>,
    Path(auction_id): Path<i64>,
    Json(request): Json<BidRequest>,
) -> impl IntoResponse {
    info!(
        "{:<12} --> 입찰 요청 id: {} 입찰자: {} 금액: {}",
        "Handler", auction_id, request.bidder_id, request.amount
    );

    match store.place_bid(auction_id, &request).await {
        Ok(accepted) => {
            let now = Utc::now();
            // 수락된 입찰을 실시간 채널에 발행한다
            let _ = events.send(EventEnvelope::new(
                auction_id,
                now,
                AuctionEvent::BidPlaced {
                    bid: accepted.bid.clone(),
                },
            ));
            if let Some(new_end_time) = accepted.new_end_time {
                info!(
                    "{:<12} --> 마감 임박 입찰, 종료 시각 연장: {}",
                    "Handler", new_end_time
                );
                let _ = events.send(EventEnvelope::new(
                    auction_id,
                    now,
                    AuctionEvent::TimeExtended { new_end_time },
                ));
            }
            (
                StatusCode::OK,
                Json(serde_json::json!({ "bid": accepted.bid })),
            )
                .into_response()
        }
        Err(StoreError::NotFound) => not_found_response(),
        Err(StoreError::Rejected(reason)) => {
            (StatusCode::BAD_REQUEST, Json(rejection_body(&reason))).into_response()
        }
    }
}

/// 관심 상품 반영 처리
pub async fn handle_watch(
    State((store, _)): State<AppState>,
    Path(auction_id): Path<i64>,
    Json(request): Json<WatchRequest>,
) -> impl IntoResponse {
    info!(
        "{:<12} --> 관심 상품 반영 id: {} user: {} watching: {}",
        "Handler", auction_id, request.user_id, request.watching
    );
    if store
        .set_watch(auction_id, request.user_id, request.watching)
        .await
    {
        StatusCode::OK.into_response()
    } else {
        not_found_response()
    }
}

// endregion: --- Command Handlers

// region:    --- Query Handlers

/// 경매 스냅샷 조회
pub async fn handle_get_auction(
    State((store, _)): State<AppState>,
    Path(auction_id): Path<i64>,
) -> impl IntoResponse {
    info!("{:<12} --> 경매 조회 id: {}", "Handler", auction_id);
    match store.get(auction_id).await {
        Some(item) => Json(item).into_response(),
        None => not_found_response(),
    }
}

/// 입찰 이력 조회
pub async fn handle_get_bids(
    State((store, _)): State<AppState>,
    Path(auction_id): Path<i64>,
) -> impl IntoResponse {
    info!("{:<12} --> 입찰 이력 조회 id: {}", "Handler", auction_id);
    match store.bids(auction_id).await {
        Some(bids) => Json(bids).into_response(),
        None => not_found_response(),
    }
}

// endregion: --- Query Handlers

// region:    --- Response Helpers

fn not_found_response() -> axum::response::Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "error": "경매를 찾을 수 없습니다.",
            "code": "NOT_FOUND"
        })),
    )
        .into_response()
}

/// 거부 사유 응답 본문. 사유별 부가 정보를 함께 내려준다.
fn rejection_body(reason: &RejectReason) -> serde_json::Value {
    let mut body = serde_json::json!({
        "error": reason.to_string(),
        "code": reason.code(),
    });
    match reason {
        RejectReason::TooLow { current_bid } => {
            body["current_bid"] = (*current_bid).into();
        }
        RejectReason::BelowIncrement { minimum } => {
            body["minimum"] = (*minimum).into();
        }
        RejectReason::Cooldown { remaining_ms } => {
            body["remaining_ms"] = (*remaining_ms).into();
        }
        _ => {}
    }
    body
}

// endregion: --- Response Helpers
