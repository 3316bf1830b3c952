/// 실시간 이벤트 게이트웨이
/// 접속별 구독 토픽 목록을 관리하고, 브로드캐스트 버스의 이벤트 중
/// 구독된 토픽의 것만 웹소켓으로 내보낸다.
// region:    --- Imports
use crate::auction::events::{auction_topic, EventEnvelope};
use crate::channel::ClientFrame;
use crate::server::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use std::collections::HashSet;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

// endregion: --- Imports

// region:    --- Gateway

/// 웹소켓 업그레이드
pub async fn handle_ws(
    State((_, events)): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let receiver = events.subscribe();
    ws.on_upgrade(move |socket| serve_socket(socket, receiver))
}

/// 접속 하나의 수명 주기
async fn serve_socket(mut socket: WebSocket, mut events: broadcast::Receiver<EventEnvelope>) {
    let mut topics: HashSet<String> = HashSet::new();

    loop {
        tokio::select! {
            message = socket.recv() => match message {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientFrame>(&text) {
                    Ok(ClientFrame::Subscribe { channel }) => {
                        info!("{:<12} --> 구독: {}", "Gateway", channel);
                        topics.insert(channel);
                    }
                    Ok(ClientFrame::Unsubscribe { channel }) => {
                        info!("{:<12} --> 구독 해제: {}", "Gateway", channel);
                        topics.remove(&channel);
                    }
                    Err(e) => warn!("{:<12} --> 프레임 해석 오류: {}", "Gateway", e),
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("{:<12} --> 수신 오류: {}", "Gateway", e);
                    break;
                }
            },
            event = events.recv() => match event {
                Ok(envelope) => {
                    if !topics.contains(&auction_topic(envelope.auction_id)) {
                        continue;
                    }
                    match serde_json::to_string(&envelope) {
                        Ok(text) => {
                            if socket.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("{:<12} --> 이벤트 직렬화 오류: {}", "Gateway", e),
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("{:<12} --> 이벤트 {}건 유실", "Gateway", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    debug!("{:<12} --> 접속 종료", "Gateway");
}

// endregion: --- Gateway
