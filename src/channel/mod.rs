/// 실시간 이벤트 채널 추상화
/// 구현체는 연결 상태 신호를 내보내고, 재접속 시 유지 중인 토픽 구독을 복구한다.
// region:    --- Imports
use crate::auction::events::EventEnvelope;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, watch};

// endregion: --- Imports

pub mod memory;
pub mod ws;

// region:    --- Channel Types
/// 채널 연결 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connected,
    Disconnected,
}

/// 채널 오류
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("채널이 닫혀 있습니다.")]
    Closed,
    #[error("프레임 전송 실패: {0}")]
    Send(String),
}

/// 클라이언트 -> 서버 프레임
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientFrame {
    Subscribe { channel: String },
    Unsubscribe { channel: String },
}
// endregion: --- Channel Types

// region:    --- Subscription
/// 토픽 구독 핸들. 드롭하면 구독 해제 프레임을 보낸다.
pub struct Subscription {
    topic: String,
    rx: mpsc::UnboundedReceiver<EventEnvelope>,
    frame_tx: mpsc::UnboundedSender<ClientFrame>,
}

impl Subscription {
    pub(crate) fn new(
        topic: String,
        rx: mpsc::UnboundedReceiver<EventEnvelope>,
        frame_tx: mpsc::UnboundedSender<ClientFrame>,
    ) -> Self {
        Subscription {
            topic,
            rx,
            frame_tx,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// 다음 이벤트 수신. 채널이 완전히 닫히면 None.
    pub async fn recv(&mut self) -> Option<EventEnvelope> {
        self.rx.recv().await
    }

    /// 대기 중인 이벤트가 있으면 즉시 꺼낸다. 없으면 None.
    pub fn try_recv(&mut self) -> Option<EventEnvelope> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let _ = self.frame_tx.send(ClientFrame::Unsubscribe {
            channel: self.topic.clone(),
        });
    }
}
// endregion: --- Subscription

// region:    --- Event Channel Trait
#[async_trait]
pub trait EventChannel: Send + Sync {
    /// 연결 상태 신호
    fn state(&self) -> watch::Receiver<ChannelState>;

    /// 프레임 전송
    async fn send(&self, frame: ClientFrame) -> Result<(), ChannelError>;

    /// 토픽 구독. 핸들을 드롭하면 구독이 해제된다.
    async fn subscribe(&self, topic: &str) -> Result<Subscription, ChannelError>;
}
// endregion: --- Event Channel Trait
