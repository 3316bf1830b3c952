/// 인메모리 이벤트 채널
/// 네트워크 없이 같은 프로세스 안에서 토픽 전달을 재현한다. 테스트 전용.
// region:    --- Imports
use super::{ChannelError, ChannelState, ClientFrame, EventChannel, Subscription};
use crate::auction::events::{auction_topic, EventEnvelope};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};

// endregion: --- Imports

// region:    --- In-Memory Channel
pub struct InMemoryChannel {
    state_tx: watch::Sender<ChannelState>,
    topics: Mutex<HashMap<String, Vec<mpsc::UnboundedSender<EventEnvelope>>>>,
    /// 전송된 프레임 기록 (검증용)
    frames: Arc<Mutex<Vec<ClientFrame>>>,
    frame_tx: mpsc::UnboundedSender<ClientFrame>,
}

impl InMemoryChannel {
    pub fn new() -> Arc<Self> {
        let (state_tx, _) = watch::channel(ChannelState::Connected);
        let (frame_tx, mut frame_rx) = mpsc::unbounded_channel();
        let frames = Arc::new(Mutex::new(Vec::new()));

        // 구독 핸들 드롭이 보내는 해제 프레임도 같은 기록에 모은다
        let sink = Arc::clone(&frames);
        tokio::spawn(async move {
            while let Some(frame) = frame_rx.recv().await {
                if let Ok(mut recorded) = sink.lock() {
                    recorded.push(frame);
                }
            }
        });

        Arc::new(InMemoryChannel {
            state_tx,
            topics: Mutex::new(HashMap::new()),
            frames,
            frame_tx,
        })
    }

    /// 서버 이벤트 주입
    pub fn publish(&self, envelope: EventEnvelope) {
        let topic = auction_topic(envelope.auction_id);
        let mut topics = self.topics.lock().expect("topics lock");
        if let Some(senders) = topics.get_mut(&topic) {
            senders.retain(|tx| tx.send(envelope.clone()).is_ok());
        }
    }

    /// 연결 상태 전환
    pub fn set_connected(&self, connected: bool) {
        let next = if connected {
            ChannelState::Connected
        } else {
            ChannelState::Disconnected
        };
        let _ = self.state_tx.send(next);
    }

    /// 지금까지 기록된 프레임
    pub fn sent_frames(&self) -> Vec<ClientFrame> {
        self.frames
            .lock()
            .map(|recorded| recorded.clone())
            .unwrap_or_default()
    }

    /// 살아 있는 구독 핸들 수
    pub fn subscriber_count(&self, topic: &str) -> usize {
        let topics = self.topics.lock().expect("topics lock");
        topics
            .get(topic)
            .map(|senders| senders.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl EventChannel for InMemoryChannel {
    fn state(&self) -> watch::Receiver<ChannelState> {
        self.state_tx.subscribe()
    }

    async fn send(&self, frame: ClientFrame) -> Result<(), ChannelError> {
        if let Ok(mut recorded) = self.frames.lock() {
            recorded.push(frame);
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription, ChannelError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.topics
            .lock()
            .expect("topics lock")
            .entry(topic.to_string())
            .or_default()
            .push(tx);
        if let Ok(mut recorded) = self.frames.lock() {
            recorded.push(ClientFrame::Subscribe {
                channel: topic.to_string(),
            });
        }
        Ok(Subscription::new(
            topic.to_string(),
            rx,
            self.frame_tx.clone(),
        ))
    }
}
// endregion: --- In-Memory Channel
