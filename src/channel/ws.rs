/// 웹소켓 이벤트 채널
/// 접속이 끊기면 고정 간격으로 다시 붙고, 유지 중인 토픽 구독을 복구한다.
/// 끊겨 있는 동안의 이벤트는 재전송되지 않는다. 이후 이벤트로 보정한다.
// region:    --- Imports
use super::{ChannelError, ChannelState, ClientFrame, EventChannel, Subscription};
use crate::auction::events::{auction_topic, EventEnvelope};
use async_trait::async_trait;
use futures_util::{Sink, SinkExt, StreamExt};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{info, warn};

// endregion: --- Imports

/// 재접속 대기 간격
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

// region:    --- WebSocket Channel
pub struct WsEventChannel {
    shared: Arc<Shared>,
    frame_tx: mpsc::UnboundedSender<ClientFrame>,
}

struct Shared {
    state_tx: watch::Sender<ChannelState>,
    topics: Mutex<HashMap<String, Vec<mpsc::UnboundedSender<EventEnvelope>>>>,
}

impl WsEventChannel {
    /// 채널 생성. 접속 관리 태스크를 바로 띄운다.
    pub fn new(url: impl Into<String>) -> Self {
        let url = url.into();
        let (state_tx, _) = watch::channel(ChannelState::Disconnected);
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            state_tx,
            topics: Mutex::new(HashMap::new()),
        });

        tokio::spawn(supervise(url, Arc::clone(&shared), frame_rx));

        WsEventChannel { shared, frame_tx }
    }
}

#[async_trait]
impl EventChannel for WsEventChannel {
    fn state(&self) -> watch::Receiver<ChannelState> {
        self.shared.state_tx.subscribe()
    }

    async fn send(&self, frame: ClientFrame) -> Result<(), ChannelError> {
        self.frame_tx
            .send(frame)
            .map_err(|e| ChannelError::Send(e.to_string()))
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription, ChannelError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.shared
            .topics
            .lock()
            .expect("topics lock")
            .entry(topic.to_string())
            .or_default()
            .push(tx);
        self.frame_tx
            .send(ClientFrame::Subscribe {
                channel: topic.to_string(),
            })
            .map_err(|e| ChannelError::Send(e.to_string()))?;
        Ok(Subscription::new(
            topic.to_string(),
            rx,
            self.frame_tx.clone(),
        ))
    }
}
// endregion: --- WebSocket Channel

// region:    --- Connection Supervisor
/// 접속 관리 루프
/// 접속 성공 시 유지 중인 토픽을 재구독하고, 끊길 때까지 송수신을 펌프한다.
async fn supervise(
    url: String,
    shared: Arc<Shared>,
    mut frame_rx: mpsc::UnboundedReceiver<ClientFrame>,
) {
    loop {
        match connect_async(url.as_str()).await {
            Ok((stream, _)) => {
                info!("{:<12} --> 웹소켓 접속: {}", "WsChannel", url);
                let _ = shared.state_tx.send(ChannelState::Connected);
                let (mut sink, mut source) = stream.split();

                // 유지 중인 토픽 재구독
                let mut healthy = true;
                for topic in shared.live_topics() {
                    let frame = ClientFrame::Subscribe { channel: topic };
                    if send_frame(&mut sink, &frame).await.is_err() {
                        healthy = false;
                        break;
                    }
                }

                // 송수신 펌프
                while healthy {
                    tokio::select! {
                        frame = frame_rx.recv() => match frame {
                            Some(frame) => {
                                if send_frame(&mut sink, &frame).await.is_err() {
                                    healthy = false;
                                }
                            }
                            // 채널 소유자가 사라졌으므로 태스크를 끝낸다
                            None => return,
                        },
                        message = source.next() => match message {
                            Some(Ok(Message::Text(text))) => shared.route(&text),
                            Some(Ok(Message::Close(_))) | None => healthy = false,
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                warn!("{:<12} --> 수신 오류: {}", "WsChannel", e);
                                healthy = false;
                            }
                        },
                    }
                }
            }
            Err(e) => warn!("{:<12} --> 웹소켓 접속 실패: {}", "WsChannel", e),
        }

        let _ = shared.state_tx.send(ChannelState::Disconnected);
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

async fn send_frame<S>(sink: &mut S, frame: &ClientFrame) -> Result<(), WsError>
where
    S: Sink<Message, Error = WsError> + Unpin,
{
    let text = match serde_json::to_string(frame) {
        Ok(text) => text,
        Err(e) => {
            warn!("{:<12} --> 프레임 직렬화 오류: {}", "WsChannel", e);
            return Ok(());
        }
    };
    sink.send(Message::Text(text)).await
}

impl Shared {
    /// 살아 있는 구독이 남아 있는 토픽 목록. 닫힌 구독은 정리한다.
    fn live_topics(&self) -> Vec<String> {
        let mut topics = self.topics.lock().expect("topics lock");
        topics.retain(|_, senders| {
            senders.retain(|tx| !tx.is_closed());
            !senders.is_empty()
        });
        topics.keys().cloned().collect()
    }

    /// 수신 이벤트를 토픽 구독자에게 전달
    fn route(&self, text: &str) {
        let envelope: EventEnvelope = match serde_json::from_str(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("{:<12} --> 이벤트 역직렬화 오류: {}", "WsChannel", e);
                return;
            }
        };
        let topic = auction_topic(envelope.auction_id);
        let mut topics = self.topics.lock().expect("topics lock");
        if let Some(senders) = topics.get_mut(&topic) {
            senders.retain(|tx| tx.send(envelope.clone()).is_ok());
        }
    }
}
// endregion: --- Connection Supervisor
