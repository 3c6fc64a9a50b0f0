use super::protocol::{self, ClientMessage};
use crate::audio::AudioChunk;
use crate::config::RealtimeConfig;
use crate::error::{RealtimeError, Result};
use crate::events::{ServerEvent, ToolResponse};
use crate::session::RealtimeSession;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;
type WsSink = futures::stream::SplitSink<WsStream, Message>;
type WsSource = futures::stream::SplitStream<WsStream>;

/// Close code reported when the socket drops without a close frame.
const ABNORMAL_CLOSURE: u16 = 1006;

/// Read half plus events already translated but not yet handed out.
struct Inbound {
    source: WsSource,
    pending: VecDeque<ServerEvent>,
    close_reported: bool,
}

/// Gemini Live session.
///
/// Manages a WebSocket connection to Google's Gemini Live API.
pub struct GeminiRealtimeSession {
    session_id: String,
    connected: Arc<AtomicBool>,
    sender: Arc<Mutex<WsSink>>,
    receiver: Arc<Mutex<Inbound>>,
}

impl GeminiRealtimeSession {
    /// Connect to Gemini Live and wait for the setup acknowledgement.
    ///
    /// A close before `setupComplete` while resuming with a handle the server
    /// reports as unknown or expired yields [`RealtimeError::ResumptionRejected`].
    pub async fn connect(
        endpoint: &Url,
        api_key: &SecretString,
        model: &str,
        config: RealtimeConfig,
    ) -> Result<Self> {
        let mut url = endpoint.clone();
        url.query_pairs_mut().append_pair("key", api_key.expose_secret());

        let request = url.as_str().into_client_request().map_err(|e| {
            RealtimeError::connection(format!("Failed to create client request: {}", e))
        })?;
        let (stream, _response) = connect_async(request)
            .await
            .map_err(|e| RealtimeError::connection(format!("WebSocket connect error: {}", e)))?;

        let (sink, source) = stream.split();
        let session = Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            connected: Arc::new(AtomicBool::new(true)),
            sender: Arc::new(Mutex::new(sink)),
            receiver: Arc::new(Mutex::new(Inbound {
                source,
                pending: VecDeque::new(),
                close_reported: false,
            })),
        };

        let resuming = config.resumption_handle.is_some();
        tracing::info!(model_id = %model, resuming, "Sending setup message");
        session.send_raw(&ClientMessage::setup(model, config)).await?;
        session.await_setup(resuming).await?;

        tracing::info!(session_id = %session.session_id, "Gemini Live session ready");
        Ok(session)
    }

    /// Read until `setupComplete`, keeping anything that arrives with it.
    async fn await_setup(&self, resuming: bool) -> Result<()> {
        let mut inbound = self.receiver.lock().await;
        loop {
            match inbound.source.next().await {
                Some(Ok(Message::Text(text))) => {
                    let events = protocol::translate(text.as_str())?;
                    if Self::absorb_setup(&mut inbound, events) {
                        return Ok(());
                    }
                }
                Some(Ok(Message::Binary(bytes))) => {
                    let text = std::str::from_utf8(&bytes).map_err(|e| {
                        RealtimeError::protocol(format!("Invalid UTF-8 in binary message: {}", e))
                    })?;
                    let events = protocol::translate(text)?;
                    if Self::absorb_setup(&mut inbound, events) {
                        return Ok(());
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    self.connected.store(false, Ordering::SeqCst);
                    let (code, reason) = close_parts(frame.as_ref());
                    return Err(classify_setup_close(code, &reason, resuming));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    self.connected.store(false, Ordering::SeqCst);
                    return Err(RealtimeError::connection(format!("Receive error: {}", e)));
                }
                None => {
                    self.connected.store(false, Ordering::SeqCst);
                    return Err(RealtimeError::connection("Connection closed during setup"));
                }
            }
        }
    }

    /// Queue post-setup events; returns whether setup completed.
    fn absorb_setup(inbound: &mut Inbound, events: Vec<ServerEvent>) -> bool {
        let mut complete = false;
        for event in events {
            match event {
                ServerEvent::SetupComplete => complete = true,
                ServerEvent::Unknown => {}
                other => inbound.pending.push_back(other),
            }
        }
        complete
    }

    /// Send a raw message.
    async fn send_raw(&self, value: &ClientMessage) -> Result<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(RealtimeError::NotConnected);
        }
        let msg = serde_json::to_string(value)
            .map_err(|e| RealtimeError::protocol(format!("JSON serialize error: {}", e)))?;

        let mut sender = self.sender.lock().await;
        sender
            .send(Message::Text(msg.into()))
            .await
            .map_err(|e| RealtimeError::connection(format!("Send error: {}", e)))?;

        Ok(())
    }

    /// Receive the next translated event.
    async fn receive(&self) -> Option<Result<ServerEvent>> {
        let mut inbound = self.receiver.lock().await;

        loop {
            if let Some(event) = inbound.pending.pop_front() {
                return Some(Ok(event));
            }

            match inbound.source.next().await {
                Some(Ok(Message::Text(text))) => match protocol::translate(text.as_str()) {
                    Ok(events) => inbound.pending.extend(events),
                    Err(e) => return Some(Err(e)),
                },
                Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                    Ok(text) => match protocol::translate(text) {
                        Ok(events) => inbound.pending.extend(events),
                        Err(e) => return Some(Err(e)),
                    },
                    Err(e) => {
                        return Some(Err(RealtimeError::protocol(format!(
                            "Invalid UTF-8 in binary message: {}",
                            e
                        ))));
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    self.connected.store(false, Ordering::SeqCst);
                    inbound.close_reported = true;
                    let (code, reason) = close_parts(frame.as_ref());
                    tracing::info!(code, %reason, "Gemini Live closed the session");
                    return Some(Ok(ServerEvent::Closed { code, reason }));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    self.connected.store(false, Ordering::SeqCst);
                    return Some(Err(RealtimeError::connection(format!("Receive error: {}", e))));
                }
                None => {
                    self.connected.store(false, Ordering::SeqCst);
                    if inbound.close_reported {
                        return None;
                    }
                    inbound.close_reported = true;
                    return Some(Ok(ServerEvent::Closed {
                        code: ABNORMAL_CLOSURE,
                        reason: String::new(),
                    }));
                }
            }
        }
    }
}

fn close_parts(frame: Option<&CloseFrame>) -> (u16, String) {
    match frame {
        Some(frame) => (u16::from(frame.code), frame.reason.as_str().to_string()),
        // 1005: no status code present
        None => (1005, String::new()),
    }
}

fn classify_setup_close(code: u16, reason: &str, resuming: bool) -> RealtimeError {
    if resuming && protocol::is_resumption_rejection(reason) {
        RealtimeError::resumption_rejected(reason)
    } else {
        RealtimeError::connection(format!("Closed during setup (code {}): {}", code, reason))
    }
}

#[async_trait]
impl RealtimeSession for GeminiRealtimeSession {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send_audio(&self, audio: &AudioChunk) -> Result<()> {
        self.send_raw(&ClientMessage::audio(audio)).await
    }

    async fn send_audio_stream_end(&self) -> Result<()> {
        self.send_raw(&ClientMessage::audio_stream_end()).await
    }

    async fn send_tool_responses(&self, responses: Vec<ToolResponse>) -> Result<()> {
        tracing::debug!(count = responses.len(), "Sending tool responses");
        self.send_raw(&ClientMessage::tool_responses(responses)).await
    }

    async fn next_event(&self) -> Option<Result<ServerEvent>> {
        self.receive().await
    }

    async fn close(&self) -> Result<()> {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        let mut sender = self.sender.lock().await;
        sender
            .send(Message::Close(None))
            .await
            .map_err(|e| RealtimeError::connection(format!("Close error: {}", e)))?;

        Ok(())
    }
}

impl std::fmt::Debug for GeminiRealtimeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiRealtimeSession")
            .field("session_id", &self.session_id)
            .field("connected", &self.connected.load(Ordering::SeqCst))
            .finish()
    }
}
