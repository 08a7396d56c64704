use std::{net::SocketAddr, pin::Pin, sync::Arc};

use async_channel::{Receiver, Sender};
use async_std::net::{TcpListener, TcpStream};
use async_trait::async_trait;
use async_tungstenite::tungstenite::protocol::WebSocketConfig;
use bevy::prelude::{Deref, DerefMut, Resource};
use futures::AsyncReadExt;
use futures_lite::{AsyncWriteExt, Future, Stream};
use tracing::{debug, error, info, trace, warn};
use ws_stream_tungstenite::WsStream;

use crate::provider::NetworkProvider;
use orchard_common::error::NetworkError;
use orchard_common::{WirePacket, codec};

/// A provider for WebSockets, the rosbridge-style middleware transport.
#[derive(Default, Debug)]
pub struct WebSocketProvider;

fn ws_error(error: async_tungstenite::tungstenite::Error) -> NetworkError {
    use async_tungstenite::tungstenite::Error;

    match error {
        Error::ConnectionClosed => NetworkError::Error(String::from("Connection closed")),
        Error::AlreadyClosed => NetworkError::Error(String::from("Connection was already closed")),
        Error::Io(io_error) => NetworkError::Error(format!("Io Error: {}", io_error)),
        other => NetworkError::Error(format!("WebSocket Error: {}", other)),
    }
}

#[async_trait]
impl NetworkProvider for WebSocketProvider {
    const PROVIDER_NAME: &'static str = "WebSocket";

    type NetworkSettings = NetworkSettings;

    type Socket = WsStream<TcpStream>;

    type ReadHalf = futures::io::ReadHalf<WsStream<TcpStream>>;

    type WriteHalf = futures::io::WriteHalf<WsStream<TcpStream>>;

    type ConnectInfo = url::Url;

    type AcceptInfo = SocketAddr;

    type AcceptStream = OwnedIncoming;

    async fn accept_loop(
        accept_info: Self::AcceptInfo,
        _: Self::NetworkSettings,
    ) -> Result<Self::AcceptStream, NetworkError> {
        let listener = TcpListener::bind(accept_info)
            .await
            .map_err(NetworkError::Listen)?;
        info!("Listening for peers on {}", accept_info);
        Ok(OwnedIncoming::new(listener))
    }

    async fn connect_task(
        connect_info: Self::ConnectInfo,
        network_settings: Self::NetworkSettings,
    ) -> Result<Self::Socket, NetworkError> {
        debug!("Beginning connection");
        if connect_info.scheme() != "ws" {
            return Err(NetworkError::Error(format!(
                "Unsupported scheme '{}', only plain ws:// endpoints are supported",
                connect_info.scheme()
            )));
        }

        let (stream, _response) = async_tungstenite::async_std::connect_async_with_config(
            connect_info.as_str(),
            Some(*network_settings),
        )
        .await
        .map_err(ws_error)?;
        debug!("Connected!");
        Ok(WsStream::new(stream))
    }

    async fn recv_loop(
        mut read_half: Self::ReadHalf,
        messages: Sender<WirePacket>,
        settings: Self::NetworkSettings,
    ) {
        let max_message_size = settings.max_message_size.unwrap_or(64 << 20);
        let mut buffer = vec![0; max_message_size];
        loop {
            let length = match read_half.read(&mut buffer[..8]).await {
                Ok(0) => {
                    // EOF, the peer has closed the connection.
                    debug!("Peer disconnected");
                    break;
                }
                Ok(8) => {
                    let bytes = &buffer[..8];
                    match bytes.try_into() {
                        Ok(bytes) => u64::from_le_bytes(bytes) as usize,
                        Err(_) => {
                            error!("Couldn't read length bytes from connection");
                            break;
                        }
                    }
                }
                Ok(n) => {
                    error!(
                        "Could not read enough bytes for header. Expected 8, got {}",
                        n
                    );
                    break;
                }
                Err(err) => {
                    error!("Encountered error while fetching length: {}", err);
                    break;
                }
            };

            if length > max_message_size {
                error!(
                    "Received too large packet: {} > {}",
                    length, max_message_size
                );
                break;
            }

            match read_half.read_exact(&mut buffer[..length]).await {
                Ok(()) => (),
                Err(err) => {
                    error!(
                        "Encountered error while fetching stream of length {}: {}",
                        length, err
                    );
                    break;
                }
            }

            let packet: WirePacket = match codec::decode_payload(&buffer[..length]) {
                Ok(packet) => packet,
                Err(_) => {
                    error!(
                        "Failed to decode network packet of length {}, first bytes: {:?}",
                        length,
                        &buffer[..length.min(32)]
                    );
                    break;
                }
            };

            if messages.send(packet).await.is_err() {
                error!("Failed to hand off a decoded message");
                break;
            }
            trace!("Message decoded and handed off");
        }
    }

    async fn send_loop(
        mut write_half: Self::WriteHalf,
        messages: Receiver<WirePacket>,
        settings: Self::NetworkSettings,
    ) {
        let warning_threshold = settings.channel_warning_threshold;
        let channel_capacity = settings.channel_capacity;

        while let Ok(first_message) = messages.recv().await {
            // Collect whatever else is already queued into one write
            let mut batch = vec![first_message];
            while let Ok(message) = messages.try_recv() {
                batch.push(message);
            }

            let batch_size = batch.len();

            // Warn when the channel is approaching capacity, the peer may be
            // too slow to keep up
            let capacity = messages.capacity().unwrap_or(channel_capacity);
            let depth_percentage = (messages.len() as f32 / capacity as f32 * 100.0) as u8;
            if depth_percentage >= warning_threshold {
                warn!(
                    "Channel depth at {}% ({}/{} messages). Peer may be too slow to keep up!",
                    depth_percentage,
                    messages.len(),
                    capacity
                );
            }

            let mut combined_buffer = Vec::new();
            for message in batch {
                match codec::encode_frame(&message) {
                    Ok(frame) => combined_buffer.extend_from_slice(&frame),
                    Err(_) => {
                        error!("Could not encode packet {:?}", message);
                        continue;
                    }
                }
            }

            if combined_buffer.is_empty() {
                continue; // All messages failed to encode
            }

            trace!(
                "Sending {} bytes ({} messages)",
                combined_buffer.len(),
                batch_size
            );

            match write_half.write_all(&combined_buffer).await {
                Ok(_) => {
                    if batch_size > 1 {
                        debug!("Successfully sent batch of {} messages", batch_size);
                    }
                }
                Err(err) => {
                    error!(
                        "Could not send batch of {} messages: {}",
                        batch_size, err
                    );
                    break;
                }
            }
        }
    }

    fn split(combined: Self::Socket) -> (Self::ReadHalf, Self::WriteHalf) {
        combined.split()
    }

    fn channel_capacity(settings: &Self::NetworkSettings) -> usize {
        settings.channel_capacity
    }
}

#[derive(Clone, Debug, Resource, Deref, DerefMut)]
#[allow(missing_copy_implementations)]
/// Settings to configure the network, both server and connecting side
pub struct NetworkSettings {
    /// Settings forwarded to the underlying WebSocket.
    #[deref]
    pub websocket_config: WebSocketConfig,
    /// Channel capacity for outgoing messages per connection (default: 500)
    ///
    /// This controls how many messages can be queued for sending before
    /// sends start failing. At 60 FPS, 500 messages is roughly 8 seconds of
    /// buffering.
    pub channel_capacity: usize,
    /// Warn when channel depth exceeds this percentage (default: 80)
    pub channel_warning_threshold: u8,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            websocket_config: WebSocketConfig::default(),
            channel_capacity: 500,
            channel_warning_threshold: 80,
        }
    }
}

type WsStreamFuture = Pin<Box<dyn Future<Output = Option<WsStream<TcpStream>>> + Send>>;

/// A stream of accepted WebSocket connections.
pub struct OwnedIncoming {
    listener: Arc<TcpListener>,
    pending: Option<WsStreamFuture>,
}

impl OwnedIncoming {
    fn new(listener: TcpListener) -> Self {
        Self {
            listener: Arc::new(listener),
            pending: None,
        }
    }
}

impl Stream for OwnedIncoming {
    type Item = WsStream<TcpStream>;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        let incoming = self.get_mut();
        loop {
            let pending = incoming.pending.get_or_insert_with(|| {
                let listener = incoming.listener.clone();
                Box::pin(async move {
                    let stream = listener.accept().await.map(|(s, _)| s).ok()?;

                    trace!("TCP connection accepted, attempting WebSocket handshake");
                    match async_tungstenite::accept_async(stream).await {
                        Ok(stream) => Some(WsStream::new(stream)),
                        Err(e) => {
                            error!("WebSocket handshake failed: {:?}", e);
                            None
                        }
                    }
                })
            });

            match pending.as_mut().poll(cx) {
                std::task::Poll::Ready(Some(stream)) => {
                    incoming.pending = None;
                    return std::task::Poll::Ready(Some(stream));
                }
                // Failed accept or handshake, go back to listening
                std::task::Poll::Ready(None) => {
                    incoming.pending = None;
                }
                std::task::Poll::Pending => return std::task::Poll::Pending,
            }
        }
    }
}
