use std::sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
};

use async_channel::{Sender, bounded, unbounded};
use bevy::prelude::*;
use dashmap::DashMap;
use futures_lite::StreamExt;
use tracing::{debug, error, trace, warn};

use crate::{
    AsyncChannel, NetworkData, NetworkEvent,
    provider::NetworkProvider,
    runtime::{JoinHandle, NetRuntime, Runtime, run_async},
};
use orchard_common::error::NetworkError;
use orchard_common::{ConnectionId, OrchardMessage, WirePacket, codec};

pub(crate) struct Connection {
    receive_task: Box<dyn JoinHandle>,
    map_receive_task: Box<dyn JoinHandle>,
    send_task: Box<dyn JoinHandle>,
    send_message: Sender<WirePacket>,
}

impl Connection {
    fn stop(mut self) {
        self.receive_task.abort();
        self.send_task.abort();
        self.map_receive_task.abort();
    }
}

/// The endpoint resource. Owns established connections, the per-channel
/// receive queues, and the background tasks servicing them.
#[derive(Resource)]
pub struct Network<NP: NetworkProvider> {
    pub(crate) recv_message_map: Arc<DashMap<&'static str, Vec<(ConnectionId, Vec<u8>)>>>,
    pub(crate) hash_to_channel: Arc<DashMap<u64, &'static str>>,
    established_connections: Arc<DashMap<ConnectionId, Connection>>,
    new_connections: AsyncChannel<NP::Socket>,
    disconnected_connections: AsyncChannel<ConnectionId>,
    error_channel: AsyncChannel<NetworkError>,
    server_handle: Option<Box<dyn JoinHandle>>,
    connection_tasks: Arc<DashMap<u32, Box<dyn JoinHandle>>>,
    connection_task_counts: AtomicU32,
    connection_count: u32,
}

impl<NP: NetworkProvider> std::fmt::Debug for Network<NP> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Network [{} Connected Peers]",
            self.established_connections.len()
        )
    }
}

impl<NP: NetworkProvider> Network<NP> {
    pub(crate) fn new(_provider: NP) -> Self {
        Self {
            recv_message_map: Arc::new(DashMap::new()),
            hash_to_channel: Arc::new(DashMap::new()),
            established_connections: Arc::new(DashMap::new()),
            new_connections: AsyncChannel::new(),
            disconnected_connections: AsyncChannel::new(),
            error_channel: AsyncChannel::new(),
            server_handle: None,
            connection_tasks: Arc::new(DashMap::new()),
            connection_task_counts: AtomicU32::new(0),
            connection_count: 1, // SERVER reserves ID 0
        }
    }

    /// Returns true if there are any active connections
    #[inline(always)]
    pub fn has_connections(&self) -> bool {
        !self.established_connections.is_empty()
    }

    /// Returns the number of active connections
    #[inline(always)]
    pub fn connection_count(&self) -> usize {
        self.established_connections.len()
    }

    /// Check if a wire channel is registered
    ///
    /// This is primarily useful for testing and debugging.
    pub fn is_channel_registered(&self, channel: &str) -> bool {
        self.recv_message_map.contains_key(channel)
    }

    /// Get all registered wire channel names
    ///
    /// This is primarily useful for testing and debugging.
    pub fn registered_channels(&self) -> Vec<String> {
        self.recv_message_map
            .iter()
            .map(|entry| entry.key().to_string())
            .collect()
    }

    /// Start listening for new peers
    ///
    /// ## Note
    /// Any previous listen task is stopped first. Whether its accept loop
    /// actually aborts depends on the runtime's [`JoinHandle::abort`]; if the
    /// old socket is still bound, the rebind fails inside the accept task and
    /// surfaces as a [`NetworkEvent::Error`](crate::NetworkEvent)
    pub fn listen<RT: Runtime>(
        &mut self,
        accept_info: NP::AcceptInfo,
        runtime: &RT,
        network_settings: &NP::NetworkSettings,
    ) -> Result<(), NetworkError> {
        self.stop();

        let new_connections = self.new_connections.sender.clone();
        let error_sender = self.error_channel.sender.clone();
        let settings = network_settings.clone();

        trace!("Started listening");

        self.server_handle = Some(Box::new(run_async(
            async move {
                let accept = NP::accept_loop(accept_info, settings).await;
                match accept {
                    Ok(mut listen_stream) => {
                        while let Some(connection) = listen_stream.next().await {
                            new_connections
                                .send(connection)
                                .await
                                .expect("Connection channel has closed");
                        }
                    }
                    Err(e) => error_sender
                        .send(e)
                        .await
                        .expect("Error channel has closed."),
                }
            },
            runtime,
        )));

        Ok(())
    }

    /// Start async connecting to a remote endpoint.
    pub fn connect<RT: Runtime>(
        &self,
        connect_info: NP::ConnectInfo,
        runtime: &RT,
        network_settings: &NP::NetworkSettings,
    ) {
        debug!("Starting connection");

        let network_error_sender = self.error_channel.sender.clone();
        let connection_event_sender = self.new_connections.sender.clone();
        let settings = network_settings.clone();

        let connection_task_weak = Arc::downgrade(&self.connection_tasks);
        let task_count = self.connection_task_counts.fetch_add(1, Ordering::SeqCst);

        self.connection_tasks.insert(
            task_count,
            Box::new(run_async(
                async move {
                    match NP::connect_task(connect_info, settings).await {
                        Ok(connection) => connection_event_sender
                            .send(connection)
                            .await
                            .expect("Connection channel has closed"),
                        Err(e) => network_error_sender
                            .send(e)
                            .await
                            .expect("Error channel has closed."),
                    };

                    // Remove this connect task from the bookkeeping map
                    if let Some(tasks) = connection_task_weak.upgrade() {
                        tasks.remove(&task_count);
                    }
                },
                runtime,
            )),
        );
    }

    /// Send a message to a specific peer
    pub fn send<T: OrchardMessage>(
        &self,
        peer_id: ConnectionId,
        message: T,
    ) -> Result<(), NetworkError> {
        let packet = WirePacket {
            channel: T::type_name().to_string(),
            channel_hash: T::channel_hash(),
            payload: codec::encode_payload(&message)?,
        };
        self.send_packet(peer_id, packet)
    }

    pub(crate) fn send_packet(
        &self,
        peer_id: ConnectionId,
        packet: WirePacket,
    ) -> Result<(), NetworkError> {
        let connection = match self.established_connections.get(&peer_id) {
            Some(conn) => conn,
            None => return Err(NetworkError::ConnectionNotFound(peer_id)),
        };

        match connection.send_message.try_send(packet) {
            Ok(_) => Ok(()),
            Err(err) => {
                error!("There was an error sending a packet: {}", err);
                Err(NetworkError::ChannelClosed(peer_id))
            }
        }
    }

    /// Broadcast a message to all connected peers
    pub fn broadcast<T: OrchardMessage + Clone>(&self, message: T) {
        let payload = match codec::encode_payload(&message) {
            Ok(payload) => payload,
            Err(_) => {
                error!("Couldn't serialize broadcast message on {}", T::type_name());
                return;
            }
        };
        for connection in self.established_connections.iter() {
            let packet = WirePacket {
                channel: T::type_name().to_string(),
                channel_hash: T::channel_hash(),
                payload: payload.clone(),
            };

            match connection.send_message.try_send(packet) {
                Ok(_) => (),
                Err(err) => {
                    warn!("Could not send to peer because: {}", err);
                }
            }
        }
    }

    /// Disconnect all peers and stop listening for new ones
    ///
    /// ## Notes
    /// This operation is idempotent and will do nothing if you are not
    /// actively listening
    pub fn stop(&mut self) {
        if let Some(mut conn) = self.server_handle.take() {
            conn.abort();
            for conn in self.established_connections.iter() {
                match self.disconnected_connections.sender.try_send(*conn.key()) {
                    Ok(_) => (),
                    Err(err) => warn!("Could not signal disconnect because: {}", err),
                }
            }
            self.established_connections.clear();
            self.recv_message_map.clear();

            while self.new_connections.receiver.try_recv().is_ok() {}
        }
    }

    /// Disconnect a specific peer
    pub fn disconnect(&self, conn_id: ConnectionId) -> Result<(), NetworkError> {
        let connection = if let Some(conn) = self.established_connections.remove(&conn_id) {
            conn
        } else {
            return Err(NetworkError::ConnectionNotFound(conn_id));
        };

        connection.1.stop();

        Ok(())
    }
}

pub(crate) fn handle_new_incoming_connections<NP: NetworkProvider, RT: Runtime>(
    mut server: ResMut<Network<NP>>,
    runtime: Res<NetRuntime<RT>>,
    network_settings: Res<NP::NetworkSettings>,
    mut network_events: MessageWriter<NetworkEvent>,
) {
    while let Ok(new_conn) = server.new_connections.receiver.try_recv() {
        let id = server.connection_count;
        let conn_id = ConnectionId { id };
        server.connection_count += 1;

        let (read_half, write_half) = NP::split(new_conn);
        let recv_message_map = server.recv_message_map.clone();
        let hash_to_channel = server.hash_to_channel.clone();
        let read_network_settings = network_settings.clone();
        let write_network_settings = network_settings.clone();
        let disconnected_connections = server.disconnected_connections.sender.clone();

        // Outgoing stays bounded so a slow peer cannot grow memory without bound
        let channel_capacity = NP::channel_capacity(&network_settings);
        let (outgoing_tx, outgoing_rx) = bounded(channel_capacity);
        let (incoming_tx, incoming_rx) = unbounded();

        server.established_connections.insert(
            conn_id,
            Connection {
                receive_task: Box::new(run_async(
                    async move {
                        trace!("Starting listen task for {}", id);
                        NP::recv_loop(read_half, incoming_tx, read_network_settings).await;

                        if disconnected_connections.send(conn_id).await.is_err() {
                            error!("Could not send disconnected event, because channel is disconnected");
                        }
                    },
                    &runtime.0,
                )),
                map_receive_task: Box::new(run_async(
                    async move {
                        while let Ok(packet) = incoming_rx.recv().await {
                            // Hybrid lookup: channel name first, channel hash as fallback
                            if let Some(mut queued) = recv_message_map.get_mut(&packet.channel[..]) {
                                queued.push((conn_id, packet.payload));
                            } else if let Some(registered) = hash_to_channel.get(&packet.channel_hash) {
                                let channel_key = *registered.value();
                                drop(registered);

                                if let Some(mut queued) = recv_message_map.get_mut(channel_key) {
                                    trace!(
                                        "Matched '{}' by channel hash, registered as '{}'",
                                        packet.channel, channel_key
                                    );
                                    queued.push((conn_id, packet.payload));
                                } else {
                                    error!(
                                        "Channel hash 0x{:016x} matched but '{}' is missing from the receive map",
                                        packet.channel_hash, channel_key
                                    );
                                }
                            } else {
                                error!(
                                    "Could not find a registration for channel '{}' (hash: 0x{:016x})",
                                    packet.channel, packet.channel_hash
                                );
                            }
                        }
                    },
                    &runtime.0,
                )),
                send_task: Box::new(run_async(
                    async move {
                        trace!("Starting send task for {}", id);
                        NP::send_loop(write_half, outgoing_rx, write_network_settings).await;
                    },
                    &runtime.0,
                )),
                send_message: outgoing_tx,
            },
        );

        network_events.write(NetworkEvent::Connected(conn_id));
    }

    while let Ok(disconnected_connection) = server.disconnected_connections.receiver.try_recv() {
        server
            .established_connections
            .remove(&disconnected_connection);
        network_events.write(NetworkEvent::Disconnected(disconnected_connection));
    }

    while let Ok(error) = server.error_channel.receiver.try_recv() {
        network_events.write(NetworkEvent::Error(error));
    }
}

pub(crate) fn register_channel_internal<T: OrchardMessage, NP: NetworkProvider>(
    app: &mut App,
) -> &mut App {
    let server = app.world_mut().get_resource::<Network<NP>>()
        .expect("Could not find `Network`. Be sure to include the `OrchardNetPlugin` before registering messages.");

    let channel = T::type_name();
    let channel_hash = T::channel_hash();

    debug!(
        "Registered network message: {} (hash: 0x{:016x})",
        channel, channel_hash
    );

    // Catch double registration of a channel by name
    assert!(
        !server.recv_message_map.contains_key(channel),
        "Duplicate registration of message: {}",
        channel
    );

    // Catch two distinct types sharing a short name (and therefore a hash)
    if let Some(existing_channel) = server.hash_to_channel.get(&channel_hash) {
        let existing = *existing_channel.value();
        if existing != channel {
            panic!(
                "Channel hash collision! Both '{}' and '{}' hash to 0x{:016x}. \
                 Please rename one of these types to avoid collision.",
                existing, channel, channel_hash
            );
        }
    }

    server.recv_message_map.insert(channel, Vec::new());
    server.hash_to_channel.insert(channel_hash, channel);

    app.add_message::<NetworkData<T>>();
    app.add_systems(PreUpdate, relay_incoming_channel::<T, NP>)
}

/// A utility trait on [`App`] to easily register inbound network messages
pub trait AppNetworkMessage {
    /// Register an inbound network message type
    ///
    /// ## Details
    /// This will:
    /// - Add a new message type of [`NetworkData<T>`]
    /// - Register the wire channel so packets are routed to it
    fn register_network_message<T: OrchardMessage, NP: NetworkProvider>(&mut self) -> &mut Self;
}

impl AppNetworkMessage for App {
    fn register_network_message<T: OrchardMessage, NP: NetworkProvider>(&mut self) -> &mut Self {
        register_channel_internal::<T, NP>(self)
    }
}

/// System that decodes queued payloads for a channel and forwards them as
/// [`NetworkData<T>`] messages.
pub(crate) fn relay_incoming_channel<T, NP: NetworkProvider>(
    net_res: ResMut<Network<NP>>,
    mut messages: MessageWriter<NetworkData<T>>,
) where
    T: OrchardMessage,
{
    let channel = T::type_name();
    let mut queued = match net_res.recv_message_map.get_mut(channel) {
        Some(queued) => queued,
        None => return,
    };

    messages.write_batch(queued.drain(..).filter_map(|(source, payload)| {
        codec::decode_payload(&payload)
            .ok()
            .map(|inner| NetworkData { source, inner })
    }));
}
