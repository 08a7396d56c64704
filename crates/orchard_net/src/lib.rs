#![deny(
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces,
    unused_qualifications,
    clippy::unwrap_used
)]
#![allow(clippy::type_complexity)]

/*!
Service endpoint layer for bridging robotics middleware peers into a Bevy app.

Add the [`OrchardNetPlugin`] with the provider you wish to use, insert your
runtime as the [`NetRuntime`] resource along with the provider's settings,
and start listening. Plain inbound messages are registered through
[`AppNetworkMessage::register_network_message`] and arrive as
[`NetworkData<T>`] messages; request/response endpoints are registered through
[`AppServiceEndpoint::register_service`] and arrive as
[`service::ServiceRequest<S>`], answered by writing a
[`service::ServiceResponse<S>`].

## Example server

```rust,no_run
use bevy::prelude::*;
use bevy::tasks::TaskPoolBuilder;
use orchard_net::{
    AppNetworkMessage, NetRuntime, NetworkData, NetworkEvent, OrchardNetPlugin,
    websocket::{NetworkSettings, WebSocketProvider},
};
use serde::{Serialize, Deserialize};

#[derive(Serialize, Deserialize, Clone)]
struct StatusReport;

fn main() {
    let mut app = App::new();
    app.add_plugins(OrchardNetPlugin::<WebSocketProvider, bevy::tasks::TaskPool>::default());

    // Insert the runtime and the settings for the WebSocket transport
    app.insert_resource(NetRuntime(TaskPoolBuilder::new().num_threads(2).build()));
    app.insert_resource(NetworkSettings::default());

    // We are receiving this from a peer, so we need to register it
    app.register_network_message::<StatusReport, WebSocketProvider>();
    app.add_systems(Update, (handle_reports, handle_connection_events));
}

fn handle_reports(mut reports: MessageReader<NetworkData<StatusReport>>) {
    for _report in reports.read() {
        info!("Got a status report!");
    }
}

fn handle_connection_events(mut network_events: MessageReader<NetworkEvent>) {
    for event in network_events.read() {
        if let NetworkEvent::Connected(_) = event {
            info!("New peer connected!");
        }
    }
}
```
*/

/// Contains the [`Network`] resource and channel registration.
pub mod network;
/// Contains the provider trait implemented by transports.
pub mod provider;
/// Contains the runtime abstraction for background tasks.
pub mod runtime;
/// Contains the request/response service endpoint layer.
pub mod service;
/// A WebSocket [`provider::NetworkProvider`].
pub mod websocket;

pub use network::{AppNetworkMessage, Network};
pub use provider::NetworkProvider;
pub use runtime::{NetRuntime, Runtime};
pub use service::{AppServiceEndpoint, ServiceRequest, ServiceResponse};

pub use orchard_common::error;
use orchard_common::error::NetworkError;

pub use orchard_common::{ConnectionId, OrchardMessage, ServiceMessage, WirePacket};

use std::{marker::PhantomData, ops::Deref};

use async_channel::{Receiver, Sender, unbounded};
use bevy::prelude::*;

pub(crate) struct AsyncChannel<T> {
    pub(crate) sender: Sender<T>,
    pub(crate) receiver: Receiver<T>,
}

impl<T> AsyncChannel<T> {
    fn new() -> Self {
        let (sender, receiver) = unbounded();

        Self { sender, receiver }
    }
}

impl<T> Default for AsyncChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Message)]
/// A network event originating from a middleware peer
pub enum NetworkEvent {
    /// A new peer has connected
    Connected(ConnectionId),
    /// A peer has disconnected
    Disconnected(ConnectionId),
    /// An error occurred while trying to do a network operation
    Error(NetworkError),
}

#[derive(Debug, Message)]
/// [`NetworkData`] is how inbound messages surface on the Bevy message bus.
pub struct NetworkData<T> {
    source: ConnectionId,
    inner: T,
}

impl<T> Deref for NetworkData<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T> NetworkData<T> {
    /// Allows manual creation of network data, mainly for tests and for
    /// feeding the bus from within the app.
    pub fn new(source: ConnectionId, inner: T) -> NetworkData<T> {
        Self { source, inner }
    }

    /// The connection this data arrived from
    pub fn source(&self) -> ConnectionId {
        self.source
    }

    /// Get the inner data out of it
    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[derive(Default, Copy, Clone, Debug)]
/// The plugin to add to your bevy [`App`] when you want to accept middleware
/// peers
pub struct OrchardNetPlugin<NP: NetworkProvider, RT: Runtime = bevy::tasks::TaskPool>(
    PhantomData<(NP, RT)>,
);

impl<NP: NetworkProvider + Default, RT: Runtime> Plugin for OrchardNetPlugin<NP, RT> {
    fn build(&self, app: &mut App) {
        app.insert_resource(Network::new(NP::default()));
        app.add_message::<NetworkEvent>();
        app.add_systems(PreUpdate, network::handle_new_incoming_connections::<NP, RT>);
    }
}
