use async_channel::{Receiver, Sender};
use async_trait::async_trait;
use bevy::prelude::Resource;
use futures_lite::Stream;

use orchard_common::WirePacket;
use orchard_common::error::NetworkError;

/// A transport the [`Network`](crate::Network) resource can drive.
///
/// Providers own the socket types and the async accept/recv/send loops; the
/// core hands them framed [`WirePacket`]s and channels to push decoded
/// packets into.
#[async_trait]
pub trait NetworkProvider: 'static + Send + Sync {
    /// Name used when logging about this provider.
    const PROVIDER_NAME: &'static str;

    /// Settings resource the provider reads its configuration from.
    type NetworkSettings: Resource + Clone;

    /// An established, not yet split connection.
    type Socket: Send;

    /// Half of the socket the recv loop reads from.
    type ReadHalf: Send;

    /// Half of the socket the send loop writes to.
    type WriteHalf: Send;

    /// Information needed to connect to a remote endpoint.
    type ConnectInfo: Send;

    /// Information needed to start accepting connections.
    type AcceptInfo: Send;

    /// Stream of newly accepted connections.
    type AcceptStream: Stream<Item = Self::Socket> + Unpin + Send;

    /// Bind and return a stream of accepted connections.
    async fn accept_loop(
        accept_info: Self::AcceptInfo,
        network_settings: Self::NetworkSettings,
    ) -> Result<Self::AcceptStream, NetworkError>;

    /// Connect to a remote endpoint.
    async fn connect_task(
        connect_info: Self::ConnectInfo,
        network_settings: Self::NetworkSettings,
    ) -> Result<Self::Socket, NetworkError>;

    /// Read frames off the wire and push decoded packets into `messages`
    /// until the connection closes.
    async fn recv_loop(
        read_half: Self::ReadHalf,
        messages: Sender<WirePacket>,
        settings: Self::NetworkSettings,
    );

    /// Pull packets from `messages` and write them to the wire until the
    /// channel closes.
    async fn send_loop(
        write_half: Self::WriteHalf,
        messages: Receiver<WirePacket>,
        settings: Self::NetworkSettings,
    );

    /// Split a socket into its read and write halves.
    fn split(combined: Self::Socket) -> (Self::ReadHalf, Self::WriteHalf);

    /// Capacity of the per-connection outgoing channel.
    fn channel_capacity(settings: &Self::NetworkSettings) -> usize;
}
