use bevy::prelude::*;
use tracing::{debug, error};

use crate::{
    network::Network,
    provider::NetworkProvider,
};
use orchard_common::{ConnectionId, ServiceCall, ServiceMessage, ServiceReply, WirePacket, codec};

/// An inbound call on a registered service endpoint.
///
/// Carries the caller's connection and the call id that must be echoed on
/// the response.
#[derive(Debug, Message)]
pub struct ServiceRequest<S: ServiceMessage> {
    source: ConnectionId,
    call_id: u64,
    request: S,
}

impl<S: ServiceMessage> ServiceRequest<S> {
    /// Manually construct a request, mainly for tests and for calling a
    /// service from within the app.
    pub fn new(source: ConnectionId, call_id: u64, request: S) -> Self {
        Self {
            source,
            call_id,
            request,
        }
    }

    /// The connection the call arrived from.
    pub fn source(&self) -> ConnectionId {
        self.source
    }

    /// The caller-chosen correlation id.
    pub fn call_id(&self) -> u64 {
        self.call_id
    }

    /// The request payload.
    pub fn request(&self) -> &S {
        &self.request
    }
}

impl<S: ServiceMessage> std::ops::Deref for ServiceRequest<S> {
    type Target = S;

    fn deref(&self) -> &Self::Target {
        &self.request
    }
}

/// A response to a [`ServiceRequest`], relayed back to the calling
/// connection with the original call id.
#[derive(Debug, Message)]
pub struct ServiceResponse<S: ServiceMessage> {
    /// Connection the reply is addressed to.
    pub target: ConnectionId,
    /// Correlation id echoed from the call.
    pub call_id: u64,
    /// The response payload.
    pub response: S::Response,
}

impl<S: ServiceMessage> ServiceResponse<S> {
    /// Build the response for a given request, echoing its source and call id.
    pub fn reply(request: &ServiceRequest<S>, response: S::Response) -> Self {
        Self {
            target: request.source,
            call_id: request.call_id,
            response,
        }
    }
}

/// A utility trait on [`App`] to register request/response service endpoints
pub trait AppServiceEndpoint {
    /// Register a named service endpoint.
    ///
    /// ## Details
    /// This will:
    /// - Register the `ServiceCall(..)` wire channel for the endpoint
    /// - Add [`ServiceRequest<S>`] and [`ServiceResponse<S>`] message types
    /// - Decode inbound calls in `PreUpdate` and relay responses back to the
    ///   calling connection in `PostUpdate`
    fn register_service<S: ServiceMessage, NP: NetworkProvider>(&mut self) -> &mut Self;
}

impl AppServiceEndpoint for App {
    fn register_service<S: ServiceMessage, NP: NetworkProvider>(&mut self) -> &mut Self {
        let server = self.world_mut().get_resource::<Network<NP>>()
            .expect("Could not find `Network`. Be sure to include the `OrchardNetPlugin` before registering services.");

        let channel = ServiceCall::<S>::channel_name();
        let channel_hash = ServiceCall::<S>::channel_hash();

        debug!(
            "Registered service endpoint: {} (channel: {})",
            S::service_name(),
            channel
        );

        assert!(
            !server.recv_message_map.contains_key(channel),
            "Duplicate registration of service: {}",
            S::service_name()
        );

        server.recv_message_map.insert(channel, Vec::new());
        server.hash_to_channel.insert(channel_hash, channel);

        self.add_message::<ServiceRequest<S>>();
        self.add_message::<ServiceResponse<S>>();
        self.add_systems(PreUpdate, decode_service_calls::<S, NP>);
        self.add_systems(PostUpdate, relay_service_replies::<S, NP>)
    }
}

/// System that decodes queued call envelopes for one endpoint and forwards
/// them as [`ServiceRequest<S>`] messages.
fn decode_service_calls<S: ServiceMessage, NP: NetworkProvider>(
    net_res: ResMut<Network<NP>>,
    mut requests: MessageWriter<ServiceRequest<S>>,
) {
    let mut queued = match net_res
        .recv_message_map
        .get_mut(ServiceCall::<S>::channel_name())
    {
        Some(queued) => queued,
        None => return,
    };

    requests.write_batch(queued.drain(..).filter_map(|(source, payload)| {
        codec::decode_payload::<ServiceCall<S>>(&payload)
            .ok()
            .map(|call| ServiceRequest {
                source,
                call_id: call.call_id,
                request: call.request,
            })
    }));
}

/// System that wraps [`ServiceResponse<S>`] messages in reply envelopes and
/// sends them to the calling connection.
fn relay_service_replies<S: ServiceMessage, NP: NetworkProvider>(
    mut replies: MessageReader<ServiceResponse<S>>,
    net: Res<Network<NP>>,
) {
    for reply in replies.read() {
        let envelope = ServiceReply::<S> {
            call_id: reply.call_id,
            response: reply.response.clone(),
        };

        let packet = match codec::encode_payload(&envelope) {
            Ok(payload) => WirePacket {
                channel: ServiceReply::<S>::channel_name().to_string(),
                channel_hash: ServiceReply::<S>::channel_hash(),
                payload,
            },
            Err(_) => {
                error!(
                    "Could not encode a reply on service {}",
                    S::service_name()
                );
                continue;
            }
        };

        if let Err(e) = net.send_packet(reply.target, packet) {
            error!(
                "Failed to send {} reply to peer {}: {:?}",
                S::service_name(),
                reply.target.id,
                e
            );
        }
    }
}
