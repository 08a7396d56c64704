use bevy::prelude::*;
use bevy::tasks::TaskPoolBuilder;
use orchard_common::{ConnectionId, ServiceCall, ServiceMessage};
use orchard_net::{
    AppNetworkMessage, AppServiceEndpoint, Network, NetRuntime, OrchardNetPlugin,
    ServiceRequest, ServiceResponse,
    websocket::{NetworkSettings, WebSocketProvider},
};
use serde::{Deserialize, Serialize};

// Test message type
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
struct TestMessage {
    content: String,
}

// Another test message type
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
struct AnotherMessage {
    content: String,
}

// Test service with an explicit endpoint name
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
struct EchoRequest {
    text: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
struct EchoResponse {
    text: String,
}

impl ServiceMessage for EchoRequest {
    type Response = EchoResponse;

    fn service_name() -> &'static str {
        "echo"
    }
}

// Helper function to create a test app with minimal setup
fn create_test_app() -> App {
    let mut app = App::new();
    app.add_plugins(MinimalPlugins);
    app.add_plugins(OrchardNetPlugin::<WebSocketProvider, bevy::tasks::TaskPool>::default());
    app.insert_resource(NetRuntime(TaskPoolBuilder::new().num_threads(2).build()));
    app.insert_resource(NetworkSettings::default());
    app
}

#[test]
fn test_register_message() {
    let mut app = create_test_app();

    app.register_network_message::<TestMessage, WebSocketProvider>();

    // Verify registration with auto-generated channel name
    let net = app
        .world()
        .get_resource::<Network<WebSocketProvider>>()
        .unwrap();
    let channels = net.registered_channels();
    assert!(channels.iter().any(|name| name.contains("TestMessage")));
}

#[test]
fn test_is_channel_registered() {
    let mut app = create_test_app();

    app.register_network_message::<TestMessage, WebSocketProvider>();

    let net = app
        .world()
        .get_resource::<Network<WebSocketProvider>>()
        .unwrap();
    let channels = net.registered_channels();

    let auto_name = channels
        .iter()
        .find(|name| name.contains("TestMessage"))
        .unwrap();

    assert!(net.is_channel_registered(auto_name));
    assert!(!net.is_channel_registered("NoSuchChannel"));
}

#[test]
fn test_multiple_registration() {
    let mut app = create_test_app();

    app.register_network_message::<TestMessage, WebSocketProvider>();
    app.register_network_message::<AnotherMessage, WebSocketProvider>();

    let net = app
        .world()
        .get_resource::<Network<WebSocketProvider>>()
        .unwrap();
    let channels = net.registered_channels();
    assert!(channels.iter().any(|name| name.contains("TestMessage")));
    assert!(channels.iter().any(|name| name.contains("AnotherMessage")));
}

#[test]
#[should_panic(expected = "Duplicate registration")]
fn test_duplicate_registration_panics() {
    let mut app = create_test_app();

    app.register_network_message::<TestMessage, WebSocketProvider>();
    app.register_network_message::<TestMessage, WebSocketProvider>(); // Should panic
}

#[test]
fn test_send_without_connection_fails() {
    let mut app = create_test_app();

    app.register_network_message::<TestMessage, WebSocketProvider>();

    let net = app
        .world()
        .get_resource::<Network<WebSocketProvider>>()
        .unwrap();

    let msg = TestMessage {
        content: "test".to_string(),
    };
    let result = net.send(ConnectionId { id: 999 }, msg);

    // No such connection, the send must surface an error
    assert!(result.is_err());
}

#[test]
fn test_broadcast_without_connections() {
    let mut app = create_test_app();

    app.register_network_message::<TestMessage, WebSocketProvider>();

    let net = app
        .world()
        .get_resource::<Network<WebSocketProvider>>()
        .unwrap();

    // No peers connected, broadcast is a quiet no-op
    let msg = TestMessage {
        content: "test".to_string(),
    };
    net.broadcast(msg);
    assert!(!net.has_connections());
    assert_eq!(net.connection_count(), 0);
}

#[test]
fn test_external_type_registration() {
    // Types from other crates register fine thanks to the blanket impl
    #[derive(Serialize, Deserialize, Clone)]
    struct ExternalType {
        data: Vec<u8>,
    }

    let mut app = create_test_app();

    app.register_network_message::<ExternalType, WebSocketProvider>();

    let net = app
        .world()
        .get_resource::<Network<WebSocketProvider>>()
        .unwrap();
    let channels = net.registered_channels();
    assert!(channels.iter().any(|name| name.contains("ExternalType")));
}

#[test]
fn test_generic_type_registration() {
    #[derive(Serialize, Deserialize, Clone)]
    struct GenericMessage<T> {
        value: T,
    }

    let mut app = create_test_app();

    app.register_network_message::<GenericMessage<i32>, WebSocketProvider>();
    app.register_network_message::<GenericMessage<String>, WebSocketProvider>();

    // Both instantiations get distinct channels
    let net = app
        .world()
        .get_resource::<Network<WebSocketProvider>>()
        .unwrap();
    let channels = net.registered_channels();
    let registrations: Vec<_> = channels
        .iter()
        .filter(|name| name.contains("GenericMessage"))
        .collect();

    assert_eq!(registrations.len(), 2);
}

#[test]
fn test_register_service_endpoint() {
    let mut app = create_test_app();

    app.register_service::<EchoRequest, WebSocketProvider>();

    // The call envelope channel carries the endpoint name, not the type name
    let net = app
        .world()
        .get_resource::<Network<WebSocketProvider>>()
        .unwrap();
    assert!(net.is_channel_registered(ServiceCall::<EchoRequest>::channel_name()));
    assert!(net.is_channel_registered("ServiceCall(echo)"));
}

#[test]
#[should_panic(expected = "Duplicate registration of service")]
fn test_duplicate_service_registration_panics() {
    let mut app = create_test_app();

    app.register_service::<EchoRequest, WebSocketProvider>();
    app.register_service::<EchoRequest, WebSocketProvider>(); // Should panic
}

#[test]
fn test_service_requests_reach_responder_systems() {
    let mut app = create_test_app();

    app.register_service::<EchoRequest, WebSocketProvider>();
    app.add_systems(
        Update,
        |mut requests: MessageReader<ServiceRequest<EchoRequest>>,
         mut replies: MessageWriter<ServiceResponse<EchoRequest>>| {
            for request in requests.read() {
                replies.write(ServiceResponse::reply(
                    request,
                    EchoResponse {
                        text: request.text.clone(),
                    },
                ));
            }
        },
    );

    app.world_mut()
        .resource_mut::<Messages<ServiceRequest<EchoRequest>>>()
        .write(ServiceRequest::new(
            ConnectionId { id: 7 },
            42,
            EchoRequest {
                text: "hello".to_string(),
            },
        ));

    app.update();

    // The responder echoed the request back to the calling connection
    let replies: Vec<_> = app
        .world_mut()
        .resource_mut::<Messages<ServiceResponse<EchoRequest>>>()
        .drain()
        .collect();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].target, ConnectionId { id: 7 });
    assert_eq!(replies[0].call_id, 42);
    assert_eq!(replies[0].response.text, "hello");
}

#[test]
fn test_service_response_echoes_request_metadata() {
    let request = ServiceRequest::new(
        ConnectionId { id: 3 },
        11,
        EchoRequest {
            text: "ping".to_string(),
        },
    );
    let response = ServiceResponse::reply(
        &request,
        EchoResponse {
            text: "pong".to_string(),
        },
    );

    assert_eq!(response.target, request.source());
    assert_eq!(response.call_id, request.call_id());
}
