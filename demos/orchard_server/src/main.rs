use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use bevy::app::ScheduleRunnerPlugin;
use bevy::prelude::*;
use bevy::tasks::{TaskPool, TaskPoolBuilder};
use orchard_bridge::{GatheringRow, LevelEntity, LevelSystem, LoadLevel, OrchardBridgePlugin};
use orchard_net::{NetRuntime, Network, NetworkEvent, OrchardNetPlugin};
use orchard_net::websocket::{NetworkSettings, WebSocketProvider};

/// Orchard demo server.
///
/// Runs a headless orchard level with a few gathering rows and exposes the
/// `get_gathering_plan` service and the `ReloadLevel` call to middleware
/// peers on ws://127.0.0.1:8082.
fn main() {
    let mut app = App::new();

    // Configure MinimalPlugins with a schedule runner that runs at 60 FPS
    app.add_plugins((
        MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(Duration::from_secs_f64(
            1.0 / 60.0,
        ))),
        bevy::log::LogPlugin::default(),
    ));

    // Networking over WebSockets
    app.add_plugins(OrchardNetPlugin::<WebSocketProvider, TaskPool>::default());
    app.insert_resource(NetRuntime(TaskPoolBuilder::new().num_threads(2).build()));
    app.insert_resource(NetworkSettings::default());

    // The planning and level lifecycle bridge
    app.add_plugins(OrchardBridgePlugin::<WebSocketProvider>::default());

    app.add_systems(Startup, (setup_levels, setup_networking));
    app.add_systems(Update, handle_connection_events);

    app.run();
}

/// Register the orchard level and load it.
fn setup_levels(mut level: ResMut<LevelSystem>, mut loads: MessageWriter<LoadLevel>) {
    level.register_level("orchard", |commands| {
        // Four rows of apple trees, 2m apart, each with ten poses a meter apart
        for row in 0..4 {
            let entry = Vec3::new(0.0, row as f32 * 2.0, 0.0);
            commands.spawn((
                LevelEntity,
                GatheringRow::along(entry, Vec3::X, 10),
                Transform::from_translation(entry),
            ));
        }
    });

    loads.write(LoadLevel {
        name: "orchard".to_string(),
    });
}

fn setup_networking(
    mut net: ResMut<Network<WebSocketProvider>>,
    settings: Res<NetworkSettings>,
    task_pool: Res<NetRuntime<TaskPool>>,
) {
    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 8082);

    match net.listen(addr, &task_pool.0, &settings) {
        Ok(_) => info!("Orchard server listening on {addr}"),
        Err(err) => {
            error!("Could not start listening: {err}");
            panic!("Failed to bind WebSocket listener");
        }
    }
}

fn handle_connection_events(mut network_events: MessageReader<NetworkEvent>) {
    for event in network_events.read() {
        match event {
            NetworkEvent::Connected(conn_id) => info!("Peer connected: {conn_id}"),
            NetworkEvent::Disconnected(conn_id) => info!("Peer disconnected: {conn_id}"),
            NetworkEvent::Error(err) => error!("Network error: {err}"),
        }
    }
}
