//! orchard_bridge
//!
//! Bridges the orchard server's gameplay world to robotics middleware peers
//! over orchard_net. It answers the `get_gathering_plan` service by picking
//! the gathering row nearest to the requested start pose, and accepts
//! `ReloadLevel` calls that tear the current level down immediately and bring
//! it back on the next tick.
//!
//! Add [`OrchardBridgePlugin`] after the
//! [`OrchardNetPlugin`](orchard_net::OrchardNetPlugin); it wires the service
//! endpoint and the level lifecycle systems:
//!
//! ```rust,ignore
//! app.add_plugins(OrchardNetPlugin::<WebSocketProvider>::default());
//! app.add_plugins(OrchardBridgePlugin::<WebSocketProvider>::default());
//! ```

mod config;
mod conversions;
mod level;
mod planning;
mod rows;

pub use config::BridgeConfig;
pub use conversions::{from_pose_msg, to_pose_msg};
pub use level::{LevelEntity, LevelSystem, LoadLevel, QueuedLevelLoad, UnloadLevel};
pub use planning::nearest_row;
pub use rows::GatheringRow;

use std::marker::PhantomData;

use bevy::prelude::*;

use orchard_msgs::{GetPlan, ReloadLevel};
use orchard_net::{AppNetworkMessage, AppServiceEndpoint, Network, NetworkProvider};

/// System set for bridge systems so downstream apps can schedule around them
/// if needed.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum OrchardBridgeSystems {
    /// Systems that turn inbound peer messages into local bus messages.
    Inbound,
    /// Systems that load, unload, and reload levels.
    Level,
    /// Systems that answer plan requests from the current world state.
    Planning,
}

/// The plugin to add to your bevy [`App`] to expose the gathering plan
/// service and the level reload call to middleware peers.
#[derive(Default, Copy, Clone, Debug)]
pub struct OrchardBridgePlugin<NP: NetworkProvider>(PhantomData<NP>);

impl<NP: NetworkProvider> Plugin for OrchardBridgePlugin<NP> {
    fn build(&self, app: &mut App) {
        assert!(
            app.world().contains_resource::<Network<NP>>(),
            "Could not find `Network`. Be sure to include the `OrchardNetPlugin` before the `OrchardBridgePlugin`."
        );

        app.init_resource::<BridgeConfig>()
            .init_resource::<LevelSystem>()
            .init_resource::<QueuedLevelLoad>()
            .add_message::<ReloadLevel>()
            .add_message::<LoadLevel>()
            .add_message::<UnloadLevel>();

        app.register_network_message::<ReloadLevel, NP>();
        app.register_service::<GetPlan, NP>();

        app.configure_sets(
            Update,
            (
                OrchardBridgeSystems::Inbound,
                OrchardBridgeSystems::Level,
                OrchardBridgeSystems::Planning,
            )
                .chain(),
        );

        // Queued loads apply at the top of the next frame, after the previous
        // frame's despawns have been flushed
        app.add_systems(First, level::apply_queued_level_load);
        app.add_systems(
            Update,
            (
                level::forward_remote_reload.in_set(OrchardBridgeSystems::Inbound),
                (
                    level::handle_reload_level,
                    level::handle_unload_level,
                    level::handle_load_level,
                )
                    .in_set(OrchardBridgeSystems::Level),
                planning::answer_plan_requests.in_set(OrchardBridgeSystems::Planning),
            ),
        );
    }
}
