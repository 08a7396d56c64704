use bevy::prelude::Resource;
use serde::{Deserialize, Serialize};

/// Configuration for the bridge, loadable from a config file on the server.
#[derive(Resource, Clone, Debug, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Reference frame written into the headers of outgoing plans.
    pub frame_id: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            frame_id: "map".to_string(),
        }
    }
}
