use std::collections::HashMap;

use bevy::prelude::*;
use tracing::{debug, error, info, warn};

use orchard_msgs::ReloadLevel;
use orchard_net::NetworkData;

/// Marker for entities owned by the loaded level.
///
/// Spawners must tag everything they spawn with this so unload and reload can
/// find it.
#[derive(Component, Clone, Copy, Debug, Default)]
pub struct LevelEntity;

/// Spawns a level's entities into the world.
pub type LevelSpawner = Box<dyn Fn(&mut Commands) + Send + Sync + 'static>;

/// The level catalog and the name of the level currently loaded.
#[derive(Resource, Default)]
pub struct LevelSystem {
    current: Option<String>,
    catalog: HashMap<String, LevelSpawner>,
}

impl LevelSystem {
    /// Register a named level.
    pub fn register_level(
        &mut self,
        name: impl Into<String>,
        spawner: impl Fn(&mut Commands) + Send + Sync + 'static,
    ) {
        self.catalog.insert(name.into(), Box::new(spawner));
    }

    /// Name of the level currently loaded, if any.
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Whether a level with this name is in the catalog.
    pub fn is_registered(&self, name: &str) -> bool {
        self.catalog.contains_key(name)
    }

    fn spawn(&mut self, name: &str, commands: &mut Commands) -> bool {
        match self.catalog.get(name) {
            Some(spawner) => {
                spawner(commands);
                self.current = Some(name.to_string());
                true
            }
            None => false,
        }
    }
}

/// Request to load a named level, replacing whatever is loaded.
#[derive(Message, Clone, Debug)]
pub struct LoadLevel {
    /// Catalog name of the level to load.
    pub name: String,
}

/// Request to unload the current level.
#[derive(Message, Clone, Copy, Debug, Default)]
pub struct UnloadLevel;

/// A level load deferred to the top of the next frame.
#[derive(Resource, Clone, Debug, Default)]
pub struct QueuedLevelLoad(pub Option<String>);

/// System that turns `ReloadLevel` calls from peers into local bus messages.
pub(crate) fn forward_remote_reload(
    mut remote: MessageReader<NetworkData<ReloadLevel>>,
    mut local: MessageWriter<ReloadLevel>,
) {
    for call in remote.read() {
        debug!("Level reload requested by peer {}", call.source());
        local.write(**call);
    }
}

/// System that tears the current level down immediately and queues it to come
/// back on the next frame.
pub(crate) fn handle_reload_level(
    mut reloads: MessageReader<ReloadLevel>,
    mut commands: Commands,
    level_entities: Query<Entity, With<LevelEntity>>,
    level: Res<LevelSystem>,
    mut queued: ResMut<QueuedLevelLoad>,
) {
    if reloads.is_empty() {
        return;
    }
    reloads.clear();

    let Some(current) = level.current() else {
        warn!("Reload requested but no level is loaded");
        return;
    };

    info!("Reloading level '{}'", current);
    for entity in &level_entities {
        commands.entity(entity).despawn();
    }
    queued.0 = Some(current.to_string());
}

/// System that applies a queued level load. Runs in `First` so the previous
/// frame's despawns are already flushed.
pub(crate) fn apply_queued_level_load(
    mut commands: Commands,
    mut queued: ResMut<QueuedLevelLoad>,
    mut level: ResMut<LevelSystem>,
) {
    let Some(name) = queued.0.take() else {
        return;
    };

    if !level.spawn(&name, &mut commands) {
        error!("Queued level '{}' is not in the catalog", name);
    }
}

pub(crate) fn handle_unload_level(
    mut unloads: MessageReader<UnloadLevel>,
    mut commands: Commands,
    level_entities: Query<Entity, With<LevelEntity>>,
    mut level: ResMut<LevelSystem>,
) {
    if unloads.is_empty() {
        return;
    }
    unloads.clear();

    if let Some(current) = level.current.take() {
        info!("Unloading level '{}'", current);
    }
    for entity in &level_entities {
        commands.entity(entity).despawn();
    }
}

pub(crate) fn handle_load_level(
    mut loads: MessageReader<LoadLevel>,
    mut commands: Commands,
    level_entities: Query<Entity, With<LevelEntity>>,
    mut level: ResMut<LevelSystem>,
) {
    // Only the last requested load in a frame wins
    let Some(load) = loads.read().last() else {
        return;
    };

    // An unknown name must not disturb whatever is currently loaded
    if !level.is_registered(&load.name) {
        error!("Level '{}' is not in the catalog", load.name);
        return;
    }

    for entity in &level_entities {
        commands.entity(entity).despawn();
    }

    level.spawn(&load.name, &mut commands);
    info!("Loaded level '{}'", load.name);
}
