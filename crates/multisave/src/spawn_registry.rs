// ---------------------------------------------------------------------------
// Spawn registry: type name -> factory for respawning saved actors
// ---------------------------------------------------------------------------

use std::collections::HashMap;
use std::sync::Arc;

use bevy::prelude::*;

use crate::actor::SaveObject;
use crate::field_table::FieldTable;

/// Spawns a fresh entity at the given transform and returns it.
pub type SpawnFn = Arc<dyn Fn(&mut World, &Transform) -> Entity + Send + Sync>;

/// Produces an `ActorType` on first use (the dynamic-load fallback).
pub type LoaderFn = Box<dyn Fn() -> Option<ActorType> + Send + Sync>;

#[derive(Clone)]
pub struct ActorType {
    pub name: String,
    /// The spawned entity carries `SaveActor`.
    pub saveable: bool,
    pub spawn: SpawnFn,
}

impl ActorType {
    pub fn new(
        name: impl Into<String>,
        saveable: bool,
        spawn: impl Fn(&mut World, &Transform) -> Entity + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            saveable,
            spawn: Arc::new(spawn),
        }
    }
}

/// Per-world registry of respawnable actor types, keyed by type name.
#[derive(Resource, Default)]
pub struct SpawnRegistry {
    resolved: HashMap<String, ActorType>,
    loaders: HashMap<String, LoaderFn>,
}

impl SpawnRegistry {
    pub fn register(&mut self, actor_type: ActorType) {
        if self.resolved.contains_key(&actor_type.name) {
            warn!(
                "SpawnRegistry: duplicate type '{}', replacing earlier registration",
                actor_type.name
            );
        }
        self.resolved.insert(actor_type.name.clone(), actor_type);
    }

    /// Register a type that is only built when a record first needs it.
    pub fn register_loader(
        &mut self,
        name: impl Into<String>,
        loader: impl Fn() -> Option<ActorType> + Send + Sync + 'static,
    ) {
        self.loaders.insert(name.into(), Box::new(loader));
    }

    /// Look the type up, falling back to its loader.
    pub fn resolve(&mut self, name: &str) -> Option<ActorType> {
        if let Some(found) = self.resolved.get(name) {
            return Some(found.clone());
        }
        let loaded = (self.loaders.get(name)?)()?;
        debug!("SpawnRegistry: loaded type '{}' on demand", name);
        self.resolved.insert(name.to_string(), loaded.clone());
        Some(loaded)
    }

    pub fn is_resolved(&self, name: &str) -> bool {
        self.resolved.contains_key(name)
    }
}

/// Extension trait on `App` for one-line respawn registration.
///
/// # Example
///
/// ```ignore
/// use multisave::SpawnAppExt;
///
/// app.register_spawnable::<Crate>(|world, transform| {
///     world
///         .spawn((*transform, SaveActor::runtime(Crate::default())))
///         .id()
/// });
/// ```
pub trait SpawnAppExt {
    fn register_spawnable<T: SaveObject + FieldTable>(
        &mut self,
        spawn: impl Fn(&mut World, &Transform) -> Entity + Send + Sync + 'static,
    ) -> &mut Self;
}

impl SpawnAppExt for App {
    fn register_spawnable<T: SaveObject + FieldTable>(
        &mut self,
        spawn: impl Fn(&mut World, &Transform) -> Entity + Send + Sync + 'static,
    ) -> &mut Self {
        self.init_resource::<SpawnRegistry>();
        self.world_mut()
            .resource_mut::<SpawnRegistry>()
            .register(ActorType::new(T::TYPE_NAME, true, spawn));
        self
    }
}
