//! Object snapshot codec.
//!
//! Capturing and applying touch the ECS world and must run on the main
//! thread. The value types (`SnapshotValues`, `ActorValues`) are plain data:
//! turning them into field blobs and back is pure and can run on a worker.

use bevy::prelude::*;

use crate::actor::{ActorKind, ChildActor, Mobility, SaveActor, SaveComponent};
use crate::field_codec::{decode_fields, encode_fields};
use crate::field_discovery::{apply_fields, capture_fields, FieldMarks};
use crate::field_value::FieldValue;
use crate::save_error::SaveError;
use crate::save_types::{ActorRecord, Category, ObjectSnapshot, Pose, SubRecord};

pub type FieldEntries = Vec<(String, FieldValue)>;

/// Captured state of one sub-component.
#[derive(Debug, Clone, PartialEq)]
pub struct SubValues {
    pub name: String,
    pub relative: Option<Pose>,
    pub fields: FieldEntries,
}

/// Captured state of one object, before encoding or after decoding.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SnapshotValues {
    pub fields: FieldEntries,
    pub sub_records: Vec<SubValues>,
}

impl SnapshotValues {
    pub fn encode(&self) -> ObjectSnapshot {
        ObjectSnapshot {
            fields: encode_fields(&self.fields),
            sub_records: self
                .sub_records
                .iter()
                .map(|sub| SubRecord {
                    name: sub.name.clone(),
                    relative: sub.relative,
                    fields: encode_fields(&sub.fields),
                })
                .collect(),
        }
    }

    /// Decode a snapshot. A sub-record whose blob is unreadable is dropped
    /// with a warning; an unreadable top-level blob fails the whole snapshot.
    pub fn decode(snapshot: &ObjectSnapshot) -> Result<Self, SaveError> {
        let fields = decode_fields(&snapshot.fields)?;
        let sub_records = snapshot
            .sub_records
            .iter()
            .filter_map(|sub| match decode_fields(&sub.fields) {
                Ok(fields) => Some(SubValues {
                    name: sub.name.clone(),
                    relative: sub.relative,
                    fields,
                }),
                Err(e) => {
                    warn!("Dropping sub-record '{}': {}", sub.name, e);
                    None
                }
            })
            .collect();
        Ok(Self {
            fields,
            sub_records,
        })
    }
}

/// A captured actor record, before encoding or after decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct ActorValues {
    pub category: Category,
    pub identity: String,
    pub type_name: Option<String>,
    pub placement: Pose,
    pub values: SnapshotValues,
}

impl ActorValues {
    pub fn encode(&self) -> ActorRecord {
        ActorRecord {
            category: self.category,
            identity: self.identity.clone(),
            type_name: self.type_name.clone(),
            placement: self.placement,
            payload: self.values.encode(),
        }
    }

    pub fn decode(record: &ActorRecord) -> Result<Self, SaveError> {
        Ok(Self {
            category: record.category,
            identity: record.identity.clone(),
            type_name: record.type_name.clone(),
            placement: record.placement,
            values: SnapshotValues::decode(&record.payload)?,
        })
    }
}

fn named_children(world: &World, entity: Entity) -> Vec<(Entity, String)> {
    let Some(children) = world.get::<Children>(entity) else {
        return Vec::new();
    };
    children
        .iter()
        .filter_map(|&child| {
            world
                .get::<Name>(child)
                .map(|name| (child, name.as_str().to_string()))
        })
        .collect()
}

/// Snapshot one actor: pre-save hook, clear the loaded marker, discover,
/// capture fields and sub-components, saved hook.
///
/// Returns `None` when the entity no longer exists or lacks `SaveActor`.
pub fn capture_actor(
    world: &mut World,
    entity: Entity,
    marks: &mut FieldMarks,
) -> Option<SnapshotValues> {
    let (fields, wanted) = {
        let mut actor = world.get_mut::<SaveActor>(entity)?;
        actor.object_mut().pre_save();
        actor.set_loaded(false);
        marks.discover_object(actor.object());
        let fields = capture_fields(actor.object(), marks);
        // Level scripts never carry sub-components.
        let wanted = if actor.kind() == ActorKind::LevelScript {
            Vec::new()
        } else {
            actor.object().components_to_save()
        };
        (fields, wanted)
    };

    let sub_records = capture_components(world, entity, &wanted, marks);

    if let Some(mut actor) = world.get_mut::<SaveActor>(entity) {
        actor.object_mut().saved();
    }
    Some(SnapshotValues {
        fields,
        sub_records,
    })
}

fn capture_components(
    world: &World,
    entity: Entity,
    wanted: &[String],
    marks: &mut FieldMarks,
) -> Vec<SubValues> {
    if wanted.is_empty() {
        return Vec::new();
    }
    let mut out = Vec::new();
    for (child, name) in named_children(world, entity) {
        if !wanted.contains(&name) {
            continue;
        }
        let relative = if Mobility::is_movable(world.get::<Mobility>(child)) {
            world.get::<Transform>(child).map(Pose::from_transform)
        } else {
            None
        };

        let source = match world.get::<ChildActor>(child) {
            Some(ChildActor(target)) => {
                if world.get::<SaveActor>(*target).is_some() {
                    warn!(
                        "Sub-component '{}' wraps an actor with its own save hooks; it is saved separately",
                        name
                    );
                    None
                } else {
                    world.get::<SaveComponent>(*target)
                }
            }
            None => world.get::<SaveComponent>(child),
        };

        let fields = match source {
            Some(component) => {
                marks.discover_object(component.fields());
                capture_fields(component.fields(), marks)
            }
            None => Vec::new(),
        };
        out.push(SubValues {
            name,
            relative,
            fields,
        });
    }
    out
}

/// Apply a snapshot to one actor: set the loaded marker, discover, restore
/// fields, restore sub-components, loaded hook.
pub fn apply_actor(
    world: &mut World,
    entity: Entity,
    values: SnapshotValues,
    marks: &mut FieldMarks,
) -> Result<(), SaveError> {
    let is_script = {
        let Some(mut actor) = world.get_mut::<SaveActor>(entity) else {
            return Err(SaveError::MissingCapability(format!("{entity:?}")));
        };
        actor.set_loaded(true);
        marks.discover_object(actor.object());
        apply_fields(actor.object_mut(), marks, values.fields);
        actor.kind() == ActorKind::LevelScript
    };

    if !is_script {
        apply_components(world, entity, values.sub_records, marks);
    }

    if let Some(mut actor) = world.get_mut::<SaveActor>(entity) {
        actor.object_mut().loaded();
    }
    Ok(())
}

fn apply_components(
    world: &mut World,
    entity: Entity,
    sub_records: Vec<SubValues>,
    marks: &mut FieldMarks,
) {
    if sub_records.is_empty() {
        return;
    }
    let children = named_children(world, entity);
    for sub in sub_records {
        // Saved sub-records with no live counterpart are dropped.
        let Some(&(child, _)) = children.iter().find(|(_, name)| *name == sub.name) else {
            debug!("No live sub-component '{}' on {:?}", sub.name, entity);
            continue;
        };

        if let Some(pose) = sub.relative {
            if pose.is_valid() && Mobility::is_movable(world.get::<Mobility>(child)) {
                if let Some(mut transform) = world.get_mut::<Transform>(child) {
                    *transform = pose.to_transform();
                }
            }
        }

        let target = match world.get::<ChildActor>(child).copied() {
            Some(ChildActor(target)) => {
                if world.get::<SaveActor>(target).is_some() {
                    continue;
                }
                target
            }
            None => child,
        };
        if let Some(mut component) = world.get_mut::<SaveComponent>(target) {
            marks.discover_object(component.fields());
            apply_fields(component.fields_mut(), marks, sub.fields);
        }
    }
}
