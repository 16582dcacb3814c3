//! Scene descriptions.
//!
//! A scene is a JSON tree of slots:
//!
//! ```json
//! {
//!   "root": {
//!     "name": "Root",
//!     "children": [
//!       {
//!         "name": "Avatar",
//!         "user": "alice",
//!         "object_root": "explicit",
//!         "components": [
//!           { "type": "ValueField<int>", "members": [{ "name": "Value", "value": { "int": 3 } }] }
//!         ]
//!       }
//!     ]
//!   }
//! }
//! ```
//!
//! Reference members name their target by slot path (`{ "slot": "Avatar/Head" }`).
//! Any slot in the scene can be named, including ones declared later.

use std::path::Path;

use serde::{Deserialize, Serialize};
use slotlink_abi::RefId;
use thiserror::Error;

use super::{MemberValue, ObjectRoot, World, WorldError};

#[derive(Error, Debug)]
pub enum SceneError {
    #[error("failed to read scene {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid scene description: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("member {member} refers to unknown slot path {path:?}")]
    UnresolvedReference { member: String, path: String },

    #[error(transparent)]
    World(#[from] WorldError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneConfig {
    pub root: SlotConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlotConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default)]
    pub object_root: ObjectRoot,
    /// Binds the slot as the root of a user with this name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<ComponentConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SlotConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentConfig {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<MemberConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberConfig {
    pub name: String,
    pub value: MemberValueConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberValueConfig {
    Int(i32),
    Float(f32),
    Double(f64),
    Bool(bool),
    String(String),
    /// Path of the referenced slot below the root.
    Slot(String),
}

impl SceneConfig {
    pub fn from_json(text: &str) -> Result<Self, SceneError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SceneError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SceneError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Build a world from this description.
    ///
    /// The slot tree is laid out first so reference members resolve where
    /// they are declared, keeping member order as written.
    pub fn build(&self) -> Result<World, SceneError> {
        let mut world = World::new(self.root.name.clone());
        let mut slots = vec![(world.root(), &self.root)];
        let mut next = 0;
        while next < slots.len() {
            let (slot, config) = slots[next];
            for child in &config.children {
                let id = world.add_slot(slot, child.name.clone())?;
                slots.push((id, child));
            }
            next += 1;
        }
        for (slot, config) in slots {
            populate(&mut world, slot, config)?;
        }
        Ok(world)
    }
}

fn populate(world: &mut World, slot: RefId, config: &SlotConfig) -> Result<(), SceneError> {
    if let Some(tag) = &config.tag {
        world.set_tag(slot, tag.clone())?;
    }
    world.set_object_root(slot, config.object_root)?;
    if let Some(user) = &config.user {
        world.add_user(user.clone(), slot)?;
    }
    for component in &config.components {
        let id = world.attach_component(slot, component.type_name.clone())?;
        for member in &component.members {
            let value = match &member.value {
                MemberValueConfig::Int(v) => MemberValue::Int(*v),
                MemberValueConfig::Float(v) => MemberValue::Float(*v),
                MemberValueConfig::Double(v) => MemberValue::Double(*v),
                MemberValueConfig::Bool(v) => MemberValue::Bool(*v),
                MemberValueConfig::String(v) => MemberValue::Str(v.clone()),
                MemberValueConfig::Slot(path) => {
                    let target =
                        world
                            .slot_by_path(path)
                            .ok_or_else(|| SceneError::UnresolvedReference {
                                member: member.name.clone(),
                                path: path.clone(),
                            })?;
                    MemberValue::Ref(target)
                }
            };
            world.add_member(id, member.name.clone(), value)?;
        }
    }
    Ok(())
}

impl World {
    /// Load a world from a JSON scene file.
    pub fn from_scene_file(path: impl AsRef<Path>) -> Result<World, SceneError> {
        SceneConfig::load(path)?.build()
    }
}
