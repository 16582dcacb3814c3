//! In-memory reference world.
//!
//! A small scene graph with the host-side semantics of every operation on
//! the call surface: slots in a tree, components attached to slots, members
//! on components, and users bound to slots. Every entity is addressed by a
//! [`RefId`] allocated from one counter, so an ID of the wrong kind is as
//! dead as a destroyed one.
//!
//! Queries return `Result<_, ErrorCode>` because they are the host side of
//! the boundary; construction errors (bad scene files, unknown parents) use
//! [`WorldError`].

mod find;
mod invocation;
mod scene;

pub use invocation::SlotCall;
pub use scene::{ComponentConfig, MemberConfig, MemberValueConfig, SceneConfig, SceneError, SlotConfig};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use slotlink_abi::{ErrorCode, RefId, TypeTag};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorldError {
    #[error("no slot {0}")]
    NoSuchSlot(RefId),

    #[error("no component {0}")]
    NoSuchComponent(RefId),

    #[error("cannot destroy the root slot")]
    DestroyRoot,
}

/// Whether a slot marks the root of an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectRoot {
    #[default]
    None,
    /// Inferred by the engine, e.g. from a grabbable component.
    Implicit,
    /// Set deliberately by a user.
    Explicit,
}

/// The value held by a component member.
#[derive(Debug, Clone, PartialEq)]
pub enum MemberValue {
    Int(i32),
    Float(f32),
    Double(f64),
    Bool(bool),
    Str(String),
    /// A reference to another entity, such as a slot or a user.
    Ref(RefId),
}

impl MemberValue {
    /// Only numeric members are reachable through the value accessors; the
    /// rest report `Unknown`.
    pub fn type_tag(&self) -> TypeTag {
        match self {
            MemberValue::Int(_) => TypeTag::Int,
            MemberValue::Float(_) => TypeTag::Float,
            MemberValue::Double(_) => TypeTag::Double,
            _ => TypeTag::Unknown,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Slot {
    pub name: String,
    pub tag: Option<String>,
    pub parent: Option<RefId>,
    pub children: Vec<RefId>,
    pub components: Vec<RefId>,
    pub object_root: ObjectRoot,
    /// Set on the root slot of a user.
    pub user: Option<RefId>,
}

#[derive(Debug, Clone)]
pub struct Component {
    pub type_name: String,
    pub slot: RefId,
    pub members: Vec<(String, RefId)>,
}

#[derive(Debug, Clone)]
pub struct Member {
    pub component: RefId,
    pub value: MemberValue,
}

#[derive(Debug, Clone)]
pub struct User {
    pub name: String,
    pub root: RefId,
}

/// The scene graph.
#[derive(Debug, Clone)]
pub struct World {
    root: RefId,
    next_id: u64,
    slots: HashMap<RefId, Slot>,
    components: HashMap<RefId, Component>,
    members: HashMap<RefId, Member>,
    users: HashMap<RefId, User>,
}

impl World {
    /// A world holding only a root slot named `root_name`.
    pub fn new(root_name: impl Into<String>) -> Self {
        let root = RefId(1);
        let mut slots = HashMap::new();
        slots.insert(root, Slot::new(root_name.into(), None));
        Self {
            root,
            next_id: 2,
            slots,
            components: HashMap::new(),
            members: HashMap::new(),
            users: HashMap::new(),
        }
    }

    fn allocate(&mut self) -> RefId {
        let id = RefId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn root(&self) -> RefId {
        self.root
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    // ------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------

    pub fn add_slot(&mut self, parent: RefId, name: impl Into<String>) -> Result<RefId, WorldError> {
        if !self.slots.contains_key(&parent) {
            return Err(WorldError::NoSuchSlot(parent));
        }
        let id = self.allocate();
        self.slots.insert(id, Slot::new(name.into(), Some(parent)));
        if let Some(p) = self.slots.get_mut(&parent) {
            p.children.push(id);
        }
        Ok(id)
    }

    fn slot_mut_or(&mut self, slot: RefId) -> Result<&mut Slot, WorldError> {
        self.slots.get_mut(&slot).ok_or(WorldError::NoSuchSlot(slot))
    }

    pub fn set_tag(&mut self, slot: RefId, tag: impl Into<String>) -> Result<(), WorldError> {
        self.slot_mut_or(slot)?.tag = Some(tag.into());
        Ok(())
    }

    pub fn set_object_root(&mut self, slot: RefId, flag: ObjectRoot) -> Result<(), WorldError> {
        self.slot_mut_or(slot)?.object_root = flag;
        Ok(())
    }

    /// Create a user whose root is `slot`.
    pub fn add_user(&mut self, name: impl Into<String>, slot: RefId) -> Result<RefId, WorldError> {
        if !self.slots.contains_key(&slot) {
            return Err(WorldError::NoSuchSlot(slot));
        }
        let id = self.allocate();
        self.users.insert(id, User { name: name.into(), root: slot });
        self.slot_mut_or(slot)?.user = Some(id);
        Ok(id)
    }

    pub fn attach_component(
        &mut self,
        slot: RefId,
        type_name: impl Into<String>,
    ) -> Result<RefId, WorldError> {
        if !self.slots.contains_key(&slot) {
            return Err(WorldError::NoSuchSlot(slot));
        }
        let id = self.allocate();
        self.components.insert(
            id,
            Component {
                type_name: type_name.into(),
                slot,
                members: Vec::new(),
            },
        );
        self.slot_mut_or(slot)?.components.push(id);
        Ok(id)
    }

    pub fn add_member(
        &mut self,
        component: RefId,
        name: impl Into<String>,
        value: MemberValue,
    ) -> Result<RefId, WorldError> {
        if !self.components.contains_key(&component) {
            return Err(WorldError::NoSuchComponent(component));
        }
        let id = self.allocate();
        self.members.insert(id, Member { component, value });
        if let Some(c) = self.components.get_mut(&component) {
            c.members.push((name.into(), id));
        }
        Ok(id)
    }

    /// Destroy `slot` and everything under it. Their IDs stay dead.
    pub fn destroy_slot(&mut self, slot: RefId) -> Result<(), WorldError> {
        if slot == self.root {
            return Err(WorldError::DestroyRoot);
        }
        let parent = self
            .slots
            .get(&slot)
            .ok_or(WorldError::NoSuchSlot(slot))?
            .parent;
        if let Some(p) = parent.and_then(|p| self.slots.get_mut(&p)) {
            p.children.retain(|c| *c != slot);
        }

        let mut doomed = vec![slot];
        while let Some(id) = doomed.pop() {
            let Some(data) = self.slots.remove(&id) else {
                continue;
            };
            doomed.extend(data.children);
            for component in data.components {
                if let Some(c) = self.components.remove(&component) {
                    for (_, member) in c.members {
                        self.members.remove(&member);
                    }
                }
            }
            if let Some(user) = data.user {
                self.users.remove(&user);
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    pub fn slot(&self, slot: RefId) -> Result<&Slot, ErrorCode> {
        self.slots.get(&slot).ok_or(ErrorCode::InvalidHandle)
    }

    pub fn component(&self, component: RefId) -> Result<&Component, ErrorCode> {
        self.components.get(&component).ok_or(ErrorCode::InvalidHandle)
    }

    pub fn member(&self, member: RefId) -> Result<&Member, ErrorCode> {
        self.members.get(&member).ok_or(ErrorCode::InvalidHandle)
    }

    pub fn user(&self, user: RefId) -> Result<&User, ErrorCode> {
        self.users.get(&user).ok_or(ErrorCode::InvalidHandle)
    }

    /// Ancestor-or-self chain of `slot`, nearest first.
    fn lineage(&self, slot: RefId) -> Result<impl Iterator<Item = (RefId, &Slot)> + '_, ErrorCode> {
        let first = self.slot(slot)?;
        Ok(std::iter::successors(Some((slot, first)), |(_, s)| {
            s.parent.and_then(|p| self.slots.get(&p).map(|data| (p, data)))
        }))
    }

    /// Resolve a `/`-separated path of slot names below the root.
    pub fn slot_by_path(&self, path: &str) -> Option<RefId> {
        let mut current = self.root;
        for part in path.split('/').filter(|p| !p.is_empty()) {
            current = *self
                .slots
                .get(&current)?
                .children
                .iter()
                .find(|c| self.slots.get(c).is_some_and(|s| s.name == part))?;
        }
        Some(current)
    }

    // ------------------------------------------------------------------
    // Hierarchy navigation
    // ------------------------------------------------------------------

    pub fn parent(&self, slot: RefId) -> Result<RefId, ErrorCode> {
        self.slot(slot)?.parent.ok_or(ErrorCode::NotFound)
    }

    pub fn active_user(&self, slot: RefId) -> Result<RefId, ErrorCode> {
        self.lineage(slot)?
            .find_map(|(_, s)| s.user)
            .ok_or(ErrorCode::NotFound)
    }

    /// The root slot of the active user.
    pub fn active_user_root(&self, slot: RefId) -> Result<RefId, ErrorCode> {
        let user = self.active_user(slot)?;
        Ok(self.user(user)?.root)
    }

    pub fn object_root(&self, slot: RefId, only_explicit: bool) -> Result<RefId, ErrorCode> {
        self.lineage(slot)?
            .find(|(_, s)| match s.object_root {
                ObjectRoot::Explicit => true,
                ObjectRoot::Implicit => !only_explicit,
                ObjectRoot::None => false,
            })
            .map(|(id, _)| id)
            .ok_or(ErrorCode::NotFound)
    }

    pub fn name(&self, slot: RefId) -> Result<&str, ErrorCode> {
        Ok(&self.slot(slot)?.name)
    }

    pub fn set_name(&mut self, slot: RefId, name: &str) -> Result<(), ErrorCode> {
        let data = self.slots.get_mut(&slot).ok_or(ErrorCode::InvalidHandle)?;
        data.name = name.to_string();
        Ok(())
    }

    pub fn children(&self, slot: RefId) -> Result<&[RefId], ErrorCode> {
        Ok(&self.slot(slot)?.children)
    }

    pub fn child(&self, slot: RefId, index: i32) -> Result<RefId, ErrorCode> {
        let children = self.children(slot)?;
        usize::try_from(index)
            .ok()
            .and_then(|i| children.get(i))
            .copied()
            .ok_or(ErrorCode::InvalidArgument)
    }

    // ------------------------------------------------------------------
    // Components
    // ------------------------------------------------------------------

    pub fn components(&self, slot: RefId) -> Result<&[RefId], ErrorCode> {
        Ok(&self.slot(slot)?.components)
    }

    /// First attached component whose type name is exactly `type_name`.
    pub fn find_component(&self, slot: RefId, type_name: &str) -> Result<RefId, ErrorCode> {
        let data = self.slot(slot)?;
        if type_name.is_empty() {
            return Err(ErrorCode::InvalidArgument);
        }
        data.components
            .iter()
            .copied()
            .find(|c| {
                self.components
                    .get(c)
                    .is_some_and(|comp| comp.type_name == type_name)
            })
            .ok_or(ErrorCode::NotFound)
    }

    pub fn component_type_name(&self, component: RefId) -> Result<&str, ErrorCode> {
        Ok(&self.component(component)?.type_name)
    }

    pub fn find_member(&self, component: RefId, name: &str) -> Result<(TypeTag, RefId), ErrorCode> {
        let data = self.component(component)?;
        let (_, id) = data
            .members
            .iter()
            .find(|(n, _)| n == name)
            .ok_or(ErrorCode::NotFound)?;
        Ok((self.member(*id)?.value.type_tag(), *id))
    }

    // ------------------------------------------------------------------
    // Values
    // ------------------------------------------------------------------

    pub fn get_int(&self, member: RefId) -> Result<i32, ErrorCode> {
        match self.member(member)?.value {
            MemberValue::Int(v) => Ok(v),
            _ => Err(ErrorCode::TypeMismatch),
        }
    }

    pub fn get_float(&self, member: RefId) -> Result<f32, ErrorCode> {
        match self.member(member)?.value {
            MemberValue::Float(v) => Ok(v),
            _ => Err(ErrorCode::TypeMismatch),
        }
    }

    pub fn get_double(&self, member: RefId) -> Result<f64, ErrorCode> {
        match self.member(member)?.value {
            MemberValue::Double(v) => Ok(v),
            _ => Err(ErrorCode::TypeMismatch),
        }
    }

    fn value_mut(&mut self, member: RefId) -> Result<&mut MemberValue, ErrorCode> {
        self.members
            .get_mut(&member)
            .map(|m| &mut m.value)
            .ok_or(ErrorCode::InvalidHandle)
    }

    pub fn set_int(&mut self, member: RefId, value: i32) -> Result<(), ErrorCode> {
        match self.value_mut(member)? {
            MemberValue::Int(v) => {
                *v = value;
                Ok(())
            }
            _ => Err(ErrorCode::TypeMismatch),
        }
    }

    pub fn set_float(&mut self, member: RefId, value: f32) -> Result<(), ErrorCode> {
        match self.value_mut(member)? {
            MemberValue::Float(v) => {
                *v = value;
                Ok(())
            }
            _ => Err(ErrorCode::TypeMismatch),
        }
    }

    pub fn set_double(&mut self, member: RefId, value: f64) -> Result<(), ErrorCode> {
        match self.value_mut(member)? {
            MemberValue::Double(v) => {
                *v = value;
                Ok(())
            }
            _ => Err(ErrorCode::TypeMismatch),
        }
    }

    /// Indented outline of the tree, one slot per line.
    pub fn outline(&self) -> String {
        let mut out = String::new();
        let mut stack = vec![(self.root, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            let Some(slot) = self.slots.get(&id) else {
                continue;
            };
            out.push_str(&"  ".repeat(depth));
            out.push_str(&format!("{} [{}]", slot.name, id));
            if let Some(user) = slot.user.and_then(|u| self.users.get(&u)) {
                out.push_str(&format!(" @{}", user.name));
            }
            for c in &slot.components {
                if let Some(comp) = self.components.get(c) {
                    out.push_str(&format!(" <{}>", comp.type_name));
                }
            }
            out.push('\n');
            stack.extend(slot.children.iter().rev().map(|c| (*c, depth + 1)));
        }
        out
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new("Root")
    }
}

impl Slot {
    fn new(name: String, parent: Option<RefId>) -> Self {
        Self {
            name,
            tag: None,
            parent,
            children: Vec::new(),
            components: Vec::new(),
            object_root: ObjectRoot::None,
            user: None,
        }
    }
}
