//! Script registry
//!
//! Descriptors live in an arena and are addressed by a stable
//! [`DescriptorId`]. Each role bucket is an ordered list of ids, so a
//! descriptor keeps its bucket position for its whole lifetime and can be
//! mutated in place.

use crate::error::{BridgeError, Result};
use crate::instance::{InstanceId, InstanceRef};
use crate::role::ScriptRole;
use crate::script_type::{TypeHandle, TypeKey};
use std::collections::HashMap;

/// Stable index of a descriptor in the registry arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DescriptorId(usize);

impl DescriptorId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Registry entry binding one loaded type to its role and live instances
#[derive(Debug, Clone)]
pub struct ScriptDescriptor {
    id: DescriptorId,
    ty: TypeHandle,
    role: ScriptRole,
    script_name: String,
    instances: Vec<InstanceRef>,
}

impl ScriptDescriptor {
    /// Create a detached descriptor with no instances
    pub fn new(ty: TypeHandle, role: ScriptRole) -> Self {
        Self {
            id: DescriptorId(usize::MAX),
            script_name: ty.name().to_string(),
            ty,
            role,
            instances: Vec::new(),
        }
    }

    /// Arena id; only meaningful once inserted
    pub fn id(&self) -> DescriptorId {
        self.id
    }

    pub fn script_type(&self) -> &TypeHandle {
        &self.ty
    }

    pub fn key(&self) -> &TypeKey {
        self.ty.key()
    }

    pub fn role(&self) -> ScriptRole {
        self.role
    }

    /// Name scripts are looked up by; defaults to the type name
    pub fn script_name(&self) -> &str {
        &self.script_name
    }

    pub fn set_script_name(&mut self, name: impl Into<String>) {
        self.script_name = name.into();
    }

    /// Live instances in creation order
    pub fn instances(&self) -> &[InstanceRef] {
        &self.instances
    }

    pub fn instances_mut(&mut self) -> &mut Vec<InstanceRef> {
        &mut self.instances
    }

    /// Check whether `name` selects this descriptor
    ///
    /// Exact script-name match, or the script name contains `name` and the
    /// short type name equals it.
    pub fn matches_name(&self, name: &str) -> bool {
        self.script_name == name || (self.script_name.contains(name) && self.ty.name() == name)
    }

    /// Remove the instance with `id`, returning it
    pub fn remove_instance(&mut self, id: InstanceId) -> Option<InstanceRef> {
        let pos = self.instances.iter().position(|i| i.id() == id)?;
        let instance = self.instances.remove(pos);
        instance.mark_removed();
        Some(instance)
    }
}

/// Mapping from role to ordered descriptors
#[derive(Debug, Default)]
pub struct ScriptRegistry {
    descriptors: Vec<ScriptDescriptor>,
    by_type: HashMap<TypeKey, DescriptorId>,
    buckets: [Vec<DescriptorId>; ScriptRole::COUNT],
}

impl ScriptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a descriptor at the end of its role bucket
    ///
    /// If the type is already known the existing id is returned and the
    /// registry is left untouched.
    pub fn insert(&mut self, mut descriptor: ScriptDescriptor) -> DescriptorId {
        if let Some(&existing) = self.by_type.get(descriptor.key()) {
            return existing;
        }

        let id = DescriptorId(self.descriptors.len());
        descriptor.id = id;
        self.by_type.insert(descriptor.key().clone(), id);
        self.buckets[descriptor.role.index()].push(id);
        self.descriptors.push(descriptor);
        id
    }

    pub fn get(&self, id: DescriptorId) -> Option<&ScriptDescriptor> {
        self.descriptors.get(id.0)
    }

    pub fn get_mut(&mut self, id: DescriptorId) -> Option<&mut ScriptDescriptor> {
        self.descriptors.get_mut(id.0)
    }

    /// Look up a descriptor by type, in any bucket
    pub fn find_by_type(&self, key: &TypeKey) -> Option<DescriptorId> {
        self.by_type.get(key).copied()
    }

    pub fn contains(&self, key: &TypeKey) -> bool {
        self.by_type.contains_key(key)
    }

    /// Ids in the bucket(s) selected by `role`, in order
    pub fn ids_in(&self, role: ScriptRole) -> Vec<DescriptorId> {
        role.scope()
            .iter()
            .flat_map(|r| self.buckets[r.index()].iter().copied())
            .collect()
    }

    /// Iterate descriptors in the bucket(s) selected by `role`
    pub fn iter_role(&self, role: ScriptRole) -> impl Iterator<Item = &ScriptDescriptor> + '_ {
        role.scope()
            .iter()
            .flat_map(move |r| self.buckets[r.index()].iter())
            .filter_map(move |id| self.descriptors.get(id.0))
    }

    /// First descriptor matching `predicate`, searching buckets in role order
    pub fn find_first(
        &self,
        role: ScriptRole,
        mut predicate: impl FnMut(&ScriptDescriptor) -> bool,
    ) -> Option<DescriptorId> {
        self.iter_role(role).find(|&d| predicate(d)).map(|d| d.id)
    }

    /// Commit a detached copy back at the descriptor's original position
    pub fn replace(&mut self, descriptor: ScriptDescriptor) -> Result<DescriptorId> {
        let id = self
            .find_by_type(descriptor.key())
            .ok_or_else(|| BridgeError::TypeNotFound(descriptor.key().to_string()))?;

        let slot = &mut self.descriptors[id.0];
        if slot.role != descriptor.role {
            return Err(BridgeError::InvalidArgument(format!(
                "descriptor for '{}' cannot move from {} to {}",
                descriptor.key(),
                slot.role,
                descriptor.role
            )));
        }

        for old in &slot.instances {
            if !descriptor.instances.iter().any(|i| i.id() == old.id()) {
                old.mark_removed();
            }
        }

        *slot = ScriptDescriptor { id, ..descriptor };
        Ok(id)
    }

    /// Snapshot every instance in the bucket(s) selected by `role`
    pub fn instances_in(&self, role: ScriptRole) -> Vec<InstanceRef> {
        self.iter_role(role)
            .flat_map(|d| d.instances.iter().cloned())
            .collect()
    }

    /// Number of descriptors
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Number of descriptors in one bucket (all buckets for `Unknown`)
    pub fn bucket_len(&self, role: ScriptRole) -> usize {
        role.scope().iter().map(|r| self.buckets[r.index()].len()).sum()
    }

    /// Total live instances
    pub fn instance_count(&self) -> usize {
        self.descriptors.iter().map(|d| d.instances.len()).sum()
    }

    /// Discard every descriptor, marking their instances removed
    pub fn clear(&mut self) {
        for descriptor in &self.descriptors {
            for instance in &descriptor.instances {
                instance.mark_removed();
            }
        }
        self.descriptors.clear();
        self.by_type.clear();
        for bucket in &mut self.buckets {
            bucket.clear();
        }
    }
}
