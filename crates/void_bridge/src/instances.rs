//! Instance management on [`ScriptSystem`]

use crate::error::{BridgeError, Result};
use crate::instance::{EntityId, InstanceId, InstanceRef, ScriptInstance, ScriptObject};
use crate::registry::DescriptorId;
use crate::role::ScriptRole;
use crate::script_type::{TypeHandle, TypeKey};
use crate::system::ScriptSystem;
use crate::value::ScriptValue;
use std::sync::atomic::Ordering;
use std::sync::Arc;

impl ScriptSystem {
    // ========== Instance Management ==========

    /// Create an instance of the script named `name`
    ///
    /// `name` matches a descriptor's script name exactly, or a script name
    /// containing it whose short type name equals it. Instances requested
    /// with `ScriptRole::GameRules` become the active game rules.
    pub fn instantiate(&self, name: &str, role: ScriptRole, args: &[ScriptValue]) -> Result<InstanceRef> {
        if name.is_empty() {
            return Err(BridgeError::InvalidArgument("script name must not be empty".into()));
        }

        let descriptor = self
            .find_first(role, |d| d.matches_name(name))
            .ok_or_else(|| BridgeError::ScriptNotFound {
                name: name.to_string(),
                role,
            })?;

        let object = descriptor.script_type().construct(&self.instance_context(), args)?;
        let instance = self.attach(descriptor.id(), None, |id, ty, role| {
            ScriptInstance::new(id, ty, role, object).with_args(args.to_vec())
        })?;

        if role == ScriptRole::GameRules {
            log::debug!("Instance {} of {} is now the active game rules", instance.id(), name);
            *self.active_game_rules.write() = Some(instance.clone());
        }

        Ok(instance)
    }

    /// Attach an already constructed object, registering its type if needed
    pub fn add_instance(&self, ty: &TypeHandle, object: Box<dyn ScriptObject>) -> Result<InstanceRef> {
        let descriptor = self.register(ty.clone())?;
        self.add_instance_to(descriptor.id(), object)
    }

    /// Attach an already constructed object to a known descriptor
    pub fn add_instance_to(&self, descriptor: DescriptorId, object: Box<dyn ScriptObject>) -> Result<InstanceRef> {
        self.attach(descriptor, None, |id, ty, role| ScriptInstance::new(id, ty, role, object))
    }

    /// Append a new instance to a descriptor
    ///
    /// Takes the next identifier unless `id` is given (reload re-attaching a
    /// previous instance). The counter only advances on success.
    pub(crate) fn attach(
        &self,
        descriptor: DescriptorId,
        id: Option<InstanceId>,
        build: impl FnOnce(InstanceId, TypeHandle, ScriptRole) -> ScriptInstance,
    ) -> Result<InstanceRef> {
        let instance = {
            let mut registry = self.registry.write();
            let entry = registry
                .get_mut(descriptor)
                .ok_or_else(|| BridgeError::TypeNotFound(format!("descriptor {}", descriptor.index())))?;

            let id = id.unwrap_or_else(|| InstanceId(self.next_instance_id.fetch_add(1, Ordering::SeqCst)));
            let instance = Arc::new(build(id, entry.script_type().clone(), entry.role()));
            entry.instances_mut().push(instance.clone());
            instance
        };

        log::debug!(
            "Created instance {} of {} ({})",
            instance.id(),
            instance.type_key(),
            instance.role()
        );
        Ok(instance)
    }

    /// Remove an instance by id
    ///
    /// With `ty`, only that type's descriptor is searched and an unknown type
    /// is an error. Otherwise every descriptor in `role` is scanned. A miss is
    /// not an error.
    pub fn remove_instance(
        &self,
        id: InstanceId,
        role: ScriptRole,
        ty: Option<&TypeKey>,
    ) -> Result<Option<InstanceRef>> {
        let removed = {
            let mut registry = self.registry.write();
            match ty {
                Some(key) => {
                    let descriptor = registry
                        .find_by_type(key)
                        .ok_or_else(|| BridgeError::TypeNotFound(key.to_string()))?;
                    registry.get_mut(descriptor).and_then(|d| d.remove_instance(id))
                }
                None => registry
                    .ids_in(role)
                    .into_iter()
                    .find_map(|descriptor| registry.get_mut(descriptor)?.remove_instance(id)),
            }
        };

        if let Some(instance) = &removed {
            let mut active = self.active_game_rules.write();
            if active.as_ref().map(|a| a.id()) == Some(instance.id()) {
                *active = None;
            }
            log::debug!("Removed instance {} of {}", id, instance.type_key());
        }

        Ok(removed)
    }

    /// Look up an instance by id
    pub fn find_instance_by_id(&self, id: InstanceId, role: ScriptRole) -> Option<InstanceRef> {
        let registry = self.registry.read();
        let found = registry
            .iter_role(role)
            .flat_map(|d| d.instances().iter())
            .find(|i| i.id() == id)
            .cloned();
        found
    }

    /// Id of the first instance bound to `entity`
    pub fn find_by_entity(&self, entity: EntityId, role: ScriptRole) -> Option<InstanceId> {
        let registry = self.registry.read();
        let found = registry
            .iter_role(role)
            .flat_map(|d| d.instances().iter())
            .find(|i| i.entity() == Some(entity))
            .map(|i| i.id());
        found
    }

    /// First instance matching `predicate`
    pub fn first_instance(
        &self,
        role: ScriptRole,
        mut predicate: impl FnMut(&ScriptInstance) -> bool,
    ) -> Option<InstanceRef> {
        let instances = self.registry.read().instances_in(role);
        instances
            .into_iter()
            .find(|i| !i.is_removed() && predicate(i))
    }

    /// First instance whose script object is a `T` matching `predicate`
    ///
    /// Objects busy inside one of their own hooks are skipped.
    pub fn find_instance<T: ScriptObject>(
        &self,
        role: ScriptRole,
        mut predicate: impl FnMut(&T) -> bool,
    ) -> Option<InstanceRef> {
        let instances = self.registry.read().instances_in(role);
        instances
            .into_iter()
            .filter(|i| !i.is_removed())
            .find(|i| i.try_downcast(|object: &mut T| predicate(object)) == Some(true))
    }

    /// The most recently instantiated game-rules instance
    pub fn active_game_rules(&self) -> Option<InstanceRef> {
        self.active_game_rules.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use crate::config::ScriptSystemConfig;
    use crate::error::BridgeError;
    use crate::instance::{EntityId, InstanceId, ScriptObject};
    use crate::role::{Capabilities, ScriptRole};
    use crate::script_type::ScriptType;
    use crate::system::ScriptSystem;
    use std::any::Any;
    use std::sync::Arc;

    #[derive(Default)]
    struct Crate {
        entity: u32,
    }

    impl ScriptObject for Crate {
        fn entity_id(&self) -> Option<EntityId> {
            Some(EntityId(self.entity))
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn system() -> Arc<ScriptSystem> {
        ScriptSystem::new(ScriptSystemConfig {
            clear_staging_on_start: false,
            ..ScriptSystemConfig::default()
        })
    }

    #[test]
    fn test_empty_name_is_invalid() {
        let system = system();
        let err = system.instantiate("", ScriptRole::Entity, &[]).unwrap_err();
        assert!(matches!(err, BridgeError::InvalidArgument(_)));
    }

    #[test]
    fn test_add_instance_auto_registers() {
        let system = system();
        let ty = ScriptType::builder("Crate").capabilities(Capabilities::ENTITY).build();

        let instance = system.add_instance(&ty, Box::new(Crate { entity: 9 })).unwrap();
        assert_eq!(instance.id(), InstanceId(1));
        assert_eq!(instance.role(), ScriptRole::Entity);
        assert_eq!(system.find_by_entity(EntityId(9), ScriptRole::Unknown), Some(InstanceId(1)));
        assert_eq!(system.find_by_entity(EntityId(9), ScriptRole::Actor), None);
    }

    #[test]
    fn test_remove_with_explicit_type() {
        let system = system();
        let ty = ScriptType::builder("Crate").capabilities(Capabilities::ENTITY).build();
        let instance = system.add_instance(&ty, Box::new(Crate::default())).unwrap();

        let err = system
            .remove_instance(instance.id(), ScriptRole::Entity, Some(&"Ghost".into()))
            .unwrap_err();
        assert!(matches!(err, BridgeError::TypeNotFound(_)));

        let removed = system
            .remove_instance(instance.id(), ScriptRole::Entity, Some(ty.key()))
            .unwrap();
        assert!(removed.is_some());
        assert!(instance.is_removed());

        // Second removal is a no-op
        assert!(system.remove_instance(instance.id(), ScriptRole::Unknown, None).unwrap().is_none());
    }

    #[test]
    fn test_find_instance_downcasts() {
        let system = system();
        let ty = ScriptType::builder("Crate").capabilities(Capabilities::ENTITY).build();
        system.add_instance(&ty, Box::new(Crate { entity: 1 })).unwrap();
        let second = system.add_instance(&ty, Box::new(Crate { entity: 2 })).unwrap();

        let found = system.find_instance::<Crate>(ScriptRole::Entity, |c| c.entity == 2).unwrap();
        assert_eq!(found.id(), second.id());
        assert!(system.find_instance::<Crate>(ScriptRole::Entity, |c| c.entity == 3).is_none());
    }
}
