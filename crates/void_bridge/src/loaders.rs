//! Role loaders
//!
//! One loader per script role performs the one-time setup for a newly
//! classified type. Compiler types are handled by the registration pipeline
//! itself because they feed more types back into classification.

use crate::error::Result;
use crate::host::{EntityClassRegistration, ScriptHost};
use crate::registry::ScriptDescriptor;
use crate::role::{Capabilities, ScriptRole};
use crate::script_type::ScriptType;
use std::collections::HashMap;

/// Category used for flow nodes that do not declare one
pub const DEFAULT_FLOW_CATEGORY: &str = "Mono";

/// Context handed to role loaders
pub struct LoadContext<'a> {
    host: &'a dyn ScriptHost,
    flow_ready: bool,
    deferred_flow_nodes: &'a mut Vec<String>,
}

impl<'a> LoadContext<'a> {
    pub(crate) fn new(host: &'a dyn ScriptHost, flow_ready: bool, deferred_flow_nodes: &'a mut Vec<String>) -> Self {
        Self {
            host,
            flow_ready,
            deferred_flow_nodes,
        }
    }

    pub fn host(&self) -> &dyn ScriptHost {
        self.host
    }

    /// Register a flow node now, or queue it until the flow system is ready
    pub fn register_flow_node(&mut self, path: String) {
        if self.flow_ready {
            self.host.register_flow_node(&path);
        } else {
            log::debug!("Deferring flow node '{}' until post-init", path);
            self.deferred_flow_nodes.push(path);
        }
    }
}

/// Role-specific setup for newly classified types
pub trait RoleLoader: Send + Sync {
    /// Role this loader handles
    fn role(&self) -> ScriptRole;

    /// Run setup; may rename the descriptor's script name
    fn load(&self, descriptor: &mut ScriptDescriptor, cx: &mut LoadContext<'_>) -> Result<()>;
}

fn apply_registered_name(descriptor: &mut ScriptDescriptor) {
    if let Some(name) = descriptor.script_type().registered_name() {
        let name = name.to_string();
        descriptor.set_script_name(name);
    }
}

/// Registers entity classes with the host entity system
pub struct EntityLoader;

impl RoleLoader for EntityLoader {
    fn role(&self) -> ScriptRole {
        ScriptRole::Entity
    }

    fn load(&self, descriptor: &mut ScriptDescriptor, cx: &mut LoadContext<'_>) -> Result<()> {
        apply_registered_name(descriptor);
        let ty = descriptor.script_type();
        let class = EntityClassRegistration {
            name: descriptor.script_name().to_string(),
            category: ty.category().map(str::to_string),
            editor_helper: ty.editor_helper().map(str::to_string),
            editor_icon: ty.editor_icon().map(str::to_string),
            properties: ty.editor_properties().to_vec(),
        };
        cx.host().register_entity_class(&class);
        Ok(())
    }
}

pub struct ActorLoader;

impl RoleLoader for ActorLoader {
    fn role(&self) -> ScriptRole {
        ScriptRole::Actor
    }

    fn load(&self, descriptor: &mut ScriptDescriptor, cx: &mut LoadContext<'_>) -> Result<()> {
        apply_registered_name(descriptor);
        cx.host().register_actor_class(descriptor.script_name());
        Ok(())
    }
}

/// Makes the type available as a game mode
pub struct GameRulesLoader;

impl RoleLoader for GameRulesLoader {
    fn role(&self) -> ScriptRole {
        ScriptRole::GameRules
    }

    fn load(&self, descriptor: &mut ScriptDescriptor, cx: &mut LoadContext<'_>) -> Result<()> {
        apply_registered_name(descriptor);
        cx.host().register_game_rules(descriptor.script_name());
        Ok(())
    }
}

/// Registers a flow node template named `Category:Name`
pub struct FlowNodeLoader;

impl RoleLoader for FlowNodeLoader {
    fn role(&self) -> ScriptRole {
        ScriptRole::FlowNode
    }

    fn load(&self, descriptor: &mut ScriptDescriptor, cx: &mut LoadContext<'_>) -> Result<()> {
        let ty = descriptor.script_type();
        let category = ty.category().unwrap_or(DEFAULT_FLOW_CATEGORY);
        let name = ty.registered_name().unwrap_or(ty.name());
        let path = format!("{}:{}", category, name);

        descriptor.set_script_name(path.clone());
        cx.register_flow_node(path);
        Ok(())
    }
}

pub struct UiEventSystemLoader;

impl RoleLoader for UiEventSystemLoader {
    fn role(&self) -> ScriptRole {
        ScriptRole::UIEventSystem
    }

    fn load(&self, descriptor: &mut ScriptDescriptor, cx: &mut LoadContext<'_>) -> Result<()> {
        apply_registered_name(descriptor);
        cx.host().register_ui_event_system(descriptor.script_name());
        Ok(())
    }
}

/// Loader table keyed by role
pub struct RoleLoaderSet {
    loaders: HashMap<ScriptRole, Box<dyn RoleLoader>>,
}

impl RoleLoaderSet {
    /// Empty table; no role-specific setup runs
    pub fn empty() -> Self {
        Self {
            loaders: HashMap::new(),
        }
    }

    /// Table with the built-in loader for every role
    pub fn with_defaults() -> Self {
        let mut set = Self::empty();
        set.set(Box::new(EntityLoader));
        set.set(Box::new(ActorLoader));
        set.set(Box::new(GameRulesLoader));
        set.set(Box::new(FlowNodeLoader));
        set.set(Box::new(UiEventSystemLoader));
        set
    }

    /// Install a loader, returning the one it replaces
    pub fn set(&mut self, loader: Box<dyn RoleLoader>) -> Option<Box<dyn RoleLoader>> {
        self.loaders.insert(loader.role(), loader)
    }

    pub fn get(&self, role: ScriptRole) -> Option<&dyn RoleLoader> {
        self.loaders.get(&role).map(|l| l.as_ref())
    }

    /// Run the loader matching the descriptor's role, if any
    pub fn dispatch(&self, descriptor: &mut ScriptDescriptor, cx: &mut LoadContext<'_>) -> Result<()> {
        match self.loaders.get(&descriptor.role()) {
            Some(loader) => loader.load(descriptor, cx),
            None => Ok(()),
        }
    }
}

impl Default for RoleLoaderSet {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Register console commands and editor extensions declared by a type
pub fn process_members(ty: &ScriptType, host: &dyn ScriptHost) {
    for command in ty.console_commands() {
        log::debug!("Registering console command '{}' from {}", command.name, ty.key());
        host.register_console_command(&command.name, &command.comment, command.handler.clone());
    }

    if ty.implements(Capabilities::EDITOR_EXTENSION) {
        let name = ty.registered_name().unwrap_or(ty.name());
        log::info!("Registering editor extension: {}", name);
        host.register_editor_extension(name, ty.key());
    }
}
