//! Interface the bridge calls on the hosting engine
//!
//! Everything here is fire-and-forget: the bridge never consults a return
//! value. Logging goes through the `log` facade instead of this trait.

use crate::script_type::{CommandHandler, TypeKey};
use crate::value::EditorProperty;

/// Entity class registration sent to the host entity system
#[derive(Debug, Clone)]
pub struct EntityClassRegistration {
    pub name: String,
    pub category: Option<String>,
    pub editor_helper: Option<String>,
    pub editor_icon: Option<String>,
    pub properties: Vec<EditorProperty>,
}

/// Hooks into the hosting engine
pub trait ScriptHost: Send + Sync {
    /// Register an entity class with the host entity system
    fn register_entity_class(&self, class: &EntityClassRegistration) {
        let _ = class;
    }

    /// Register an actor class with the host game framework
    fn register_actor_class(&self, name: &str) {
        let _ = name;
    }

    /// Register a game mode backed by a game-rules type
    fn register_game_rules(&self, name: &str) {
        let _ = name;
    }

    /// Register a flow-graph node template
    fn register_flow_node(&self, path: &str) {
        let _ = path;
    }

    /// Register a UI event system
    fn register_ui_event_system(&self, name: &str) {
        let _ = name;
    }

    /// Register a console command
    fn register_console_command(&self, name: &str, comment: &str, handler: CommandHandler) {
        let _ = (name, comment, handler);
    }

    /// Make an editor extension form available
    fn register_editor_extension(&self, name: &str, ty: &TypeKey) {
        let _ = (name, ty);
    }
}

/// Host that ignores every registration
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHost;

impl ScriptHost for NullHost {}
