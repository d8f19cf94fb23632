//! # void_bridge - Script Registry & Lifecycle
//!
//! Discovers script types in dynamically loaded units, classifies them by
//! role, runs role-specific registration with the host engine, and manages
//! the live instances created from them.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐
//! │ Plugin directory│────▶│ ShadowCopyStager│
//! │ (*.so / *.dll)  │     │ (staging dir)   │
//! └─────────────────┘     └────────┬────────┘
//!                                  │
//!                                  ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │  classify()     │◀────│ NativeUnitLoader│
//! │ (capabilities)  │     │  (libloading)   │
//! └────────┬────────┘     └─────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │  RoleLoaderSet  │────▶│   ScriptHost    │ ◀── engine registration
//! └────────┬────────┘     └─────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │ ScriptRegistry  │────▶│ ScriptInstance  │ ◀── on_update / reload hooks
//! │ (per role)      │     │ (per object)    │
//! └─────────────────┘     └─────────────────┘
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use void_bridge::prelude::*;
//!
//! let system = ScriptSystem::new(ScriptSystemConfig::default());
//! system.load_plugins();
//! system.post_init();
//!
//! let rules = system.instantiate("Deathmatch", ScriptRole::GameRules, &[])?;
//!
//! // Once per frame
//! system.on_update(delta_time);
//! ```
//!
//! ## Unit Side
//!
//! ```ignore
//! use void_bridge::prelude::*;
//!
//! #[derive(Default)]
//! struct Door;
//!
//! impl ScriptObject for Door {
//!     fn as_any(&self) -> &dyn std::any::Any { self }
//!     fn as_any_mut(&mut self) -> &mut dyn std::any::Any { self }
//! }
//!
//! fn collect(types: &mut TypeCollector) {
//!     types.add(
//!         ScriptType::builder("Door")
//!             .capabilities(Capabilities::ENTITY)
//!             .default_constructor::<Door>()
//!             .build(),
//!     );
//! }
//!
//! void_bridge::export_script_unit!(collect);
//! ```

mod config;
mod dispatch;
mod error;
mod host;
mod instance;
mod instances;
mod loaders;
mod pipeline;
mod registry;
mod role;
mod script_type;
mod staging;
mod system;
mod time;
mod unit;
mod value;

#[cfg(feature = "hot-reload")]
mod hot_reload;

pub use config::{HotReloadSettings, ScriptSystemConfig, PLUGIN_DIRS_ENV, STAGING_DIR_ENV};
pub use dispatch::DispatchReport;
pub use error::{BridgeError, Result};
pub use host::{EntityClassRegistration, NullHost, ScriptHost};
pub use instance::{
    EntityId, HookError, HookFailure, HookKind, HookResult, InstanceContext, InstanceId, InstanceRef,
    ScriptInstance, ScriptObject,
};
pub use loaders::{
    process_members, ActorLoader, EntityLoader, FlowNodeLoader, GameRulesLoader, LoadContext, RoleLoader,
    RoleLoaderSet, UiEventSystemLoader, DEFAULT_FLOW_CATEGORY,
};
pub use pipeline::{LoadReport, ReloadReport};
pub use registry::{DescriptorId, ScriptDescriptor, ScriptRegistry};
pub use role::{classify, Capabilities, Classification, ScriptRole};
pub use script_type::{
    CommandHandler, CompilerFactory, ConsoleCommand, Constructor, ScriptCompiler, ScriptType, ScriptTypeBuilder,
    TypeHandle, TypeKey,
};
pub use staging::{
    default_unit_extensions, prepare_staging_dir, DirectoryScanner, ShadowCopyStager, UnitDiscovery, UnitStager,
};
pub use system::{ScriptSystem, ScriptSystemBuilder, MAX_COMPILER_DEPTH};
pub use time::{FrameClock, FrameTime};
pub use unit::{
    guarded_collect, CollectTypesFn, LoadedUnit, NativeUnitLoader, TypeCollector, UnitEntryFn, UnitExport, UnitLoader,
    SCRIPT_UNIT_API_VERSION, UNIT_ENTRY_SYMBOL,
};
pub use value::{EditorProperty, PropertyKind, ScriptArgs, ScriptValue};

#[cfg(feature = "hot-reload")]
pub use hot_reload::UnitWatcher;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::ScriptSystemConfig;
    pub use crate::error::{BridgeError, Result};
    pub use crate::host::ScriptHost;
    pub use crate::instance::{EntityId, HookResult, InstanceContext, InstanceId, InstanceRef, ScriptObject};
    pub use crate::role::{Capabilities, ScriptRole};
    pub use crate::script_type::{ScriptCompiler, ScriptType, TypeHandle};
    pub use crate::system::ScriptSystem;
    pub use crate::unit::TypeCollector;
    pub use crate::value::{EditorProperty, PropertyKind, ScriptArgs, ScriptValue};

    #[cfg(feature = "hot-reload")]
    pub use crate::hot_reload::UnitWatcher;
}
