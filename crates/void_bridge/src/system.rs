//! The script system context
//!
//! [`ScriptSystem`] owns the registry, the identifier counter, the loaded
//! units and the collaborators used to find and load them. One value is
//! created per process (or per test) and shared as an `Arc`.
//!
//! Locks are only held for the duration of a registry read or write. Role
//! loaders, compiler plugins, constructors and hooks always run with every
//! lock released, so they may call back into the system.

use crate::config::ScriptSystemConfig;
use crate::error::{BridgeError, Result};
use crate::host::{NullHost, ScriptHost};
use crate::instance::{InstanceContext, InstanceRef};
use crate::loaders::{process_members, LoadContext, RoleLoader, RoleLoaderSet};
use crate::registry::{DescriptorId, ScriptDescriptor, ScriptRegistry};
use crate::role::{classify, ScriptRole};
use crate::script_type::{TypeHandle, TypeKey};
use crate::staging::{prepare_staging_dir, DirectoryScanner, ShadowCopyStager, UnitDiscovery, UnitStager};
use crate::time::FrameClock;
use crate::unit::{LoadedUnit, NativeUnitLoader, UnitLoader};
use parking_lot::{Mutex, RwLock};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Compiler output may itself contain compilers; stop after this many levels
pub const MAX_COMPILER_DEPTH: usize = 8;

/// Process-scoped script registry and lifecycle manager
pub struct ScriptSystem {
    pub(crate) me: Weak<ScriptSystem>,
    pub(crate) config: ScriptSystemConfig,
    pub(crate) host: Arc<dyn ScriptHost>,
    pub(crate) loaders: RoleLoaderSet,
    pub(crate) unit_loader: Box<dyn UnitLoader>,
    pub(crate) discovery: Box<dyn UnitDiscovery>,
    pub(crate) stager: Box<dyn UnitStager>,
    pub(crate) registry: RwLock<ScriptRegistry>,
    /// Loaded units; dropped only after the registry lets go of their types
    pub(crate) units: Mutex<Vec<LoadedUnit>>,
    pub(crate) next_instance_id: AtomicU64,
    pub(crate) active_game_rules: RwLock<Option<InstanceRef>>,
    pub(crate) deferred_flow_nodes: Mutex<Vec<String>>,
    pub(crate) flow_ready: AtomicBool,
    pub(crate) clock: FrameClock,
}

/// Builder for [`ScriptSystem`]
pub struct ScriptSystemBuilder {
    config: ScriptSystemConfig,
    host: Arc<dyn ScriptHost>,
    loaders: RoleLoaderSet,
    unit_loader: Box<dyn UnitLoader>,
    discovery: Option<Box<dyn UnitDiscovery>>,
    stager: Box<dyn UnitStager>,
}

impl ScriptSystemBuilder {
    fn new() -> Self {
        Self {
            config: ScriptSystemConfig::default(),
            host: Arc::new(NullHost),
            loaders: RoleLoaderSet::with_defaults(),
            unit_loader: Box::new(NativeUnitLoader),
            discovery: None,
            stager: Box::new(ShadowCopyStager),
        }
    }

    pub fn config(mut self, config: ScriptSystemConfig) -> Self {
        self.config = config;
        self
    }

    /// Host engine receiving role registrations
    pub fn host(mut self, host: Arc<dyn ScriptHost>) -> Self {
        self.host = host;
        self
    }

    /// Replace the built-in loader for the loader's role
    pub fn role_loader(mut self, loader: Box<dyn RoleLoader>) -> Self {
        self.loaders.set(loader);
        self
    }

    pub fn unit_loader(mut self, loader: Box<dyn UnitLoader>) -> Self {
        self.unit_loader = loader;
        self
    }

    /// Defaults to a [`DirectoryScanner`] built from the config
    pub fn discovery(mut self, discovery: Box<dyn UnitDiscovery>) -> Self {
        self.discovery = Some(discovery);
        self
    }

    pub fn stager(mut self, stager: Box<dyn UnitStager>) -> Self {
        self.stager = stager;
        self
    }

    pub fn build(self) -> Arc<ScriptSystem> {
        let config = self.config;

        if config.clear_staging_on_start {
            if let Err(e) = prepare_staging_dir(&config.staging_directory, true) {
                log::warn!(
                    "Could not prepare staging directory {}: {}",
                    config.staging_directory.display(),
                    e
                );
            }
        }

        let discovery = self.discovery.unwrap_or_else(|| {
            Box::new(DirectoryScanner::new(config.unit_extensions.clone(), config.recursive_scan))
        });

        Arc::new_cyclic(|me| ScriptSystem {
            me: me.clone(),
            config,
            host: self.host,
            loaders: self.loaders,
            unit_loader: self.unit_loader,
            discovery,
            stager: self.stager,
            registry: RwLock::new(ScriptRegistry::new()),
            units: Mutex::new(Vec::new()),
            next_instance_id: AtomicU64::new(1),
            active_game_rules: RwLock::new(None),
            deferred_flow_nodes: Mutex::new(Vec::new()),
            flow_ready: AtomicBool::new(false),
            clock: FrameClock::new(),
        })
    }
}

impl ScriptSystem {
    pub fn builder() -> ScriptSystemBuilder {
        ScriptSystemBuilder::new()
    }

    /// System with default collaborators and the given config
    pub fn new(config: ScriptSystemConfig) -> Arc<Self> {
        Self::builder().config(config).build()
    }

    pub fn config(&self) -> &ScriptSystemConfig {
        &self.config
    }

    pub fn host(&self) -> &Arc<dyn ScriptHost> {
        &self.host
    }

    /// Shared frame clock
    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    /// Context handed to constructors
    pub fn instance_context(&self) -> InstanceContext {
        InstanceContext::new(self.clock.clone(), self.me.clone())
    }

    // ========== Registration ==========

    /// Register a type, classifying it and running its role loader
    ///
    /// Idempotent: a known type returns its existing descriptor without any
    /// side effects. Types produced by compiler plugins are queued and
    /// registered before this returns.
    pub fn register(&self, ty: TypeHandle) -> Result<ScriptDescriptor> {
        if let Some(existing) = self.descriptor_for(ty.key()) {
            return Ok(existing);
        }

        let key = ty.key().clone();
        let mut queue = VecDeque::new();
        queue.push_back((ty, 0));

        while let Some((next, depth)) = queue.pop_front() {
            self.register_one(next, depth, &mut queue);
        }

        self.descriptor_for(&key)
            .ok_or_else(|| BridgeError::TypeNotFound(key.to_string()))
    }

    fn register_one(&self, ty: TypeHandle, depth: usize, queue: &mut VecDeque<(TypeHandle, usize)>) {
        if self.registry.read().contains(ty.key()) {
            return;
        }

        let class = classify(&ty);
        let mut descriptor = ScriptDescriptor::new(ty.clone(), class.role);

        if class.is_eligible() {
            if class.role == ScriptRole::ScriptCompiler {
                self.run_compiler(&ty, depth, queue);
            } else {
                self.run_loader(&mut descriptor);
            }
            process_members(&ty, self.host.as_ref());
        }

        let id = self.registry.write().insert(descriptor);
        log::debug!("Registered {} as {} (descriptor {})", ty.key(), class.role, id.index());
    }

    fn run_loader(&self, descriptor: &mut ScriptDescriptor) {
        let mut deferred = Vec::new();
        let result = {
            let mut cx = LoadContext::new(
                self.host.as_ref(),
                self.flow_ready.load(Ordering::Acquire),
                &mut deferred,
            );
            self.loaders.dispatch(descriptor, &mut cx)
        };

        if let Err(e) = result {
            log::warn!("{} loader failed for {}: {}", descriptor.role(), descriptor.key(), e);
        }
        if !deferred.is_empty() {
            self.deferred_flow_nodes.lock().extend(deferred);
        }
    }

    /// Compile and queue the output. Failures only end this compiler's segment.
    fn run_compiler(&self, ty: &TypeHandle, depth: usize, queue: &mut VecDeque<(TypeHandle, usize)>) {
        if depth >= MAX_COMPILER_DEPTH {
            log::warn!(
                "Skipping compiler {}: nested more than {} levels deep",
                ty.key(),
                MAX_COMPILER_DEPTH
            );
            return;
        }

        log::info!("Compiling scripts using {}...", ty.name());

        let output = ty.create_compiler().and_then(|mut compiler| {
            compiler
                .compile()
                .map_err(|e| BridgeError::compiler_failed(ty.name(), e.0))
        });

        match output {
            Ok(types) => {
                log::info!("{} produced {} type(s)", ty.name(), types.len());
                queue.extend(types.into_iter().map(|t| (t, depth + 1)));
            }
            Err(e) => log::warn!("{}", e),
        }
    }

    // ========== Lookup & Traversal ==========

    /// Snapshot of one descriptor
    pub fn descriptor(&self, id: DescriptorId) -> Option<ScriptDescriptor> {
        self.registry.read().get(id).cloned()
    }

    /// Snapshot of the descriptor for a type
    pub fn descriptor_for(&self, key: &TypeKey) -> Option<ScriptDescriptor> {
        let registry = self.registry.read();
        registry.find_by_type(key).and_then(|id| registry.get(id)).cloned()
    }

    /// Snapshot of every descriptor selected by `role`
    pub fn descriptors(&self, role: ScriptRole) -> Vec<ScriptDescriptor> {
        self.registry.read().iter_role(role).cloned().collect()
    }

    /// First descriptor matching `predicate`; `Unknown` searches every bucket
    pub fn find_first(
        &self,
        role: ScriptRole,
        mut predicate: impl FnMut(&ScriptDescriptor) -> bool,
    ) -> Option<ScriptDescriptor> {
        self.descriptors(role).into_iter().find(|d| predicate(d))
    }

    /// Apply `action` to a snapshot of the selected descriptors
    pub fn for_each_descriptor(&self, role: ScriptRole, mut action: impl FnMut(&ScriptDescriptor)) {
        for descriptor in self.descriptors(role) {
            action(&descriptor);
        }
    }

    /// Apply `action` to every instance live when the walk began
    ///
    /// Instances removed during the walk are skipped; instances added during
    /// the walk are not visited.
    pub fn for_each_instance(&self, role: ScriptRole, mut action: impl FnMut(&InstanceRef)) {
        let instances = self.registry.read().instances_in(role);
        for instance in instances.iter().filter(|i| !i.is_removed()) {
            action(instance);
        }
    }

    /// Commit a mutated descriptor back at its original bucket position
    pub fn replace(&self, descriptor: ScriptDescriptor) -> Result<DescriptorId> {
        self.registry.write().replace(descriptor)
    }

    /// Number of registered types
    pub fn descriptor_count(&self) -> usize {
        self.registry.read().len()
    }

    /// Number of registered types in the bucket(s) selected by `role`
    pub fn descriptor_count_in(&self, role: ScriptRole) -> usize {
        self.registry.read().bucket_len(role)
    }

    /// Number of live instances
    pub fn instance_count(&self) -> usize {
        self.registry.read().instance_count()
    }
}
