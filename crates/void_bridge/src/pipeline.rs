//! Unit loading and reload on [`ScriptSystem`]

use crate::error::{BridgeError, Result};
use crate::instance::{EntityId, HookFailure, InstanceId, ScriptInstance};
use crate::role::ScriptRole;
use crate::script_type::TypeKey;
use crate::system::ScriptSystem;
use crate::value::ScriptValue;
use std::path::{Path, PathBuf};

#[cfg(feature = "hot-reload")]
use crate::hot_reload::UnitWatcher;

/// Debug symbol files staged next to a unit when present
const DEBUG_SYMBOL_EXTENSIONS: [&str; 2] = ["pdb", "debug"];

/// Outcome of loading one or more units
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Units that loaded (original paths)
    pub loaded: Vec<PathBuf>,
    /// Units that were skipped, with the reason
    pub failed: Vec<(PathBuf, String)>,
    /// Types handed to the registry
    pub types: usize,
}

impl LoadReport {
    fn merge(&mut self, other: LoadReport) {
        self.loaded.extend(other.loaded);
        self.failed.extend(other.failed);
        self.types += other.types;
    }
}

/// Outcome of a full reload
#[derive(Debug, Default)]
pub struct ReloadReport {
    pub load: LoadReport,
    /// Instances re-created with their previous id
    pub restored: usize,
    /// Instances whose type vanished or could not be re-created
    pub dropped: Vec<(InstanceId, TypeKey)>,
    /// Restore and reload hook failures
    pub failures: Vec<HookFailure>,
}

/// What survives a reload for one instance
struct SavedInstance {
    id: InstanceId,
    key: TypeKey,
    entity: Option<EntityId>,
    receives_updates: bool,
    args: Vec<ScriptValue>,
    state: Option<Vec<u8>>,
    active_game_rules: bool,
}

impl ScriptSystem {
    // ========== Unit Loading ==========

    /// Stage and load one unit, registering every type it contains
    ///
    /// Returns the number of types the unit exposed.
    pub fn load_unit(&self, path: impl AsRef<Path>) -> Result<usize> {
        self.load_unit_staged(path.as_ref(), true)
    }

    fn load_unit_staged(&self, path: &Path, overwrite: bool) -> Result<usize> {
        let staged = self.stage_unit(path, overwrite)?;
        let unit = self.unit_loader.load(&staged)?;
        let types = unit.types().to_vec();
        self.units.lock().push(unit);

        for ty in &types {
            if let Err(e) = self.register(ty.clone()) {
                log::warn!("Failed to register {} from {}: {}", ty.key(), path.display(), e);
            }
        }

        log::info!("Loaded {} type(s) from {}", types.len(), path.display());
        Ok(types.len())
    }

    fn stage_unit(&self, path: &Path, overwrite: bool) -> Result<PathBuf> {
        let file_name = path
            .file_name()
            .ok_or_else(|| BridgeError::InvalidArgument(format!("'{}' is not a file path", path.display())))?;

        let staging = &self.config.staging_directory;
        std::fs::create_dir_all(staging)?;

        // A copy still held by a loaded unit is mapped; never write over it
        let target = staging.join(file_name);
        let overwrite = overwrite && !self.is_staged_in_use(&target);
        let staged = self
            .stager
            .stage_file(path, &target, overwrite)
            .map_err(|e| BridgeError::load_failure(path, format!("staging failed: {}", e)))?;
        if staged != target {
            log::debug!("Staged {} as {}", path.display(), staged.display());
        }

        self.stage_debug_symbols(path, &staged);
        Ok(staged)
    }

    fn is_staged_in_use(&self, staged: &Path) -> bool {
        self.units.lock().iter().any(|unit| unit.path() == staged)
    }

    fn stage_debug_symbols(&self, unit: &Path, staged: &Path) {
        for ext in DEBUG_SYMBOL_EXTENSIONS {
            let symbols = unit.with_extension(ext);
            if !symbols.is_file() {
                continue;
            }
            if let Err(e) = self.stager.stage_file(&symbols, &staged.with_extension(ext), true) {
                log::debug!("Could not stage debug symbols {}: {}", symbols.display(), e);
            }
        }
    }

    /// Load every unit in a directory
    ///
    /// A missing directory is an empty plugin set. Units that fail to load
    /// are logged and skipped; nothing here returns an error.
    pub fn load_directory(&self, directory: impl AsRef<Path>) -> LoadReport {
        self.load_directory_staged(directory.as_ref(), true)
    }

    fn load_directory_staged(&self, directory: &Path, overwrite: bool) -> LoadReport {
        let mut report = LoadReport::default();

        if !directory.is_dir() {
            log::info!("Skipping load of plugins in {}, directory does not exist", directory.display());
            return report;
        }

        let units = match self.discovery.list_loadable_units(directory) {
            Ok(units) => units,
            Err(e) => {
                log::warn!("Could not list units in {}: {}", directory.display(), e);
                return report;
            }
        };

        for unit in units {
            match self.load_unit_staged(&unit, overwrite) {
                Ok(types) => {
                    report.types += types;
                    report.loaded.push(unit);
                }
                Err(e) => {
                    if e.is_load_failure() {
                        log::warn!("Plugin loading failed for {}: {}", unit.display(), e);
                    } else {
                        log::error!("Error loading {}: {}", unit.display(), e);
                    }
                    report.failed.push((unit, e.to_string()));
                }
            }
        }

        report
    }

    /// Load every configured plugin directory
    pub fn load_plugins(&self) -> LoadReport {
        self.load_plugins_staged(true)
    }

    fn load_plugins_staged(&self, overwrite: bool) -> LoadReport {
        let mut report = LoadReport::default();
        for dir in &self.config.plugin_directories {
            report.merge(self.load_directory_staged(dir, overwrite));
        }
        report
    }

    /// Discard the registry and unload every unit
    ///
    /// The identifier counter keeps counting. Instance handles held
    /// elsewhere must be dropped before their unit's code goes away.
    pub fn reset(&self) {
        // Taken out first so script objects drop with no lock held
        let mut registry = std::mem::take(&mut *self.registry.write());
        registry.clear();
        drop(registry);

        *self.active_game_rules.write() = None;
        self.deferred_flow_nodes.lock().clear();

        let units = std::mem::take(&mut *self.units.lock());
        log::debug!("Unloading {} unit(s)", units.len());
        drop(units);
    }

    // ========== Hot-Reload Support ==========

    /// Rebuild the registry from the plugin directories
    ///
    /// Live instances are re-created from their re-registered type with the
    /// same id, constructor arguments, update flag and entity, and saved
    /// state is restored. Every instance then gets its reload hook.
    pub fn reload(&self) -> ReloadReport {
        let saved = self.save_instances();
        log::info!("Reloading scripts ({} live instance(s))", saved.len());

        self.reset();

        let mut report = ReloadReport {
            load: self.load_plugins_staged(false),
            ..ReloadReport::default()
        };

        for entry in saved {
            self.restore_instance(entry, &mut report);
        }

        let broadcast = self.on_post_reload();
        report.failures.extend(broadcast.failures);

        log::info!(
            "Reload complete: {} restored, {} dropped",
            report.restored,
            report.dropped.len()
        );
        report
    }

    fn save_instances(&self) -> Vec<SavedInstance> {
        let active = self.active_game_rules.read().as_ref().map(|i| i.id());
        let instances = self.registry.read().instances_in(ScriptRole::Unknown);

        instances
            .iter()
            .map(|instance| SavedInstance {
                id: instance.id(),
                key: instance.type_key().clone(),
                entity: instance.entity(),
                receives_updates: instance.receives_updates(),
                args: instance.construction_args().to_vec(),
                state: instance.save_state(),
                active_game_rules: active == Some(instance.id()),
            })
            .collect()
    }

    fn restore_instance(&self, saved: SavedInstance, report: &mut ReloadReport) {
        let Some(descriptor) = self.descriptor_for(&saved.key) else {
            log::warn!("Dropping instance {}: type {} is gone after reload", saved.id, saved.key);
            report.dropped.push((saved.id, saved.key));
            return;
        };

        let object = match descriptor.script_type().construct(&self.instance_context(), &saved.args) {
            Ok(object) => object,
            Err(e) => {
                log::warn!("Dropping instance {}: {}", saved.id, e);
                report.dropped.push((saved.id, saved.key));
                return;
            }
        };

        let (entity, receives_updates) = (saved.entity, saved.receives_updates);
        let args = saved.args.clone();
        let instance = match self.attach(descriptor.id(), Some(saved.id), |id, ty, role| {
            ScriptInstance::restored(id, ty, role, object, entity, receives_updates).with_args(args)
        }) {
            Ok(instance) => instance,
            Err(e) => {
                log::warn!("Dropping instance {}: {}", saved.id, e);
                report.dropped.push((saved.id, saved.key));
                return;
            }
        };

        if let Some(state) = &saved.state {
            if let Err(failure) = instance.restore(state) {
                log::warn!("{}", failure);
                report.failures.push(failure);
            }
        }

        if saved.active_game_rules {
            *self.active_game_rules.write() = Some(instance);
        }
        report.restored += 1;
    }

    /// Watcher over the configured plugin directories that exist
    #[cfg(feature = "hot-reload")]
    pub fn create_watcher(&self) -> Result<UnitWatcher> {
        let mut watcher = UnitWatcher::new(&self.config.hot_reload, self.config.unit_extensions.clone())?;
        for dir in self.config.plugin_directories.iter().filter(|d| d.is_dir()) {
            watcher.watch_directory(dir)?;
        }
        Ok(watcher)
    }

    /// Reload once watched unit changes have settled
    #[cfg(feature = "hot-reload")]
    pub fn poll_hot_reload(&self, watcher: &UnitWatcher) -> Option<ReloadReport> {
        let changed = watcher.poll();
        if changed.is_empty() {
            return None;
        }

        for path in &changed {
            log::info!("Unit changed: {}", path.display());
        }
        Some(self.reload())
    }
}
