//! Shared fixtures for void_bridge integration tests

#![allow(dead_code)]

use parking_lot::Mutex;
use std::any::Any;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use void_bridge::*;

// ========== Host ==========

/// Host that records every registration as `kind:name`
#[derive(Default)]
pub struct RecordingHost {
    events: Mutex<Vec<String>>,
    commands: Mutex<HashMap<String, CommandHandler>>,
}

impl RecordingHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.events.lock().iter().filter(|e| *e == event).count()
    }

    pub fn has(&self, event: &str) -> bool {
        self.count(event) > 0
    }

    /// Invoke a registered console command
    pub fn run_command(&self, name: &str, args: &[String]) -> bool {
        let handler = self.commands.lock().get(name).cloned();
        match handler {
            Some(handler) => {
                handler(args);
                true
            }
            None => false,
        }
    }

    fn record(&self, event: String) {
        self.events.lock().push(event);
    }
}

impl ScriptHost for RecordingHost {
    fn register_entity_class(&self, class: &EntityClassRegistration) {
        self.record(format!("entity:{}", class.name));
    }

    fn register_actor_class(&self, name: &str) {
        self.record(format!("actor:{}", name));
    }

    fn register_game_rules(&self, name: &str) {
        self.record(format!("rules:{}", name));
    }

    fn register_flow_node(&self, path: &str) {
        self.record(format!("flow:{}", path));
    }

    fn register_ui_event_system(&self, name: &str) {
        self.record(format!("ui:{}", name));
    }

    fn register_console_command(&self, name: &str, _comment: &str, handler: CommandHandler) {
        self.record(format!("command:{}", name));
        self.commands.lock().insert(name.to_string(), handler);
    }

    fn register_editor_extension(&self, name: &str, _ty: &TypeKey) {
        self.record(format!("extension:{}", name));
    }
}

// ========== Script Objects ==========

macro_rules! impl_any {
    () => {
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    };
}

/// Plain entity script with no hooks
#[derive(Default)]
pub struct Prop;

impl ScriptObject for Prop {
    impl_any!();
}

/// Counts update and reload hooks through shared counters
pub struct Tracker {
    pub updates: Arc<AtomicUsize>,
    pub reloads: Arc<AtomicUsize>,
    pub receives_updates: bool,
    pub entity: Option<EntityId>,
    pub health: i64,
}

impl ScriptObject for Tracker {
    fn receives_updates(&self) -> bool {
        self.receives_updates
    }

    fn entity_id(&self) -> Option<EntityId> {
        self.entity
    }

    fn on_update(&mut self) -> HookResult {
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn on_script_reload(&mut self) -> HookResult {
        self.reloads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn save_state(&self) -> Option<Vec<u8>> {
        Some(self.health.to_le_bytes().to_vec())
    }

    fn restore_state(&mut self, state: &[u8]) -> HookResult {
        let bytes: [u8; 8] = state.try_into().map_err(|_| HookError::from("bad state"))?;
        self.health = i64::from_le_bytes(bytes);
        Ok(())
    }

    impl_any!();
}

/// Shared counters behind a tracker type
#[derive(Clone, Default)]
pub struct Counters {
    pub updates: Arc<AtomicUsize>,
    pub reloads: Arc<AtomicUsize>,
}

impl Counters {
    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn reloads(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }
}

/// Tracker type whose constructor takes `[receives_updates: bool, entity: entity]`
pub fn tracker_type(name: &str, caps: Capabilities, counters: &Counters) -> TypeHandle {
    let counters = counters.clone();
    ScriptType::builder(name)
        .capabilities(caps)
        .constructor(move |_, args| {
            Ok(Box::new(Tracker {
                updates: counters.updates.clone(),
                reloads: counters.reloads.clone(),
                receives_updates: args.bool_arg(0).unwrap_or(true),
                entity: args.entity_arg(1),
                health: 100,
            }))
        })
        .build()
}

/// Update hook that fails or panics
pub struct Faulty {
    pub panics: bool,
}

impl ScriptObject for Faulty {
    fn receives_updates(&self) -> bool {
        true
    }

    fn on_update(&mut self) -> HookResult {
        if self.panics {
            panic!("faulty script panicked");
        }
        Err("faulty script failed".into())
    }

    fn on_script_reload(&mut self) -> HookResult {
        Err("faulty reload".into())
    }

    impl_any!();
}

pub fn faulty_type(panics: bool) -> TypeHandle {
    ScriptType::builder(if panics { "Panicky" } else { "Faulty" })
        .capabilities(Capabilities::ENTITY)
        .constructor(move |_, _| Ok(Box::new(Faulty { panics })))
        .build()
}

/// Entity whose update spawns a `Prop` and removes itself
pub struct Spawner {
    pub cx: InstanceContext,
    pub spawned: Arc<AtomicUsize>,
}

impl ScriptObject for Spawner {
    fn receives_updates(&self) -> bool {
        true
    }

    fn on_update(&mut self) -> HookResult {
        let system = self.cx.system().ok_or_else(|| HookError::from("system gone"))?;
        system
            .instantiate("Prop", ScriptRole::Entity, &[])
            .map_err(|e| HookError(e.to_string()))?;
        self.spawned.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    impl_any!();
}

pub fn prop_type() -> TypeHandle {
    ScriptType::builder("Prop")
        .capabilities(Capabilities::ENTITY)
        .default_constructor::<Prop>()
        .build()
}

/// Compiler yielding a fixed set of types
pub struct FixedCompiler {
    pub output: Vec<TypeHandle>,
}

impl ScriptCompiler for FixedCompiler {
    fn compile(&mut self) -> HookResult<Vec<TypeHandle>> {
        Ok(self.output.clone())
    }
}

// ========== Units ==========

pub type TypeFactory = Arc<dyn Fn() -> Vec<TypeHandle> + Send + Sync>;

/// Unit loader serving in-process types for known unit stems
///
/// Staged copies may be renamed `stem_N.ext`, so lookups match on the stem
/// prefix. Unknown units fall through to [`NativeUnitLoader`].
#[derive(Clone, Default)]
pub struct InProcessUnits {
    units: Arc<Mutex<HashMap<String, TypeFactory>>>,
}

impl InProcessUnits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<F>(&self, stem: &str, factory: F)
    where
        F: Fn() -> Vec<TypeHandle> + Send + Sync + 'static,
    {
        self.units.lock().insert(stem.to_string(), Arc::new(factory));
    }

    fn factory_for(&self, path: &Path) -> Option<TypeFactory> {
        let stem = path.file_stem()?.to_str()?;
        let units = self.units.lock();
        units
            .iter()
            .find(|(known, _)| stem == known.as_str() || stem.starts_with(&format!("{}_", known)))
            .map(|(_, factory)| factory.clone())
    }
}

impl UnitLoader for InProcessUnits {
    fn load(&self, path: &Path) -> Result<LoadedUnit> {
        match self.factory_for(path) {
            Some(factory) => Ok(LoadedUnit::from_types(path, factory())),
            None => NativeUnitLoader.load(path),
        }
    }
}

/// Unit loader whose single type is named after the unit file's contents
#[derive(Clone, Default)]
pub struct ContentsLoader {
    staged: Arc<Mutex<Vec<PathBuf>>>,
}

impl ContentsLoader {
    /// Paths handed to the loader, in load order
    pub fn staged(&self) -> Vec<PathBuf> {
        self.staged.lock().clone()
    }
}

impl UnitLoader for ContentsLoader {
    fn load(&self, path: &Path) -> Result<LoadedUnit> {
        let name = std::fs::read_to_string(path)?;
        self.staged.lock().push(path.to_path_buf());
        let ty = ScriptType::builder(name.trim())
            .capabilities(Capabilities::ENTITY)
            .default_constructor::<Prop>()
            .build();
        Ok(LoadedUnit::from_types(path, vec![ty]))
    }
}

/// Write a placeholder unit file
pub fn write_unit(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

// ========== Systems ==========

pub struct Fixture {
    pub system: Arc<ScriptSystem>,
    pub host: Arc<RecordingHost>,
    pub units: InProcessUnits,
    pub plugins: PathBuf,
    _dir: TempDir,
}

/// System with a recording host, in-process units and temp directories
pub fn fixture() -> Fixture {
    fixture_with(|config| config)
}

pub fn fixture_with(adjust: impl FnOnce(ScriptSystemConfig) -> ScriptSystemConfig) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let plugins = dir.path().join("plugins");
    std::fs::create_dir_all(&plugins).unwrap();

    let config = ScriptSystemConfig {
        plugin_directories: vec![plugins.clone()],
        staging_directory: dir.path().join("staging"),
        ..ScriptSystemConfig::default()
    };

    let host = RecordingHost::new();
    let units = InProcessUnits::new();
    let system = ScriptSystem::builder()
        .config(adjust(config))
        .host(host.clone())
        .unit_loader(Box::new(units.clone()))
        .build();

    Fixture {
        system,
        host,
        units,
        plugins,
        _dir: dir,
    }
}

/// Shared flag for toggling a type in and out of a unit
pub fn flag(value: bool) -> Arc<AtomicBool> {
    Arc::new(AtomicBool::new(value))
}
