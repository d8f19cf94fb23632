//! Live script instances
//!
//! Every object created from a script type is wrapped in a [`ScriptInstance`]
//! record that carries its process-unique id, its update flag and the
//! role payload (owning entity). The script object itself sits behind a
//! mutex so hooks can run while the registry is being walked.

use crate::role::ScriptRole;
use crate::script_type::{TypeHandle, TypeKey};
use crate::system::ScriptSystem;
use crate::time::FrameClock;
use crate::value::ScriptValue;
use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};
use thiserror::Error;

/// Process-unique identifier of a script instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(pub u64);

impl InstanceId {
    /// Create a new instance ID
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Host engine entity identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error raised by script-authored code
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct HookError(pub String);

impl From<&str> for HookError {
    fn from(s: &str) -> Self {
        HookError(s.to_string())
    }
}

impl From<String> for HookError {
    fn from(s: String) -> Self {
        HookError(s)
    }
}

/// Result of a script hook
pub type HookResult<T = ()> = std::result::Result<T, HookError>;

/// Behaviour implemented by script objects
pub trait ScriptObject: Any + Send {
    /// Whether the frame dispatcher should call [`ScriptObject::on_update`]
    fn receives_updates(&self) -> bool {
        false
    }

    /// Owning entity, for entity and actor scripts
    fn entity_id(&self) -> Option<EntityId> {
        None
    }

    /// Per-frame update. Delta time is read from the [`FrameClock`].
    fn on_update(&mut self) -> HookResult {
        Ok(())
    }

    /// Called on every live instance after a reload completes
    fn on_script_reload(&mut self) -> HookResult {
        Ok(())
    }

    /// State to carry across a reload
    fn save_state(&self) -> Option<Vec<u8>> {
        None
    }

    /// Restore state saved before a reload
    fn restore_state(&mut self, state: &[u8]) -> HookResult {
        let _ = state;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Which hook an invocation targeted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    Update,
    ScriptReload,
    RestoreState,
}

impl HookKind {
    pub fn as_str(self) -> &'static str {
        match self {
            HookKind::Update => "update",
            HookKind::ScriptReload => "script reload",
            HookKind::RestoreState => "restore state",
        }
    }
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A contained hook failure
#[derive(Debug, Clone, Error)]
#[error("{hook} hook of '{type_name}' (instance {instance}) failed: {message}")]
pub struct HookFailure {
    pub instance: InstanceId,
    pub type_name: String,
    pub hook: HookKind,
    pub message: String,
}

impl From<HookFailure> for crate::error::BridgeError {
    fn from(f: HookFailure) -> Self {
        crate::error::BridgeError::HookFailed {
            type_name: f.type_name,
            instance: f.instance,
            hook: f.hook.as_str(),
            message: f.message,
        }
    }
}

/// Shared handle to a live instance
pub type InstanceRef = Arc<ScriptInstance>;

/// Registry record for one live script object
pub struct ScriptInstance {
    id: InstanceId,
    ty: TypeHandle,
    role: ScriptRole,
    entity: Option<EntityId>,
    receives_updates: AtomicBool,
    removed: AtomicBool,
    /// Arguments the object was constructed with, replayed on reload
    args: Vec<ScriptValue>,
    /// Thread currently inside one of the object's hooks
    hook_thread: Mutex<Option<ThreadId>>,
    object: Mutex<Box<dyn ScriptObject>>,
}

impl ScriptInstance {
    pub(crate) fn new(id: InstanceId, ty: TypeHandle, role: ScriptRole, object: Box<dyn ScriptObject>) -> Self {
        Self {
            id,
            entity: object.entity_id(),
            receives_updates: AtomicBool::new(object.receives_updates()),
            removed: AtomicBool::new(false),
            args: Vec::new(),
            hook_thread: Mutex::new(None),
            ty,
            role,
            object: Mutex::new(object),
        }
    }

    pub(crate) fn with_args(mut self, args: Vec<ScriptValue>) -> Self {
        self.args = args;
        self
    }

    /// Re-create an instance that existed before a reload
    pub(crate) fn restored(
        id: InstanceId,
        ty: TypeHandle,
        role: ScriptRole,
        object: Box<dyn ScriptObject>,
        entity: Option<EntityId>,
        receives_updates: bool,
    ) -> Self {
        let mut instance = Self::new(id, ty, role, object);
        instance.entity = entity.or(instance.entity);
        instance.receives_updates = AtomicBool::new(receives_updates);
        instance
    }

    /// Get the instance ID
    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// Type this instance was created from
    pub fn script_type(&self) -> &TypeHandle {
        &self.ty
    }

    /// Registry key of the originating type
    pub fn type_key(&self) -> &TypeKey {
        self.ty.key()
    }

    /// Short name of the originating type
    pub fn type_name(&self) -> &str {
        self.ty.name()
    }

    /// Constructor arguments (empty for objects attached directly)
    pub fn construction_args(&self) -> &[ScriptValue] {
        &self.args
    }

    /// Role of the owning descriptor
    pub fn role(&self) -> ScriptRole {
        self.role
    }

    /// Owning entity, if any
    pub fn entity(&self) -> Option<EntityId> {
        self.entity
    }

    /// Check if the instance receives per-frame updates
    pub fn receives_updates(&self) -> bool {
        self.receives_updates.load(Ordering::Relaxed)
    }

    /// Enable or disable per-frame updates
    pub fn set_receives_updates(&self, enabled: bool) {
        self.receives_updates.store(enabled, Ordering::Relaxed);
    }

    /// Whether the instance has been removed from the registry
    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::Acquire)
    }

    pub(crate) fn mark_removed(&self) {
        self.removed.store(true, Ordering::Release);
    }

    /// Run a closure against the script object
    ///
    /// Waits while another thread is inside one of the object's hooks.
    /// Returns `None` when called from within the object's own hook.
    pub fn with_object<R>(&self, f: impl FnOnce(&mut dyn ScriptObject) -> R) -> Option<R> {
        let mut guard = self.lock_object()?;
        Some(f(&mut **guard))
    }

    /// Run a closure against the concrete script object type
    ///
    /// Same locking as [`ScriptInstance::with_object`].
    pub fn downcast<T: ScriptObject, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut guard = self.lock_object()?;
        guard.as_any_mut().downcast_mut::<T>().map(f)
    }

    /// Like [`ScriptInstance::downcast`] but skips objects that are busy
    pub fn try_downcast<T: ScriptObject, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut guard = self.object.try_lock()?;
        guard.as_any_mut().downcast_mut::<T>().map(f)
    }

    fn lock_object(&self) -> Option<MutexGuard<'_, Box<dyn ScriptObject>>> {
        if *self.hook_thread.lock() == Some(thread::current().id()) {
            return None;
        }
        Some(self.object.lock())
    }

    /// Run `f` with the current thread recorded as inside a hook
    fn in_hook<R>(&self, f: impl FnOnce() -> R) -> R {
        *self.hook_thread.lock() = Some(thread::current().id());
        let result = f();
        *self.hook_thread.lock() = None;
        result
    }

    pub(crate) fn save_state(&self) -> Option<Vec<u8>> {
        self.object.try_lock().and_then(|object| object.save_state())
    }

    /// Invoke a hook, capturing errors and panics as a [`HookFailure`]
    pub(crate) fn invoke(&self, hook: HookKind) -> Result<(), HookFailure> {
        let Some(mut object) = self.object.try_lock() else {
            return Err(self.failure(hook, "instance is already running a hook".into()));
        };

        let outcome = self.in_hook(|| {
            panic::catch_unwind(AssertUnwindSafe(|| match hook {
                HookKind::Update => object.on_update(),
                HookKind::ScriptReload => object.on_script_reload(),
                HookKind::RestoreState => Ok(()),
            }))
        });

        match outcome {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(self.failure(hook, e.0)),
            Err(payload) => Err(self.failure(hook, panic_message(payload.as_ref()))),
        }
    }

    /// Restore saved state, capturing errors and panics
    pub(crate) fn restore(&self, state: &[u8]) -> Result<(), HookFailure> {
        let mut object = self.object.lock();
        match self.in_hook(|| panic::catch_unwind(AssertUnwindSafe(|| object.restore_state(state)))) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(self.failure(HookKind::RestoreState, e.0)),
            Err(payload) => Err(self.failure(HookKind::RestoreState, panic_message(payload.as_ref()))),
        }
    }

    fn failure(&self, hook: HookKind, message: String) -> HookFailure {
        HookFailure {
            instance: self.id,
            type_name: self.ty.name().to_string(),
            hook,
            message,
        }
    }
}

impl fmt::Debug for ScriptInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptInstance")
            .field("id", &self.id)
            .field("type", &self.ty.key())
            .field("role", &self.role)
            .field("entity", &self.entity)
            .field("receives_updates", &self.receives_updates())
            .field("removed", &self.is_removed())
            .finish()
    }
}

/// Extract a readable message from a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

/// Context handed to type constructors
#[derive(Clone)]
pub struct InstanceContext {
    clock: FrameClock,
    system: Weak<ScriptSystem>,
}

impl InstanceContext {
    pub(crate) fn new(clock: FrameClock, system: Weak<ScriptSystem>) -> Self {
        Self { clock, system }
    }

    /// Context not bound to any script system
    pub fn detached(clock: FrameClock) -> Self {
        Self {
            clock,
            system: Weak::new(),
        }
    }

    /// Shared frame clock
    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    /// The owning script system, if it is still alive
    pub fn system(&self) -> Option<Arc<ScriptSystem>> {
        self.system.upgrade()
    }
}
