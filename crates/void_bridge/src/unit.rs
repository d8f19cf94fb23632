//! Loadable units
//!
//! A unit is a file that yields script types when loaded. Native units are
//! shared libraries exporting `void_script_unit_entry`, usually generated with
//! [`export_script_unit!`](crate::export_script_unit).

use crate::error::{BridgeError, Result};
use crate::script_type::TypeHandle;
use libloading::{Library, Symbol};
use std::fmt;
use std::path::{Path, PathBuf};

/// ABI version a unit must be built against
pub const SCRIPT_UNIT_API_VERSION: u32 = 2;

/// Entry point symbol resolved in native units
pub const UNIT_ENTRY_SYMBOL: &[u8] = b"void_script_unit_entry\0";

pub type UnitEntryFn = unsafe extern "C" fn() -> UnitExport;
/// Fills the collector; returns `false` if the unit failed part way
pub type CollectTypesFn = unsafe extern "C" fn(*mut TypeCollector) -> bool;

/// Table returned by a unit's entry point
#[repr(C)]
pub struct UnitExport {
    pub api_version: u32,
    pub collect: CollectTypesFn,
}

/// Receives the types a unit exposes
#[derive(Default)]
pub struct TypeCollector {
    types: Vec<TypeHandle>,
}

impl TypeCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expose a type
    pub fn add(&mut self, ty: TypeHandle) -> &mut Self {
        self.types.push(ty);
        self
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn into_types(self) -> Vec<TypeHandle> {
        self.types
    }
}

/// A unit that has been loaded into the process
pub struct LoadedUnit {
    name: String,
    path: PathBuf,
    // Dropped before `library`: type handles may point into library code.
    types: Vec<TypeHandle>,
    library: Option<Library>,
}

impl LoadedUnit {
    /// Unit whose types were built in-process
    pub fn from_types(path: impl Into<PathBuf>, types: Vec<TypeHandle>) -> Self {
        let path = path.into();
        Self {
            name: unit_name(&path),
            path,
            types,
            library: None,
        }
    }

    fn native(path: &Path, types: Vec<TypeHandle>, library: Library) -> Self {
        Self {
            name: unit_name(path),
            path: path.to_path_buf(),
            types,
            library: Some(library),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path the unit was loaded from (the staged copy, if staged)
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn types(&self) -> &[TypeHandle] {
        &self.types
    }

    /// Whether the unit is backed by a shared library
    pub fn is_native(&self) -> bool {
        self.library.is_some()
    }
}

impl fmt::Debug for LoadedUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedUnit")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("types", &self.types.len())
            .field("native", &self.is_native())
            .finish()
    }
}

fn unit_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string()
}

/// Turns a unit file into loaded types
pub trait UnitLoader: Send + Sync {
    /// Load the unit at `path`; malformed units yield a load failure
    fn load(&self, path: &Path) -> Result<LoadedUnit>;
}

/// Loads shared libraries exporting [`UNIT_ENTRY_SYMBOL`]
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeUnitLoader;

impl UnitLoader for NativeUnitLoader {
    fn load(&self, path: &Path) -> Result<LoadedUnit> {
        let library = unsafe { Library::new(path) }.map_err(|e| BridgeError::load_failure(path, e.to_string()))?;

        let export = unsafe {
            let entry: Symbol<UnitEntryFn> = library.get(UNIT_ENTRY_SYMBOL).map_err(|_| {
                BridgeError::load_failure(path, "missing symbol 'void_script_unit_entry'")
            })?;
            entry()
        };

        if export.api_version != SCRIPT_UNIT_API_VERSION {
            return Err(BridgeError::VersionMismatch {
                path: path.to_path_buf(),
                unit_version: export.api_version,
                expected_version: SCRIPT_UNIT_API_VERSION,
            });
        }

        let types = collect_export(path, &export)?;
        log::info!("Loaded unit {} with {} type(s)", path.display(), types.len());

        Ok(LoadedUnit::native(path, types, library))
    }
}

/// Run a unit's collect function; a unit that fails part way is rejected whole
fn collect_export(path: &Path, export: &UnitExport) -> Result<Vec<TypeHandle>> {
    let mut collector = TypeCollector::new();
    if !unsafe { (export.collect)(&mut collector) } {
        return Err(BridgeError::load_failure(
            path,
            format!("unit failed while collecting types ({} collected)", collector.len()),
        ));
    }
    Ok(collector.into_types())
}

/// Call `collect` on the collector behind `collector`, catching panics
///
/// Used by [`export_script_unit!`](crate::export_script_unit). Returns
/// `false` for a null collector or a panic.
///
/// # Safety
///
/// `collector` must be null or point to a live [`TypeCollector`].
#[doc(hidden)]
pub unsafe fn guarded_collect<F: FnOnce(&mut TypeCollector)>(collector: *mut TypeCollector, collect: F) -> bool {
    match collector.as_mut() {
        Some(collector) => std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| collect(collector))).is_ok(),
        None => false,
    }
}

/// Generate the entry point of a native script unit
///
/// ```ignore
/// fn collect(types: &mut void_bridge::TypeCollector) {
///     types.add(MyEntity::script_type());
/// }
/// void_bridge::export_script_unit!(collect);
/// ```
#[macro_export]
macro_rules! export_script_unit {
    ($collect:path) => {
        #[no_mangle]
        pub extern "C" fn void_script_unit_entry() -> $crate::UnitExport {
            unsafe extern "C" fn __void_collect(collector: *mut $crate::TypeCollector) -> bool {
                $crate::guarded_collect(collector, |types| $collect(types))
            }

            $crate::UnitExport {
                api_version: $crate::SCRIPT_UNIT_API_VERSION,
                collect: __void_collect,
            }
        }
    };
}
