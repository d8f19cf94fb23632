//! Unit discovery and shadow-copy staging
//!
//! Units are never loaded from the plugin directory directly. Each one is
//! copied into a staging directory first so the original file stays free to
//! be rebuilt while the process holds the copy open.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Attempts at a collision-free staged name before giving up
const MAX_STAGE_ATTEMPTS: usize = 16;

/// Lists loadable unit files in a directory
pub trait UnitDiscovery: Send + Sync {
    fn list_loadable_units(&self, directory: &Path) -> io::Result<Vec<PathBuf>>;
}

/// Copies unit files into the staging directory
pub trait UnitStager: Send + Sync {
    /// Copy `source` to `destination`, returning the path actually written
    fn stage_file(&self, source: &Path, destination: &Path, overwrite: bool) -> io::Result<PathBuf>;
}

/// Extension-filtered directory listing
#[derive(Debug, Clone)]
pub struct DirectoryScanner {
    extensions: Vec<String>,
    recursive: bool,
}

impl DirectoryScanner {
    pub fn new(extensions: Vec<String>, recursive: bool) -> Self {
        Self { extensions, recursive }
    }

    /// Whether `path` has one of the unit extensions
    pub fn is_unit_file(&self, path: &Path) -> bool {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => self.extensions.iter().any(|u| u.eq_ignore_ascii_case(ext)),
            None => false,
        }
    }

    fn scan(&self, directory: &Path, out: &mut Vec<PathBuf>) -> io::Result<()> {
        for entry in fs::read_dir(directory)? {
            let entry = entry?;
            let path = entry.path();
            // Symlinked directories are not followed
            if entry.file_type()?.is_dir() {
                if self.recursive {
                    self.scan(&path, out)?;
                }
            } else if self.is_unit_file(&path) {
                out.push(path);
            }
        }
        Ok(())
    }
}

impl Default for DirectoryScanner {
    fn default() -> Self {
        Self::new(default_unit_extensions(), true)
    }
}

impl UnitDiscovery for DirectoryScanner {
    fn list_loadable_units(&self, directory: &Path) -> io::Result<Vec<PathBuf>> {
        let mut units = Vec::new();
        self.scan(directory, &mut units)?;
        // Directory order is platform dependent
        units.sort();
        Ok(units)
    }
}

/// Shared library extensions on every supported platform
pub fn default_unit_extensions() -> Vec<String> {
    vec!["so".to_string(), "dll".to_string(), "dylib".to_string()]
}

/// Plain file copy that renames to `stem_N.ext` when the destination is busy
#[derive(Debug, Default, Clone, Copy)]
pub struct ShadowCopyStager;

impl ShadowCopyStager {
    fn alternate_name(destination: &Path, attempt: usize) -> PathBuf {
        let stem = destination
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = match destination.extension() {
            Some(ext) => format!("{}_{}.{}", stem, attempt, ext.to_string_lossy()),
            None => format!("{}_{}", stem, attempt),
        };
        destination.with_file_name(name)
    }
}

impl UnitStager for ShadowCopyStager {
    fn stage_file(&self, source: &Path, destination: &Path, overwrite: bool) -> io::Result<PathBuf> {
        if !destination.exists() {
            fs::copy(source, destination)?;
            return Ok(destination.to_path_buf());
        }

        if overwrite {
            match fs::copy(source, destination) {
                Ok(_) => return Ok(destination.to_path_buf()),
                // A loaded copy may be locked or mapped; fall through to a fresh name
                Err(e) => log::debug!("Cannot overwrite {}: {}", destination.display(), e),
            }
        }

        for attempt in 1..=MAX_STAGE_ATTEMPTS {
            let candidate = Self::alternate_name(destination, attempt);
            if candidate.exists() {
                continue;
            }
            match fs::copy(source, &candidate) {
                Ok(_) => return Ok(candidate),
                Err(e) if matches!(e.kind(), io::ErrorKind::PermissionDenied | io::ErrorKind::AlreadyExists) => {
                    continue
                }
                Err(e) => return Err(e),
            }
        }

        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("no free staging name for {}", destination.display()),
        ))
    }
}

/// Create the staging directory, or empty it if `clear` is set
///
/// Files that cannot be removed (still mapped by another process) are left
/// behind silently.
pub fn prepare_staging_dir(directory: &Path, clear: bool) -> io::Result<()> {
    if !directory.exists() {
        fs::create_dir_all(directory)?;
        return Ok(());
    }

    if !clear {
        return Ok(());
    }

    for entry in fs::read_dir(directory)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                log::debug!("Leaving staged file {} in place: {}", path.display(), e);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path, contents: &[u8]) {
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_scanner_filters_and_recurses() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        fs::create_dir(&nested).unwrap();
        touch(&dir.path().join("b.so"), b"");
        touch(&dir.path().join("a.DLL"), b"");
        touch(&dir.path().join("readme.txt"), b"");
        touch(&nested.join("c.dylib"), b"");

        let units = DirectoryScanner::default().list_loadable_units(dir.path()).unwrap();
        let names: Vec<_> = units
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.DLL", "b.so", "c.dylib"]);

        let flat = DirectoryScanner::new(default_unit_extensions(), false)
            .list_loadable_units(dir.path())
            .unwrap();
        assert_eq!(flat.len(), 2);
    }

    #[test]
    fn test_stage_copies_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("unit.so");
        let dest = dir.path().join("staged.so");
        touch(&source, b"v1");

        let staged = ShadowCopyStager.stage_file(&source, &dest, true).unwrap();
        assert_eq!(staged, dest);

        touch(&source, b"v2");
        let staged = ShadowCopyStager.stage_file(&source, &dest, true).unwrap();
        assert_eq!(staged, dest);
        assert_eq!(fs::read(&dest).unwrap(), b"v2");
    }

    #[test]
    fn test_stage_without_overwrite_renames() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("unit.so");
        let dest = dir.path().join("staged.so");
        touch(&source, b"new");
        touch(&dest, b"old");

        let staged = ShadowCopyStager.stage_file(&source, &dest, false).unwrap();
        assert_eq!(staged, dir.path().join("staged_1.so"));
        assert_eq!(fs::read(&dest).unwrap(), b"old");
    }

    #[test]
    fn test_stage_never_reuses_existing_alternate() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("unit.so");
        let dest = dir.path().join("staged.so");
        touch(&source, b"new");
        touch(&dest, b"old");
        touch(&dir.path().join("staged_1.so"), b"older");

        let staged = ShadowCopyStager.stage_file(&source, &dest, false).unwrap();
        assert_eq!(staged, dir.path().join("staged_2.so"));
        assert_eq!(fs::read(dir.path().join("staged_1.so")).unwrap(), b"older");
    }

    #[cfg(unix)]
    #[test]
    fn test_scanner_does_not_follow_directory_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.so"), b"");
        std::os::unix::fs::symlink(dir.path(), dir.path().join("loop")).unwrap();

        let units = DirectoryScanner::default().list_loadable_units(dir.path()).unwrap();
        assert_eq!(units, vec![dir.path().join("a.so")]);
    }

    #[test]
    fn test_prepare_staging_dir() {
        let dir = tempfile::tempdir().unwrap();
        let staging = dir.path().join("staging");

        prepare_staging_dir(&staging, true).unwrap();
        assert!(staging.is_dir());

        touch(&staging.join("leftover.so"), b"");
        prepare_staging_dir(&staging, false).unwrap();
        assert!(staging.join("leftover.so").exists());

        prepare_staging_dir(&staging, true).unwrap();
        assert!(!staging.join("leftover.so").exists());
    }
}
