//! Filesystem access for attachment folders.
//!
//! Jobs only ever touch files through this trait so tests can swap in
//! doubles that fail on demand. Paths are always split into the folder
//! (as recorded in the folders table) and the bare file name; no job
//! builds paths by hand.

use anyhow::{Context, Result};
use std::path::Path;
use std::time::SystemTime;
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq)]
pub struct FolderEntry {
    pub name: String,
    pub size: u64,
    pub modified: SystemTime,
}

pub trait AttachmentFs: Send + Sync {
    /// Size of the named file, or `None` when it does not exist.
    fn file_size(&self, folder: &Path, name: &str) -> Result<Option<u64>>;

    fn move_file(&self, from_folder: &Path, to_folder: &Path, name: &str) -> Result<()>;

    fn remove_file(&self, folder: &Path, name: &str) -> Result<()>;

    fn create_folder(&self, path: &Path) -> Result<()>;

    fn folder_exists(&self, path: &Path) -> bool;

    /// Plain files directly inside the folder, sorted by name so a walk
    /// resumed at an offset sees the same order as the first pass.
    fn list_folder(&self, folder: &Path) -> Result<Vec<FolderEntry>>;
}

pub struct DiskAttachmentFs;

impl AttachmentFs for DiskAttachmentFs {
    fn file_size(&self, folder: &Path, name: &str) -> Result<Option<u64>> {
        match std::fs::metadata(folder.join(name)) {
            Ok(meta) if meta.is_file() => Ok(Some(meta.len())),
            Ok(_) => Ok(None),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => {
                Err(err).with_context(|| format!("Failed to stat {name} in {}", folder.display()))
            }
        }
    }

    fn move_file(&self, from_folder: &Path, to_folder: &Path, name: &str) -> Result<()> {
        let from = from_folder.join(name);
        let to = to_folder.join(name);
        if std::fs::rename(&from, &to).is_ok() {
            return Ok(());
        }
        // Rename fails across filesystems, fall back to copy then delete.
        std::fs::copy(&from, &to)
            .with_context(|| format!("Failed to copy {} to {}", from.display(), to.display()))?;
        std::fs::remove_file(&from)
            .with_context(|| format!("Failed to remove {} after copy", from.display()))?;
        Ok(())
    }

    fn remove_file(&self, folder: &Path, name: &str) -> Result<()> {
        std::fs::remove_file(folder.join(name))
            .with_context(|| format!("Failed to remove {name} from {}", folder.display()))
    }

    fn create_folder(&self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create folder {}", path.display()))
    }

    fn folder_exists(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn list_folder(&self, folder: &Path) -> Result<Vec<FolderEntry>> {
        let mut entries = Vec::new();
        for entry in WalkDir::new(folder)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry =
                entry.with_context(|| format!("Failed to walk folder {}", folder.display()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let meta = entry
                .metadata()
                .with_context(|| format!("Failed to stat {}", entry.path().display()))?;
            entries.push(FolderEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                size: meta.len(),
                modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            });
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_file(dir: &Path, name: &str, content: &[u8]) {
        std::fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn test_file_size_distinguishes_absent_files() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "1_aa.dat", b"hello");
        let fs = DiskAttachmentFs;
        assert_eq!(fs.file_size(dir.path(), "1_aa.dat").unwrap(), Some(5));
        assert_eq!(fs.file_size(dir.path(), "2_bb.dat").unwrap(), None);
    }

    #[test]
    fn test_move_file_between_folders() {
        let from = tempfile::tempdir().unwrap();
        let to = tempfile::tempdir().unwrap();
        write_file(from.path(), "7_cc.dat", b"payload");
        let fs = DiskAttachmentFs;
        fs.move_file(from.path(), to.path(), "7_cc.dat").unwrap();
        assert_eq!(fs.file_size(from.path(), "7_cc.dat").unwrap(), None);
        assert_eq!(fs.file_size(to.path(), "7_cc.dat").unwrap(), Some(7));
    }

    #[test]
    fn test_list_folder_is_sorted_and_skips_directories() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "b.dat", b"22");
        write_file(dir.path(), "a.dat", b"1");
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        let fs = DiskAttachmentFs;
        let names: Vec<String> = fs
            .list_folder(dir.path())
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["a.dat".to_string(), "b.dat".to_string()]);
    }

    #[test]
    fn test_create_and_probe_folder() {
        let root = tempfile::tempdir().unwrap();
        let fs = DiskAttachmentFs;
        let target = root.path().join("attachments_1");
        assert!(!fs.folder_exists(&target));
        fs.create_folder(&target).unwrap();
        assert!(fs.folder_exists(&target));
        assert!(fs.list_folder(&target).unwrap().is_empty());
    }

    #[test]
    fn test_remove_file() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "9_dd.dat", b"x");
        let fs = DiskAttachmentFs;
        fs.remove_file(dir.path(), "9_dd.dat").unwrap();
        assert_eq!(fs.file_size(dir.path(), "9_dd.dat").unwrap(), None);
        assert!(fs.remove_file(dir.path(), "9_dd.dat").is_err());
    }
}
