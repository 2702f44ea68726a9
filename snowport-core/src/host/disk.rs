//! Disk images served from a host directory.
//!
//! The core opens images by name; names are resolved relative to the root and may not
//! escape it. Handles are small positive integers, never reused within one instance.
//! Images keep their size: reads and writes past the end are cut short.

use std::collections::{HashMap, VecDeque};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};

use super::{DiskId, HostDisk};

pub struct DirectoryDisks {
    root: PathBuf,
    open: HashMap<DiskId, File>,
    next_id: i32,
    cdroms: VecDeque<String>,
}

impl DirectoryDisks {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            open: HashMap::new(),
            next_id: 1,
            cdroms: VecDeque::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Queue a CD-ROM image name for the core to pick up.
    pub fn insert_cdrom(&mut self, name: impl Into<String>) {
        self.cdroms.push_back(name.into());
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    fn resolve(&self, name: &str) -> Option<PathBuf> {
        let relative = Path::new(name.trim_start_matches('/'));
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if relative.as_os_str().is_empty() || escapes {
            return None;
        }
        Some(self.root.join(relative))
    }

    fn open_file(path: &Path) -> io::Result<File> {
        OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .or_else(|_| File::open(path))
    }
}

impl HostDisk for DirectoryDisks {
    fn open(&mut self, name: &str) -> Option<DiskId> {
        let Some(path) = self.resolve(name) else {
            log::warn!("rejected disk name {name:?}");
            return None;
        };
        let file = match Self::open_file(&path) {
            Ok(file) => file,
            Err(err) => {
                log::debug!("disk {} not available: {err}", path.display());
                return None;
            }
        };
        let id = DiskId(self.next_id);
        self.next_id = self.next_id.checked_add(1)?;
        self.open.insert(id, file);
        log::info!("opened disk {name} as #{}", id.0);
        Some(id)
    }

    fn close(&mut self, id: DiskId) {
        if self.open.remove(&id).is_none() {
            log::warn!("close of unknown disk #{}", id.0);
        }
    }

    fn size(&self, id: DiskId) -> Option<u64> {
        let file = self.open.get(&id)?;
        file.metadata().ok().map(|meta| meta.len())
    }

    fn read(&mut self, id: DiskId, offset: u64, buf: &mut [u8]) -> usize {
        let Some(file) = self.open.get_mut(&id) else {
            return 0;
        };
        if file.seek(SeekFrom::Start(offset)).is_err() {
            return 0;
        }
        let mut filled = 0;
        while filled < buf.len() {
            match file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => {
                    log::warn!("read from disk #{} failed: {err}", id.0);
                    break;
                }
            }
        }
        filled
    }

    fn write(&mut self, id: DiskId, offset: u64, data: &[u8]) -> usize {
        let Some(file) = self.open.get_mut(&id) else {
            return 0;
        };
        let room = match file.metadata() {
            Ok(meta) => meta.len().saturating_sub(offset),
            Err(err) => {
                log::warn!("disk #{} has no size: {err}", id.0);
                return 0;
            }
        };
        let data = &data[..data.len().min(usize::try_from(room).unwrap_or(usize::MAX))];
        if data.is_empty() {
            return 0;
        }
        let written = file
            .seek(SeekFrom::Start(offset))
            .and_then(|_| file.write_all(data));
        match written {
            Ok(()) => data.len(),
            Err(err) => {
                log::warn!("write to disk #{} failed: {err}", id.0);
                0
            }
        }
    }

    fn consume_cdrom_name(&mut self) -> Option<String> {
        self.cdroms.pop_front()
    }
}
