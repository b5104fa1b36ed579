// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The filesystem capability used by the counter readers.
//!
//! Readers never touch `std::fs` directly. Production code binds them to
//! [`RealFilesystem`]; tests substitute a [`MemoryFilesystem`] whose file
//! contents can be scripted per read.

use crate::SampleError;
use std::collections::{HashMap, VecDeque};
use std::io::{BufRead, BufReader, Cursor};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Read-only access to the files the readers sample.
pub trait Filesystem: Send + Sync {
    /// Opens `path` as a line-oriented stream.
    fn read_file_stream(&self, path: &Path) -> Result<Box<dyn BufRead>, SampleError>;

    /// Lists the entry names (not full paths) of the directory at `path`.
    fn list_directory(&self, path: &Path) -> Result<Vec<String>, SampleError>;
}

/// [`Filesystem`] backed by the host's real filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFilesystem;

impl Filesystem for RealFilesystem {
    fn read_file_stream(&self, path: &Path) -> Result<Box<dyn BufRead>, SampleError> {
        if !path.exists() {
            return Err(SampleError::NotAvailable {
                path: path.display().to_string(),
            });
        }
        let file = std::fs::File::open(path).map_err(|e| SampleError::ReadError {
            path: path.display().to_string(),
            source: e,
        })?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn list_directory(&self, path: &Path) -> Result<Vec<String>, SampleError> {
        let entries = std::fs::read_dir(path).map_err(|e| SampleError::ReadError {
            path: path.display().to_string(),
            source: e,
        })?;
        Ok(entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect())
    }
}

/// In-memory [`Filesystem`] with scripted file contents.
///
/// Each path holds a queue of contents. Every read pops the front of the
/// queue, except that the last entry is kept and served to all later reads.
/// Directories are derived from the registered file paths.
#[derive(Debug, Default)]
pub struct MemoryFilesystem {
    files: Mutex<HashMap<PathBuf, VecDeque<String>>>,
}

impl MemoryFilesystem {
    /// Creates an empty filesystem.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `content` as the next version of the file at `path`.
    pub fn push(&self, path: impl Into<PathBuf>, content: impl Into<String>) {
        let mut files = self.files.lock().unwrap_or_else(|p| p.into_inner());
        files
            .entry(path.into())
            .or_default()
            .push_back(content.into());
    }

    /// Builder-style variant of [`push`](Self::push).
    pub fn with_file(self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.push(path, content);
        self
    }
}

impl Filesystem for MemoryFilesystem {
    fn read_file_stream(&self, path: &Path) -> Result<Box<dyn BufRead>, SampleError> {
        let mut files = self.files.lock().unwrap_or_else(|p| p.into_inner());
        let queue = files
            .get_mut(path)
            .ok_or_else(|| SampleError::NotAvailable {
                path: path.display().to_string(),
            })?;
        let content = if queue.len() > 1 {
            queue.pop_front().unwrap_or_default()
        } else {
            queue.front().cloned().unwrap_or_default()
        };
        Ok(Box::new(Cursor::new(content.into_bytes())))
    }

    fn list_directory(&self, path: &Path) -> Result<Vec<String>, SampleError> {
        let files = self.files.lock().unwrap_or_else(|p| p.into_inner());
        let mut entries: Vec<String> = files
            .keys()
            .filter_map(|file| file.strip_prefix(path).ok())
            .filter_map(|rest| rest.components().next())
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        if entries.is_empty() {
            return Err(SampleError::NotAvailable {
                path: path.display().to_string(),
            });
        }
        entries.sort();
        entries.dedup();
        Ok(entries)
    }
}

/// Reads every line of `path`, surfacing I/O errors with the path attached.
pub(crate) fn read_lines(fs: &dyn Filesystem, path: &Path) -> Result<Vec<String>, SampleError> {
    let stream = fs.read_file_stream(path)?;
    stream
        .lines()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| SampleError::ReadError {
            path: path.display().to_string(),
            source: e,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(name: &str, content: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("adaptive_cpu_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        write!(f, "{content}").unwrap();
        path
    }

    #[test]
    fn test_real_read_lines() {
        let p = write_temp("fs_lines", "a\nb\n");
        let lines = read_lines(&RealFilesystem, &p).unwrap();
        assert_eq!(lines, vec!["a", "b"]);
        let _ = std::fs::remove_file(&p);
    }

    #[test]
    fn test_real_missing_file() {
        let result = RealFilesystem.read_file_stream(Path::new("/nonexistent/proc/stat"));
        assert!(matches!(result, Err(SampleError::NotAvailable { .. })));
    }

    #[test]
    fn test_memory_scripted_reads() {
        let fs = MemoryFilesystem::new()
            .with_file("/proc/stat", "first")
            .with_file("/proc/stat", "second");
        let path = Path::new("/proc/stat");
        assert_eq!(read_lines(&fs, path).unwrap(), vec!["first"]);
        assert_eq!(read_lines(&fs, path).unwrap(), vec!["second"]);
        // The last version sticks.
        assert_eq!(read_lines(&fs, path).unwrap(), vec!["second"]);
    }

    #[test]
    fn test_memory_missing_file() {
        let fs = MemoryFilesystem::new();
        let result = fs.read_file_stream(Path::new("/proc/stat"));
        assert!(matches!(result, Err(SampleError::NotAvailable { .. })));
    }

    #[test]
    fn test_memory_list_directory() {
        let fs = MemoryFilesystem::new()
            .with_file("/cpufreq/policy4/stats/time_in_state", "")
            .with_file("/cpufreq/policy0/stats/time_in_state", "")
            .with_file("/cpufreq/policy0/scaling_cur_freq", "");
        let entries = fs.list_directory(Path::new("/cpufreq")).unwrap();
        assert_eq!(entries, vec!["policy0", "policy4"]);
    }
}
