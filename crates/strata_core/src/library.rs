//! Background library loading
//!
//! A library is a scene template file whose objects are merged into a
//! running scene. [`LibraryLoader::load`] parses the file on a worker thread
//! and reports progress through a shared [`LibLoadHandle`]; finished
//! templates are collected with [`LibraryLoader::poll`] and merged by the
//! converter at the end of a tick.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::template::{SceneLoadError, SceneTemplate};

/// Progress of one library load
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LibLoadStatus {
    /// Library path as requested
    pub name: String,
    /// 0 when queued, 1 when parsed
    pub progress: f32,
    pub finished: bool,
    /// Time spent loading
    pub duration: Duration,
    /// Set when the library could not be loaded
    pub error: Option<String>,
}

/// Shared view of a library load
#[derive(Debug, Clone)]
pub struct LibLoadHandle(Arc<Mutex<LibLoadStatus>>);

impl LibLoadHandle {
    fn new(name: String) -> Self {
        Self(Arc::new(Mutex::new(LibLoadStatus {
            name,
            ..LibLoadStatus::default()
        })))
    }

    fn lock(&self) -> MutexGuard<'_, LibLoadStatus> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Copy of the current status
    pub fn status(&self) -> LibLoadStatus {
        self.lock().clone()
    }

    pub fn name(&self) -> String {
        self.lock().name.clone()
    }

    pub fn progress(&self) -> f32 {
        self.lock().progress
    }

    pub fn is_finished(&self) -> bool {
        self.lock().finished
    }

    pub fn error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    fn finish(&self, started: Instant, error: Option<String>) {
        let mut status = self.lock();
        status.progress = 1.0;
        status.finished = true;
        status.duration = started.elapsed();
        status.error = error;
    }
}

/// A parsed library waiting to be merged
#[derive(Debug)]
pub struct ReadyLibrary {
    /// Scene the library is merged into
    pub merge_into: String,
    pub template: SceneTemplate,
    pub handle: LibLoadHandle,
}

/// Result of one worker
struct LoadResult {
    id: u64,
    result: Result<SceneTemplate, SceneLoadError>,
}

struct PendingLoad {
    merge_into: String,
    handle: LibLoadHandle,
    worker: Option<JoinHandle<()>>,
}

/// Loads library files on worker threads
pub struct LibraryLoader {
    sender: Sender<LoadResult>,
    receiver: Receiver<LoadResult>,
    pending: HashMap<u64, PendingLoad>,
    ready: Vec<ReadyLibrary>,
    next_id: u64,
}

impl LibraryLoader {
    pub fn new() -> Self {
        let (sender, receiver) = channel();
        Self {
            sender,
            receiver,
            pending: HashMap::new(),
            ready: Vec::new(),
            next_id: 0,
        }
    }

    /// Start loading `path` in the background, to be merged into `merge_into`
    pub fn load(&mut self, path: impl AsRef<Path>, merge_into: &str) -> LibLoadHandle {
        let path: PathBuf = path.as_ref().to_path_buf();
        let handle = LibLoadHandle::new(path.display().to_string());
        let id = self.next_id;
        self.next_id += 1;

        let sender = self.sender.clone();
        let progress = handle.clone();
        let spawned = thread::Builder::new()
            .name(format!("strata-libload-{}", id))
            .spawn(move || {
                let started = Instant::now();
                let result = SceneTemplate::load(&path);
                progress.finish(started, result.as_ref().err().map(|e| e.to_string()));
                // The loader may already be gone
                let _ = sender.send(LoadResult { id, result });
            });

        let worker = match spawned {
            Ok(worker) => Some(worker),
            Err(e) => {
                log::error!("Could not start library load of '{}': {}", handle.name(), e);
                handle.finish(Instant::now(), Some(e.to_string()));
                None
            }
        };
        log::info!("Loading library '{}' into scene '{}'", handle.name(), merge_into);
        if worker.is_some() {
            self.pending.insert(
                id,
                PendingLoad {
                    merge_into: merge_into.to_string(),
                    handle: handle.clone(),
                    worker,
                },
            );
        }
        handle
    }

    /// Collect finished loads (non-blocking)
    pub fn poll(&mut self) {
        while let Ok(LoadResult { id, result }) = self.receiver.try_recv() {
            let Some(mut load) = self.pending.remove(&id) else {
                continue;
            };
            if let Some(worker) = load.worker.take() {
                let _ = worker.join();
            }
            match result {
                Ok(template) => self.ready.push(ReadyLibrary {
                    merge_into: load.merge_into,
                    template,
                    handle: load.handle,
                }),
                Err(e) => log::warn!("Library '{}' failed to load: {}", load.handle.name(), e),
            }
        }
    }

    /// Block until every pending load has finished
    pub fn finalize(&mut self) {
        for load in self.pending.values_mut() {
            if let Some(worker) = load.worker.take() {
                if worker.join().is_err() {
                    log::error!("Library load of '{}' panicked", load.handle.name());
                }
            }
        }
        self.poll();
        // Workers that panicked never reported
        for (_, load) in self.pending.drain() {
            if !load.handle.is_finished() {
                load.handle.finish(Instant::now(), Some("worker panicked".to_string()));
            }
        }
    }

    /// Take the parsed libraries in completion order
    pub fn take_ready(&mut self) -> Vec<ReadyLibrary> {
        std::mem::take(&mut self.ready)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn ready_count(&self) -> usize {
        self.ready.len()
    }
}

impl Default for LibraryLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_library(name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("strata_library_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_finalize_collects_loads() {
        let path = write_library("props.ron", r#"SceneTemplate(name: "props", objects: [ObjectTemplate(name: "barrel", kind: Mesh)])"#);
        let mut loader = LibraryLoader::new();
        let handle = loader.load(&path, "level");
        assert_eq!(loader.pending_count(), 1);

        loader.finalize();
        assert_eq!(loader.pending_count(), 0);
        let status = handle.status();
        assert!(status.finished);
        assert_eq!(status.progress, 1.0);
        assert!(status.error.is_none());

        let ready = loader.take_ready();
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].merge_into, "level");
        assert_eq!(ready[0].template.objects[0].name, "barrel");
        assert!(loader.take_ready().is_empty());
    }

    #[test]
    fn test_missing_file_reports_error() {
        let mut loader = LibraryLoader::new();
        let handle = loader.load("/nonexistent/library.ron", "level");
        loader.finalize();

        assert!(handle.is_finished());
        assert!(handle.error().is_some());
        assert_eq!(loader.ready_count(), 0);
    }

    #[test]
    fn test_poll_is_non_blocking() {
        let mut loader = LibraryLoader::new();
        loader.poll();
        assert_eq!(loader.ready_count(), 0);
        assert_eq!(loader.pending_count(), 0);
    }
}
