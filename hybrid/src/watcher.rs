//! # Shader Hot-Reloading
//!
//! Watches a shader directory for changes to `.wgsl` files. The watcher runs
//! on `notify`'s own thread and only forwards the changed paths over a
//! channel; the render loop drains the channel once per frame and rebuilds
//! the affected programs itself, since only that thread may touch the GPU.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};

use anyhow::{Context, Result};
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use tracing::{error, info};

const SHADER_EXTENSION: &str = "wgsl";

/// Keeps the file watcher alive and exposes the paths it reported.
pub struct ShaderWatcher {
    _watcher: RecommendedWatcher,
    changes: Receiver<PathBuf>,
}

impl ShaderWatcher {
    /// Starts watching `dir` recursively.
    ///
    /// # Errors
    ///
    /// Fails if the directory does not exist or the platform watcher cannot
    /// be created.
    pub fn start(dir: &Path) -> Result<Self> {
        info!("Initializing shader hot-reload watcher...");
        if !dir.exists() {
            anyhow::bail!("shader directory {} not found", dir.display());
        }

        let (tx, changes) = mpsc::channel();
        let mut watcher =
            notify::recommended_watcher(move |res: notify::Result<Event>| {
                handle_file_event(&tx, res);
            })
            .context("failed to create file watcher")?;
        watcher
            .watch(dir, RecursiveMode::Recursive)
            .with_context(|| format!("failed to watch {}", dir.display()))?;

        info!("Shader watcher active - monitoring '{}'", dir.display());
        Ok(Self {
            _watcher: watcher,
            changes,
        })
    }

    /// Paths changed since the last call, without duplicates.
    ///
    /// Editors often emit several events per save; they collapse into one
    /// entry here.
    pub fn drain(&self) -> BTreeSet<PathBuf> {
        self.changes.try_iter().collect()
    }
}

fn is_shader_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == SHADER_EXTENSION)
}

fn handle_file_event(tx: &Sender<PathBuf>, result: notify::Result<Event>) {
    let event = match result {
        Ok(event) => event,
        Err(e) => {
            error!("File watcher error: {e:?}");
            return;
        }
    };
    if !event.kind.is_modify() && !event.kind.is_create() {
        return;
    }
    for path in event.paths.into_iter().filter(|p| is_shader_file(p)) {
        // The receiver is gone once the render loop has exited.
        if tx.send(path).is_err() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_wgsl_files_are_shaders() {
        assert!(is_shader_file(Path::new("shaders/raymarch.wgsl")));
        assert!(!is_shader_file(Path::new("shaders/raymarch.wgsl.swp")));
        assert!(!is_shader_file(Path::new("shaders/notes.txt")));
        assert!(!is_shader_file(Path::new("shaders")));
    }

    #[test]
    fn forwards_modified_shader_paths() {
        let (tx, rx) = mpsc::channel();
        let event = Event::new(notify::EventKind::Modify(notify::event::ModifyKind::Any))
            .add_path(PathBuf::from("shaders/raster.wgsl"))
            .add_path(PathBuf::from("shaders/readme.md"));
        handle_file_event(&tx, Ok(event));
        let paths: Vec<_> = rx.try_iter().collect();
        assert_eq!(paths, vec![PathBuf::from("shaders/raster.wgsl")]);
    }

    #[test]
    fn ignores_removals() {
        let (tx, rx) = mpsc::channel();
        let event = Event::new(notify::EventKind::Remove(notify::event::RemoveKind::File))
            .add_path(PathBuf::from("shaders/blit.wgsl"));
        handle_file_event(&tx, Ok(event));
        assert_eq!(rx.try_iter().count(), 0);
    }

    #[test]
    fn missing_directory_is_an_error() {
        assert!(ShaderWatcher::start(Path::new("does/not/exist")).is_err());
    }
}
