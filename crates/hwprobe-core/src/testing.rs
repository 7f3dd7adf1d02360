//! In-memory collaborators for tests.
//!
//! [`MemoryReader`] stands in for the filesystem and [`ScriptedExecutor`]
//! for the root shell, so acquisition can be exercised without privileges.

use crate::privileged::cat_command;
use crate::reader::FileReader;
use crate::shell::{CommandExecutor, CommandHandle, ShellEvent};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::mpsc;

/// A [`FileReader`] over an in-memory map of paths.
#[derive(Debug, Default)]
pub struct MemoryReader {
    files: Mutex<HashMap<String, String>>,
    dirs: Mutex<HashSet<String>>,
    reads: AtomicUsize,
}

impl MemoryReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.insert(path, content);
        self
    }

    pub fn with_dir(self, path: &str) -> Self {
        if let Ok(mut dirs) = self.dirs.lock() {
            dirs.insert(path.trim_end_matches('/').to_string());
        }
        self
    }

    pub fn insert(&self, path: &str, content: &str) {
        if let Ok(mut files) = self.files.lock() {
            files.insert(path.to_string(), content.to_string());
        }
    }

    pub fn remove(&self, path: &str) {
        if let Ok(mut files) = self.files.lock() {
            files.remove(path);
        }
    }

    /// Number of read attempts, successful or not.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn lookup(&self, path: &str) -> Option<String> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.files.lock().ok()?.get(path).cloned()
    }
}

impl FileReader for MemoryReader {
    fn read(&self, path: &str) -> Option<String> {
        self.lookup(path).map(|content| content.trim().to_string())
    }

    fn read_line(&self, path: &str) -> Option<String> {
        self.lookup(path)
            .map(|content| content.lines().next().unwrap_or("").trim().to_string())
    }

    fn exists(&self, path: &str) -> bool {
        let path = path.trim_end_matches('/');
        if path.is_empty() {
            return false;
        }
        let prefix = format!("{}/", path);
        let in_dirs = self
            .dirs
            .lock()
            .map(|dirs| dirs.iter().any(|d| d == path || d.starts_with(&prefix)))
            .unwrap_or(false);
        let in_files = self
            .files
            .lock()
            .map(|files| files.keys().any(|f| f == path || f.starts_with(&prefix)))
            .unwrap_or(false);
        in_dirs || in_files
    }
}

/// A [`CommandExecutor`] with canned responses.
///
/// `cat` of a registered file prints its lines and exits 0; anything
/// unregistered exits 1 with no output. Completions are delivered from a
/// separate thread, like a real shell's reader.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    available: bool,
    refuse_after: Option<usize>,
    hold: bool,
    responses: Mutex<HashMap<String, String>>,
    commands: Mutex<Vec<String>>,
    held: Mutex<Vec<mpsc::UnboundedSender<ShellEvent>>>,
    next_id: AtomicU64,
}

impl ScriptedExecutor {
    /// Privilege available, every command accepted.
    pub fn available() -> Self {
        Self {
            available: true,
            ..Self::default()
        }
    }

    /// No privilege at all.
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Reports privilege but never hands out a handle.
    pub fn refusing() -> Self {
        Self::available().refuse_after(0)
    }

    /// Accepts `count` commands, then refuses.
    pub fn refuse_after(mut self, count: usize) -> Self {
        self.refuse_after = Some(count);
        self
    }

    /// Accepts commands but never completes them.
    pub fn holding(mut self) -> Self {
        self.hold = true;
        self
    }

    /// Registers the content of a file for `cat`.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.with_script(&cat_command(path), content)
    }

    /// Registers the output of an exact command.
    pub fn with_script(self, command: &str, output: &str) -> Self {
        if let Ok(mut responses) = self.responses.lock() {
            responses.insert(command.to_string(), output.to_string());
        }
        self
    }

    /// Every accepted command, in issue order.
    pub fn commands(&self) -> Vec<String> {
        self.commands
            .lock()
            .map(|commands| commands.clone())
            .unwrap_or_default()
    }
}

impl CommandExecutor for ScriptedExecutor {
    fn is_available(&self) -> bool {
        self.available
    }

    fn execute(&self, command: &str) -> Option<CommandHandle> {
        if !self.available {
            return None;
        }

        let mut commands = self.commands.lock().ok()?;
        if self.refuse_after.is_some_and(|limit| commands.len() >= limit) {
            return None;
        }
        commands.push(command.to_string());
        drop(commands);

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, handle) = CommandHandle::channel(id);

        if self.hold {
            self.held.lock().ok()?.push(tx);
            return Some(handle);
        }

        let response = self.responses.lock().ok()?.get(command).cloned();
        std::thread::spawn(move || match response {
            Some(output) => {
                for line in output.lines() {
                    let _ = tx.send(ShellEvent::Output(line.to_string()));
                }
                let _ = tx.send(ShellEvent::Completed(0));
            }
            None => {
                let _ = tx.send(ShellEvent::Completed(1));
            }
        });

        Some(handle)
    }
}
