//! Privileged command execution.
//!
//! A single long-lived root shell processes commands in submission order.
//! Each command is followed by a marker line carrying its id and exit code,
//! which a reader thread uses to split the output stream back into
//! per-command event channels.

use crate::{Error, Result};
use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Marker prefix echoed after every command.
const MARKER: &str = "__HWPROBE_DONE__";

/// Candidate `su` binaries.
///
/// Only locations where `su` grants root without a password prompt. The
/// PAM `su` in `/bin` and `/usr/bin` would read the first command as a
/// password.
pub const DEFAULT_SU_PATHS: &[&str] = &[
    "/system/bin/su",
    "/system/xbin/su",
    "/system/bin/.ext/.su",
    "/system/xbin/sugote",
    "/su/bin/su",
    "/sbin/su",
];

/// Event streamed by a running command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellEvent {
    /// One line of standard output.
    Output(String),
    /// The command finished with this exit code. Always the last event.
    Completed(i32),
}

/// Receiving side of one issued command.
#[derive(Debug)]
pub struct CommandHandle {
    id: u64,
    events: mpsc::UnboundedReceiver<ShellEvent>,
}

/// Everything a command printed, plus its exit code.
///
/// `exit_code` is `None` when the shell went away before the command
/// completed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub lines: Vec<String>,
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Output lines joined with newlines.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

impl CommandHandle {
    /// Creates a handle and the sender that feeds it.
    pub fn channel(id: u64) -> (mpsc::UnboundedSender<ShellEvent>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { id, events: rx })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Waits for the next event; `None` once the stream is closed.
    pub async fn next_event(&mut self) -> Option<ShellEvent> {
        self.events.recv().await
    }

    /// Accumulates output until completion.
    pub async fn collect(mut self) -> CommandOutput {
        let mut output = CommandOutput::default();
        while let Some(event) = self.next_event().await {
            match event {
                ShellEvent::Output(line) => output.lines.push(line),
                ShellEvent::Completed(code) => {
                    output.exit_code = Some(code);
                    break;
                }
            }
        }
        output
    }
}

/// Runs shell commands with elevated privileges.
pub trait CommandExecutor: Send + Sync {
    /// Whether privileged execution is currently possible.
    fn is_available(&self) -> bool;

    /// Issues a command. `None` means the executor could not be engaged.
    fn execute(&self, command: &str) -> Option<CommandHandle>;
}

/// How to start the root shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellConfig {
    /// Elevation program, normally `su`.
    pub program: String,
    /// Extra arguments for the program.
    pub args: Vec<String>,
    /// Binaries whose presence means elevation is possible.
    pub su_paths: Vec<String>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            program: "su".to_string(),
            args: Vec::new(),
            su_paths: DEFAULT_SU_PATHS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Whether the process already runs as root.
pub fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

struct PendingCommand {
    id: u64,
    events: mpsc::UnboundedSender<ShellEvent>,
}

/// Commands awaiting output, oldest first.
#[derive(Default)]
struct OutputRouter {
    queue: VecDeque<PendingCommand>,
    /// A blank line seen but not yet forwarded. The marker is preceded by
    /// one blank line of its own, so the last blank before it is dropped.
    held_blank: bool,
}

impl OutputRouter {
    fn send_front(&self, event: ShellEvent) {
        match self.queue.front() {
            Some(command) => {
                let _ = command.events.send(event);
            }
            None => debug!("Discarding unsolicited shell output"),
        }
    }

    fn clear(&mut self) {
        self.queue.clear();
        self.held_blank = false;
    }
}

type PendingQueue = Arc<Mutex<OutputRouter>>;

struct Session {
    child: Child,
    stdin: ChildStdin,
    pending: PendingQueue,
    alive: Arc<AtomicBool>,
}

impl Session {
    fn spawn(program: &str, args: &[String]) -> Result<Self> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| Error::ShellSpawn {
                program: program.to_string(),
                source,
            })?;

        let stdin = child.stdin.take().ok_or(Error::ShellClosed)?;
        let stdout = child.stdout.take().ok_or(Error::ShellClosed)?;

        let pending: PendingQueue = Arc::new(Mutex::new(OutputRouter::default()));
        let alive = Arc::new(AtomicBool::new(true));

        let thread_pending = Arc::clone(&pending);
        let thread_alive = Arc::clone(&alive);
        std::thread::Builder::new()
            .name("hwprobe-shell".to_string())
            .spawn(move || {
                let reader = BufReader::new(stdout);
                for line in reader.lines() {
                    match line {
                        Ok(line) => dispatch_line(&thread_pending, &line),
                        Err(e) => {
                            warn!("Shell output error: {}", e);
                            break;
                        }
                    }
                }
                thread_alive.store(false, Ordering::SeqCst);
                // Dropping the senders closes every outstanding handle.
                lock(&thread_pending).clear();
                debug!("Shell output reader finished");
            })
            .map_err(Error::ShellIo)?;

        info!("Opened privileged shell session via {}", program);
        Ok(Self {
            child,
            stdin,
            pending,
            alive,
        })
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn submit(&mut self, id: u64, command: &str) -> Result<CommandHandle> {
        let (tx, handle) = CommandHandle::channel(id);
        lock(&self.pending)
            .queue
            .push_back(PendingCommand { id, events: tx });

        let framed = frame_command(id, command);
        let written = self
            .stdin
            .write_all(framed.as_bytes())
            .and_then(|_| self.stdin.flush());
        if let Err(e) = written {
            lock(&self.pending).queue.retain(|p| p.id != id);
            self.alive.store(false, Ordering::SeqCst);
            return Err(Error::ShellIo(e));
        }

        Ok(handle)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Wraps a command so its completion is reported as a marker line.
fn frame_command(id: u64, command: &str) -> String {
    format!(
        "{}\n__rc=$?; printf '\\n{} {} %d\\n' \"$__rc\"\n",
        command, MARKER, id
    )
}

/// Parses a marker line into `(id, exit_code)`.
fn parse_marker(line: &str) -> Option<(u64, i32)> {
    let rest = line.trim().strip_prefix(MARKER)?;
    let mut parts = rest.split_whitespace();
    let id = parts.next()?.parse().ok()?;
    let code = parts.next()?.parse().ok()?;
    Some((id, code))
}

fn dispatch_line(pending: &Mutex<OutputRouter>, line: &str) {
    let mut router = lock(pending);

    if let Some((id, code)) = parse_marker(line) {
        router.held_blank = false;
        while let Some(command) = router.queue.pop_front() {
            if command.id == id {
                let _ = command.events.send(ShellEvent::Completed(code));
                return;
            }
            warn!("Shell command {} completed without a marker", command.id);
        }
        warn!("Marker for unknown shell command {}", id);
        return;
    }

    if router.held_blank {
        router.send_front(ShellEvent::Output(String::new()));
    }
    router.held_blank = line.is_empty();
    if !line.is_empty() {
        router.send_front(ShellEvent::Output(line.to_string()));
    }
}

/// [`CommandExecutor`] backed by a persistent `su` session.
///
/// The session is opened lazily on the first command and re-opened if it
/// exits. When the process is already root a plain `sh` is used.
pub struct RootShell {
    config: ShellConfig,
    session: Mutex<Option<Session>>,
    next_id: AtomicU64,
}

impl RootShell {
    pub fn new(config: ShellConfig) -> Self {
        Self {
            config,
            session: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    fn open_session(&self) -> Result<Session> {
        if is_root() {
            Session::spawn("sh", &[])
        } else {
            Session::spawn(&self.config.program, &self.config.args)
        }
    }
}

impl Default for RootShell {
    fn default() -> Self {
        Self::new(ShellConfig::default())
    }
}

impl CommandExecutor for RootShell {
    fn is_available(&self) -> bool {
        is_root() || self.config.su_paths.iter().any(|p| Path::new(p).exists())
    }

    fn execute(&self, command: &str) -> Option<CommandHandle> {
        if !self.is_available() {
            debug!("Privileged execution unavailable");
            return None;
        }

        let mut guard = lock(&self.session);
        if !guard.as_ref().is_some_and(Session::is_alive) {
            *guard = None;
            match self.open_session() {
                Ok(session) => *guard = Some(session),
                Err(e) => {
                    warn!("Failed to open privileged shell: {}", e);
                    return None;
                }
            }
        }

        let session = guard.as_mut()?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        match session.submit(id, command) {
            Ok(handle) => {
                debug!("Issued shell command {}: {}", id, command);
                Some(handle)
            }
            Err(e) => {
                warn!("Privileged shell write failed: {}", e);
                *guard = None;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_shell() -> RootShell {
        RootShell::new(ShellConfig {
            program: "sh".to_string(),
            args: Vec::new(),
            su_paths: vec!["/bin/sh".to_string()],
        })
    }

    #[test]
    fn test_parse_marker() {
        assert_eq!(parse_marker("__HWPROBE_DONE__ 7 0"), Some((7, 0)));
        assert_eq!(parse_marker("__HWPROBE_DONE__ 12 1"), Some((12, 1)));
        assert_eq!(parse_marker("1400000"), None);
        assert_eq!(parse_marker("__HWPROBE_DONE__ x 0"), None);
    }

    #[test]
    fn test_frame_command() {
        let framed = frame_command(3, "cat '/proc/version'");
        assert!(framed.starts_with("cat '/proc/version'\n"));
        assert!(framed.contains("__HWPROBE_DONE__ 3 %d"));
        assert!(framed.ends_with('\n'));
    }

    #[test]
    fn test_dispatch_routes_to_front() {
        let pending = Mutex::new(OutputRouter::default());
        let (tx1, mut h1) = CommandHandle::channel(1);
        let (tx2, mut h2) = CommandHandle::channel(2);
        lock(&pending).queue.push_back(PendingCommand { id: 1, events: tx1 });
        lock(&pending).queue.push_back(PendingCommand { id: 2, events: tx2 });

        dispatch_line(&pending, "first");
        dispatch_line(&pending, "");
        dispatch_line(&pending, "__HWPROBE_DONE__ 1 0");
        dispatch_line(&pending, "second");
        dispatch_line(&pending, "__HWPROBE_DONE__ 2 1");

        assert_eq!(
            h1.events.try_recv().unwrap(),
            ShellEvent::Output("first".to_string())
        );
        assert_eq!(h1.events.try_recv().unwrap(), ShellEvent::Completed(0));
        assert_eq!(
            h2.events.try_recv().unwrap(),
            ShellEvent::Output("second".to_string())
        );
        assert_eq!(h2.events.try_recv().unwrap(), ShellEvent::Completed(1));
        assert!(lock(&pending).queue.is_empty());
    }

    #[test]
    fn test_dispatch_keeps_blank_lines_in_output() {
        let pending = Mutex::new(OutputRouter::default());
        let (tx, mut handle) = CommandHandle::channel(1);
        lock(&pending).queue.push_back(PendingCommand { id: 1, events: tx });

        for line in ["processor : 0", "", "processor : 1", "", "", "__HWPROBE_DONE__ 1 0"] {
            dispatch_line(&pending, line);
        }

        let mut lines = Vec::new();
        while let Ok(ShellEvent::Output(line)) = handle.events.try_recv() {
            lines.push(line);
        }
        assert_eq!(lines, vec!["processor : 0", "", "processor : 1", ""]);
    }

    #[tokio::test]
    async fn test_closed_handle_has_no_exit_code() {
        let (tx, handle) = CommandHandle::channel(1);
        tx.send(ShellEvent::Output("partial".to_string())).unwrap();
        drop(tx);
        let output = handle.collect().await;
        assert_eq!(output.lines, vec!["partial"]);
        assert_eq!(output.exit_code, None);
        assert!(!output.success());
    }

    #[tokio::test]
    async fn test_session_runs_commands_in_order() {
        let shell = plain_shell();
        assert!(shell.is_available());

        let first = shell.execute("echo one; echo two").unwrap();
        let second = shell.execute("printf 'no newline'").unwrap();
        let third = shell.execute("exit_code_test() { return 3; }; exit_code_test").unwrap();

        let first = first.collect().await;
        assert_eq!(first.lines, vec!["one", "two"]);
        assert!(first.success());

        let second = second.collect().await;
        assert_eq!(second.text(), "no newline");

        let third = third.collect().await;
        assert_eq!(third.exit_code, Some(3));
    }

    #[tokio::test]
    async fn test_session_preserves_blank_lines() {
        let shell = plain_shell();
        let out = shell
            .execute("printf 'a\\n\\nb\\n\\n'")
            .unwrap()
            .collect()
            .await;
        assert_eq!(out.lines, vec!["a", "", "b", ""]);
    }

    #[tokio::test]
    async fn test_session_respawns_after_exit() {
        let shell = plain_shell();
        let out = shell.execute("exit 0").unwrap().collect().await;
        assert_eq!(out.exit_code, None);

        // The reader thread may still be draining; retry until a fresh session answers.
        let mut answered = false;
        for _ in 0..50 {
            if let Some(handle) = shell.execute("echo back") {
                let out = handle.collect().await;
                if out.lines == vec!["back"] {
                    answered = true;
                    break;
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert!(answered);
    }

    #[test]
    fn test_default_su_paths_skip_password_su() {
        let config = ShellConfig::default();
        assert_eq!(config.su_paths.len(), 6);
        assert!(!config.su_paths.iter().any(|p| p == "/bin/su"));
        assert!(!config.su_paths.iter().any(|p| p == "/usr/bin/su"));
    }

    #[test]
    fn test_unavailable_without_su() {
        let shell = RootShell::new(ShellConfig {
            su_paths: vec!["/nonexistent/su".to_string()],
            ..ShellConfig::default()
        });
        if !is_root() {
            assert!(!shell.is_available());
            assert!(shell.execute("true").is_none());
        }
    }
}
