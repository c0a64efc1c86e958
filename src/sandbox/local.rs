//! Local sandbox backend
//!
//! Each session is a directory under a root path; commands run through
//! `/bin/sh -c` with that directory as the working directory. Output is
//! read from the child's pipes as it is produced and forwarded chunk by
//! chunk, the same way the guest execution server streams results.
//!
//! Every command gets its own process group. A command ends when its shell
//! exits; output still arriving after that is collected for a short grace
//! period and then dropped, so backgrounded children cannot hold the call
//! open. Dropping the call early (timeout) kills the whole group.
//!
//! This backend isolates files, not processes. Use it for development and
//! tests; production runs go through [`super::HttpSandbox`].

use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::{take_utf8, CommandResult, OutputChunk, Sandbox, SandboxError, SandboxSession};

/// How long output is still collected after the shell exits
const OUTPUT_GRACE: Duration = Duration::from_millis(100);

/// Directory-per-session sandbox
#[derive(Debug, Clone)]
pub struct LocalSandbox {
    root: PathBuf,
}

impl LocalSandbox {
    /// Create a sandbox factory rooted at `root` (created if missing)
    pub fn new(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Create with default directory (~/.sandsmith/sandboxes)
    pub fn default_root() -> std::io::Result<Self> {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        Self::new(PathBuf::from(home).join(".sandsmith").join("sandboxes"))
    }

    fn session_dir(&self, session_id: &str) -> Result<PathBuf, SandboxError> {
        if !is_plain_name(session_id) {
            return Err(SandboxError::NotFound(session_id.to_string()));
        }
        Ok(self.root.join(session_id))
    }

    fn template_dir(&self, template: &str) -> Result<PathBuf, SandboxError> {
        if !is_plain_name(template) {
            return Err(SandboxError::InvalidPath(template.to_string()));
        }
        Ok(self.root.join("templates").join(template))
    }
}

/// Single path component made of ASCII alphanumerics, `-` and `_`
fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[async_trait]
impl Sandbox for LocalSandbox {
    async fn create(&self, template: &str) -> Result<String, SandboxError> {
        let template_dir = self.template_dir(template)?;
        let session_id = format!("sbx-{}", Uuid::now_v7());
        let dir = self.session_dir(&session_id)?;
        tokio::fs::create_dir_all(&dir).await?;

        // Seed the session from a template directory when one exists
        if tokio::fs::metadata(&template_dir).await.is_ok() {
            copy_dir(&template_dir, &dir).await?;
        }

        tracing::debug!(session_id = %session_id, template, "Local sandbox created");
        Ok(session_id)
    }

    async fn connect(&self, session_id: &str) -> Result<Box<dyn SandboxSession>, SandboxError> {
        let dir = self.session_dir(session_id)?;
        if !tokio::fs::metadata(&dir).await.map(|m| m.is_dir()).unwrap_or(false) {
            return Err(SandboxError::NotFound(session_id.to_string()));
        }
        Ok(Box::new(LocalSession {
            id: session_id.to_string(),
            dir,
        }))
    }
}

/// A connected local session
#[derive(Debug)]
pub struct LocalSession {
    id: String,
    dir: PathBuf,
}

impl LocalSession {
    fn resolve(&self, path: &str) -> Result<PathBuf, SandboxError> {
        resolve_in(&self.dir, path)
    }
}

#[async_trait]
impl SandboxSession for LocalSession {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run_command(
        &self,
        command: &str,
        on_output: &mut (dyn FnMut(OutputChunk) + Send),
    ) -> Result<CommandResult, SandboxError> {
        let mut child = Command::new("/bin/sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SandboxError::Command(format!("failed to spawn shell: {}", e)))?;

        let mut guard = ProcessGroupGuard {
            pgid: child.id().map(|id| Pid::from_raw(id as i32)),
            readers: Vec::new(),
        };

        let (tx, mut rx) = mpsc::channel(64);
        if let Some(stdout) = child.stdout.take() {
            guard
                .readers
                .push(tokio::spawn(forward_pipe(stdout, tx.clone(), OutputChunk::Stdout)));
        }
        if let Some(stderr) = child.stderr.take() {
            guard
                .readers
                .push(tokio::spawn(forward_pipe(stderr, tx.clone(), OutputChunk::Stderr)));
        }
        drop(tx);

        let mut result = CommandResult::default();
        let status = loop {
            tokio::select! {
                Some(chunk) = rx.recv() => record(&mut result, chunk, on_output),
                status = child.wait() => break status?,
            }
        };

        let grace = tokio::time::sleep(OUTPUT_GRACE);
        tokio::pin!(grace);
        loop {
            tokio::select! {
                chunk = rx.recv() => match chunk {
                    Some(chunk) => record(&mut result, chunk, on_output),
                    None => break,
                },
                _ = &mut grace => {
                    tracing::debug!(command, "Output still open after shell exit, detaching");
                    break;
                }
            }
        }

        // The command finished on its own; leave its background jobs running
        guard.pgid = None;
        result.exit_code = status.code().unwrap_or(-1);
        Ok(result)
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<(), SandboxError> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, content).await?;
        Ok(())
    }

    async fn read_file(&self, path: &str) -> Result<String, SandboxError> {
        let target = self.resolve(path)?;
        Ok(tokio::fs::read_to_string(&target).await?)
    }

    fn host(&self, port: u16) -> String {
        format!("localhost:{}", port)
    }
}

/// Kills a command's process group and stops its pipe readers when dropped
///
/// Clearing `pgid` spares the group; the readers are stopped either way.
struct ProcessGroupGuard {
    pgid: Option<Pid>,
    readers: Vec<JoinHandle<()>>,
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            if let Err(e) = killpg(pgid, Signal::SIGKILL) {
                tracing::debug!(pgid = %pgid, error = %e, "Process group already gone");
            }
        }
        for reader in &self.readers {
            reader.abort();
        }
    }
}

fn record(
    result: &mut CommandResult,
    chunk: OutputChunk,
    on_output: &mut (dyn FnMut(OutputChunk) + Send),
) {
    match &chunk {
        OutputChunk::Stdout(s) => result.stdout.push_str(s),
        OutputChunk::Stderr(s) => result.stderr.push_str(s),
    }
    on_output(chunk);
}

/// Read a pipe until EOF, sending each chunk tagged with `wrap`
///
/// Only complete UTF-8 sequences are sent; a character split across two
/// reads goes out with the second one.
async fn forward_pipe<R>(mut pipe: R, tx: mpsc::Sender<OutputChunk>, wrap: fn(String) -> OutputChunk)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut buf = vec![0u8; 4096];
    let mut pending = Vec::new();
    loop {
        let n = match pipe.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        pending.extend_from_slice(&buf[..n]);
        let text = take_utf8(&mut pending);
        if !text.is_empty() && tx.send(wrap(text)).await.is_err() {
            return;
        }
    }

    // Truncated sequence at EOF
    if !pending.is_empty() {
        let _ = tx
            .send(wrap(String::from_utf8_lossy(&pending).into_owned()))
            .await;
    }
}

/// Resolve a sandbox path under `root`
///
/// Absolute paths are treated as relative to the session root. Paths that
/// climb out with `..` are rejected.
pub fn resolve_in(root: &Path, path: &str) -> Result<PathBuf, SandboxError> {
    let mut resolved = root.to_path_buf();
    let mut depth = 0usize;

    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => {
                resolved.push(part);
                depth += 1;
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            Component::ParentDir => return Err(SandboxError::InvalidPath(path.to_string())),
        }
    }

    if depth == 0 {
        return Err(SandboxError::InvalidPath(path.to_string()));
    }
    Ok(resolved)
}

/// Recursively copy a template directory into a new session
async fn copy_dir(from: &Path, to: &Path) -> std::io::Result<()> {
    let mut pending = vec![(from.to_path_buf(), to.to_path_buf())];
    while let Some((src, dst)) = pending.pop() {
        tokio::fs::create_dir_all(&dst).await?;
        let mut entries = tokio::fs::read_dir(&src).await?;
        while let Some(entry) = entries.next_entry().await? {
            let target = dst.join(entry.file_name());
            if entry.file_type().await?.is_dir() {
                pending.push((entry.path(), target));
            } else {
                tokio::fs::copy(entry.path(), target).await?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative_and_absolute() {
        let root = Path::new("/srv/sbx");
        assert_eq!(
            resolve_in(root, "app/page.tsx").unwrap(),
            PathBuf::from("/srv/sbx/app/page.tsx")
        );
        assert_eq!(
            resolve_in(root, "/app/./page.tsx").unwrap(),
            PathBuf::from("/srv/sbx/app/page.tsx")
        );
    }

    #[test]
    fn test_resolve_rejects_escape() {
        let root = Path::new("/srv/sbx");
        assert!(matches!(
            resolve_in(root, "../etc/passwd"),
            Err(SandboxError::InvalidPath(_))
        ));
        assert!(matches!(resolve_in(root, "/"), Err(SandboxError::InvalidPath(_))));
    }

    #[tokio::test]
    async fn test_command_streams_both_pipes() {
        let tmp = tempfile::tempdir().unwrap();
        let sandbox = LocalSandbox::new(tmp.path()).unwrap();
        let id = sandbox.create("none").await.unwrap();
        let session = sandbox.connect(&id).await.unwrap();

        let mut chunks = Vec::new();
        let result = session
            .run_command("echo out; echo err >&2; exit 3", &mut |c: OutputChunk| chunks.push(c))
            .await
            .unwrap();

        assert_eq!(result.exit_code, 3);
        assert_eq!(result.stdout, "out\n");
        assert_eq!(result.stderr, "err\n");
        assert!(!chunks.is_empty());
    }

    #[tokio::test]
    async fn test_files_round_trip_in_session_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let sandbox = LocalSandbox::new(tmp.path()).unwrap();
        let id = sandbox.create("none").await.unwrap();
        let session = sandbox.connect(&id).await.unwrap();

        session.write_file("src/lib.rs", "pub fn a() {}").await.unwrap();
        assert_eq!(session.read_file("/src/lib.rs").await.unwrap(), "pub fn a() {}");
        assert!(tmp.path().join(&id).join("src/lib.rs").exists());

        let listing = session.run_command("ls src", &mut |_: OutputChunk| {}).await.unwrap();
        assert_eq!(listing.stdout.trim(), "lib.rs");
    }

    #[tokio::test]
    async fn test_template_is_copied() {
        let tmp = tempfile::tempdir().unwrap();
        let template = tmp.path().join("templates").join("starter");
        std::fs::create_dir_all(template.join("app")).unwrap();
        std::fs::write(template.join("app/page.tsx"), "export default 1").unwrap();

        let sandbox = LocalSandbox::new(tmp.path()).unwrap();
        let id = sandbox.create("starter").await.unwrap();
        let session = sandbox.connect(&id).await.unwrap();
        assert_eq!(session.read_file("app/page.tsx").await.unwrap(), "export default 1");
    }

    #[tokio::test]
    async fn test_template_name_cannot_leave_templates_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let sandbox = LocalSandbox::new(tmp.path().join("root")).unwrap();

        for template in ["../..", "a/b", "/etc", ""] {
            assert!(
                matches!(sandbox.create(template).await, Err(SandboxError::InvalidPath(_))),
                "template {:?} accepted",
                template
            );
        }
        // Nothing was created for the rejected requests
        let sessions = std::fs::read_dir(tmp.path().join("root")).unwrap().count();
        assert_eq!(sessions, 0);
    }

    #[tokio::test]
    async fn test_multibyte_char_split_across_reads() {
        // 4095 ASCII bytes put the two bytes of 'é' on either side of a read
        let input = format!("{}\u{e9}", "a".repeat(4095));
        let (tx, mut rx) = mpsc::channel(8);
        forward_pipe(input.as_bytes(), tx, OutputChunk::Stdout).await;

        let mut received = String::new();
        while let Some(OutputChunk::Stdout(text)) = rx.recv().await {
            received.push_str(&text);
        }
        assert!(!received.contains(char::REPLACEMENT_CHARACTER));
        assert_eq!(received, input);
    }

    #[tokio::test]
    async fn test_background_job_does_not_hold_command_open() {
        let tmp = tempfile::tempdir().unwrap();
        let sandbox = LocalSandbox::new(tmp.path()).unwrap();
        let id = sandbox.create("none").await.unwrap();
        let session = sandbox.connect(&id).await.unwrap();

        let started = std::time::Instant::now();
        let result = session
            .run_command("sleep 4 & echo started", &mut |_: OutputChunk| {})
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout, "started\n");
    }

    #[tokio::test]
    async fn test_dropped_command_kills_process_group() {
        let tmp = tempfile::tempdir().unwrap();
        let sandbox = LocalSandbox::new(tmp.path()).unwrap();
        let id = sandbox.create("none").await.unwrap();
        let session = sandbox.connect(&id).await.unwrap();

        let mut sink = |_: OutputChunk| {};
        let run = session.run_command("(sleep 1; touch late) & sleep 30", &mut sink);
        assert!(tokio::time::timeout(Duration::from_millis(300), run).await.is_err());

        // The background job would have created the file had it survived
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(!tmp.path().join(&id).join("late").exists());
    }

    #[tokio::test]
    async fn test_connect_unknown_session() {
        let tmp = tempfile::tempdir().unwrap();
        let sandbox = LocalSandbox::new(tmp.path()).unwrap();
        assert!(matches!(
            sandbox.connect("sbx-missing").await,
            Err(SandboxError::NotFound(_))
        ));
        assert!(matches!(
            sandbox.connect("../escape").await,
            Err(SandboxError::NotFound(_))
        ));
    }
}
