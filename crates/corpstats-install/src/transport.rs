//! Moving artifacts to and from their published location
//!
//! A host string picks the transport:
//! - `svn+<scheme>://...` commits into a Subversion repository
//! - any other non-empty host copies over ssh/rsync
//! - an empty host means the local filesystem
//!
//! External programs are run through [`CommandRunner`] so tests can record
//! invocations instead of spawning processes. Nothing here retries.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use corpstats_core::{AtomicFile, Error, Result};

/// Host prefix selecting the version-control transport.
pub const SVN_PREFIX: &str = "svn+";

/// Captured result of one external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Runs external programs. Spawn failures and timeouts are errors; a
/// non-zero exit is reported through [`CommandOutput::success`].
pub trait CommandRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput>;
}

fn command_line(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run and require a zero exit status.
fn run_checked<R: CommandRunner + ?Sized>(
    runner: &R,
    program: &str,
    args: &[String],
) -> Result<CommandOutput> {
    let out = runner.run(program, args)?;
    if !out.success {
        return Err(Error::Transport {
            command: command_line(program, args),
            message: out.stderr.trim().to_string(),
        });
    }
    Ok(out)
}

/// Spawns real processes, killing any that outlive `timeout`.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    timeout: Duration,
}

impl SystemRunner {
    const POLL_INTERVAL: Duration = Duration::from_millis(50);

    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        let line = command_line(program, args);
        log::debug!("Running: {line}");

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::Transport {
                command: line.clone(),
                message: format!("failed to start: {e}"),
            })?;

        // Pipes are drained concurrently so a chatty child cannot block on a full buffer
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let start = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if start.elapsed() >= self.timeout => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(Error::Transport {
                        command: line,
                        message: format!("timed out after {:?}", self.timeout),
                    });
                }
                Ok(None) => thread::sleep(Self::POLL_INTERVAL),
                Err(e) => {
                    let _ = child.kill();
                    return Err(Error::Transport {
                        command: line,
                        message: e.to_string(),
                    });
                }
            }
        };

        Ok(CommandOutput {
            success: status.success(),
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
        })
    }
}

/// Where artifacts are published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    /// Subversion repository rooted at `base_url`.
    Svn { base_url: String },
    /// Directory on a host reached over ssh.
    Remote { host: String },
    /// Local filesystem.
    Local,
}

impl Transport {
    pub fn for_host(host: &str) -> Self {
        let host = host.trim();
        if host.starts_with(SVN_PREFIX) {
            Self::Svn {
                base_url: svn_base_url(host),
            }
        } else if host.is_empty() {
            Self::Local
        } else {
            Self::Remote {
                host: host.to_string(),
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Svn { .. } => "svn",
            Self::Remote { .. } => "rsync",
            Self::Local => "local",
        }
    }

    /// Human-readable destination of `file_name` under `dir`.
    pub fn destination(&self, dir: &str, file_name: &str) -> String {
        match self {
            Self::Svn { base_url } => svn_url(base_url, file_name),
            Self::Remote { host } => format!("{host}:{}", remote_path(dir, file_name)),
            Self::Local => remote_path(dir, file_name),
        }
    }

    /// Publish `artifact` into `target_dir`, replacing any existing copy.
    ///
    /// The svn transport ignores `target_dir`: the repository location comes
    /// from the host URL.
    pub fn put<R: CommandRunner + ?Sized>(
        &self,
        runner: &R,
        artifact: &Path,
        target_dir: &str,
    ) -> Result<()> {
        let file_name = file_name_of(artifact)?;
        match self {
            Self::Svn { base_url } => {
                let url = svn_url(base_url, &file_name);
                if svn_exists(runner, &url)? {
                    log::info!("Replacing existing {url}");
                    svn_delete(runner, &url, &file_name)?;
                }
                run_checked(
                    runner,
                    "svn",
                    &[
                        "import".into(),
                        "-m".into(),
                        format!("Add {file_name}"),
                        artifact.display().to_string(),
                        url,
                    ],
                )?;
            }
            Self::Remote { host } => {
                run_checked(
                    runner,
                    "ssh",
                    &[
                        host.clone(),
                        "mkdir".into(),
                        "-p".into(),
                        shell_quote(target_dir),
                    ],
                )?;
                run_checked(
                    runner,
                    "rsync",
                    &[
                        "-a".into(),
                        artifact.display().to_string(),
                        format!("{host}:{}/", target_dir.trim_end_matches('/')),
                    ],
                )?;
            }
            Self::Local => copy_local(artifact, &Path::new(target_dir).join(&file_name))?,
        }
        Ok(())
    }

    /// Remove `file_name` from `remote_dir`. Absent files are not an error.
    pub fn remove<R: CommandRunner + ?Sized>(
        &self,
        runner: &R,
        file_name: &str,
        remote_dir: &str,
    ) -> Result<()> {
        match self {
            Self::Svn { base_url } => {
                let url = svn_url(base_url, file_name);
                if svn_exists(runner, &url)? {
                    svn_delete(runner, &url, file_name)?;
                } else {
                    log::info!("{url} not in repository, nothing to remove");
                }
            }
            Self::Remote { host } => {
                run_checked(
                    runner,
                    "ssh",
                    &[
                        host.clone(),
                        "rm".into(),
                        "-f".into(),
                        shell_quote(&remote_path(remote_dir, file_name)),
                    ],
                )?;
            }
            Self::Local => {
                let path = Path::new(remote_dir).join(file_name);
                match fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {
                        log::info!("{} already absent", path.display());
                    }
                    Err(e) => return Err(Error::at_path(&path, e)),
                }
            }
        }
        Ok(())
    }
}

/// Strip the `svn+` selector unless the remainder is `ssh://`, which
/// Subversion only understands as `svn+ssh://`.
fn svn_base_url(host: &str) -> String {
    let host = host.trim_end_matches('/');
    match host.strip_prefix(SVN_PREFIX) {
        Some(rest) if !rest.starts_with("ssh://") => rest.to_string(),
        _ => host.to_string(),
    }
}

fn svn_url(base_url: &str, file_name: &str) -> String {
    format!("{}/{file_name}", base_url.trim_end_matches('/'))
}

fn remote_path(dir: &str, file_name: &str) -> String {
    format!("{}/{file_name}", dir.trim_end_matches('/'))
}

/// Quote `arg` for the POSIX shell ssh runs remote commands through.
/// Plain paths pass unchanged.
fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"/._-+:@,=".contains(&b));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', "'\\''"))
    }
}

/// Subversion error codes meaning "no such entry": `E170000` (illegal
/// target / URL does not exist) and `W155010` (node not found).
const SVN_NOT_FOUND_CODES: &[&str] = &["W170000", "E170000", "W155010"];

/// Whether `url` is present in the repository. Only a "not found" answer
/// counts as absent; any other failure (network, auth) is a transport error.
fn svn_exists<R: CommandRunner + ?Sized>(runner: &R, url: &str) -> Result<bool> {
    let args = ["info".to_string(), url.to_string()];
    let out = runner.run("svn", &args)?;
    if out.success {
        return Ok(true);
    }
    if SVN_NOT_FOUND_CODES.iter().any(|code| out.stderr.contains(code)) {
        return Ok(false);
    }
    Err(Error::Transport {
        command: command_line("svn", &args),
        message: out.stderr.trim().to_string(),
    })
}

fn svn_delete<R: CommandRunner + ?Sized>(runner: &R, url: &str, file_name: &str) -> Result<()> {
    run_checked(
        runner,
        "svn",
        &[
            "delete".into(),
            "-m".into(),
            format!("Remove {file_name}"),
            url.into(),
        ],
    )?;
    Ok(())
}

fn file_name_of(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Error::configuration(format!("{} has no file name", path.display())))
}

/// Copy through a tmp file so the target is never seen half-written.
fn copy_local(source: &Path, target: &Path) -> Result<()> {
    let mut input = File::open(source).map_err(|e| Error::at_path(source, e))?;
    let mut sink = AtomicFile::create(target)?;
    io::copy(&mut input, &mut sink).map_err(|e| Error::at_path(target, e))?;
    sink.commit()
}
