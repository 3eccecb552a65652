//! Ensure a variant's artifact is installed or uninstalled, and record it
//!
//! Both operations are "ensure" operations: repeating them is safe and
//! leaves the same markers behind. Markers change only after the transport
//! step succeeded.
//!
//! Two operations on the same variant must not run concurrently; the marker
//! update is not atomic across both files. Callers (the scheduler) are
//! responsible for serializing them.

use std::path::Path;

use corpstats_core::{Codec, Error, Result};

use crate::marker::{Direction, MarkerRecord, MarkerStore, hash_file};
use crate::transport::{CommandRunner, Transport};

/// File name of a corpus' published table, `stats_<id>.csv[.<ext>]`.
pub fn artifact_name(corpus_id: &str, codec: Option<Codec>) -> String {
    let base = format!("stats_{corpus_id}.csv");
    match codec {
        Some(codec) => codec.apply_to_name(&base),
        None => base,
    }
}

/// Runs installs and uninstalls through one transport runner and marker dir.
pub struct Installer<'a, R: CommandRunner + ?Sized> {
    runner: &'a R,
    markers: &'a MarkerStore,
}

impl<'a, R: CommandRunner + ?Sized> Installer<'a, R> {
    pub fn new(runner: &'a R, markers: &'a MarkerStore) -> Self {
        Self { runner, markers }
    }

    /// Publish `artifact` for `variant` and mark it installed.
    pub fn install(&self, variant: &str, artifact: &Path, host: &str, target_dir: &str) -> Result<()> {
        if target_dir.trim().is_empty() {
            return Err(Error::configuration("target directory must be specified"));
        }
        if !artifact.is_file() {
            return Err(Error::io(
                format!("installing {variant}"),
                std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("{} does not exist; export it first", artifact.display()),
                ),
            ));
        }

        let transport = Transport::for_host(host);
        let file_name = artifact
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let destination = transport.destination(target_dir, &file_name);
        log::info!(
            "Installing {} to {destination} ({})",
            artifact.display(),
            transport.name()
        );

        let hash = hash_file(artifact).map_err(|e| Error::at_path(artifact, e))?;
        transport.put(self.runner, artifact, target_dir)?;

        self.markers.remove(Direction::Uninstall, variant)?;
        self.markers.write(
            &MarkerRecord::new(Direction::Install, variant, &file_name, &destination)
                .with_hash(hash),
        )?;
        log::info!("Installed {variant}");
        Ok(())
    }

    /// Remove `variant`'s published table and mark it uninstalled.
    pub fn uninstall(
        &self,
        variant: &str,
        corpus_id: &str,
        host: &str,
        remote_dir: &str,
        codec: Option<Codec>,
    ) -> Result<()> {
        if remote_dir.trim().is_empty() {
            return Err(Error::configuration("remote directory must be specified"));
        }

        let transport = Transport::for_host(host);
        let file_name = artifact_name(corpus_id, codec);
        let destination = transport.destination(remote_dir, &file_name);
        log::info!("Removing {destination} ({})", transport.name());

        transport.remove(self.runner, &file_name, remote_dir)?;

        self.markers.remove(Direction::Install, variant)?;
        self.markers.write(&MarkerRecord::new(
            Direction::Uninstall,
            variant,
            &file_name,
            &destination,
        ))?;
        log::info!("Uninstalled {variant}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::MarkerState;
    use crate::transport::fake::RecordingRunner;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        markers: MarkerStore,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let markers = MarkerStore::new(dir.path().join("markers"));
            Self { dir, markers }
        }

        fn artifact(&self, name: &str) -> std::path::PathBuf {
            let path = self.dir.path().join("export").join(name);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, "token\tcount\na\t3\n").unwrap();
            path
        }

        fn target(&self) -> String {
            self.dir.path().join("published").to_string_lossy().into_owned()
        }
    }

    #[test]
    fn artifact_names() {
        assert_eq!(artifact_name("X", None), "stats_X.csv");
        assert_eq!(artifact_name("X", Some(Codec::Bzip2)), "stats_X.csv.bz2");
    }

    #[test]
    fn install_requires_target_dir() {
        let fx = Fixture::new();
        let runner = RecordingRunner::default();
        let inst = Installer::new(&runner, &fx.markers);
        let err = inst
            .install("freq_list", &fx.artifact("stats_X.csv"), "", "")
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(ref m) if m == "target directory must be specified"));
        assert_eq!(fx.markers.state("freq_list"), MarkerState::Unknown);
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn uninstall_requires_remote_dir() {
        let fx = Fixture::new();
        let runner = RecordingRunner::default();
        let inst = Installer::new(&runner, &fx.markers);
        let err = inst.uninstall("freq_list", "X", "host", " ", None).unwrap_err();
        assert!(matches!(err, Error::Configuration(ref m) if m == "remote directory must be specified"));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn svn_install_commits_to_repo_url() {
        let fx = Fixture::new();
        let runner = RecordingRunner::default();
        let inst = Installer::new(&runner, &fx.markers);
        let artifact = fx.artifact("stats_X.csv");
        inst.install("freq_list", &artifact, "svn+https://x/repo", "ignored")
            .unwrap();

        let calls = runner.calls();
        assert_eq!(
            calls.last().unwrap(),
            &format!(
                "svn import -m Add stats_X.csv {} https://x/repo/stats_X.csv",
                artifact.display()
            )
        );
        assert_eq!(fx.markers.state("freq_list"), MarkerState::Installed);
        let record = fx
            .markers
            .read(Direction::Install, "freq_list")
            .unwrap()
            .unwrap();
        assert_eq!(record.destination, "https://x/repo/stats_X.csv");
        assert!(record.blake3.is_some());
    }

    #[test]
    fn failed_transport_writes_no_marker() {
        let fx = Fixture::new();
        let runner = RecordingRunner::default().failing("rsync");
        let inst = Installer::new(&runner, &fx.markers);
        let err = inst
            .install("freq_list", &fx.artifact("stats_X.csv"), "host", "/srv")
            .unwrap_err();
        assert!(err.is_io());
        assert!(!fx.markers.exists(Direction::Install, "freq_list"));
    }

    #[test]
    fn missing_artifact_is_io_error() {
        let fx = Fixture::new();
        let runner = RecordingRunner::default();
        let inst = Installer::new(&runner, &fx.markers);
        let err = inst
            .install("freq_list", &fx.dir.path().join("nope.csv"), "", "/srv")
            .unwrap_err();
        assert!(err.is_io());
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn install_uninstall_are_idempotent() {
        let fx = Fixture::new();
        let runner = RecordingRunner::default();
        let inst = Installer::new(&runner, &fx.markers);
        let artifact = fx.artifact("stats_X.csv.gz");
        let target = fx.target();

        inst.install("freq_list_compressed", &artifact, "", &target).unwrap();
        inst.install("freq_list_compressed", &artifact, "", &target).unwrap();
        assert!(fx.markers.exists(Direction::Install, "freq_list_compressed"));
        assert!(!fx.markers.exists(Direction::Uninstall, "freq_list_compressed"));
        assert!(Path::new(&target).join("stats_X.csv.gz").is_file());

        inst.uninstall("freq_list_compressed", "X", "", &target, Some(Codec::Gzip))
            .unwrap();
        assert_eq!(
            fx.markers.state("freq_list_compressed"),
            MarkerState::Uninstalled
        );
        assert!(!fx.markers.exists(Direction::Install, "freq_list_compressed"));
        assert!(!Path::new(&target).join("stats_X.csv.gz").exists());

        inst.uninstall("freq_list_compressed", "X", "", &target, Some(Codec::Gzip))
            .unwrap();
        assert_eq!(
            fx.markers.state("freq_list_compressed"),
            MarkerState::Uninstalled
        );

        inst.install("freq_list_compressed", &artifact, "", &target).unwrap();
        assert_eq!(fx.markers.state("freq_list_compressed"), MarkerState::Installed);
    }

    #[test]
    fn remote_uninstall_uses_compressed_name() {
        let fx = Fixture::new();
        let runner = RecordingRunner::default();
        let inst = Installer::new(&runner, &fx.markers);
        inst.uninstall("freq_list_compressed", "X", "host", "/srv", Some(Codec::Zstd))
            .unwrap();
        assert_eq!(runner.calls(), ["ssh host rm -f /srv/stats_X.csv.zst"]);
    }

    #[test]
    fn unreachable_svn_keeps_installed_marker() {
        let fx = Fixture::new();
        let inst_ok = RecordingRunner::default();
        Installer::new(&inst_ok, &fx.markers)
            .install("freq_list", &fx.artifact("stats_X.csv"), "svn+https://x/repo", "-")
            .unwrap();
        assert_eq!(fx.markers.state("freq_list"), MarkerState::Installed);

        let runner = RecordingRunner::default()
            .failing_with("svn", "svn: E170013: Unable to connect to a repository at URL");
        let err = Installer::new(&runner, &fx.markers)
            .uninstall("freq_list", "X", "svn+https://x/repo", "-", None)
            .unwrap_err();
        assert!(matches!(err, Error::Transport { .. }));
        assert_eq!(fx.markers.state("freq_list"), MarkerState::Installed);
        assert!(!fx.markers.exists(Direction::Uninstall, "freq_list"));
    }
}
