//! Publishing exported frequency tables
//!
//! Installs copy an artifact to a remote directory or commit it into a
//! Subversion repository; uninstalls remove it again. Marker files record
//! the last completed direction per variant so a scheduler can skip
//! redundant work.

pub mod installer;
pub mod marker;
pub mod transport;

pub use installer::{Installer, artifact_name};
pub use marker::{Direction, MarkerRecord, MarkerState, MarkerStore};
pub use transport::{CommandOutput, CommandRunner, SystemRunner, Transport};
