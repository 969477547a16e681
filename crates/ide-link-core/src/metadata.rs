//! Connection discovery metadata
//!
//! A running editor advertises itself by writing a small two-line file under
//! the project's metadata directory: the TCP port it listens on, then the
//! path to its own executable. The IDE watches that file to know when (and
//! where) to connect.

use crate::error::{LinkError, Result};
use semver::Version;
use std::path::{Path, PathBuf};

/// File name of the discovery file inside the metadata directory
pub const META_FILE_NAME: &str = "ide_messaging_meta.txt";

/// Connection parameters advertised by a running editor
///
/// Equality is structural; an unchanged file re-parse compares equal, which is
/// how redundant reconnects are suppressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionMetadata {
    pub port: u16,
    pub editor_executable_path: String,
}

impl ConnectionMetadata {
    /// Parse the two-line discovery file content.
    ///
    /// Line 1 is a decimal TCP port, line 2 the editor executable path.
    /// Trailing `\r` is tolerated on both lines.
    pub fn parse(content: &str) -> Result<Self> {
        let mut lines = content.lines();

        let port_line = lines
            .next()
            .ok_or_else(|| LinkError::Metadata("missing port line".into()))?;
        let port = port_line
            .trim()
            .parse::<u16>()
            .map_err(|_| LinkError::Metadata(format!("invalid port: {port_line}")))?;

        let path_line = lines
            .next()
            .ok_or_else(|| LinkError::Metadata("missing executable path line".into()))?;

        Ok(Self {
            port,
            editor_executable_path: path_line.trim_end_matches('\r').to_owned(),
        })
    }
}

/// Resolve the project-relative metadata directory for a given editor version.
///
/// The directory moved between editor generations: major versions before 4
/// keep it under `.mono/metadata`, later ones under `.godot/mono/metadata`.
pub fn metadata_dir(project_dir: &Path, editor_version: &Version) -> PathBuf {
    if editor_version.major < 4 {
        project_dir.join(".mono").join("metadata")
    } else {
        project_dir.join(".godot").join("mono").join("metadata")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_two_lines() {
        let meta = ConnectionMetadata::parse("6008\n/usr/bin/godot\n").unwrap();
        assert_eq!(meta.port, 6008);
        assert_eq!(meta.editor_executable_path, "/usr/bin/godot");
    }

    #[test]
    fn test_parse_tolerates_carriage_returns() {
        let meta = ConnectionMetadata::parse("6008\r\nC:\\Godot\\godot.exe\r\n").unwrap();
        assert_eq!(meta.port, 6008);
        assert_eq!(meta.editor_executable_path, "C:\\Godot\\godot.exe");
    }

    #[test]
    fn test_parse_rejects_bad_port() {
        assert!(ConnectionMetadata::parse("not-a-port\n/usr/bin/godot\n").is_err());
        assert!(ConnectionMetadata::parse("-1\n/usr/bin/godot\n").is_err());
        assert!(ConnectionMetadata::parse("70000\n/usr/bin/godot\n").is_err());
    }

    #[test]
    fn test_parse_rejects_missing_lines() {
        assert!(ConnectionMetadata::parse("").is_err());
        assert!(ConnectionMetadata::parse("6008").is_err());
    }

    #[test]
    fn test_structural_equality() {
        let a = ConnectionMetadata::parse("6008\n/usr/bin/godot\n").unwrap();
        let b = ConnectionMetadata::parse("6008\n/usr/bin/godot\n").unwrap();
        let c = ConnectionMetadata::parse("6009\n/usr/bin/godot\n").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_metadata_dir_by_editor_generation() {
        let project = Path::new("/work/project");
        let v3 = Version::new(3, 5, 2);
        let v4 = Version::new(4, 2, 0);
        assert_eq!(
            metadata_dir(project, &v3),
            PathBuf::from("/work/project/.mono/metadata")
        );
        assert_eq!(
            metadata_dir(project, &v4),
            PathBuf::from("/work/project/.godot/mono/metadata")
        );
    }
}
