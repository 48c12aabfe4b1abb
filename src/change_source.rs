//! Candidate discovery.
//!
//! A [`CandidateSource`] reports capture files that might be ready for
//! ingestion. Sources make no promise about readiness or uniqueness; the
//! pipeline decides.
//!
//! - [`WatchSource`]: filesystem notifications with a grace period.
//! - [`PollSource`]: periodic directory scans.
//! - [`scan_directory`]: the startup backlog listing shared by both.

pub mod poll_source;
pub mod source_trait;
pub mod watch_source;

pub use poll_source::PollSource;
pub use source_trait::{has_extension, scan_directory, CandidateSource, SourceHandle};
pub use watch_source::WatchSource;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    #[test]
    fn extension_must_match_exactly() {
        assert!(has_extension(Path::new("/s/a.tty"), "tty"));
        assert!(!has_extension(Path::new("/s/a.tty.partial"), "tty"));
        assert!(!has_extension(Path::new("/s/tty"), "tty"));
        assert!(!has_extension(Path::new("/s/a.TTY"), "tty"));
    }

    #[tokio::test]
    async fn scan_lists_matching_files_sorted() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("b.tty"), "").unwrap();
        std::fs::write(dir.path().join("a.tty"), "").unwrap();
        std::fs::write(dir.path().join("c.txt"), "").unwrap();
        std::fs::create_dir(dir.path().join("nested.tty")).unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/d.tty"), "").unwrap();

        #[cfg(unix)]
        std::os::unix::fs::symlink(dir.path().join("a.tty"), dir.path().join("link.tty")).unwrap();

        let found = scan_directory(dir.path(), "tty").await.unwrap();
        let mut expected = vec![dir.path().join("a.tty"), dir.path().join("b.tty")];
        #[cfg(unix)]
        expected.push(dir.path().join("link.tty"));
        assert_eq!(found, expected);
    }

    #[tokio::test]
    async fn scan_of_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        assert!(scan_directory(&dir.path().join("nope"), "tty").await.is_err());
    }
}
