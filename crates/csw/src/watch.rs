//! File-backed source and modification-time flush signal

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use cachestream::{from_future, BoxError, FlushSignal, Source};
use futures::stream::{self, StreamExt};

/// Source reading the whole file on every subscription
pub fn file_source(path: PathBuf) -> impl Source<String> {
    from_future(move || {
        let path = path.clone();
        async move { tokio::fs::read_to_string(&path).await }
    })
}

/// Signal firing once the file's modification time moves past `since`.
///
/// The first check runs immediately. A file that can no longer be stat'ed
/// fails the signal.
pub fn modified_since(path: PathBuf, since: SystemTime, poll: Duration) -> FlushSignal {
    stream::once(wait_for_change(path, since, poll))
        .chain(stream::pending())
        .boxed()
}

async fn wait_for_change(path: PathBuf, since: SystemTime, poll: Duration) -> Result<(), BoxError> {
    let mut ticks = tokio::time::interval(poll);
    loop {
        ticks.tick().await;
        let modified = tokio::fs::metadata(&path).await?.modified()?;
        if modified > since {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use tokio::time::timeout;

    const POLL: Duration = Duration::from_millis(10);

    #[tokio::test]
    async fn test_file_source_reads_contents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, "first").unwrap();

        let mut values = file_source(path).subscribe();
        assert_eq!(values.next().await.unwrap().unwrap(), "first");
    }

    #[tokio::test]
    async fn test_file_source_missing_file() {
        let dir = TempDir::new().unwrap();
        let mut values = file_source(dir.path().join("missing.txt")).subscribe();
        assert!(values.next().await.unwrap().is_err());
    }

    #[tokio::test]
    async fn test_fires_for_older_instant() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, "first").unwrap();

        let mut signal = modified_since(path, SystemTime::UNIX_EPOCH, POLL);
        assert!(matches!(signal.next().await, Some(Ok(()))));
    }

    #[tokio::test]
    async fn test_silent_until_modified() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, "first").unwrap();
        let since = SystemTime::now() + Duration::from_secs(3600);

        let mut signal = modified_since(path, since, POLL);
        assert!(timeout(Duration::from_millis(50), signal.next()).await.is_err());
    }

    #[tokio::test]
    async fn test_fails_when_file_disappears() {
        let dir = TempDir::new().unwrap();
        let mut signal = modified_since(dir.path().join("gone.txt"), SystemTime::now(), POLL);
        assert!(matches!(signal.next().await, Some(Err(_))));
    }
}
