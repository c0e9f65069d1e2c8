// Rust guideline compliant 2026-10-18

//! End-of-file waiting for tail mode.
//!
//! A [`Follower`] blocks until the followed file has probably grown. It
//! prefers filesystem change notification and falls back to fixed-interval
//! polling when no watcher can be installed (or no path is known).

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc;

/// Upper bound on a notification wait; a missed event costs at most this long.
const WATCH_RECHECK: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub(crate) struct Follower {
    /// Kept alive for as long as notifications are wanted.
    watcher: Option<RecommendedWatcher>,
    changes: Option<mpsc::Receiver<()>>,
    poll_interval: Duration,
}

impl Follower {
    /// A follower that only polls.
    pub(crate) fn polling(poll_interval: Duration) -> Self {
        Self {
            watcher: None,
            changes: None,
            poll_interval,
        }
    }

    /// A follower woken by modifications of `path`, or a polling one if the
    /// platform watcher cannot be set up.
    pub(crate) fn watching(path: &Path, poll_interval: Duration) -> Self {
        // Capacity 1: one pending wake-up is as good as many.
        let (tx, rx) = mpsc::channel(1);
        let handler = move |result: notify::Result<notify::Event>| {
            if let Ok(event) = result
                && matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
            {
                let _ = tx.try_send(());
            }
        };

        let watcher = notify::recommended_watcher(handler).and_then(|mut watcher| {
            watcher.watch(path, RecursiveMode::NonRecursive)?;
            Ok(watcher)
        });
        match watcher {
            Ok(watcher) => {
                tracing::debug!("reader.tail.watching: path={}", path.display());
                Self {
                    watcher: Some(watcher),
                    changes: Some(rx),
                    poll_interval,
                }
            }
            Err(e) => {
                tracing::warn!(
                    "reader.tail.fallback: no change notification for {} ({e}), polling every {poll_interval:?}",
                    path.display()
                );
                Self::polling(poll_interval)
            }
        }
    }

    /// Wait until the file may have new content.
    pub(crate) async fn wait(&mut self) {
        let Some(changes) = self.changes.as_mut() else {
            tokio::time::sleep(self.poll_interval).await;
            return;
        };
        if let Ok(None) = tokio::time::timeout(WATCH_RECHECK, changes.recv()).await {
            // The watcher thread is gone; degrade to polling from now on.
            tracing::warn!("reader.tail.fallback: watcher stopped, polling");
            self.changes = None;
            self.watcher = None;
        }
    }
}
