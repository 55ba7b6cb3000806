//! Background indexing of the files on disk.
//!
//! Discovery, metadata lookups, reads and parses all happen without holding the index
//! lock. The write lock is taken once per file, only to store the parsed result.
//! [`refresh_stale`] applies the same rule to entries whose files changed after startup.

use crate::progress::Progress;
use crate::server::LspClient;
use crate::toolchain::Toolchain;
use sola_analysis::workspace_index::{read_source, WorkspaceIndex};
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

pub const INDEXING_TITLE: &str = "Indexing Workspace";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IndexSummary {
    pub discovered: usize,
    pub indexed: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub removed: usize,
}

/// Brings `index` up to date with the disk: new and modified files are parsed, files that
/// disappeared are dropped.
pub async fn index_workspace<C, T>(
    index: &RwLock<WorkspaceIndex>,
    toolchain: Arc<T>,
    excludes: &[String],
    progress: &mut Progress<C>,
) -> IndexSummary
where
    C: LspClient,
    T: Toolchain,
{
    let (discovery, max_file_size) = {
        let index = index.read().await;
        (index.discovery(), index.max_file_size())
    };
    let excludes = excludes.to_vec();
    let paths = match tokio::task::spawn_blocking(move || discovery.run(&excludes)).await {
        Ok(paths) => paths,
        Err(err) => {
            error!(error = %err, "workspace discovery failed");
            return IndexSummary::default();
        }
    };

    let total = paths.len();
    let mut summary = IndexSummary {
        discovered: total,
        ..IndexSummary::default()
    };
    info!(files = total, "indexing workspace");

    for (done, path) in paths.iter().enumerate() {
        let modified = tokio::fs::metadata(path)
            .await
            .ok()
            .and_then(|metadata| metadata.modified().ok());
        if !index.read().await.needs_refresh(path, modified) {
            summary.unchanged += 1;
            progress.report(done + 1, total).await;
            continue;
        }

        let toolchain = Arc::clone(&toolchain);
        let owned = path.clone();
        let prepared = tokio::task::spawn_blocking(move || {
            let source = read_source(&owned, max_file_size)?;
            WorkspaceIndex::prepare(source, toolchain.parser())
        })
        .await;
        match prepared {
            Ok(Ok(file)) => {
                index.write().await.insert(file);
                summary.indexed += 1;
            }
            Ok(Err(err)) => {
                warn!(path = %path.display(), error = %err, "skipping file");
                summary.skipped += 1;
            }
            Err(err) => {
                error!(path = %path.display(), error = %err, "indexing task failed");
                summary.skipped += 1;
            }
        }
        progress.report(done + 1, total).await;
    }

    let present: HashSet<&PathBuf> = paths.iter().collect();
    let mut index = index.write().await;
    let gone: Vec<PathBuf> = index
        .files()
        .map(|file| file.path.clone())
        .filter(|path| !present.contains(path))
        .collect();
    for path in &gone {
        index.remove(path);
    }
    summary.removed = gone.len();

    info!(
        indexed = summary.indexed,
        unchanged = summary.unchanged,
        skipped = summary.skipped,
        removed = summary.removed,
        symbols = index.symbol_locations().len(),
        "workspace indexed"
    );
    summary
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Reindexed,
    Unchanged,
    Removed,
    Skipped,
}

/// Re-reads `path` when its modification time moved since it was indexed, and drops it
/// when it no longer exists. Paths outside the indexed directories are left alone.
pub async fn refresh_file<T: Toolchain>(
    index: &RwLock<WorkspaceIndex>,
    toolchain: Arc<T>,
    path: &Path,
) -> RefreshOutcome {
    let modified = match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata.modified().ok(),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            let mut index = index.write().await;
            return match index.remove(path) {
                Some(_) => {
                    debug!(path = %path.display(), "dropped deleted file from the index");
                    RefreshOutcome::Removed
                }
                None => RefreshOutcome::Unchanged,
            };
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "cannot stat indexed file");
            return RefreshOutcome::Skipped;
        }
    };

    let max_file_size = {
        let index = index.read().await;
        if !index.covers(path) || !index.needs_refresh(path, modified) {
            return RefreshOutcome::Unchanged;
        }
        index.max_file_size()
    };

    let owned = path.to_path_buf();
    let prepared = tokio::task::spawn_blocking(move || {
        let source = read_source(&owned, max_file_size)?;
        WorkspaceIndex::prepare(source, toolchain.parser())
    })
    .await;
    match prepared {
        Ok(Ok(file)) => {
            index.write().await.insert(file);
            debug!(path = %path.display(), "reindexed file");
            RefreshOutcome::Reindexed
        }
        Ok(Err(err)) => {
            warn!(path = %path.display(), error = %err, "skipping file");
            RefreshOutcome::Skipped
        }
        Err(err) => {
            error!(path = %path.display(), error = %err, "indexing task failed");
            RefreshOutcome::Skipped
        }
    }
}

/// Refreshes every indexed file whose modification time moved. Returns how many entries
/// changed.
pub async fn refresh_stale<T: Toolchain>(index: &RwLock<WorkspaceIndex>, toolchain: Arc<T>) -> usize {
    let known: Vec<(PathBuf, Option<SystemTime>)> = index
        .read()
        .await
        .files()
        .map(|file| (file.path.clone(), file.modified))
        .collect();
    if known.is_empty() {
        return 0;
    }

    let stale = tokio::task::spawn_blocking(move || {
        known
            .into_iter()
            .filter(|(path, modified)| {
                let current = std::fs::metadata(path).and_then(|metadata| metadata.modified());
                current.ok() != *modified
            })
            .map(|(path, _)| path)
            .collect::<Vec<_>>()
    })
    .await
    .unwrap_or_default();

    let mut changed = 0;
    for path in stale {
        match refresh_file(index, Arc::clone(&toolchain), &path).await {
            RefreshOutcome::Reindexed | RefreshOutcome::Removed => changed += 1,
            RefreshOutcome::Unchanged | RefreshOutcome::Skipped => {}
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_client::RecordingClient;
    use crate::toolchain::DefaultToolchain;
    use std::fs;
    use tempfile::tempdir;
    use tower_lsp::lsp_types::{NumberOrString, WorkDoneProgress};

    async fn progress(client: &RecordingClient) -> Progress<RecordingClient> {
        Progress::begin(
            client.clone(),
            NumberOrString::String("sola-progress-1".into()),
            INDEXING_TITLE,
            true,
        )
        .await
    }

    #[tokio::test]
    async fn indexes_sources_and_reports_progress() {
        let dir = tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("models")).expect("mkdir");
        fs::write(dir.path().join("models/user.sola"), "class User {}\n").expect("write");
        fs::write(dir.path().join("main.sola"), "function main() {}\n").expect("write");
        fs::write(dir.path().join("notes.txt"), "class Ignored {}\n").expect("write");

        let index = RwLock::new(WorkspaceIndex::new(Some(dir.path().to_path_buf())));
        let client = RecordingClient::default();
        let mut job = progress(&client).await;
        let summary = index_workspace(&index, Arc::new(DefaultToolchain::new()), &[], &mut job).await;
        job.end(None).await;

        assert_eq!(summary.discovered, 2);
        assert_eq!(summary.indexed, 2);
        let index = index.read().await;
        assert!(index.location_of("User").is_some());
        assert!(index.location_of("main").is_some());
        assert!(index.location_of("Ignored").is_none());

        let sent = client.progress();
        assert!(matches!(sent.first(), Some((_, WorkDoneProgress::Begin(_)))));
        assert!(matches!(sent.last(), Some((_, WorkDoneProgress::End(_)))));
        assert!(sent.iter().any(|(_, value)| matches!(
            value,
            WorkDoneProgress::Report(report) if report.percentage == Some(100)
        )));
    }

    #[tokio::test]
    async fn reindexing_skips_unchanged_and_drops_deleted_files() {
        let dir = tempdir().expect("tempdir");
        let keep = dir.path().join("keep.sola");
        let gone = dir.path().join("gone.sola");
        fs::write(&keep, "class Keep {}\n").expect("write");
        fs::write(&gone, "class Gone {}\n").expect("write");

        let index = RwLock::new(WorkspaceIndex::new(Some(dir.path().to_path_buf())));
        let toolchain = Arc::new(DefaultToolchain::new());
        let client = RecordingClient::default();
        let mut job = progress(&client).await;
        index_workspace(&index, Arc::clone(&toolchain), &[], &mut job).await;

        fs::remove_file(&gone).expect("remove");
        let summary = index_workspace(&index, toolchain, &[], &mut job).await;
        assert_eq!(summary.unchanged, 1);
        assert_eq!(summary.removed, 1);
        assert!(index.read().await.location_of("Gone").is_none());
        assert!(index.read().await.location_of("Keep").is_some());
    }

    fn touch_later(path: &std::path::Path) {
        let later = SystemTime::now() + std::time::Duration::from_secs(5);
        fs::File::options()
            .write(true)
            .open(path)
            .expect("open")
            .set_modified(later)
            .expect("set mtime");
    }

    #[tokio::test]
    async fn refresh_reparses_only_files_whose_mtime_moved() {
        let dir = tempdir().expect("tempdir");
        let stable = dir.path().join("stable.sola");
        let edited = dir.path().join("edited.sola");
        fs::write(&stable, "class Stable {}\n").expect("write");
        fs::write(&edited, "class Draft {}\n").expect("write");

        let index = RwLock::new(WorkspaceIndex::new(Some(dir.path().to_path_buf())));
        let toolchain = Arc::new(DefaultToolchain::new());
        let client = RecordingClient::default();
        let mut job = progress(&client).await;
        index_workspace(&index, Arc::clone(&toolchain), &[], &mut job).await;
        assert_eq!(refresh_stale(&index, Arc::clone(&toolchain)).await, 0);

        fs::write(&edited, "class Final {}\n").expect("write");
        touch_later(&edited);
        assert_eq!(refresh_stale(&index, Arc::clone(&toolchain)).await, 1);
        {
            let index = index.read().await;
            assert!(index.location_of("Final").is_some());
            assert!(index.location_of("Draft").is_none());
            assert!(index.location_of("Stable").is_some());
        }

        fs::remove_file(&stable).expect("remove");
        assert_eq!(
            refresh_file(&index, Arc::clone(&toolchain), &stable).await,
            RefreshOutcome::Removed
        );
        assert!(index.read().await.location_of("Stable").is_none());
    }

    #[tokio::test]
    async fn refresh_ignores_files_outside_the_index() {
        let dir = tempdir().expect("tempdir");
        let elsewhere = tempdir().expect("tempdir");
        let outside = elsewhere.path().join("outside.sola");
        fs::write(&outside, "class Outside {}\n").expect("write");
        let inside = dir.path().join("late.sola");
        fs::write(&inside, "class Late {}\n").expect("write");

        let index = RwLock::new(WorkspaceIndex::new(Some(dir.path().to_path_buf())));
        let toolchain = Arc::new(DefaultToolchain::new());
        assert_eq!(
            refresh_file(&index, Arc::clone(&toolchain), &outside).await,
            RefreshOutcome::Unchanged
        );
        assert_eq!(
            refresh_file(&index, toolchain, &inside).await,
            RefreshOutcome::Reindexed
        );
        let index = index.read().await;
        assert!(index.location_of("Outside").is_none());
        assert!(index.location_of("Late").is_some());
    }

    #[tokio::test]
    async fn honours_excludes_and_size_limit() {
        let dir = tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("build")).expect("mkdir");
        fs::write(dir.path().join("build/gen.sola"), "class Generated {}\n").expect("write");
        fs::write(dir.path().join("big.sola"), format!("class Big {{}}\n{}", "// pad\n".repeat(64))).expect("write");
        fs::write(dir.path().join("small.sola"), "class Small {}\n").expect("write");

        let index = RwLock::new(
            WorkspaceIndex::new(Some(dir.path().to_path_buf())).with_max_file_size(100),
        );
        let client = RecordingClient::default();
        let mut job = progress(&client).await;
        let excludes = vec!["build/**".to_string()];
        let summary = index_workspace(&index, Arc::new(DefaultToolchain::new()), &excludes, &mut job).await;

        assert_eq!(summary.discovered, 2);
        assert_eq!(summary.indexed, 1);
        assert_eq!(summary.skipped, 1);
        let index = index.read().await;
        assert!(index.location_of("Small").is_some());
        assert!(index.location_of("Big").is_none());
        assert!(index.location_of("Generated").is_none());
    }
}
