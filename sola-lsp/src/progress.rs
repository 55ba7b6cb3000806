//! Work-done progress for long-running jobs.

use crate::server::LspClient;
use std::sync::atomic::{AtomicU64, Ordering};
use tower_lsp::lsp_types::{
    NumberOrString, ProgressParamsValue, WorkDoneProgress, WorkDoneProgressBegin,
    WorkDoneProgressEnd, WorkDoneProgressReport,
};

/// Hands out unique `sola-progress-N` tokens.
#[derive(Debug, Default)]
pub struct ProgressTokens {
    next: AtomicU64,
}

impl ProgressTokens {
    pub fn reserve(&self) -> NumberOrString {
        let id = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        NumberOrString::String(format!("sola-progress-{id}"))
    }
}

/// One job's progress. Reports are dropped silently when the client refused the token
/// or does not support progress.
pub struct Progress<C> {
    client: C,
    token: NumberOrString,
    active: bool,
    last_percentage: Option<u32>,
}

impl<C: LspClient> Progress<C> {
    pub async fn begin(client: C, token: NumberOrString, title: &str, supported: bool) -> Self {
        let active = supported && client.create_work_done_progress(token.clone()).await;
        let progress = Self {
            client,
            token,
            active,
            last_percentage: None,
        };
        progress
            .send(WorkDoneProgress::Begin(WorkDoneProgressBegin {
                title: title.to_string(),
                cancellable: Some(false),
                message: None,
                percentage: Some(0),
            }))
            .await;
        progress
    }

    pub fn token(&self) -> &NumberOrString {
        &self.token
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Reports `done` of `total`, skipping updates that would not move the percentage.
    pub async fn report(&mut self, done: usize, total: usize) {
        let percentage = if total == 0 {
            100
        } else {
            (done.min(total) * 100 / total) as u32
        };
        if self.last_percentage == Some(percentage) {
            return;
        }
        self.last_percentage = Some(percentage);
        self.send(WorkDoneProgress::Report(WorkDoneProgressReport {
            cancellable: Some(false),
            message: Some(format!("{done}/{total} files")),
            percentage: Some(percentage),
        }))
        .await;
    }

    pub async fn end(self, message: Option<String>) {
        self.send(WorkDoneProgress::End(WorkDoneProgressEnd { message }))
            .await;
    }

    async fn send(&self, value: WorkDoneProgress) {
        if self.active {
            self.client
                .send_progress(self.token.clone(), ProgressParamsValue::WorkDone(value))
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_client::RecordingClient;

    #[test]
    fn tokens_are_unique_and_prefixed() {
        let tokens = ProgressTokens::default();
        assert_eq!(tokens.reserve(), NumberOrString::String("sola-progress-1".into()));
        assert_eq!(tokens.reserve(), NumberOrString::String("sola-progress-2".into()));
    }

    #[tokio::test]
    async fn reports_begin_report_end_under_one_token() {
        let client = RecordingClient::default();
        let token = NumberOrString::String("sola-progress-7".into());
        let mut progress = Progress::begin(client.clone(), token.clone(), "Indexing Workspace", true).await;
        progress.report(1, 4).await;
        progress.report(1, 4).await;
        progress.report(4, 4).await;
        progress.end(Some("indexed 4 files".into())).await;

        let sent = client.progress();
        assert_eq!(sent.len(), 4);
        assert!(sent.iter().all(|(sent_token, _)| *sent_token == token));
        assert!(matches!(
            &sent[0].1,
            WorkDoneProgress::Begin(begin) if begin.title == "Indexing Workspace"
        ));
        assert!(matches!(
            &sent[1].1,
            WorkDoneProgress::Report(report) if report.percentage == Some(25)
        ));
        assert!(matches!(&sent[3].1, WorkDoneProgress::End(_)));
    }

    #[tokio::test]
    async fn silent_without_client_support() {
        let client = RecordingClient::default();
        let mut progress =
            Progress::begin(client.clone(), NumberOrString::Number(1), "Indexing Workspace", false).await;
        assert!(!progress.is_active());
        progress.report(1, 2).await;
        progress.end(None).await;
        assert!(client.progress().is_empty());
    }
}
