//! Client doubles for server tests.

use crate::server::LspClient;
use std::sync::{Arc, Mutex};
use tower_lsp::async_trait;
use tower_lsp::lsp_types::{
    Diagnostic, MessageType, NumberOrString, ProgressParamsValue, Url, WorkDoneProgress,
};

#[derive(Clone, Default)]
pub struct NoopClient;

#[async_trait]
impl LspClient for NoopClient {
    async fn publish_diagnostics(&self, _: Url, _: Vec<Diagnostic>, _: Option<i32>) {}
    async fn show_message(&self, _: MessageType, _: String) {}
    async fn create_work_done_progress(&self, _: NumberOrString) -> bool {
        true
    }
    async fn send_progress(&self, _: NumberOrString, _: ProgressParamsValue) {}
}

pub type Published = (Url, Vec<Diagnostic>, Option<i32>);

/// Remembers everything the server sent.
#[derive(Clone, Default)]
pub struct RecordingClient {
    diagnostics: Arc<Mutex<Vec<Published>>>,
    messages: Arc<Mutex<Vec<(MessageType, String)>>>,
    progress: Arc<Mutex<Vec<(NumberOrString, WorkDoneProgress)>>>,
}

impl RecordingClient {
    pub fn diagnostics(&self) -> Vec<Published> {
        self.diagnostics.lock().unwrap().clone()
    }

    /// The most recent diagnostics published for `uri`.
    pub fn latest(&self, uri: &Url) -> Option<Vec<Diagnostic>> {
        self.diagnostics
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(published, _, _)| published == uri)
            .map(|(_, diagnostics, _)| diagnostics.clone())
    }

    pub fn messages(&self) -> Vec<(MessageType, String)> {
        self.messages.lock().unwrap().clone()
    }

    pub fn progress(&self) -> Vec<(NumberOrString, WorkDoneProgress)> {
        self.progress.lock().unwrap().clone()
    }
}

#[async_trait]
impl LspClient for RecordingClient {
    async fn publish_diagnostics(&self, uri: Url, diags: Vec<Diagnostic>, version: Option<i32>) {
        self.diagnostics.lock().unwrap().push((uri, diags, version));
    }

    async fn show_message(&self, typ: MessageType, message: String) {
        self.messages.lock().unwrap().push((typ, message));
    }

    async fn create_work_done_progress(&self, _: NumberOrString) -> bool {
        true
    }

    async fn send_progress(&self, token: NumberOrString, value: ProgressParamsValue) {
        let ProgressParamsValue::WorkDone(progress) = value;
        self.progress.lock().unwrap().push((token, progress));
    }
}
