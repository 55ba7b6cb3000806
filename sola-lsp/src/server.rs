//! Main language server implementation

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::SolaConfiguration;
use crate::convert::{
    from_lsp_diagnostic, from_lsp_position, from_lsp_range, item_anchor, markdown,
    to_line_range, to_lsp_call_item, to_lsp_code_action, to_lsp_code_lens,
    to_lsp_color_information, to_lsp_color_presentation, to_lsp_completion_item,
    to_lsp_diagnostic, to_lsp_document_link, to_lsp_document_symbol, to_lsp_folding_range,
    to_lsp_highlight, to_lsp_incoming_call, to_lsp_inlay_hint, to_lsp_location,
    to_lsp_outgoing_call, to_lsp_range, to_lsp_selection_range, to_lsp_signature_help,
    to_lsp_symbol_information, to_lsp_text_edit, to_lsp_type_item, to_lsp_workspace_edit,
};
use crate::features::formatting::full_document_edit;
use crate::indexer::{index_workspace, refresh_file, refresh_stale, IndexSummary, INDEXING_TITLE};
use crate::progress::{Progress, ProgressTokens};
use crate::store::DocumentStore;
use crate::toolchain::{DefaultToolchain, Toolchain};
use serde_json::json;
use sola_analysis::completion::{completion_items, resolve_completion, CompletionData};
use sola_analysis::diagnostics::collect_diagnostics;
use sola_analysis::document::DocumentSnapshot;
use sola_analysis::rename::RenameError;
use sola_analysis::semantic_tokens::{
    collect_semantic_tokens, encode_semantic_tokens, tokens_in_range, SolaSemanticToken,
    SEMANTIC_TOKEN_MODIFIERS, SEMANTIC_TOKEN_TYPES,
};
use sola_analysis::workspace::Workspace;
use sola_analysis::workspace_index::WorkspaceIndex;
use sola_analysis::{
    call_hierarchy, code_actions, code_lens, colors, document_links, document_symbols,
    folding_ranges, go_to_definition, hover, inlay_hints, linked_editing, references, rename,
    selection_ranges, signature_help, type_hierarchy,
};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tower_lsp::async_trait;
use tower_lsp::jsonrpc::{Error, Result};
use tower_lsp::lsp_types::notification::Progress as ProgressNotification;
use tower_lsp::lsp_types::request::WorkDoneProgressCreate;
use tower_lsp::lsp_types::{
    CallHierarchyIncomingCall, CallHierarchyIncomingCallsParams, CallHierarchyItem,
    CallHierarchyOutgoingCall, CallHierarchyOutgoingCallsParams, CallHierarchyPrepareParams,
    CallHierarchyServerCapability, CodeActionKind, CodeActionOptions, CodeActionParams,
    CodeActionProviderCapability, CodeActionResponse, CodeLens, CodeLensOptions, CodeLensParams,
    ColorInformation, ColorPresentation, ColorPresentationParams, ColorProviderCapability,
    CompletionItem, CompletionList, CompletionOptions, CompletionParams, CompletionResponse,
    Diagnostic, DidChangeConfigurationParams, DidChangeTextDocumentParams,
    DidCloseTextDocumentParams, DidOpenTextDocumentParams, DidSaveTextDocumentParams,
    DocumentColorParams, DocumentFormattingParams, DocumentHighlight, DocumentHighlightParams,
    DocumentLink, DocumentLinkOptions, DocumentLinkParams, DocumentRangeFormattingParams,
    DocumentSymbolParams, DocumentSymbolResponse, Documentation, FoldingRange,
    FoldingRangeParams, FoldingRangeProviderCapability, GotoDefinitionParams,
    GotoDefinitionResponse, Hover, HoverContents, HoverParams, HoverProviderCapability,
    InitializeParams, InitializeResult, InitializedParams, InlayHint, InlayHintParams,
    LinkedEditingRangeParams, LinkedEditingRangeServerCapabilities, LinkedEditingRanges,
    Location, MessageType, NumberOrString, OneOf, PositionEncodingKind, PrepareRenameResponse,
    ProgressParams,
    ProgressParamsValue, ReferenceParams, RenameOptions, RenameParams, SaveOptions,
    SelectionRange, SelectionRangeParams, SelectionRangeProviderCapability, SemanticToken,
    SemanticTokenModifier, SemanticTokenType, SemanticTokens, SemanticTokensFullOptions,
    SemanticTokensLegend, SemanticTokensOptions, SemanticTokensParams,
    SemanticTokensRangeParams, SemanticTokensRangeResult, SemanticTokensResult,
    SemanticTokensServerCapabilities, ServerCapabilities, ServerInfo, SignatureHelp,
    SignatureHelpOptions, SignatureHelpParams, SymbolInformation, TextDocumentPositionParams,
    TextDocumentSyncCapability, TextDocumentSyncKind, TextDocumentSyncOptions,
    TextDocumentSyncSaveOptions, TextEdit, TypeHierarchyItem, TypeHierarchyPrepareParams,
    TypeHierarchySubtypesParams, TypeHierarchySupertypesParams, Url,
    WorkDoneProgressCreateParams, WorkDoneProgressOptions, WorkspaceEdit, WorkspaceSymbolParams,
};
use tower_lsp::Client;
use tracing::{debug, info, warn};

#[async_trait]
pub trait LspClient: Send + Sync + Clone + 'static {
    async fn publish_diagnostics(&self, uri: Url, diags: Vec<Diagnostic>, version: Option<i32>);
    async fn show_message(&self, typ: MessageType, message: String);
    /// Asks the client to accept a progress token. False when it refused.
    async fn create_work_done_progress(&self, token: NumberOrString) -> bool;
    async fn send_progress(&self, token: NumberOrString, value: ProgressParamsValue);
}

#[async_trait]
impl LspClient for Client {
    async fn publish_diagnostics(&self, uri: Url, diags: Vec<Diagnostic>, version: Option<i32>) {
        self.publish_diagnostics(uri, diags, version).await;
    }

    async fn show_message(&self, typ: MessageType, message: String) {
        self.show_message(typ, message).await;
    }

    async fn create_work_done_progress(&self, token: NumberOrString) -> bool {
        self.send_request::<WorkDoneProgressCreate>(WorkDoneProgressCreateParams { token })
            .await
            .is_ok()
    }

    async fn send_progress(&self, token: NumberOrString, value: ProgressParamsValue) {
        self.send_notification::<ProgressNotification>(ProgressParams { token, value })
            .await;
    }
}

fn semantic_tokens_legend() -> SemanticTokensLegend {
    SemanticTokensLegend {
        token_types: SEMANTIC_TOKEN_TYPES
            .iter()
            .map(|kind| SemanticTokenType::new(kind.as_str()))
            .collect(),
        token_modifiers: SEMANTIC_TOKEN_MODIFIERS
            .iter()
            .copied()
            .map(SemanticTokenModifier::new)
            .collect(),
    }
}

fn server_capabilities() -> ServerCapabilities {
    ServerCapabilities {
        text_document_sync: Some(TextDocumentSyncCapability::Options(TextDocumentSyncOptions {
            open_close: Some(true),
            change: Some(TextDocumentSyncKind::INCREMENTAL),
            will_save: None,
            will_save_wait_until: None,
            save: Some(TextDocumentSyncSaveOptions::SaveOptions(SaveOptions {
                include_text: Some(true),
            })),
        })),
        hover_provider: Some(HoverProviderCapability::Simple(true)),
        completion_provider: Some(CompletionOptions {
            resolve_provider: Some(true),
            trigger_characters: Some(
                [".", ">", ":", "$", "\\"].iter().map(|c| c.to_string()).collect(),
            ),
            work_done_progress_options: WorkDoneProgressOptions::default(),
            all_commit_characters: None,
            ..Default::default()
        }),
        signature_help_provider: Some(SignatureHelpOptions {
            trigger_characters: Some(vec!["(".to_string(), ",".to_string()]),
            retrigger_characters: Some(vec![",".to_string()]),
            work_done_progress_options: WorkDoneProgressOptions::default(),
        }),
        definition_provider: Some(OneOf::Left(true)),
        references_provider: Some(OneOf::Left(true)),
        document_highlight_provider: Some(OneOf::Left(true)),
        document_symbol_provider: Some(OneOf::Left(true)),
        workspace_symbol_provider: Some(OneOf::Left(true)),
        code_action_provider: Some(CodeActionProviderCapability::Options(CodeActionOptions {
            code_action_kinds: Some(vec![
                CodeActionKind::QUICKFIX,
                CodeActionKind::REFACTOR,
                CodeActionKind::REFACTOR_EXTRACT,
                CodeActionKind::SOURCE_ORGANIZE_IMPORTS,
            ]),
            work_done_progress_options: WorkDoneProgressOptions::default(),
            resolve_provider: Some(false),
        })),
        code_lens_provider: Some(CodeLensOptions {
            resolve_provider: Some(false),
        }),
        document_formatting_provider: Some(OneOf::Left(true)),
        document_range_formatting_provider: Some(OneOf::Left(true)),
        rename_provider: Some(OneOf::Right(RenameOptions {
            prepare_provider: Some(true),
            work_done_progress_options: WorkDoneProgressOptions::default(),
        })),
        document_link_provider: Some(DocumentLinkOptions {
            work_done_progress_options: WorkDoneProgressOptions::default(),
            resolve_provider: Some(false),
        }),
        color_provider: Some(ColorProviderCapability::Simple(true)),
        folding_range_provider: Some(FoldingRangeProviderCapability::Simple(true)),
        selection_range_provider: Some(SelectionRangeProviderCapability::Simple(true)),
        linked_editing_range_provider: Some(LinkedEditingRangeServerCapabilities::Simple(true)),
        call_hierarchy_provider: Some(CallHierarchyServerCapability::Simple(true)),
        semantic_tokens_provider: Some(SemanticTokensServerCapabilities::SemanticTokensOptions(
            SemanticTokensOptions {
                work_done_progress_options: WorkDoneProgressOptions::default(),
                legend: semantic_tokens_legend(),
                range: Some(true),
                full: Some(SemanticTokensFullOptions::Bool(true)),
            },
        )),
        inlay_hint_provider: Some(OneOf::Left(true)),
        experimental: Some(json!({ "typeHierarchyProvider": true })),
        ..ServerCapabilities::default()
    }
}

fn to_lsp_semantic_tokens(tokens: &[SolaSemanticToken]) -> Vec<SemanticToken> {
    encode_semantic_tokens(tokens)
        .chunks_exact(5)
        .map(|chunk| SemanticToken {
            delta_line: chunk[0],
            delta_start: chunk[1],
            length: chunk[2],
            token_type: chunk[3],
            token_modifiers_bitset: chunk[4],
        })
        .collect()
}

fn filename_of(uri: &Url) -> String {
    uri.path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default()
        .to_string()
}

fn matches_requested_kind(kind: &CodeActionKind, only: Option<&[CodeActionKind]>) -> bool {
    let Some(only) = only else {
        return true;
    };
    only.iter().any(|requested| {
        let requested = requested.as_str();
        kind.as_str() == requested
            || kind
                .as_str()
                .strip_prefix(requested)
                .is_some_and(|rest| rest.starts_with('.'))
    })
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    (!items.is_empty()).then_some(items)
}

pub struct SolaLanguageServer<C = Client, T = DefaultToolchain> {
    client: C,
    toolchain: Arc<T>,
    documents: DocumentStore,
    index: Arc<RwLock<WorkspaceIndex>>,
    workspace_roots: RwLock<Vec<PathBuf>>,
    config: RwLock<SolaConfiguration>,
    progress_tokens: ProgressTokens,
    progress_supported: AtomicBool,
    indexing: Mutex<Option<JoinHandle<IndexSummary>>>,
}

impl SolaLanguageServer<Client, DefaultToolchain> {
    pub fn new(client: Client) -> Self {
        Self::with_toolchain(client, Arc::new(DefaultToolchain::new()))
    }
}

impl<C, T> SolaLanguageServer<C, T>
where
    C: LspClient,
    T: Toolchain,
{
    pub fn with_toolchain(client: C, toolchain: Arc<T>) -> Self {
        Self {
            client,
            toolchain,
            documents: DocumentStore::default(),
            index: Arc::new(RwLock::new(WorkspaceIndex::default())),
            workspace_roots: RwLock::new(Vec::new()),
            config: RwLock::new(SolaConfiguration::default()),
            progress_tokens: ProgressTokens::default(),
            progress_supported: AtomicBool::new(false),
            indexing: Mutex::new(None),
        }
    }

    pub async fn configuration(&self) -> SolaConfiguration {
        self.config.read().await.clone()
    }

    pub fn index(&self) -> Arc<RwLock<WorkspaceIndex>> {
        Arc::clone(&self.index)
    }

    #[allow(deprecated)]
    async fn update_workspace_roots(&self, params: &InitializeParams) {
        let mut roots = Vec::new();

        if let Some(folders) = params.workspace_folders.as_ref() {
            for folder in folders {
                if let Ok(path) = folder.uri.to_file_path() {
                    roots.push(path);
                }
            }
        }

        if roots.is_empty() {
            if let Some(root_uri) = params.root_uri.as_ref() {
                if let Ok(path) = root_uri.to_file_path() {
                    roots.push(path);
                }
            } else if let Some(root_path) = params.root_path.as_ref() {
                roots.push(PathBuf::from(root_path));
            }
        }

        *self.workspace_roots.write().await = roots;
    }

    async fn apply_settings(&self, settings: &serde_json::Value) -> bool {
        match SolaConfiguration::from_settings(settings) {
            Ok(config) => {
                *self.config.write().await = config;
                true
            }
            Err(err) => {
                warn!(error = %err, "ignoring invalid settings");
                self.client
                    .show_message(MessageType::WARNING, format!("Sola: {err}"))
                    .await;
                false
            }
        }
    }

    /// Replaces the index with an empty one for the first workspace root.
    async fn rebuild_index(&self) {
        let root = self.workspace_roots.read().await.first().cloned();
        let config = self.config.read().await.clone();
        let mut index = WorkspaceIndex::new(root.clone())
            .with_std_lib(config.workspace.std_lib_path.clone())
            .with_max_file_size(config.workspace.max_file_size);
        if let Some(resolver) = root
            .as_deref()
            .and_then(|root| self.toolchain.import_resolver(root))
        {
            index = index.with_resolver(resolver);
        }
        *self.index.write().await = index;
    }

    /// Starts a background indexing job, replacing any job still running.
    pub async fn start_indexing(&self) {
        let excludes = self.config.read().await.workspace.exclude.clone();
        let index = Arc::clone(&self.index);
        let toolchain = Arc::clone(&self.toolchain);
        let client = self.client.clone();
        let token = self.progress_tokens.reserve();
        let supported = self.progress_supported.load(Ordering::Relaxed);

        let handle = tokio::spawn(async move {
            let mut progress = Progress::begin(client, token, INDEXING_TITLE, supported).await;
            let summary = index_workspace(&index, toolchain, &excludes, &mut progress).await;
            progress
                .end(Some(format!("Indexed {} files", summary.indexed + summary.unchanged)))
                .await;
            summary
        });
        if let Some(previous) = self.indexing.lock().await.replace(handle) {
            previous.abort();
        }
    }

    /// Waits for the current indexing job, if any.
    pub async fn wait_for_indexing(&self) -> Option<IndexSummary> {
        let handle = self.indexing.lock().await.take()?;
        match handle.await {
            Ok(summary) => Some(summary),
            Err(err) => {
                warn!(error = %err, "indexing job did not finish");
                None
            }
        }
    }

    async fn snapshot(&self, uri: &Url) -> Option<DocumentSnapshot> {
        self.documents.snapshot(uri, self.toolchain.parser()).await
    }

    /// Re-parses indexed files that changed on disk since they were read.
    async fn refresh_index(&self) {
        let changed = refresh_stale(&self.index, Arc::clone(&self.toolchain)).await;
        if changed > 0 {
            debug!(changed, "refreshed stale index entries");
        }
    }

    /// Brings the index entry for a saved or closed document in line with the disk.
    async fn refresh_indexed_document(&self, uri: &Url) {
        if let Ok(path) = uri.to_file_path() {
            refresh_file(&self.index, Arc::clone(&self.toolchain), &path).await;
        }
    }

    /// Runs `query` against `uri` with every open document and the index in scope.
    async fn with_workspace<R>(
        &self,
        uri: &Url,
        query: impl FnOnce(&DocumentSnapshot, Workspace<'_>) -> R,
    ) -> Option<R> {
        self.refresh_index().await;
        let documents = self.documents.snapshots(self.toolchain.parser()).await;
        let index = self.index.read().await;
        let doc = documents.iter().find(|doc| &doc.uri == uri)?;
        Some(query(doc, Workspace::new(&documents, Some(&*index))))
    }

    async fn with_all<R>(&self, query: impl FnOnce(Workspace<'_>) -> R) -> R {
        self.refresh_index().await;
        let documents = self.documents.snapshots(self.toolchain.parser()).await;
        let index = self.index.read().await;
        query(Workspace::new(&documents, Some(&*index)))
    }

    async fn publish_diagnostics_for(&self, uri: &Url) {
        let config = self.config.read().await.clone();
        let Some(doc) = self.snapshot(uri).await else {
            return;
        };
        let diagnostics = if config.diagnostics.enabled {
            collect_diagnostics(&doc, self.toolchain.type_checker(), &config.diagnostic_settings())
                .iter()
                .map(to_lsp_diagnostic)
                .collect()
        } else {
            Vec::new()
        };
        debug!(%uri, count = diagnostics.len(), "publishing diagnostics");
        self.client
            .publish_diagnostics(uri.clone(), diagnostics, Some(doc.version()))
            .await;
    }
}

#[async_trait]
impl<C, T> tower_lsp::LanguageServer for SolaLanguageServer<C, T>
where
    C: LspClient,
    T: Toolchain,
{
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        self.update_workspace_roots(&params).await;
        if let Some(options) = params.initialization_options.as_ref() {
            self.apply_settings(options).await;
        }
        let progress = params
            .capabilities
            .window
            .as_ref()
            .and_then(|window| window.work_done_progress)
            .unwrap_or(false);
        self.progress_supported.store(progress, Ordering::Relaxed);
        // Columns count Unicode scalar values, which is what UTF-32 means on the wire.
        let position_encoding = params
            .capabilities
            .general
            .as_ref()
            .and_then(|general| general.position_encodings.as_ref())
            .filter(|offered| offered.contains(&PositionEncodingKind::UTF32))
            .map(|_| PositionEncodingKind::UTF32);
        self.rebuild_index().await;
        let roots = self.workspace_roots.read().await.clone();
        info!(?roots, "initialized sola-lsp");

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                position_encoding,
                ..server_capabilities()
            },
            server_info: Some(ServerInfo {
                name: "sola-lsp".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        if self.config.read().await.workspace.index_on_startup {
            self.start_indexing().await;
        }
    }

    async fn shutdown(&self) -> Result<()> {
        if let Some(job) = self.indexing.lock().await.take() {
            job.abort();
        }
        debug!("shutdown requested");
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let item = params.text_document;
        if self
            .documents
            .open(item.uri.clone(), &item.text, item.version)
            .await
        {
            self.publish_diagnostics_for(&item.uri).await;
        }
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        if self
            .documents
            .change(&uri, params.text_document.version, &params.content_changes)
            .await
        {
            self.publish_diagnostics_for(&uri).await;
        }
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        let uri = params.text_document.uri;
        if self.documents.save(&uri, params.text.as_deref()).await {
            self.publish_diagnostics_for(&uri).await;
        }
        self.refresh_indexed_document(&uri).await;
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        self.refresh_indexed_document(&uri).await;
        if self.documents.close(&uri).await {
            self.client.publish_diagnostics(uri, Vec::new(), None).await;
        }
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        if !self.apply_settings(&params.settings).await {
            return;
        }
        for uri in self.documents.uris().await {
            self.publish_diagnostics_for(&uri).await;
        }
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let TextDocumentPositionParams { text_document, position } =
            params.text_document_position_params;
        let result = self
            .with_workspace(&text_document.uri, |doc, workspace| {
                hover::hover(doc, workspace, from_lsp_position(position))
            })
            .await
            .flatten();
        Ok(result.map(|result| Hover {
            contents: HoverContents::Markup(markdown(result.contents)),
            range: Some(to_lsp_range(result.range)),
        }))
    }

    async fn goto_definition(
        &self,
        params: GotoDefinitionParams,
    ) -> Result<Option<GotoDefinitionResponse>> {
        let TextDocumentPositionParams { text_document, position } =
            params.text_document_position_params;
        let location = self
            .with_workspace(&text_document.uri, |doc, workspace| {
                go_to_definition::goto_definition(doc, workspace, from_lsp_position(position))
            })
            .await
            .flatten();
        Ok(location.map(|location| GotoDefinitionResponse::Scalar(to_lsp_location(&location))))
    }

    async fn references(&self, params: ReferenceParams) -> Result<Option<Vec<Location>>> {
        let TextDocumentPositionParams { text_document, position } = params.text_document_position;
        let include_declaration = params.context.include_declaration;
        let locations = self
            .with_workspace(&text_document.uri, |doc, workspace| {
                references::find_references(
                    doc,
                    workspace,
                    from_lsp_position(position),
                    include_declaration,
                )
            })
            .await
            .unwrap_or_default();
        Ok(non_empty(locations.iter().map(to_lsp_location).collect()))
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let TextDocumentPositionParams { text_document, position } = params.text_document_position;
        let settings = self.config.read().await.completion_settings();
        let list = self
            .with_workspace(&text_document.uri, |doc, workspace| {
                completion_items(doc, workspace, from_lsp_position(position), &settings)
            })
            .await;
        Ok(list.map(|list| {
            CompletionResponse::List(CompletionList {
                is_incomplete: list.is_incomplete,
                items: list.items.iter().map(to_lsp_completion_item).collect(),
            })
        }))
    }

    async fn completion_resolve(&self, mut item: CompletionItem) -> Result<CompletionItem> {
        if item.documentation.is_some() {
            return Ok(item);
        }
        let Some(data) = item
            .data
            .clone()
            .and_then(|data| serde_json::from_value::<CompletionData>(data).ok())
        else {
            return Ok(item);
        };
        let documentation = self
            .with_all(|workspace| resolve_completion(&data, workspace))
            .await;
        item.documentation =
            documentation.map(|value| Documentation::MarkupContent(markdown(value)));
        Ok(item)
    }

    async fn signature_help(&self, params: SignatureHelpParams) -> Result<Option<SignatureHelp>> {
        let TextDocumentPositionParams { text_document, position } =
            params.text_document_position_params;
        let help = self
            .with_workspace(&text_document.uri, |doc, workspace| {
                signature_help::signature_help(doc, workspace, from_lsp_position(position))
            })
            .await
            .flatten();
        Ok(help.as_ref().map(to_lsp_signature_help))
    }

    async fn document_symbol(
        &self,
        params: DocumentSymbolParams,
    ) -> Result<Option<DocumentSymbolResponse>> {
        let Some(doc) = self.snapshot(&params.text_document.uri).await else {
            return Ok(None);
        };
        let symbols = doc
            .tree()
            .map(document_symbols::collect_document_symbols)
            .unwrap_or_default();
        Ok(Some(DocumentSymbolResponse::Nested(
            symbols.iter().map(to_lsp_document_symbol).collect(),
        )))
    }

    async fn symbol(
        &self,
        params: WorkspaceSymbolParams,
    ) -> Result<Option<Vec<SymbolInformation>>> {
        let matches = self
            .with_all(|workspace| document_symbols::workspace_symbols(workspace, &params.query))
            .await;
        Ok(non_empty(matches.iter().map(to_lsp_symbol_information).collect()))
    }

    async fn document_highlight(
        &self,
        params: DocumentHighlightParams,
    ) -> Result<Option<Vec<DocumentHighlight>>> {
        let TextDocumentPositionParams { text_document, position } =
            params.text_document_position_params;
        let Some(doc) = self.snapshot(&text_document.uri).await else {
            return Ok(None);
        };
        let highlights = references::document_highlights(&doc, from_lsp_position(position));
        Ok(non_empty(highlights.iter().map(to_lsp_highlight).collect()))
    }

    async fn folding_range(&self, params: FoldingRangeParams) -> Result<Option<Vec<FoldingRange>>> {
        let Some(doc) = self.snapshot(&params.text_document.uri).await else {
            return Ok(None);
        };
        let ranges = doc
            .tree()
            .map(folding_ranges::folding_ranges)
            .unwrap_or_default();
        Ok(Some(ranges.iter().map(to_lsp_folding_range).collect()))
    }

    async fn selection_range(
        &self,
        params: SelectionRangeParams,
    ) -> Result<Option<Vec<SelectionRange>>> {
        let Some(doc) = self.snapshot(&params.text_document.uri).await else {
            return Ok(None);
        };
        let positions: Vec<_> = params.positions.into_iter().map(from_lsp_position).collect();
        let ranges = selection_ranges::selection_ranges(&doc, &positions);
        Ok(Some(ranges.iter().map(to_lsp_selection_range).collect()))
    }

    async fn document_link(&self, params: DocumentLinkParams) -> Result<Option<Vec<DocumentLink>>> {
        let links = self
            .with_workspace(&params.text_document.uri, |doc, workspace| {
                document_links::collect_document_links(doc, workspace)
            })
            .await;
        Ok(links.map(|links| links.iter().map(to_lsp_document_link).collect()))
    }

    async fn formatting(&self, params: DocumentFormattingParams) -> Result<Option<Vec<TextEdit>>> {
        let config = self.config.read().await.clone();
        if !config.formatting.enabled {
            return Ok(None);
        }
        let uri = params.text_document.uri;
        let Some(doc) = self.snapshot(&uri).await else {
            return Ok(None);
        };
        let options = config.format_options(params.options.tab_size, params.options.insert_spaces);
        let Some(formatted) = self
            .toolchain
            .formatter()
            .format(doc.text(), &filename_of(&uri), &options)
        else {
            warn!(%uri, "formatter declined the document");
            return Ok(None);
        };
        let edits = full_document_edit(doc.text(), formatted);
        Ok(Some(edits.iter().map(to_lsp_text_edit).collect()))
    }

    async fn range_formatting(
        &self,
        params: DocumentRangeFormattingParams,
    ) -> Result<Option<Vec<TextEdit>>> {
        let config = self.config.read().await.clone();
        if !config.formatting.enabled {
            return Ok(None);
        }
        let uri = params.text_document.uri;
        let Some(doc) = self.snapshot(&uri).await else {
            return Ok(None);
        };
        let options = config.format_options(params.options.tab_size, params.options.insert_spaces);
        let edits = self.toolchain.formatter().format_range(
            doc.text(),
            &filename_of(&uri),
            &options,
            to_line_range(params.range),
        );
        Ok(edits.map(|edits| edits.iter().map(to_lsp_text_edit).collect()))
    }

    async fn prepare_rename(
        &self,
        params: TextDocumentPositionParams,
    ) -> Result<Option<PrepareRenameResponse>> {
        let Some(doc) = self.snapshot(&params.text_document.uri).await else {
            return Ok(None);
        };
        match rename::prepare_rename(&doc, from_lsp_position(params.position)) {
            Ok(prepared) => Ok(Some(PrepareRenameResponse::RangeWithPlaceholder {
                range: to_lsp_range(prepared.range),
                placeholder: prepared.placeholder,
            })),
            Err(RenameError::NoSymbol) => Ok(None),
            Err(err) => Err(Error::invalid_params(err.to_string())),
        }
    }

    async fn rename(&self, params: RenameParams) -> Result<Option<WorkspaceEdit>> {
        let TextDocumentPositionParams { text_document, position } = params.text_document_position;
        let new_name = params.new_name;
        let result = self
            .with_workspace(&text_document.uri, |doc, workspace| {
                rename::rename(doc, workspace, from_lsp_position(position), &new_name)
            })
            .await;
        match result {
            None | Some(Err(RenameError::NoSymbol)) => Ok(None),
            Some(Ok(edit)) => Ok(Some(to_lsp_workspace_edit(&edit))),
            Some(Err(err)) => Err(Error::invalid_params(err.to_string())),
        }
    }

    async fn code_action(&self, params: CodeActionParams) -> Result<Option<CodeActionResponse>> {
        let diagnostics: Vec<_> = params
            .context
            .diagnostics
            .iter()
            .filter_map(from_lsp_diagnostic)
            .collect();
        let range = from_lsp_range(params.range);
        let only = params.context.only.as_deref();
        let actions = self
            .with_workspace(&params.text_document.uri, |doc, workspace| {
                code_actions::code_actions(doc, workspace, range, &diagnostics)
            })
            .await
            .unwrap_or_default();
        Ok(non_empty(
            actions
                .iter()
                .filter(|action| matches_requested_kind(&action.kind, only))
                .map(to_lsp_code_action)
                .collect(),
        ))
    }

    async fn code_lens(&self, params: CodeLensParams) -> Result<Option<Vec<CodeLens>>> {
        let config = self.config.read().await.clone();
        if !config.code_lens.enabled {
            return Ok(None);
        }
        let settings = config.code_lens_settings();
        let lenses = self
            .with_workspace(&params.text_document.uri, |doc, workspace| {
                code_lens::code_lenses(doc, workspace, &settings)
            })
            .await;
        Ok(lenses.map(|lenses| lenses.iter().map(to_lsp_code_lens).collect()))
    }

    async fn semantic_tokens_full(
        &self,
        params: SemanticTokensParams,
    ) -> Result<Option<SemanticTokensResult>> {
        if !self.config.read().await.semantic_highlighting.enabled {
            return Ok(None);
        }
        let Some(doc) = self.snapshot(&params.text_document.uri).await else {
            return Ok(None);
        };
        let tokens = collect_semantic_tokens(doc.text(), doc.tree(), doc.symbols());
        Ok(Some(SemanticTokensResult::Tokens(SemanticTokens {
            result_id: None,
            data: to_lsp_semantic_tokens(&tokens),
        })))
    }

    async fn semantic_tokens_range(
        &self,
        params: SemanticTokensRangeParams,
    ) -> Result<Option<SemanticTokensRangeResult>> {
        if !self.config.read().await.semantic_highlighting.enabled {
            return Ok(None);
        }
        let Some(doc) = self.snapshot(&params.text_document.uri).await else {
            return Ok(None);
        };
        let tokens = collect_semantic_tokens(doc.text(), doc.tree(), doc.symbols());
        let tokens = tokens_in_range(&tokens, from_lsp_range(params.range));
        Ok(Some(SemanticTokensRangeResult::Tokens(SemanticTokens {
            result_id: None,
            data: to_lsp_semantic_tokens(&tokens),
        })))
    }

    async fn inlay_hint(&self, params: InlayHintParams) -> Result<Option<Vec<InlayHint>>> {
        let config = self.config.read().await.clone();
        if !config.inlay_hints.enabled {
            return Ok(None);
        }
        let settings = config.inlay_hint_settings();
        let range = from_lsp_range(params.range);
        let hints = self
            .with_workspace(&params.text_document.uri, |doc, workspace| {
                inlay_hints::inlay_hints(doc, workspace, range, &settings)
            })
            .await;
        Ok(hints.map(|hints| hints.iter().map(to_lsp_inlay_hint).collect()))
    }

    async fn document_color(&self, params: DocumentColorParams) -> Result<Vec<ColorInformation>> {
        let Some(doc) = self.snapshot(&params.text_document.uri).await else {
            return Ok(Vec::new());
        };
        Ok(colors::document_colors(doc.text())
            .iter()
            .map(to_lsp_color_information)
            .collect())
    }

    async fn color_presentation(
        &self,
        params: ColorPresentationParams,
    ) -> Result<Vec<ColorPresentation>> {
        Ok(
            colors::color_presentations(&params.color, from_lsp_range(params.range))
                .iter()
                .map(to_lsp_color_presentation)
                .collect(),
        )
    }

    async fn linked_editing_range(
        &self,
        params: LinkedEditingRangeParams,
    ) -> Result<Option<LinkedEditingRanges>> {
        let TextDocumentPositionParams { text_document, position } =
            params.text_document_position_params;
        let Some(doc) = self.snapshot(&text_document.uri).await else {
            return Ok(None);
        };
        let linked = linked_editing::linked_editing_ranges(&doc, from_lsp_position(position));
        Ok(linked.map(|linked| LinkedEditingRanges {
            ranges: linked.ranges.iter().copied().map(to_lsp_range).collect(),
            word_pattern: Some(linked.word_pattern),
        }))
    }

    async fn prepare_call_hierarchy(
        &self,
        params: CallHierarchyPrepareParams,
    ) -> Result<Option<Vec<CallHierarchyItem>>> {
        let TextDocumentPositionParams { text_document, position } =
            params.text_document_position_params;
        let item = self
            .with_workspace(&text_document.uri, |doc, workspace| {
                call_hierarchy::prepare_call_hierarchy(doc, workspace, from_lsp_position(position))
            })
            .await
            .flatten();
        Ok(item.map(|item| vec![to_lsp_call_item(&item)]))
    }

    async fn incoming_calls(
        &self,
        params: CallHierarchyIncomingCallsParams,
    ) -> Result<Option<Vec<CallHierarchyIncomingCall>>> {
        let item = params.item;
        let (uri, selection) = item_anchor(item.data.as_ref(), &item.uri, item.selection_range);
        let calls = self
            .with_all(|workspace| {
                call_hierarchy::call_item_at(workspace, &uri, selection)
                    .map(|target| call_hierarchy::incoming_calls(workspace, &target))
                    .unwrap_or_default()
            })
            .await;
        Ok(Some(calls.iter().map(to_lsp_incoming_call).collect()))
    }

    async fn outgoing_calls(
        &self,
        params: CallHierarchyOutgoingCallsParams,
    ) -> Result<Option<Vec<CallHierarchyOutgoingCall>>> {
        let item = params.item;
        let (uri, selection) = item_anchor(item.data.as_ref(), &item.uri, item.selection_range);
        let calls = self
            .with_all(|workspace| {
                call_hierarchy::call_item_at(workspace, &uri, selection)
                    .map(|source| call_hierarchy::outgoing_calls(workspace, &source))
                    .unwrap_or_default()
            })
            .await;
        Ok(Some(calls.iter().map(to_lsp_outgoing_call).collect()))
    }

    async fn prepare_type_hierarchy(
        &self,
        params: TypeHierarchyPrepareParams,
    ) -> Result<Option<Vec<TypeHierarchyItem>>> {
        let TextDocumentPositionParams { text_document, position } =
            params.text_document_position_params;
        let item = self
            .with_workspace(&text_document.uri, |doc, workspace| {
                type_hierarchy::prepare_type_hierarchy(doc, workspace, from_lsp_position(position))
            })
            .await
            .flatten();
        Ok(item.map(|item| vec![to_lsp_type_item(&item)]))
    }

    async fn supertypes(
        &self,
        params: TypeHierarchySupertypesParams,
    ) -> Result<Option<Vec<TypeHierarchyItem>>> {
        let item = params.item;
        let (uri, selection) = item_anchor(item.data.as_ref(), &item.uri, item.selection_range);
        let items = self
            .with_all(|workspace| {
                type_hierarchy::type_item_at(workspace, &uri, selection)
                    .map(|item| type_hierarchy::supertypes(workspace, &item))
                    .unwrap_or_default()
            })
            .await;
        Ok(Some(items.iter().map(to_lsp_type_item).collect()))
    }

    async fn subtypes(
        &self,
        params: TypeHierarchySubtypesParams,
    ) -> Result<Option<Vec<TypeHierarchyItem>>> {
        let item = params.item;
        let (uri, selection) = item_anchor(item.data.as_ref(), &item.uri, item.selection_range);
        let items = self
            .with_all(|workspace| {
                type_hierarchy::type_item_at(workspace, &uri, selection)
                    .map(|item| type_hierarchy::subtypes(workspace, &item))
                    .unwrap_or_default()
            })
            .await;
        Ok(Some(items.iter().map(to_lsp_type_item).collect()))
    }
}
