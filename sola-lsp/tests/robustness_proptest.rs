use proptest::prelude::*;
use sola_lsp::server::LspClient;
use sola_lsp::toolchain::DefaultToolchain;
use sola_lsp::SolaLanguageServer;
use std::sync::Arc;
use tower_lsp::async_trait;
use tower_lsp::lsp_types::{
    CompletionParams, Diagnostic, DidChangeTextDocumentParams, DidOpenTextDocumentParams,
    DocumentSymbolParams, FoldingRangeParams, HoverParams, MessageType, NumberOrString,
    Position, ProgressParamsValue, Range, SemanticTokensParams, TextDocumentContentChangeEvent,
    TextDocumentIdentifier, TextDocumentItem, TextDocumentPositionParams, Url,
    VersionedTextDocumentIdentifier,
};
use tower_lsp::LanguageServer;

// Mock client for testing
#[derive(Clone)]
struct MockClient;

#[async_trait]
impl LspClient for MockClient {
    async fn publish_diagnostics(&self, _: Url, _: Vec<Diagnostic>, _: Option<i32>) {}
    async fn show_message(&self, _: MessageType, _: String) {}
    async fn create_work_done_progress(&self, _: NumberOrString) -> bool {
        false
    }
    async fn send_progress(&self, _: NumberOrString, _: ProgressParamsValue) {}
}

fn server() -> SolaLanguageServer<MockClient, DefaultToolchain> {
    SolaLanguageServer::with_toolchain(MockClient, Arc::new(DefaultToolchain::new()))
}

fn test_uri() -> Url {
    Url::parse("file:///fuzz/test.sola").unwrap()
}

async fn open(server: &SolaLanguageServer<MockClient, DefaultToolchain>, text: String) {
    server
        .did_open(DidOpenTextDocumentParams {
            text_document: TextDocumentItem {
                uri: test_uri(),
                language_id: "sola".to_string(),
                version: 1,
                text,
            },
        })
        .await;
}

async fn query_everything(
    server: &SolaLanguageServer<MockClient, DefaultToolchain>,
    position: Position,
) {
    let at = TextDocumentPositionParams {
        text_document: TextDocumentIdentifier { uri: test_uri() },
        position,
    };
    let _ = server
        .hover(HoverParams {
            text_document_position_params: at.clone(),
            work_done_progress_params: Default::default(),
        })
        .await;
    let _ = server
        .completion(CompletionParams {
            text_document_position: at.clone(),
            work_done_progress_params: Default::default(),
            partial_result_params: Default::default(),
            context: None,
        })
        .await;
    let _ = server.prepare_rename(at).await;
    let _ = server
        .document_symbol(DocumentSymbolParams {
            text_document: TextDocumentIdentifier { uri: test_uri() },
            work_done_progress_params: Default::default(),
            partial_result_params: Default::default(),
        })
        .await;
    let _ = server
        .semantic_tokens_full(SemanticTokensParams {
            text_document: TextDocumentIdentifier { uri: test_uri() },
            work_done_progress_params: Default::default(),
            partial_result_params: Default::default(),
        })
        .await;
    let _ = server
        .folding_range(FoldingRangeParams {
            text_document: TextDocumentIdentifier { uri: test_uri() },
            work_done_progress_params: Default::default(),
            partial_result_params: Default::default(),
        })
        .await;
}

fn sola_like_text() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            Just("class A extends B {".to_string()),
            Just("public function f(int $a): string {".to_string()),
            Just("$x := new A();".to_string()),
            Just("$x->f(1, \"two\");".to_string()),
            Just("use \"other\";".to_string()),
            Just("}".to_string()),
            Just("/* open comment".to_string()),
            "\\PC{0,12}",
        ],
        0..12,
    )
    .prop_map(|lines| lines.join("\n"))
}

proptest! {
    // Fuzz the document parser via did_open
    #[test]
    fn test_document_parsing_robustness(
        text in "\\PC*",
        line in 0u32..8,
        character in 0u32..40,
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let server = server();
            open(&server, text).await;
            // Should not panic
            query_everything(&server, Position::new(line, character)).await;
        });
    }

    // Fuzz incremental edits, including ranges past the end of the document
    #[test]
    fn test_incremental_edit_robustness(
        text in sola_like_text(),
        edits in prop::collection::vec(
            (0u32..10, 0u32..30, 0u32..10, 0u32..30, "\\PC{0,8}"),
            1..6,
        ),
        line in 0u32..10,
        character in 0u32..30,
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let server = server();
            open(&server, text).await;
            let content_changes = edits
                .into_iter()
                .map(|(sl, sc, el, ec, text)| TextDocumentContentChangeEvent {
                    range: Some(Range::new(Position::new(sl, sc), Position::new(el, ec))),
                    range_length: None,
                    text,
                })
                .collect();
            server
                .did_change(DidChangeTextDocumentParams {
                    text_document: VersionedTextDocumentIdentifier {
                        uri: test_uri(),
                        version: 2,
                    },
                    content_changes,
                })
                .await;
            // Should not panic
            query_everything(&server, Position::new(line, character)).await;
        });
    }
}
