use std::fmt::Write;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::Deserialize;

use quarry_llm::Embedder;
use quarry_store::{Document, DualIndexStore};

use crate::spec::{ToolError, ToolSpec, wire_schema};

pub const CONTENT_TOOL_NAME: &str = "retrieve_context";
pub const SYMBOL_TOOL_NAME: &str = "retrieve_symbols";

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
struct RetrieveParams {
    /// The query to run. Should be semantically close to the target documents.
    query: String,
    /// Namespace to search in; defaults to the store's namespace.
    #[serde(default)]
    namespace: Option<String>,
}

fn parse_params(args: serde_json::Value) -> Result<RetrieveParams, ToolError> {
    serde_json::from_value(args).map_err(|e| ToolError::InvalidParams(e.to_string()))
}

fn render_documents(docs: &[Document]) -> String {
    if docs.is_empty() {
        return "No matching documents found.".to_owned();
    }
    let mut out = String::from("Retrieved documents:\n");
    for (i, doc) in docs.iter().enumerate() {
        let _ = write!(out, "\n===== Document {} =====\n{}\n", i + 1, doc.text);
    }
    out
}

fn render_symbols(docs: &[Document]) -> String {
    if docs.is_empty() {
        return "No matching symbols found.".to_owned();
    }
    let mut out = String::from("Retrieved symbols:\n");
    for (i, doc) in docs.iter().enumerate() {
        let _ = write!(out, "\n===== Symbol {} =====\n{}\n", i + 1, doc.text);
        if let Some(source) = doc.source() {
            let _ = writeln!(out, "Source: {source}");
        }
    }
    out
}

/// Semantic search over the content collection, bound to one store and one
/// fan-out `k`.
pub fn content_search_tool<E>(store: Arc<DualIndexStore<E>>, k: usize) -> ToolSpec
where
    E: Embedder + 'static,
{
    ToolSpec::new(
        CONTENT_TOOL_NAME,
        "Uses semantic search to retrieve relevant parts of the indexed documentation and \
         knowledge base.",
        wire_schema(&schemars::schema_for!(RetrieveParams)),
        move |args| {
            let store = Arc::clone(&store);
            Box::pin(async move {
                let params = parse_params(args)?;
                let docs = store
                    .similarity_search(&params.query, k, None, params.namespace.as_deref())
                    .await?;
                Ok(render_documents(&docs))
            })
        },
    )
}

/// Semantic search over the symbol collection: class and function
/// definitions with their source locations.
pub fn symbol_search_tool<E>(store: Arc<DualIndexStore<E>>, k: usize) -> ToolSpec
where
    E: Embedder + 'static,
{
    ToolSpec::new(
        SYMBOL_TOOL_NAME,
        "Retrieves class and function definitions and their locations in the indexed codebase.",
        wire_schema(&schemars::schema_for!(RetrieveParams)),
        move |args| {
            let store = Arc::clone(&store);
            Box::pin(async move {
                let params = parse_params(args)?;
                let docs = store
                    .similarity_search_class(&params.query, k, None, params.namespace.as_deref())
                    .await?;
                Ok(render_symbols(&docs))
            })
        },
    )
}

/// Append the known namespaces to each tool description so the model leans
/// toward valid `namespace` arguments. Best-effort: when the store cannot
/// enumerate, descriptions stay as they are.
pub async fn augment_with_namespaces<E: Embedder>(
    tools: &mut [ToolSpec],
    store: &DualIndexStore<E>,
) {
    match store.list_namespaces().await {
        Some(namespaces) if !namespaces.is_empty() => {
            let listed = namespaces.join(", ");
            for tool in tools.iter_mut() {
                let _ = write!(
                    tool.description,
                    " Available namespaces in the index: {listed}."
                );
            }
        }
        _ => {
            tracing::debug!("store reported no namespaces, leaving tool descriptions unchanged");
        }
    }
}
