//! `store_memory` and `search_memory`, the model's view of the vector store.

use std::sync::Arc;

use serde_json::json;

use super::store::{NewMemory, QueryOptions, VectorStore};
use crate::tools::{AgentTool, AgentToolParameters, Tool};

pub const NO_MEMORY_FOUND: &str = "No memory found";

/// Both memory tools over one store.
pub fn memory_tools(store: Arc<dyn VectorStore>) -> Vec<Arc<dyn Tool>> {
    vec![store_memory_tool(store.clone()), search_memory_tool(store)]
}

pub fn store_memory_tool(store: Arc<dyn VectorStore>) -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "store_memory",
        "Save a piece of information to long-term memory so it can be recalled in later conversations.",
        AgentToolParameters::object()
            .string("title", "Short title for the memory", false)
            .string("content", "The information to remember", true)
            .build(),
        move |args, _ctx| {
            let store = store.clone();
            async move {
                let memory = NewMemory {
                    title: args.get_str_opt("title").map(str::to_string),
                    content: args.get_str("content")?.to_string(),
                };
                let id = store.insert(memory).await?;
                Ok(json!({ "id": id }))
            }
        },
    ))
}

pub fn search_memory_tool(store: Arc<dyn VectorStore>) -> Arc<dyn Tool> {
    Arc::new(AgentTool::new(
        "search_memory",
        "Search long-term memory for information related to a query.",
        AgentToolParameters::object()
            .string("query", "What to look for", true)
            .number("threshold", "Minimum similarity between 0 and 1 (default 0.7)", false)
            .number("limit", "Maximum number of results (default 5)", false)
            .build(),
        move |args, _ctx| {
            let store = store.clone();
            async move {
                let query = args.get_str("query")?.to_string();
                let defaults = QueryOptions::default();
                let options = QueryOptions {
                    threshold: args.get_f64_opt("threshold").unwrap_or(defaults.threshold),
                    limit: args.get_usize_opt("limit").unwrap_or(defaults.limit),
                };
                let results = store.query(&query, options).await?;
                if results.is_empty() {
                    return Ok(json!(NO_MEMORY_FOUND));
                }
                Ok(serde_json::to_value(results)?)
            }
        },
    ))
}
