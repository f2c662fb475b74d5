//! Tool Router
//!
//! Aggregates several tool servers behind one catalog and dispatches calls
//! to whichever server offers the named tool. Catalogs are fetched
//! concurrently; a server that fails to list is skipped with a warning
//! rather than failing the aggregate.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use futures_util::future::join_all;
use serde_json::Value;
use tracing::{debug, warn};

use switchboard_llm::ToolSpec;

use super::result::ToolOutcome;
use super::server::{ToolError, ToolServer, ToolServerResult};

/// Routes tool calls across one or more servers, first match by name wins.
pub struct ToolRouter {
    servers: Vec<Arc<dyn ToolServer>>,
    /// tool name -> index into `servers`, rebuilt on every catalog fetch.
    routes: RwLock<HashMap<String, usize>>,
}

impl ToolRouter {
    pub fn new(servers: Vec<Arc<dyn ToolServer>>) -> Self {
        Self {
            servers,
            routes: RwLock::new(HashMap::new()),
        }
    }

    pub fn server_count(&self) -> usize {
        self.servers.len()
    }

    /// Fetches every server's catalog concurrently and returns the merged
    /// tool list. When two servers offer the same name, the earlier server
    /// keeps the route and the duplicate spec is dropped.
    pub async fn catalog(&self) -> Vec<ToolSpec> {
        let fetches = self.servers.iter().map(|server| server.list_tools());
        let results = join_all(fetches).await;

        let mut merged: Vec<ToolSpec> = Vec::new();
        let mut routes: HashMap<String, usize> = HashMap::new();

        for (index, result) in results.into_iter().enumerate() {
            match result {
                Ok(tools) => {
                    for tool in tools {
                        if routes.contains_key(&tool.name) {
                            debug!(
                                tool = %tool.name,
                                server = self.servers[index].name(),
                                "duplicate tool name, keeping earlier route"
                            );
                            continue;
                        }
                        routes.insert(tool.name.clone(), index);
                        merged.push(tool);
                    }
                }
                Err(e) => {
                    warn!(server = self.servers[index].name(), error = %e, "catalog fetch failed, skipping server");
                }
            }
        }

        *self.routes.write().unwrap_or_else(|e| e.into_inner()) = routes;
        merged
    }

    fn route_for(&self, name: &str) -> Option<usize> {
        self.routes
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .copied()
    }

    /// Dispatches one call to the server that offers `name`.
    ///
    /// An unknown name triggers one catalog refresh before giving up, so a
    /// server that came online after the last fetch still gets routed to.
    pub async fn dispatch(&self, name: &str, args: &Value) -> ToolServerResult<ToolOutcome> {
        let index = match self.route_for(name) {
            Some(index) => index,
            None => {
                self.catalog().await;
                self.route_for(name)
                    .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?
            }
        };

        self.servers[index].call(name, args).await
    }
}
