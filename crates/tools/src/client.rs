//! HTTP Tool Server
//!
//! Client for one remote tool catalog speaking a small JSON protocol:
//! `POST {base}/tools/list` returns the catalog, `POST {base}/tools/call`
//! invokes one tool and returns its outcome.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use switchboard_llm::ToolSpec;

use super::result::ToolOutcome;
use super::server::{ToolError, ToolServer, ToolServerResult};

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Configuration for an HTTP tool server connection.
#[derive(Debug, Clone)]
pub struct HttpToolServerConfig {
    /// Request timeout duration.
    pub timeout: Duration,
    /// Optional bearer token for authenticated servers.
    pub auth_token: Option<String>,
}

impl Default for HttpToolServerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            auth_token: None,
        }
    }
}

/// A remote tool catalog reached over HTTP.
pub struct HttpToolServer {
    name: String,
    client: reqwest::Client,
    base_url: Url,
    config: HttpToolServerConfig,
}

impl HttpToolServer {
    /// Creates a client for the catalog at `base_url` with default configuration.
    pub fn new(name: impl Into<String>, base_url: &str) -> ToolServerResult<Self> {
        Self::with_config(name, base_url, HttpToolServerConfig::default())
    }

    /// Creates a client for the catalog at `base_url`.
    pub fn with_config(
        name: impl Into<String>,
        base_url: &str,
        config: HttpToolServerConfig,
    ) -> ToolServerResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| ToolError::InvalidEndpoint(format!("{}: {}", base_url, e)))?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ToolError::Unreachable(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            name: name.into(),
            client,
            base_url,
            config,
        })
    }

    fn endpoint(&self, path: &str) -> ToolServerResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ToolError::InvalidEndpoint(format!("{}: {}", path, e)))
    }

    async fn post_json<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> ToolServerResult<R> {
        let endpoint = self.endpoint(path)?;
        let mut request = self.client.post(endpoint).json(body);
        if let Some(token) = &self.config.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ToolError::Unreachable(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(ToolError::CallFailed(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| ToolError::MalformedResponse(e.to_string()))
    }
}

#[async_trait]
impl ToolServer for HttpToolServer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_tools(&self) -> ToolServerResult<Vec<ToolSpec>> {
        let response: ListToolsResponse = self
            .post_json("tools/list", &serde_json::json!({}))
            .await?;

        Ok(response
            .tools
            .into_iter()
            .map(|t| ToolSpec::new(t.name, t.description, t.input_schema))
            .collect())
    }

    async fn call(&self, name: &str, args: &Value) -> ToolServerResult<ToolOutcome> {
        let request = CallToolRequest {
            name: name.to_string(),
            arguments: args.clone(),
        };
        let response: CallToolResponse = self.post_json("tools/call", &request).await?;

        Ok(if response.is_error {
            ToolOutcome::err(response.content)
        } else {
            ToolOutcome::ok(response.content)
        })
    }
}

#[derive(Debug, Deserialize)]
struct ListToolsResponse {
    tools: Vec<RemoteToolSpec>,
}

#[derive(Debug, Deserialize)]
struct RemoteToolSpec {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default = "default_schema")]
    input_schema: Value,
}

fn default_schema() -> Value {
    serde_json::json!({"type": "object", "properties": {}})
}

#[derive(Debug, Serialize)]
struct CallToolRequest {
    name: String,
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct CallToolResponse {
    #[serde(default)]
    content: String,
    #[serde(default)]
    is_error: bool,
}
