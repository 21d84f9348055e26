use std::time::Instant;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use crate::config::UpstreamConfig;
use crate::error::UpstreamError;
use crate::models::{ColumnRaw, ProjectRaw, SwimlaneRaw, TaskRaw, UserListing, UserRaw};
use crate::source::TaskSource;

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    id: Value,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

pub struct KanboardClient {
    base_url: String,
    endpoint: String,
    username: String,
    token: String,
    http: reqwest::Client,
}

impl KanboardClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            base_url: config.url.clone(),
            endpoint: format!("{}/jsonrpc.php", config.url),
            username: config.username.clone(),
            token: config.token.clone(),
            http,
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<T, UpstreamError> {
        let result = self.call_raw(method, params).await?;
        Ok(serde_json::from_value(result)?)
    }

    async fn call_raw(&self, method: &str, params: Option<Value>) -> Result<Value, UpstreamError> {
        let id = Uuid::new_v4().to_string();
        let request = RpcRequest {
            jsonrpc: "2.0",
            method,
            id: &id,
            params,
        };

        let started = Instant::now();
        let response = self
            .http
            .post(&self.endpoint)
            .basic_auth(&self.username, Some(&self.token))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let parsed: RpcResponse = serde_json::from_slice(&body)?;
        debug!(
            method,
            bytes = body.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "JSON-RPC call finished"
        );
        into_result(parsed, &id)
    }
}

fn into_result(response: RpcResponse, expected_id: &str) -> Result<Value, UpstreamError> {
    if let Some(error) = response.error {
        return Err(UpstreamError::Rpc {
            code: error.code,
            message: error.message,
        });
    }

    let matches = match &response.id {
        Value::Null => true,
        Value::String(id) => id == expected_id,
        other => other.to_string() == expected_id,
    };
    if !matches {
        return Err(UpstreamError::IdMismatch {
            expected: expected_id.to_string(),
            got: response.id.to_string(),
        });
    }

    Ok(response.result.unwrap_or(Value::Null))
}

/// Kanboard answers `false` or `null` instead of `[]` for empty collections.
fn empty_as_list(value: Value) -> Value {
    match value {
        Value::Null | Value::Bool(false) => Value::Array(Vec::new()),
        other => other,
    }
}

#[async_trait]
impl TaskSource for KanboardClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn fetch_accessible_projects(&self) -> Result<Vec<ProjectRaw>, UpstreamError> {
        let value = self.call_raw("getMyProjects", None).await?;
        Ok(serde_json::from_value(empty_as_list(value))?)
    }

    async fn fetch_tasks(&self, project_id: i64) -> Result<Vec<TaskRaw>, UpstreamError> {
        let value = self
            .call_raw("getAllTasks", Some(json!({ "project_id": project_id })))
            .await?;
        Ok(serde_json::from_value(empty_as_list(value))?)
    }

    async fn fetch_columns(&self, project_id: i64) -> Result<Vec<ColumnRaw>, UpstreamError> {
        let value = self
            .call_raw("getColumns", Some(json!({ "project_id": project_id })))
            .await?;
        Ok(serde_json::from_value(empty_as_list(value))?)
    }

    async fn fetch_swimlanes(&self, project_id: i64) -> Result<Vec<SwimlaneRaw>, UpstreamError> {
        let value = self
            .call_raw("getAllSwimlanes", Some(json!({ "project_id": project_id })))
            .await?;
        Ok(serde_json::from_value(empty_as_list(value))?)
    }

    async fn fetch_project_users(&self, project_id: i64) -> Result<Vec<UserRaw>, UpstreamError> {
        let value = self
            .call_raw("getProjectUsers", Some(json!({ "project_id": project_id })))
            .await?;
        let listing: UserListing = serde_json::from_value(empty_as_list(value))?;
        Ok(listing.into_users())
    }

    async fn fetch_current_user(&self) -> Result<UserRaw, UpstreamError> {
        self.call("getMe", None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(raw: &str) -> RpcResponse {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn result_is_returned_when_ids_match() {
        let parsed = response(r#"{"jsonrpc": "2.0", "id": "abc", "result": [1, 2]}"#);
        assert_eq!(into_result(parsed, "abc").unwrap(), json!([1, 2]));
    }

    #[test]
    fn rpc_errors_surface_verbatim() {
        let parsed = response(
            r#"{"jsonrpc": "2.0", "id": "abc", "error": {"code": -32601, "message": "Method not found"}}"#,
        );
        match into_result(parsed, "abc") {
            Err(UpstreamError::Rpc { code, message }) => {
                assert_eq!(code, -32601);
                assert_eq!(message, "Method not found");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn mismatched_id_is_rejected() {
        let parsed = response(r#"{"jsonrpc": "2.0", "id": "other", "result": true}"#);
        assert!(matches!(
            into_result(parsed, "abc"),
            Err(UpstreamError::IdMismatch { .. })
        ));
    }

    #[test]
    fn empty_collections_normalize_to_lists() {
        assert_eq!(empty_as_list(Value::Bool(false)), json!([]));
        assert_eq!(empty_as_list(Value::Null), json!([]));
        assert_eq!(empty_as_list(json!({"1": "ana"})), json!({"1": "ana"}));
    }

    #[test]
    fn request_serializes_as_json_rpc() {
        let request = RpcRequest {
            jsonrpc: "2.0",
            method: "getMe",
            id: "abc",
            params: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value, json!({"jsonrpc": "2.0", "method": "getMe", "id": "abc"}));
    }
}
