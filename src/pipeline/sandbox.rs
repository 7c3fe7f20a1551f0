//! Remote code execution for the editor's "run" button.
//!
//! This path never fails toward the caller. Missing credentials, a missing
//! backend and remote errors all come back as an [`ExecutionResult`] whose
//! `output` explains what happened.
//!
//! ## Remote protocol
//!
//! [`HttpSandbox`] opens a scoped session per run:
//!
//! ```text
//! POST   {base}/sandboxes                 X-API-Key  → {"sandboxID": "..."}
//! POST   {base}/sandboxes/{id}/execute    {code, language, timeout} → {stdout, stderr}
//! DELETE {base}/sandboxes/{id}            (always attempted)
//! ```

use crate::config::ServerConfig;
use crate::error::SandboxError;
use crate::model::ExecutionResult;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Captured streams of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Execution {
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
}

/// Something that can run code remotely.
pub trait SandboxBackend: Send + Sync {
    fn run(
        &self,
        code: String,
        language: String,
        timeout: Duration,
    ) -> BoxFuture<'static, Result<Execution, SandboxError>>;
}

/// Run `code` in the sandbox, degrading softly whenever it is not usable.
pub async fn execute(
    config: &ServerConfig,
    backend: Option<&dyn SandboxBackend>,
    code: String,
    language: String,
) -> ExecutionResult {
    if !config.sandbox_configured() {
        return ExecutionResult {
            output: "Sandbox execution not available".to_string(),
            success: None,
            error: Some("Sandbox not configured".to_string()),
        };
    }
    let Some(backend) = backend else {
        return ExecutionResult {
            output: "Configure a sandbox URL to enable code execution".to_string(),
            success: None,
            error: Some("Sandbox backend unavailable".to_string()),
        };
    };

    let timeout = Duration::from_secs(config.sandbox_timeout_secs);
    info!("Executing {} bytes of {} in sandbox", code.len(), language);
    match backend.run(code, language, timeout).await {
        Ok(execution) => relay(&execution),
        Err(e) => {
            warn!("Sandbox run failed: {}", e);
            ExecutionResult {
                output: format!("Execution failed: {e}"),
                success: Some(false),
                error: Some(e.to_string()),
            }
        }
    }
}

/// Fold captured streams into the caller-facing result.
fn relay(execution: &Execution) -> ExecutionResult {
    let mut output = String::new();
    if !execution.stdout.is_empty() {
        output.push_str(&format!("Output:\n{}\n", execution.stdout));
    }
    if !execution.stderr.is_empty() {
        output.push_str(&format!("Error:\n{}\n", execution.stderr));
    }
    if output.is_empty() {
        output = "Code executed successfully (no output)".to_string();
    }
    ExecutionResult {
        output,
        success: Some(execution.stderr.is_empty()),
        error: None,
    }
}

// ── HTTP backend ─────────────────────────────────────────────────────────────

/// Grace period on top of the execution timeout for session setup/teardown.
const HTTP_GRACE: Duration = Duration::from_secs(10);

/// [`SandboxBackend`] speaking the session protocol described above.
#[derive(Clone)]
pub struct HttpSandbox {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct SessionCreated {
    #[serde(rename = "sandboxID")]
    sandbox_id: String,
}

#[derive(Serialize)]
struct ExecuteBody<'a> {
    code: &'a str,
    language: &'a str,
    timeout: u64,
}

impl HttpSandbox {
    /// Build a backend from config.
    ///
    /// `Ok(None)` unless both URL and key are set; `Err` when the HTTP client
    /// itself cannot be built (e.g. no TLS backend available).
    pub fn from_config(config: &ServerConfig) -> Result<Option<Self>, SandboxError> {
        let (Some(url), Some(api_key)) = (config.sandbox_url.as_deref(), config.sandbox_api_key.clone())
        else {
            return Ok(None);
        };
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.sandbox_timeout_secs) + HTTP_GRACE)
            .build()
            .map_err(|e| SandboxError::ClientBuild(e.to_string()))?;
        Ok(Some(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
            api_key,
        }))
    }

    async fn open_session(&self) -> Result<String, SandboxError> {
        let resp = self
            .client
            .post(format!("{}/sandboxes", self.base_url))
            .header("X-API-Key", &self.api_key)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| SandboxError::SessionFailed(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(SandboxError::SessionFailed(format!("HTTP {}", resp.status())));
        }
        let created: SessionCreated = resp
            .json()
            .await
            .map_err(|e| SandboxError::SessionFailed(e.to_string()))?;
        debug!("Sandbox session {} opened", created.sandbox_id);
        Ok(created.sandbox_id)
    }

    async fn run_in(
        &self,
        id: &str,
        code: &str,
        language: &str,
        timeout: Duration,
    ) -> Result<Execution, SandboxError> {
        let resp = self
            .client
            .post(format!("{}/sandboxes/{}/execute", self.base_url, id))
            .header("X-API-Key", &self.api_key)
            .json(&ExecuteBody {
                code,
                language,
                timeout: timeout.as_secs(),
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SandboxError::Timeout {
                        secs: timeout.as_secs(),
                    }
                } else {
                    SandboxError::ExecutionFailed(e.to_string())
                }
            })?;
        if !resp.status().is_success() {
            return Err(SandboxError::ExecutionFailed(format!("HTTP {}", resp.status())));
        }
        resp.json()
            .await
            .map_err(|e| SandboxError::ExecutionFailed(e.to_string()))
    }

    async fn close_session(&self, id: &str) {
        let result = self
            .client
            .delete(format!("{}/sandboxes/{}", self.base_url, id))
            .header("X-API-Key", &self.api_key)
            .send()
            .await;
        match result {
            Ok(resp) if resp.status().is_success() => debug!("Sandbox session {} closed", id),
            Ok(resp) => warn!("Closing sandbox {} returned HTTP {}", id, resp.status()),
            Err(e) => warn!("Closing sandbox {} failed: {}", id, e),
        }
    }
}

impl SandboxBackend for HttpSandbox {
    fn run(
        &self,
        code: String,
        language: String,
        timeout: Duration,
    ) -> BoxFuture<'static, Result<Execution, SandboxError>> {
        let this = self.clone();
        Box::pin(async move {
            let id = this.open_session().await?;
            let result = this.run_in(&id, &code, &language, timeout).await;
            this.close_session(&id).await;
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Result<Execution, SandboxError>);

    impl SandboxBackend for Fixed {
        fn run(
            &self,
            _code: String,
            _language: String,
            _timeout: Duration,
        ) -> BoxFuture<'static, Result<Execution, SandboxError>> {
            let r = self.0.clone();
            Box::pin(async move { r })
        }
    }

    fn configured() -> ServerConfig {
        ServerConfig::builder().sandbox_api_key("k").build().unwrap()
    }

    #[tokio::test]
    async fn without_credential_is_informational() {
        let backend = Fixed(Ok(Execution::default()));
        let r = execute(
            &ServerConfig::default(),
            Some(&backend as &dyn SandboxBackend),
            "1".into(),
            "javascript".into(),
        )
        .await;
        assert_eq!(r.success, None);
        assert_eq!(r.error.as_deref(), Some("Sandbox not configured"));
        assert_eq!(r.output, "Sandbox execution not available");
    }

    #[tokio::test]
    async fn without_backend_is_informational() {
        let r = execute(&configured(), None, "1".into(), "python".into()).await;
        assert_eq!(r.success, None);
        assert_eq!(r.error.as_deref(), Some("Sandbox backend unavailable"));
    }

    #[tokio::test]
    async fn stdout_only_is_success() {
        let backend = Fixed(Ok(Execution {
            stdout: "42".into(),
            stderr: String::new(),
        }));
        let r = execute(&configured(), Some(&backend as &dyn SandboxBackend), "x".into(), "js".into()).await;
        assert_eq!(r.output, "Output:\n42\n");
        assert_eq!(r.success, Some(true));
        assert_eq!(r.error, None);
    }

    #[tokio::test]
    async fn stderr_marks_failure_and_is_relayed() {
        let backend = Fixed(Ok(Execution {
            stdout: "partial".into(),
            stderr: "ReferenceError".into(),
        }));
        let r = execute(&configured(), Some(&backend as &dyn SandboxBackend), "x".into(), "js".into()).await;
        assert_eq!(r.output, "Output:\npartial\nError:\nReferenceError\n");
        assert_eq!(r.success, Some(false));
    }

    #[tokio::test]
    async fn silent_run_reports_no_output() {
        let backend = Fixed(Ok(Execution::default()));
        let r = execute(&configured(), Some(&backend as &dyn SandboxBackend), "x".into(), "js".into()).await;
        assert_eq!(r.output, "Code executed successfully (no output)");
        assert_eq!(r.success, Some(true));
    }

    #[tokio::test]
    async fn backend_error_is_soft_failure() {
        let backend = Fixed(Err(SandboxError::Timeout { secs: 30 }));
        let r = execute(&configured(), Some(&backend as &dyn SandboxBackend), "x".into(), "js".into()).await;
        assert_eq!(r.success, Some(false));
        assert!(r.output.starts_with("Execution failed: "));
        assert!(r.error.unwrap().contains("30s"));
    }

    #[test]
    fn http_backend_needs_url_and_key() {
        assert!(HttpSandbox::from_config(&configured()).unwrap().is_none());
        let c = ServerConfig::builder()
            .sandbox_api_key("k")
            .sandbox_url("http://127.0.0.1:9/")
            .build()
            .unwrap();
        let b = HttpSandbox::from_config(&c).unwrap().unwrap();
        assert_eq!(b.base_url, "http://127.0.0.1:9");
    }

    #[tokio::test]
    async fn unreachable_http_backend_is_soft_failure() {
        let c = ServerConfig::builder()
            .sandbox_api_key("k")
            .sandbox_url("http://127.0.0.1:9")
            .sandbox_timeout_secs(1)
            .build()
            .unwrap();
        let backend = HttpSandbox::from_config(&c).unwrap().unwrap();
        let r = execute(&c, Some(&backend as &dyn SandboxBackend), "print(1)".into(), "python".into()).await;
        assert_eq!(r.success, Some(false));
        assert!(r.error.unwrap().contains("open sandbox session"));
    }

    // ── Remote protocol against a local stand-in service ─────────────────

    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{delete, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Remote {
        keys: Mutex<Vec<String>>,
        bodies: Mutex<Vec<Value>>,
        deleted: Mutex<Vec<String>>,
        closes: AtomicUsize,
        fail_execute: bool,
    }

    async fn create(State(remote): State<Arc<Remote>>, headers: HeaderMap) -> Json<Value> {
        let key = headers
            .get("x-api-key")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        remote.keys.lock().unwrap().push(key);
        Json(json!({ "sandboxID": "sb-1" }))
    }

    async fn run(
        State(remote): State<Arc<Remote>>,
        Path(id): Path<String>,
        Json(body): Json<Value>,
    ) -> Result<Json<Value>, StatusCode> {
        assert_eq!(id, "sb-1");
        remote.bodies.lock().unwrap().push(body);
        if remote.fail_execute {
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
        Ok(Json(json!({ "stdout": "1", "stderr": "" })))
    }

    async fn close(State(remote): State<Arc<Remote>>, Path(id): Path<String>) -> StatusCode {
        remote.deleted.lock().unwrap().push(id);
        remote.closes.fetch_add(1, Ordering::SeqCst);
        StatusCode::NO_CONTENT
    }

    /// Serve the sandbox routes on an ephemeral port; returns the base URL.
    async fn spawn_remote(remote: Arc<Remote>) -> String {
        let app = Router::new()
            .route("/sandboxes", post(create))
            .route("/sandboxes/:id/execute", post(run))
            .route("/sandboxes/:id", delete(close))
            .with_state(remote);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/")
    }

    fn pointed_at(url: &str) -> ServerConfig {
        ServerConfig::builder()
            .sandbox_api_key("k")
            .sandbox_url(url)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn http_backend_speaks_session_protocol() {
        let remote = Arc::new(Remote::default());
        let c = pointed_at(&spawn_remote(Arc::clone(&remote)).await);
        let backend = HttpSandbox::from_config(&c).unwrap().unwrap();

        let r = execute(&c, Some(&backend as &dyn SandboxBackend), "print(1)".into(), "python".into()).await;
        assert_eq!(r.output, "Output:\n1\n");
        assert_eq!(r.success, Some(true));

        assert_eq!(*remote.keys.lock().unwrap(), vec!["k".to_string()]);
        assert_eq!(
            *remote.bodies.lock().unwrap(),
            vec![json!({ "code": "print(1)", "language": "python", "timeout": 30 })]
        );
        assert_eq!(*remote.deleted.lock().unwrap(), vec!["sb-1".to_string()]);
        assert_eq!(remote.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn session_is_closed_when_execute_fails() {
        let remote = Arc::new(Remote {
            fail_execute: true,
            ..Remote::default()
        });
        let c = pointed_at(&spawn_remote(Arc::clone(&remote)).await);
        let backend = HttpSandbox::from_config(&c).unwrap().unwrap();

        let r = execute(&c, Some(&backend as &dyn SandboxBackend), "boom()".into(), "python".into()).await;
        assert_eq!(r.success, Some(false));
        assert!(r.error.unwrap().contains("HTTP 500"));
        assert_eq!(remote.bodies.lock().unwrap().len(), 1);
        assert_eq!(remote.closes.load(Ordering::SeqCst), 1);
    }
}
