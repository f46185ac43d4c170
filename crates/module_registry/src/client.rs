//! JSON-over-HTTP transport to remote modules.
//!
//! | call            | request                                  |
//! |-----------------|------------------------------------------|
//! | route handler   | `POST <url>/rpc/<handler>` with [`RpcRequest`] |
//! | socket event    | `POST <url>/socket<namespace>` with [`SocketRequest`] |
//! | liveness        | `GET <url>/health`                       |
//!
//! A 2xx answer carries the result. Any other status carries an
//! [`RpcError`] body `{code, message}`.

use crate::error::RegistryError;
use async_trait::async_trait;
use reqwest::{Client, Response};
use route_system::{
    ModuleClient, RouteError, RpcError, RpcRequest, RpcResponse, SocketHandler, SocketRequest,
    SocketResponse,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

/// Reaches one module over HTTP.
#[derive(Debug, Clone)]
pub struct HttpModuleClient {
    module: String,
    base_url: String,
    client: Client,
}

impl HttpModuleClient {
    /// Creates a client for `module` served at `base_url`.
    ///
    /// `connect_timeout` bounds connection setup only. Per-call deadlines are
    /// applied by the router.
    pub fn new(
        module: impl Into<String>,
        base_url: impl Into<String>,
        connect_timeout: Duration,
    ) -> Result<Self, RegistryError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| RegistryError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(module, base_url, client))
    }

    /// Creates a client sharing an existing connection pool.
    pub fn with_client(module: impl Into<String>, base_url: impl Into<String>, client: Client) -> Self {
        Self {
            module: module.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<T: serde::Serialize>(&self, url: &str, body: &T) -> Result<Response, RpcError> {
        trace!("📤 POST {}", url);
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| RpcError::internal(format!("module '{}' unreachable: {}", self.module, e)))?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_else(|_| status.to_string());
        Err(serde_json::from_str::<RpcError>(&body).unwrap_or_else(|_| {
            RpcError::internal(format!("module '{}' answered {}: {}", self.module, status, body))
        }))
    }
}

#[async_trait]
impl ModuleClient for HttpModuleClient {
    async fn call(&self, handler: &str, request: RpcRequest) -> Result<RpcResponse, RpcError> {
        let url = format!("{}/rpc/{}", self.base_url, handler);
        self.post(&url, &request)
            .await?
            .json::<RpcResponse>()
            .await
            .map_err(|e| RpcError::internal(format!("module '{}' sent an invalid response: {}", self.module, e)))
    }

    async fn execute_socket(
        &self,
        namespace: &str,
        request: SocketRequest,
    ) -> Result<Option<SocketResponse>, RpcError> {
        let url = format!("{}/socket{}", self.base_url, namespace);
        let body = self.post(&url, &request).await?.bytes().await.map_err(|e| {
            RpcError::internal(format!("module '{}' response body failed: {}", self.module, e))
        })?;
        if body.is_empty() {
            return Ok(None);
        }
        let value: Value = serde_json::from_slice(&body)
            .map_err(|e| RpcError::internal(format!("module '{}' sent invalid JSON: {}", self.module, e)))?;
        SocketResponse::from_value(value).map_err(|e| RpcError::internal(e.to_string()))
    }

    async fn ping(&self) -> Result<(), RpcError> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RpcError::internal(format!("module '{}' unreachable: {}", self.module, e)))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(RpcError::internal(format!(
                "module '{}' health check answered {}",
                self.module,
                response.status()
            )))
        }
    }
}

/// Namespace handler that forwards every event to a remote module.
#[derive(Debug)]
pub struct RemoteSocketHandler {
    name: String,
    namespace: String,
    client: Arc<dyn ModuleClient>,
}

impl RemoteSocketHandler {
    pub fn new(module: &str, namespace: impl Into<String>, client: Arc<dyn ModuleClient>) -> Self {
        let namespace = namespace.into();
        Self {
            name: format!("{module}{namespace}"),
            namespace,
            client,
        }
    }
}

#[async_trait]
impl SocketHandler for RemoteSocketHandler {
    async fn execute_request(&self, request: SocketRequest) -> Result<Option<SocketResponse>, RouteError> {
        self.client
            .execute_socket(&self.namespace, request)
            .await
            .map_err(RouteError::from)
    }

    fn handler_name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use route_system::{EventResponse, RpcStatus, SocketId};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> HttpModuleClient {
        HttpModuleClient::new("email", server.uri(), Duration::from_secs(1)).unwrap()
    }

    fn request() -> RpcRequest {
        RpcRequest {
            params: r#"{"to":"a@b.c"}"#.to_string(),
            context: json!({}),
            headers: Default::default(),
            path: "/api/email/send".to_string(),
        }
    }

    #[tokio::test]
    async fn test_call_posts_to_handler() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rpc/sendEmail"))
            .and(body_partial_json(json!({"params": r#"{"to":"a@b.c"}"#, "path": "/api/email/send"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "{\"sent\":true}"})))
            .expect(1)
            .mount(&server)
            .await;

        let response = client(&server).call("sendEmail", request()).await.unwrap();
        assert_eq!(response.decode(), json!({"sent": true}));
    }

    #[tokio::test]
    async fn test_error_body_is_decoded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rpc/sendEmail"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(json!({"code": "INVALID_ARGUMENT", "message": "Unknown template"})),
            )
            .mount(&server)
            .await;

        let err = client(&server).call("sendEmail", request()).await.unwrap_err();
        assert_eq!(err.code, RpcStatus::InvalidArgument);
        assert_eq!(err.message, "Unknown template");
    }

    #[tokio::test]
    async fn test_unstructured_failure_is_internal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let err = client(&server).call("sendEmail", request()).await.unwrap_err();
        assert_eq!(err.code, RpcStatus::Internal);
        assert!(err.message.contains("overloaded"));
    }

    #[tokio::test]
    async fn test_unreachable_module() {
        let client = HttpModuleClient::new("ghost", "http://127.0.0.1:1", Duration::from_millis(200)).unwrap();
        let err = client.call("anything", request()).await.unwrap_err();
        assert_eq!(err.code, RpcStatus::Internal);
        assert!(client.ping().await.is_err());
    }

    #[tokio::test]
    async fn test_socket_events_are_forwarded() {
        let server = MockServer::start().await;
        let socket_id = SocketId::new();
        Mock::given(method("POST"))
            .and(path("/socket/chat"))
            .and(body_partial_json(json!({"event": "say", "socketId": socket_id.to_string()})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([{"event": "said", "data": ["hi"]}])),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/socket/quiet"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client: Arc<dyn ModuleClient> = Arc::new(client(&server));
        let handler = RemoteSocketHandler::new("chat", "/chat", client.clone());
        let response = handler
            .execute_request(SocketRequest::event("say", socket_id, vec![json!("hi")]))
            .await
            .unwrap();
        assert_eq!(
            response,
            Some(SocketResponse::Events(vec![EventResponse::reply("said", vec![json!("hi")])]))
        );

        let quiet = client
            .execute_socket("/quiet", SocketRequest::connect(socket_id))
            .await
            .unwrap();
        assert_eq!(quiet, None);
    }

    #[tokio::test]
    async fn test_ping() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        assert!(client(&server).ping().await.is_ok());
    }
}
