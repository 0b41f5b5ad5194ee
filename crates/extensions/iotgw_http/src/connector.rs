use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::Router;
use iotgw_core::{Connector, ConnectorError, Kind, Message, Params, Payload, RxCallback};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::Config;

#[derive(Clone)]
struct ServerState {
    config: Arc<Config>,
    callback: Arc<Mutex<Option<RxCallback>>>,
}

async fn handle(
    State(state): State<ServerState>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> StatusCode {
    if method != Method::POST {
        return StatusCode::METHOD_NOT_ALLOWED;
    }

    if body.len() > state.config.max_body_bytes {
        return StatusCode::PAYLOAD_TOO_LARGE;
    }

    let path = uri.path().to_string();
    if !state.config.route_allowed(&path) {
        return StatusCode::NOT_FOUND;
    }

    let Some(callback) = state.callback.lock().await.clone() else {
        warn!(path = %path, "received request before a receiver was wired up");
        return StatusCode::SERVICE_UNAVAILABLE;
    };

    let message = Message::new(Kind::HttpServer, Payload::new(body.to_vec()))
        .with_params(Params::HttpServer { path: path.clone() });

    if callback(message).await {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// An HTTP server that turns POST request bodies into inbound messages.
///
/// The listener and its accept loop live on a background task for the life
/// of the connector; `close` aborts that task. This connector is source-only
/// in practice (nothing sends a "response" to it), but it still implements
/// `send` so misconfigured bridges fail with a clear error instead of a
/// missing trait method.
pub struct HttpServerConnector {
    callback: Arc<Mutex<Option<RxCallback>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HttpServerConnector {
    pub async fn open(params: serde_json::Value) -> Result<Arc<dyn Connector>, ConnectorError> {
        let cfg: Config = if params.is_null() {
            Config::default()
        } else {
            serde_json::from_value(params)
                .map_err(|err| ConnectorError::DeviceConfig(err.to_string()))?
        };
        let addr = cfg.socket_addr().map_err(ConnectorError::DeviceConfig)?;

        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|err| ConnectorError::Connect(format!("bind {addr}: {err}")))?;
        info!(addr = %addr, "HTTP server listening");

        let callback: Arc<Mutex<Option<RxCallback>>> = Arc::new(Mutex::new(None));
        let state = ServerState {
            config: Arc::new(cfg),
            callback: callback.clone(),
        };
        let router = Router::new().fallback(handle).with_state(state);

        let task = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, router).await {
                warn!(error = %err, "HTTP server task exited");
            }
        });

        Ok(Arc::new(HttpServerConnector {
            callback,
            task: Mutex::new(Some(task)),
        }))
    }
}

#[async_trait]
impl Connector for HttpServerConnector {
    fn kind(&self) -> Kind {
        Kind::HttpServer
    }

    async fn start_receiving(&self, callback: RxCallback) -> Result<(), ConnectorError> {
        *self.callback.lock().await = Some(callback);
        Ok(())
    }

    async fn send(&self, _message: &Message) -> Result<(), ConnectorError> {
        Err(ConnectorError::Send(
            "the HTTP server connector has no response channel to send on".into(),
        ))
    }

    async fn close(&self) -> Result<(), ConnectorError> {
        if let Some(handle) = self.task.lock().await.take() {
            handle.abort();
        }
        debug!("HTTP server connector closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    async fn post(addr: &str, path: &str, body: &str) -> (u16, String) {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = format!(
            "POST {path} HTTP/1.1\r\nHost: localhost\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(request.as_bytes()).await.unwrap();
        stream.shutdown().await.unwrap();

        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        let status_line = response.lines().next().unwrap();
        let status: u16 = status_line.split_whitespace().nth(1).unwrap().parse().unwrap();
        (status, response)
    }

    #[tokio::test]
    async fn accepted_post_returns_200() {
        let connector = HttpServerConnector::open(serde_json::json!({ "bind": "127.0.0.1:18099" }))
            .await
            .unwrap();
        connector
            .start_receiving(Arc::new(|_message| Box::pin(async { true })))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let (status, _) = post("127.0.0.1:18099", "/telemetry", "hello").await;
        assert_eq!(status, 200);

        connector.close().await.unwrap();
    }

    #[tokio::test]
    async fn dispatch_failure_surfaces_as_500() {
        let connector = HttpServerConnector::open(serde_json::json!({ "bind": "127.0.0.1:18100" }))
            .await
            .unwrap();
        connector
            .start_receiving(Arc::new(|_message| Box::pin(async { false })))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let (status, _) = post("127.0.0.1:18100", "/telemetry", "hello").await;
        assert_eq!(status, 500);

        connector.close().await.unwrap();
    }

    #[tokio::test]
    async fn route_not_in_allow_list_is_rejected_with_404() {
        let connector = HttpServerConnector::open(serde_json::json!({
            "bind": "127.0.0.1:18101",
            "routes": ["/telemetry"],
        }))
        .await
        .unwrap();
        connector
            .start_receiving(Arc::new(|_message| Box::pin(async { true })))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let (status, _) = post("127.0.0.1:18101", "/not-allowed", "hello").await;
        assert_eq!(status, 404);

        connector.close().await.unwrap();
    }
}
