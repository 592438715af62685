//! Mapepire daemon client.
//!
//! Speaks the Mapepire JSON-over-WebSocket protocol used to reach Db2 for i.
//! Each request carries an `id`; the daemon answers with a message echoing it.

use super::{ColumnInfo, Connection, Daemon, Dialect, Row, Statement, Value};
use crate::config::DaemonServer;
use crate::error::{Db2iError, Result};
use async_trait::async_trait;
use base64::prelude::{Engine as _, BASE64_STANDARD};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{Connector, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};
use url::Url;

/// Time allowed for the WebSocket handshake.
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Application name reported to the daemon.
const APPLICATION: &str = concat!("db2i-tools/", env!("CARGO_PKG_VERSION"));

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Hands out connections to a Mapepire daemon.
#[derive(Debug, Clone)]
pub struct MapepireDaemon {
    server: DaemonServer,
}

impl MapepireDaemon {
    /// Creates a daemon handle for the given server. No connection is opened.
    pub fn new(server: DaemonServer) -> Self {
        Self { server }
    }

    /// Returns the WebSocket endpoint of the daemon.
    pub fn url(&self) -> Result<Url> {
        let url = format!("wss://{}:{}/db/", self.server.host, self.server.port);
        Url::parse(&url)
            .map_err(|e| Db2iError::config(format!("Invalid daemon address '{url}': {e}")))
    }
}

#[async_trait]
impl Daemon for MapepireDaemon {
    async fn connect(&self) -> Result<Box<dyn Connection>> {
        let connection = MapepireConnection::open(&self.server, self.url()?).await?;
        Ok(Box::new(connection))
    }

    fn dialect(&self) -> Dialect {
        Dialect::Db2i
    }

    fn describe(&self) -> String {
        format!(
            "{}@{}:{}",
            self.server.user, self.server.host, self.server.port
        )
    }
}

/// Reply to any request.
#[derive(Debug, Deserialize)]
struct ServerResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    success: bool,
    error: Option<String>,
    sql_state: Option<String>,
    #[serde(default)]
    has_results: bool,
    #[serde(default)]
    is_done: bool,
    metadata: Option<QueryMetadata>,
    data: Option<Vec<serde_json::Map<String, serde_json::Value>>>,
    job: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryMetadata {
    #[serde(default)]
    columns: Vec<ColumnMetadata>,
}

#[derive(Debug, Deserialize)]
struct ColumnMetadata {
    name: String,
    #[serde(rename = "type", default)]
    data_type: String,
}

impl ServerResponse {
    /// Converts a `success: false` reply into a query error.
    fn into_result(self) -> Result<Self> {
        if self.success {
            return Ok(self);
        }
        let message = self
            .error
            .clone()
            .unwrap_or_else(|| "The daemon reported an unknown error".to_string());
        Err(Db2iError::query(match &self.sql_state {
            Some(state) => format!("{message} (SQLSTATE {state})"),
            None => message,
        }))
    }

    fn take_rows(&mut self) -> Vec<Row> {
        self.data
            .take()
            .unwrap_or_default()
            .into_iter()
            .map(|record| {
                record
                    .into_iter()
                    .map(|(column, value)| (column, Value::from(value)))
                    .collect()
            })
            .collect()
    }

    fn take_columns(&mut self) -> Vec<ColumnInfo> {
        self.metadata
            .take()
            .map(|m| {
                m.columns
                    .into_iter()
                    .map(|c| ColumnInfo::new(c.name, c.data_type))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// One WebSocket session with the daemon.
pub struct MapepireConnection {
    ws: WsStream,
    next_id: u64,
    job: Option<String>,
}

impl MapepireConnection {
    /// Opens the socket, authenticates and performs the `connect` handshake.
    pub async fn open(server: &DaemonServer, url: Url) -> Result<Self> {
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| Db2iError::config(format!("Invalid daemon request: {e}")))?;

        let credentials = BASE64_STANDARD.encode(format!("{}:{}", server.user, server.password));
        let header = HeaderValue::from_str(&format!("Basic {credentials}"))
            .map_err(|e| Db2iError::config(format!("Invalid credentials: {e}")))?;
        request.headers_mut().insert(AUTHORIZATION, header);

        let tls = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(server.ignore_unauthorized)
            .danger_accept_invalid_hostnames(server.ignore_unauthorized)
            .build()
            .map_err(|e| Db2iError::connection(format!("Failed to set up TLS: {e}")))?;

        debug!("Opening WebSocket to {url}");
        let (ws, _response) = tokio::time::timeout(
            Duration::from_secs(CONNECT_TIMEOUT_SECS),
            tokio_tungstenite::connect_async_tls_with_config(
                request,
                None,
                false,
                Some(Connector::NativeTls(tls)),
            ),
        )
        .await
        .map_err(|_| {
            Db2iError::connection(format!(
                "Connection to {}:{} timed out after {CONNECT_TIMEOUT_SECS} seconds",
                server.host, server.port
            ))
        })?
        .map_err(|e| map_connection_error(e, server))?;

        let mut connection = Self {
            ws,
            next_id: 0,
            job: None,
        };

        let (_, response) = connection
            .request(json!({
                "type": "connect",
                "technique": "tcp",
                "application": APPLICATION,
            }))
            .await?;

        if !response.success {
            let message = response
                .error
                .unwrap_or_else(|| "handshake rejected".to_string());
            return Err(Db2iError::connection(format!(
                "Daemon at {}:{} refused the connection: {message}",
                server.host, server.port
            )));
        }

        debug!("Connected to daemon job {:?}", response.job);
        connection.job = response.job;
        Ok(connection)
    }

    fn next_id(&mut self) -> String {
        self.next_id += 1;
        format!("db2i-tools-{}", self.next_id)
    }

    /// Sends a request with a fresh id and waits for the matching reply.
    async fn request(&mut self, mut message: serde_json::Value) -> Result<(String, ServerResponse)> {
        let id = self.next_id();
        message["id"] = serde_json::Value::String(id.clone());

        self.send(&message).await?;
        let response = self.read_response(&id).await?;
        Ok((id, response))
    }

    async fn send(&mut self, message: &serde_json::Value) -> Result<()> {
        self.ws
            .send(Message::Text(message.to_string()))
            .await
            .map_err(|e| Db2iError::connection(format!("Failed to send to daemon: {e}")))
    }

    async fn read_response(&mut self, id: &str) -> Result<ServerResponse> {
        while let Some(message) = self.ws.next().await {
            let message = message
                .map_err(|e| Db2iError::connection(format!("Daemon connection lost: {e}")))?;

            match message {
                Message::Text(text) => {
                    let response: ServerResponse = serde_json::from_str(&text).map_err(|e| {
                        Db2iError::internal(format!("Malformed daemon response: {e}"))
                    })?;
                    if response.id == id {
                        return Ok(response);
                    }
                    debug!("Skipping daemon response for request {}", response.id);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }

        Err(Db2iError::connection("Daemon closed the connection"))
    }
}

#[async_trait]
impl Connection for MapepireConnection {
    async fn execute(&mut self, sql: &str, params: &[Value], rows: usize) -> Result<Statement> {
        let message = if params.is_empty() {
            json!({ "type": "sql", "sql": sql, "rows": rows })
        } else {
            let parameters: Vec<serde_json::Value> = params.iter().map(Value::to_json).collect();
            json!({
                "type": "prepare_sql_execute",
                "sql": sql,
                "rows": rows,
                "parameters": parameters,
            })
        };

        let (id, response) = self.request(message).await?;
        let mut response = response.into_result()?;

        if !response.has_results {
            return Ok(Statement::without_results(id));
        }

        Ok(Statement {
            id,
            has_results: true,
            columns: response.take_columns(),
            rows: response.take_rows().into(),
            is_done: response.is_done,
        })
    }

    async fn fetch_more(&mut self, statement: &mut Statement, rows: usize) -> Result<()> {
        let (_, response) = self
            .request(json!({
                "type": "sqlmore",
                "cont_id": statement.id,
                "rows": rows,
            }))
            .await?;
        let mut response = response.into_result()?;

        statement.rows.extend(response.take_rows());
        statement.is_done = response.is_done;
        Ok(())
    }

    async fn close_statement(&mut self, statement: &Statement) -> Result<()> {
        let (_, response) = self
            .request(json!({ "type": "sqlclose", "cont_id": statement.id }))
            .await?;
        response.into_result().map(|_| ())
    }

    async fn close(&mut self) -> Result<()> {
        debug!("Ending daemon job {}", self.job.as_deref().unwrap_or("unknown"));
        let id = self.next_id();
        if let Err(e) = self.send(&json!({ "id": id, "type": "exit" })).await {
            warn!("Failed to send exit to daemon: {e}");
        }
        self.ws
            .close(None)
            .await
            .map_err(|e| Db2iError::connection(format!("Failed to close daemon connection: {e}")))
    }
}

/// Maps handshake failures to user-friendly messages.
fn map_connection_error(
    error: tokio_tungstenite::tungstenite::Error,
    server: &DaemonServer,
) -> Db2iError {
    use tokio_tungstenite::tungstenite::Error as WsError;

    let host = &server.host;
    let port = server.port;

    if let WsError::Http(response) = &error {
        let status = response.status().as_u16();
        if status == 401 || status == 403 {
            return Db2iError::connection(format!(
                "Authentication failed for user '{}'. Check your credentials.",
                server.user
            ));
        }
        return Db2iError::connection(format!(
            "Daemon at {host}:{port} rejected the WebSocket upgrade (HTTP {status})"
        ));
    }

    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") {
        Db2iError::connection(format!(
            "Cannot connect to {host}:{port}. Check that the Mapepire daemon is running."
        ))
    } else if error_str.contains("certificate") || error_str.contains("tls") {
        Db2iError::connection(format!(
            "TLS handshake with {host}:{port} failed: {error}. \
             Set ignore_unauthorized for self-signed daemon certificates."
        ))
    } else if error_str.contains("failed to lookup address")
        || error_str.contains("name or service not known")
    {
        Db2iError::connection(format!("Cannot resolve host '{host}'."))
    } else {
        Db2iError::connection(format!("Cannot connect to {host}:{port}: {error}"))
    }
}
