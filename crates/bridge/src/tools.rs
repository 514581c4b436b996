//! MCP tools bridging to PASOE REST services.
//!
//! Six tools share one internal forward-and-shape path: each parses its
//! caller input into a request description, delegates to the
//! [`RestClient`], and renders the outcome as a pretty-printed JSON
//! envelope with stable keys. No error ever escapes a tool boundary —
//! malformed caller input produces the same envelope shape with
//! `statusCode` 0.

use pasoe_rest::client::{Method, RestClient, RestRequest, parse_method};
use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::{ErrorData as McpError, ServerHandler, schemars, tool, tool_handler, tool_router};
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Deserialize, schemars::JsonSchema)]
#[schemars(crate = "rmcp::schemars")]
#[serde(rename_all = "camelCase")]
pub struct CallServiceArgs {
    /// The service path (e.g. '/rest/CustomersService/MyMethod').
    pub service_path: String,
    /// HTTP method: GET, POST, PUT, DELETE (default: POST).
    #[serde(default)]
    pub http_method: Option<String>,
    /// Request body as JSON string (optional).
    #[serde(default)]
    pub request_body: Option<String>,
    /// Additional headers as JSON object (optional, e.g. '{"X-Custom-Header": "value"}').
    #[serde(default)]
    pub headers: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
#[schemars(crate = "rmcp::schemars")]
#[serde(rename_all = "camelCase")]
pub struct GetDataArgs {
    /// The service path (e.g. '/rest/CustomersService/Customer').
    pub service_path: String,
    /// Query parameters as JSON object (optional, e.g. '{"id": "123"}').
    #[serde(default)]
    pub query_params: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
#[schemars(crate = "rmcp::schemars")]
#[serde(rename_all = "camelCase")]
pub struct InvokeMethodArgs {
    /// The service path (e.g. '/rest/CustomersService/Customer').
    pub service_path: String,
    /// Request payload as JSON string.
    pub request_payload: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
#[schemars(crate = "rmcp::schemars")]
#[serde(rename_all = "camelCase")]
pub struct UpdateDataArgs {
    /// The service path (e.g. '/rest/CustomersService/Customer/123').
    pub service_path: String,
    /// Update payload as JSON string.
    pub request_payload: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
#[schemars(crate = "rmcp::schemars")]
#[serde(rename_all = "camelCase")]
pub struct DeleteDataArgs {
    /// The service path (e.g. '/rest/CustomersService/Customer/123').
    pub service_path: String,
}

/// Which envelope key carries the response body.
#[derive(Debug, Clone, Copy)]
enum Payload {
    Response,
    Data,
    Result,
}

impl Payload {
    fn key(self) -> &'static str {
        match self {
            Payload::Response => "response",
            Payload::Data => "data",
            Payload::Result => "result",
        }
    }
}

#[derive(Clone)]
pub struct PasoeTools {
    client: RestClient,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl PasoeTools {
    #[must_use]
    pub fn new(client: RestClient) -> Self {
        Self {
            client,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Calls a PASOE REST service endpoint with the specified parameters.")]
    pub async fn call_pasoe_service(
        &self,
        Parameters(args): Parameters<CallServiceArgs>,
    ) -> Result<CallToolResult, McpError> {
        Ok(text_result(self.call_service_envelope(args).await))
    }

    #[tool(description = "Tests the connection to the configured PASOE instance.")]
    pub async fn test_pasoe_connection(&self) -> Result<CallToolResult, McpError> {
        Ok(text_result(self.test_connection_envelope().await))
    }

    #[tool(description = "Makes a GET request to retrieve data from a PASOE REST service.")]
    pub async fn get_pasoe_data(
        &self,
        Parameters(args): Parameters<GetDataArgs>,
    ) -> Result<CallToolResult, McpError> {
        Ok(text_result(self.get_data_envelope(args).await))
    }

    #[tool(description = "Makes a POST request to invoke an ABL procedure or create data in PASOE.")]
    pub async fn invoke_pasoe_method(
        &self,
        Parameters(args): Parameters<InvokeMethodArgs>,
    ) -> Result<CallToolResult, McpError> {
        Ok(text_result(self.invoke_method_envelope(args).await))
    }

    #[tool(description = "Makes a PUT request to update data in PASOE.")]
    pub async fn update_pasoe_data(
        &self,
        Parameters(args): Parameters<UpdateDataArgs>,
    ) -> Result<CallToolResult, McpError> {
        Ok(text_result(self.update_data_envelope(args).await))
    }

    #[tool(description = "Makes a DELETE request to remove data in PASOE.")]
    pub async fn delete_pasoe_data(
        &self,
        Parameters(args): Parameters<DeleteDataArgs>,
    ) -> Result<CallToolResult, McpError> {
        Ok(text_result(self.delete_data_envelope(args).await))
    }
}

impl PasoeTools {
    async fn call_service_envelope(&self, args: CallServiceArgs) -> Value {
        let method = match parse_method(args.http_method.as_deref().unwrap_or_default()) {
            Ok(method) => method,
            Err(e) => return failure_envelope(format!("Error calling PASOE service: {e}")),
        };

        let headers = match args.headers.as_deref().filter(|raw| !raw.is_empty()) {
            Some(raw) => match serde_json::from_str::<HashMap<String, String>>(raw) {
                Ok(map) => map,
                Err(e) => {
                    return failure_envelope(format!(
                        "Error calling PASOE service: invalid headers JSON: {e}"
                    ));
                }
            },
            None => HashMap::new(),
        };

        self.forward(
            args.service_path,
            method,
            args.request_body,
            headers,
            Payload::Response,
            true,
        )
        .await
    }

    async fn test_connection_envelope(&self) -> Value {
        let connected = self.client.probe().await;
        json!({
            "success": connected,
            "message": if connected {
                "Successfully connected to PASOE"
            } else {
                "Failed to connect to PASOE"
            },
        })
    }

    async fn get_data_envelope(&self, args: GetDataArgs) -> Value {
        let path = match args.query_params.as_deref().filter(|raw| !raw.is_empty()) {
            Some(raw) => match serde_json::from_str::<BTreeMap<String, String>>(raw) {
                Ok(params) => append_query_params(&args.service_path, &params),
                Err(e) => {
                    return failure_envelope(format!(
                        "Error retrieving data: invalid query parameters JSON: {e}"
                    ));
                }
            },
            None => args.service_path,
        };

        self.forward(path, Method::GET, None, HashMap::new(), Payload::Data, false)
            .await
    }

    async fn invoke_method_envelope(&self, args: InvokeMethodArgs) -> Value {
        self.forward(
            args.service_path,
            Method::POST,
            Some(args.request_payload),
            HashMap::new(),
            Payload::Result,
            false,
        )
        .await
    }

    async fn update_data_envelope(&self, args: UpdateDataArgs) -> Value {
        self.forward(
            args.service_path,
            Method::PUT,
            Some(args.request_payload),
            HashMap::new(),
            Payload::Result,
            false,
        )
        .await
    }

    async fn delete_data_envelope(&self, args: DeleteDataArgs) -> Value {
        self.forward(
            args.service_path,
            Method::DELETE,
            None,
            HashMap::new(),
            Payload::Result,
            false,
        )
        .await
    }

    /// Shared forward-and-shape path for every operation.
    async fn forward(
        &self,
        path: String,
        method: Method,
        body: Option<String>,
        headers: HashMap<String, String>,
        payload: Payload,
        include_headers: bool,
    ) -> Value {
        let mut request = RestRequest::new(path, method);
        request.body = body;
        request.headers = headers;

        let outcome = self.client.execute(request).await;

        let mut envelope = serde_json::Map::new();
        envelope.insert("success".to_string(), json!(outcome.success));
        envelope.insert("statusCode".to_string(), json!(outcome.status_code));
        envelope.insert(payload.key().to_string(), json!(outcome.body));
        envelope.insert("errorMessage".to_string(), json!(outcome.error_message));
        if include_headers {
            envelope.insert("headers".to_string(), json!(outcome.headers));
        }
        Value::Object(envelope)
    }
}

#[tool_handler]
impl ServerHandler for PasoeTools {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Bridges tool calls to the REST interface of a Progress Application Server \
                 (PASOE) instance. Use test_pasoe_connection to verify reachability, \
                 get_pasoe_data / invoke_pasoe_method / update_pasoe_data / delete_pasoe_data \
                 for CRUD-style calls, and call_pasoe_service for anything else."
                    .to_string(),
            ),
        }
    }
}

/// Failure envelope used for every caller-input error, regardless of which
/// tool caught it.
fn failure_envelope(message: String) -> Value {
    json!({
        "success": false,
        "statusCode": 0,
        "errorMessage": message,
    })
}

fn text_result(envelope: Value) -> CallToolResult {
    let text =
        serde_json::to_string_pretty(&envelope).unwrap_or_else(|_| envelope.to_string());
    CallToolResult::success(vec![Content::text(text)])
}

/// Append percent-encoded query parameters to a service path, respecting an
/// existing query string.
fn append_query_params(path: &str, params: &BTreeMap<String, String>) -> String {
    if params.is_empty() {
        return path.to_string();
    }

    let query: Vec<String> = params
        .iter()
        .map(|(key, value)| format!("{}={}", percent_encode(key), percent_encode(value)))
        .collect();
    let separator = if path.contains('?') { '&' } else { '?' };
    format!("{path}{separator}{}", query.join("&"))
}

fn percent_encode(s: &str) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = String::with_capacity(s.len());
    for &b in s.as_bytes() {
        if is_unreserved(b) {
            out.push(b as char);
        } else {
            out.push('%');
            out.push(HEX[(b >> 4) as usize] as char);
            out.push(HEX[(b & 0x0F) as usize] as char);
        }
    }
    out
}

fn is_unreserved(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~')
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::body::Bytes;
    use axum::http::{HeaderMap as RequestHeaders, Method as AxumMethod, Uri};
    use axum::routing::any;
    use pasoe_rest::config::PasoeConfig;
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    fn tools_for(base_url: &str) -> PasoeTools {
        let client = RestClient::new(PasoeConfig {
            base_url: base_url.to_string(),
            ..PasoeConfig::default()
        })
        .expect("client builds");
        PasoeTools::new(client)
    }

    // Tools pointed at a port nothing listens on; only used for paths that
    // fail before or during dispatch.
    fn offline_tools() -> PasoeTools {
        tools_for("http://127.0.0.1:1")
    }

    async fn start_echo_server() -> (String, oneshot::Sender<()>) {
        async fn echo_handler(
            method: AxumMethod,
            uri: Uri,
            headers: RequestHeaders,
            body: Bytes,
        ) -> axum::Json<Value> {
            let x_trace = headers
                .get("x-trace")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            axum::Json(json!({
                "method": method.as_str(),
                "path": uri.path(),
                "query": uri.query().unwrap_or(""),
                "x_trace": x_trace,
                "body": String::from_utf8_lossy(&body),
            }))
        }

        let app = Router::new().route("/{*path}", any(echo_handler));
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local_addr");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });
        tokio::spawn(async move {
            server.await.expect("server result");
        });
        (format!("http://{addr}"), shutdown_tx)
    }

    fn echoed(envelope: &Value, key: &str) -> Value {
        let body = envelope[key].as_str().expect("payload text");
        serde_json::from_str(body).expect("echo json")
    }

    #[test]
    fn query_params_append_with_question_mark_then_ampersand() {
        let params = BTreeMap::from([("id".to_string(), "123".to_string())]);
        assert_eq!(
            append_query_params("/rest/Customer", &params),
            "/rest/Customer?id=123"
        );
        assert_eq!(
            append_query_params("/rest/Customer?a=1", &params),
            "/rest/Customer?a=1&id=123"
        );
        assert_eq!(append_query_params("/rest/Customer", &BTreeMap::new()), "/rest/Customer");
    }

    #[test]
    fn query_params_are_percent_encoded() {
        let params = BTreeMap::from([("full name".to_string(), "Jo & Co".to_string())]);
        assert_eq!(
            append_query_params("/rest/Customer", &params),
            "/rest/Customer?full%20name=Jo%20%26%20Co"
        );

        let params = BTreeMap::from([("q".to_string(), "café".to_string())]);
        assert_eq!(
            append_query_params("/rest/Search", &params),
            "/rest/Search?q=caf%C3%A9"
        );
    }

    #[tokio::test]
    async fn malformed_headers_json_yields_failure_envelope() {
        let tools = offline_tools();
        let envelope = tools
            .call_service_envelope(CallServiceArgs {
                service_path: "/rest/Ping".to_string(),
                http_method: None,
                request_body: None,
                headers: Some("not json".to_string()),
            })
            .await;

        assert_eq!(envelope["success"], json!(false));
        assert_eq!(envelope["statusCode"], json!(0));
        let message = envelope["errorMessage"].as_str().expect("message");
        assert!(message.starts_with("Error calling PASOE service:"), "message={message}");
    }

    #[tokio::test]
    async fn unsupported_method_yields_failure_envelope() {
        let tools = offline_tools();
        let envelope = tools
            .call_service_envelope(CallServiceArgs {
                service_path: "/rest/Ping".to_string(),
                http_method: Some("PATCH".to_string()),
                request_body: None,
                headers: None,
            })
            .await;

        assert_eq!(envelope["success"], json!(false));
        assert_eq!(envelope["statusCode"], json!(0));
        assert!(
            envelope["errorMessage"]
                .as_str()
                .expect("message")
                .contains("PATCH")
        );
    }

    #[tokio::test]
    async fn malformed_query_params_json_yields_failure_envelope() {
        let tools = offline_tools();
        let envelope = tools
            .get_data_envelope(GetDataArgs {
                service_path: "/rest/Customer".to_string(),
                query_params: Some("{".to_string()),
            })
            .await;

        assert_eq!(envelope["success"], json!(false));
        assert_eq!(envelope["statusCode"], json!(0));
        let message = envelope["errorMessage"].as_str().expect("message");
        assert!(message.starts_with("Error retrieving data:"), "message={message}");
    }

    #[tokio::test]
    async fn connection_refused_surfaces_transport_failure_in_envelope() {
        let tools = offline_tools();
        let envelope = tools
            .invoke_method_envelope(InvokeMethodArgs {
                service_path: "/rest/CustomerService/Create".to_string(),
                request_payload: r#"{"name": "ACME"}"#.to_string(),
            })
            .await;

        assert_eq!(envelope["success"], json!(false));
        assert_eq!(envelope["statusCode"], json!(0));
        assert_eq!(envelope["result"], Value::Null);
        let message = envelope["errorMessage"].as_str().expect("message");
        assert!(message.starts_with("HTTP request failed:"), "message={message}");
    }

    #[tokio::test]
    async fn call_service_envelope_includes_response_and_headers() {
        let (base_url, shutdown) = start_echo_server().await;
        let tools = tools_for(&base_url);

        let envelope = tools
            .call_service_envelope(CallServiceArgs {
                service_path: "/rest/CustomerService/MyMethod".to_string(),
                http_method: Some("get".to_string()),
                request_body: None,
                headers: Some(r#"{"X-Trace": "t-1"}"#.to_string()),
            })
            .await;

        assert_eq!(envelope["success"], json!(true));
        assert_eq!(envelope["statusCode"], json!(200));
        assert_eq!(envelope["errorMessage"], Value::Null);
        assert!(envelope["headers"].is_object());

        let echo = echoed(&envelope, "response");
        assert_eq!(echo["method"], "GET");
        assert_eq!(echo["path"], "/web/rest/CustomerService/MyMethod");
        assert_eq!(echo["x_trace"], "t-1");

        let _ = shutdown.send(());
    }

    #[tokio::test]
    async fn get_data_envelope_appends_query_and_uses_data_key() {
        let (base_url, shutdown) = start_echo_server().await;
        let tools = tools_for(&base_url);

        let envelope = tools
            .get_data_envelope(GetDataArgs {
                service_path: "/rest/CustomerService/Customer".to_string(),
                query_params: Some(r#"{"id": "123"}"#.to_string()),
            })
            .await;

        assert_eq!(envelope["success"], json!(true));
        assert!(envelope.get("headers").is_none());
        assert!(envelope.get("response").is_none());

        let echo = echoed(&envelope, "data");
        assert_eq!(echo["method"], "GET");
        assert_eq!(echo["query"], "id=123");

        let _ = shutdown.send(());
    }

    #[tokio::test]
    async fn update_and_delete_envelopes_use_result_key() {
        let (base_url, shutdown) = start_echo_server().await;
        let tools = tools_for(&base_url);

        let envelope = tools
            .update_data_envelope(UpdateDataArgs {
                service_path: "/rest/CustomerService/Customer/123".to_string(),
                request_payload: r#"{"name": "ACME"}"#.to_string(),
            })
            .await;
        let echo = echoed(&envelope, "result");
        assert_eq!(echo["method"], "PUT");
        assert_eq!(echo["body"], r#"{"name": "ACME"}"#);

        let envelope = tools
            .delete_data_envelope(DeleteDataArgs {
                service_path: "/rest/CustomerService/Customer/123".to_string(),
            })
            .await;
        let echo = echoed(&envelope, "result");
        assert_eq!(echo["method"], "DELETE");
        assert_eq!(echo["body"], "");

        let _ = shutdown.send(());
    }

    #[tokio::test]
    async fn test_connection_envelope_reports_fixed_messages() {
        let (base_url, shutdown) = start_echo_server().await;
        let tools = tools_for(&base_url);
        let envelope = tools.test_connection_envelope().await;
        assert_eq!(envelope["success"], json!(true));
        assert_eq!(envelope["message"], "Successfully connected to PASOE");
        let _ = shutdown.send(());

        let tools = offline_tools();
        let envelope = tools.test_connection_envelope().await;
        assert_eq!(envelope["success"], json!(false));
        assert_eq!(envelope["message"], "Failed to connect to PASOE");
    }

    #[test]
    fn envelopes_render_as_pretty_json() {
        let result = text_result(failure_envelope("Error calling PASOE service: boom".into()));
        let raw = serde_json::to_value(&result).expect("result serializes");
        let text = raw["content"][0]["text"].as_str().expect("text content");
        assert!(text.contains('\n'), "expected indented output: {text}");

        let parsed: Value = serde_json::from_str(text).expect("envelope is json");
        assert_eq!(parsed["statusCode"], json!(0));
        assert_eq!(parsed["success"], json!(false));
    }
}
