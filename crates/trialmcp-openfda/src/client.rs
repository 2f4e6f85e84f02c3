use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, error, info};
use ureq::{Agent, AgentBuilder};

use trialmcp_core::{ApiBackend, ApiRequest, TrialError, TrialResult};

pub const BASE_URL: &str = "https://api.fda.gov";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = concat!("trialmcp/", env!("CARGO_PKG_VERSION"));

/// Client for the openFDA REST API.
///
/// The HTTP session is created on first use and reused until [`ApiBackend::close`].
#[derive(Debug)]
pub struct OpenFdaClient {
    base_url: String,
    timeout: Duration,
    api_key: Option<String>,
    agent: Mutex<Option<Agent>>,
}

impl Default for OpenFdaClient {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenFdaClient {
    pub fn new() -> Self {
        info!("initializing OpenFDA API client");
        Self {
            base_url: BASE_URL.into(),
            timeout: DEFAULT_TIMEOUT,
            api_key: None,
            agent: Mutex::new(None),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.is_empty());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn has_session(&self) -> bool {
        self.session().is_some()
    }

    /// Adverse event reports mentioning `drug_name`. Returns the `results` array, empty when
    /// the payload carries none.
    pub fn drug_events(&self, drug_name: &str, limit: u32) -> TrialResult<Vec<Value>> {
        let request = ApiRequest::new("drug/event")
            .search(format!("patient.drug.medicinalproduct:\"{drug_name}\""))
            .limit(limit);
        let payload = self.execute(&request)?;
        Ok(match payload.get("results") {
            Some(Value::Array(results)) => results.clone(),
            _ => Vec::new(),
        })
    }

    fn session(&self) -> MutexGuard<'_, Option<Agent>> {
        self.agent.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn agent(&self) -> Agent {
        self.session()
            .get_or_insert_with(|| {
                debug!("opening OpenFDA session (timeout {:?})", self.timeout);
                AgentBuilder::new()
                    .timeout_connect(self.timeout)
                    .timeout_read(self.timeout)
                    .user_agent(USER_AGENT)
                    .build()
            })
            .clone()
    }

    fn get(&self, endpoint: &str, pairs: &[(&'static str, String)]) -> TrialResult<Value> {
        let url = format!(
            "{}/{}.json",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_matches('/')
        );
        debug!("GET {url} {pairs:?}");

        let mut request = self.agent().get(&url);
        for (key, value) in pairs {
            request = request.query(key, value);
        }
        if let Some(api_key) = &self.api_key {
            request = request.query("api_key", api_key);
        }

        match request.call() {
            Ok(resp) => resp.into_json::<Value>().map_err(|e| {
                error!("OpenFDA API returned an undecodable body: {e}");
                TrialError::Api(format!("invalid response body: {e}"))
            }),
            Err(ureq::Error::Status(code, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                error!("OpenFDA API request failed: {code} {body}");
                Err(TrialError::Api(format!("{code} {body}")))
            }
            Err(ureq::Error::Transport(err)) => {
                error!("OpenFDA API request failed: {err}");
                Err(TrialError::Api(err.to_string()))
            }
        }
    }
}

impl ApiBackend for OpenFdaClient {
    fn execute(&self, request: &ApiRequest) -> TrialResult<Value> {
        self.get(&request.endpoint, &request.query_pairs())
    }

    fn close(&self) {
        if self.session().take().is_some() {
            info!("closed OpenFDA session");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    /// Serve one canned HTTP response; the handle yields the request line it received.
    fn one_shot_server(status: &str, body: &str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );

        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut request_line = String::new();
            reader.read_line(&mut request_line).unwrap();
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if line == "\r\n" || line.is_empty() {
                    break;
                }
            }
            let mut stream = stream;
            stream.write_all(response.as_bytes()).unwrap();
            stream.flush().unwrap();
            request_line
        });

        (base, handle)
    }

    #[test]
    fn test_session_is_lazy_and_closable() {
        let client = OpenFdaClient::new();
        assert!(!client.has_session());

        let _ = client.agent();
        assert!(client.has_session());

        client.close();
        assert!(!client.has_session());
    }

    #[test]
    fn test_execute_decodes_payload() {
        let (base, server) = one_shot_server("200 OK", r#"{"meta":{},"results":[{"product_ndc":"0573-0150"}]}"#);
        let client = OpenFdaClient::new().with_base_url(base);

        let request = ApiRequest::new("drug/ndc").search("brand_name:advil").limit(1);
        let payload = client.execute(&request).unwrap();
        assert_eq!(payload["results"][0]["product_ndc"], "0573-0150");

        let request_line = server.join().unwrap();
        assert!(request_line.starts_with("GET /drug/ndc.json?"));
        assert!(request_line.contains("search="));
        assert!(request_line.contains("limit=1"));
    }

    #[test]
    fn test_non_2xx_is_api_error() {
        let (base, server) = one_shot_server(
            "404 Not Found",
            r#"{"error":{"code":"NOT_FOUND","message":"No matches found!"}}"#,
        );
        let client = OpenFdaClient::new().with_base_url(base);

        let err = client.execute(&ApiRequest::new("drug/label")).unwrap_err();
        match err {
            TrialError::Api(msg) => {
                assert!(msg.starts_with("404"));
                assert!(msg.contains("No matches found!"));
            }
            other => panic!("expected Api error, got {other:?}"),
        }
        server.join().unwrap();
    }

    #[test]
    fn test_count_request_omits_limit() {
        let (base, server) = one_shot_server("200 OK", r#"{"results":[]}"#);
        let client = OpenFdaClient::new().with_base_url(base);

        let mut request = ApiRequest::new("drug/event").limit(25);
        request.count = Some("receivedate".into());
        client.execute(&request).unwrap();

        let request_line = server.join().unwrap();
        assert!(request_line.contains("count=receivedate"));
        assert!(!request_line.contains("limit="));
    }

    #[test]
    fn test_drug_events_extracts_results() {
        let (base, server) = one_shot_server(
            "200 OK",
            r#"{"results":[{"safetyreportid":"1"},{"safetyreportid":"2"}]}"#,
        );
        let client = OpenFdaClient::new()
            .with_base_url(base)
            .with_api_key(Some("secret".into()));

        let events = client.drug_events("aspirin", 2).unwrap();
        assert_eq!(events.len(), 2);

        let request_line = server.join().unwrap();
        assert!(request_line.starts_with("GET /drug/event.json?"));
        assert!(request_line.contains("api_key=secret"));
    }

    #[test]
    fn test_unreachable_host_is_api_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let client = OpenFdaClient::new()
            .with_base_url(base)
            .with_timeout(Duration::from_secs(2));
        assert!(matches!(
            client.execute(&ApiRequest::new("drug/ndc")),
            Err(TrialError::Api(_))
        ));
    }
}
