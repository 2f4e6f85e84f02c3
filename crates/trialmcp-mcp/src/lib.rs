pub mod backends;
pub mod catalog;
pub mod protocol;
pub mod resources;
pub mod server;
pub mod tools;

pub use backends::{ApiTools, SqlTools};
pub use server::{run_server, McpServer};
pub use tools::{Dispatcher, ToolBackend, ToolCall};

/// Backend doubles that record every call they receive.
#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use serde_json::{json, Value};

    use trialmcp_core::{ApiBackend, ApiRequest, Row, SqlBackend, TrialError, TrialResult};

    type SqlCall = (String, Vec<String>);

    #[derive(Debug, Default)]
    pub struct RecordingSql {
        rows: Vec<Row>,
        failure: Option<String>,
        calls: Mutex<Vec<SqlCall>>,
    }

    impl RecordingSql {
        pub fn with_rows(rows: Vec<Value>) -> Self {
            Self {
                rows: rows
                    .into_iter()
                    .filter_map(|v| match v {
                        Value::Object(map) => Some(map),
                        _ => None,
                    })
                    .collect(),
                ..Self::default()
            }
        }

        pub fn failing(message: &str) -> Self {
            Self {
                failure: Some(message.to_string()),
                ..Self::default()
            }
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|(sql, _)| sql.clone()).collect()
        }

        pub fn params(&self) -> Vec<Vec<String>> {
            self.calls.lock().unwrap().iter().map(|(_, p)| p.clone()).collect()
        }
    }

    impl SqlBackend for RecordingSql {
        fn execute(&self, sql: &str, params: &[&str]) -> TrialResult<Vec<Row>> {
            let params = params.iter().map(|p| p.to_string()).collect();
            self.calls.lock().unwrap().push((sql.to_string(), params));

            match &self.failure {
                Some(message) => Err(TrialError::Query(message.clone())),
                None => Ok(self.rows.clone()),
            }
        }
    }

    #[derive(Debug)]
    pub struct RecordingApi {
        payload: Value,
        calls: Mutex<Vec<ApiRequest>>,
        closed: AtomicUsize,
    }

    impl Default for RecordingApi {
        fn default() -> Self {
            Self::with_payload(json!({ "results": [] }))
        }
    }

    impl RecordingApi {
        pub fn with_payload(payload: Value) -> Self {
            Self {
                payload,
                calls: Mutex::new(Vec::new()),
                closed: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> Vec<ApiRequest> {
            self.calls.lock().unwrap().clone()
        }

        pub fn closed(&self) -> usize {
            self.closed.load(Ordering::SeqCst)
        }
    }

    impl ApiBackend for RecordingApi {
        fn execute(&self, request: &ApiRequest) -> TrialResult<Value> {
            self.calls.lock().unwrap().push(request.clone());
            Ok(self.payload.clone())
        }

        fn close(&self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}
