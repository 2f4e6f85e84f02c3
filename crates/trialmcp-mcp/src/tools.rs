use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info};

use trialmcp_core::{InsightStore, TrialError, TrialResult};

use crate::catalog::{Catalog, ToolDescriptor, ToolKind};
use crate::protocol::ToolResult;

// ---------------------------------------------------------------------------
// Typed tool calls
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DescribeTableArgs {
    pub table_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppendInsightArgs {
    pub finding: String,
}

/// A validated invocation. `Q` is the backend's own `read-query` argument struct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall<Q> {
    ReadQuery(Q),
    ListTables,
    DescribeTable(DescribeTableArgs),
    AppendInsight(AppendInsightArgs),
}

impl<Q: DeserializeOwned> ToolCall<Q> {
    /// Resolve `name` against `catalog` and decode `args` into the matching argument struct.
    ///
    /// Fails before any backend is touched: unknown tool, absent arguments, a missing required
    /// key, or an unknown/mistyped field.
    pub fn parse(catalog: &Catalog, name: &str, args: Option<&Value>) -> TrialResult<Self> {
        let tool = catalog
            .find(name)
            .ok_or_else(|| TrialError::UnknownTool(name.to_string()))?;

        let args = match args {
            None | Some(Value::Null) => None,
            Some(Value::Object(map)) if map.is_empty() => None,
            Some(other) => Some(other),
        };

        if tool.kind == ToolKind::ListTables {
            return match args {
                None => Ok(Self::ListTables),
                Some(_) => Err(TrialError::InvalidArgument(format!(
                    "{name} takes no arguments"
                ))),
            };
        }

        let args = args.ok_or(TrialError::MissingArguments)?;
        check_required(tool, args)?;

        Ok(match tool.kind {
            ToolKind::ReadQuery => Self::ReadQuery(decode(name, args)?),
            ToolKind::DescribeTable => Self::DescribeTable(decode(name, args)?),
            ToolKind::AppendInsight => Self::AppendInsight(decode(name, args)?),
            ToolKind::ListTables => Self::ListTables,
        })
    }
}

fn check_required(tool: &ToolDescriptor, args: &Value) -> TrialResult<()> {
    let map = args
        .as_object()
        .ok_or_else(|| TrialError::InvalidArgument("arguments must be an object".into()))?;

    for param in tool.params.iter().filter(|p| p.required) {
        if !param.keys().any(|k| map.contains_key(k)) {
            return Err(TrialError::MissingArgument(param.name.to_string()));
        }
    }
    Ok(())
}

fn decode<T: DeserializeOwned>(tool: &str, args: &Value) -> TrialResult<T> {
    T::deserialize(args).map_err(|e| TrialError::InvalidArgument(format!("{tool}: {e}")))
}

// ---------------------------------------------------------------------------
// Backend seam
// ---------------------------------------------------------------------------

/// What a deployment plugs into the dispatcher: its catalog and the three data tools.
pub trait ToolBackend: Send + Sync {
    type Query: DeserializeOwned + fmt::Debug;

    fn catalog(&self) -> &'static Catalog;
    fn list_tables(&self) -> TrialResult<String>;
    fn describe_table(&self, name: &str) -> TrialResult<String>;
    fn read_query(&self, query: Self::Query) -> TrialResult<String>;

    /// Release long-lived resources at shutdown.
    fn shutdown(&self) {}
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

pub struct Dispatcher<B> {
    backend: B,
    insights: Arc<InsightStore>,
}

impl<B: ToolBackend> Dispatcher<B> {
    pub fn new(backend: B) -> Self {
        let insights = Arc::new(InsightStore::new(backend.catalog().memo));
        Self::with_insights(backend, insights)
    }

    pub fn with_insights(backend: B, insights: Arc<InsightStore>) -> Self {
        info!("dispatcher initialized for {}", backend.catalog().server_name);
        Self { backend, insights }
    }

    pub fn catalog(&self) -> &'static Catalog {
        self.backend.catalog()
    }

    pub fn list_tools(&self) -> &'static [ToolDescriptor] {
        self.catalog().list_tools()
    }

    pub fn insights(&self) -> &InsightStore {
        &self.insights
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Run one tool call. Errors are logged and returned unchanged.
    pub fn execute(&self, name: &str, args: Option<&Value>) -> TrialResult<ToolResult> {
        info!("executing tool: {name} with arguments: {args:?}");

        let result = ToolCall::parse(self.catalog(), name, args).and_then(|call| self.run(call));
        if let Err(e) = &result {
            error!("error executing tool {name} with arguments {args:?}: {e}");
        }
        result
    }

    fn run(&self, call: ToolCall<B::Query>) -> TrialResult<ToolResult> {
        debug!("dispatching {call:?}");
        let text = match call {
            ToolCall::ListTables => self.backend.list_tables()?,
            ToolCall::DescribeTable(args) => self.backend.describe_table(&args.table_name)?,
            ToolCall::ReadQuery(query) => self.backend.read_query(query)?,
            ToolCall::AppendInsight(args) => {
                self.insights.add(&args.finding)?;
                info!("finding added, {} recorded", self.insights.len());
                self.catalog().insight_ack.to_string()
            }
        };
        Ok(ToolResult::text(text))
    }

    pub fn shutdown(&self) {
        self.backend.shutdown();
    }
}

impl<B> fmt::Debug for Dispatcher<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("insights", &self.insights)
            .finish_non_exhaustive()
    }
}
