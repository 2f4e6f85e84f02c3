use serde::Deserialize;
use tracing::{error, info};

use trialmcp_aact::schema;
use trialmcp_core::{ApiBackend, ApiRequest, SqlBackend, TrialError, TrialResult};
use trialmcp_openfda::client::BASE_URL;
use trialmcp_openfda::{endpoints, ENDPOINTS};

use crate::catalog::{Catalog, AACT, OPENFDA};
use crate::tools::ToolBackend;

// ---------------------------------------------------------------------------
// AACT database tools
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SqlQueryArgs {
    pub query: String,
}

#[derive(Debug)]
pub struct SqlTools<S> {
    db: S,
}

impl<S: SqlBackend> SqlTools<S> {
    pub fn new(db: S) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &S {
        &self.db
    }
}

/// True when `query`, ignoring surrounding whitespace and case, starts with `SELECT`.
pub fn is_select(query: &str) -> bool {
    query.trim().to_uppercase().starts_with("SELECT")
}

impl<S: SqlBackend> ToolBackend for SqlTools<S> {
    type Query = SqlQueryArgs;

    fn catalog(&self) -> &'static Catalog {
        &AACT
    }

    fn list_tables(&self) -> TrialResult<String> {
        let tables = schema::list_tables(&self.db)?;
        info!("retrieved {} tables", tables.len());
        Ok(serde_json::to_string(&tables)?)
    }

    fn describe_table(&self, name: &str) -> TrialResult<String> {
        let columns = schema::describe_table(&self.db, name)?;
        info!("retrieved {} columns for table {name}", columns.len());
        Ok(serde_json::to_string(&columns)?)
    }

    fn read_query(&self, args: SqlQueryArgs) -> TrialResult<String> {
        if !is_select(&args.query) {
            let preview: String = args.query.trim().chars().take(50).collect();
            error!("invalid query type attempted: {preview}...");
            return Err(TrialError::OnlySelect);
        }

        let rows = self.db.execute(&args.query, &[])?;
        info!("query returned {} rows", rows.len());
        Ok(serde_json::to_string(&rows)?)
    }
}

// ---------------------------------------------------------------------------
// openFDA tools
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiQueryArgs {
    #[serde(alias = "search_query")]
    pub query: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub count: Option<String>,
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug)]
pub struct ApiTools<A> {
    client: A,
    base_url: String,
    default_endpoint: String,
    default_limit: u32,
}

impl<A: ApiBackend> ApiTools<A> {
    pub fn new(client: A) -> Self {
        Self {
            client,
            base_url: BASE_URL.into(),
            default_endpoint: endpoints::DEFAULT_ENDPOINT.into(),
            default_limit: 1,
        }
    }

    /// Base URL shown in example queries.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_defaults(mut self, endpoint: impl Into<String>, limit: u32) -> Self {
        self.default_endpoint = endpoint.into();
        self.default_limit = limit;
        self
    }

    pub fn client(&self) -> &A {
        &self.client
    }

    fn request_for(&self, args: ApiQueryArgs) -> TrialResult<ApiRequest> {
        let name = args.endpoint.as_deref().unwrap_or(&self.default_endpoint);
        let endpoint =
            endpoints::resolve(name).ok_or_else(|| TrialError::UnknownEndpoint(name.to_string()))?;

        // The default limit only applies to raw searches; `count` aggregates.
        let limit = if args.count.is_some() {
            args.limit
        } else {
            Some(args.limit.unwrap_or(self.default_limit))
        };

        Ok(ApiRequest {
            endpoint: endpoint.path.to_string(),
            search: Some(args.query.trim().to_string()),
            count: args.count,
            sort: args.sort,
            limit,
        })
    }
}

impl<A: ApiBackend> ToolBackend for ApiTools<A> {
    type Query = ApiQueryArgs;

    fn catalog(&self) -> &'static Catalog {
        &OPENFDA
    }

    fn list_tables(&self) -> TrialResult<String> {
        let paths: Vec<&str> = ENDPOINTS.iter().map(|e| e.path).collect();
        Ok(serde_json::to_string(&paths)?)
    }

    fn describe_table(&self, name: &str) -> TrialResult<String> {
        let endpoint =
            endpoints::resolve(name).ok_or_else(|| TrialError::UnknownEndpoint(name.to_string()))?;

        Ok(format!(
            "Endpoint: {}\nDescription: {}\nFields: {}\nExample query: {}",
            endpoint.path,
            endpoint.description,
            serde_json::to_string(endpoint.fields)?,
            endpoint.example_url(&self.base_url)?
        ))
    }

    fn read_query(&self, args: ApiQueryArgs) -> TrialResult<String> {
        let request = self.request_for(args)?;
        let payload = self.client.execute(&request)?;
        info!("OpenFDA search on {} completed", request.endpoint);
        Ok(serde_json::to_string_pretty(&payload)?)
    }

    fn shutdown(&self) {
        self.client.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingApi, RecordingSql};
    use crate::tools::Dispatcher;
    use serde_json::{json, Value};

    #[test]
    fn test_is_select() {
        assert!(is_select("SELECT 1"));
        assert!(is_select("  select nct_id from studies"));
        assert!(is_select("\n\tSeLeCt 1"));
        assert!(!is_select("DROP TABLE x"));
        assert!(!is_select("WITH t AS (SELECT 1) SELECT * FROM t"));
        assert!(!is_select(""));
    }

    #[test]
    fn test_drop_is_rejected_before_backend() {
        let dispatcher = Dispatcher::new(SqlTools::new(RecordingSql::default()));
        let err = dispatcher
            .execute("read-query", Some(&json!({ "query": "DROP TABLE x" })))
            .unwrap_err();
        assert!(matches!(err, TrialError::OnlySelect));
        assert!(dispatcher.backend().db().calls().is_empty());
    }

    #[test]
    fn test_lowercase_select_forwarded_unmodified() {
        let db = RecordingSql::with_rows(vec![json!({ "?column?": 1 })]);
        let dispatcher = Dispatcher::new(SqlTools::new(db));

        let result = dispatcher
            .execute("read-query", Some(&json!({ "query": "select 1" })))
            .unwrap();
        assert_eq!(dispatcher.backend().db().calls(), vec!["select 1".to_string()]);
        assert_eq!(result.first_text(), Some(r#"[{"?column?":1}]"#));
    }

    #[test]
    fn test_sql_list_tables_is_idempotent() {
        let db = RecordingSql::with_rows(vec![
            json!({ "table_name": "conditions" }),
            json!({ "table_name": "studies" }),
        ]);
        let dispatcher = Dispatcher::new(SqlTools::new(db));

        let first = dispatcher.execute("list-tables", None).unwrap();
        let second = dispatcher.execute("list-tables", None).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.first_text(), Some(r#"["conditions","studies"]"#));
    }

    #[test]
    fn test_sql_describe_unknown_table() {
        let dispatcher = Dispatcher::new(SqlTools::new(RecordingSql::default()));
        let err = dispatcher
            .execute("describe-table", Some(&json!({ "table_name": "nope" })))
            .unwrap_err();
        assert!(matches!(err, TrialError::UnknownTable(t) if t == "nope"));
    }

    #[test]
    fn test_sql_describe_binds_table_name() {
        let db = RecordingSql::with_rows(vec![
            json!({ "column_name": "nct_id", "data_type": "character varying", "character_maximum_length": null }),
        ]);
        let dispatcher = Dispatcher::new(SqlTools::new(db));
        let result = dispatcher
            .execute("describe-table", Some(&json!({ "table_name": "studies" })))
            .unwrap();

        assert!(result.first_text().unwrap().contains("nct_id"));
        assert_eq!(
            dispatcher.backend().db().params(),
            vec![vec!["studies".to_string()]]
        );
    }

    #[test]
    fn test_api_describe_ndc() {
        let dispatcher = Dispatcher::new(ApiTools::new(RecordingApi::default()));
        for name in ["ndc", "drug/ndc"] {
            let result = dispatcher
                .execute("describe-table", Some(&json!({ "table_name": name })))
                .unwrap();
            let text = result.first_text().unwrap();
            assert!(text.contains(r#"Fields: ["product_ndc","generic_name","brand_name"]"#));
            assert!(text.contains("Example query: https://api.fda.gov/drug/ndc.json?search="));
        }
        assert!(dispatcher.backend().client().calls().is_empty());
    }

    #[test]
    fn test_api_describe_unknown_endpoint() {
        let dispatcher = Dispatcher::new(ApiTools::new(RecordingApi::default()));
        let err = dispatcher
            .execute("describe-table", Some(&json!({ "table_name": "device/event" })))
            .unwrap_err();
        assert!(matches!(err, TrialError::UnknownEndpoint(_)));
        assert!(dispatcher.backend().client().calls().is_empty());
    }

    #[test]
    fn test_api_list_tables() {
        let dispatcher = Dispatcher::new(ApiTools::new(RecordingApi::default()));
        let first = dispatcher.execute("list-tables", None).unwrap();
        let listed: Vec<String> = serde_json::from_str(first.first_text().unwrap()).unwrap();
        assert!(listed.contains(&"drug/ndc".to_string()));
        assert_eq!(first, dispatcher.execute("list-tables", None).unwrap());
    }

    #[test]
    fn test_api_read_query_defaults() {
        let api = RecordingApi::with_payload(json!({ "results": [{ "sponsor_name": "PFIZER" }] }));
        let dispatcher = Dispatcher::new(ApiTools::new(api));

        let result = dispatcher
            .execute("read-query", Some(&json!({ "query": " sponsor_name:pfizer " })))
            .unwrap();

        let calls = dispatcher.backend().client().calls();
        assert_eq!(
            calls,
            vec![ApiRequest {
                endpoint: "drug/drugsfda".into(),
                search: Some("sponsor_name:pfizer".into()),
                count: None,
                sort: None,
                limit: Some(1),
            }]
        );

        let text = result.first_text().unwrap();
        assert!(text.contains('\n'));
        let decoded: Value = serde_json::from_str(text).unwrap();
        assert_eq!(decoded["results"][0]["sponsor_name"], "PFIZER");
    }

    #[test]
    fn test_api_read_query_passes_count_sort_and_endpoint() {
        let dispatcher = Dispatcher::new(
            ApiTools::new(RecordingApi::default()).with_defaults("drug/label", 10),
        );
        dispatcher
            .execute(
                "read-query",
                Some(&json!({
                    "search_query": "patient.drug.medicinalproduct:aspirin",
                    "endpoint": "event",
                    "count": "patient.reaction.reactionmeddrapt.exact",
                    "sort": "receivedate:desc",
                    "limit": 50
                })),
            )
            .unwrap();

        let call = &dispatcher.backend().client().calls()[0];
        assert_eq!(call.endpoint, "drug/event");
        assert_eq!(call.count.as_deref(), Some("patient.reaction.reactionmeddrapt.exact"));
        assert_eq!(call.sort.as_deref(), Some("receivedate:desc"));
        assert_eq!(call.limit, Some(50));
        assert!(!call.query_pairs().iter().any(|(k, _)| *k == "limit"));
    }

    #[test]
    fn test_api_count_without_limit_skips_default() {
        let dispatcher = Dispatcher::new(ApiTools::new(RecordingApi::default()));
        dispatcher
            .execute(
                "read-query",
                Some(&json!({
                    "query": "patient.drug.medicinalproduct:aspirin",
                    "endpoint": "event",
                    "count": "patient.reaction.reactionmeddrapt.exact"
                })),
            )
            .unwrap();

        let call = &dispatcher.backend().client().calls()[0];
        assert_eq!(call.limit, None);
        assert_eq!(
            call.query_pairs(),
            vec![
                ("search", "patient.drug.medicinalproduct:aspirin".to_string()),
                ("count", "patient.reaction.reactionmeddrapt.exact".to_string()),
            ]
        );
    }

    #[test]
    fn test_api_read_query_unknown_endpoint() {
        let dispatcher = Dispatcher::new(ApiTools::new(RecordingApi::default()));
        let err = dispatcher
            .execute(
                "read-query",
                Some(&json!({ "query": "x", "endpoint": "food/event" })),
            )
            .unwrap_err();
        assert!(matches!(err, TrialError::UnknownEndpoint(e) if e == "food/event"));
        assert!(dispatcher.backend().client().calls().is_empty());
    }

    #[test]
    fn test_api_shutdown_closes_client() {
        let dispatcher = Dispatcher::new(ApiTools::new(RecordingApi::default()));
        dispatcher.shutdown();
        assert_eq!(dispatcher.backend().client().closed(), 1);
    }
}
