//! Static metadata for the openFDA drug endpoints.

use url::Url;

use trialmcp_core::{TrialError, TrialResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    /// Path segment below the base URL, e.g. `drug/ndc`.
    pub path: &'static str,
    pub description: &'static str,
    pub fields: &'static [&'static str],
    /// Sample `search` expression used to build an example URL.
    pub example_search: &'static str,
}

impl Endpoint {
    /// Short name without the `drug/` prefix.
    pub fn short_name(&self) -> &'static str {
        self.path.rsplit('/').next().unwrap_or(self.path)
    }

    pub fn url(&self, base_url: &str) -> String {
        format!("{}/{}.json", base_url.trim_end_matches('/'), self.path)
    }

    /// A ready-to-run search against this endpoint, with the query string percent-encoded.
    pub fn example_url(&self, base_url: &str) -> TrialResult<Url> {
        Url::parse_with_params(
            &self.url(base_url),
            &[("search", self.example_search), ("limit", "1")],
        )
        .map_err(|e| TrialError::Config(format!("invalid base URL {base_url}: {e}")))
    }
}

pub const DEFAULT_ENDPOINT: &str = "drug/drugsfda";

pub const ENDPOINTS: &[Endpoint] = &[
    Endpoint {
        path: "drug/drugsfda",
        description: "Drugs@FDA approved products and application history",
        fields: &["application_number", "sponsor_name", "products", "submissions"],
        example_search: "sponsor_name:\"pfizer\"",
    },
    Endpoint {
        path: "drug/label",
        description: "Structured product labeling",
        fields: &[
            "id",
            "effective_time",
            "indications_and_usage",
            "warnings",
            "adverse_reactions",
            "drug_interactions",
        ],
        example_search: "openfda.brand_name:\"lipitor\"",
    },
    Endpoint {
        path: "drug/ndc",
        description: "National Drug Code directory",
        fields: &["product_ndc", "generic_name", "brand_name"],
        example_search: "brand_name:\"advil\"",
    },
    Endpoint {
        path: "drug/enforcement",
        description: "Drug recall enforcement reports",
        fields: &[
            "recall_number",
            "status",
            "classification",
            "product_description",
            "reason_for_recall",
            "recall_initiation_date",
        ],
        example_search: "classification:\"Class I\"",
    },
    Endpoint {
        path: "drug/event",
        description: "FAERS adverse event reports",
        fields: &[
            "safetyreportid",
            "receivedate",
            "serious",
            "patient.drug.medicinalproduct",
            "patient.reaction.reactionmeddrapt",
        ],
        example_search: "patient.drug.medicinalproduct:\"aspirin\"",
    },
];

/// Look up an endpoint by full path (`drug/ndc`) or short name (`ndc`).
pub fn resolve(name: &str) -> Option<&'static Endpoint> {
    let name = name.trim().trim_matches('/');
    ENDPOINTS
        .iter()
        .find(|e| e.path == name || e.short_name() == name)
}
