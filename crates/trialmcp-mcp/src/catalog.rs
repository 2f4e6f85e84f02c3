use serde_json::{json, Map, Value};

use trialmcp_core::MemoTemplate;

use crate::resources::ResourceDescriptor;

// ---------------------------------------------------------------------------
// Descriptor types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    ReadQuery,
    ListTables,
    DescribeTable,
    AppendInsight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Integer,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamDefault {
    Str(&'static str),
    Int(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    /// Alternative keys accepted in place of `name`.
    pub aliases: &'static [&'static str],
    pub ty: ParamType,
    pub required: bool,
    pub description: &'static str,
    pub default: Option<ParamDefault>,
}

impl ParamSpec {
    /// The canonical name followed by its aliases.
    pub fn keys(&self) -> impl Iterator<Item = &'static str> {
        let aliases: &'static [&'static str] = self.aliases;
        std::iter::once(self.name).chain(aliases.iter().copied())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolDescriptor {
    pub name: &'static str,
    pub kind: ToolKind,
    pub description: &'static str,
    pub params: &'static [ParamSpec],
}

impl ToolDescriptor {
    pub fn input_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();
        let mut any_of_keys = Vec::new();

        for param in self.params {
            for key in param.keys() {
                let description = if key == param.name {
                    param.description.to_string()
                } else {
                    format!("Alias of `{}`", param.name)
                };
                let mut prop = json!({
                    "type": param.ty.as_str(),
                    "description": description,
                });
                match param.default {
                    Some(ParamDefault::Str(s)) => prop["default"] = json!(s),
                    Some(ParamDefault::Int(i)) => prop["default"] = json!(i),
                    None => {}
                }
                properties.insert(key.to_string(), prop);
            }

            if param.required {
                if param.aliases.is_empty() {
                    required.push(param.name);
                } else {
                    any_of_keys.extend(param.keys());
                }
            }
        }

        let mut schema = json!({
            "type": "object",
            "properties": properties,
            "additionalProperties": false,
        });
        if !required.is_empty() {
            schema["required"] = json!(required);
        }
        if !any_of_keys.is_empty() {
            let alternatives: Vec<Value> = any_of_keys
                .iter()
                .map(|k| json!({ "required": [k] }))
                .collect();
            schema["anyOf"] = Value::Array(alternatives);
        }
        schema
    }

    pub fn to_json(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "inputSchema": self.input_schema(),
        })
    }
}

/// Everything that differs between the two deployments apart from the backend itself.
#[derive(Debug)]
pub struct Catalog {
    pub server_name: &'static str,
    pub instructions: &'static str,
    pub tools: &'static [ToolDescriptor],
    /// Acknowledgement returned after a finding is recorded.
    pub insight_ack: &'static str,
    pub memo: MemoTemplate,
    pub resource: ResourceDescriptor,
}

impl Catalog {
    pub fn list_tools(&self) -> &'static [ToolDescriptor] {
        self.tools
    }

    pub fn find(&self, name: &str) -> Option<&'static ToolDescriptor> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// Payload for `tools/list`.
    pub fn tool_definitions(&self) -> Value {
        let tools: Vec<Value> = self.tools.iter().map(ToolDescriptor::to_json).collect();
        json!({ "tools": tools })
    }
}

// ---------------------------------------------------------------------------
// Clinical trials (AACT)
// ---------------------------------------------------------------------------

pub static AACT: Catalog = Catalog {
    server_name: "trialmcp-aact",
    instructions: "\
Explore the AACT clinical trials database.\n\
Start with list-tables and describe-table to learn the schema, then use read-query with \
SELECT statements to extract data. Record each meaningful pattern with append-insight; the \
collected findings are available as the memo://insights resource.",
    tools: &[
        ToolDescriptor {
            name: "read-query",
            kind: ToolKind::ReadQuery,
            description: "Execute a SELECT query on the AACT clinical trials database. Use this tool to extract and analyze specific data from any table.",
            params: &[ParamSpec {
                name: "query",
                aliases: &[],
                ty: ParamType::String,
                required: true,
                description: "SELECT SQL query to execute",
                default: None,
            }],
        },
        ToolDescriptor {
            name: "list-tables",
            kind: ToolKind::ListTables,
            description: "Get an overview of all available tables in the AACT database. Use it to understand the database structure before starting an analysis.",
            params: &[],
        },
        ToolDescriptor {
            name: "describe-table",
            kind: ToolKind::DescribeTable,
            description: "Examine the structure of a specific AACT table, including column names and data types. Use this before querying to target the right columns.",
            params: &[ParamSpec {
                name: "table_name",
                aliases: &[],
                ty: ParamType::String,
                required: true,
                description: "Name of the table to describe",
                default: None,
            }],
        },
        ToolDescriptor {
            name: "append-insight",
            kind: ToolKind::AppendInsight,
            description: "Record key findings discovered during the analysis: meaningful patterns, trends, or notable observations about clinical trials.",
            params: &[ParamSpec {
                name: "finding",
                aliases: &[],
                ty: ParamType::String,
                required: true,
                description: "Analysis finding about trial patterns or trends",
                default: None,
            }],
        },
    ],
    insight_ack: "Insight added",
    memo: MemoTemplate::TRIALS,
    resource: ResourceDescriptor {
        uri: "memo://insights",
        name: "Clinical Trials Landscape",
        description: "Key findings about clinical trial patterns recorded from the AACT database",
        mime_type: "text/plain",
    },
};

// ---------------------------------------------------------------------------
// Drug safety (openFDA)
// ---------------------------------------------------------------------------

pub static OPENFDA: Catalog = Catalog {
    server_name: "trialmcp-openfda",
    instructions: "\
Explore drug safety data from the openFDA API.\n\
Use list-tables to see the available endpoints and describe-table for their fields and an \
example query. read-query runs a search: use `count` for aggregated buckets or `limit` for raw \
records (count takes precedence). Record findings with append-landscape; they are available \
as the memo://landscape resource.",
    tools: &[
        ToolDescriptor {
            name: "read-query",
            kind: ToolKind::ReadQuery,
            description: "Execute a search on the OpenFDA API for drug information",
            params: &[
                ParamSpec {
                    name: "query",
                    aliases: &["search_query"],
                    ty: ParamType::String,
                    required: true,
                    description: "OpenFDA search expression, e.g. brand_name:\"advil\"",
                    default: None,
                },
                ParamSpec {
                    name: "endpoint",
                    aliases: &[],
                    ty: ParamType::String,
                    required: false,
                    description: "API endpoint (e.g. drugsfda, label, ndc, enforcement, event)",
                    default: Some(ParamDefault::Str(trialmcp_openfda::DEFAULT_ENDPOINT)),
                },
                ParamSpec {
                    name: "count",
                    aliases: &[],
                    ty: ParamType::String,
                    required: false,
                    description: "Field to count unique values of; returns aggregated buckets",
                    default: None,
                },
                ParamSpec {
                    name: "sort",
                    aliases: &[],
                    ty: ParamType::String,
                    required: false,
                    description: "Sort expression, e.g. receivedate:desc",
                    default: None,
                },
                ParamSpec {
                    name: "limit",
                    aliases: &[],
                    ty: ParamType::Integer,
                    required: false,
                    description: "Maximum number of records to return; ignored when count is set",
                    default: Some(ParamDefault::Int(1)),
                },
            ],
        },
        ToolDescriptor {
            name: "list-tables",
            kind: ToolKind::ListTables,
            description: "List all available OpenFDA drug endpoints",
            params: &[],
        },
        ToolDescriptor {
            name: "describe-table",
            kind: ToolKind::DescribeTable,
            description: "Get the available fields and an example query for a specific OpenFDA endpoint",
            params: &[ParamSpec {
                name: "table_name",
                aliases: &[],
                ty: ParamType::String,
                required: true,
                description: "Name of the endpoint to describe (e.g. drugsfda, label, ndc)",
                default: None,
            }],
        },
        ToolDescriptor {
            name: "append-landscape",
            kind: ToolKind::AppendInsight,
            description: "Add findings and insights related to the drug analysis to the memo",
            params: &[ParamSpec {
                name: "finding",
                aliases: &[],
                ty: ParamType::String,
                required: true,
                description: "Analysis finding about drug patterns or trends",
                default: None,
            }],
        },
    ],
    insight_ack: "Landscape finding added",
    memo: MemoTemplate::DRUGS,
    resource: ResourceDescriptor {
        uri: "memo://landscape",
        name: "Drug Insights Landscape",
        description: "Key findings about drug safety, labeling, and adverse events from OpenFDA data",
        mime_type: "text/plain",
    },
};
