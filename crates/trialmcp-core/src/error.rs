use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrialError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("missing required arguments")]
    MissingArguments,

    #[error("missing {0} argument")]
    MissingArgument(String),

    #[error("invalid arguments: {0}")]
    InvalidArgument(String),

    #[error("only SELECT queries are allowed for read-query")]
    OnlySelect,

    #[error("unknown table: {0}")]
    UnknownTable(String),

    #[error("unknown endpoint: {0}")]
    UnknownEndpoint(String),

    #[error("unknown resource: {0}")]
    UnknownResource(String),

    #[error("empty insight")]
    EmptyInsight,

    #[error("Query failed: {0}")]
    Query(String),

    #[error("OpenFDA API error: {0}")]
    Api(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),
}

impl TrialError {
    /// True for errors raised while validating a call, before any backend is touched.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::UnknownTool(_)
                | Self::MissingArguments
                | Self::MissingArgument(_)
                | Self::InvalidArgument(_)
                | Self::OnlySelect
                | Self::UnknownTable(_)
                | Self::UnknownEndpoint(_)
                | Self::UnknownResource(_)
                | Self::EmptyInsight
        )
    }
}

pub type TrialResult<T> = Result<T, TrialError>;
