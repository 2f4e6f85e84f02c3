pub mod backend;
pub mod error;
pub mod insight;

pub use backend::{ApiBackend, ApiRequest, Row, SqlBackend};
pub use error::{TrialError, TrialResult};
pub use insight::{InsightStore, MemoTemplate};
