pub mod api;
pub mod types;

pub use api::ApsClient;
pub use types::{Hub, Issue, IssueFilters, IssueType, Project, ISSUE_LIMIT};
