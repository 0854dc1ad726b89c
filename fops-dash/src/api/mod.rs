//! HTTP API handlers for fops-dash

pub mod approvals;
pub mod buildinfo;
pub mod error;
pub mod health;
pub mod lists;
pub mod sse;
pub mod status;

pub use approvals::{approve, get_feed, list_approvals, reject};
pub use buildinfo::get_build_info;
pub use error::ApiError;
pub use health::health_routes;
pub use lists::{list_areas, list_contractors, list_targets};
pub use sse::event_stream;
pub use status::get_status;
