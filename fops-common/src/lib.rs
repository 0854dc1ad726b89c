//! # Field Ops Common Library
//!
//! Core of the field-operations dashboard, shared by the service crate:
//! - Planning-area geography and tier classification
//! - Generic entity filtering with honest pagination
//! - Live stream connector and reconnect policy
//! - Approval gate, feed and event bus
//! - Configuration loading and the data context

pub mod approval;
pub mod config;
pub mod connector;
pub mod context;
pub mod entities;
pub mod error;
pub mod events;
pub mod filter;
pub mod geography;
pub mod pagination;
pub mod status;
pub mod synthetic;
pub mod tier;

pub use error::{Error, Result};
