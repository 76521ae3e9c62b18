//! Builders
//!
//! Fluent builder for flow configuration.

pub mod config;

pub use config::{flow_config, openid_config, FlowConfigBuilder};
