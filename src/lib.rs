//! # configmerge
//!
//! Groups Kubernetes ConfigMaps by a label (`vpc-id` by default) and merges
//! one data key (`subnet-id`) from every member into a single ConfigMap per
//! group. The same transform can run through several embedded engines.
//!
//! ## Usage
//!
//! ```bash
//! configmerge run [--engine native|expression|template|script] [--input cms.yaml]
//! configmerge compare
//! ```
//!
//! ## Modules
//!
//! - `transform` - The pure group-and-merge function and group ordering
//! - `model` - ConfigMap types, input loading and the sample set
//! - `engine` - Interchangeable engines (native, expression rules, tera, QuickJS)
//! - `expression` - Small expression language for selection and rules
//! - `selection` - Pre-selection of input records with a filter expression
//! - `config` - TOML configuration and environment overrides
//! - `report` - Text, JSON and YAML output
//! - `app` - Command implementations used by the binary
pub mod app;
pub mod config;
pub mod engine;
pub mod error;
pub mod expression;
pub mod model;
pub mod report;
pub mod selection;
pub mod transform;

pub use error::{Error, Result};
pub use model::ConfigMap;
pub use transform::{group_and_merge, transform, MergeRule};
