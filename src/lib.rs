//! CloudSight image recognition client
//!
//! Submits images (uploaded bytes or remote URLs) to the CloudSight API,
//! follows the resulting jobs until they reach a terminal status, and signs
//! every request with either a plain API key or OAuth 1.0 HMAC-SHA1.

pub mod config;
pub mod models;
pub mod services;

pub use config::{AppConfig, ClientConfig};
pub use models::job::{Job, JobStatus, SkipReason};
pub use models::request::RequestOptions;
pub use services::auth::{Authorizer, OAuth, SimpleAuth};
pub use services::classifier::{ClassificationClient, ClientError};
