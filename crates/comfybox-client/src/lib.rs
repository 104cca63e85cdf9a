//! Client for a ComfyBox backend: service listing, schema-driven forms,
//! execution, and result rendering.

pub mod api;
pub mod card;
pub mod catalog;
pub mod config;
pub mod form;
pub mod invocation;
pub mod render;
pub mod staging;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod worker;

pub use api::{HttpBackend, ServiceBackend};
pub use card::{Completion, ServiceCard, Submission};
pub use catalog::{find_service, ServiceListClient};
pub use config::ClientConfig;
pub use invocation::InvocationClient;
pub use render::{ResultEntry, ResultRenderer};
pub use staging::FileStager;
pub use worker::{ExecutionDone, ExecutionJob, ExecutionWorker};
