//! Runtime adapters
//!
//! Each submodule hosts the same [`ClientProtocol`](crate::ClientProtocol) on
//! a different concurrency runtime. Only the adapter differs.

pub mod channel;
pub mod tokio;
