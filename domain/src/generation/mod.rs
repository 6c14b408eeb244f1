//! Text generation vocabulary shared by the capability port and its adapters.
//!
//! - [`endpoint::CapabilityEndpoint`] - which backend and model answers a call
//! - [`request::GenerationRequest`] - a single prompt sent to an endpoint
//! - [`stream::StreamEvent`] - incremental output of a streaming call

pub mod endpoint;
pub mod request;
pub mod stream;
