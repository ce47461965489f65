//! Request and Response models for the admin API
//!
//! DTOs serialized to and from the HTTP bodies of the sidecar endpoints.

pub mod requests;
pub mod responses;

pub use requests::{BatchFetchRequest, InvalidateRequest};
pub use responses::{
    BatchItem, BatchResponse, ClearResponse, EntriesResponse, HealthResponse, InvalidateResponse,
    MetricsResponse,
};
