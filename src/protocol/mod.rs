//! Management-protocol proxy client
//!
//! Reads are described declaratively ([`ReadRequest`]) and sent as one
//! batch per call. Only a failure of the whole batch is an error.

mod client;
mod request;
mod response;

pub use client::{BatchQuery, ProxyClient, QueryError, RequestFactory};
pub use request::{Attribute, ReadRequest};
pub use response::ReadResponse;
