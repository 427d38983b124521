//! Read descriptors sent to the management proxy

use serde::Serialize;

use crate::credentials::Credentials;

/// Attributes the prober reads from a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    /// Failure-detector view: peer address -> liveness status
    PeerStates,
    /// Region (datacenter) the node belongs to
    Region,
}

impl Attribute {
    pub fn mbean(self) -> &'static str {
        match self {
            Self::PeerStates => "org.apache.cassandra.net:type=FailureDetector",
            Self::Region => "org.apache.cassandra.db:type=EndpointSnitchInfo",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::PeerStates => "SimpleStates",
            Self::Region => "Datacenter",
        }
    }
}

/// Node the proxy should connect to, with the credentials to use
#[derive(Debug, Clone, Serialize)]
pub struct Target {
    pub url: String,
    pub user: String,
    pub password: String,
}

/// A single `read` operation inside a batch
#[derive(Debug, Clone, Serialize)]
pub struct ReadRequest {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub mbean: &'static str,
    pub attribute: &'static str,
    pub target: Target,
}

impl ReadRequest {
    /// Build a read of `attribute` on the node at `address`
    ///
    /// Addresses carry their leading slash (`/10.0.0.1`), which completes
    /// the `rmi:/` prefix of the service URL.
    pub fn new(attribute: Attribute, address: &str, jmx_port: u16, credentials: &Credentials) -> Self {
        Self {
            kind: "read",
            mbean: attribute.mbean(),
            attribute: attribute.name(),
            target: Target {
                url: service_url(address, jmx_port),
                user: credentials.user.clone(),
                password: credentials.password.clone(),
            },
        }
    }
}

pub fn service_url(address: &str, jmx_port: u16) -> String {
    format!("service:jmx:rmi:///jndi/rmi:/{}:{}/jmxrmi", address, jmx_port)
}
