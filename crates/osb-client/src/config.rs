//! Runtime configuration.

/// Cap on fully-buffered response bodies (control channel and API calls).
pub const MAX_RESPONSE_BYTES: usize = 10 * 1024 * 1024;

/// Deployment configuration for a [`SessionRegistry`](crate::SessionRegistry).
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Skip TLS certificate verification. Cloud-browser appliances commonly
    /// run with self-signed certificates inside the operator's network.
    pub accept_invalid_certs: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            accept_invalid_certs: true,
        }
    }
}
