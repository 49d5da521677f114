use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

/// Default port for `cairn serve`.
pub const DEFAULT_PORT: u16 = 8000;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Largest chunk body accepted by `PUT /v1/chunks/:hash`.
    pub max_chunk_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_chunk_size: 64 * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// Listen on all interfaces at `port`.
    pub fn with_port(port: u16) -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], port)),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = ServerConfig::default();
        assert_eq!(c.bind_addr.port(), 8000);
        assert_eq!(c.max_chunk_size, 64 * 1024 * 1024);
    }

    #[test]
    fn with_port() {
        assert_eq!(ServerConfig::with_port(9001).bind_addr.port(), 9001);
    }
}
