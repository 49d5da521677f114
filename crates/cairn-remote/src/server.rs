use std::sync::Arc;

use cairn_store::ChunkStore;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::ServerConfig;
use crate::error::RemoteResult;
use crate::router::build_router;

/// HTTP server exposing one chunk store.
pub struct ChunkServer {
    config: ServerConfig,
    store: Arc<dyn ChunkStore>,
}

impl ChunkServer {
    pub fn new(config: ServerConfig, store: Arc<dyn ChunkStore>) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(Arc::clone(&self.store), self.config.max_chunk_size)
    }

    /// Bind the configured address and serve until `shutdown` fires.
    pub async fn serve(self, shutdown: CancellationToken) -> RemoteResult<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve_on(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` fires.
    ///
    /// On shutdown the listener stops accepting, in-flight requests are
    /// allowed to finish, and then the store is closed.
    pub async fn serve_on(self, listener: TcpListener, shutdown: CancellationToken) -> RemoteResult<()> {
        let addr = listener.local_addr()?;
        let app = self.router();
        info!(%addr, version = self.store.version(), "cairn server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await?;

        info!(%addr, "server drained; closing store");
        self.store.close().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use cairn_store::MemoryChunkStore;

    use super::*;

    #[test]
    fn server_construction() {
        let server = ChunkServer::new(
            ServerConfig::with_port(9418),
            Arc::new(MemoryChunkStore::new()),
        );
        assert_eq!(server.config().bind_addr.port(), 9418);
        let _router = server.router();
    }

    #[tokio::test]
    async fn shutdown_closes_store() {
        let store = Arc::new(MemoryChunkStore::new());
        let server = ChunkServer::new(ServerConfig::default(), store.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let token = CancellationToken::new();
        let handle = tokio::spawn(server.serve_on(listener, token.clone()));

        token.cancel();
        handle.await.unwrap().unwrap();
        assert!(store.root().await.is_err());
    }
}
