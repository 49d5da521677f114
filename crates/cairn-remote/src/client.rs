use async_trait::async_trait;
use cairn_store::{ChunkStore, StoreResult};
use cairn_types::{Chunk, Hash, FORMAT_VERSION};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{RemoteError, RemoteResult};
use crate::protocol::{
    HasRequest, HasResponse, RootResponse, UpdateRootRequest, UpdateRootResponse,
    VersionResponse, VERSION_HEADER,
};

/// A [`ChunkStore`] served by a remote `cairn serve`.
///
/// Chunks returned by `get` carry the hash they were requested by; callers
/// that need integrity verify them, as the pull engine and
/// `Database::read_value` do. `close` only affects this client, never the
/// remote store.
#[derive(Clone, Debug)]
pub struct HttpChunkStore {
    http: reqwest::Client,
    base_url: Url,
    version: String,
}

impl HttpChunkStore {
    /// Connect to a server and check its format version.
    ///
    /// A path in `url` is kept as a prefix for every endpoint.
    pub async fn open(url: &str) -> RemoteResult<Self> {
        let base_url = base_url(url)?;
        let mut store = Self {
            http: reqwest::Client::new(),
            base_url,
            version: String::new(),
        };

        let response = store.http.get(store.url("v1/version")?).send().await?;
        let header = response
            .headers()
            .get(VERSION_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body: VersionResponse = Self::json(response).await?;
        let version = header.unwrap_or(body.version);
        if version != FORMAT_VERSION {
            return Err(RemoteError::VersionMismatch {
                expected: FORMAT_VERSION.to_string(),
                actual: version,
            });
        }
        debug!(url = %store.base_url, %version, "connected to remote store");
        store.version = version;
        Ok(store)
    }

    /// The server's base URL.
    pub fn url_base(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> RemoteResult<Url> {
        endpoint(&self.base_url, path)
    }

    async fn check(response: reqwest::Response) -> RemoteResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::UnexpectedStatus {
            status: status.as_u16(),
            body,
        })
    }

    async fn json<T: DeserializeOwned>(response: reqwest::Response) -> RemoteResult<T> {
        Ok(Self::check(response).await?.json().await?)
    }

    async fn fetch(&self, hash: &Hash) -> RemoteResult<Option<Chunk>> {
        let response = self
            .http
            .get(self.url(&format!("v1/chunks/{hash}"))?)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let bytes = Self::check(response).await?.bytes().await?;
        Ok(Some(Chunk::with_hash(*hash, bytes)))
    }

    async fn contains(&self, hashes: &[Hash]) -> RemoteResult<Vec<bool>> {
        let request = HasRequest {
            hashes: hashes.to_vec(),
        };
        let response = self
            .http
            .post(self.url("v1/has")?)
            .json(&request)
            .send()
            .await?;
        let body: HasResponse = Self::json(response).await?;
        if body.present.len() != hashes.len() {
            return Err(RemoteError::MalformedResponse(format!(
                "asked about {} chunks, got {} answers",
                hashes.len(),
                body.present.len()
            )));
        }
        Ok(body.present)
    }

    async fn store(&self, chunk: Chunk) -> RemoteResult<()> {
        let url = self.url(&format!("v1/chunks/{}", chunk.hash()))?;
        let response = self
            .http
            .put(url)
            .body(chunk.data().clone())
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn current_root(&self) -> RemoteResult<Hash> {
        let response = self.http.get(self.url("v1/root")?).send().await?;
        let body: RootResponse = Self::json(response).await?;
        Ok(body.root)
    }

    async fn swap_root(&self, new: Hash, expected: Hash) -> RemoteResult<bool> {
        let response = self
            .http
            .post(self.url("v1/root")?)
            .json(&UpdateRootRequest { new, expected })
            .send()
            .await?;
        let body: UpdateRootResponse = Self::json(response).await?;
        debug!(swapped = body.swapped, root = %body.root, "remote root CAS");
        Ok(body.swapped)
    }
}

/// Parse a server URL so relative endpoint paths land under its path.
fn base_url(url: &str) -> RemoteResult<Url> {
    let mut base = Url::parse(url).map_err(|e| RemoteError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;
    if base.cannot_be_a_base() {
        return Err(RemoteError::InvalidUrl {
            url: url.to_string(),
            reason: "not a base URL".into(),
        });
    }
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base)
}

fn endpoint(base: &Url, path: &str) -> RemoteResult<Url> {
    base.join(path).map_err(|e| RemoteError::InvalidUrl {
        url: format!("{base}{path}"),
        reason: e.to_string(),
    })
}

#[async_trait]
impl ChunkStore for HttpChunkStore {
    async fn get(&self, hash: &Hash) -> StoreResult<Option<Chunk>> {
        Ok(self.fetch(hash).await?)
    }

    async fn has(&self, hash: &Hash) -> StoreResult<bool> {
        let present = self.contains(std::slice::from_ref(hash)).await?;
        Ok(present[0])
    }

    async fn put(&self, chunk: Chunk) -> StoreResult<()> {
        Ok(self.store(chunk).await?)
    }

    async fn root(&self) -> StoreResult<Hash> {
        Ok(self.current_root().await?)
    }

    async fn update_root(&self, new: Hash, expected: Hash) -> StoreResult<bool> {
        Ok(self.swap_root(new, expected).await?)
    }

    fn version(&self) -> &str {
        &self.version
    }

    async fn close(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn has_many(&self, hashes: &[Hash]) -> StoreResult<Vec<bool>> {
        if hashes.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.contains(hashes).await?)
    }
}
