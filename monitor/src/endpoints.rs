use js5watch_client::{self as client, ClientConfig, Js5Client, Transport};
use js5watch_proto::Revision;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
#[error("endpoint set must contain at least one address")]
pub struct EmptyEndpointSet;

#[derive(Debug, Error)]
#[error("{address}: {source}")]
pub struct EndpointError {
    pub address: String,
    #[source]
    pub source: client::Error,
}

/// Connections to addresses believed to serve the same cluster.
///
/// The first endpoint is the primary, which is probed continuously; the rest are only consulted to corroborate a
/// primary failure.
pub struct EndpointSet<T> {
    endpoints: Vec<T>,
}

impl EndpointSet<Js5Client> {
    pub fn from_addrs<I>(addrs: I, config: &ClientConfig) -> Result<Self, EmptyEndpointSet>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self::new(
            addrs
                .into_iter()
                .map(|addr| Js5Client::new(addr, config.clone()))
                .collect(),
        )
    }
}

impl<T: Transport> EndpointSet<T> {
    pub fn new(endpoints: Vec<T>) -> Result<Self, EmptyEndpointSet> {
        if endpoints.is_empty() {
            return Err(EmptyEndpointSet);
        }
        Ok(Self { endpoints })
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn addresses(&self) -> impl Iterator<Item = &str> + '_ {
        self.endpoints.iter().map(|x| x.address())
    }

    pub fn primary_address(&self) -> &str {
        self.endpoints[0].address()
    }

    /// Connect every endpoint, the primary first.
    ///
    /// The revision the primary settles on is offered to the others. Returns the primary's revision. If any endpoint
    /// fails, every connection is dropped again.
    pub async fn connect_all(&mut self, revision: Revision) -> Result<Revision, EndpointError> {
        let result = self.try_connect_all(revision).await;
        if result.is_err() {
            self.close_all();
        }
        result
    }

    async fn try_connect_all(&mut self, revision: Revision) -> Result<Revision, EndpointError> {
        let (primary, redundant) = self.endpoints.split_at_mut(1);
        let settled = connect(&mut primary[0], revision).await?;
        for endpoint in redundant {
            let other = connect(&mut *endpoint, settled).await?;
            if other != settled {
                warn!(
                    endpoint = endpoint.address(),
                    primary = settled,
                    revision = other,
                    "endpoint settled on a different revision than the primary"
                );
            }
        }
        Ok(settled)
    }

    pub async fn ping_primary(&mut self) -> Result<Vec<u8>, client::Error> {
        self.endpoints[0].ping().await
    }

    /// Whether any redundant endpoint still answers, probing in order until one does
    pub async fn any_redundant_alive(&mut self) -> bool {
        for endpoint in &mut self.endpoints[1..] {
            if endpoint.ping().await.is_ok() {
                return true;
            }
        }
        false
    }

    pub fn close_all(&mut self) {
        for endpoint in &mut self.endpoints {
            endpoint.close();
        }
    }
}

async fn connect<T: Transport>(
    endpoint: &mut T,
    revision: Revision,
) -> Result<Revision, EndpointError> {
    endpoint
        .connect(revision)
        .await
        .map_err(|source| EndpointError {
            address: endpoint.address().into(),
            source,
        })
}
