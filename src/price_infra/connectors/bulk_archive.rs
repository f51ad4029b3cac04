use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::{Cursor, Read};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use crate::error::{Error, Result};
use crate::price_infra::RawPayload;
use crate::price_infra::connectors::{HttpTransport, SourceAdapter};
use crate::price_infra::feed_cache::FeedCache;

/// Downloads a whole ZIP feed through the shared cache and hands the named
/// members to the strategies.
pub struct BulkArchiveAdapter {
    transport: HttpTransport,
    cache: Arc<FeedCache>,
    ttl: Duration,
    members: Vec<String>,
    max_member_bytes: u64,
}

impl BulkArchiveAdapter {
    pub fn new(
        transport: HttpTransport,
        cache: Arc<FeedCache>,
        ttl: Duration,
        members: Vec<String>,
        max_member_bytes: u64,
    ) -> Self {
        BulkArchiveAdapter {
            transport,
            cache,
            ttl,
            members,
            max_member_bytes,
        }
    }
}

#[async_trait]
impl SourceAdapter for BulkArchiveAdapter {
    async fn fetch(&self, url: &str, deadline: Instant) -> Result<RawPayload> {
        let transport = self.transport.clone();
        let archive = self
            .cache
            .get_or_fetch(url, self.ttl, || async move {
                let response = transport.get(url, deadline).await?;
                Ok::<_, Error>(response.bytes().await?.to_vec())
            })
            .await?;

        let members = self.members.clone();
        let limit = self.max_member_bytes;
        let extracted = tokio::task::spawn_blocking(move || read_members(&archive, &members, limit))
            .await
            .map_err(|e| Error::Archive(format!("decompression task failed: {}", e)))??;

        Ok(RawPayload::Archive(extracted))
    }
}

/// Decompresses the requested members; all of them must be present.
///
/// Buffers grow with the bytes actually read, never with the size the
/// member header declares. A member inflating past `limit` is rejected.
pub fn read_members(archive: &[u8], members: &[String], limit: u64) -> Result<BTreeMap<String, Vec<u8>>> {
    let mut zip = zip::ZipArchive::new(Cursor::new(archive))?;
    let mut extracted = BTreeMap::new();

    for name in members {
        let file = zip
            .by_name(name)
            .map_err(|_| Error::MissingArchiveMember(name.clone()))?;

        let mut contents = Vec::new();
        file.take(limit.saturating_add(1))
            .read_to_end(&mut contents)
            .map_err(|e| Error::Archive(format!("reading {}: {}", name, e)))?;
        if contents.len() as u64 > limit {
            return Err(Error::Archive(format!("member {} exceeds {} bytes", name, limit)));
        }
        extracted.insert(name.clone(), contents);
    }

    Ok(extracted)
}
