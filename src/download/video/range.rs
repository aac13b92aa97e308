use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, RANGE};
use tokio::{sync::Semaphore, task::JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    download::{resolve::MediaResource, DownloadClient},
    error::FetchError,
};

/// One planned byte span of the media, `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSpec {
    pub index: u64,
    pub start: u64,
    pub end: u64,
}

impl ChunkSpec {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    /// Inclusive last byte, as used in the `Range` header.
    pub fn last_byte(&self) -> u64 {
        self.end - 1
    }
}

pub fn artifact_path(folder: &Path, index: u64) -> PathBuf {
    folder.join(format!("{}.mp4", index))
}

/// Splits `length` bytes into `ceil(length / chunk_size)` disjoint chunks.
/// Only the last chunk may be shorter than `chunk_size`, and none are empty.
pub fn plan_chunks(length: u64, chunk_size: u64) -> Vec<ChunkSpec> {
    if chunk_size == 0 {
        return Vec::new();
    }

    (0..length.div_ceil(chunk_size))
        .map(|index| {
            let start = index * chunk_size;
            let end = start.saturating_add(chunk_size).min(length);
            ChunkSpec { index, start, end }
        })
        .collect()
}

/// Fetches the inclusive byte range `start..=stop` of the resource.
///
/// A `stop` past the end of the resource is clamped to its last byte.
pub async fn fetch_range(
    client: &DownloadClient,
    resource: &MediaResource,
    start: u64,
    stop: u64,
) -> Result<Bytes, FetchError> {
    let invalid = FetchError::InvalidRange {
        start,
        stop,
        length: resource.length,
    };

    if start > stop || start >= resource.length {
        return Err(invalid);
    }

    let last = resource.length - 1;
    let stop = if stop > last {
        debug!(stop, last, "range end is past the end of the resource, clamping");
        last
    } else {
        stop
    };

    let mut headers = HeaderMap::new();
    let range =
        HeaderValue::from_str(&format!("bytes={}-{}", start, stop)).map_err(|_| invalid)?;
    headers.insert(RANGE, range);

    debug!(start, stop, "fetching range");
    let bytes = client.download_header(&resource.uri, &headers).await?;
    debug!(start, stop, received = bytes.len(), "fetched range");

    Ok(bytes)
}

struct ChunkTask {
    client: DownloadClient,
    resource: Arc<MediaResource>,
    folder: Arc<PathBuf>,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
}

impl ChunkTask {
    /// Returns `Ok(false)` when the chunk was abandoned because another chunk
    /// failed first. Nothing is written after cancellation.
    async fn run(&self, chunk: ChunkSpec) -> Result<bool, FetchError> {
        let permit = tokio::select! {
            _ = self.cancel.cancelled() => return Ok(false),
            permit = self.semaphore.acquire() => permit,
        };
        let Ok(_permit) = permit else {
            return Ok(false);
        };

        let fetch = fetch_range(&self.client, &self.resource, chunk.start, chunk.last_byte());
        let bytes = tokio::select! {
            _ = self.cancel.cancelled() => return Ok(false),
            bytes = fetch => bytes?,
        };

        if bytes.len() as u64 != chunk.len() {
            return Err(FetchError::ChunkLength {
                index: chunk.index,
                expected: chunk.len(),
                received: bytes.len() as u64,
            });
        }

        if self.cancel.is_cancelled() {
            return Ok(false);
        }

        let path = artifact_path(&self.folder, chunk.index);
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|source| FetchError::io(&path, source))?;
        debug!(index = chunk.index, path = %path.display(), "wrote chunk");

        Ok(true)
    }
}

/// Downloads every chunk of the resource into `folder`, at most
/// `max_parallel` at a time, and returns the plan that was written.
///
/// The first failing chunk cancels the rest; its error is returned once all
/// tasks have stopped.
pub async fn download_chunks(
    client: &DownloadClient,
    resource: Arc<MediaResource>,
    chunk_size: u64,
    max_parallel: usize,
    folder: &Path,
) -> Result<Vec<ChunkSpec>, FetchError> {
    let chunks = plan_chunks(resource.length, chunk_size);
    let total = chunks.len();
    info!(chunks = total, chunk_size, "splitting media into chunks");

    let task = Arc::new(ChunkTask {
        client: client.clone(),
        resource,
        folder: Arc::new(folder.to_path_buf()),
        semaphore: Arc::new(Semaphore::new(max_parallel.clamp(1, Semaphore::MAX_PERMITS))),
        cancel: CancellationToken::new(),
    });

    let mut tasks = JoinSet::new();
    for chunk in chunks.iter().copied() {
        let task = Arc::clone(&task);
        tasks.spawn(async move {
            task.run(chunk).await.map_err(|source| FetchError::Chunk {
                index: chunk.index,
                source: Box::new(source),
            })
        });
    }

    let mut downloaded = 0;
    let mut first_error = None;
    while let Some(joined) = tasks.join_next().await {
        match joined.map_err(FetchError::from).and_then(|result| result) {
            Ok(true) => {
                downloaded += 1;
                info!(
                    "downloaded {} / {} chunks ({:5.2}%)",
                    downloaded,
                    total,
                    (downloaded as f64 / total as f64) * 100.
                );
            }
            Ok(false) => {}
            Err(err) if first_error.is_none() => {
                error!("{}, cancelling remaining chunks", err);
                task.cancel.cancel();
                first_error = Some(err);
            }
            Err(err) => warn!("{}", err),
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(chunks),
    }
}
