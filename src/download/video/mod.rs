pub mod assemble;
pub mod range;

#[cfg(test)]
pub(crate) mod test_support;

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use tracing::{info, warn};

use crate::{
    download::{resolve::resolve, resolve::MediaResource, DownloadClient},
    error::FetchError,
    options::Options,
};

use assemble::assemble;
use range::download_chunks;

const FALLBACK_FILE_NAME: &str = "video.mp4";

#[derive(Debug)]
pub struct Downloaded {
    pub resource: MediaResource,
    pub output: PathBuf,
    /// Set when the chunk files were kept on request.
    pub chunk_folder: Option<PathBuf>,
}

fn output_path(resource: &MediaResource, options: &Options) -> PathBuf {
    options
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(resource.file_name().unwrap_or(FALLBACK_FILE_NAME)))
}

fn remove_partial_output(output: &Path) {
    if let Err(err) = std::fs::remove_file(output) {
        warn!("could not remove partial output {}: {}", output.display(), err);
    }
}

async fn fetch_and_assemble(
    client: &DownloadClient,
    resource: &Arc<MediaResource>,
    folder: &Path,
    output: &Path,
    options: &Options,
) -> Result<(), FetchError> {
    let chunks = download_chunks(
        client,
        Arc::clone(resource),
        options.chunk_size,
        options.max_parallel_downloads,
        folder,
    )
    .await?;

    info!("finished fetching chunks, combining them into {}", output.display());
    let written = match assemble(folder, chunks.len() as u64, output) {
        Ok(written) => written,
        Err(err @ FetchError::OutputExists(_)) => return Err(err),
        Err(err) => {
            remove_partial_output(output);
            return Err(err);
        }
    };

    if written != resource.length {
        remove_partial_output(output);
        return Err(FetchError::SizeMismatch {
            expected: resource.length,
            written,
        });
    }

    info!("wrote {} bytes to {}", written, output.display());
    Ok(())
}

/// Resolves `input`, downloads the media in chunks and assembles it into a
/// single file. No output file is left behind when any step fails; the chunk
/// folder is removed unless `keep_chunks` is set.
pub async fn download_video(
    client: &DownloadClient,
    input: &str,
    options: &Options,
) -> Result<Downloaded, FetchError> {
    let resource = resolve(client, input, &options.archive_base).await?;

    // Fails fast before any chunk is fetched; the assembler refuses too.
    let output = output_path(&resource, options);
    if output.exists() {
        return Err(FetchError::OutputExists(output));
    }

    let stem = output
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| "chunks".to_string());

    let folder = tempfile::Builder::new()
        .prefix(&format!("{}-", stem))
        .tempdir()
        .map_err(|source| FetchError::io(std::env::temp_dir(), source))?;
    info!("saving chunks to {}", folder.path().display());

    let resource = Arc::new(resource);
    let result = fetch_and_assemble(client, &resource, folder.path(), &output, options).await;

    let chunk_folder = options.keep_chunks.then(|| folder.keep());

    result.map(|()| Downloaded {
        resource: Arc::unwrap_or_clone(resource),
        output,
        chunk_folder,
    })
}
