use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::Path,
};

use tracing::debug;

use crate::{download::video::range::artifact_path, error::FetchError};

/// Concatenates the chunk artifacts `0..chunks` from `folder` into `output`,
/// strictly in index order, and returns the number of bytes written.
/// An existing `output` is never overwritten.
pub fn assemble(folder: &Path, chunks: u64, output: &Path) -> Result<u64, FetchError> {
    let output_error = |source: io::Error| FetchError::Output {
        path: output.to_path_buf(),
        source,
    };

    let file = File::create_new(output).map_err(|source| match source.kind() {
        io::ErrorKind::AlreadyExists => FetchError::OutputExists(output.to_path_buf()),
        _ => output_error(source),
    })?;
    let mut writer = BufWriter::new(file);
    let mut written = 0;

    for index in 0..chunks {
        let path = artifact_path(folder, index);
        let mut chunk = File::open(&path).map_err(|source| FetchError::MissingChunk {
            index,
            path: path.clone(),
            source,
        })?;

        let copied = io::copy(&mut chunk, &mut writer).map_err(output_error)?;
        debug!(index, copied, "appended chunk");
        written += copied;
    }

    writer.flush().map_err(output_error)?;

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_chunks(folder: &Path, chunks: &[&[u8]]) {
        for (index, bytes) in chunks.iter().enumerate() {
            std::fs::write(artifact_path(folder, index as u64), bytes).unwrap();
        }
    }

    #[test]
    fn concatenates_in_index_order() {
        let folder = tempfile::tempdir().unwrap();
        let chunks: Vec<Vec<u8>> = (0..12u8).map(|i| vec![i; 10 + i as usize]).collect();
        let slices: Vec<&[u8]> = chunks.iter().map(|chunk| chunk.as_slice()).collect();
        write_chunks(folder.path(), &slices);
        let output = folder.path().join("out.mp4");

        let written = assemble(folder.path(), chunks.len() as u64, &output).unwrap();

        assert_eq!(written, chunks.iter().map(|chunk| chunk.len() as u64).sum::<u64>());
        assert_eq!(std::fs::read(&output).unwrap(), chunks.concat());
    }

    #[test]
    fn leaves_an_existing_output_alone() {
        let folder = tempfile::tempdir().unwrap();
        write_chunks(folder.path(), &[b"abc".as_slice()]);
        let output = folder.path().join("out.mp4");
        std::fs::write(&output, b"previous content").unwrap();

        let err = assemble(folder.path(), 1, &output).unwrap_err();

        assert!(matches!(err, FetchError::OutputExists(_)), "{err}");
        assert_eq!(std::fs::read(&output).unwrap(), b"previous content");
    }

    #[test]
    fn missing_artifact_is_reported_by_index() {
        let folder = tempfile::tempdir().unwrap();
        write_chunks(folder.path(), &[b"abc".as_slice(), b"def".as_slice()]);
        std::fs::remove_file(artifact_path(folder.path(), 1)).unwrap();
        let output = folder.path().join("out.mp4");

        let err = assemble(folder.path(), 2, &output).unwrap_err();

        assert!(matches!(err, FetchError::MissingChunk { index: 1, .. }), "{err}");
    }

    #[test]
    fn no_chunks_gives_an_empty_file() {
        let folder = tempfile::tempdir().unwrap();
        let output = folder.path().join("out.mp4");

        assert_eq!(assemble(folder.path(), 0, &output).unwrap(), 0);
        assert!(std::fs::read(&output).unwrap().is_empty());
    }
}
