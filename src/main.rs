mod download;
mod error;
mod logging;
mod options;

use std::{path::PathBuf, process::ExitCode, time::Duration};

use clap::Parser;
use tracing::{debug, error, info};
use url::Url;

use download::{resolve::InputShape, video::download_video, DownloadClient};
use options::{parse_size, Options};

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    #[clap(value_parser = url_parser)]
    /// a player page (MediaPlayer.php / DownloadFile.php) or a direct .mp4 link
    url: String,

    #[clap(short, long)]
    /// write the video here instead of the media file name in the current directory
    output: Option<PathBuf>,

    #[clap(short, long, default_value = "16MB", value_parser = parse_size)]
    /// size of each downloaded chunk, e.g. 512KB, 16MB, 1GB
    chunk_size: u64,

    #[clap(short, long, default_value = "20", value_parser = clap::value_parser!(u64).range(1..))]
    /// set the maximum number of parallel chunk downloads
    parallel: u64,

    #[clap(short, long)]
    /// keep the temporary folder with the chunk files
    keep: bool,

    #[clap(short, long, default_value = "60", value_parser = clap::value_parser!(u64).range(1..))]
    /// per request timeout in seconds
    timeout: u64,

    #[clap(long)]
    /// host serving the archived media files
    archive_base: Option<Url>,

    #[clap(short, long)]
    /// log every request
    verbose: bool,
}

fn url_parser(url: &str) -> Result<String, String> {
    match InputShape::detect(url) {
        Ok(_) => Ok(url.to_string()),
        Err(err) => Err(err.to_string()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    logging::init_logging(args.verbose);

    let mut options = Options {
        max_parallel_downloads: args.parallel as usize,
        chunk_size: args.chunk_size,
        keep_chunks: args.keep,
        request_timeout: Duration::from_secs(args.timeout),
        output: args.output,
        ..Options::default()
    };
    if let Some(archive_base) = args.archive_base {
        options.archive_base = archive_base;
    }

    debug!(?options, "options");

    let client = match DownloadClient::new(&options) {
        Ok(client) => client,
        Err(err) => {
            error!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    match download_video(&client, &args.url, &options).await {
        Ok(done) => {
            if let Some(folder) = &done.chunk_folder {
                info!("kept chunk files in {}", folder.display());
            }
            info!("finished downloading {} from: {}", done.output.display(), done.resource.uri);
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(phase = %err.phase(), "download failed: {}", err);
            ExitCode::FAILURE
        }
    }
}
