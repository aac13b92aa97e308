use std::{path::PathBuf, time::Duration};

use url::Url;

pub const DEFAULT_ARCHIVE_BASE: &str = "http://archive-media.granicus.com:443";

#[derive(Debug, Clone)]
pub struct Options {
    pub max_parallel_downloads: usize,
    pub chunk_size: u64,
    pub keep_chunks: bool,
    pub request_timeout: Duration,
    pub archive_base: Url,
    pub output: Option<PathBuf>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_parallel_downloads: 20,
            chunk_size: 16 * 1024 * 1024,
            keep_chunks: false,
            request_timeout: Duration::from_secs(60),
            archive_base: Url::parse(DEFAULT_ARCHIVE_BASE)
                .expect("default archive base is a valid url"),
            output: None,
        }
    }
}

/// Parses a human readable size such as `16MB`, `512k` or `1GiB` into bytes.
/// Units are binary multiples and case-insensitive; a bare number is bytes.
pub fn parse_size(input: &str) -> Result<u64, String> {
    let input = input.trim();
    let split = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    let (digits, unit) = input.split_at(split);

    if digits.is_empty() {
        return Err(format!("size '{}' must start with a number", input));
    }

    let value = digits
        .parse::<u64>()
        .map_err(|err| format!("invalid size '{}': {}", input, err))?;

    let shift = match unit.trim().to_ascii_uppercase().as_str() {
        "" | "B" => 0,
        "K" | "KB" | "KIB" => 10,
        "M" | "MB" | "MIB" => 20,
        "G" | "GB" | "GIB" => 30,
        "T" | "TB" | "TIB" => 40,
        other => return Err(format!("unknown size unit '{}'", other)),
    };

    let bytes = value
        .checked_mul(1u64 << shift)
        .ok_or_else(|| format!("size '{}' is too large", input))?;

    if bytes == 0 {
        return Err("size must be greater than zero".to_string());
    }

    Ok(bytes)
}
