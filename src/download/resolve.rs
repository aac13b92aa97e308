use std::sync::OnceLock;

use regex::Regex;
use reqwest::header::{HeaderMap, CONTENT_LENGTH, CONTENT_TYPE};
use tracing::{debug, info};
use url::Url;

use crate::download::DownloadClient;
use crate::error::FetchError;

pub const EXPECTED_CONTENT_TYPE: &str = "video/mp4";
const METADATA_PAGE: &str = "/ASX.php";
const PLAYER_PAGES: [&str; 2] = ["DownloadFile.php", "MediaPlayer.php"];

/// A media file that can be fetched directly, together with its size as
/// reported by the server when it was resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaResource {
    pub uri: Url,
    pub length: u64,
}

impl MediaResource {
    /// Last path segment of the media url, used as the default output name.
    pub fn file_name(&self) -> Option<&str> {
        self.uri
            .path_segments()
            .and_then(|segments| segments.last())
            .filter(|name| !name.is_empty())
    }
}

/// The kinds of input url we know how to turn into a media url.
///
/// The urls people pass around look like
///   * `http://city.granicus.com/DownloadFile.php?view_id=10&clip_id=30229` (rss feed)
///   * `http://city.granicus.com/MediaPlayer.php?view_id=10&clip_id=31040` (player page)
///   * `http://city.granicus.com/MediaPlayer.php?clip_id=31040`
///   * `http://archive-media.granicus.com:443/OnDemand/city/city_<uuid>.mp4` (media)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputShape {
    Direct(Url),
    PlayerPage {
        page: Url,
        clip_id: String,
        view_id: Option<String>,
    },
}

impl InputShape {
    pub fn detect(input: &str) -> Result<Self, FetchError> {
        let input = input.trim();
        let invalid = |reason: &str| FetchError::InvalidInput {
            url: input.to_string(),
            reason: reason.to_string(),
        };

        // Media urls copied out of a player often come without a scheme.
        let url = if input.contains("://") {
            Url::parse(input)
        } else {
            Url::parse(&format!("http://{}", input))
        }
        .map_err(|err| invalid(&err.to_string()))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid("only http and https urls are supported"));
        }

        let last_segment = url
            .path_segments()
            .and_then(|segments| segments.last())
            .unwrap_or("")
            .to_string();

        if last_segment.to_ascii_lowercase().ends_with(".mp4") {
            return Ok(InputShape::Direct(url));
        }

        if PLAYER_PAGES.contains(&last_segment.as_str()) {
            let query = |name: &str| {
                url.query_pairs()
                    .find(|(key, _)| key == name)
                    .map(|(_, value)| value.into_owned())
                    .filter(|value| !value.is_empty())
            };

            let clip_id =
                query("clip_id").ok_or_else(|| invalid("missing clip_id query parameter"))?;
            let view_id = query("view_id");

            return Ok(InputShape::PlayerPage {
                page: url,
                clip_id,
                view_id,
            });
        }

        Err(invalid("expected a .mp4 url or a DownloadFile.php/MediaPlayer.php page"))
    }
}

/// The ASX page lives on the same host as the player page.
fn asx_url(page: &Url, clip_id: &str, view_id: Option<&str>) -> Url {
    let mut url = page.clone();
    url.set_path(METADATA_PAGE);
    url.set_query(None);
    url.set_fragment(None);
    {
        let mut query = url.query_pairs_mut();
        if let Some(view_id) = view_id {
            query.append_pair("view_id", view_id);
        }
        query.append_pair("clip_id", clip_id);
    }

    url
}

fn media_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"OnDemand/mp4:([^.]+\.mp4)").expect("media id pattern compiles")
    })
}

/// Pulls the media id out of an ASX playlist. The interesting line looks like
/// `<REF HREF="rtmp://1.2.3.4/OnDemand/mp4:city/city_<uuid>.mp4?wmcache=0" />`
/// and the id is `city/city_<uuid>.mp4`.
pub fn scrape_media_id(body: &str) -> Option<&str> {
    media_id_pattern()
        .captures(body)
        .and_then(|captures| captures.get(1))
        .map(|id| id.as_str())
}

fn canonical_url(archive_base: &Url, media_id: &str) -> Result<Url, FetchError> {
    let joined = format!("{}/OnDemand/{}", archive_base.as_str().trim_end_matches('/'), media_id);

    Url::parse(&joined).map_err(|err| FetchError::InvalidInput {
        url: joined,
        reason: err.to_string(),
    })
}

/// Validates the HEAD response of a media url and returns its length.
pub fn media_length(url: &Url, headers: &HeaderMap) -> Result<u64, FetchError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
        .unwrap_or_default();

    if content_type != EXPECTED_CONTENT_TYPE {
        return Err(FetchError::UnexpectedContentType {
            url: url.to_string(),
            expected: EXPECTED_CONTENT_TYPE,
            got: content_type,
        });
    }

    let value = headers.get(CONTENT_LENGTH).ok_or_else(|| FetchError::MissingLength {
        url: url.to_string(),
    })?;

    let value = String::from_utf8_lossy(value.as_bytes());
    value.trim().parse::<u64>().map_err(|_| FetchError::InvalidLength {
        url: url.to_string(),
        value: value.into_owned(),
    })
}

async fn find_media_url(
    client: &DownloadClient,
    metadata_url: &Url,
    archive_base: &Url,
) -> Result<Url, FetchError> {
    info!(%metadata_url, "fetching clip metadata");
    let body = client.download(metadata_url).await?;
    let body = String::from_utf8_lossy(&body);

    let media_id = scrape_media_id(&body).ok_or_else(|| {
        debug!(body = %body, "metadata page without media id");
        FetchError::Parse {
            url: metadata_url.to_string(),
        }
    })?;

    canonical_url(archive_base, media_id)
}

/// Resolves any supported input url to a directly fetchable media url and
/// probes its length. Nothing is retried.
pub async fn resolve(
    client: &DownloadClient,
    input: &str,
    archive_base: &Url,
) -> Result<MediaResource, FetchError> {
    let shape = InputShape::detect(input)?;

    let uri = match shape {
        InputShape::Direct(url) => url,
        InputShape::PlayerPage { page, clip_id, view_id } => {
            let metadata_url = asx_url(&page, &clip_id, view_id.as_deref());
            find_media_url(client, &metadata_url, archive_base).await?
        }
    };

    info!(%uri, "probing media");
    let headers = client.head(&uri).await?;
    let length = media_length(&uri, &headers)?;
    info!(%uri, length, "resolved media");

    Ok(MediaResource { uri, length })
}
