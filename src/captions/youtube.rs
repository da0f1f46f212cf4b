use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::LazyLock;
use std::time::Duration;
use url::Url;

use super::{CaptionTrack, CaptionsError, CaptionsProvider, RawCaption};
use crate::resolver::VideoId;

const WATCH_URL: &str = "https://www.youtube.com/watch?v=";
const INNERTUBE_PLAYER_URL: &str = "https://www.youtube.com/youtubei/v1/player";
const INNERTUBE_CLIENT_NAME: &str = "ANDROID";
const INNERTUBE_CLIENT_VERSION: &str = "20.10.38";

static API_KEY: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r#""INNERTUBE_API_KEY":\s*"([a-zA-Z0-9_-]+)""#).expect("static regex")
});

/// Captions provider backed by YouTube's watch page and Innertube player API
pub struct YoutubeCaptionsClient {
    client: reqwest::Client,
}

/// Subset of the Innertube player response we read
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerResponse {
    #[serde(default)]
    playability_status: Option<PlayabilityStatus>,
    #[serde(default)]
    captions: Option<Captions>,
}

#[derive(Debug, Deserialize)]
struct PlayabilityStatus {
    status: String,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Captions {
    #[serde(default)]
    player_captions_tracklist_renderer: Option<TracklistRenderer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TracklistRenderer {
    #[serde(default)]
    caption_tracks: Vec<InnertubeTrack>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InnertubeTrack {
    base_url: String,
    language_code: String,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    name: Option<TrackName>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrackName {
    #[serde(default)]
    simple_text: Option<String>,
    #[serde(default)]
    runs: Vec<TextRun>,
}

#[derive(Debug, Deserialize)]
struct TextRun {
    text: String,
}

/// `fmt=json3` timed text document
#[derive(Debug, Deserialize)]
struct Json3 {
    #[serde(default)]
    events: Vec<Json3Event>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Json3Event {
    #[serde(default)]
    t_start_ms: f64,
    #[serde(default)]
    d_duration_ms: f64,
    #[serde(default)]
    segs: Option<Vec<Json3Seg>>,
}

#[derive(Debug, Deserialize)]
struct Json3Seg {
    #[serde(default)]
    utf8: String,
}

impl YoutubeCaptionsClient {
    pub fn new(timeout: Duration) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build captions HTTP client")?;

        Ok(Self { client })
    }

    async fn fetch_watch_page(&self, id: &VideoId) -> Result<String, CaptionsError> {
        let url = format!("{}{}", WATCH_URL, urlencoding::encode(id.as_str()));

        let response = self
            .client
            .get(&url)
            .header("Accept-Language", "en-US")
            .header("Cookie", "CONSENT=YES+cb")
            .send()
            .await
            .map_err(|e| CaptionsError::RetrievalFailed(format!("watch page request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(CaptionsError::RetrievalFailed(format!(
                "watch page returned HTTP {}",
                response.status()
            )));
        }

        response
            .text()
            .await
            .map_err(|e| CaptionsError::RetrievalFailed(format!("watch page read failed: {}", e)))
    }

    async fn fetch_player_response(
        &self,
        id: &VideoId,
        api_key: &str,
    ) -> Result<PlayerResponse, CaptionsError> {
        let body = json!({
            "context": {
                "client": {
                    "clientName": INNERTUBE_CLIENT_NAME,
                    "clientVersion": INNERTUBE_CLIENT_VERSION,
                }
            },
            "videoId": id.as_str(),
        });

        let response = self
            .client
            .post(INNERTUBE_PLAYER_URL)
            .query(&[("key", api_key)])
            .header("Accept-Language", "en-US")
            .json(&body)
            .send()
            .await
            .map_err(|e| CaptionsError::RetrievalFailed(format!("player request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(CaptionsError::RetrievalFailed(format!(
                "player endpoint returned HTTP {}",
                response.status()
            )));
        }

        response
            .json::<PlayerResponse>()
            .await
            .map_err(|e| CaptionsError::RetrievalFailed(format!("player response unparsable: {}", e)))
    }
}

#[async_trait]
impl CaptionsProvider for YoutubeCaptionsClient {
    async fn list_tracks(&self, id: &VideoId) -> Result<Vec<CaptionTrack>, CaptionsError> {
        tracing::debug!("Listing caption tracks for {}", id);

        let html = self.fetch_watch_page(id).await?;
        let api_key = extract_api_key(&html)?;
        let player = self.fetch_player_response(id, &api_key).await?;

        tracks_from_player_response(player)
    }

    async fn fetch_track(&self, track: &CaptionTrack) -> crate::Result<Vec<RawCaption>> {
        let url = json3_url(&track.base_url)?;

        let response = self
            .client
            .get(url)
            .header("Accept-Language", "en-US")
            .send()
            .await
            .context("Failed to request caption track")?;

        if !response.status().is_success() {
            anyhow::bail!("Caption track returned HTTP {}", response.status());
        }

        let body = response.text().await.context("Failed to read caption track")?;
        parse_json3(&body)
    }
}

fn extract_api_key(html: &str) -> Result<String, CaptionsError> {
    if html.contains("class=\"g-recaptcha\"") {
        return Err(CaptionsError::RetrievalFailed(
            "provider is rate limiting requests (captcha)".to_string(),
        ));
    }

    API_KEY
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| CaptionsError::RetrievalFailed("watch page has no Innertube API key".to_string()))
}

/// Classify a player response into caption tracks or a captions failure
pub fn tracks_from_player_response(player: PlayerResponse) -> Result<Vec<CaptionTrack>, CaptionsError> {
    if let Some(status) = &player.playability_status {
        if status.status != "OK" {
            let reason = status.reason.clone().unwrap_or_else(|| status.status.clone());
            if status.status == "LOGIN_REQUIRED" && reason.contains("not a bot") {
                return Err(CaptionsError::RetrievalFailed(format!("request blocked: {}", reason)));
            }
            return Err(CaptionsError::Unavailable(reason));
        }
    }

    let tracks = player
        .captions
        .and_then(|captions| captions.player_captions_tracklist_renderer)
        .map(|renderer| renderer.caption_tracks)
        .unwrap_or_default();

    if tracks.is_empty() {
        return Err(CaptionsError::Disabled);
    }

    Ok(tracks
        .into_iter()
        .map(|track| {
            let name = track
                .name
                .map(|name| {
                    name.simple_text.unwrap_or_else(|| {
                        name.runs.into_iter().map(|run| run.text).collect::<String>()
                    })
                })
                .unwrap_or_else(|| track.language_code.clone());

            CaptionTrack {
                generated: track.kind.as_deref() == Some("asr"),
                language_code: track.language_code,
                name,
                base_url: track.base_url,
            }
        })
        .collect())
}

/// Rewrite a track URL so the provider answers with the `json3` format
fn json3_url(base_url: &str) -> crate::Result<Url> {
    if base_url.contains("&exp=xpe") {
        anyhow::bail!("Caption track requires a proof-of-origin token");
    }

    let mut url = Url::parse(base_url).context("Invalid caption track URL")?;
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != "fmt")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    url.query_pairs_mut()
        .clear()
        .extend_pairs(pairs)
        .append_pair("fmt", "json3");

    Ok(url)
}

fn parse_json3(body: &str) -> crate::Result<Vec<RawCaption>> {
    let document: Json3 = serde_json::from_str(body).context("Failed to parse caption track")?;

    Ok(document
        .events
        .into_iter()
        .filter_map(|event| {
            let segs = event.segs?;
            Some(RawCaption {
                start: event.t_start_ms / 1000.0,
                duration: event.d_duration_ms / 1000.0,
                text: segs.into_iter().map(|seg| seg.utf8).collect(),
            })
        })
        .collect())
}
