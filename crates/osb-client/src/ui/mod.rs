//! UI stream pipeline: format selection, URL construction, and the
//! streaming tasks that turn the infinite response body into listener
//! callbacks.
//!
//! The server emits either a video container (`mp2t;h264`, `mp4;h264`,
//! `webm;vp8`, `webm;vp9`, `mpd`) or a tiled image stream (`jpeg`, `png`,
//! optionally with a separate alpha-plane format as in `jpeg;png`). Image
//! formats split client-side because the server expects the alpha format in
//! its own query parameter. The built-in pull pipeline demuxes `mp2t` video
//! and all image formats; the other video containers are for clients that
//! fetch the UI URL with their own player (see
//! [`SessionContext::ui_url`](crate::SessionContext::ui_url)).

mod annexb;
mod image;
mod ts;
mod video;

use std::sync::Arc;

use futures::StreamExt;
use reqwest::Response;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::errors::ClientError;
use crate::listener::SessionListener;

/// MPEG-TS with H.264 video.
pub const UI_FMT_TS_H264: &str = "mp2t;h264";
/// Fragmented MP4 with H.264 video.
pub const UI_FMT_MP4_H264: &str = "mp4;h264";
/// WebM with VP8 video.
pub const UI_FMT_WEBM_VP8: &str = "webm;vp8";
/// WebM with VP9 video.
pub const UI_FMT_WEBM_VP9: &str = "webm;vp9";
/// DASH manifest.
pub const UI_FMT_MPD: &str = "mpd";
/// JPEG tiles, no alpha plane.
pub const UI_FMT_JPEG: &str = "jpeg";
/// PNG tiles, no alpha plane.
pub const UI_FMT_PNG: &str = "png";
/// JPEG tiles with JPEG alpha plane.
pub const UI_FMT_JPEG_ALPHA_JPEG: &str = "jpeg;jpeg";
/// JPEG tiles with PNG alpha plane.
pub const UI_FMT_JPEG_ALPHA_PNG: &str = "jpeg;png";
/// JPEG tiles with 8-bit PNG alpha plane.
pub const UI_FMT_JPEG_ALPHA_PNG8: &str = "jpeg;png8";
/// JPEG tiles with 32-bit PNG alpha plane.
pub const UI_FMT_JPEG_ALPHA_PNG32: &str = "jpeg;png32";

const VIDEO_CONTAINERS: [&str; 4] = ["mp2t", "mp4", "webm", "mpd"];
const IMAGE_FORMATS: [&str; 2] = ["jpeg", "png"];

/// Parsed UI stream format token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum UiFormat {
    /// Container (+codec) passed whole as the `fmt` query parameter.
    Video { token: String, container: String },
    /// Image format with optional alpha-plane format.
    Image { main: String, alpha: Option<String> },
}

impl UiFormat {
    pub fn parse(format: &str) -> Result<Self, ClientError> {
        let (first, rest) = match format.split_once(';') {
            Some((first, rest)) => (first, Some(rest)),
            None => (format, None),
        };

        if VIDEO_CONTAINERS.contains(&first) {
            return Ok(Self::Video {
                token: format.to_owned(),
                container: first.to_owned(),
            });
        }
        if IMAGE_FORMATS.contains(&first) {
            return Ok(Self::Image {
                main: first.to_owned(),
                alpha: rest.map(str::to_owned),
            });
        }
        Err(ClientError::UnsupportedFormat {
            format: format.to_owned(),
        })
    }

    /// Whether the built-in pipeline can consume this format in pull mode.
    pub fn is_pullable(&self) -> bool {
        match self {
            Self::Image { .. } => true,
            Self::Video { container, .. } => container == "mp2t",
        }
    }
}

/// Build the `/osb/session/ui` URL for a format token.
pub(crate) fn ui_url(
    base: &Url,
    session_id: &str,
    format: &str,
    ts_discon: bool,
    bitrate_kbps: Option<u32>,
) -> Result<Url, ClientError> {
    let parsed = UiFormat::parse(format)?;
    let mut url = base.join("osb/session/ui")?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("session_id", session_id);
        match &parsed {
            UiFormat::Video { token, .. } => {
                query.append_pair("fmt", token);
            }
            UiFormat::Image { main, alpha } => {
                query.append_pair("fmt", main);
                if let Some(alpha) = alpha {
                    query.append_pair("alpha", alpha);
                }
            }
        }
        query.append_pair("ts_discon", if ts_discon { "1" } else { "0" });
        if let Some(bitrate) = bitrate_kbps {
            query.append_pair("bitrate", &bitrate.to_string());
        }
    }
    Ok(url)
}

/// Consume the open UI stream response until end-of-stream or cancellation.
pub(crate) async fn run_ui_stream(
    resp: Response,
    format: UiFormat,
    session_id: String,
    listener: Arc<dyn SessionListener>,
    cancel: CancellationToken,
) -> Result<(), ClientError> {
    // Reads on a connection we closed during shutdown surface as transport
    // errors; remap them to the canonical interruption.
    let map_cancel = cancel.clone();
    let stream = resp
        .bytes_stream()
        .map(move |item| {
            item.map_err(|err| {
                if map_cancel.is_cancelled() {
                    ClientError::Interrupted
                } else {
                    ClientError::Transport(err)
                }
            })
        })
        .boxed();

    match format {
        UiFormat::Image { .. } => {
            image::run_image_stream(stream, &session_id, listener, cancel).await
        }
        UiFormat::Video { container, token } => {
            if container != "mp2t" {
                return Err(ClientError::UnsupportedFormat { format: token });
            }
            video::run_video_stream(stream, &session_id, listener, cancel).await
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn query_map(url: &Url) -> HashMap<String, String> {
        url.query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    // ── format parsing ──────────────────────────────────────────────

    #[test]
    fn video_tokens_parse_whole() {
        for token in [UI_FMT_TS_H264, UI_FMT_MP4_H264, UI_FMT_WEBM_VP8, UI_FMT_WEBM_VP9] {
            match UiFormat::parse(token).unwrap() {
                UiFormat::Video { token: t, .. } => assert_eq!(t, token),
                other => panic!("expected video for {token}, got {other:?}"),
            }
        }
    }

    #[test]
    fn image_tokens_split_alpha() {
        assert_eq!(
            UiFormat::parse(UI_FMT_JPEG_ALPHA_PNG).unwrap(),
            UiFormat::Image {
                main: "jpeg".into(),
                alpha: Some("png".into())
            }
        );
        assert_eq!(
            UiFormat::parse(UI_FMT_JPEG).unwrap(),
            UiFormat::Image {
                main: "jpeg".into(),
                alpha: None
            }
        );
    }

    #[test]
    fn unknown_format_is_rejected() {
        let err = UiFormat::parse("gif").unwrap_err();
        assert!(matches!(err, ClientError::UnsupportedFormat { .. }));
    }

    #[test]
    fn only_mp2t_and_images_are_pullable() {
        assert!(UiFormat::parse(UI_FMT_TS_H264).unwrap().is_pullable());
        assert!(UiFormat::parse(UI_FMT_JPEG_ALPHA_PNG32).unwrap().is_pullable());
        assert!(!UiFormat::parse(UI_FMT_WEBM_VP9).unwrap().is_pullable());
        assert!(!UiFormat::parse(UI_FMT_MPD).unwrap().is_pullable());
    }

    // ── URL construction ────────────────────────────────────────────

    #[test]
    fn image_url_carries_alpha_parameter() {
        let base = Url::parse("https://osb.example.com/").unwrap();
        let url = ui_url(&base, "s1", UI_FMT_JPEG_ALPHA_PNG, false, Some(1000)).unwrap();
        assert_eq!(url.path(), "/osb/session/ui");
        let q = query_map(&url);
        assert_eq!(q["session_id"], "s1");
        assert_eq!(q["fmt"], "jpeg");
        assert_eq!(q["alpha"], "png");
        assert_eq!(q["ts_discon"], "0");
        assert_eq!(q["bitrate"], "1000");
    }

    #[test]
    fn video_url_keeps_whole_token() {
        let base = Url::parse("https://osb.example.com/").unwrap();
        let url = ui_url(&base, "s1", UI_FMT_TS_H264, true, None).unwrap();
        let q = query_map(&url);
        assert_eq!(q["fmt"], "mp2t;h264");
        assert_eq!(q["ts_discon"], "1");
        assert!(!q.contains_key("alpha"));
        assert!(!q.contains_key("bitrate"));
    }

    #[test]
    fn plain_image_url_has_no_alpha() {
        let base = Url::parse("https://osb.example.com/").unwrap();
        let url = ui_url(&base, "s9", UI_FMT_PNG, false, None).unwrap();
        let q = query_map(&url);
        assert_eq!(q["fmt"], "png");
        assert!(!q.contains_key("alpha"));
    }
}
