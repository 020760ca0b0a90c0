use std::{fmt, path::PathBuf};

use clap::ValueEnum;
use url::Url;

/// Base of the canonical watch URL rebuilt for playlist members
pub const WATCH_URL: &str = "https://www.youtube.com/watch?v=";

/// Strategy used to tell playlist URLs from single-video URLs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum UrlMatching {
    /// Inspect the `v` / `list` query parameters and the `/playlist` path
    #[default]
    Query,
    /// Any URL containing "playlist" is a playlist
    Substring,
}

/// What a URL points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Video,
    Playlist,
}

/// A URL entered by the user, already classified
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRequest {
    /// Trimmed URL as typed
    pub url: String,
    /// Video or playlist
    pub kind: RequestKind,
}

impl VideoRequest {
    pub fn classify(url: &str, matching: UrlMatching) -> Self {
        let url = url.trim().to_string();
        let kind = match matching {
            UrlMatching::Query => kind_from_query(&url),
            UrlMatching::Substring if url.contains("playlist") => RequestKind::Playlist,
            UrlMatching::Substring => RequestKind::Video,
        };

        Self { url, kind }
    }
}

fn kind_from_query(url: &str) -> RequestKind {
    let Ok(parsed) = Url::parse(url) else {
        return RequestKind::Video;
    };

    // Short links carry the video id in the path.
    let mut has_video = parsed.host_str() == Some("youtu.be")
        && parsed
            .path_segments()
            .and_then(|mut segments| segments.next())
            .is_some_and(|id| !id.is_empty());
    let mut has_list = false;
    for (key, value) in parsed.query_pairs() {
        match key.as_ref() {
            "v" if !value.is_empty() => has_video = true,
            "list" if !value.is_empty() => has_list = true,
            _ => {}
        }
    }

    // A watch URL inside a playlist still names one video.
    if has_video {
        return RequestKind::Video;
    }

    if has_list || parsed.path().trim_end_matches('/').ends_with("/playlist") {
        RequestKind::Playlist
    } else {
        RequestKind::Video
    }
}

/// One encoding/quality variant offered for a video
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFormat {
    /// Collaborator-specific format identifier
    pub id: String,
    /// Format carries an audio channel
    pub has_audio: bool,
    /// Format carries a video channel
    pub has_video: bool,
    /// Container extension, when reported
    pub extension: Option<String>,
    /// Size in bytes, exact or approximate
    pub size: Option<u64>,
}

/// Resolved metadata of a single video
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoMetadata {
    /// Stable video identifier
    pub id: String,
    /// Display title
    pub title: String,
    /// URL the metadata was resolved from
    pub url: String,
    /// Formats in the order the collaborator returned them
    pub formats: Vec<VideoFormat>,
}

/// An entry of a playlist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistMember {
    pub id: String,
    pub title: String,
}

impl PlaylistMember {
    #[must_use]
    pub fn watch_url(&self) -> String {
        format!("{WATCH_URL}{}", self.id)
    }
}

/// Resolved playlist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playlist {
    pub id: String,
    pub title: Option<String>,
    /// Members in collaborator order
    pub members: Vec<PlaylistMember>,
}

/// What a finished download produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Path of the written file
    Video(PathBuf),
    /// Number of playlist members written
    Playlist { count: usize },
}

/// Text shown in the status label
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Status {
    #[default]
    Idle,
    FolderSelected(PathBuf),
    NoFolder,
    Downloading,
    DownloadingVideo {
        title: String,
        /// `(index, count)` within the playlist
        position: (usize, usize),
    },
    Complete(PathBuf),
    Failed,
    PlaylistComplete,
    PlaylistFailed,
    Cancelled,
}

impl Status {
    /// Terminal status for a finished task of the given kind
    #[must_use]
    pub fn finished(kind: RequestKind, outcome: Option<&DownloadOutcome>) -> Self {
        match (kind, outcome) {
            (_, Some(DownloadOutcome::Video(path))) => Self::Complete(path.clone()),
            (_, Some(DownloadOutcome::Playlist { .. })) => Self::PlaylistComplete,
            (RequestKind::Video, None) => Self::Failed,
            (RequestKind::Playlist, None) => Self::PlaylistFailed,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => Ok(()),
            Self::FolderSelected(path) => write!(f, "Download folder: {}", path.display()),
            Self::NoFolder => f.write_str("No folder selected"),
            Self::Downloading => f.write_str("Downloading..."),
            Self::DownloadingVideo {
                title,
                position: (index, total),
            } => write!(f, "Downloading video ({index}/{total}): {title}"),
            Self::Complete(path) => write!(f, "Download complete: {}", path.display()),
            Self::Failed => f.write_str("Download failed!"),
            Self::PlaylistComplete => f.write_str("Playlist download complete!"),
            Self::PlaylistFailed => f.write_str("Playlist download failed!"),
            Self::Cancelled => f.write_str("Download cancelled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(url: &str, matching: UrlMatching) -> RequestKind {
        VideoRequest::classify(url, matching).kind
    }

    #[test]
    fn query_matching_reads_parameters() {
        let q = UrlMatching::Query;
        assert_eq!(kind("https://www.youtube.com/watch?v=dQw4w9WgXcQ", q), RequestKind::Video);
        assert_eq!(
            kind("https://www.youtube.com/playlist?list=PLabc123", q),
            RequestKind::Playlist
        );
        assert_eq!(kind("https://www.youtube.com/playlist", q), RequestKind::Playlist);
        assert_eq!(kind("https://youtu.be/dQw4w9WgXcQ", q), RequestKind::Video);
    }

    #[test]
    fn query_matching_prefers_the_video_in_a_playlist_watch_url() {
        let q = UrlMatching::Query;
        assert_eq!(
            kind("https://www.youtube.com/watch?v=abc&list=PLabc123", q),
            RequestKind::Video
        );
        assert_eq!(kind("https://x/watch?v=abc&playlist=1", q), RequestKind::Video);
        assert_eq!(
            kind("https://youtu.be/dQw4w9WgXcQ?list=PLabc123", q),
            RequestKind::Video
        );
        assert_eq!(kind("https://youtu.be/?list=PLabc123", q), RequestKind::Playlist);
    }

    #[test]
    fn query_matching_ignores_the_word_playlist_in_text() {
        assert_eq!(
            kind("https://www.youtube.com/watch?v=abc&t=playlist", UrlMatching::Query),
            RequestKind::Video
        );
        assert_eq!(kind("not a url with playlist", UrlMatching::Query), RequestKind::Video);
    }

    #[test]
    fn substring_matching_routes_any_playlist_mention() {
        let s = UrlMatching::Substring;
        assert_eq!(kind("https://x/watch?v=abc&playlist=1", s), RequestKind::Playlist);
        assert_eq!(kind("https://www.youtube.com/watch?v=abc&list=PL1", s), RequestKind::Video);
    }

    #[test]
    fn classify_trims_input() {
        let req = VideoRequest::classify("  https://youtu.be/abc \n", UrlMatching::Query);
        assert_eq!(req.url, "https://youtu.be/abc");
    }

    #[test]
    fn member_watch_url() {
        let member = PlaylistMember {
            id: "abc123".to_string(),
            title: "t".to_string(),
        };
        assert_eq!(member.watch_url(), "https://www.youtube.com/watch?v=abc123");
    }

    #[test]
    fn status_texts() {
        assert_eq!(Status::Idle.to_string(), "");
        assert_eq!(Status::Downloading.to_string(), "Downloading...");
        assert_eq!(Status::NoFolder.to_string(), "No folder selected");
        assert_eq!(
            Status::Complete(PathBuf::from("out/a.mp4")).to_string(),
            format!("Download complete: {}", PathBuf::from("out/a.mp4").display())
        );
        assert_eq!(
            Status::DownloadingVideo {
                title: "Intro".to_string(),
                position: (2, 5),
            }
            .to_string(),
            "Downloading video (2/5): Intro"
        );
        assert_eq!(Status::PlaylistFailed.to_string(), "Playlist download failed!");
    }

    #[test]
    fn finished_status_depends_on_kind() {
        assert_eq!(Status::finished(RequestKind::Video, None), Status::Failed);
        assert_eq!(Status::finished(RequestKind::Playlist, None), Status::PlaylistFailed);
        assert_eq!(
            Status::finished(
                RequestKind::Playlist,
                Some(&DownloadOutcome::Playlist { count: 3 })
            ),
            Status::PlaylistComplete
        );
    }
}
