use std::path::PathBuf;

/// Side-channel updates sent while a download runs
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadEvent {
    /// Playlist metadata resolved
    PlaylistResolved { title: Option<String>, count: usize },
    /// A video is about to be fetched; `position` is `(index, count)` within the playlist
    VideoStarted {
        title: String,
        position: (usize, usize),
    },
    /// Bytes written so far for the current video
    Progress { downloaded: u64, total: Option<u64> },
    /// A video was fully written
    VideoFinished { path: PathBuf },
}

/// Fraction in `0.0..=1.0`, or `None` when the size is unknown
pub fn fraction(downloaded: u64, total: Option<u64>) -> Option<f32> {
    match total {
        Some(0) | None => None,
        Some(total) => Some((downloaded as f64 / total as f64).min(1.0) as f32),
    }
}
