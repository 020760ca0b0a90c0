use std::path::{Path, PathBuf};

use clap::{Parser, ValueHint};

use crate::model::UrlMatching;

/// Download YouTube videos and playlists into a local folder.
#[derive(Debug, Clone, Parser)]
#[command(name = "playlist-downloader", version, about)]
pub struct AppConfig {
    /// Path to the yt-dlp executable.
    ///
    /// If not provided, a bundled copy is used when present, otherwise yt-dlp
    /// is searched for in $PATH
    #[arg(long, env = "PLAYLIST_DOWNLOADER_YT_DLP", value_hint = ValueHint::FilePath)]
    pub yt_dlp_path: Option<PathBuf>,

    /// Folder preselected as the download destination
    #[arg(
        long,
        env = "PLAYLIST_DOWNLOADER_OUTPUT_DIR",
        value_hint = ValueHint::DirPath,
        value_parser = parse_directory
    )]
    pub output_dir: Option<PathBuf>,

    /// How a URL is recognised as a playlist
    #[arg(long, value_enum, default_value_t = UrlMatching::Query)]
    pub url_matching: UrlMatching,
}

fn parse_directory(s: &str) -> Result<PathBuf, String> {
    let path = Path::new(s);

    if !path.exists() {
        return Err("Directory does not exist".to_string());
    }
    if !path.is_dir() {
        return Err("Path is not a directory".to_string());
    }

    path.canonicalize()
        .map_err(|e| format!("Failed to canonicalize path: {e}"))
}
