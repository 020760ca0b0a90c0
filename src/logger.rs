use std::env;

use tracing::Level;
use tracing_subscriber::{EnvFilter, filter::Directive, fmt, prelude::*};

pub const LOG_LEVEL_ENV: &str = "PLAYLIST_DOWNLOADER_LOG_LEVEL";

const COMPONENT_LEVELS: &[(&str, Level)] = &[("playlist_downloader", Level::INFO)];

/// Installs the global subscriber: WARN by default, INFO for this crate, plus
/// any comma-separated directives from `PLAYLIST_DOWNLOADER_LOG_LEVEL`.
pub fn init() -> Result<(), tracing_subscriber::util::TryInitError> {
    let extra = env::var(LOG_LEVEL_ENV).unwrap_or_default();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter(&extra))
        .try_init()
}

fn filter(extra: &str) -> EnvFilter {
    let defaults = COMPONENT_LEVELS
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",");

    let mut filter = EnvFilter::builder()
        .with_default_directive(Level::WARN.into())
        .parse_lossy(defaults);

    for d in parse_directives(extra) {
        filter = filter.add_directive(d);
    }
    filter
}

fn parse_directives(spec: &str) -> Vec<Directive> {
    spec.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse() {
            Ok(d) => Some(d),
            Err(e) => {
                eprintln!("Failed to parse log level directive {s:?}: {e:?}");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_invalid_directives() {
        let directives = parse_directives("playlist_downloader=trace, ,tokio=loud,warn");

        assert_eq!(directives.len(), 2);
    }

    #[test]
    fn default_filter_mentions_crate() {
        let filter = filter("");

        assert!(filter.to_string().to_lowercase().contains("playlist_downloader=info"));
    }
}
