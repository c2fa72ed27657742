//! `tracing` subscriber setup.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Build the filter directive for a configured base filter and CLI
/// verbosity. Negative verbosity is quiet mode.
pub fn filter_directive(base: &str, verbosity: i8) -> String {
    let crate_level = match verbosity {
        i8::MIN..=-1 => Some("warn"),
        0 => None,
        1 => Some("debug"),
        _ => Some("trace"),
    };
    match crate_level {
        None => base.to_string(),
        Some(level) if base.trim().is_empty() => format!("voxrelay={}", level),
        Some(level) => format!("{},voxrelay={}", base, level),
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `filter`.
///
/// Calling this twice is harmless; the second call leaves the first
/// subscriber in place.
pub fn init(filter: &str, verbosity: i8) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(filter, verbosity)));

    let result = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_verbosity_keeps_configured_filter() {
        assert_eq!(filter_directive("voxrelay=info", 0), "voxrelay=info");
    }

    #[test]
    fn verbose_raises_crate_level() {
        assert_eq!(
            filter_directive("voxrelay=info", 1),
            "voxrelay=info,voxrelay=debug"
        );
        assert_eq!(
            filter_directive("voxrelay=info", 3),
            "voxrelay=info,voxrelay=trace"
        );
    }

    #[test]
    fn quiet_lowers_crate_level() {
        assert_eq!(filter_directive("", -1), "voxrelay=warn");
    }

    #[test]
    fn directive_parses_as_env_filter() {
        for verbosity in [-1, 0, 1, 2] {
            let directive = filter_directive("voxrelay=info,tower_http=warn", verbosity);
            assert!(EnvFilter::try_new(&directive).is_ok(), "{}", directive);
        }
    }

    #[test]
    fn init_twice_does_not_panic() {
        init("voxrelay=info", 0);
        init("voxrelay=debug", 1);
    }
}
