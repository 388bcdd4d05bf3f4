use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use gifspin_core::dispatch::DEFAULT_CAPACITY;
use gifspin_core::options::{self, CompositeLimits};

/// Server configuration loaded from environment variables.
///
/// Every field has a default suitable for the container image; the
/// binary reads it once at startup and it is immutable afterwards.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bounds on uploads and composite options.
    pub limits: CompositeLimits,
    /// Directory holding uploads and compositing results.
    pub temp_dir: PathBuf,
    /// Directory of static files served for unmatched routes.
    pub public_dir: PathBuf,
    /// The external compositing executable.
    pub binary_path: PathBuf,
    /// Number of compositing processes allowed at once.
    pub dispatch_size: usize,
    /// Grace period for in-flight requests after a termination signal.
    pub shutdown_timeout: Duration,
    /// Deadline applied to every `/api` request.
    pub request_timeout: Duration,
    /// Listen address.
    pub listen_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            limits: CompositeLimits::default(),
            temp_dir: PathBuf::from("/data"),
            public_dir: PathBuf::from("/app/public"),
            binary_path: PathBuf::from("/app/bin/gifspin-core"),
            dispatch_size: DEFAULT_CAPACITY,
            shutdown_timeout: Duration::from_millis(20_000),
            request_timeout: Duration::from_millis(15_000),
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                 |
    /// |-------------------------|-------------------------|
    /// | `LIMIT_MAX_SIZE`        | `5242880`               |
    /// | `LIMIT_MAX_WIDTH`       | `1024`                  |
    /// | `LIMIT_MAX_HEIGHT`      | `1024`                  |
    /// | `LIMIT_MIN_FRAME_COUNT` | `2`                     |
    /// | `LIMIT_MAX_FRAME_COUNT` | `120`                   |
    /// | `LIMIT_MIN_FRAME_DELAY` | `5`                     |
    /// | `LIMIT_MAX_FRAME_DELAY` | `1000`                  |
    /// | `PATH_TEMP`             | `/data`                 |
    /// | `PATH_PUBLIC`           | `/app/public`           |
    /// | `PATH_BINARY`           | `/app/bin/gifspin-core` |
    /// | `OPT_DISPATCH_SIZE`     | `4`                     |
    /// | `OPT_SHUTDOWN_MS`       | `20000`                 |
    /// | `OPT_TIMEOUT_MS`        | `15000`                 |
    /// | `LISTEN`                | `0.0.0.0:3000`          |
    ///
    /// Values that fail to parse fall back to their default with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let env = Env(&lookup);

        let limits = CompositeLimits {
            size_max: env.parse("LIMIT_MAX_SIZE", options::DEFAULT_SIZE_MAX),
            width_max: env.parse("LIMIT_MAX_WIDTH", options::DEFAULT_WIDTH_MAX),
            height_max: env.parse("LIMIT_MAX_HEIGHT", options::DEFAULT_HEIGHT_MAX),
            frame_count_min: env.parse("LIMIT_MIN_FRAME_COUNT", options::DEFAULT_FRAME_COUNT_MIN),
            frame_count_max: env.parse("LIMIT_MAX_FRAME_COUNT", options::DEFAULT_FRAME_COUNT_MAX),
            frame_delay_min: env.parse("LIMIT_MIN_FRAME_DELAY", options::DEFAULT_FRAME_DELAY_MIN),
            frame_delay_max: env.parse("LIMIT_MAX_FRAME_DELAY", options::DEFAULT_FRAME_DELAY_MAX),
        };

        let dispatch_size: usize = env.parse("OPT_DISPATCH_SIZE", defaults.dispatch_size);
        if dispatch_size == 0 {
            tracing::warn!("OPT_DISPATCH_SIZE is 0, using a single dispatch slot");
        }

        let shutdown_ms = env.parse("OPT_SHUTDOWN_MS", millis(defaults.shutdown_timeout));
        let timeout_ms = env.parse("OPT_TIMEOUT_MS", millis(defaults.request_timeout));

        let listen_addr = match env.get("LISTEN") {
            Some(raw) => parse_listen_addr(&raw).unwrap_or_else(|| {
                tracing::warn!(value = %raw, "Invalid LISTEN address, using default");
                defaults.listen_addr
            }),
            None => defaults.listen_addr,
        };

        Self {
            limits,
            temp_dir: env.get("PATH_TEMP").map_or(defaults.temp_dir, PathBuf::from),
            public_dir: env.get("PATH_PUBLIC").map_or(defaults.public_dir, PathBuf::from),
            binary_path: env.get("PATH_BINARY").map_or(defaults.binary_path, PathBuf::from),
            dispatch_size: dispatch_size.max(1),
            shutdown_timeout: Duration::from_millis(shutdown_ms),
            request_timeout: Duration::from_millis(timeout_ms),
            listen_addr,
        }
    }
}

/// Accepts `host:port` or a bare `:port` (all interfaces).
pub fn parse_listen_addr(raw: &str) -> Option<SocketAddr> {
    let raw = raw.trim();
    match raw.strip_prefix(':') {
        Some(port) => port
            .parse::<u16>()
            .ok()
            .map(|port| SocketAddr::from(([0, 0, 0, 0], port))),
        None => raw.parse().ok(),
    }
}

fn millis(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

/// Typed access to a key lookup; empty values count as unset.
struct Env<'a, F>(&'a F);

impl<F> Env<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    fn parse<T>(&self, key: &str, default: T) -> T
    where
        T: FromStr + std::fmt::Display,
    {
        let Some(raw) = self.get(key) else {
            return default;
        };
        raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, default = %default, "Unparseable setting, using default");
            default
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> ServerConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = config_from(&[]);
        assert_eq!(config.limits, CompositeLimits::default());
        assert_eq!(config.temp_dir, PathBuf::from("/data"));
        assert_eq!(config.dispatch_size, 4);
        assert_eq!(config.request_timeout, Duration::from_secs(15));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(20));
        assert_eq!(config.listen_addr.port(), 3000);
    }

    #[test]
    fn reads_overrides() {
        let config = config_from(&[
            ("LIMIT_MAX_WIDTH", "512"),
            ("LIMIT_MIN_FRAME_COUNT", "3"),
            ("PATH_TEMP", "/tmp/spin"),
            ("PATH_BINARY", "/usr/local/bin/spin"),
            ("OPT_DISPATCH_SIZE", "8"),
            ("OPT_TIMEOUT_MS", "2500"),
            ("LISTEN", "127.0.0.1:8080"),
        ]);
        assert_eq!(config.limits.width_max, 512);
        assert_eq!(config.limits.frame_count_min, 3);
        assert_eq!(config.temp_dir, PathBuf::from("/tmp/spin"));
        assert_eq!(config.binary_path, PathBuf::from("/usr/local/bin/spin"));
        assert_eq!(config.dispatch_size, 8);
        assert_eq!(config.request_timeout, Duration::from_millis(2500));
        assert_eq!(config.listen_addr, "127.0.0.1:8080".parse().unwrap());
    }

    #[test]
    fn garbage_falls_back_to_default() {
        let config = config_from(&[
            ("LIMIT_MAX_SIZE", "lots"),
            ("OPT_SHUTDOWN_MS", "-5"),
            ("LISTEN", "nowhere"),
            ("PATH_PUBLIC", "  "),
        ]);
        assert_eq!(config.limits.size_max, options::DEFAULT_SIZE_MAX);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(20));
        assert_eq!(config.listen_addr.port(), 3000);
        assert_eq!(config.public_dir, PathBuf::from("/app/public"));
    }

    #[test]
    fn zero_dispatch_size_is_clamped() {
        assert_eq!(config_from(&[("OPT_DISPATCH_SIZE", "0")]).dispatch_size, 1);
    }

    #[test]
    fn bare_port_listens_everywhere() {
        assert_eq!(
            parse_listen_addr(":3000"),
            Some(SocketAddr::from(([0, 0, 0, 0], 3000)))
        );
        assert_eq!(parse_listen_addr(":http"), None);
    }
}
