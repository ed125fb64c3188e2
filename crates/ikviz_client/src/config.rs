//! Client settings: endpoint, scale profile, timeout and tagging.
//!
//! Each setting comes from its command-line flag, else its `IKVIZ_*`
//! environment variable (clap reads both), else the default below.
//!
//! Profile lookup order:
//! - `--profile-file PATH`
//! - `--profile NAME`
//! - `<config dir>/ikviz/profile.json` if it exists
//!   (Linux: ~/.config/ikviz/, MacOS: ~/Library/Application Support/ikviz/)
//! - `robot_mm`

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Args;
use ikviz::profile::{ProfileError, ScaleProfile};
use thiserror::Error;
use tracing::info;
use url::Url;

pub const DEFAULT_ENDPOINT: &str = "ws://localhost:8000/ws";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid endpoint '{endpoint}': {source}")]
    InvalidEndpoint {
        endpoint: String,
        source: url::ParseError,
    },
    #[error("endpoint must use ws:// or wss:// (got '{0}')")]
    UnsupportedScheme(String),
    #[error("request timeout must be at least 1 ms")]
    ZeroTimeout,
    #[error(transparent)]
    Profile(#[from] ProfileError),
}

#[derive(Debug, Clone, Default, Args)]
pub struct ClientArgs {
    /// Solver WebSocket endpoint.
    #[arg(long, env = "IKVIZ_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Built-in scale profile (robot_mm, unit_cube).
    #[arg(long, env = "IKVIZ_PROFILE")]
    pub profile: Option<String>,

    /// Load the scale profile from a JSON file.
    #[arg(long)]
    pub profile_file: Option<PathBuf>,

    /// Give up on a request after this many milliseconds.
    #[arg(long, env = "IKVIZ_REQUEST_TIMEOUT_MS")]
    pub request_timeout_ms: Option<u64>,

    /// Put a request id on the wire and drop replies to superseded requests.
    #[arg(long, env = "IKVIZ_TAG_REQUESTS")]
    pub tag_requests: bool,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: Url,
    pub profile: ScaleProfile,
    pub request_timeout: Option<Duration>,
    pub tag_requests: bool,
}

impl ClientConfig {
    pub fn from_args(args: &ClientArgs) -> Result<Self, ConfigError> {
        Self::resolve(args, default_profile_file().as_deref())
    }

    /// Like [`Self::from_args`], with the fallback profile file made explicit.
    pub fn resolve(args: &ClientArgs, fallback_file: Option<&Path>) -> Result<Self, ConfigError> {
        let endpoint = parse_endpoint(&args.endpoint)?;

        let profile = if let Some(path) = &args.profile_file {
            ScaleProfile::load(path)?
        } else if let Some(name) = &args.profile {
            ScaleProfile::builtin(name)?
        } else if let Some(path) = fallback_file.filter(|p| p.is_file()) {
            info!("Loading profile from {}", path.display());
            ScaleProfile::load(path)?
        } else {
            ScaleProfile::robot_mm()
        };

        let request_timeout = match args.request_timeout_ms {
            Some(0) => return Err(ConfigError::ZeroTimeout),
            Some(ms) => Some(Duration::from_millis(ms)),
            None => None,
        };

        Ok(Self {
            endpoint,
            profile,
            request_timeout,
            tag_requests: args.tag_requests,
        })
    }
}

pub fn parse_endpoint(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|source| ConfigError::InvalidEndpoint {
        endpoint: raw.to_string(),
        source,
    })?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        _ => Err(ConfigError::UnsupportedScheme(raw.to_string())),
    }
}

fn default_profile_file() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("ikviz").join("profile.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn args() -> ClientArgs {
        ClientArgs {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            ..Default::default()
        }
    }

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ikviz-config-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn defaults() {
        let cfg = ClientConfig::resolve(&args(), None).unwrap();
        assert_eq!(cfg.endpoint.as_str(), "ws://localhost:8000/ws");
        assert_eq!(cfg.profile, ScaleProfile::robot_mm());
        assert_eq!(cfg.request_timeout, None);
        assert!(!cfg.tag_requests);
    }

    #[test]
    fn endpoint_must_be_websocket() {
        assert!(matches!(
            parse_endpoint("http://localhost:8000/ws"),
            Err(ConfigError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            parse_endpoint("not a url"),
            Err(ConfigError::InvalidEndpoint { .. })
        ));
        assert!(parse_endpoint("wss://solver.example/ws").is_ok());
    }

    #[test]
    fn named_profile_and_timeout() {
        let a = ClientArgs {
            profile: Some("unit_cube".into()),
            request_timeout_ms: Some(1500),
            tag_requests: true,
            ..args()
        };
        let cfg = ClientConfig::resolve(&a, None).unwrap();
        assert_eq!(cfg.profile.name, "unit_cube");
        assert_eq!(cfg.request_timeout, Some(Duration::from_millis(1500)));
        assert!(cfg.tag_requests);
    }

    #[test]
    fn zero_timeout_rejected() {
        let a = ClientArgs {
            request_timeout_ms: Some(0),
            ..args()
        };
        assert!(matches!(
            ClientConfig::resolve(&a, None),
            Err(ConfigError::ZeroTimeout)
        ));
    }

    #[test]
    fn unknown_profile_rejected() {
        let a = ClientArgs {
            profile: Some("furlongs".into()),
            ..args()
        };
        assert!(matches!(
            ClientConfig::resolve(&a, None),
            Err(ConfigError::Profile(ProfileError::Unknown(_)))
        ));
    }

    #[test]
    fn fallback_file_used_only_without_explicit_profile() {
        let json = serde_json::to_string(&ScaleProfile::unit_cube()).unwrap();
        let path = temp_file("fallback.json", &json);

        let cfg = ClientConfig::resolve(&args(), Some(&path)).unwrap();
        assert_eq!(cfg.profile.name, "unit_cube");

        let a = ClientArgs {
            profile: Some("robot_mm".into()),
            ..args()
        };
        let cfg = ClientConfig::resolve(&a, Some(&path)).unwrap();
        assert_eq!(cfg.profile.name, "robot_mm");

        let missing = path.with_file_name("missing.json");
        let cfg = ClientConfig::resolve(&args(), Some(&missing)).unwrap();
        assert_eq!(cfg.profile.name, "robot_mm");
    }

    #[test]
    fn broken_profile_file_is_an_error() {
        let path = temp_file("broken.json", "{ not json");
        let a = ClientArgs {
            profile_file: Some(path),
            ..args()
        };
        assert!(matches!(
            ClientConfig::resolve(&a, None),
            Err(ConfigError::Profile(ProfileError::Json(_)))
        ));
    }
}
