//! Configuration loading from environment variables.
//!
//! Values are validated at startup so a misconfigured deployment fails fast
//! with an error naming the offending variable.

use std::env;
use std::time::Duration;

use crate::error::AppError;
use crate::formats::FormatPreference;

pub const DEFAULT_PRIMARY_CDN_TEMPLATE: &str = "https://aac.saavncdn.com/{id}_160.mp4";
pub const DEFAULT_FALLBACK_INSTANCE: &str = "https://inv.nadeko.net";
pub const DEFAULT_TERTIARY_API_URL: &str = "https://youtube-mp36.p.rapidapi.com/dl";
pub const DEFAULT_TERTIARY_API_HOST: &str = "youtube-mp36.p.rapidapi.com";
pub const DEFAULT_MIRROR_CACHE_TTL_SECS: u64 = 3600;

const MAX_TIMEOUT_SECS: u64 = 120;
const MAX_CACHE_TTL_SECS: u64 = 86_400;

/// Settings for the metadata-matched provider.
#[derive(Debug, Clone)]
pub struct PrimaryConfig {
    /// Lookup endpoint; the provider is disabled when unset.
    pub lookup_url: Option<String>,
    /// Playable URL template with an `{id}` placeholder.
    pub cdn_template: String,
    /// Whether `duration` is part of the applicability gate.
    pub require_duration: bool,
    pub timeout: Duration,
}

/// Settings for the mirror-based provider and its instance directory.
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    /// Remote 12-month mirror document; only the fallback is used when unset.
    pub directory_url: Option<String>,
    pub fallback_instance: String,
    pub cache_ttl: Duration,
    pub directory_timeout: Duration,
    /// Timeout applied to every individual search or detail attempt.
    pub timeout: Duration,
    pub format_preference: FormatPreference,
}

/// Settings for the paid fallback provider.
#[derive(Debug, Clone)]
pub struct TertiaryConfig {
    /// Disables the provider when unset.
    pub api_key: Option<String>,
    pub fallback_api_key: Option<String>,
    pub api_url: String,
    pub api_host: String,
    pub timeout: Duration,
}

/// Runtime configuration for the HTTP server and the resolution cascade.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host interface to bind, for example `127.0.0.1`.
    pub host: String,
    /// TCP port to bind.
    pub port: u16,
    /// Rejects requests that do not carry `v`/`videoId`.
    pub require_video_id: bool,
    pub primary: PrimaryConfig,
    pub mirror: MirrorConfig,
    pub tertiary: TertiaryConfig,
}

impl AppConfig {
    /// Builds configuration from environment variables.
    ///
    /// Variables:
    /// - `HOST` (default `127.0.0.1`), `PORT` (default `8000`)
    /// - `REQUIRE_VIDEO_ID` (default `false`)
    /// - `PRIMARY_LOOKUP_URL` (optional), `PRIMARY_CDN_TEMPLATE`,
    ///   `PRIMARY_REQUIRE_DURATION` (default `false`), `PRIMARY_TIMEOUT_SECS` (default `10`)
    /// - `MIRROR_DIRECTORY_URL` (optional), `MIRROR_FALLBACK_INSTANCE`,
    ///   `MIRROR_CACHE_TTL_SECS` (default `3600`), `MIRROR_DIRECTORY_TIMEOUT_SECS` (default `5`),
    ///   `MIRROR_TIMEOUT_SECS` (default `8`), `MIRROR_FORMAT_PREFERENCE` (default `140,251,250,249`)
    /// - `TERTIARY_API_KEY` (optional), `TERTIARY_FALLBACK_API_KEY` (optional),
    ///   `TERTIARY_API_URL`, `TERTIARY_API_HOST`, `TERTIARY_TIMEOUT_SECS` (default `10`)
    pub fn from_env() -> Result<Self, AppError> {
        let format_preference = match env_opt("MIRROR_FORMAT_PREFERENCE") {
            Some(raw) => FormatPreference::parse(&raw)?,
            None => FormatPreference::default(),
        };

        Ok(Self {
            host: env_str("HOST", "127.0.0.1"),
            port: env_u16("PORT", 8000)?,
            require_video_id: env_bool("REQUIRE_VIDEO_ID", false)?,
            primary: PrimaryConfig {
                lookup_url: env_opt("PRIMARY_LOOKUP_URL"),
                cdn_template: env_str("PRIMARY_CDN_TEMPLATE", DEFAULT_PRIMARY_CDN_TEMPLATE),
                require_duration: env_bool("PRIMARY_REQUIRE_DURATION", false)?,
                timeout: env_secs("PRIMARY_TIMEOUT_SECS", 10, 1, MAX_TIMEOUT_SECS)?,
            },
            mirror: MirrorConfig {
                directory_url: env_opt("MIRROR_DIRECTORY_URL"),
                fallback_instance: env_str("MIRROR_FALLBACK_INSTANCE", DEFAULT_FALLBACK_INSTANCE),
                cache_ttl: env_secs(
                    "MIRROR_CACHE_TTL_SECS",
                    DEFAULT_MIRROR_CACHE_TTL_SECS,
                    0,
                    MAX_CACHE_TTL_SECS,
                )?,
                directory_timeout: env_secs("MIRROR_DIRECTORY_TIMEOUT_SECS", 5, 1, MAX_TIMEOUT_SECS)?,
                timeout: env_secs("MIRROR_TIMEOUT_SECS", 8, 1, MAX_TIMEOUT_SECS)?,
                format_preference,
            },
            tertiary: TertiaryConfig {
                api_key: env_opt("TERTIARY_API_KEY"),
                fallback_api_key: env_opt("TERTIARY_FALLBACK_API_KEY"),
                api_url: env_str("TERTIARY_API_URL", DEFAULT_TERTIARY_API_URL),
                api_host: env_str("TERTIARY_API_HOST", DEFAULT_TERTIARY_API_HOST),
                timeout: env_secs("TERTIARY_TIMEOUT_SECS", 10, 1, MAX_TIMEOUT_SECS)?,
            },
        })
    }
}

fn env_str(name: &str, default: &str) -> String {
    env_opt(name).unwrap_or_else(|| default.to_string())
}

fn env_opt(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_u16(name: &str, default: u16) -> Result<u16, AppError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    let parsed = raw.trim().parse::<u16>().map_err(|_| {
        AppError::internal(format!("invalid {name}={raw:?}; expected integer 1-65535"))
    })?;
    if parsed == 0 {
        return Err(AppError::internal(format!(
            "invalid {name}={raw:?}; expected > 0"
        )));
    }
    Ok(parsed)
}

fn env_bool(name: &str, default: bool) -> Result<bool, AppError> {
    match env_opt(name) {
        Some(raw) => parse_bool(name, &raw),
        None => Ok(default),
    }
}

fn parse_bool(name: &str, raw: &str) -> Result<bool, AppError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AppError::internal(format!(
            "invalid {name}={raw:?}; expected true/false"
        ))),
    }
}

fn env_secs(name: &str, default: u64, min: u64, max: u64) -> Result<Duration, AppError> {
    match env_opt(name) {
        Some(raw) => parse_secs_bounded(name, &raw, min, max),
        None => Ok(Duration::from_secs(default)),
    }
}

fn parse_secs_bounded(name: &str, raw: &str, min: u64, max: u64) -> Result<Duration, AppError> {
    let out_of_range = || {
        AppError::internal(format!(
            "invalid {name}={raw:?}; expected seconds in range [{min}, {max}]"
        ))
    };
    let parsed = raw.trim().parse::<u64>().map_err(|_| out_of_range())?;
    if parsed < min || parsed > max {
        return Err(out_of_range());
    }
    Ok(Duration::from_secs(parsed))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{parse_bool, parse_secs_bounded};

    #[test]
    fn parse_secs_bounded_accepts_in_range_values() {
        assert_eq!(
            parse_secs_bounded("MIRROR_TIMEOUT_SECS", "1", 1, 120).unwrap(),
            Duration::from_secs(1)
        );
        assert_eq!(
            parse_secs_bounded("MIRROR_TIMEOUT_SECS", " 120 ", 1, 120).unwrap(),
            Duration::from_secs(120)
        );
    }

    #[test]
    fn parse_secs_bounded_rejects_bad_values() {
        assert!(parse_secs_bounded("MIRROR_TIMEOUT_SECS", "abc", 1, 120).is_err());
        assert!(parse_secs_bounded("MIRROR_TIMEOUT_SECS", "0", 1, 120).is_err());
        assert!(parse_secs_bounded("MIRROR_TIMEOUT_SECS", "121", 1, 120).is_err());
    }

    #[test]
    fn cache_ttl_may_be_zero() {
        assert_eq!(
            parse_secs_bounded("MIRROR_CACHE_TTL_SECS", "0", 0, 86_400).unwrap(),
            Duration::ZERO
        );
    }

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert!(parse_bool("REQUIRE_VIDEO_ID", "Yes").unwrap());
        assert!(!parse_bool("REQUIRE_VIDEO_ID", "off").unwrap());
        assert!(parse_bool("REQUIRE_VIDEO_ID", "maybe").is_err());
    }
}
