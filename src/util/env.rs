use std::sync::LazyLock;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::OnceCell;

static ENV_VARS: LazyLock<OnceCell<Env>> = LazyLock::new(OnceCell::new);

pub type EnvResult<T> = core::result::Result<T, EnvErr>;

#[derive(Debug, Error)]
pub enum EnvErr {
    #[error("environment variable '{0}' is not valid: {1}")]
    InvalidValue(&'static str, String),
}

/// Process-wide environment snapshot, read once on first access.
///
/// `DATABASE_URL` is deliberately optional: without it the service boots with
/// smart sort disabled and store-backed routes answering 503.
#[derive(Debug, Clone)]
pub struct Env {
    pub database_url: Option<String>,
    pub server_api_port: u16,
    pub smart_sort_cron_enabled: bool,
    pub smart_sort_pass_timeout: Duration,
    pub smart_sort_score_ttl: Option<Duration>,
}

impl Env {
    pub async fn get() -> EnvResult<&'static Env> {
        ENV_VARS.get_or_try_init(|| async { Env::new() }).await
    }

    fn new() -> EnvResult<Self> {
        Ok(Self {
            database_url: optional_var("DATABASE_URL"),
            server_api_port: parse_port(optional_var("SERVER_API_PORT"))?,
            smart_sort_cron_enabled: parse_flag(optional_var("SMART_SORT_CRON_ENABLED")),
            smart_sort_pass_timeout: parse_secs(
                "SMART_SORT_PASS_TIMEOUT_SECS",
                optional_var("SMART_SORT_PASS_TIMEOUT_SECS"),
            )?
            .unwrap_or(Duration::from_secs(120)),
            smart_sort_score_ttl: parse_secs(
                "SMART_SORT_SCORE_TTL_SECS",
                optional_var("SMART_SORT_SCORE_TTL_SECS"),
            )?,
        })
    }
}

fn optional_var(name: &str) -> Option<String> {
    dotenvy::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Anything other than a literal `"false"` leaves the flag enabled.
fn parse_flag(raw: Option<String>) -> bool {
    raw.as_deref() != Some("false")
}

fn parse_port(raw: Option<String>) -> EnvResult<u16> {
    match raw {
        None => Ok(8080),
        Some(v) => v
            .parse::<u16>()
            .map_err(|e| EnvErr::InvalidValue("SERVER_API_PORT", e.to_string())),
    }
}

fn parse_secs(name: &'static str, raw: Option<String>) -> EnvResult<Option<Duration>> {
    match raw {
        None => Ok(None),
        Some(v) => v
            .parse::<u64>()
            .map(|secs| Some(Duration::from_secs(secs)))
            .map_err(|e| EnvErr::InvalidValue(name, e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_defaults_on_and_only_false_disables() {
        assert!(parse_flag(None));
        assert!(parse_flag(Some("true".to_string())));
        assert!(parse_flag(Some("1".to_string())));
        assert!(!parse_flag(Some("false".to_string())));
    }

    #[test]
    fn port_falls_back_then_parses() {
        assert_eq!(parse_port(None).unwrap(), 8080);
        assert_eq!(parse_port(Some("9100".to_string())).unwrap(), 9100);
        assert!(parse_port(Some("not-a-port".to_string())).is_err());
    }

    #[test]
    fn secs_parse_to_durations() {
        assert_eq!(parse_secs("X", None).unwrap(), None);
        assert_eq!(
            parse_secs("X", Some("90".to_string())).unwrap(),
            Some(Duration::from_secs(90))
        );
        assert!(parse_secs("X", Some("ninety".to_string())).is_err());
    }
}
