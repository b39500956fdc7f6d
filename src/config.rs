use std::str::FromStr;

use anyhow::Context;

use crate::engine::thresholds::SugarThresholdPolicy;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// Background daily cycle.
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// Local hour from which a user's daily cycle is due.
    pub digest_hour: u8,
    pub interval_secs: u64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub jobs: JobConfig,
    pub sugar_policy: SugarThresholdPolicy,
    pub host: String,
    pub port: u16,
}

fn var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T: FromStr>(value: Option<String>, default: T) -> T {
    value
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt = JwtConfig {
            secret: var("JWT_SECRET").context("JWT_SECRET is not set")?,
            issuer: var("JWT_ISSUER").unwrap_or_else(|| "medtrack".into()),
            audience: var("JWT_AUDIENCE").unwrap_or_else(|| "medtrack-users".into()),
            ttl_minutes: parse_or(var("JWT_TTL_MINUTES"), 60),
            refresh_ttl_minutes: parse_or(var("JWT_REFRESH_TTL_MINUTES"), 60 * 24 * 14),
        };

        let jobs = JobConfig {
            digest_hour: parse_or(var("DIGEST_HOUR"), 21),
            interval_secs: parse_or(var("DAILY_JOB_INTERVAL_SECS"), 900),
        };
        anyhow::ensure!(jobs.digest_hour < 24, "DIGEST_HOUR must be between 0 and 23");
        anyhow::ensure!(jobs.interval_secs > 0, "DAILY_JOB_INTERVAL_SECS must be positive");

        let sugar_policy = match var("SUGAR_THRESHOLD_MODE") {
            Some(mode) => mode.parse().map_err(anyhow::Error::msg)?,
            None => SugarThresholdPolicy::default(),
        };

        Ok(Self {
            database_url,
            jwt,
            jobs,
            sugar_policy,
            host: var("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(var("APP_PORT"), 8080),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_or_falls_back_on_missing_or_garbage() {
        assert_eq!(parse_or::<u8>(None, 21), 21);
        assert_eq!(parse_or::<u8>(Some("nine".into()), 21), 21);
        assert_eq!(parse_or::<u8>(Some(" 7 ".into()), 21), 7);
        assert_eq!(parse_or::<u64>(Some("-5".into()), 900), 900);
    }

    #[test]
    fn sugar_mode_names() {
        assert_eq!(
            "fasting".parse::<SugarThresholdPolicy>(),
            Ok(SugarThresholdPolicy::FastingOnly)
        );
        assert_eq!(
            "BY_TIMING".parse::<SugarThresholdPolicy>(),
            Ok(SugarThresholdPolicy::ByTiming)
        );
        assert!("after_meal".parse::<SugarThresholdPolicy>().is_err());
    }
}
