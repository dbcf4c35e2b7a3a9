// ⚙️ Configuration - CLI flags with environment fallbacks
//
// `Config` is shared by both binaries (flattened into their clap parsers);
// `ServerConfig` adds the HTTP-only settings. A `.env` file is loaded by the
// binaries before parsing.

use crate::calendar::{fallback_term_label, AcademicCalendar};
use crate::catalog::Catalog;
use crate::sync::RetryPolicy;
use anyhow::{bail, Result};
use chrono::NaiveDate;
use clap::Args;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Args, Debug, Clone)]
pub struct Config {
    /// SQLite database holding completed courses
    #[arg(long, env = "DEGREE_PLANNER_DB", default_value = "degree_planner.db")]
    pub db: PathBuf,

    /// Catalog JSON file (defaults to the built-in Rutgers CS catalog)
    #[arg(long, env = "DEGREE_PLANNER_CATALOG")]
    pub catalog: Option<PathBuf>,

    /// Semester recorded on new completions (defaults to the current term)
    #[arg(long, env = "DEGREE_PLANNER_TERM")]
    pub term: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Attempts per sync operation before it is abandoned
    #[arg(long, env = "SYNC_MAX_ATTEMPTS", default_value = "5")]
    pub sync_max_attempts: u32,

    /// Initial retry delay in milliseconds (doubles per attempt)
    #[arg(long, env = "SYNC_BASE_DELAY_MS", default_value = "250")]
    pub sync_base_delay_ms: u64,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            bail!(
                "LOG_LEVEL must be one of {} (got '{}')",
                LOG_LEVELS.join(", "),
                self.log_level
            );
        }

        if self.sync_max_attempts == 0 {
            bail!("SYNC_MAX_ATTEMPTS must be at least 1");
        }

        if let Some(term) = &self.term {
            if term.trim().is_empty() {
                bail!("DEGREE_PLANNER_TERM must not be empty");
            }
        }

        if let Some(path) = &self.catalog {
            if !path.exists() {
                bail!("Catalog file not found: {:?}", path);
            }
        }

        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.sync_max_attempts,
            Duration::from_millis(self.sync_base_delay_ms),
        )
    }

    pub fn load_catalog(&self) -> Result<Catalog> {
        match &self.catalog {
            Some(path) => {
                let catalog = Catalog::from_file(path)?;
                info!(catalog = %catalog.name, path = ?path, "loaded catalog file");
                Ok(catalog)
            }
            None => Ok(Catalog::builtin()),
        }
    }

    /// Term label stamped on new completions
    pub fn current_term(&self, calendar: Option<&AcademicCalendar>, today: NaiveDate) -> String {
        if let Some(term) = &self.term {
            return term.trim().to_string();
        }

        match calendar.and_then(|c| c.term_for(today)) {
            Some(term) => term.label.clone(),
            None => {
                warn!(%today, "no calendar term covers today, deriving label from the date");
                fallback_term_label(today)
            }
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:3001")]
    pub listen: SocketAddr,

    /// Secret used to verify payment webhooks (webhooks are rejected without it)
    #[arg(long, env = "STRIPE_WEBHOOK_SECRET")]
    pub stripe_webhook_secret: Option<String>,

    /// Accepted clock skew for webhook timestamps, in seconds
    #[arg(long, env = "WEBHOOK_TOLERANCE_SECS", default_value = "300")]
    pub webhook_tolerance_secs: i64,
}

impl ServerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.webhook_tolerance_secs < 0 {
            bail!("WEBHOOK_TOLERANCE_SECS must not be negative");
        }
        if let Some(secret) = &self.stripe_webhook_secret {
            if secret.trim().is_empty() {
                bail!("STRIPE_WEBHOOK_SECRET must not be empty when set");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        config: Config,
        #[command(flatten)]
        server: ServerConfig,
    }

    fn parse(args: &[&str]) -> TestCli {
        let mut argv = vec!["test"];
        argv.extend_from_slice(args);
        TestCli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults_validate() {
        let cli = parse(&["--db", "planner.db", "--log-level", "info"]);

        assert!(cli.config.validate().is_ok());
        assert!(cli.server.validate().is_ok());
        assert_eq!(cli.config.db, PathBuf::from("planner.db"));
    }

    #[test]
    fn test_rejects_bad_values() {
        let cli = parse(&["--log-level", "loud"]);
        assert!(cli.config.validate().is_err());

        let cli = parse(&["--log-level", "info", "--sync-max-attempts", "0"]);
        assert!(cli.config.validate().is_err());

        let cli = parse(&["--log-level", "info", "--catalog", "/nonexistent/catalog.json"]);
        assert!(cli.config.validate().is_err());
    }

    #[test]
    fn test_retry_policy_from_flags() {
        let cli = parse(&["--sync-max-attempts", "3", "--sync-base-delay-ms", "10"]);
        let policy = cli.config.retry_policy();

        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay_for(2), Duration::from_millis(20));
    }

    #[test]
    fn test_current_term() {
        let today = NaiveDate::from_ymd_opt(2025, 10, 17).unwrap();
        let calendar = AcademicCalendar::builtin().unwrap();

        let cli = parse(&["--term", "Spring 2024"]);
        assert_eq!(cli.config.current_term(Some(&calendar), today), "Spring 2024");

        let cli = parse(&[]);
        assert_eq!(cli.config.current_term(Some(&calendar), today), "Fall 2025");
        assert_eq!(cli.config.current_term(None, today), "Fall 2025");
    }
}
