// 📝 Logging setup shared by the CLI and the server

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber.
///
/// `RUST_LOG` wins when set; otherwise this crate logs at `level` and
/// everything else at info. Calling it twice is harmless.
pub fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

fn default_directives(level: &str) -> String {
    format!("degree_planner={},info", level.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives() {
        assert_eq!(default_directives("DEBUG"), "degree_planner=debug,info");
        assert!(EnvFilter::try_new(default_directives("warn")).is_ok());
    }
}
