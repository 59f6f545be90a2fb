pub mod domain;
pub mod forecast;
pub mod llm;

pub mod config {
    use crate::llm::Provider;
    use anyhow::Context;
    use std::time::Duration;

    const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Process-wide settings, read once at startup.
    #[derive(Debug, Clone)]
    pub struct Settings {
        pub backend: Provider,
        pub gemini_api_key: Option<String>,
        pub sentry_dsn: Option<String>,
        pub prediction_timeout: Duration,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Self::from_lookup(|key| std::env::var(key).ok())
        }

        pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
            let backend = match lookup("PREDICTION_BACKEND") {
                Some(s) => s
                    .parse::<Provider>()
                    .with_context(|| format!("invalid PREDICTION_BACKEND={s}"))?,
                None => Provider::Gemini,
            };

            let timeout_secs = match lookup("PREDICTION_TIMEOUT_SECS") {
                Some(s) => s
                    .trim()
                    .parse::<u64>()
                    .ok()
                    .filter(|secs| *secs > 0)
                    .with_context(|| {
                        format!("invalid PREDICTION_TIMEOUT_SECS={s} (expected a positive integer)")
                    })?,
                None => DEFAULT_TIMEOUT_SECS,
            };

            Ok(Self {
                backend,
                gemini_api_key: lookup("GEMINI_KEY"),
                sentry_dsn: lookup("SENTRY_DSN"),
                prediction_timeout: Duration::from_secs(timeout_secs),
            })
        }

        pub fn require_gemini_api_key(&self) -> anyhow::Result<&str> {
            self.gemini_api_key
                .as_deref()
                .filter(|k| !k.trim().is_empty())
                .context("GEMINI_KEY is required")
        }
    }

}
