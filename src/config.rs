use clap::Parser;
use std::time::Duration;

/// Longest accepted rate-limit window (one year).
pub const MAX_RATE_WINDOW_SECS: u64 = 365 * 24 * 60 * 60;

// CLI argument structure, every flag can also come from the environment
#[derive(Parser, Debug, Clone)]
#[command(name = "codegen-gateway")]
#[command(about = "Rate-limited gateway that turns prompts into canvas drawing code")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    // Credential for the generative model, gateway answers 500 without it
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    // Model name used for generateContent calls
    #[arg(long, env = "GEMINI_MODEL", default_value = "gemini-1.5-flash")]
    pub model: String,

    // Base url of the model API
    #[arg(
        long,
        env = "GEMINI_BASE_URL",
        default_value = "https://generativelanguage.googleapis.com"
    )]
    pub model_url: String,

    // Seconds to wait for the model before giving up
    #[arg(long, env = "MODEL_TIMEOUT_SECS", default_value_t = 30)]
    pub model_timeout: u64,

    // Rate limit max requests per window
    #[arg(
        long,
        env = "RATE_LIMIT_MAX",
        default_value_t = 10,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub rate_limit: u32,

    // Rate limit window in seconds, at most one year
    #[arg(
        long,
        env = "RATE_LIMIT_WINDOW_SECS",
        default_value_t = 3600,
        value_parser = clap::value_parser!(u64).range(1..=MAX_RATE_WINDOW_SECS)
    )]
    pub rate_window: u64,

    // Comma-separated origins, "*" allows any
    #[arg(long, env = "ALLOWED_ORIGINS", default_value = "*")]
    pub allowed_origins: String,

    // Redis-compatible REST endpoint for shared rate-limit counters
    #[arg(long, env = "RATE_LIMIT_STORE_URL")]
    pub store_url: Option<String>,

    #[arg(long, env = "RATE_LIMIT_STORE_TOKEN", hide_env_values = true)]
    pub store_token: Option<String>,

    // How often expired in-memory rate-limit records are dropped
    #[arg(long, env = "SWEEP_INTERVAL_SECS", default_value_t = 300)]
    pub sweep_interval: u64,
}

impl Args {
    pub fn rate_window(&self) -> Duration {
        Duration::from_secs(self.rate_window)
    }

    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval.max(1))
    }

    /// Blank credentials count as missing.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }

    pub fn origin_policy(&self) -> OriginPolicy {
        OriginPolicy::parse(&self.allowed_origins)
    }
}

/// Which origins receive `Access-Control-Allow-Origin`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginPolicy {
    Any,
    List(Vec<String>),
}

impl OriginPolicy {
    // Parse "a.com, b.com"; empty input or any "*" entry means Any
    pub fn parse(raw: &str) -> Self {
        let origins: Vec<String> = raw
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.trim_end_matches('/').to_string())
            .collect();

        if origins.is_empty() || origins.iter().any(|o| o == "*") {
            OriginPolicy::Any
        } else {
            OriginPolicy::List(origins)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_deployment_contract() {
        let args = Args::parse_from(["codegen-gateway"]);
        assert_eq!(args.rate_limit, 10);
        assert_eq!(args.rate_window(), Duration::from_secs(3600));
        assert_eq!(args.origin_policy(), OriginPolicy::Any);
    }

    #[test]
    fn zero_rate_limit_is_rejected() {
        assert!(Args::try_parse_from(["codegen-gateway", "--rate-limit", "0"]).is_err());
    }

    #[test]
    fn zero_or_huge_rate_window_is_rejected() {
        for bad in ["0", "31536001", "18446744073709551615"] {
            assert!(
                Args::try_parse_from(["codegen-gateway", "--rate-window", bad]).is_err(),
                "window {} accepted",
                bad
            );
        }

        let year = Args::try_parse_from(["codegen-gateway", "--rate-window", "31536000"]).unwrap();
        assert_eq!(year.rate_window(), Duration::from_secs(MAX_RATE_WINDOW_SECS));
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        let args = Args::parse_from(["codegen-gateway", "--api-key", "  "]);
        assert_eq!(args.api_key(), None);
    }

    #[test]
    fn origin_list_parsing() {
        assert_eq!(
            OriginPolicy::parse("https://a.example/, https://b.example"),
            OriginPolicy::List(vec![
                "https://a.example".to_string(),
                "https://b.example".to_string()
            ])
        );
        assert_eq!(OriginPolicy::parse("https://a.example,*"), OriginPolicy::Any);
        assert_eq!(OriginPolicy::parse(" "), OriginPolicy::Any);
    }
}
