use std::env;
use tracing::warn;

const DEFAULT_SERVER_HOST: &str = "0.0.0.0";
const DEFAULT_SERVER_PORT: u16 = 3000;
const DEFAULT_MAX_DAILY_APPOINTMENTS: u32 = 3;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub server_host: String,
    pub server_port: u16,
    /// Non-cancelled appointments a single client may hold on one UTC day.
    pub max_daily_appointments: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            server_host: DEFAULT_SERVER_HOST.to_string(),
            server_port: DEFAULT_SERVER_PORT,
            max_daily_appointments: DEFAULT_MAX_DAILY_APPOINTMENTS,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            server_host: env::var("SERVER_HOST")
                .unwrap_or_else(|_| DEFAULT_SERVER_HOST.to_string()),
            server_port: parse_or_default("SERVER_PORT", env::var("SERVER_PORT").ok(), DEFAULT_SERVER_PORT),
            max_daily_appointments: parse_or_default(
                "MAX_DAILY_APPOINTMENTS",
                env::var("MAX_DAILY_APPOINTMENTS").ok(),
                DEFAULT_MAX_DAILY_APPOINTMENTS,
            ),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_anon_key.is_empty()
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}

fn parse_or_default<T>(name: &str, raw: Option<String>, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display + Copy,
{
    match raw {
        None => default,
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using default {}", name, value, default);
            default
        }),
    }
}
