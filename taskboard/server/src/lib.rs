pub mod config {
    use serde::Deserialize;

    #[derive(Deserialize, Debug, Clone)]
    pub struct Config {
        /// Issuer URL of the identity provider, e.g.
        /// `https://cognito-idp.<region>.amazonaws.com/<pool id>`.
        pub issuer: String,
        /// Audience every token must carry.
        pub client_id: String,
        #[serde(default)]
        pub jwks_url: Option<String>,
        /// Postgres URL. Tasks are kept in memory when unset.
        #[serde(default)]
        pub db_url: Option<String>,
        #[serde(default)]
        pub notify_webhook_url: Option<String>,
        #[serde(default = "default_port")]
        pub port: u16,
        #[serde(default = "default_clock_skew_seconds")]
        pub clock_skew_seconds: u64,
        #[serde(default = "default_reminders_require_auth")]
        pub reminders_require_auth: bool,
    }

    impl Config {
        /// Loads configuration from environment variables.
        pub fn from_env() -> anyhow::Result<Self> {
            let settings = config::Config::builder()
                .add_source(config::Environment::default().try_parsing(true))
                .build()?;

            let config: Config = settings.try_deserialize()?;
            Ok(config)
        }

        /// Location of the provider's published key set.
        pub fn jwks_url(&self) -> String {
            match &self.jwks_url {
                Some(url) => url.clone(),
                None => format!(
                    "{}/.well-known/jwks.json",
                    self.issuer.trim_end_matches('/')
                ),
            }
        }
    }

    fn default_port() -> u16 {
        8080
    }

    fn default_clock_skew_seconds() -> u64 {
        60
    }

    fn default_reminders_require_auth() -> bool {
        true
    }

}

pub mod auth;
pub mod entities;
pub mod notify;
pub mod reminder;
pub mod task;
pub mod web;
