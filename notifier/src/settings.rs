use aws_config::retry::RetryConfig;

use crate::NotifyError;

pub const SENDER_VAR: &str = "sender";
pub const RECIPIENT_VAR: &str = "recipient";
pub const REGION_VAR: &str = "awsregion";

/// Addresses must be verified in SES while the account is in the sandbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub sender: String,
    pub recipient: String,
    pub region: String,
}

impl Settings {
    pub fn from_env() -> Result<Settings, NotifyError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Settings, NotifyError> {
        let require = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.is_empty())
                .ok_or(NotifyError::MissingVariable(name))
        };

        Ok(Settings {
            sender: require(SENDER_VAR)?,
            recipient: require(RECIPIENT_VAR)?,
            region: require(REGION_VAR)?,
        })
    }
}

/// SDK retries stay off: a failed send fails the invocation and the
/// platform's own retry policy applies.
pub fn retry_config() -> RetryConfig {
    RetryConfig::disabled()
}
