use secrecy::{ExposeSecret, SecretString};

use crate::config::{CompletionConfig, ConnectionProfile};

/// Format a secret value, respecting the show_secrets flag.
pub fn format_secret(secret: &SecretString, show_secrets: bool) -> String {
    if show_secrets {
        secret.expose_secret().to_string()
    } else {
        "[REDACTED]".to_string()
    }
}

/// Format an optional secret value.
pub fn format_optional_secret(secret: Option<&SecretString>, show_secrets: bool) -> String {
    match secret {
        Some(s) => format_secret(s, show_secrets),
        None => "(not set)".to_string(),
    }
}

/// One-line description of a connection profile for diagnostics.
pub fn describe_profile(profile: &ConnectionProfile, show_secrets: bool) -> String {
    format!(
        "{} schema={} password={}",
        profile.address(),
        profile.schema,
        format_optional_secret(profile.password.as_ref(), show_secrets)
    )
}

/// One-line description of the completion settings for diagnostics.
pub fn describe_completion(config: &CompletionConfig, show_secrets: bool) -> String {
    format!(
        "{} model={} api_key={}",
        config.base_url,
        config.model,
        format_optional_secret(config.api_key.as_ref(), show_secrets)
    )
}
