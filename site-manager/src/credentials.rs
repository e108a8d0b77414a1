//! Resolve the corp, account and secret used to talk to the dashboard API.
//!
//! Command line values win over environment variables. When neither gives a
//! token or a password, the password is read from the terminal.

use log::{debug, info, warn};
use sigsci_platform::{Credentials, SigSciConfig};

pub const ENV_CORP: &str = "SIGSCI_CORP";
pub const ENV_EMAIL: &str = "SIGSCI_EMAIL";
pub const ENV_PASSWORD: &str = "SIGSCI_PASSWORD";
pub const ENV_API_TOKEN: &str = "SIGSCI_API_TOKEN";
pub const ENV_API_URL: &str = "SIGSCI_API_URL";
pub const ENV_DISABLE_CERT_VALIDATION: &str = "SIGSCI_DISABLE_CERT_VALIDATION";
pub const ENV_PROXY_URL: &str = "SIGSCI_PROXY_URL";
pub const ENV_CONNECT_TIMEOUT: &str = "SIGSCI_CONNECT_TIMEOUT";
pub const ENV_REQUEST_TIMEOUT: &str = "SIGSCI_REQUEST_TIMEOUT";

/// Text printed by `help-env`
pub const ENVIRONMENT_HELP: &str = "\
Environment variables:
  SIGSCI_CORP                     Corp name (--corp)
  SIGSCI_EMAIL                    Account email (--user)
  SIGSCI_PASSWORD                 Account password (--password)
  SIGSCI_API_TOKEN                API access token (--token)
  SIGSCI_API_URL                  Dashboard API root (--api-url)
  SIGSCI_DISABLE_CERT_VALIDATION  Set to any value to skip TLS certificate checks
  SIGSCI_PROXY_URL                HTTP(S) proxy for all API requests
  SIGSCI_CONNECT_TIMEOUT          Connect timeout in seconds (default 30)
  SIGSCI_REQUEST_TIMEOUT          Request timeout in seconds (default 300)
  RUST_LOG                        Log filter, e.g. debug

A token takes precedence over a password. Without either, the password is
prompted for.";

/// Custom error types for credential resolution
#[derive(thiserror::Error, Debug)]
pub enum CredentialError {
    #[error("Missing required credentials: {missing}")]
    MissingCredentials { missing: String },

    #[error("Credential validation failed: {field}: {message}")]
    ValidationError { field: String, message: String },

    #[error("Password prompt failed: {0}")]
    PromptError(#[source] std::io::Error),
}

/// Values given on the command line
#[derive(Debug, Clone, Default)]
pub struct CredentialArgs {
    pub corp: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
    pub api_url: Option<String>,
}

/// Where the secret came from, for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    CommandLine,
    Environment,
    Prompt,
}

/// Everything needed to build a client. Secrets are redacted in debug output.
#[derive(Debug, Clone)]
pub struct ResolvedCredentials {
    pub corp: String,
    pub email: String,
    pub credentials: Credentials,
    pub source: CredentialSource,
    pub api_url: Option<String>,
    pub disable_cert_validation: bool,
    pub proxy_url: Option<String>,
    pub connect_timeout: Option<u64>,
    pub request_timeout: Option<u64>,
}

impl ResolvedCredentials {
    /// Client configuration for these credentials
    #[must_use]
    pub fn into_config(self) -> SigSciConfig {
        let mut config = SigSciConfig::new(self.email, self.credentials, self.corp);
        if let Some(api_url) = self.api_url {
            debug!("Using API root {api_url}");
            config = config.with_base_url(api_url);
        }
        if self.disable_cert_validation {
            warn!(
                "Certificate validation disabled by {ENV_DISABLE_CERT_VALIDATION}; do not use this in production"
            );
            config = config.with_certificate_validation_disabled();
        }
        if let Some(proxy_url) = self.proxy_url {
            debug!("Using proxy {proxy_url}");
            config = config.with_proxy(proxy_url);
        }
        if self.connect_timeout.is_some() || self.request_timeout.is_some() {
            let connect = self.connect_timeout.unwrap_or(config.connect_timeout);
            let request = self.request_timeout.unwrap_or(config.request_timeout);
            config = config.with_timeouts(connect, request);
        }
        config
    }
}

/// First non-blank value, from the command line or else the environment.
/// Returned as given; secrets keep their surrounding whitespace.
fn pick_raw<E>(cli: Option<&String>, env: &E, name: &str) -> Option<(String, CredentialSource)>
where
    E: Fn(&str) -> Option<String>,
{
    let non_blank = |value: &String| !value.trim().is_empty();
    cli.filter(|value| non_blank(value))
        .map(|value| (value.clone(), CredentialSource::CommandLine))
        .or_else(|| {
            env(name)
                .filter(non_blank)
                .map(|value| (value, CredentialSource::Environment))
        })
}

/// Like [`pick_raw`], trimmed. For names, emails and URLs.
fn pick<E>(cli: Option<&String>, env: &E, name: &str) -> Option<(String, CredentialSource)>
where
    E: Fn(&str) -> Option<String>,
{
    pick_raw(cli, env, name).map(|(value, source)| (value.trim().to_string(), source))
}

/// Whole seconds from the environment; unparsable values are ignored.
fn seconds_from_env<E>(env: &E, name: &str) -> Option<u64>
where
    E: Fn(&str) -> Option<String>,
{
    let raw = env(name)?;
    match raw.trim().parse::<u64>() {
        Ok(seconds) => {
            debug!("Using {name}: {seconds} seconds");
            Some(seconds)
        }
        Err(_) => {
            warn!("Ignoring invalid {name} value: {raw}");
            None
        }
    }
}

/// Resolve credentials with injectable environment lookup and prompt.
///
/// # Errors
///
/// `MissingCredentials` without a corp or email, `ValidationError` for a
/// malformed email, `PromptError` if the terminal cannot be read.
pub fn resolve_credentials<E, P>(
    args: &CredentialArgs,
    env: E,
    prompt: P,
) -> Result<ResolvedCredentials, CredentialError>
where
    E: Fn(&str) -> Option<String>,
    P: FnOnce(&str) -> std::io::Result<String>,
{
    let mut missing = Vec::new();
    let corp = pick(args.corp.as_ref(), &env, ENV_CORP);
    if corp.is_none() {
        missing.push(format!("corp (--corp or {ENV_CORP})"));
    }
    let email = pick(args.email.as_ref(), &env, ENV_EMAIL);
    if email.is_none() {
        missing.push(format!("email (--user or {ENV_EMAIL})"));
    }
    let (Some((corp, _)), Some((email, _))) = (corp, email) else {
        return Err(CredentialError::MissingCredentials {
            missing: missing.join(", "),
        });
    };

    if !email.contains('@') {
        return Err(CredentialError::ValidationError {
            field: "email".to_string(),
            message: format!("'{email}' is not an email address"),
        });
    }

    let (credentials, source) =
        if let Some((token, source)) = pick_raw(args.token.as_ref(), &env, ENV_API_TOKEN) {
            (Credentials::api_token(token), source)
        } else if let Some((password, source)) =
            pick_raw(args.password.as_ref(), &env, ENV_PASSWORD)
        {
            (Credentials::password(password), source)
        } else {
            let password = prompt(&format!("Password for {email}: "))
                .map_err(CredentialError::PromptError)?;
            (Credentials::password(password), CredentialSource::Prompt)
        };
    debug!("Using credentials from {source:?}");

    Ok(ResolvedCredentials {
        corp,
        email,
        credentials,
        source,
        api_url: pick(args.api_url.as_ref(), &env, ENV_API_URL).map(|(url, _)| url),
        disable_cert_validation: env(ENV_DISABLE_CERT_VALIDATION).is_some(),
        proxy_url: pick(None, &env, ENV_PROXY_URL).map(|(url, _)| url),
        connect_timeout: seconds_from_env(&env, ENV_CONNECT_TIMEOUT),
        request_timeout: seconds_from_env(&env, ENV_REQUEST_TIMEOUT),
    })
}

/// Resolve credentials from the process environment and the terminal.
///
/// # Errors
///
/// See [`resolve_credentials`].
pub fn load_credentials(args: &CredentialArgs) -> Result<ResolvedCredentials, CredentialError> {
    let resolved = resolve_credentials(
        args,
        |name| std::env::var(name).ok(),
        |prompt: &str| rpassword::prompt_password(prompt),
    )?;
    info!("Loaded credentials for {} in corp {}", resolved.email, resolved.corp);
    Ok(resolved)
}
