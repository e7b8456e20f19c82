use reqwest::blocking::Client;
use std::env;
use std::process::Command;

use crate::engine::EngineError;

pub const TOKEN_ENV: &str = "EE_ACCESS_TOKEN";
pub const TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

/// Where an access token came from.
#[derive(Clone, Debug, PartialEq)]
pub enum TokenSource {
    Env,
    Gcloud,
}

#[derive(Clone)]
pub struct AccessToken {
    pub token: String,
    pub source: TokenSource,
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

/// The places a token can come from, plus a startup validity check.
pub trait Credentials {
    /// A token supplied directly by the user, if any.
    fn env_token(&self) -> Option<String>;

    /// A token minted by the local gcloud installation.
    fn gcloud_token(&self) -> Result<String, EngineError>;

    /// Interactive login that makes `gcloud_token` usable.
    fn login(&self) -> Result<(), EngineError>;

    /// Reject tokens that are expired or revoked.
    fn verify(&self, token: &str) -> Result<(), EngineError>;
}

/// Environment, `gcloud` and Google's tokeninfo endpoint.
pub struct SystemCredentials {
    client: Client,
}

impl SystemCredentials {
    pub fn new() -> Result<Self, EngineError> {
        let client = Client::builder()
            .user_agent(concat!("nightlights/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl Credentials for SystemCredentials {
    fn env_token(&self) -> Option<String> {
        env::var(TOKEN_ENV)
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }

    fn gcloud_token(&self) -> Result<String, EngineError> {
        let output = Command::new("gcloud")
            .args(["auth", "print-access-token"])
            .output()
            .map_err(|e| EngineError::Credentials(format!("running gcloud: {}", e)))?;
        if !output.status.success() {
            return Err(EngineError::Credentials(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if token.is_empty() {
            return Err(EngineError::Credentials("gcloud returned an empty token".to_string()));
        }
        Ok(token)
    }

    fn login(&self) -> Result<(), EngineError> {
        let status = Command::new("gcloud")
            .args(["auth", "login"])
            .status()
            .map_err(|e| EngineError::Credentials(format!("running gcloud auth login: {}", e)))?;
        if !status.success() {
            return Err(EngineError::Credentials(format!(
                "gcloud auth login exited with {}",
                status
            )));
        }
        Ok(())
    }

    fn verify(&self, token: &str) -> Result<(), EngineError> {
        let response = self
            .client
            .get(TOKENINFO_URL)
            .query(&[("access_token", token)])
            .send()?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(EngineError::Credentials(format!(
                "token rejected by tokeninfo (HTTP {})",
                response.status().as_u16()
            )))
        }
    }
}

fn checked<C: Credentials>(
    creds: &C,
    token: Result<String, EngineError>,
    source: TokenSource,
) -> Result<AccessToken, EngineError> {
    let token = token?;
    creds.verify(&token)?;
    Ok(AccessToken { token, source })
}

/// Resolve a verified access token: environment first, then gcloud, then
/// one interactive login followed by a last gcloud attempt.
pub fn acquire_token<C: Credentials>(creds: &C) -> Result<AccessToken, EngineError> {
    if let Some(token) = creds.env_token() {
        match checked(creds, Ok(token), TokenSource::Env) {
            Ok(token) => {
                log::info!("using access token from {}", TOKEN_ENV);
                return Ok(token);
            }
            Err(e) => log::warn!("ignoring {}: {}", TOKEN_ENV, e),
        }
    }

    match checked(creds, creds.gcloud_token(), TokenSource::Gcloud) {
        Ok(token) => {
            log::info!("using access token from gcloud");
            Ok(token)
        }
        Err(e) => {
            log::warn!("no usable credentials ({}); starting interactive login", e);
            println!(
                "Authentication needed. Follow the link in the logs if running interactively."
            );
            creds.login()?;
            checked(creds, creds.gcloud_token(), TokenSource::Gcloud).map_err(|e| {
                EngineError::Credentials(format!("still unauthenticated after login: {}", e))
            })
        }
    }
}
