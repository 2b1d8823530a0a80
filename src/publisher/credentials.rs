//! LinkedIn OAuth credentials.

use secrecy::SecretString;

use crate::error::PublishError;

/// Access token plus the member id posts are authored as.
#[derive(Debug, Clone)]
pub struct LinkedInCredentials {
    pub access_token: SecretString,
    /// Looked up from the userinfo endpoint when absent.
    pub person_id: Option<String>,
}

impl LinkedInCredentials {
    pub fn new(access_token: impl Into<String>, person_id: Option<String>) -> Self {
        Self {
            access_token: SecretString::from(access_token.into()),
            person_id,
        }
    }
}

/// Resolves credentials on demand.
pub trait CredentialProvider: Send + Sync {
    fn credentials(&self) -> Result<LinkedInCredentials, PublishError>;
}

/// Fixed credentials.
impl CredentialProvider for LinkedInCredentials {
    fn credentials(&self) -> Result<LinkedInCredentials, PublishError> {
        Ok(self.clone())
    }
}

/// Reads `LINKEDIN_ACCESS_TOKEN` and `LINKEDIN_PERSON_ID` on every call, so a
/// token rotated while the daemon runs is picked up on the next cycle.
#[derive(Debug, Clone, Default)]
pub struct EnvCredentials;

impl CredentialProvider for EnvCredentials {
    fn credentials(&self) -> Result<LinkedInCredentials, PublishError> {
        let access_token = non_empty_var("LINKEDIN_ACCESS_TOKEN").ok_or_else(|| {
            PublishError::MissingCredentials("LINKEDIN_ACCESS_TOKEN is not set".to_string())
        })?;
        Ok(LinkedInCredentials::new(
            access_token,
            non_empty_var("LINKEDIN_PERSON_ID"),
        ))
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
