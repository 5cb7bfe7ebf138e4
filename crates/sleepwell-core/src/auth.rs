//! Login and signup form validation.
//!
//! Identity itself is external: a successful sign-in yields a username and
//! a user id which the caller hands to [`crate::SleepTracker::login`].

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

impl LoginForm {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        require(&[("username", &self.username), ("password", &self.password)])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignupForm {
    pub username: String,
    pub password: String,
    pub confirm_password: String,
}

impl SignupForm {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        confirm_password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            confirm_password: confirm_password.into(),
        }
    }

    /// Blank fields are reported before a confirmation mismatch.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require(&[
            ("username", &self.username),
            ("password", &self.password),
            ("confirm_password", &self.confirm_password),
        ])?;
        if self.password != self.confirm_password {
            return Err(ValidationError::PasswordMismatch);
        }
        Ok(())
    }
}

fn require(fields: &[(&str, &String)]) -> Result<(), ValidationError> {
    let empty: Vec<String> = fields
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| (*name).to_string())
        .collect();
    if empty.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::EmptyCredentials { fields: empty })
    }
}
