use crate::{models::Identity, ports::IdentityProvider};
use async_trait::async_trait;
use thiserror::Error;

const MAX_NAME_LEN: usize = 32;

/// Takes the connection token as the player's name.
#[derive(Clone, Default)]
pub struct SimpleIdentity;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum IdentityError {
    #[error("token is empty")]
    Empty,
    #[error("token is longer than {} characters", MAX_NAME_LEN)]
    TooLong,
    #[error("token contains control characters")]
    ControlCharacters,
}

#[async_trait]
impl IdentityProvider for SimpleIdentity {
    type Error = IdentityError;

    async fn identify(&self, token: &str) -> Result<Identity, Self::Error> {
        use IdentityError::*;

        let name = token.trim();
        if name.is_empty() {
            return Err(Empty);
        }

        if name.chars().count() > MAX_NAME_LEN {
            return Err(TooLong);
        }

        if name.chars().any(char::is_control) {
            return Err(ControlCharacters);
        }

        Ok(Identity::new(name, name))
    }
}
