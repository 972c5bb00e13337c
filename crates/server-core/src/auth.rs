//! Front-end login parsing and password verification.

use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use gk_types::{AuthDecision, LoginTarget};
use password_hash::{PasswordHash, PasswordVerifier};
use rand::rngs::OsRng;
use tracing::error;

use crate::{
    authz::ConfigDirectory,
    error::{ServerError, ServerResult},
};

/// Parse `<user>[:[<account>@]<target>]`. Empty components are treated as absent.
pub fn parse_login_target(input: &str) -> LoginTarget {
    let Some((user, rest)) = input.split_once(':') else {
        return LoginTarget {
            username: input.to_string(),
            ..Default::default()
        };
    };
    let non_empty = |s: &str| if s.is_empty() { None } else { Some(s.to_string()) };
    let (account, target) = match rest.rsplit_once('@') {
        Some((account, target)) => (non_empty(account), non_empty(target)),
        None => (None, non_empty(rest)),
    };
    LoginTarget {
        username: user.to_string(),
        account,
        target,
    }
}

pub fn authenticate_password(directory: &ConfigDirectory, login: &LoginTarget, password: &str) -> AuthDecision {
    let Some(stored) = directory.password_hash(&login.username) else {
        return AuthDecision::Reject;
    };

    let parsed = match PasswordHash::new(stored) {
        Ok(ph) => ph,
        Err(e) => {
            error!(
                error = %e,
                user = %login.username,
                "invalid stored password hash"
            );
            return AuthDecision::Reject;
        }
    };

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(_) => AuthDecision::Accept,
        Err(_) => AuthDecision::Reject,
    }
}

pub fn hash_password(password: &str) -> ServerResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hashed = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ServerError::PasswordHash(format!("failed to hash password: {e}")))?
        .to_string();
    Ok(hashed)
}
