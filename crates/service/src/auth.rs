//! Account registration and login.
//!
//! Passwords are stored as `salt$digest` with a random 16-byte salt and a
//! SHA-256 digest over salt bytes followed by the password bytes.

use std::sync::Arc;

use rand::RngCore;
use repository::{NewUser, RepositoryError, UsersRepository};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::instrument;

use crate::FieldError;

/// Errors surfaced by registration and login.
#[derive(Debug, Error)]
pub enum AuthError {
    /// One or more submitted fields failed validation.
    #[error("Invalid registration fields")]
    Validation(Vec<FieldError>),
    /// Unknown username or wrong password; deliberately indistinct.
    #[error("Invalid credentials")]
    InvalidCredentials,
    /// A repository (database) operation failed.
    #[error("Database error: {0}")]
    Db(#[from] RepositoryError),
}

fn hash_password(password: &str) -> String {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    format!("{}${}", hex::encode(salt), hex::encode(hasher.finalize()))
}

fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt_hex, digest_hex)) = stored.split_once('$') else {
        return false;
    };
    let Ok(salt) = hex::decode(salt_hex) else {
        return false;
    };
    let mut hasher = Sha256::new();
    hasher.update(&salt);
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize()) == digest_hex
}

fn validate_registration(
    username: &str,
    email: &str,
    password: &str,
    password_confirm: &str,
) -> Vec<FieldError> {
    let mut errors = Vec::new();

    let name_ok = (3..=32).contains(&username.len())
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !name_ok {
        errors.push(FieldError::new(
            "username",
            "Tên đăng nhập phải dài 3-32 ký tự, chỉ gồm chữ, số và dấu gạch dưới.",
        ));
    }

    let email_ok = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    };
    if !email_ok {
        errors.push(FieldError::new("email", "Email không hợp lệ."));
    }

    if password.chars().count() < 8 {
        errors.push(FieldError::new(
            "password",
            "Mật khẩu phải có ít nhất 8 ký tự.",
        ));
    }
    if password != password_confirm {
        errors.push(FieldError::new(
            "password_confirm",
            "Mật khẩu nhập lại không khớp.",
        ));
    }

    errors
}

/// Registration and login on top of a [`UsersRepository`].
pub struct AuthService<U> {
    users: Arc<U>,
}

impl<U> AuthService<U>
where
    U: UsersRepository,
{
    pub fn new(users: Arc<U>) -> Self {
        Self { users }
    }

    /// Create an account. The caller logs the new user in on success.
    #[instrument(skip(self, password, password_confirm))]
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        password_confirm: &str,
    ) -> Result<model::User, AuthError> {
        let username = username.trim();
        let email = email.trim();

        let mut errors = validate_registration(username, email, password, password_confirm);
        if errors.is_empty() && self.users.find_by_username(username).await?.is_some() {
            errors.push(FieldError::new(
                "username",
                "Tên đăng nhập đã được sử dụng.",
            ));
        }
        if !errors.is_empty() {
            return Err(AuthError::Validation(errors));
        }

        let user = self
            .users
            .insert(&NewUser {
                username: username.to_string(),
                email: email.to_string(),
                password_hash: hash_password(password),
            })
            .await?;
        Ok(user)
    }

    /// Verify credentials and return the account.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<model::User, AuthError> {
        let user = self
            .users
            .find_by_username(username.trim())
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        if verify_password(password, &user.password_hash) {
            Ok(user)
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeUsers;

    fn service() -> AuthService<FakeUsers> {
        AuthService::new(Arc::new(FakeUsers::default()))
    }

    #[test]
    fn test_hash_and_verify_round_trip() {
        let stored = hash_password("mật-khẩu-bí-mật");
        assert!(verify_password("mật-khẩu-bí-mật", &stored));
        assert!(!verify_password("sai rồi", &stored));
        // Two hashes of the same password differ because of the salt.
        assert_ne!(stored, hash_password("mật-khẩu-bí-mật"));
    }

    #[test]
    fn test_verify_rejects_garbage_hash() {
        assert!(!verify_password("x", "not-a-valid-record"));
        assert!(!verify_password("x", "zz$zz"));
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let svc = service();
        let user = svc
            .register("nguyenvana", "a@example.com", "password123", "password123")
            .await
            .unwrap();
        assert_eq!(user.username, "nguyenvana");

        let logged_in = svc.login("nguyenvana", "password123").await.unwrap();
        assert_eq!(logged_in.id, user.id);

        let err = svc.login("nguyenvana", "wrongpass123").await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_register_validation_errors() {
        let svc = service();
        let err = svc
            .register("ab", "not-an-email", "short", "different")
            .await
            .unwrap_err();
        match err {
            AuthError::Validation(errors) => {
                let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
                assert_eq!(
                    fields,
                    vec!["username", "email", "password", "password_confirm"]
                );
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_register_duplicate_username() {
        let svc = service();
        svc.register("nguyenvana", "a@example.com", "password123", "password123")
            .await
            .unwrap();
        let err = svc
            .register("nguyenvana", "b@example.com", "password123", "password123")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
    }
}
