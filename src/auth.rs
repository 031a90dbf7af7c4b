//! Merchant authentication
//!
//! The provider authenticates every call with `Authorization: Basic base64(login:password)`.
//! Credentials are loaded once from configuration; the password can be rotated at runtime
//! through the `ChangePassword` method.

use std::sync::RwLock;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::config::MerchantConfig;
use crate::payment::PaymentError;

pub struct CredentialStore {
    login: String,
    password: RwLock<String>,
}

impl CredentialStore {
    pub fn new(login: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login: login.into(),
            password: RwLock::new(password.into()),
        }
    }

    pub fn from_config(merchant: &MerchantConfig) -> Self {
        Self::new(merchant.login.clone(), merchant.password.clone())
    }

    /// Check an `Authorization` header value
    pub fn verify_basic(&self, header: Option<&str>) -> Result<(), PaymentError> {
        let encoded = header
            .and_then(|h| h.strip_prefix("Basic "))
            .ok_or(PaymentError::Unauthorized)?;
        let decoded = STANDARD
            .decode(encoded.trim())
            .map_err(|_| PaymentError::Unauthorized)?;
        let pair = String::from_utf8(decoded).map_err(|_| PaymentError::Unauthorized)?;
        let (login, password) = pair.split_once(':').ok_or(PaymentError::Unauthorized)?;

        let current = self.password.read().unwrap_or_else(|e| e.into_inner());
        if login == self.login && password == current.as_str() {
            Ok(())
        } else {
            tracing::debug!(login, "Rejected merchant credentials");
            Err(PaymentError::Unauthorized)
        }
    }

    /// Replace the merchant password in memory
    pub fn rotate(&self, new_password: &str) -> Result<(), PaymentError> {
        if new_password.is_empty() {
            return Err(PaymentError::InvalidParams("password must not be empty".into()));
        }
        let mut current = self.password.write().unwrap_or_else(|e| e.into_inner());
        *current = new_password.to_string();
        tracing::warn!(login = %self.login, "Merchant password rotated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic(login: &str, password: &str) -> String {
        format!("Basic {}", STANDARD.encode(format!("{}:{}", login, password)))
    }

    #[test]
    fn test_verify_basic() {
        let store = CredentialStore::new("Paycom", "secret");
        assert!(store.verify_basic(Some(&basic("Paycom", "secret"))).is_ok());
        assert_eq!(
            store.verify_basic(Some(&basic("Paycom", "wrong"))),
            Err(PaymentError::Unauthorized)
        );
        assert_eq!(
            store.verify_basic(Some(&basic("other", "secret"))),
            Err(PaymentError::Unauthorized)
        );
    }

    #[test]
    fn test_malformed_headers() {
        let store = CredentialStore::new("Paycom", "secret");
        assert!(store.verify_basic(None).is_err());
        assert!(store.verify_basic(Some("Bearer abc")).is_err());
        assert!(store.verify_basic(Some("Basic %%%")).is_err());
        let no_colon = format!("Basic {}", STANDARD.encode("Paycomsecret"));
        assert!(store.verify_basic(Some(&no_colon)).is_err());
    }

    #[test]
    fn test_password_may_contain_colon() {
        let store = CredentialStore::new("Paycom", "a:b:c");
        assert!(store.verify_basic(Some(&basic("Paycom", "a:b:c"))).is_ok());
    }

    #[test]
    fn test_rotate() {
        let store = CredentialStore::new("Paycom", "old");
        store.rotate("new").unwrap();
        assert!(store.verify_basic(Some(&basic("Paycom", "old"))).is_err());
        assert!(store.verify_basic(Some(&basic("Paycom", "new"))).is_ok());
        assert!(matches!(
            store.rotate(""),
            Err(PaymentError::InvalidParams(_))
        ));
    }
}
