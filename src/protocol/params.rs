//! Typed method parameters
//!
//! Unknown, missing or mistyped fields are rejected as `InvalidParams` before any
//! business logic runs.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use validator::Validate;

use crate::payment::PaymentError;

/// `account` object; some provider setups send `user_id` instead of `id`
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AccountParams {
    #[serde(alias = "user_id")]
    #[validate(length(min = 1, max = 64))]
    pub id: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CheckPerformParams {
    pub amount: i64,
    #[validate(nested)]
    pub account: AccountParams,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CreateParams {
    #[validate(length(min = 1, max = 64))]
    pub id: String,
    #[validate(range(min = 0))]
    pub time: i64,
    pub amount: i64,
    #[validate(nested)]
    pub account: AccountParams,
}

/// PerformTransaction / CheckTransaction
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct TransactionIdParams {
    #[validate(length(min = 1, max = 64))]
    pub id: String,
}

/// `reason` stays optional here so the state machine decides its absence
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CancelParams {
    #[validate(length(min = 1, max = 64))]
    pub id: String,
    #[serde(default)]
    pub reason: Option<i32>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct StatementParams {
    pub from: i64,
    pub to: i64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ChangePasswordParams {
    #[validate(length(min = 1))]
    pub password: String,
}

/// Decode and validate raw params
pub fn decode_params<T>(params: Option<Value>) -> Result<T, PaymentError>
where
    T: DeserializeOwned + Validate,
{
    let raw = params.ok_or_else(|| PaymentError::InvalidParams("params are required".into()))?;
    let typed: T =
        serde_json::from_value(raw).map_err(|e| PaymentError::InvalidParams(e.to_string()))?;
    typed
        .validate()
        .map_err(|e| PaymentError::InvalidParams(e.to_string()))?;
    Ok(typed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_create() {
        let p: CreateParams = decode_params(Some(json!({
            "id": "tx1", "time": 1000, "amount": 50000, "account": {"id": "A1"}
        })))
        .unwrap();
        assert_eq!(p.id, "tx1");
        assert_eq!(p.account.id, "A1");
    }

    #[test]
    fn test_user_id_alias() {
        let p: CheckPerformParams =
            decode_params(Some(json!({"amount": 1, "account": {"user_id": "A7"}}))).unwrap();
        assert_eq!(p.account.id, "A7");
    }

    #[test]
    fn test_rejects_unknown_field() {
        let err = decode_params::<TransactionIdParams>(Some(json!({"id": "x", "extra": 1})))
            .unwrap_err();
        assert!(matches!(err, PaymentError::InvalidParams(_)));
    }

    #[test]
    fn test_rejects_missing_and_mistyped() {
        assert!(matches!(
            decode_params::<CheckPerformParams>(Some(json!({"amount": 1}))).unwrap_err(),
            PaymentError::InvalidParams(_)
        ));
        assert!(matches!(
            decode_params::<CheckPerformParams>(Some(json!({"amount": "1", "account": {"id": "A"}})))
                .unwrap_err(),
            PaymentError::InvalidParams(_)
        ));
        assert!(matches!(
            decode_params::<StatementParams>(None).unwrap_err(),
            PaymentError::InvalidParams(_)
        ));
    }

    #[test]
    fn test_validation_rules() {
        assert!(decode_params::<TransactionIdParams>(Some(json!({"id": ""}))).is_err());
        assert!(decode_params::<ChangePasswordParams>(Some(json!({"password": ""}))).is_err());
        assert!(
            decode_params::<CheckPerformParams>(Some(json!({"amount": 1, "account": {"id": ""}})))
                .is_err()
        );
    }

    #[test]
    fn test_cancel_reason_optional_at_decode() {
        let p: CancelParams = decode_params(Some(json!({"id": "x"}))).unwrap();
        assert!(p.reason.is_none());
        let p: CancelParams = decode_params(Some(json!({"id": "x", "reason": 5}))).unwrap();
        assert_eq!(p.reason, Some(5));
    }
}
