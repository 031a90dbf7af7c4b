//! Account Resolver
//!
//! Maps the payer-supplied account id to a student and its branch. Nothing is
//! cached: each call reads current storage state.

use std::sync::Arc;

use uuid::Uuid;

use super::error::PaymentError;
use super::store::PaymentStore;
use super::types::AccountContext;

#[derive(Clone)]
pub struct AccountResolver {
    store: Arc<dyn PaymentStore>,
}

impl AccountResolver {
    pub fn new(store: Arc<dyn PaymentStore>) -> Self {
        Self { store }
    }

    /// Resolve an active account.
    ///
    /// Unknown and inactive students both yield `AccountNotFound`, so a caller cannot
    /// tell a suspended account from a missing one.
    pub async fn resolve(&self, account_id: &str) -> Result<AccountContext, PaymentError> {
        match self.store.find_account(account_id).await? {
            Some(ctx) if ctx.student.active => Ok(ctx),
            Some(ctx) => {
                tracing::debug!(
                    account_id,
                    student_id = %ctx.student.id,
                    "Account resolves to an inactive student"
                );
                Err(PaymentError::AccountNotFound)
            }
            None => Err(PaymentError::AccountNotFound),
        }
    }

    /// Owner of an existing transaction, regardless of the active flag
    pub async fn owner_of(&self, student_id: Uuid) -> Result<Option<AccountContext>, PaymentError> {
        self.store.find_student(student_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::memory_store::InMemoryPaymentStore;
    use crate::payment::types::{Branch, Student};
    use rust_decimal::Decimal;

    async fn resolver_with_student(active: bool) -> (AccountResolver, Uuid) {
        let store = InMemoryPaymentStore::new();
        let branch = Branch {
            id: Uuid::new_v4(),
            name: "Sergeli".into(),
            monthly_fee: 300_000,
            mfo_code: "00444".into(),
            account_number: "2020800".into(),
            merchant_id: Some("m".into()),
            topic_id: None,
        };
        let student = Student {
            id: Uuid::new_v4(),
            account_id: Some("ACC-9".into()),
            branch_id: branch.id,
            full_name: None,
            parent_name: String::new(),
            group_name: None,
            contract_number: None,
            discount_percent: Decimal::ZERO,
            balance: 0,
            active,
        };
        let id = student.id;
        store.add_branch(branch).await;
        store.add_student(student).await;
        (AccountResolver::new(Arc::new(store)), id)
    }

    #[tokio::test]
    async fn test_resolve_active() {
        let (resolver, id) = resolver_with_student(true).await;
        let ctx = resolver.resolve("ACC-9").await.unwrap();
        assert_eq!(ctx.student.id, id);
        assert_eq!(ctx.payable_amount(), 300_000);
    }

    #[tokio::test]
    async fn test_inactive_looks_like_missing() {
        let (resolver, id) = resolver_with_student(false).await;
        assert_eq!(
            resolver.resolve("ACC-9").await.unwrap_err(),
            PaymentError::AccountNotFound
        );
        assert_eq!(
            resolver.resolve("ACC-0").await.unwrap_err(),
            PaymentError::AccountNotFound
        );
        // Owner lookup is not gated on the active flag
        assert!(resolver.owner_of(id).await.unwrap().is_some());
    }
}
