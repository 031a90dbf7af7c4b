//! Payment Notifications
//!
//! After a successful settlement the state machine hands a `PaymentNotification` to a
//! bounded queue. A background worker delivers it with retry/backoff. Delivery is
//! best-effort and never feeds back into transaction state.

pub mod retry;
pub mod webhook;
pub mod worker;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;

pub use retry::RetryPolicy;
pub use webhook::WebhookNotifier;
pub use worker::NotificationWorker;

/// Staff-facing message about a settled payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentNotification {
    pub student_name: String,
    pub branch_name: String,
    pub group_name: String,
    pub account_id: String,
    pub contract_number: String,
    pub amount: i64,
    /// "%Y-%m-%d %H:%M:%S" in the ledger offset
    pub payment_time: String,
    pub topic_id: Option<i64>,
}

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Sink rejected notification with status {0}")]
    Rejected(u16),

    #[error("Notifier not configured: {0}")]
    NotConfigured(String),
}

/// Notification sink (webhook, chat bot, ...)
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &PaymentNotification) -> Result<(), NotifyError>;

    fn name(&self) -> &'static str;
}

/// Producer half of the notification queue
#[derive(Clone)]
pub struct NotificationSender {
    tx: mpsc::Sender<PaymentNotification>,
}

pub type NotificationReceiver = mpsc::Receiver<PaymentNotification>;

/// Create the bounded notification queue
pub fn notification_channel(size: usize) -> (NotificationSender, NotificationReceiver) {
    let (tx, rx) = mpsc::channel(size.max(1));
    (NotificationSender { tx }, rx)
}

impl NotificationSender {
    /// Enqueue without waiting. Returns false if the notification was dropped.
    pub fn try_notify(&self, notification: PaymentNotification) -> bool {
        match self.tx.try_send(notification) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(n)) => {
                tracing::warn!(
                    account_id = %n.account_id,
                    amount = n.amount,
                    "Notification queue full, dropping notification"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(n)) => {
                tracing::error!(
                    account_id = %n.account_id,
                    "Notification worker stopped, dropping notification"
                );
                false
            }
        }
    }
}
