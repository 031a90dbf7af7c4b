//! Notification Worker
//!
//! Drains the notification queue and delivers each message through a `Notifier`.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::{NotificationReceiver, Notifier, PaymentNotification, RetryPolicy};

pub struct NotificationWorker {
    notifier: Arc<dyn Notifier>,
    retry: RetryPolicy,
}

impl NotificationWorker {
    pub fn new(notifier: Arc<dyn Notifier>, retry: RetryPolicy) -> Self {
        Self { notifier, retry }
    }

    /// Run until every sender is dropped. Returns the number delivered.
    pub async fn run(&self, mut rx: NotificationReceiver) -> usize {
        info!(
            notifier = self.notifier.name(),
            max_attempts = self.retry.max_attempts,
            "Starting notification worker"
        );

        let mut delivered = 0;
        while let Some(notification) = rx.recv().await {
            if self.deliver(&notification).await {
                delivered += 1;
            }
        }

        info!(delivered, "Notification queue closed, worker exiting");
        delivered
    }

    /// Deliver one notification with retry. Failure is logged, never propagated.
    pub async fn deliver(&self, notification: &PaymentNotification) -> bool {
        let result = self
            .retry
            .retry_async(|attempt| async move {
                let res = self.notifier.notify(notification).await;
                if let Err(e) = &res {
                    warn!(
                        attempt = attempt + 1,
                        account_id = %notification.account_id,
                        error = %e,
                        "Notification attempt failed"
                    );
                }
                res
            })
            .await;

        match result {
            Ok(()) => {
                debug!(
                    account_id = %notification.account_id,
                    amount = notification.amount,
                    "Payment notification delivered"
                );
                true
            }
            Err(e) => {
                error!(
                    account_id = %notification.account_id,
                    amount = notification.amount,
                    error = %e,
                    "Payment notification dropped after retries"
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{NotifyError, notification_channel};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    /// Fails the first `failures` calls, then records deliveries
    struct FlakyNotifier {
        failures: usize,
        calls: AtomicUsize,
        delivered: Mutex<Vec<PaymentNotification>>,
    }

    impl FlakyNotifier {
        fn new(failures: usize) -> Self {
            Self {
                failures,
                calls: AtomicUsize::new(0),
                delivered: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Notifier for FlakyNotifier {
        async fn notify(&self, notification: &PaymentNotification) -> Result<(), NotifyError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(NotifyError::Rejected(503));
            }
            self.delivered.lock().await.push(notification.clone());
            Ok(())
        }

        fn name(&self) -> &'static str {
            "flaky"
        }
    }

    fn sample(amount: i64) -> PaymentNotification {
        PaymentNotification {
            student_name: "Ali".into(),
            branch_name: "Chilonzor".into(),
            group_name: "G-1".into(),
            account_id: "A1".into(),
            contract_number: "C-1".into(),
            amount,
            payment_time: "2024-03-01 10:00:00".into(),
            topic_id: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_retries_then_delivers() {
        let notifier = Arc::new(FlakyNotifier::new(2));
        let worker = NotificationWorker::new(notifier.clone(), RetryPolicy::new(3, 10, 10, 0.0));

        let (sender, rx) = notification_channel(8);
        assert!(sender.try_notify(sample(100)));
        drop(sender);

        assert_eq!(worker.run(rx).await, 1);
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 3);
        assert_eq!(notifier.delivered.lock().await[0].amount, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_drops_after_max_attempts() {
        let notifier = Arc::new(FlakyNotifier::new(usize::MAX));
        let worker = NotificationWorker::new(notifier.clone(), RetryPolicy::new(2, 10, 10, 0.0));

        assert!(!worker.deliver(&sample(1)).await);
        assert_eq!(notifier.calls.load(Ordering::SeqCst), 2);
        assert!(notifier.delivered.lock().await.is_empty());
    }
}
