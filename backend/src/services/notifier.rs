//! Real-time stock notifications
//!
//! Fire-and-forget broadcast of stock levels after every committed stock
//! mutation. Sending never fails the caller, even with no subscribers.

use serde::{Deserialize, Serialize};
use shared::StockChange;
use tokio::sync::broadcast;
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 256;

/// New stock level of one product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockUpdate {
    pub product_id: Uuid,
    pub company_id: Uuid,
    pub new_stock: i32,
}

#[derive(Clone)]
pub struct StockNotifier {
    sender: broadcast::Sender<StockUpdate>,
}

impl Default for StockNotifier {
    fn default() -> Self {
        Self::new(CHANNEL_CAPACITY)
    }
}

impl StockNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StockUpdate> {
        self.sender.subscribe()
    }

    pub fn notify(&self, update: StockUpdate) {
        match self.sender.send(update) {
            Ok(receivers) => {
                tracing::debug!(product_id = %update.product_id, new_stock = update.new_stock, receivers, "stock update broadcast");
            }
            Err(_) => {
                tracing::trace!(product_id = %update.product_id, "stock update with no subscribers");
            }
        }
    }

    /// Broadcast every change of a committed lifecycle transition
    pub fn notify_changes(&self, company_id: Uuid, changes: &[StockChange]) {
        for change in changes {
            self.notify(StockUpdate {
                product_id: change.company_product_id,
                company_id,
                new_stock: change.new_stock,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notify_without_subscribers_is_silent() {
        let notifier = StockNotifier::default();
        notifier.notify(StockUpdate {
            product_id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            new_stock: 5,
        });
    }

    #[tokio::test]
    async fn subscribers_receive_each_change() {
        let notifier = StockNotifier::default();
        let mut rx = notifier.subscribe();
        let company = Uuid::new_v4();
        let changes = [
            StockChange {
                company_product_id: Uuid::new_v4(),
                previous_stock: 150,
                new_stock: 130,
                delta: -20,
            },
            StockChange {
                company_product_id: Uuid::new_v4(),
                previous_stock: 10,
                new_stock: 7,
                delta: -3,
            },
        ];

        notifier.notify_changes(company, &changes);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.new_stock, 130);
        assert_eq!(first.company_id, company);
        assert_eq!(rx.recv().await.unwrap().new_stock, 7);
    }
}
