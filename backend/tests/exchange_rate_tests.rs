//! Exchange-rate cache and stock notification tests
//!
//! - Cached rates hit the provider once per pair within the TTL
//! - Provider failures are never cached
//! - Stock changes of a transition reach every subscriber in order

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::StockChange;
use uuid::Uuid;

use tradeflow_backend::error::{AppError, AppResult};
use tradeflow_backend::external::{CachedExchangeRates, ExchangeRateProvider};
use tradeflow_backend::services::StockNotifier;

struct ScriptedProvider {
    calls: AtomicUsize,
    failures_left: AtomicUsize,
}

impl ScriptedProvider {
    fn failing_first(failures: usize) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            failures_left: AtomicUsize::new(failures),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExchangeRateProvider for ScriptedProvider {
    async fn rate(&self, from: &str, _to: &str) -> AppResult<Decimal> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(AppError::ExchangeRateUnavailable("provider down".into()));
        }
        Ok(Decimal::from(from.len() as i64 + 1))
    }
}

fn currency_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("EUR".to_string()),
        Just("USD".to_string()),
        Just("GBP".to_string()),
        Just("CHF".to_string()),
    ]
}

proptest! {
    #[test]
    fn cache_fetches_each_pair_once(
        lookups in prop::collection::vec(currency_strategy(), 1..40)
    ) {
        let provider = ScriptedProvider::failing_first(0);
        let cache = CachedExchangeRates::new(provider.clone(), Duration::from_secs(3600));

        tokio_test::block_on(async {
            for from in &lookups {
                cache.rate(from, "PLN").await.unwrap();
            }
        });

        let distinct: std::collections::HashSet<_> = lookups.iter().collect();
        prop_assert_eq!(provider.calls(), distinct.len());
    }
}

#[test]
fn failures_are_retried_on_next_lookup() {
    let provider = ScriptedProvider::failing_first(2);
    let cache = CachedExchangeRates::new(provider.clone(), Duration::from_secs(3600));

    tokio_test::block_on(async {
        assert!(cache.rate("EUR", "PLN").await.is_err());
        assert!(cache.rate("EUR", "PLN").await.is_err());
        assert_eq!(cache.rate("EUR", "PLN").await.unwrap(), Decimal::from(4));
        assert_eq!(cache.rate("EUR", "PLN").await.unwrap(), Decimal::from(4));
    });

    assert_eq!(provider.calls(), 3);
}

#[test]
fn same_currency_skips_the_provider() {
    let provider = ScriptedProvider::failing_first(usize::MAX);
    let cache = CachedExchangeRates::new(provider.clone(), Duration::from_secs(3600));

    let rate = tokio_test::block_on(cache.rate("PLN", "PLN")).unwrap();
    assert_eq!(rate, Decimal::ONE);
    assert_eq!(provider.calls(), 0);
}

#[test]
fn transition_changes_reach_every_subscriber() {
    let notifier = StockNotifier::default();
    let mut first = notifier.subscribe();
    let mut second = notifier.subscribe();

    let company_id = Uuid::new_v4();
    let changes = vec![
        StockChange {
            company_product_id: Uuid::new_v4(),
            previous_stock: 150,
            new_stock: 130,
            delta: -20,
        },
        StockChange {
            company_product_id: Uuid::new_v4(),
            previous_stock: 10,
            new_stock: 0,
            delta: -10,
        },
    ];
    notifier.notify_changes(company_id, &changes);

    tokio_test::block_on(async {
        for receiver in [&mut first, &mut second] {
            for change in &changes {
                let update = receiver.recv().await.unwrap();
                assert_eq!(update.company_id, company_id);
                assert_eq!(update.product_id, change.company_product_id);
                assert_eq!(update.new_stock, change.new_stock);
            }
        }
    });
}
