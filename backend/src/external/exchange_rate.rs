//! Exchange-rate client
//!
//! Fetches conversion rates from a Frankfurter-compatible API. Rates are
//! reused for a configurable TTL through [`CachedExchangeRates`].

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::error::{AppError, AppResult};

/// Source of currency conversion rates
#[async_trait]
pub trait ExchangeRateProvider: Send + Sync {
    /// Multiplier converting an amount in `from` into `to`
    async fn rate(&self, from: &str, to: &str) -> AppResult<Decimal>;
}

#[async_trait]
impl<P: ExchangeRateProvider + ?Sized> ExchangeRateProvider for Arc<P> {
    async fn rate(&self, from: &str, to: &str) -> AppResult<Decimal> {
        (**self).rate(from, to).await
    }
}

/// HTTP client for the rates API
#[derive(Clone)]
pub struct HttpExchangeRateProvider {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct LatestRatesResponse {
    rates: HashMap<String, serde_json::Number>,
}

impl HttpExchangeRateProvider {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ExchangeRateProvider for HttpExchangeRateProvider {
    async fn rate(&self, from: &str, to: &str) -> AppResult<Decimal> {
        if from == to {
            return Ok(Decimal::ONE);
        }

        let url = format!("{}/latest", self.base_url);
        tracing::debug!(from, to, "fetching exchange rate");

        let response = self
            .client
            .get(&url)
            .query(&[("from", from), ("to", to)])
            .send()
            .await
            .map_err(|e| AppError::ExchangeRateUnavailable(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::ExchangeRateUnavailable(format!(
                "rates API returned {} for {} -> {}",
                response.status(),
                from,
                to
            )));
        }

        let body: LatestRatesResponse = response
            .json()
            .await
            .map_err(|e| AppError::ExchangeRateUnavailable(format!("invalid response: {}", e)))?;

        parse_rate(&body, to)
    }
}

fn parse_rate(body: &LatestRatesResponse, to: &str) -> AppResult<Decimal> {
    let number = body
        .rates
        .get(to)
        .ok_or_else(|| AppError::ExchangeRateUnavailable(format!("no rate for {}", to)))?;
    let text = number.to_string();
    let rate = Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|_| AppError::ExchangeRateUnavailable(format!("unparseable rate {}", text)))?;
    if rate <= Decimal::ZERO {
        return Err(AppError::ExchangeRateUnavailable(format!(
            "non-positive rate {} for {}",
            rate, to
        )));
    }
    Ok(rate)
}

/// Caching decorator around any provider
pub struct CachedExchangeRates<P> {
    inner: P,
    ttl: Duration,
    entries: RwLock<HashMap<(String, String), (Decimal, Instant)>>,
}

impl<P: ExchangeRateProvider> CachedExchangeRates<P> {
    pub fn new(inner: P, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    async fn cached(&self, key: &(String, String)) -> Option<Decimal> {
        let entries = self.entries.read().await;
        entries
            .get(key)
            .filter(|(_, fetched_at)| fetched_at.elapsed() < self.ttl)
            .map(|(rate, _)| *rate)
    }
}

#[async_trait]
impl<P: ExchangeRateProvider> ExchangeRateProvider for CachedExchangeRates<P> {
    async fn rate(&self, from: &str, to: &str) -> AppResult<Decimal> {
        if from == to {
            return Ok(Decimal::ONE);
        }

        let key = (from.to_string(), to.to_string());
        if let Some(rate) = self.cached(&key).await {
            return Ok(rate);
        }

        // Failures are not cached
        let rate = self.inner.rate(from, to).await?;
        self.entries
            .write()
            .await
            .insert(key, (rate, Instant::now()));
        Ok(rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingProvider {
        fn new(fail: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail,
            }
        }
    }

    #[async_trait]
    impl ExchangeRateProvider for CountingProvider {
        async fn rate(&self, _from: &str, _to: &str) -> AppResult<Decimal> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(AppError::ExchangeRateUnavailable("down".into()))
            } else {
                Ok(Decimal::new(43, 1))
            }
        }
    }

    #[tokio::test]
    async fn cache_reuses_rate_within_ttl() {
        let provider = Arc::new(CountingProvider::new(false));
        let cache = CachedExchangeRates::new(provider.clone(), Duration::from_secs(60));

        assert_eq!(cache.rate("EUR", "PLN").await.unwrap(), Decimal::new(43, 1));
        assert_eq!(cache.rate("EUR", "PLN").await.unwrap(), Decimal::new(43, 1));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

        cache.rate("USD", "PLN").await.unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn expired_entries_are_refetched() {
        let provider = Arc::new(CountingProvider::new(false));
        let cache = CachedExchangeRates::new(provider.clone(), Duration::ZERO);

        cache.rate("EUR", "PLN").await.unwrap();
        cache.rate("EUR", "PLN").await.unwrap();
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn same_currency_skips_provider() {
        let provider = Arc::new(CountingProvider::new(true));
        let cache = CachedExchangeRates::new(provider.clone(), Duration::from_secs(60));

        assert_eq!(cache.rate("PLN", "PLN").await.unwrap(), Decimal::ONE);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let provider = Arc::new(CountingProvider::new(true));
        let cache = CachedExchangeRates::new(provider.clone(), Duration::from_secs(60));

        assert!(matches!(
            cache.rate("EUR", "PLN").await,
            Err(AppError::ExchangeRateUnavailable(_))
        ));
        assert!(cache.rate("EUR", "PLN").await.is_err());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn parses_frankfurter_body() {
        let body: LatestRatesResponse =
            serde_json::from_str(r#"{"amount":1.0,"base":"EUR","date":"2024-05-02","rates":{"PLN":4.3215}}"#)
                .unwrap();
        assert_eq!(parse_rate(&body, "PLN").unwrap(), Decimal::new(43215, 4));
        assert!(parse_rate(&body, "USD").is_err());
    }
}
