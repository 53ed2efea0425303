//! Thin `ExchangeClient` adapter over a Binance-compatible klines REST
//! endpoint, built on the teacher's HTTP client + retry middleware pattern
//! (`infrastructure/core/http_client_factory.rs`).

use crate::domain::ports::ExchangeClient;
use crate::domain::time::RawTimestamp;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::time::Duration;

use crate::domain::candle::RawCandle;

const MAX_KLINES_PER_REQUEST: i64 = 1000;

pub struct HttpExchangeClient {
    client: ClientWithMiddleware,
    base_url: String,
}

impl HttpExchangeClient {
    pub fn new(base_url: String) -> Self {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);
        let client = Client::builder()
            .pool_max_idle_per_host(5)
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());
        let client = ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();
        Self { client, base_url }
    }
}

/// Maps our internal perpetual symbol convention onto the exchange's spot
/// symbol format (e.g. `BTC-PERPETUAL` -> `BTCUSDT`).
fn to_exchange_symbol(symbol: &str) -> String {
    symbol.split('-').next().unwrap_or(symbol).to_string() + "USDT"
}

fn to_interval(timeframe_min: i64) -> Result<&'static str> {
    match timeframe_min {
        1 => Ok("1m"),
        5 => Ok("5m"),
        15 => Ok("15m"),
        60 => Ok("1h"),
        _ => anyhow::bail!("unsupported timeframe_min {timeframe_min} for exchange adapter"),
    }
}

#[async_trait]
impl ExchangeClient for HttpExchangeClient {
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe_min: i64,
        start_ts: i64,
        end_ts: i64,
    ) -> Result<Vec<RawCandle>> {
        let interval = to_interval(timeframe_min)?;
        let exchange_symbol = to_exchange_symbol(symbol);

        let url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&startTime={}&endTime={}&limit={}",
            self.base_url, exchange_symbol, interval, start_ts, end_ts, MAX_KLINES_PER_REQUEST
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("failed to fetch klines from exchange")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("exchange klines request failed: {status} - {body}");
        }

        // Klines arrive as raw JSON arrays (not objects), so decoding into a
        // serde_json::Value array of arrays and mapping by index is simpler
        // and more robust to trailing fields than a tuple struct.
        let raw: Vec<Vec<serde_json::Value>> = response
            .json()
            .await
            .context("failed to decode klines response")?;

        let mut candles = Vec::with_capacity(raw.len());
        for row in raw {
            if row.len() < 6 {
                continue;
            }
            let open_time = row[0].as_i64().unwrap_or_default();
            let open = parse_decimal_field(&row[1]);
            let high = parse_decimal_field(&row[2]);
            let low = parse_decimal_field(&row[3]);
            let close = parse_decimal_field(&row[4]);
            let volume = parse_decimal_field(&row[5]);

            candles.push(RawCandle {
                ts: RawTimestamp::Number(open_time),
                open,
                high,
                low,
                close,
                volume,
            });
        }

        Ok(candles)
    }
}

fn parse_decimal_field(value: &serde_json::Value) -> Decimal {
    value
        .as_str()
        .and_then(|s| Decimal::from_str(s).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_perpetual_symbol_to_exchange_format() {
        assert_eq!(to_exchange_symbol("BTC-PERPETUAL"), "BTCUSDT");
    }

    #[test]
    fn rejects_unsupported_timeframe() {
        assert!(to_interval(7).is_err());
        assert_eq!(to_interval(60).unwrap(), "1h");
    }
}
