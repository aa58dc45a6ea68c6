//! Market quotes for `!btc`, `!mstr` and `!stock`.

use std::sync::Arc;
use std::time::Duration;

use ircord_core::ChannelLink;
use serde_json::Value;
use tracing::{info, warn};

use crate::context::BridgeContext;
use crate::error::{RelayError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    pub currency: String,
    pub previous_close: Option<f64>,
}

impl Quote {
    /// Change since the previous close, in percent.
    pub fn change_pct(&self) -> Option<f64> {
        self.previous_close
            .filter(|prev| *prev != 0.0)
            .map(|prev| (self.price - prev) / prev * 100.0)
    }

    /// `MSTR: 1234.56 USD (+1.23%)`
    pub fn render(&self) -> String {
        let mut line = format!("{}: {:.2} {}", self.symbol, self.price, self.currency);
        if let Some(pct) = self.change_pct() {
            line.push_str(&format!(" ({pct:+.2}%)"));
        }
        line
    }
}

/// Read a quote out of a chart endpoint response.
pub fn parse_chart(body: &Value) -> Result<Quote> {
    let meta = &body["chart"]["result"][0]["meta"];
    if meta.is_null() {
        let reason = body["chart"]["error"]["description"]
            .as_str()
            .unwrap_or("no chart result");
        return Err(RelayError::Parse(reason.to_string()));
    }
    let price = meta["regularMarketPrice"]
        .as_f64()
        .ok_or_else(|| RelayError::Parse("missing regularMarketPrice".into()))?;
    Ok(Quote {
        symbol: meta["symbol"].as_str().unwrap_or_default().to_string(),
        price,
        currency: meta["currency"].as_str().unwrap_or_default().to_string(),
        previous_close: meta["chartPreviousClose"]
            .as_f64()
            .or_else(|| meta["previousClose"].as_f64()),
    })
}

pub async fn fetch_quote(
    http: &reqwest::Client,
    base_url: &str,
    symbol: &str,
    timeout: Duration,
) -> Result<Quote> {
    let url = format!("{}/{symbol}", base_url.trim_end_matches('/'));
    let body: Value = http
        .get(&url)
        .timeout(timeout)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;
    let mut quote = parse_chart(&body)?;
    if quote.symbol.is_empty() {
        quote.symbol = symbol.to_string();
    }
    Ok(quote)
}

/// Fetch a quote in the background and post it on both sides of `link`.
pub fn announce(ctx: &Arc<BridgeContext>, symbol: &str, link: &ChannelLink) {
    let ctx = Arc::clone(ctx);
    let symbol = symbol.to_string();
    let link = link.clone();
    tokio::spawn(async move {
        let timeout = Duration::from_secs(ctx.config.market.timeout_secs);
        match fetch_quote(&ctx.http, &ctx.config.market.quote_url, &symbol, timeout).await {
            Ok(quote) => {
                info!(%symbol, price = quote.price, "market quote");
                let line = quote.render();
                ctx.say_on_irc(&link.irc, &line);
                ctx.say_on_discord(link.discord, &line);
            }
            Err(e) => warn!(%symbol, error = %e, "market quote failed"),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chart(price: f64, prev: f64) -> Value {
        json!({
            "chart": {
                "result": [{
                    "meta": {
                        "symbol": "MSTR",
                        "currency": "USD",
                        "regularMarketPrice": price,
                        "chartPreviousClose": prev
                    }
                }],
                "error": null
            }
        })
    }

    #[test]
    fn quote_renders_with_change() {
        let quote = parse_chart(&chart(110.0, 100.0)).unwrap();
        assert_eq!(quote.render(), "MSTR: 110.00 USD (+10.00%)");
        let quote = parse_chart(&chart(95.5, 100.0)).unwrap();
        assert_eq!(quote.render(), "MSTR: 95.50 USD (-4.50%)");
    }

    #[test]
    fn missing_previous_close_omits_change() {
        let body = json!({"chart": {"result": [{"meta": {
            "symbol": "BTC-USD", "currency": "USD", "regularMarketPrice": 64000.0
        }}]}});
        assert_eq!(parse_chart(&body).unwrap().render(), "BTC-USD: 64000.00 USD");
    }

    #[test]
    fn chart_error_is_reported() {
        let body = json!({"chart": {"result": null, "error": {
            "code": "Not Found", "description": "No data found, symbol may be delisted"
        }}});
        match parse_chart(&body) {
            Err(RelayError::Parse(reason)) => assert!(reason.contains("delisted")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
