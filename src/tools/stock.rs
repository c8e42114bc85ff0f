//! Stock quote tool backed by Yahoo Finance.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{required_str, Tool, ToolError};

const MAX_SYMBOL_LEN: usize = 10;

/// Market fields for one ticker. Any field may be missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Quote {
    pub regular_market_price: Option<f64>,
    pub previous_close: Option<f64>,
    pub change: Option<f64>,
    pub change_percent: Option<f64>,
    pub volume: Option<f64>,
    pub market_cap: Option<f64>,
    pub trailing_pe: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub fifty_two_week_high: Option<f64>,
    pub fifty_two_week_low: Option<f64>,
}

impl Quote {
    /// Whether the provider reported a tradable price.
    pub fn has_price(&self) -> bool {
        self.regular_market_price.is_some()
    }
}

/// A source of stock quotes.
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Fetch a quote; `Ok(None)` means the provider knows nothing about `symbol`.
    async fn quote(&self, symbol: &str) -> anyhow::Result<Option<Quote>>;
}

/// Uppercase and trim a ticker, rejecting empty or overlong input.
pub fn normalize_symbol(raw: &str) -> Result<String, String> {
    let symbol = raw.trim().to_uppercase();
    let valid_chars = symbol
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '='));
    if symbol.is_empty() || symbol.len() > MAX_SYMBOL_LEN || !valid_chars {
        return Err(format!("Invalid stock symbol: {}", symbol));
    }
    Ok(symbol)
}

fn price(value: Option<f64>) -> String {
    value
        .map(|v| format!("${:.2}", v))
        .unwrap_or_else(|| "N/A".to_string())
}

fn decimal(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.2}", v))
        .unwrap_or_else(|| "N/A".to_string())
}

/// Format an integer-valued amount with thousands separators.
fn grouped(value: f64) -> String {
    let digits = (value.round().abs() as u64).to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if value < 0.0 {
        out.insert(0, '-');
    }
    out
}

/// Render the fixed-layout report for `symbol`.
pub fn render_report(symbol: &str, quote: &Quote) -> String {
    let mut report = format!("Stock: {}\n", symbol);
    report.push_str(&format!("Price: {}\n", price(quote.regular_market_price)));
    report.push_str(&format!("Previous Close: {}\n", price(quote.previous_close)));
    report.push_str(&format!("Change: {}\n", decimal(quote.change)));
    report.push_str(&format!(
        "Change %: {}\n",
        quote
            .change_percent
            .map(|v| format!("{:.2}%", v))
            .unwrap_or_else(|| "N/A".to_string())
    ));
    report.push_str(&format!(
        "Volume: {}\n",
        quote.volume.map(grouped).unwrap_or_else(|| "N/A".to_string())
    ));
    report.push_str(&format!(
        "Market Cap: {}\n",
        quote
            .market_cap
            .map(|v| format!("${}", grouped(v)))
            .unwrap_or_else(|| "N/A".to_string())
    ));
    report.push_str(&format!("P/E Ratio: {}\n", decimal(quote.trailing_pe)));
    report.push_str(&format!("Dividend Yield: {}\n", decimal(quote.dividend_yield)));
    report.push_str(&format!("52 Week High: {}\n", price(quote.fifty_two_week_high)));
    report.push_str(&format!("52 Week Low: {}\n", price(quote.fifty_two_week_low)));
    report
}

/// Yahoo Finance quote client.
///
/// Uses the v7 quote endpoint and falls back to the v8 chart endpoint when
/// the former refuses the request (it often demands a session crumb).
pub struct YahooFinance {
    client: reqwest::Client,
    base_url: String,
}

impl YahooFinance {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (compatible; ToolAgent/1.0)")
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// `Ok(None)` when the endpoint is unavailable and the caller should fall back.
    async fn quote_v7(&self, symbol: &str) -> anyhow::Result<Option<Option<Quote>>> {
        let url = format!(
            "{}/v7/finance/quote?symbols={}",
            self.base_url,
            urlencoding::encode(symbol)
        );
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::debug!("Quote endpoint returned {} for {}, falling back", status, symbol);
            return Ok(None);
        }

        let body: V7Response = response.json().await.context("Malformed quote response")?;
        let quote = body.quote_response.result.into_iter().next().map(|q| Quote {
            regular_market_price: q.regular_market_price,
            previous_close: q.regular_market_previous_close,
            change: q.regular_market_change,
            change_percent: q.regular_market_change_percent,
            volume: q.regular_market_volume,
            market_cap: q.market_cap,
            trailing_pe: q.trailing_pe,
            dividend_yield: q.dividend_yield.or(q.trailing_annual_dividend_yield),
            fifty_two_week_high: q.fifty_two_week_high,
            fifty_two_week_low: q.fifty_two_week_low,
        });
        Ok(Some(quote))
    }

    async fn quote_v8(&self, symbol: &str) -> anyhow::Result<Option<Quote>> {
        let url = format!(
            "{}/v8/finance/chart/{}?range=1d&interval=1d",
            self.base_url,
            urlencoding::encode(symbol)
        );
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(anyhow::anyhow!("HTTP error: {}", status));
        }

        let body: V8Response = response.json().await.context("Malformed chart response")?;
        let meta = match body.chart.result.and_then(|r| r.into_iter().next()) {
            Some(result) => result.meta,
            None => return Ok(None),
        };

        let previous_close = meta.previous_close.or(meta.chart_previous_close);
        let (change, change_percent) = match (meta.regular_market_price, previous_close) {
            (Some(p), Some(prev)) if prev != 0.0 => (Some(p - prev), Some((p - prev) / prev * 100.0)),
            _ => (None, None),
        };

        Ok(Some(Quote {
            regular_market_price: meta.regular_market_price,
            previous_close,
            change,
            change_percent,
            volume: meta.regular_market_volume,
            market_cap: None,
            trailing_pe: None,
            dividend_yield: None,
            fifty_two_week_high: meta.fifty_two_week_high,
            fifty_two_week_low: meta.fifty_two_week_low,
        }))
    }
}

#[async_trait]
impl MarketData for YahooFinance {
    async fn quote(&self, symbol: &str) -> anyhow::Result<Option<Quote>> {
        match self.quote_v7(symbol).await? {
            Some(quote) => Ok(quote),
            None => self.quote_v8(symbol).await,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct V7Response {
    quote_response: V7Result,
}

#[derive(Deserialize)]
struct V7Result {
    #[serde(default)]
    result: Vec<V7Quote>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct V7Quote {
    regular_market_price: Option<f64>,
    regular_market_previous_close: Option<f64>,
    regular_market_change: Option<f64>,
    regular_market_change_percent: Option<f64>,
    regular_market_volume: Option<f64>,
    market_cap: Option<f64>,
    #[serde(rename = "trailingPE")]
    trailing_pe: Option<f64>,
    dividend_yield: Option<f64>,
    trailing_annual_dividend_yield: Option<f64>,
    fifty_two_week_high: Option<f64>,
    fifty_two_week_low: Option<f64>,
}

#[derive(Deserialize)]
struct V8Response {
    chart: V8Chart,
}

#[derive(Deserialize)]
struct V8Chart {
    result: Option<Vec<V8Result>>,
}

#[derive(Deserialize)]
struct V8Result {
    meta: V8Meta,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct V8Meta {
    regular_market_price: Option<f64>,
    previous_close: Option<f64>,
    chart_previous_close: Option<f64>,
    regular_market_volume: Option<f64>,
    fifty_two_week_high: Option<f64>,
    fifty_two_week_low: Option<f64>,
}

/// Look up current market data for a ticker.
pub struct GetStockData {
    provider: Arc<dyn MarketData>,
}

impl GetStockData {
    pub fn new(provider: Arc<dyn MarketData>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Tool for GetStockData {
    fn name(&self) -> &str {
        "get_stock_data"
    }

    fn description(&self) -> &str {
        "Get real-time stock data from Yahoo Finance: price, previous close, change, volume, market cap, P/E ratio, dividend yield and 52-week range."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "symbol": {
                    "type": "string",
                    "description": "Ticker symbol, e.g. AAPL or TSLA"
                }
            },
            "required": ["symbol"]
        })
    }

    async fn execute(&self, args: &Map<String, Value>) -> Result<String, ToolError> {
        let raw = required_str(self.name(), args, "symbol")?;
        let symbol = match normalize_symbol(raw) {
            Ok(s) => s,
            Err(message) => return Ok(message),
        };

        let quote = self
            .provider
            .quote(&symbol)
            .await
            .map_err(|e| ToolError::failed("getting stock data", format!("{:#}", e)))?;

        match quote {
            Some(quote) if quote.has_price() => Ok(render_report(&symbol, &quote)),
            _ => Ok(format!(
                "No data found for stock symbol: {}. Please verify the symbol is correct.",
                symbol
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::spawn_stub;
    use axum::{extract::Path, http::StatusCode, routing::get, Json, Router};
    use serde_json::json;

    struct Fixed(Option<Quote>);

    #[async_trait]
    impl MarketData for Fixed {
        async fn quote(&self, _symbol: &str) -> anyhow::Result<Option<Quote>> {
            Ok(self.0.clone())
        }
    }

    struct Broken;

    #[async_trait]
    impl MarketData for Broken {
        async fn quote(&self, _symbol: &str) -> anyhow::Result<Option<Quote>> {
            Err(anyhow::anyhow!("connection refused"))
        }
    }

    fn args(symbol: &str) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("symbol".to_string(), json!(symbol));
        map
    }

    fn full_quote() -> Quote {
        Quote {
            regular_market_price: Some(189.84),
            previous_close: Some(187.5),
            change: Some(2.34),
            change_percent: Some(1.248),
            volume: Some(52_164_500.0),
            market_cap: Some(2_950_000_000_000.0),
            trailing_pe: Some(29.514),
            dividend_yield: Some(0.51),
            fifty_two_week_high: Some(199.62),
            fifty_two_week_low: Some(164.08),
        }
    }

    #[test]
    fn normalizes_symbols() {
        assert_eq!(normalize_symbol("  aapl ").unwrap(), "AAPL");
        assert_eq!(normalize_symbol("brk.b").unwrap(), "BRK.B");
        assert_eq!(
            normalize_symbol("").unwrap_err(),
            "Invalid stock symbol: "
        );
        assert!(normalize_symbol("ABCDEFGHIJK").is_err());
        assert!(normalize_symbol("AA PL").is_err());
    }

    #[test]
    fn renders_full_report() {
        let report = render_report("AAPL", &full_quote());
        assert_eq!(
            report,
            "Stock: AAPL\n\
             Price: $189.84\n\
             Previous Close: $187.50\n\
             Change: 2.34\n\
             Change %: 1.25%\n\
             Volume: 52,164,500\n\
             Market Cap: $2,950,000,000,000\n\
             P/E Ratio: 29.51\n\
             Dividend Yield: 0.51\n\
             52 Week High: $199.62\n\
             52 Week Low: $164.08\n"
        );
    }

    #[test]
    fn missing_fields_render_as_na() {
        let quote = Quote {
            regular_market_price: Some(10.0),
            ..Quote::default()
        };
        let report = render_report("XYZ", &quote);
        assert!(report.contains("Price: $10.00\n"));
        assert!(report.contains("Volume: N/A\n"));
        assert!(report.contains("Market Cap: N/A\n"));
        assert!(report.contains("P/E Ratio: N/A\n"));
        assert!(report.contains("52 Week Low: N/A\n"));
    }

    #[test]
    fn groups_thousands() {
        assert_eq!(grouped(0.0), "0");
        assert_eq!(grouped(999.0), "999");
        assert_eq!(grouped(1000.0), "1,000");
        assert_eq!(grouped(1_234_567.0), "1,234,567");
    }

    #[tokio::test]
    async fn invalid_symbol_is_reported_not_raised() {
        let tool = GetStockData::new(Arc::new(Fixed(Some(full_quote()))));
        let output = tool.execute(&args("WAYTOOLONGSYMBOL")).await.unwrap();
        assert!(output.contains("Invalid stock symbol"), "{}", output);
    }

    #[tokio::test]
    async fn unknown_symbol_reports_no_data() {
        let tool = GetStockData::new(Arc::new(Fixed(None)));
        let output = tool.execute(&args("zzzz")).await.unwrap();
        assert_eq!(
            output,
            "No data found for stock symbol: ZZZZ. Please verify the symbol is correct."
        );

        let tool = GetStockData::new(Arc::new(Fixed(Some(Quote::default()))));
        let output = tool.execute(&args("zzzz")).await.unwrap();
        assert!(output.contains("No data found"));
    }

    #[tokio::test]
    async fn provider_failure_is_an_error_string() {
        let tool = GetStockData::new(Arc::new(Broken));
        let err = tool.execute(&args("AAPL")).await.unwrap_err();
        assert_eq!(err.to_string(), "Error getting stock data: connection refused");
    }

    #[tokio::test]
    async fn yahoo_quote_endpoint_is_parsed() {
        let router = Router::new().route(
            "/v7/finance/quote",
            get(|| async {
                Json(json!({
                    "quoteResponse": {
                        "result": [{
                            "symbol": "AAPL",
                            "regularMarketPrice": 189.84,
                            "regularMarketPreviousClose": 187.5,
                            "regularMarketVolume": 1000,
                            "marketCap": 2950000000000u64,
                            "trailingPE": 29.5,
                            "trailingAnnualDividendYield": 0.005
                        }],
                        "error": null
                    }
                }))
            }),
        );
        let base = spawn_stub(router).await;

        let quote = YahooFinance::new(&base)
            .unwrap()
            .quote("AAPL")
            .await
            .unwrap()
            .expect("quote");
        assert_eq!(quote.regular_market_price, Some(189.84));
        assert_eq!(quote.volume, Some(1000.0));
        assert_eq!(quote.trailing_pe, Some(29.5));
        assert_eq!(quote.dividend_yield, Some(0.005));
        assert_eq!(quote.change, None);
    }

    #[tokio::test]
    async fn yahoo_falls_back_to_chart_endpoint() {
        let router = Router::new()
            .route(
                "/v7/finance/quote",
                get(|| async { (StatusCode::UNAUTHORIZED, "Invalid Crumb") }),
            )
            .route(
                "/v8/finance/chart/:symbol",
                get(|Path(symbol): Path<String>| async move {
                    if symbol != "TSLA" {
                        return (StatusCode::NOT_FOUND, Json(json!({"chart": {"result": null}})));
                    }
                    (
                        StatusCode::OK,
                        Json(json!({
                            "chart": {
                                "result": [{
                                    "meta": {
                                        "regularMarketPrice": 110.0,
                                        "chartPreviousClose": 100.0,
                                        "regularMarketVolume": 5000,
                                        "fiftyTwoWeekHigh": 300.0
                                    }
                                }]
                            }
                        })),
                    )
                }),
            );
        let base = spawn_stub(router).await;
        let yahoo = YahooFinance::new(&base).unwrap();

        let quote = yahoo.quote("TSLA").await.unwrap().expect("quote");
        assert_eq!(quote.previous_close, Some(100.0));
        assert_eq!(quote.change, Some(10.0));
        assert_eq!(quote.change_percent, Some(10.0));
        assert_eq!(quote.fifty_two_week_high, Some(300.0));

        assert_eq!(yahoo.quote("NOPE").await.unwrap(), None);
    }
}
