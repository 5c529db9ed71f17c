use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use crate::domain::{
    LiveQuote, LiveSeries, LiveSeriesPoint, MarketDate, SeriesElement, Symbol, TimeInterval,
};
use crate::http_client::{HttpClient, HttpRequest, ReqwestHttpClient};

use super::{FeedError, FeedGateway, SymbolResult};

const QUERY_URL: &str = "https://www.alphavantage.co/query";

/// Series history is truncated this many years back; older vendor entries
/// map to the cutoff marker.
const OLDEST_YEAR_LOOKBACK: i32 = 5;

/// Alpha Vantage feed adapter.
///
/// The vendor answers every function with a `Meta Data` header plus a
/// time-ordered map of stamp -> numbered OHLCV fields, or an `Error Message`
/// field. All prices and volumes arrive as decimal strings.
pub struct AlphaVantageFeed {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    api_key: String,
    oldest_year: i32,
}

impl Default for AlphaVantageFeed {
    fn default() -> Self {
        Self::with_http_client(Arc::new(ReqwestHttpClient::new()))
    }
}

impl AlphaVantageFeed {
    pub fn with_http_client(http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            http_client,
            base_url: String::from(QUERY_URL),
            api_key: std::env::var("TICKVAULT_ALPHAVANTAGE_API_KEY")
                .unwrap_or_else(|_| String::from("demo")),
            oldest_year: time::OffsetDateTime::now_utc().year() - OLDEST_YEAR_LOOKBACK,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn with_oldest_year(mut self, oldest_year: i32) -> Self {
        self.oldest_year = oldest_year;
        self
    }

    fn request_payload(
        &self,
        function: &str,
        symbol: &Symbol,
        interval: Option<&str>,
    ) -> Result<Value, FeedError> {
        let mut url = format!(
            "{}?function={}&symbol={}&apikey={}",
            self.base_url,
            function,
            urlencoding::encode(symbol.as_str()),
            urlencoding::encode(self.api_key.as_str()),
        );
        if let Some(interval) = interval {
            url.push_str("&interval=");
            url.push_str(interval);
        }

        let response = self
            .http_client
            .execute(&HttpRequest::get(url))
            .map_err(|error| FeedError::Connection(error.to_string()))?;
        if !response.is_success() {
            return Err(FeedError::Connection(format!(
                "vendor returned status {}",
                response.status
            )));
        }

        let payload: Value = serde_json::from_str(&response.body)
            .map_err(|error| FeedError::Parse(error.to_string()))?;

        if let Some(message) = payload.get("Error Message").and_then(Value::as_str) {
            return Err(FeedError::Vendor(message.to_owned()));
        }
        if payload.as_object().map_or(true, Map::is_empty) {
            return Err(FeedError::Empty);
        }

        Ok(payload)
    }

    fn quote_for(&self, symbol: &Symbol) -> Result<LiveQuote, FeedError> {
        let payload = self.request_payload("TIME_SERIES_INTRADAY", symbol, Some("1min"))?;
        let ticks = series_object(&payload, "Time Series (1min)")?;
        // Stamp keys sort lexicographically, which for this format is
        // chronological; the last entry is the latest tick.
        let (stamp, fields) = ticks.iter().next_back().ok_or(FeedError::Empty)?;
        let date =
            MarketDate::parse_vendor_stamp(stamp).map_err(|error| FeedError::Parse(error.to_string()))?;
        snapshot_from_fields(symbol, date, fields)
    }

    fn index_value_for(&self, symbol: &Symbol) -> Result<LiveQuote, FeedError> {
        let payload = self.request_payload("TIME_SERIES_DAILY", symbol, None)?;
        let days = series_object(&payload, "Time Series (Daily)")?;
        let (stamp, fields) = days.iter().next_back().ok_or(FeedError::Empty)?;
        let date =
            MarketDate::parse(stamp).map_err(|error| FeedError::Parse(error.to_string()))?;
        snapshot_from_fields(symbol, date, fields)
    }

    fn series_for(&self, symbol: &Symbol) -> Result<LiveSeries, FeedError> {
        let payload = self.request_payload("TIME_SERIES_MONTHLY_ADJUSTED", symbol, None)?;
        let months = series_object(&payload, "Monthly Adjusted Time Series")?;

        let mut elements = Vec::new();
        for (stamp, fields) in months.iter().rev() {
            let date =
                MarketDate::parse(stamp).map_err(|error| FeedError::Parse(error.to_string()))?;
            if date.year() < self.oldest_year {
                elements.push(SeriesElement::Cutoff);
                break;
            }
            elements.push(SeriesElement::Point(LiveSeriesPoint {
                symbol: symbol.clone(),
                interval: Some(TimeInterval::Monthly),
                date,
                open: decimal_field(fields, "1. open")?,
                high: decimal_field(fields, "2. high")?,
                low: decimal_field(fields, "3. low")?,
                close: decimal_field(fields, "4. close")?,
                adjusted_close: decimal_field(fields, "5. adjusted close")?,
                volume: decimal_field(fields, "6. volume")?,
                dividend_amount: decimal_field(fields, "7. dividend amount")?,
            }));
        }

        if elements.is_empty() {
            return Err(FeedError::Empty);
        }
        Ok(LiveSeries::new(symbol.clone(), elements))
    }
}

impl FeedGateway for AlphaVantageFeed {
    fn fetch_quotes(&self, symbols: &[Symbol]) -> Vec<SymbolResult<LiveQuote>> {
        symbols
            .iter()
            .map(|symbol| {
                debug!(symbol = %symbol, "price fetch begin");
                let outcome = self.quote_for(symbol);
                debug!(symbol = %symbol, ok = outcome.is_ok(), "price fetch end");
                (symbol.clone(), outcome)
            })
            .collect()
    }

    fn fetch_index_values(&self, symbols: &[Symbol]) -> Vec<SymbolResult<LiveQuote>> {
        symbols
            .iter()
            .map(|symbol| (symbol.clone(), self.index_value_for(symbol)))
            .collect()
    }

    fn fetch_series(&self, symbols: &[Symbol]) -> Vec<SymbolResult<LiveSeries>> {
        symbols
            .iter()
            .map(|symbol| (symbol.clone(), self.series_for(symbol)))
            .collect()
    }
}

fn series_object<'a>(payload: &'a Value, key: &str) -> Result<&'a Map<String, Value>, FeedError> {
    let object = payload.get(key).and_then(Value::as_object).ok_or(FeedError::Empty)?;
    if object.is_empty() {
        return Err(FeedError::Empty);
    }
    Ok(object)
}

fn snapshot_from_fields(
    symbol: &Symbol,
    date: MarketDate,
    fields: &Value,
) -> Result<LiveQuote, FeedError> {
    LiveQuote::new(
        symbol.clone(),
        date,
        decimal_field(fields, "1. open")?,
        decimal_field(fields, "2. high")?,
        decimal_field(fields, "3. low")?,
        decimal_field(fields, "4. close")?,
        decimal_field(fields, "5. volume")?,
    )
    .map_err(|error| FeedError::Parse(error.to_string()))
}

fn decimal_field(fields: &Value, key: &str) -> Result<Option<f64>, FeedError> {
    let Some(raw) = fields.get(key).and_then(Value::as_str) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<f64>()
        .map(Some)
        .map_err(|_| FeedError::Parse(format!("non-decimal value '{raw}' for '{key}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::{HttpError, HttpResponse};
    use std::sync::Mutex;

    struct ScriptedHttpClient {
        response: Result<HttpResponse, HttpError>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedHttpClient {
        fn with_body(body: &str) -> Self {
            Self {
                response: Ok(HttpResponse::ok_json(body)),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                response: Err(HttpError::new(message)),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn recorded_urls(&self) -> Vec<String> {
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .iter()
                .map(|request| request.url.clone())
                .collect()
        }
    }

    impl HttpClient for ScriptedHttpClient {
        fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, HttpError> {
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .push(request.clone());
            self.response.clone()
        }
    }

    fn feed_with_body(body: &str) -> (Arc<ScriptedHttpClient>, AlphaVantageFeed) {
        let client = Arc::new(ScriptedHttpClient::with_body(body));
        let feed = AlphaVantageFeed::with_http_client(client.clone()).with_api_key("alpha-key");
        (client, feed)
    }

    fn symbol(input: &str) -> Symbol {
        Symbol::parse(input).expect("valid symbol")
    }

    const INTRADAY_BODY: &str = r#"{
        "Meta Data": {
            "1. Information": "Intraday (1min) prices and volumes",
            "2. Symbol": "MSFT",
            "3. Last Refreshed": "2017-10-20 16:00:00",
            "4. Interval": "1min"
        },
        "Time Series (1min)": {
            "2017-10-20 15:59:00": {
                "1. open": "78.7000",
                "2. high": "78.7200",
                "3. low": "78.6900",
                "4. close": "78.7000",
                "5. volume": "320215"
            },
            "2017-10-20 16:00:00": {
                "1. open": "78.7000",
                "2. high": "78.8100",
                "3. low": "78.6950",
                "4. close": "78.8100",
                "5. volume": "2663315"
            }
        }
    }"#;

    #[test]
    fn quote_parses_decimal_fields_from_latest_tick() {
        let (_, feed) = feed_with_body(INTRADAY_BODY);
        let results = feed.fetch_quotes(&[symbol("MSFT")]);
        assert_eq!(results.len(), 1);

        let quote = results[0].1.as_ref().expect("quote should parse");
        assert_eq!(quote.date.expect("date").format_iso(), "2017-10-20");
        assert_eq!(quote.open, Some(78.70));
        assert_eq!(quote.close, Some(78.81));
        assert_eq!(quote.volume, Some(2_663_315.0));
        assert!(!quote.is_error_placeholder());
    }

    #[test]
    fn request_url_carries_api_key_and_encoded_symbol() {
        let (client, feed) = feed_with_body(INTRADAY_BODY);
        let _ = feed.fetch_index_values(&[symbol("^DJI")]);

        let urls = client.recorded_urls();
        assert_eq!(urls.len(), 1);
        assert!(urls[0].contains("apikey=alpha-key"));
        assert!(urls[0].contains("symbol=%5EDJI"));
        assert!(urls[0].contains("function=TIME_SERIES_DAILY"));
    }

    #[test]
    fn vendor_error_message_maps_to_vendor_failure() {
        let (_, feed) = feed_with_body(r#"{"Error Message": "Invalid API call."}"#);
        let results = feed.fetch_quotes(&[symbol("ZZZ")]);
        assert_eq!(
            results[0].1,
            Err(FeedError::Vendor(String::from("Invalid API call.")))
        );
    }

    #[test]
    fn empty_payload_maps_to_empty_failure() {
        let (_, feed) = feed_with_body("{}");
        let results = feed.fetch_quotes(&[symbol("AAPL")]);
        assert_eq!(results[0].1, Err(FeedError::Empty));
    }

    #[test]
    fn missing_series_object_maps_to_empty_failure() {
        let (_, feed) = feed_with_body(r#"{"Meta Data": {"2. Symbol": "AAPL"}}"#);
        let results = feed.fetch_series(&[symbol("AAPL")]);
        assert_eq!(results[0].1, Err(FeedError::Empty));
    }

    #[test]
    fn malformed_body_maps_to_parse_failure() {
        let (_, feed) = feed_with_body("<html>rate limited</html>");
        let results = feed.fetch_quotes(&[symbol("AAPL")]);
        assert!(matches!(results[0].1, Err(FeedError::Parse(_))));
    }

    #[test]
    fn transport_error_maps_to_connection_failure() {
        let client = Arc::new(ScriptedHttpClient::failing("connection refused"));
        let feed = AlphaVantageFeed::with_http_client(client);
        let results = feed.fetch_quotes(&[symbol("AAPL"), symbol("MSFT")]);
        assert_eq!(results.len(), 2);
        for (_, outcome) in results {
            assert!(matches!(outcome, Err(FeedError::Connection(_))));
        }
    }

    #[test]
    fn series_truncates_at_oldest_year_with_cutoff_marker() {
        let body = r#"{
            "Meta Data": {"2. Symbol": "AAPL"},
            "Monthly Adjusted Time Series": {
                "2019-12-31": {
                    "1. open": "60.0", "2. high": "65.0", "3. low": "58.0",
                    "4. close": "64.0", "5. adjusted close": "63.1",
                    "6. volume": "1000", "7. dividend amount": "0.00"
                },
                "2024-02-29": {
                    "1. open": "180.0", "2. high": "185.0", "3. low": "178.0",
                    "4. close": "184.0", "5. adjusted close": "184.0",
                    "6. volume": "2000", "7. dividend amount": "0.24"
                },
                "2024-03-28": {
                    "1. open": "184.0", "2. high": "190.0", "3. low": "182.0",
                    "4. close": "188.5", "5. adjusted close": "188.5",
                    "6. volume": "2500", "7. dividend amount": "0.00"
                }
            }
        }"#;
        let (_, feed) = feed_with_body(body);
        let feed = feed.with_oldest_year(2020);

        let results = feed.fetch_series(&[symbol("AAPL")]);
        let series = results[0].1.as_ref().expect("series should parse");

        // Newest first, then the cutoff where 2019 falls out of the window.
        assert_eq!(series.elements.len(), 3);
        match &series.elements[0] {
            SeriesElement::Point(point) => {
                assert_eq!(point.date.format_iso(), "2024-03-28");
                assert_eq!(point.adjusted_close, Some(188.5));
                assert_eq!(point.interval, Some(TimeInterval::Monthly));
            }
            SeriesElement::Cutoff => panic!("first element should be a point"),
        }
        assert_eq!(series.elements[2], SeriesElement::Cutoff);
        assert_eq!(series.points().count(), 2);
    }

    #[test]
    fn non_decimal_price_maps_to_parse_failure() {
        let body = r#"{
            "Meta Data": {"2. Symbol": "AAPL"},
            "Time Series (1min)": {
                "2017-10-20 16:00:00": {
                    "1. open": "not-a-number",
                    "2. high": "78.81",
                    "3. low": "78.69",
                    "4. close": "78.81",
                    "5. volume": "2663315"
                }
            }
        }"#;
        let (_, feed) = feed_with_body(body);
        let results = feed.fetch_quotes(&[symbol("AAPL")]);
        assert!(matches!(results[0].1, Err(FeedError::Parse(_))));
    }
}
