//! Primary CPI source: a time series API answering with
//! `{"data": [[date, value], ...]}` and supporting conditional requests.

use crate::core::error::FetchError;
use crate::core::month::MonthKey;
use crate::core::source::{FetchOutcome, PrimarySource, RateRow, ValueKind, Validators};
use crate::providers::util::{HttpOptions, build_client, decimal_from_json, with_retry};
use anyhow::Result;
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{ETAG, HeaderMap, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

#[derive(Debug, Deserialize)]
struct SeriesResponse {
    data: Vec<Vec<Value>>,
}

pub struct SeriesApiProvider {
    url: String,
    value_kind: ValueKind,
    client: reqwest::Client,
    options: HttpOptions,
}

impl SeriesApiProvider {
    pub fn new(url: &str, value_kind: ValueKind, options: HttpOptions) -> Result<Self> {
        Ok(SeriesApiProvider {
            url: url.to_string(),
            value_kind,
            client: build_client(&options)?,
            options,
        })
    }
}

fn header_value(headers: &HeaderMap, name: reqwest::header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Parses a series body into rows sorted by month, last occurrence winning.
pub fn parse_series_body(body: &str, value_kind: ValueKind) -> Result<Vec<RateRow>, FetchError> {
    let response: SeriesResponse = serde_json::from_str(body)
        .map_err(|e| FetchError::InvalidResponse(format!("unexpected series payload: {e}")))?;

    let mut points: BTreeMap<MonthKey, Decimal> = BTreeMap::new();
    for pair in &response.data {
        let [date, value, ..] = pair.as_slice() else {
            continue;
        };
        let Some(month) = date.as_str().and_then(MonthKey::from_date_prefix) else {
            debug!("Skipping series row with unusable date: {:?}", date);
            continue;
        };
        if let Some(value) = decimal_from_json(value) {
            points.insert(month, value);
        }
    }

    let rows: Vec<RateRow> = match value_kind {
        ValueKind::Variation => points
            .into_iter()
            .map(|(month, proportion)| RateRow::new(month, proportion))
            .collect(),
        ValueKind::Index => variations_from_index(&points),
    };

    if rows.is_empty() {
        return Err(FetchError::InvalidResponse(
            "series contains no usable rows".to_string(),
        ));
    }
    Ok(rows)
}

/// Monthly change from consecutive index levels. A month is skipped when the
/// previous month is absent or not positive, or the ratio does not fit a `Decimal`.
fn variations_from_index(points: &BTreeMap<MonthKey, Decimal>) -> Vec<RateRow> {
    points
        .iter()
        .filter_map(|(month, index)| {
            let previous = points.get(&month.add_months(-1))?;
            if previous.is_sign_negative() || previous.is_zero() {
                return None;
            }
            let ratio = index.checked_div(*previous)?;
            Some(RateRow::new(*month, ratio.checked_sub(Decimal::ONE)?))
        })
        .collect()
}

#[async_trait]
impl PrimarySource for SeriesApiProvider {
    fn source(&self) -> &str {
        &self.url
    }

    #[instrument(name = "SeriesApiFetch", skip(self, validators))]
    async fn fetch(&self, validators: &Validators) -> Result<FetchOutcome, FetchError> {
        debug!("Requesting CPI series from {}", self.url);

        let response = with_retry(
            || {
                let mut request = self.client.get(&self.url);
                if let Some(etag) = &validators.etag {
                    request = request.header(IF_NONE_MATCH, etag);
                }
                if let Some(last_modified) = &validators.last_modified {
                    request = request.header(IF_MODIFIED_SINCE, last_modified);
                }
                request.send()
            },
            self.options.retries,
            self.options.retry_delay,
        )
        .await?;

        if response.status() == StatusCode::NOT_MODIFIED {
            debug!("CPI series not modified since last fetch");
            return Ok(FetchOutcome::NotModified);
        }

        let response = response.error_for_status()?;
        let fresh = Validators {
            etag: header_value(response.headers(), ETAG),
            last_modified: header_value(response.headers(), LAST_MODIFIED),
        };
        let body = response.text().await?;
        let rows = parse_series_body(&body, self.value_kind)?;
        debug!(
            "Parsed {} CPI rows, latest {:?}",
            rows.len(),
            rows.last().map(|r| r.month)
        );

        Ok(FetchOutcome::Updated {
            rows,
            validators: fresh,
        })
    }
}
