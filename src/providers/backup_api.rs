//! Backup CPI source answering with a flat list of `{"fecha": ..., "valor": ...}`.
//!
//! Always fetched unconditionally; it is only consulted when the primary
//! source fails or lacks months.

use crate::core::error::FetchError;
use crate::core::month::MonthKey;
use crate::core::source::{BackupSource, RateRow, ValueUnit};
use crate::providers::util::{HttpOptions, build_client, decimal_from_json, with_retry};
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

#[derive(Debug, Deserialize)]
struct BackupPoint {
    fecha: Value,
    valor: Value,
}

pub struct BackupApiProvider {
    url: String,
    unit: ValueUnit,
    client: reqwest::Client,
    options: HttpOptions,
}

impl BackupApiProvider {
    pub fn new(url: &str, unit: ValueUnit, options: HttpOptions) -> Result<Self> {
        Ok(BackupApiProvider {
            url: url.to_string(),
            unit,
            client: build_client(&options)?,
            options,
        })
    }
}

/// Parses a backup body into rows sorted by month, last occurrence winning.
pub fn parse_backup_body(body: &str, unit: ValueUnit) -> Result<Vec<RateRow>, FetchError> {
    let points: Vec<BackupPoint> = serde_json::from_str(body)
        .map_err(|e| FetchError::InvalidResponse(format!("unexpected backup payload: {e}")))?;

    let mut rows: BTreeMap<MonthKey, Decimal> = BTreeMap::new();
    for point in &points {
        let Some(month) = point.fecha.as_str().and_then(MonthKey::from_date_prefix) else {
            continue;
        };
        let Some(value) = decimal_from_json(&point.valor) else {
            continue;
        };
        let proportion = match unit {
            ValueUnit::Percent => value / Decimal::ONE_HUNDRED,
            ValueUnit::Fraction => value,
        };
        rows.insert(month, proportion);
    }

    if rows.is_empty() {
        return Err(FetchError::InvalidResponse(
            "backup contains no usable rows".to_string(),
        ));
    }
    Ok(rows
        .into_iter()
        .map(|(month, proportion)| RateRow::new(month, proportion))
        .collect())
}

#[async_trait]
impl BackupSource for BackupApiProvider {
    fn source(&self) -> &str {
        &self.url
    }

    #[instrument(name = "BackupApiFetch", skip(self))]
    async fn fetch_all(&self) -> Result<Vec<RateRow>, FetchError> {
        debug!("Requesting backup CPI data from {}", self.url);

        let response = with_retry(
            || self.client.get(&self.url).send(),
            self.options.retries,
            self.options.retry_delay,
        )
        .await?
        .error_for_status()?;

        let body = response.text().await?;
        let rows = parse_backup_body(&body, self.unit)?;
        debug!("Parsed {} backup CPI rows", rows.len());
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn m(s: &str) -> MonthKey {
        s.parse().unwrap()
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    async fn create_backup_mock_server(body: &str, status_code: u16) -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/inflacion"))
            .respond_with(ResponseTemplate::new(status_code).set_body_string(body))
            .mount(&mock_server)
            .await;
        mock_server
    }

    fn provider(server: &MockServer, unit: ValueUnit) -> BackupApiProvider {
        let options = HttpOptions {
            timeout: Duration::from_secs(5),
            retries: 0,
            retry_delay: Duration::from_millis(10),
        };
        BackupApiProvider::new(&format!("{}/inflacion", server.uri()), unit, options).unwrap()
    }

    #[test]
    fn test_parse_percent_values() {
        let body = r#"[
            {"fecha": "2024-05-31", "valor": 4.2},
            {"fecha": "2024-06-30", "valor": "4.6"},
            {"fecha": "2024-06", "valor": "4.55"},
            {"fecha": "junio", "valor": 1},
            {"fecha": "2024-07-31", "valor": null}
        ]"#;
        let rows = parse_backup_body(body, ValueUnit::Percent).unwrap();
        assert_eq!(
            rows,
            vec![
                RateRow::new(m("2024-05"), dec("0.042")),
                RateRow::new(m("2024-06"), dec("0.0455")),
            ]
        );
    }

    #[test]
    fn test_parse_fraction_values_and_bad_shapes() {
        let rows =
            parse_backup_body(r#"[{"fecha": "2024-06-30", "valor": 0.046}]"#, ValueUnit::Fraction)
                .unwrap();
        assert_eq!(rows, vec![RateRow::new(m("2024-06"), dec("0.046"))]);

        for body in [r#"{"data": []}"#, "[]", r#"[{"date": "2024-06-30"}]"#] {
            assert!(matches!(
                parse_backup_body(body, ValueUnit::Percent),
                Err(FetchError::InvalidResponse(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_fetch_all_success() {
        let server =
            create_backup_mock_server(r#"[{"fecha": "2024-06-30", "valor": 4.6}]"#, 200).await;
        let rows = provider(&server, ValueUnit::Percent).fetch_all().await.unwrap();
        assert_eq!(rows, vec![RateRow::new(m("2024-06"), dec("0.046"))]);
    }

    #[tokio::test]
    async fn test_fetch_all_http_error() {
        let server = create_backup_mock_server("Server Error", 500).await;
        let err = provider(&server, ValueUnit::Percent)
            .fetch_all()
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::HttpStatus { status: 500, .. }));
        assert_eq!(err.code(), "http_error");
    }
}
