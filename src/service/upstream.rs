use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};
use tracing::{Instrument, instrument};

use crate::{
    model::{
        apperror::{ApplicationError, ErrorType},
        db::EpidemiologicalRecord,
        models::{ExternalRecordFilter, parse_date},
    },
    service::aggregation::sort_records,
};

/**
 * Record shape returned by the external statistics API.
 * Field names arrive camelCase or PascalCase depending on the serializer upstream.
 */
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpstreamRecord {
    #[serde(alias = "CodigoIbge")]
    codigo_ibge: i64,
    #[serde(alias = "DataSemanaInicio", deserialize_with = "deserialize_date")]
    data_semana_inicio: NaiveDate,
    #[serde(alias = "DataSemanaFim", deserialize_with = "deserialize_date")]
    data_semana_fim: NaiveDate,
    #[serde(alias = "Arbovirose")]
    arbovirose: String,
    #[serde(alias = "CasosConfirmados")]
    casos_confirmados: i64,
}

impl From<UpstreamRecord> for EpidemiologicalRecord {
    fn from(record: UpstreamRecord) -> Self {
        EpidemiologicalRecord::new(record.codigo_ibge, record.data_semana_inicio, record.data_semana_fim, record.arbovirose, record.casos_confirmados)
    }
}

/**
 * Dates come either as `YYYY-MM-DD` or as a `YYYY-MM-DDTHH:MM:SS` timestamp.
 */
fn deserialize_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    parse_date(&value).ok_or_else(|| serde::de::Error::custom(format!("invalid date {value}")))
}

/**
 * Client for the external epidemiological statistics API.
 *
 * Every call is a single attempt with the transport's default timeouts. Any failure is reported as `Upstream`.
 */
pub struct UpstreamClient {
    client: reqwest::Client,
    base_url: reqwest::Url,
}

impl UpstreamClient {
    /**
     * Creates a new instance of `UpstreamClient`.
     *
     * # Arguments
     * `base_url`: Endpoint of the external API.
     * `client`: HTTP client to issue requests with.
     */
    pub fn new(base_url: &str, client: reqwest::Client) -> Result<Self, ApplicationError> {
        let base_url = reqwest::Url::parse(base_url).map_err(|err| ApplicationError::new(ErrorType::Initialization, format!("Invalid upstream base url {base_url}: {err}")))?;
        Ok(UpstreamClient { client, base_url })
    }

    /**
     * Fetches records for one municipality, period and disease.
     *
     * # Arguments
     * `filter`: The external filter.
     *
     * # Returns
     * Records ordered by period start, IBGE code and disease.
     */
    #[instrument(skip(self), fields(result))]
    pub async fn get_records(&self, filter: &ExternalRecordFilter) -> Result<Vec<EpidemiologicalRecord>, ApplicationError> {
        let span = tracing::Span::current();
        let period_start = filter.period_start.format("%Y-%m-%d").to_string();
        let period_end = filter.period_end.format("%Y-%m-%d").to_string();
        let response = self
            .client
            .get(self.base_url.clone())
            .query(&[
                ("municipio", filter.municipality.as_str()),
                ("dataInicio", period_start.as_str()),
                ("dataFim", period_end.as_str()),
                ("arbovirose", filter.disease.as_str()),
            ])
            .send()
            .instrument(span.clone())
            .await
            .map_err(|err| Self::upstream_error(format!("Failed to call upstream statistics API: {err}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Self::upstream_error(format!("Upstream statistics API responded with {status}")));
        }
        let records: Option<Vec<UpstreamRecord>> =
            response.json().instrument(span.clone()).await.map_err(|err| Self::upstream_error(format!("Failed to parse upstream response: {err}")))?;
        let mut records: Vec<EpidemiologicalRecord> = records.unwrap_or_default().into_iter().map(EpidemiologicalRecord::from).collect();
        sort_records(&mut records);
        span.record("result", records.len());
        Ok(records)
    }

    fn upstream_error(message: String) -> ApplicationError {
        tracing::warn!("{}", message);
        ApplicationError::new(ErrorType::Upstream, message)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_support::{serve_once, test_http_client};

    fn filter() -> ExternalRecordFilter {
        ExternalRecordFilter {
            municipality: "Rio de Janeiro".to_string(),
            period_start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            period_end: NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
            disease: "dengue".to_string(),
        }
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(UpstreamClient::new("not a url", test_http_client()).is_err());
    }

    #[tokio::test]
    async fn test_get_records_success() {
        let body = r#"[
            {"codigoIbge": 3304557, "dataSemanaInicio": "2024-01-14T00:00:00", "dataSemanaFim": "2024-01-20T00:00:00", "arbovirose": "dengue", "casosConfirmados": 12},
            {"CodigoIbge": 3304557, "DataSemanaInicio": "2024-01-07", "DataSemanaFim": "2024-01-13", "Arbovirose": "dengue", "CasosConfirmados": 8}
        ]"#;
        let base_url = serve_once("200 OK", body).await;
        let client = UpstreamClient::new(&base_url, test_http_client()).unwrap();
        let records = client.get_records(&filter()).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].period_start, NaiveDate::from_ymd_opt(2024, 1, 7).unwrap());
        assert_eq!(records[0].confirmed_cases, 8);
        assert_eq!(records[1].confirmed_cases, 12);
    }

    #[tokio::test]
    async fn test_get_records_null_body_is_empty() {
        let base_url = serve_once("200 OK", "null").await;
        let client = UpstreamClient::new(&base_url, test_http_client()).unwrap();
        assert!(client.get_records(&filter()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_records_non_success_status() {
        let base_url = serve_once("503 Service Unavailable", "").await;
        let client = UpstreamClient::new(&base_url, test_http_client()).unwrap();
        let err = client.get_records(&filter()).await.unwrap_err();
        assert_eq!(err.error_type, ErrorType::Upstream);
    }

    #[test]
    fn test_record_dates_with_trailing_characters_are_rejected() {
        let valid = r#"{"codigoIbge": 1, "dataSemanaInicio": "2024-01-07T00:00:00", "dataSemanaFim": "2024-01-13", "arbovirose": "dengue", "casosConfirmados": 1}"#;
        assert!(serde_json::from_str::<UpstreamRecord>(valid).is_ok());
        let trailing = r#"{"codigoIbge": 1, "dataSemanaInicio": "2024-01-07junk", "dataSemanaFim": "2024-01-13", "arbovirose": "dengue", "casosConfirmados": 1}"#;
        assert!(serde_json::from_str::<UpstreamRecord>(trailing).is_err());
    }

    #[tokio::test]
    async fn test_get_records_with_invalid_date_is_upstream_error() {
        let body = r#"[{"codigoIbge": 3304557, "dataSemanaInicio": "2024-01-0799", "dataSemanaFim": "2024-01-13", "arbovirose": "dengue", "casosConfirmados": 8}]"#;
        let base_url = serve_once("200 OK", body).await;
        let client = UpstreamClient::new(&base_url, test_http_client()).unwrap();
        let err = client.get_records(&filter()).await.unwrap_err();
        assert_eq!(err.error_type, ErrorType::Upstream);
    }

    #[tokio::test]
    async fn test_get_records_malformed_body() {
        let base_url = serve_once("200 OK", "{\"unexpected\": true}").await;
        let client = UpstreamClient::new(&base_url, test_http_client()).unwrap();
        let err = client.get_records(&filter()).await.unwrap_err();
        assert_eq!(err.error_type, ErrorType::Upstream);
    }
}
