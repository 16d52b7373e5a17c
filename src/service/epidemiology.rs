use sqlx::{Pool, Postgres, pool::PoolConnection};
use tracing::instrument;

use crate::{
    dao::epidemiology::EpidemiologyDao,
    model::{
        apperror::{ApplicationError, ErrorType},
        db::{EpidemiologicalRecord, IngestionLog, UserAccessLog},
        models::{DiseaseTotalType, PaginationInput, RecordSource, WeeklyCaseRangeType, no_database_error},
    },
    service::{
        aggregation::{disease_totals, weekly_case_ranges},
        upstream::UpstreamClient,
    },
};

/**
 * Represents the service for reading epidemiological data and the audit logs.
 */
pub struct EpidemiologyService {
    /**
     * The DAO for the local epidemiological tables.
     */
    epidemiology_dao: EpidemiologyDao,
    /**
     * Client for the external statistics API.
     */
    upstream_client: UpstreamClient,
    /**
     * Optional connection pool for database operations. Optional for test purposes.
     */
    connection_pool: Option<Pool<Postgres>>,
}

impl EpidemiologyService {
    /**
     * Creates a new instance of `EpidemiologyService`.
     *
     * # Arguments
     * `epidemiology_dao`: The DAO for the local epidemiological tables.
     * `upstream_client`: Client for the external statistics API.
     * `connection_pool`: Optional connection pool for database operations.
     */
    pub fn new(epidemiology_dao: EpidemiologyDao, upstream_client: UpstreamClient, connection_pool: Option<Pool<Postgres>>) -> Self {
        EpidemiologyService { epidemiology_dao, upstream_client, connection_pool }
    }

    async fn connection(&self) -> Result<PoolConnection<Postgres>, ApplicationError> {
        let Some(connection_pool) = &self.connection_pool else {
            return Err(no_database_error());
        };
        connection_pool.acquire().await.map_err(|err| ApplicationError::new(ErrorType::DatabaseError, format!("Failed to acquire connection: {err}")))
    }

    /**
     * Retrieves epidemiological records from either the external API or the local table.
     *
     * # Arguments
     * `source`: Where to read from and how to filter.
     *
     * # Returns
     * Records ordered by period start, IBGE code and disease.
     */
    #[instrument(skip(self), fields(filtered = source.is_filtered()))]
    pub async fn get_records(&self, source: &RecordSource) -> Result<Vec<EpidemiologicalRecord>, ApplicationError> {
        match source {
            RecordSource::External(filter) => self.upstream_client.get_records(filter).await,
            RecordSource::Local(filter) => {
                let mut connection = self.connection().await?;
                self.epidemiology_dao.get_records(&mut connection, filter).await
            }
        }
    }

    /**
     * Largest and smallest weekly confirmed case count for the selected records.
     * The local table is aggregated by the database, external records in process.
     */
    #[instrument(skip(self), fields(filtered = source.is_filtered()))]
    pub async fn get_weekly_case_ranges(&self, source: &RecordSource) -> Result<Vec<WeeklyCaseRangeType>, ApplicationError> {
        match source {
            RecordSource::External(filter) => {
                let records = self.upstream_client.get_records(filter).await?;
                Ok(weekly_case_ranges(&records))
            }
            RecordSource::Local(filter) => {
                let mut connection = self.connection().await?;
                self.epidemiology_dao.get_weekly_case_ranges(&mut connection, filter).await
            }
        }
    }

    /**
     * Confirmed case totals per disease for the selected records.
     */
    #[instrument(skip(self), fields(filtered = source.is_filtered()))]
    pub async fn get_disease_totals(&self, source: &RecordSource) -> Result<Vec<DiseaseTotalType>, ApplicationError> {
        match source {
            RecordSource::External(filter) => {
                let records = self.upstream_client.get_records(filter).await?;
                Ok(disease_totals(&records))
            }
            RecordSource::Local(filter) => {
                let mut connection = self.connection().await?;
                self.epidemiology_dao.get_disease_totals(&mut connection, filter).await
            }
        }
    }

    pub async fn get_access_logs(&self, pagination: Option<PaginationInput>) -> Result<Vec<UserAccessLog>, ApplicationError> {
        let mut connection = self.connection().await?;
        self.epidemiology_dao.get_access_logs(&mut connection, pagination).await
    }

    pub async fn get_ingestion_logs(&self, pagination: Option<PaginationInput>) -> Result<Vec<IngestionLog>, ApplicationError> {
        let mut connection = self.connection().await?;
        self.epidemiology_dao.get_ingestion_logs(&mut connection, pagination).await
    }
}

#[cfg(test)]
mod test {
    use chrono::NaiveDate;

    use super::*;
    use crate::{
        model::models::{ExternalRecordFilter, LocalRecordFilter},
        test_support::{serve_once, test_http_client},
    };

    fn service(base_url: &str) -> EpidemiologyService {
        EpidemiologyService::new(EpidemiologyDao::new(), UpstreamClient::new(base_url, test_http_client()).unwrap(), None)
    }

    fn external() -> RecordSource {
        RecordSource::External(ExternalRecordFilter {
            municipality: "Niteroi".to_string(),
            period_start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            period_end: NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
            disease: "dengue".to_string(),
        })
    }

    #[tokio::test]
    async fn test_external_records_are_aggregated() {
        let body = r#"[
            {"codigoIbge": 3303302, "dataSemanaInicio": "2024-01-07", "dataSemanaFim": "2024-01-13", "arbovirose": "dengue", "casosConfirmados": 4},
            {"codigoIbge": 3303302, "dataSemanaInicio": "2024-01-07", "dataSemanaFim": "2024-01-13", "arbovirose": "dengue", "casosConfirmados": 9}
        ]"#;
        let base_url = serve_once("200 OK", body).await;
        let ranges = service(&base_url).get_weekly_case_ranges(&external()).await.unwrap();
        assert_eq!(ranges, vec![WeeklyCaseRangeType { period_start: NaiveDate::from_ymd_opt(2024, 1, 7).unwrap(), max_cases: 9, min_cases: 4 }]);
    }

    #[tokio::test]
    async fn test_external_failure_is_upstream_error() {
        let base_url = serve_once("500 Internal Server Error", "").await;
        let err = service(&base_url).get_disease_totals(&external()).await.unwrap_err();
        assert_eq!(err.error_type, ErrorType::Upstream);
    }

    #[tokio::test]
    async fn test_local_records_without_database() {
        let err = service("http://127.0.0.1:9/dados").get_records(&RecordSource::Local(LocalRecordFilter::default())).await.unwrap_err();
        assert_eq!(err.error_type, ErrorType::DatabaseError);
    }

    #[tokio::test]
    async fn test_local_aggregations_without_database() {
        let service = service("http://127.0.0.1:9/dados");
        let source = RecordSource::Local(LocalRecordFilter::default());
        assert_eq!(service.get_weekly_case_ranges(&source).await.unwrap_err().error_type, ErrorType::DatabaseError);
        assert_eq!(service.get_disease_totals(&source).await.unwrap_err().error_type, ErrorType::DatabaseError);
    }

    #[tokio::test]
    async fn test_logs_without_database() {
        let service = service("http://127.0.0.1:9/dados");
        assert_eq!(service.get_access_logs(None).await.unwrap_err().error_type, ErrorType::DatabaseError);
        assert_eq!(service.get_ingestion_logs(None).await.unwrap_err().error_type, ErrorType::DatabaseError);
    }
}
