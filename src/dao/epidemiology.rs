use sqlx::PgConnection;
use tracing::{Instrument, instrument};

use crate::{
    dao::repository::handle_database_error,
    model::{
        apperror::ApplicationError,
        db::{
            DiseaseTotalDbResp, EpidemiologicalRecord, EpidemiologicalRecordDbResp, IngestionLog, IngestionLogDbResp, UserAccessLog, UserAccessLogDbResp, WeeklyCaseRangeDbResp,
        },
        models::{DiseaseTotalType, LocalRecordFilter, PaginationInput, WeeklyCaseRangeType},
    },
};

/**
 * SQL query to retrieve epidemiological records. Every filter is optional.
 */
const QUERY_RECORDS: &str = "SELECT ibge_code, week_start, week_end, disease, confirmed_cases
                             FROM epidemiological_data
                             WHERE ($1::bigint IS NULL OR ibge_code = $1) AND
                                   ($2::date IS NULL OR week_start >= $2) AND
                                   ($3::date IS NULL OR week_end <= $3) AND
                                   ($4::text IS NULL OR lower(disease) = lower($4))
                             ORDER BY week_start, ibge_code, disease";

/**
 * SQL query for the largest and smallest confirmed case count per period start. Same filters as `QUERY_RECORDS`.
 */
const QUERY_WEEKLY_CASE_RANGES: &str = "SELECT week_start, MAX(confirmed_cases), MIN(confirmed_cases)
                                        FROM epidemiological_data
                                        WHERE ($1::bigint IS NULL OR ibge_code = $1) AND
                                              ($2::date IS NULL OR week_start >= $2) AND
                                              ($3::date IS NULL OR week_end <= $3) AND
                                              ($4::text IS NULL OR lower(disease) = lower($4))
                                        GROUP BY week_start
                                        ORDER BY week_start";

/**
 * SQL query for confirmed case totals per disease. Same filters as `QUERY_RECORDS`.
 */
const QUERY_DISEASE_TOTALS: &str = "SELECT disease, SUM(confirmed_cases)::bigint
                                    FROM epidemiological_data
                                    WHERE ($1::bigint IS NULL OR ibge_code = $1) AND
                                          ($2::date IS NULL OR week_start >= $2) AND
                                          ($3::date IS NULL OR week_end <= $3) AND
                                          ($4::text IS NULL OR lower(disease) = lower($4))
                                    GROUP BY disease
                                    ORDER BY disease";

/**
 * SQL query to retrieve user access logs. A NULL limit returns everything.
 */
const QUERY_ACCESS_LOGS: &str = "SELECT id, user_email, path, accessed_at FROM user_access_log ORDER BY accessed_at, id LIMIT $1 OFFSET $2";

/**
 * SQL query to retrieve epidemiological data ingestion logs. A NULL limit returns everything.
 */
const QUERY_INGESTION_LOGS: &str = "SELECT id, ibge_code, disease, records_ingested, ingested_at FROM epidemiological_data_log ORDER BY ingested_at, id LIMIT $1 OFFSET $2";

/**
 * DAO for the read-only epidemiological tables.
 */
pub struct EpidemiologyDao {}

impl EpidemiologyDao {
    /**
     * Creates a new instance of `EpidemiologyDao`.
     */
    pub fn new() -> Self {
        EpidemiologyDao {}
    }

    /**
     * Retrieves epidemiological records matching the filter.
     *
     * # Arguments
     * `connection`: The database connection.
     * `filter`: Municipality, period and disease filter.
     *
     * # Returns
     * Records ordered by period start, IBGE code and disease.
     */
    #[instrument(skip(self, connection), fields(result))]
    pub async fn get_records(&self, connection: &mut PgConnection, filter: &LocalRecordFilter) -> Result<Vec<EpidemiologicalRecord>, ApplicationError> {
        let span = tracing::Span::current();
        let results: Vec<EpidemiologicalRecordDbResp> = sqlx::query_as(QUERY_RECORDS)
            .bind(filter.ibge_code)
            .bind(filter.period_start)
            .bind(filter.period_end)
            .bind(filter.disease.as_deref())
            .fetch_all(connection)
            .instrument(span.clone())
            .await
            .map_err(|err| handle_database_error(&err, "Failed to execute query to get epidemiological records"))?;
        span.record("result", results.len());
        Ok(results.into_iter().map(EpidemiologicalRecord::from).collect())
    }

    /**
     * Largest and smallest confirmed case count per period start, computed by the database.
     *
     * # Arguments
     * `connection`: The database connection.
     * `filter`: Municipality, period and disease filter.
     *
     * # Returns
     * One row per distinct period start, ascending.
     */
    #[instrument(skip(self, connection), fields(result))]
    pub async fn get_weekly_case_ranges(&self, connection: &mut PgConnection, filter: &LocalRecordFilter) -> Result<Vec<WeeklyCaseRangeType>, ApplicationError> {
        let span = tracing::Span::current();
        let results: Vec<WeeklyCaseRangeDbResp> = sqlx::query_as(QUERY_WEEKLY_CASE_RANGES)
            .bind(filter.ibge_code)
            .bind(filter.period_start)
            .bind(filter.period_end)
            .bind(filter.disease.as_deref())
            .fetch_all(connection)
            .instrument(span.clone())
            .await
            .map_err(|err| handle_database_error(&err, "Failed to execute query to get weekly case ranges"))?;
        span.record("result", results.len());
        Ok(results.into_iter().map(WeeklyCaseRangeType::from).collect())
    }

    /**
     * Confirmed case totals per disease, computed by the database.
     *
     * # Returns
     * One row per disease, ascending by name.
     */
    #[instrument(skip(self, connection), fields(result))]
    pub async fn get_disease_totals(&self, connection: &mut PgConnection, filter: &LocalRecordFilter) -> Result<Vec<DiseaseTotalType>, ApplicationError> {
        let span = tracing::Span::current();
        let results: Vec<DiseaseTotalDbResp> = sqlx::query_as(QUERY_DISEASE_TOTALS)
            .bind(filter.ibge_code)
            .bind(filter.period_start)
            .bind(filter.period_end)
            .bind(filter.disease.as_deref())
            .fetch_all(connection)
            .instrument(span.clone())
            .await
            .map_err(|err| handle_database_error(&err, "Failed to execute query to get disease totals"))?;
        span.record("result", results.len());
        Ok(results.into_iter().map(DiseaseTotalType::from).collect())
    }

    /**
     * Retrieves user access logs.
     *
     * # Arguments
     * `connection`: The database connection.
     * `pagination`: Optional page. Without it the whole table is returned.
     */
    #[instrument(skip(self, connection), fields(result))]
    pub async fn get_access_logs(&self, connection: &mut PgConnection, pagination: Option<PaginationInput>) -> Result<Vec<UserAccessLog>, ApplicationError> {
        let span = tracing::Span::current();
        let (limit, offset) = Self::limit_offset(pagination);
        let results: Vec<UserAccessLogDbResp> = sqlx::query_as(QUERY_ACCESS_LOGS)
            .bind(limit)
            .bind(offset)
            .fetch_all(connection)
            .instrument(span.clone())
            .await
            .map_err(|err| handle_database_error(&err, "Failed to execute query to get access logs"))?;
        span.record("result", results.len());
        Ok(results.into_iter().map(UserAccessLog::from).collect())
    }

    /**
     * Retrieves epidemiological data ingestion logs.
     *
     * # Arguments
     * `connection`: The database connection.
     * `pagination`: Optional page. Without it the whole table is returned.
     */
    #[instrument(skip(self, connection), fields(result))]
    pub async fn get_ingestion_logs(&self, connection: &mut PgConnection, pagination: Option<PaginationInput>) -> Result<Vec<IngestionLog>, ApplicationError> {
        let span = tracing::Span::current();
        let (limit, offset) = Self::limit_offset(pagination);
        let results: Vec<IngestionLogDbResp> = sqlx::query_as(QUERY_INGESTION_LOGS)
            .bind(limit)
            .bind(offset)
            .fetch_all(connection)
            .instrument(span.clone())
            .await
            .map_err(|err| handle_database_error(&err, "Failed to execute query to get ingestion logs"))?;
        span.record("result", results.len());
        Ok(results.into_iter().map(IngestionLog::from).collect())
    }

    fn limit_offset(pagination: Option<PaginationInput>) -> (Option<i64>, i64) {
        match pagination {
            Some(pagination) => (Some(pagination.page_size), pagination.start_index),
            None => (None, 0),
        }
    }
}
