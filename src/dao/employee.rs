use async_trait::async_trait;
use sqlx::PgConnection;
use tracing::{Instrument, instrument};
use uuid::Uuid;

use crate::{
    dao::repository::{EmployeeRepository, Repository, check_single_row, handle_database_error},
    model::{
        apperror::ApplicationError,
        db::{Employee, EmployeeDbResp},
    },
};

/**
 * SQL query to add a new employee.
 */
const ADD_EMPLOYEE: &str = "INSERT INTO employee (id, name, national_id, registration_number, admission_date, organization_id) VALUES ($1, $2, $3, $4, $5, $6)";

/**
 * SQL query to replace an employee.
 */
const UPDATE_EMPLOYEE: &str = "UPDATE employee SET name = $1, national_id = $2, registration_number = $3, admission_date = $4, organization_id = $5 WHERE id = $6";

/**
 * SQL query to delete an employee.
 */
const DELETE_EMPLOYEE: &str = "DELETE FROM employee WHERE id = $1";

const QUERY_EMPLOYEE_BY_ID: &str = "SELECT id, name, national_id, registration_number, admission_date, organization_id FROM employee WHERE id = $1";

const QUERY_EMPLOYEE_BY_NATIONAL_ID: &str = "SELECT id, name, national_id, registration_number, admission_date, organization_id FROM employee WHERE national_id = $1";

const QUERY_EMPLOYEE_BY_REGISTRATION_NUMBER: &str = "SELECT id, name, national_id, registration_number, admission_date, organization_id FROM employee WHERE registration_number = $1";

/**
 * SQL query to list every employee.
 */
const QUERY_EMPLOYEE_LIST: &str = "SELECT id, name, national_id, registration_number, admission_date, organization_id FROM employee ORDER BY name, id";

/**
 * SQL query to search employees by part of their name. `%` and `_` in the fragment are escaped by the caller.
 */
const QUERY_EMPLOYEE_BY_NAME: &str = "SELECT id, name, national_id, registration_number, admission_date, organization_id FROM employee WHERE name ILIKE '%' || $1 || '%' ORDER BY name, id";

/**
 * Employee repository bound to the session of the unit of work that created it.
 */
pub struct PgEmployeeRepository<'a> {
    connection: &'a mut PgConnection,
}

impl<'a> PgEmployeeRepository<'a> {
    pub fn new(connection: &'a mut PgConnection) -> Self {
        PgEmployeeRepository { connection }
    }

    async fn fetch_optional(&mut self, query: &'static str, value: &str) -> Result<Option<Employee>, ApplicationError> {
        let result: Option<EmployeeDbResp> = sqlx::query_as(query)
            .bind(value)
            .fetch_optional(&mut *self.connection)
            .await
            .map_err(|err| handle_database_error(&err, "Failed to execute query to get employee"))?;
        Ok(result.map(Employee::from))
    }
}

#[async_trait]
impl Repository<Employee> for PgEmployeeRepository<'_> {
    #[instrument(skip(self, entity), fields(id = %entity.id))]
    async fn insert(&mut self, entity: &Employee) -> Result<(), ApplicationError> {
        let span = tracing::Span::current();
        sqlx::query(ADD_EMPLOYEE)
            .bind(entity.id)
            .bind(&entity.name)
            .bind(&entity.national_id)
            .bind(&entity.registration_number)
            .bind(entity.admission_date)
            .bind(entity.organization_id)
            .execute(&mut *self.connection)
            .instrument(span)
            .await
            .map_err(|err| handle_database_error(&err, "Failed to execute query to add employee"))?;
        Ok(())
    }

    #[instrument(skip(self, entity), fields(id = %entity.id))]
    async fn update(&mut self, entity: &Employee) -> Result<(), ApplicationError> {
        let span = tracing::Span::current();
        let result = sqlx::query(UPDATE_EMPLOYEE)
            .bind(&entity.name)
            .bind(&entity.national_id)
            .bind(&entity.registration_number)
            .bind(entity.admission_date)
            .bind(entity.organization_id)
            .bind(entity.id)
            .execute(&mut *self.connection)
            .instrument(span)
            .await
            .map_err(|err| handle_database_error(&err, "Failed to execute query to update employee"))?;
        check_single_row(result.rows_affected(), "Employee")
    }

    #[instrument(skip(self, entity), fields(id = %entity.id))]
    async fn delete(&mut self, entity: &Employee) -> Result<(), ApplicationError> {
        let span = tracing::Span::current();
        let result = sqlx::query(DELETE_EMPLOYEE)
            .bind(entity.id)
            .execute(&mut *self.connection)
            .instrument(span)
            .await
            .map_err(|err| handle_database_error(&err, "Failed to execute query to delete employee"))?;
        check_single_row(result.rows_affected(), "Employee")
    }

    #[instrument(skip(self))]
    async fn get_by_id(&mut self, id: Uuid) -> Result<Option<Employee>, ApplicationError> {
        let span = tracing::Span::current();
        let result: Option<EmployeeDbResp> = sqlx::query_as(QUERY_EMPLOYEE_BY_ID)
            .bind(id)
            .fetch_optional(&mut *self.connection)
            .instrument(span)
            .await
            .map_err(|err| handle_database_error(&err, "Failed to execute query to get employee"))?;
        Ok(result.map(Employee::from))
    }

    #[instrument(skip(self))]
    async fn list(&mut self) -> Result<Vec<Employee>, ApplicationError> {
        let span = tracing::Span::current();
        let results: Vec<EmployeeDbResp> = sqlx::query_as(QUERY_EMPLOYEE_LIST)
            .fetch_all(&mut *self.connection)
            .instrument(span)
            .await
            .map_err(|err| handle_database_error(&err, "Failed to execute query to get employee list"))?;
        Ok(results.into_iter().map(Employee::from).collect())
    }
}

#[async_trait]
impl EmployeeRepository for PgEmployeeRepository<'_> {
    #[instrument(skip(self, national_id))]
    async fn get_by_national_id(&mut self, national_id: &str) -> Result<Option<Employee>, ApplicationError> {
        let span = tracing::Span::current();
        self.fetch_optional(QUERY_EMPLOYEE_BY_NATIONAL_ID, national_id).instrument(span).await
    }

    #[instrument(skip(self))]
    async fn get_by_registration_number(&mut self, registration_number: &str) -> Result<Option<Employee>, ApplicationError> {
        let span = tracing::Span::current();
        self.fetch_optional(QUERY_EMPLOYEE_BY_REGISTRATION_NUMBER, registration_number).instrument(span).await
    }

    #[instrument(skip(self))]
    async fn find_by_name(&mut self, fragment: &str) -> Result<Vec<Employee>, ApplicationError> {
        let span = tracing::Span::current();
        let results: Vec<EmployeeDbResp> = sqlx::query_as(QUERY_EMPLOYEE_BY_NAME)
            .bind(escape_like(fragment))
            .fetch_all(&mut *self.connection)
            .instrument(span)
            .await
            .map_err(|err| handle_database_error(&err, "Failed to execute query to search employees"))?;
        Ok(results.into_iter().map(Employee::from).collect())
    }
}

/**
 * Escapes LIKE wildcards so the fragment matches literally.
 */
fn escape_like(fragment: &str) -> String {
    fragment.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}
