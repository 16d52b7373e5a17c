use std::borrow::Cow;

use async_trait::async_trait;
use uuid::Uuid;

use crate::model::{
    apperror::{ApplicationError, ErrorType},
    db::{Employee, Profile},
};

/**
 * Uniform CRUD contract for one entity kind.
 *
 * Callers check uniqueness through the entity specific lookups before `insert` and `update`;
 * the store still rejects violations, which surface as `ConstraintViolation`.
 */
#[async_trait]
pub trait Repository<T>: Send
where
    T: Send + Sync + 'static,
{
    /**
     * Persists a new record. The identity is generated by the caller.
     */
    async fn insert(&mut self, entity: &T) -> Result<(), ApplicationError>;

    /**
     * Replaces every field of the record with the same identity.
     * Fails with `NotFound` if there is no such record.
     */
    async fn update(&mut self, entity: &T) -> Result<(), ApplicationError>;

    /**
     * Removes the record with the same identity. Fails with `NotFound` if there is no such record.
     */
    async fn delete(&mut self, entity: &T) -> Result<(), ApplicationError>;

    async fn get_by_id(&mut self, id: Uuid) -> Result<Option<T>, ApplicationError>;

    /**
     * All records, ascending by name.
     */
    async fn list(&mut self) -> Result<Vec<T>, ApplicationError>;
}

#[async_trait]
pub trait EmployeeRepository: Repository<Employee> {
    async fn get_by_national_id(&mut self, national_id: &str) -> Result<Option<Employee>, ApplicationError>;

    async fn get_by_registration_number(&mut self, registration_number: &str) -> Result<Option<Employee>, ApplicationError>;

    /**
     * Employees whose name contains `fragment`, case-insensitive, ascending by name.
     */
    async fn find_by_name(&mut self, fragment: &str) -> Result<Vec<Employee>, ApplicationError>;
}

#[async_trait]
pub trait ProfileRepository: Repository<Profile> {
    async fn get_by_name(&mut self, name: &str) -> Result<Option<Profile>, ApplicationError>;
}

/**
 * One transactional boundary over every repository.
 *
 * The unit of work owns its session. Repositories handed out by the accessors borrow that session,
 * so everything done through them between `begin_transaction` and `commit`/`rollback` is one transaction.
 * A unit of work serves a single request.
 */
#[async_trait]
pub trait UnitOfWork: Send {
    type Employees<'a>: EmployeeRepository + 'a
    where
        Self: 'a;
    type Profiles<'a>: ProfileRepository + 'a
    where
        Self: 'a;

    async fn begin_transaction(&mut self) -> Result<(), ApplicationError>;

    async fn commit(&mut self) -> Result<(), ApplicationError>;

    async fn rollback(&mut self) -> Result<(), ApplicationError>;

    /**
     * Employee repository borrowing this unit of work's session. Every repository obtained from
     * the same unit of work runs inside the same transaction.
     */
    fn employees(&mut self) -> Self::Employees<'_>;

    /**
     * Profile repository borrowing this unit of work's session, shared with `employees`.
     */
    fn profiles(&mut self) -> Self::Profiles<'_>;
}

/**
 * Commits on success and rolls back on failure, returning the original outcome.
 *
 * # Arguments
 * `unit_of_work`: Unit of work with an open transaction.
 * `result`: Outcome of the work done inside the transaction.
 */
pub async fn complete<U, T>(unit_of_work: &mut U, result: Result<T, ApplicationError>) -> Result<T, ApplicationError>
where
    U: UnitOfWork,
{
    match result {
        Ok(value) => {
            unit_of_work.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = unit_of_work.rollback().await {
                tracing::error!("Failed to roll back after {:?}: {}", err.error_type, rollback_err);
            }
            Err(err)
        }
    }
}

/**
 * Maps a failed write to the affected row count check shared by update and delete.
 *
 * # Arguments
 * `rows_affected`: Rows touched by the statement.
 * `entity`: Entity name for messages.
 */
pub fn check_single_row(rows_affected: u64, entity: &str) -> Result<(), ApplicationError> {
    if rows_affected == 0 {
        tracing::debug!("{} not found", entity);
        return Err(ApplicationError::new(ErrorType::NotFound, format!("{entity} not found")));
    }
    if rows_affected > 1 {
        tracing::warn!("Multiple {} rows affected. Rolled back", entity);
        return Err(ApplicationError::new(ErrorType::Application, format!("Multiple {entity} rows affected")));
    }
    Ok(())
}

/**
 * Handles database errors and maps them to application errors.
 *
 * # Arguments
 * `error`: The error returned by sqlx.
 * `context`: What was being attempted.
 *
 * # Returns
 * An `ApplicationError` corresponding to the database error.
 */
pub fn handle_database_error(error: &sqlx::Error, context: &str) -> ApplicationError {
    if let Some(db_error) = error.as_database_error() {
        tracing::debug!("Database error: {}", db_error);
        if db_error.code() == Some(Cow::Borrowed("23505")) {
            // Unique violation
            return ApplicationError::new(ErrorType::ConstraintViolation, "Already exists".to_string());
        } else if db_error.code() == Some(Cow::Borrowed("23503")) {
            // Foreign key violation
            return ApplicationError::new(ErrorType::ConstraintViolation, "Missing parent value".to_string());
        } else if db_error.code() == Some(Cow::Borrowed("22001")) {
            // Value too long
            return ApplicationError::new(ErrorType::Validation, "Value too long".to_string());
        }
    }
    tracing::error!("{}: {}", context, error);
    ApplicationError::new(ErrorType::DatabaseError, format!("{context}: {error}"))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_check_single_row() {
        assert!(check_single_row(1, "Employee").is_ok());
        assert_eq!(check_single_row(0, "Employee").unwrap_err().error_type, ErrorType::NotFound);
        assert_eq!(check_single_row(2, "Employee").unwrap_err().error_type, ErrorType::Application);
    }

    #[test]
    fn test_non_database_error_is_internal() {
        let err = handle_database_error(&sqlx::Error::RowNotFound, "Failed to get employee");
        assert_eq!(err.error_type, ErrorType::DatabaseError);
        assert!(err.message.starts_with("Failed to get employee"));
    }
}
