use async_trait::async_trait;
use sqlx::{Pool, Postgres, pool::PoolConnection};
use tracing::instrument;

use crate::{
    dao::{
        employee::PgEmployeeRepository,
        profile::PgProfileRepository,
        repository::{UnitOfWork, handle_database_error},
    },
    model::apperror::{ApplicationError, ErrorType},
};

const BEGIN_TRANSACTION: &str = "BEGIN";

const COMMIT_TRANSACTION: &str = "COMMIT";

const ROLLBACK_TRANSACTION: &str = "ROLLBACK";

/**
 * Unit of work over one pooled PostgreSQL connection.
 *
 * The connection is held for the lifetime of the unit of work and every repository borrows it.
 * Dropping the unit of work with an open transaction closes the connection instead of returning it
 * to the pool, which makes the server discard the transaction.
 */
pub struct PgUnitOfWork {
    connection: PoolConnection<Postgres>,
    in_transaction: bool,
}

impl PgUnitOfWork {
    /**
     * Acquires a connection for a new unit of work.
     *
     * # Arguments
     * `connection_pool`: Pool to take the connection from.
     */
    pub async fn acquire(connection_pool: &Pool<Postgres>) -> Result<Self, ApplicationError> {
        let connection = connection_pool.acquire().await.map_err(|err| handle_database_error(&err, "Failed to acquire connection"))?;
        Ok(PgUnitOfWork { connection, in_transaction: false })
    }

    async fn execute_control(&mut self, statement: &'static str) -> Result<(), ApplicationError> {
        sqlx::query(statement)
            .execute(&mut *self.connection)
            .await
            .map_err(|err| handle_database_error(&err, &format!("Failed to execute {statement}")))?;
        Ok(())
    }

    /**
     * Runs COMMIT or ROLLBACK. The transaction stays marked open when the statement fails, so a
     * connection in an unknown state is closed on drop rather than returned to the pool.
     */
    async fn end_transaction(&mut self, statement: &'static str) -> Result<(), ApplicationError> {
        self.execute_control(statement).await?;
        self.in_transaction = false;
        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    type Employees<'a> = PgEmployeeRepository<'a>;
    type Profiles<'a> = PgProfileRepository<'a>;

    #[instrument(skip(self))]
    async fn begin_transaction(&mut self) -> Result<(), ApplicationError> {
        if self.in_transaction {
            return Err(ApplicationError::new(ErrorType::Application, "Transaction already started".to_string()));
        }
        self.execute_control(BEGIN_TRANSACTION).await?;
        self.in_transaction = true;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn commit(&mut self) -> Result<(), ApplicationError> {
        if !self.in_transaction {
            return Err(ApplicationError::new(ErrorType::Application, "No transaction to commit".to_string()));
        }
        self.end_transaction(COMMIT_TRANSACTION).await
    }

    #[instrument(skip(self))]
    async fn rollback(&mut self) -> Result<(), ApplicationError> {
        if !self.in_transaction {
            return Err(ApplicationError::new(ErrorType::Application, "No transaction to roll back".to_string()));
        }
        self.end_transaction(ROLLBACK_TRANSACTION).await
    }

    fn employees(&mut self) -> Self::Employees<'_> {
        PgEmployeeRepository::new(&mut self.connection)
    }

    fn profiles(&mut self) -> Self::Profiles<'_> {
        PgProfileRepository::new(&mut self.connection)
    }
}

impl Drop for PgUnitOfWork {
    fn drop(&mut self) {
        if self.in_transaction {
            tracing::warn!("Unit of work dropped with an open transaction. Closing connection");
            self.connection.close_on_drop();
        }
    }
}

#[cfg(feature = "integration-test")]
#[cfg(test)]
mod integration_test {
    use chrono::NaiveDate;
    use uuid::Uuid;

    use super::*;
    use crate::{
        dao::{integration::init_db, repository::{EmployeeRepository, ProfileRepository, Repository}},
        model::db::{Employee, Profile},
    };

    #[tokio::test]
    async fn test_rollback_spans_both_repositories() {
        let pool = init_db().await;
        let mut unit_of_work = PgUnitOfWork::acquire(&pool).await.unwrap();
        let employee = Employee::new(Uuid::new_v4(), "Carla".to_string(), "555.444.333-22".to_string(), "C0001".to_string(), NaiveDate::from_ymd_opt(2023, 5, 2).unwrap(), Uuid::new_v4());
        let profile = Profile::new(Uuid::new_v4(), "Auditor uow".to_string(), "Leitura".to_string());
        unit_of_work.begin_transaction().await.unwrap();
        unit_of_work.employees().insert(&employee).await.unwrap();
        unit_of_work.profiles().insert(&profile).await.unwrap();
        unit_of_work.rollback().await.unwrap();
        assert!(unit_of_work.employees().get_by_national_id("555.444.333-22").await.unwrap().is_none());
        assert!(unit_of_work.profiles().get_by_name("Auditor uow").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_commit_keeps_transaction_open() {
        let pool = init_db().await;
        let mut unit_of_work = PgUnitOfWork::acquire(&pool).await.unwrap();
        unit_of_work.begin_transaction().await.unwrap();
        sqlx::query("CREATE TEMPORARY TABLE deferred_check (id INT UNIQUE DEFERRABLE INITIALLY DEFERRED) ON COMMIT DROP")
            .execute(&mut *unit_of_work.connection)
            .await
            .unwrap();
        sqlx::query("INSERT INTO deferred_check (id) VALUES (1), (1)").execute(&mut *unit_of_work.connection).await.unwrap();
        assert!(unit_of_work.commit().await.is_err());
        assert!(unit_of_work.in_transaction);
    }

    #[tokio::test]
    async fn test_commit_closes_transaction() {
        let pool = init_db().await;
        let mut unit_of_work = PgUnitOfWork::acquire(&pool).await.unwrap();
        unit_of_work.begin_transaction().await.unwrap();
        unit_of_work.commit().await.unwrap();
        assert!(!unit_of_work.in_transaction);
        assert_eq!(unit_of_work.commit().await.unwrap_err().error_type, ErrorType::Application);
    }
}
