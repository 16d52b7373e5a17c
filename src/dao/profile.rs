use async_trait::async_trait;
use sqlx::PgConnection;
use tracing::{Instrument, instrument};
use uuid::Uuid;

use crate::{
    dao::repository::{ProfileRepository, Repository, check_single_row, handle_database_error},
    model::{
        apperror::ApplicationError,
        db::{Profile, ProfileDbResp},
    },
};

const ADD_PROFILE: &str = "INSERT INTO profile (id, name, description) VALUES ($1, $2, $3)";

const UPDATE_PROFILE: &str = "UPDATE profile SET name = $1, description = $2 WHERE id = $3";

const DELETE_PROFILE: &str = "DELETE FROM profile WHERE id = $1";

const QUERY_PROFILE_BY_ID: &str = "SELECT id, name, description FROM profile WHERE id = $1";

const QUERY_PROFILE_BY_NAME: &str = "SELECT id, name, description FROM profile WHERE name = $1";

const QUERY_PROFILE_LIST: &str = "SELECT id, name, description FROM profile ORDER BY name, id";

/**
 * Profile repository bound to the session of the unit of work that created it.
 */
pub struct PgProfileRepository<'a> {
    connection: &'a mut PgConnection,
}

impl<'a> PgProfileRepository<'a> {
    pub fn new(connection: &'a mut PgConnection) -> Self {
        PgProfileRepository { connection }
    }
}

#[async_trait]
impl Repository<Profile> for PgProfileRepository<'_> {
    #[instrument(skip(self, entity), fields(id = %entity.id))]
    async fn insert(&mut self, entity: &Profile) -> Result<(), ApplicationError> {
        let span = tracing::Span::current();
        sqlx::query(ADD_PROFILE)
            .bind(entity.id)
            .bind(&entity.name)
            .bind(&entity.description)
            .execute(&mut *self.connection)
            .instrument(span)
            .await
            .map_err(|err| handle_database_error(&err, "Failed to execute query to add profile"))?;
        Ok(())
    }

    #[instrument(skip(self, entity), fields(id = %entity.id))]
    async fn update(&mut self, entity: &Profile) -> Result<(), ApplicationError> {
        let span = tracing::Span::current();
        let result = sqlx::query(UPDATE_PROFILE)
            .bind(&entity.name)
            .bind(&entity.description)
            .bind(entity.id)
            .execute(&mut *self.connection)
            .instrument(span)
            .await
            .map_err(|err| handle_database_error(&err, "Failed to execute query to update profile"))?;
        check_single_row(result.rows_affected(), "Profile")
    }

    #[instrument(skip(self, entity), fields(id = %entity.id))]
    async fn delete(&mut self, entity: &Profile) -> Result<(), ApplicationError> {
        let span = tracing::Span::current();
        let result = sqlx::query(DELETE_PROFILE)
            .bind(entity.id)
            .execute(&mut *self.connection)
            .instrument(span)
            .await
            .map_err(|err| handle_database_error(&err, "Failed to execute query to delete profile"))?;
        check_single_row(result.rows_affected(), "Profile")
    }

    #[instrument(skip(self))]
    async fn get_by_id(&mut self, id: Uuid) -> Result<Option<Profile>, ApplicationError> {
        let span = tracing::Span::current();
        let result: Option<ProfileDbResp> = sqlx::query_as(QUERY_PROFILE_BY_ID)
            .bind(id)
            .fetch_optional(&mut *self.connection)
            .instrument(span)
            .await
            .map_err(|err| handle_database_error(&err, "Failed to execute query to get profile"))?;
        Ok(result.map(Profile::from))
    }

    #[instrument(skip(self))]
    async fn list(&mut self) -> Result<Vec<Profile>, ApplicationError> {
        let span = tracing::Span::current();
        let results: Vec<ProfileDbResp> = sqlx::query_as(QUERY_PROFILE_LIST)
            .fetch_all(&mut *self.connection)
            .instrument(span)
            .await
            .map_err(|err| handle_database_error(&err, "Failed to execute query to get profile list"))?;
        Ok(results.into_iter().map(Profile::from).collect())
    }
}

#[async_trait]
impl ProfileRepository for PgProfileRepository<'_> {
    #[instrument(skip(self))]
    async fn get_by_name(&mut self, name: &str) -> Result<Option<Profile>, ApplicationError> {
        let span = tracing::Span::current();
        let result: Option<ProfileDbResp> = sqlx::query_as(QUERY_PROFILE_BY_NAME)
            .bind(name)
            .fetch_optional(&mut *self.connection)
            .instrument(span)
            .await
            .map_err(|err| handle_database_error(&err, "Failed to execute query to get profile by name"))?;
        Ok(result.map(Profile::from))
    }
}
