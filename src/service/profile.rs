use sqlx::{Pool, Postgres};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    dao::{
        repository::{ProfileRepository, Repository, UnitOfWork, complete},
        unit_of_work::PgUnitOfWork,
    },
    model::{
        apperror::{ApplicationError, ErrorType},
        db::Profile,
        models::{ProfileAddUpdateInputType, no_database_error},
    },
};

/**
 * Represents the service for managing profiles.
 */
pub struct ProfileService {
    connection_pool: Option<Pool<Postgres>>,
}

impl ProfileService {
    pub fn new(connection_pool: Option<Pool<Postgres>>) -> Self {
        ProfileService { connection_pool }
    }

    async fn unit_of_work(&self) -> Result<PgUnitOfWork, ApplicationError> {
        let Some(connection_pool) = &self.connection_pool else {
            return Err(no_database_error());
        };
        PgUnitOfWork::acquire(connection_pool).await
    }

    pub async fn add_profile(&self, input: ProfileAddUpdateInputType) -> Result<Profile, ApplicationError> {
        add_profile(&mut self.unit_of_work().await?, input).await
    }

    pub async fn update_profile(&self, id: Uuid, input: ProfileAddUpdateInputType) -> Result<Profile, ApplicationError> {
        update_profile(&mut self.unit_of_work().await?, id, input).await
    }

    pub async fn delete_profile(&self, id: Uuid) -> Result<Profile, ApplicationError> {
        delete_profile(&mut self.unit_of_work().await?, id).await
    }

    pub async fn get_profile(&self, id: Uuid) -> Result<Profile, ApplicationError> {
        get_profile(&mut self.unit_of_work().await?, id).await
    }

    pub async fn get_profile_by_name(&self, name: &str) -> Result<Profile, ApplicationError> {
        get_profile_by_name(&mut self.unit_of_work().await?, name).await
    }

    pub async fn list_profiles(&self) -> Result<Vec<Profile>, ApplicationError> {
        list_profiles(&mut self.unit_of_work().await?).await
    }
}

fn profile_not_found() -> ApplicationError {
    ApplicationError::new(ErrorType::NotFound, "Profile not found".to_string())
}

async fn check_unique_name<U: UnitOfWork>(unit_of_work: &mut U, id: Option<Uuid>, name: &str) -> Result<(), ApplicationError> {
    match unit_of_work.profiles().get_by_name(name).await? {
        Some(existing) if Some(existing.id) != id => Err(ApplicationError::new(ErrorType::ConstraintViolation, "The profile name is already registered".to_string())),
        _ => Ok(()),
    }
}

/**
 * Adds a new profile with a generated identity.
 *
 * # Returns
 * The stored profile, or `ConstraintViolation` if the name is taken.
 */
#[instrument(skip(unit_of_work, input), fields(result))]
pub async fn add_profile<U: UnitOfWork>(unit_of_work: &mut U, input: ProfileAddUpdateInputType) -> Result<Profile, ApplicationError> {
    unit_of_work.begin_transaction().await?;
    let result = async {
        check_unique_name(unit_of_work, None, &input.name).await?;
        let profile = Profile::new(Uuid::new_v4(), input.name, input.description);
        unit_of_work.profiles().insert(&profile).await?;
        Ok::<Profile, ApplicationError>(profile)
    }
    .await;
    complete(unit_of_work, result).await
}

/**
 * Replaces name and description of an existing profile.
 *
 * # Returns
 * The stored profile, `NotFound` if `id` is unknown, or `ConstraintViolation` if another profile has the name.
 */
#[instrument(skip(unit_of_work, input), fields(result))]
pub async fn update_profile<U: UnitOfWork>(unit_of_work: &mut U, id: Uuid, input: ProfileAddUpdateInputType) -> Result<Profile, ApplicationError> {
    unit_of_work.begin_transaction().await?;
    let result = async {
        unit_of_work.profiles().get_by_id(id).await?.ok_or_else(profile_not_found)?;
        check_unique_name(unit_of_work, Some(id), &input.name).await?;
        let profile = Profile::new(id, input.name, input.description);
        unit_of_work.profiles().update(&profile).await?;
        Ok::<Profile, ApplicationError>(profile)
    }
    .await;
    complete(unit_of_work, result).await
}

/**
 * Deletes a profile.
 *
 * # Returns
 * The deleted profile, or `NotFound` if `id` is unknown.
 */
#[instrument(skip(unit_of_work), fields(result))]
pub async fn delete_profile<U: UnitOfWork>(unit_of_work: &mut U, id: Uuid) -> Result<Profile, ApplicationError> {
    unit_of_work.begin_transaction().await?;
    let result = async {
        let profile = unit_of_work.profiles().get_by_id(id).await?.ok_or_else(profile_not_found)?;
        unit_of_work.profiles().delete(&profile).await?;
        Ok::<Profile, ApplicationError>(profile)
    }
    .await;
    complete(unit_of_work, result).await
}

pub async fn get_profile<U: UnitOfWork>(unit_of_work: &mut U, id: Uuid) -> Result<Profile, ApplicationError> {
    unit_of_work.profiles().get_by_id(id).await?.ok_or_else(profile_not_found)
}

pub async fn get_profile_by_name<U: UnitOfWork>(unit_of_work: &mut U, name: &str) -> Result<Profile, ApplicationError> {
    unit_of_work.profiles().get_by_name(name).await?.ok_or_else(profile_not_found)
}

pub async fn list_profiles<U: UnitOfWork>(unit_of_work: &mut U) -> Result<Vec<Profile>, ApplicationError> {
    unit_of_work.profiles().list().await
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dao::memory::MemoryUnitOfWork;

    fn input(name: &str) -> ProfileAddUpdateInputType {
        ProfileAddUpdateInputType { name: name.to_string(), description: format!("Perfil {name}") }
    }

    #[tokio::test]
    async fn test_duplicate_name_is_conflict() {
        let mut unit_of_work = MemoryUnitOfWork::new();
        add_profile(&mut unit_of_work, input("Administrador")).await.unwrap();
        let err = add_profile(&mut unit_of_work, input("Administrador")).await.unwrap_err();
        assert_eq!(err.error_type, ErrorType::ConstraintViolation);
        assert_eq!(unit_of_work.committed().profiles.len(), 1);
    }

    #[tokio::test]
    async fn test_update_profile() {
        let mut unit_of_work = MemoryUnitOfWork::new();
        let profile = add_profile(&mut unit_of_work, input("Leitor")).await.unwrap();
        let updated = update_profile(&mut unit_of_work, profile.id, ProfileAddUpdateInputType { name: "Leitor".to_string(), description: "Somente leitura".to_string() }).await.unwrap();
        assert_eq!(get_profile(&mut unit_of_work, profile.id).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_rename_to_existing_name_is_conflict() {
        let mut unit_of_work = MemoryUnitOfWork::new();
        add_profile(&mut unit_of_work, input("Leitor")).await.unwrap();
        let editor = add_profile(&mut unit_of_work, input("Editor")).await.unwrap();
        let err = update_profile(&mut unit_of_work, editor.id, input("Leitor")).await.unwrap_err();
        assert_eq!(err.error_type, ErrorType::ConstraintViolation);
        assert_eq!(get_profile_by_name(&mut unit_of_work, "Editor").await.unwrap().id, editor.id);
    }

    #[tokio::test]
    async fn test_update_unknown_profile_is_not_found() {
        let mut unit_of_work = MemoryUnitOfWork::new();
        let err = update_profile(&mut unit_of_work, Uuid::new_v4(), input("Leitor")).await.unwrap_err();
        assert_eq!(err.error_type, ErrorType::NotFound);
        assert!(unit_of_work.committed().profiles.is_empty());
    }

    #[tokio::test]
    async fn test_delete_unknown_profile_is_not_found() {
        let mut unit_of_work = MemoryUnitOfWork::new();
        let err = delete_profile(&mut unit_of_work, Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.error_type, ErrorType::NotFound);
    }

    #[tokio::test]
    async fn test_list_is_ordered_by_name() {
        let mut unit_of_work = MemoryUnitOfWork::new();
        assert!(list_profiles(&mut unit_of_work).await.unwrap().is_empty());
        for name in ["Gestor", "Analista", "Editor"] {
            add_profile(&mut unit_of_work, input(name)).await.unwrap();
        }
        let names: Vec<String> = list_profiles(&mut unit_of_work).await.unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Analista", "Editor", "Gestor"]);
    }
}
