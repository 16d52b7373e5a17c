use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    dao::repository::{EmployeeRepository, ProfileRepository, Repository, UnitOfWork},
    model::{
        apperror::{ApplicationError, ErrorType},
        db::{Employee, Profile},
    },
};

/**
 * Table contents of the in-memory store. Unique columns are enforced the way the database indexes do.
 */
#[derive(Debug, Clone, Default)]
pub struct MemoryTables {
    pub employees: Vec<Employee>,
    pub profiles: Vec<Profile>,
}

/**
 * Unit of work over in-memory tables. A transaction works on a copy that replaces the tables on commit.
 */
#[derive(Debug, Default)]
pub struct MemoryUnitOfWork {
    committed: MemoryTables,
    pending: Option<MemoryTables>,
}

impl MemoryUnitOfWork {
    pub fn new() -> Self {
        MemoryUnitOfWork::default()
    }

    /**
     * Tables as visible after the last commit.
     */
    pub fn committed(&self) -> &MemoryTables {
        &self.committed
    }

    fn tables(&mut self) -> &mut MemoryTables {
        match &mut self.pending {
            Some(pending) => pending,
            None => &mut self.committed,
        }
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    type Employees<'a> = MemoryEmployeeRepository<'a>;
    type Profiles<'a> = MemoryProfileRepository<'a>;

    async fn begin_transaction(&mut self) -> Result<(), ApplicationError> {
        if self.pending.is_some() {
            return Err(ApplicationError::new(ErrorType::Application, "Transaction already started".to_string()));
        }
        self.pending = Some(self.committed.clone());
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), ApplicationError> {
        let pending = self.pending.take().ok_or_else(|| ApplicationError::new(ErrorType::Application, "No transaction to commit".to_string()))?;
        self.committed = pending;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), ApplicationError> {
        self.pending.take().ok_or_else(|| ApplicationError::new(ErrorType::Application, "No transaction to roll back".to_string()))?;
        Ok(())
    }

    fn employees(&mut self) -> Self::Employees<'_> {
        MemoryEmployeeRepository { tables: self.tables() }
    }

    fn profiles(&mut self) -> Self::Profiles<'_> {
        MemoryProfileRepository { tables: self.tables() }
    }
}

fn already_exists() -> ApplicationError {
    ApplicationError::new(ErrorType::ConstraintViolation, "Already exists".to_string())
}

fn not_found(entity: &str) -> ApplicationError {
    ApplicationError::new(ErrorType::NotFound, format!("{entity} not found"))
}

pub struct MemoryEmployeeRepository<'a> {
    tables: &'a mut MemoryTables,
}

impl MemoryEmployeeRepository<'_> {
    fn conflicts(&self, entity: &Employee) -> bool {
        self.tables
            .employees
            .iter()
            .any(|existing| existing.id != entity.id && (existing.national_id == entity.national_id || existing.registration_number == entity.registration_number))
    }
}

#[async_trait]
impl Repository<Employee> for MemoryEmployeeRepository<'_> {
    async fn insert(&mut self, entity: &Employee) -> Result<(), ApplicationError> {
        if self.conflicts(entity) || self.tables.employees.iter().any(|existing| existing.id == entity.id) {
            return Err(already_exists());
        }
        self.tables.employees.push(entity.clone());
        Ok(())
    }

    async fn update(&mut self, entity: &Employee) -> Result<(), ApplicationError> {
        if self.conflicts(entity) {
            return Err(already_exists());
        }
        let existing = self.tables.employees.iter_mut().find(|existing| existing.id == entity.id).ok_or_else(|| not_found("Employee"))?;
        *existing = entity.clone();
        Ok(())
    }

    async fn delete(&mut self, entity: &Employee) -> Result<(), ApplicationError> {
        let position = self.tables.employees.iter().position(|existing| existing.id == entity.id).ok_or_else(|| not_found("Employee"))?;
        self.tables.employees.remove(position);
        Ok(())
    }

    async fn get_by_id(&mut self, id: Uuid) -> Result<Option<Employee>, ApplicationError> {
        Ok(self.tables.employees.iter().find(|existing| existing.id == id).cloned())
    }

    async fn list(&mut self) -> Result<Vec<Employee>, ApplicationError> {
        let mut employees = self.tables.employees.clone();
        employees.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(employees)
    }
}

#[async_trait]
impl EmployeeRepository for MemoryEmployeeRepository<'_> {
    async fn get_by_national_id(&mut self, national_id: &str) -> Result<Option<Employee>, ApplicationError> {
        Ok(self.tables.employees.iter().find(|existing| existing.national_id == national_id).cloned())
    }

    async fn get_by_registration_number(&mut self, registration_number: &str) -> Result<Option<Employee>, ApplicationError> {
        Ok(self.tables.employees.iter().find(|existing| existing.registration_number == registration_number).cloned())
    }

    async fn find_by_name(&mut self, fragment: &str) -> Result<Vec<Employee>, ApplicationError> {
        let fragment = fragment.to_lowercase();
        let mut employees: Vec<Employee> = self.list().await?;
        employees.retain(|employee| employee.name.to_lowercase().contains(&fragment));
        Ok(employees)
    }
}

pub struct MemoryProfileRepository<'a> {
    tables: &'a mut MemoryTables,
}

impl MemoryProfileRepository<'_> {
    fn conflicts(&self, entity: &Profile) -> bool {
        self.tables.profiles.iter().any(|existing| existing.id != entity.id && existing.name == entity.name)
    }
}

#[async_trait]
impl Repository<Profile> for MemoryProfileRepository<'_> {
    async fn insert(&mut self, entity: &Profile) -> Result<(), ApplicationError> {
        if self.conflicts(entity) || self.tables.profiles.iter().any(|existing| existing.id == entity.id) {
            return Err(already_exists());
        }
        self.tables.profiles.push(entity.clone());
        Ok(())
    }

    async fn update(&mut self, entity: &Profile) -> Result<(), ApplicationError> {
        if self.conflicts(entity) {
            return Err(already_exists());
        }
        let existing = self.tables.profiles.iter_mut().find(|existing| existing.id == entity.id).ok_or_else(|| not_found("Profile"))?;
        *existing = entity.clone();
        Ok(())
    }

    async fn delete(&mut self, entity: &Profile) -> Result<(), ApplicationError> {
        let position = self.tables.profiles.iter().position(|existing| existing.id == entity.id).ok_or_else(|| not_found("Profile"))?;
        self.tables.profiles.remove(position);
        Ok(())
    }

    async fn get_by_id(&mut self, id: Uuid) -> Result<Option<Profile>, ApplicationError> {
        Ok(self.tables.profiles.iter().find(|existing| existing.id == id).cloned())
    }

    async fn list(&mut self) -> Result<Vec<Profile>, ApplicationError> {
        let mut profiles = self.tables.profiles.clone();
        profiles.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(profiles)
    }
}

#[async_trait]
impl ProfileRepository for MemoryProfileRepository<'_> {
    async fn get_by_name(&mut self, name: &str) -> Result<Option<Profile>, ApplicationError> {
        Ok(self.tables.profiles.iter().find(|existing| existing.name == name).cloned())
    }
}

#[cfg(test)]
mod test {
    use chrono::NaiveDate;

    use super::*;

    #[tokio::test]
    async fn test_rollback_discards_changes_of_all_repositories() {
        let mut unit_of_work = MemoryUnitOfWork::new();
        unit_of_work.begin_transaction().await.unwrap();
        unit_of_work.profiles().insert(&Profile::new(Uuid::new_v4(), "Gestor".to_string(), "Tudo".to_string())).await.unwrap();
        assert_eq!(unit_of_work.profiles().list().await.unwrap().len(), 1);
        unit_of_work.rollback().await.unwrap();
        assert!(unit_of_work.profiles().list().await.unwrap().is_empty());
        assert!(unit_of_work.committed().profiles.is_empty());
    }

    #[tokio::test]
    async fn test_repositories_share_one_transaction() {
        let mut unit_of_work = MemoryUnitOfWork::new();
        let employee = Employee::new(Uuid::new_v4(), "Bruna".to_string(), "111.222.333-44".to_string(), "B0001".to_string(), NaiveDate::from_ymd_opt(2022, 3, 1).unwrap(), Uuid::new_v4());
        let profile = Profile::new(Uuid::new_v4(), "Analista".to_string(), "Consulta".to_string());

        unit_of_work.begin_transaction().await.unwrap();
        unit_of_work.employees().insert(&employee).await.unwrap();
        unit_of_work.profiles().insert(&profile).await.unwrap();
        assert_eq!(unit_of_work.employees().get_by_id(employee.id).await.unwrap(), Some(employee.clone()));
        unit_of_work.rollback().await.unwrap();
        assert!(unit_of_work.committed().employees.is_empty());
        assert!(unit_of_work.committed().profiles.is_empty());

        unit_of_work.begin_transaction().await.unwrap();
        unit_of_work.employees().insert(&employee).await.unwrap();
        unit_of_work.profiles().insert(&profile).await.unwrap();
        unit_of_work.commit().await.unwrap();
        assert_eq!(unit_of_work.committed().employees, vec![employee]);
        assert_eq!(unit_of_work.committed().profiles, vec![profile]);
    }

    #[tokio::test]
    async fn test_commit_without_transaction_fails() {
        let mut unit_of_work = MemoryUnitOfWork::new();
        assert!(unit_of_work.commit().await.is_err());
        assert!(unit_of_work.rollback().await.is_err());
    }

    #[tokio::test]
    async fn test_list_is_empty_on_empty_store() {
        let mut unit_of_work = MemoryUnitOfWork::new();
        assert!(unit_of_work.employees().list().await.unwrap().is_empty());
        assert!(unit_of_work.profiles().list().await.unwrap().is_empty());
    }
}
