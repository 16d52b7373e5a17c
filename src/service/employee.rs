use sqlx::{Pool, Postgres};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    dao::{
        repository::{EmployeeRepository, Repository, UnitOfWork, complete},
        unit_of_work::PgUnitOfWork,
    },
    model::{
        apperror::{ApplicationError, ErrorType},
        db::Employee,
        models::{EmployeeAddUpdateInputType, no_database_error},
    },
};

/**
 * Represents the service for managing employees.
 */
pub struct EmployeeService {
    /**
     * Optional connection pool. Without one every operation fails with a database error.
     */
    connection_pool: Option<Pool<Postgres>>,
}

impl EmployeeService {
    /**
     * Creates a new instance of `EmployeeService`.
     *
     * # Arguments
     * `connection_pool`: Optional connection pool for database operations.
     */
    pub fn new(connection_pool: Option<Pool<Postgres>>) -> Self {
        EmployeeService { connection_pool }
    }

    async fn unit_of_work(&self) -> Result<PgUnitOfWork, ApplicationError> {
        let Some(connection_pool) = &self.connection_pool else {
            return Err(no_database_error());
        };
        PgUnitOfWork::acquire(connection_pool).await
    }

    pub async fn add_employee(&self, input: EmployeeAddUpdateInputType) -> Result<Employee, ApplicationError> {
        add_employee(&mut self.unit_of_work().await?, input).await
    }

    pub async fn update_employee(&self, id: Uuid, input: EmployeeAddUpdateInputType) -> Result<Employee, ApplicationError> {
        update_employee(&mut self.unit_of_work().await?, id, input).await
    }

    pub async fn delete_employee(&self, id: Uuid) -> Result<Employee, ApplicationError> {
        delete_employee(&mut self.unit_of_work().await?, id).await
    }

    pub async fn get_employee(&self, id: Uuid) -> Result<Employee, ApplicationError> {
        get_employee(&mut self.unit_of_work().await?, id).await
    }

    pub async fn get_employee_by_national_id(&self, national_id: &str) -> Result<Employee, ApplicationError> {
        get_employee_by_national_id(&mut self.unit_of_work().await?, national_id).await
    }

    pub async fn get_employee_by_registration_number(&self, registration_number: &str) -> Result<Employee, ApplicationError> {
        get_employee_by_registration_number(&mut self.unit_of_work().await?, registration_number).await
    }

    pub async fn list_employees(&self, name: Option<&str>) -> Result<Vec<Employee>, ApplicationError> {
        list_employees(&mut self.unit_of_work().await?, name).await
    }
}

fn employee_not_found() -> ApplicationError {
    ApplicationError::new(ErrorType::NotFound, "Employee not found".to_string())
}

/**
 * Rejects national ids and registration numbers held by an employee other than `id`.
 */
async fn check_unique_fields<U: UnitOfWork>(unit_of_work: &mut U, id: Option<Uuid>, input: &EmployeeAddUpdateInputType) -> Result<(), ApplicationError> {
    if let Some(existing) = unit_of_work.employees().get_by_national_id(&input.national_id).await? {
        if Some(existing.id) != id {
            return Err(ApplicationError::new(ErrorType::ConstraintViolation, "The national id is already registered".to_string()));
        }
    }
    if let Some(existing) = unit_of_work.employees().get_by_registration_number(&input.registration_number).await? {
        if Some(existing.id) != id {
            return Err(ApplicationError::new(ErrorType::ConstraintViolation, "The registration number is already registered".to_string()));
        }
    }
    Ok(())
}

fn to_employee(id: Uuid, input: EmployeeAddUpdateInputType) -> Employee {
    Employee::new(id, input.name, input.national_id, input.registration_number, input.admission_date, input.organization_id)
}

/**
 * Adds a new employee with a generated identity.
 *
 * # Returns
 * The stored employee, or `ConstraintViolation` if the national id or registration number is taken.
 */
#[instrument(skip(unit_of_work, input), fields(result))]
pub async fn add_employee<U: UnitOfWork>(unit_of_work: &mut U, input: EmployeeAddUpdateInputType) -> Result<Employee, ApplicationError> {
    unit_of_work.begin_transaction().await?;
    let result = async {
        check_unique_fields(unit_of_work, None, &input).await?;
        let employee = to_employee(Uuid::new_v4(), input);
        unit_of_work.employees().insert(&employee).await?;
        Ok::<Employee, ApplicationError>(employee)
    }
    .await;
    complete(unit_of_work, result).await
}

/**
 * Replaces every field of an existing employee.
 *
 * # Returns
 * The stored employee, `NotFound` if `id` is unknown, or `ConstraintViolation` if a unique field belongs to another employee.
 */
#[instrument(skip(unit_of_work, input), fields(result))]
pub async fn update_employee<U: UnitOfWork>(unit_of_work: &mut U, id: Uuid, input: EmployeeAddUpdateInputType) -> Result<Employee, ApplicationError> {
    unit_of_work.begin_transaction().await?;
    let result = async {
        unit_of_work.employees().get_by_id(id).await?.ok_or_else(employee_not_found)?;
        check_unique_fields(unit_of_work, Some(id), &input).await?;
        let employee = to_employee(id, input);
        unit_of_work.employees().update(&employee).await?;
        Ok::<Employee, ApplicationError>(employee)
    }
    .await;
    complete(unit_of_work, result).await
}

/**
 * Deletes an employee.
 *
 * # Returns
 * The deleted employee, or `NotFound` if `id` is unknown.
 */
#[instrument(skip(unit_of_work), fields(result))]
pub async fn delete_employee<U: UnitOfWork>(unit_of_work: &mut U, id: Uuid) -> Result<Employee, ApplicationError> {
    unit_of_work.begin_transaction().await?;
    let result = async {
        let employee = unit_of_work.employees().get_by_id(id).await?.ok_or_else(employee_not_found)?;
        unit_of_work.employees().delete(&employee).await?;
        Ok::<Employee, ApplicationError>(employee)
    }
    .await;
    complete(unit_of_work, result).await
}

pub async fn get_employee<U: UnitOfWork>(unit_of_work: &mut U, id: Uuid) -> Result<Employee, ApplicationError> {
    unit_of_work.employees().get_by_id(id).await?.ok_or_else(employee_not_found)
}

pub async fn get_employee_by_national_id<U: UnitOfWork>(unit_of_work: &mut U, national_id: &str) -> Result<Employee, ApplicationError> {
    unit_of_work.employees().get_by_national_id(national_id).await?.ok_or_else(employee_not_found)
}

pub async fn get_employee_by_registration_number<U: UnitOfWork>(unit_of_work: &mut U, registration_number: &str) -> Result<Employee, ApplicationError> {
    unit_of_work.employees().get_by_registration_number(registration_number).await?.ok_or_else(employee_not_found)
}

/**
 * Lists employees ascending by name, optionally only those whose name contains `name`.
 */
pub async fn list_employees<U: UnitOfWork>(unit_of_work: &mut U, name: Option<&str>) -> Result<Vec<Employee>, ApplicationError> {
    match name.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => unit_of_work.employees().find_by_name(name).await,
        None => unit_of_work.employees().list().await,
    }
}
