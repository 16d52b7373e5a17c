use chrono::{NaiveDate, NaiveDateTime};
use uuid::Uuid;

use crate::model::apperror::{ApplicationError, ErrorType, FieldError};

/**
 * Largest page a caller may request.
 */
const MAX_PAGE_SIZE: i64 = 1000;

/**
 * Accumulates field errors while a request is turned into an input type.
 * Failed fields yield a default value; `finish` rejects the whole input if any field failed.
 */
#[derive(Debug, Default)]
pub struct FieldValidator {
    errors: Vec<FieldError>,
}

impl FieldValidator {
    pub fn new() -> Self {
        FieldValidator::default()
    }

    /**
     * Required, non-blank text of at most `max_length` characters. Surrounding whitespace is removed.
     */
    pub fn required_text(&mut self, field: &str, value: Option<String>, max_length: usize) -> String {
        let Some(value) = value.map(|value| value.trim().to_string()).filter(|value| !value.is_empty()) else {
            self.errors.push(FieldError::new(field, "is required"));
            return String::new();
        };
        if value.chars().count() > max_length {
            self.errors.push(FieldError::new(field, &format!("must be at most {max_length} characters")));
        }
        value
    }

    pub fn required<T: Default>(&mut self, field: &str, value: Option<T>) -> T {
        match value {
            Some(value) => value,
            None => {
                self.errors.push(FieldError::new(field, "is required"));
                T::default()
            }
        }
    }

    pub fn required_date(&mut self, field: &str, value: Option<String>) -> NaiveDate {
        let Some(value) = value else {
            self.errors.push(FieldError::new(field, "is required"));
            return NaiveDate::default();
        };
        self.optional_date(field, Some(value)).unwrap_or_default()
    }

    /**
     * Accepts `YYYY-MM-DD` or a full `YYYY-MM-DDTHH:MM:SS` timestamp whose time part is ignored.
     */
    pub fn optional_date(&mut self, field: &str, value: Option<String>) -> Option<NaiveDate> {
        let value = value?;
        let date = parse_date(value.trim());
        if date.is_none() {
            self.errors.push(FieldError::new(field, "must be a date formatted as YYYY-MM-DD"));
        }
        date
    }

    pub fn email(&mut self, field: &str, value: Option<String>) -> String {
        let value = self.required_text(field, value, 255);
        if !value.is_empty() && !is_email(&value) {
            self.errors.push(FieldError::new(field, "must be a valid email address"));
        }
        value
    }

    /**
     * Adds a field error for a condition that spans more than one field.
     */
    pub fn reject(&mut self, field: &str, message: &str) {
        self.errors.push(FieldError::new(field, message));
    }

    pub fn finish(self) -> Result<(), ApplicationError> {
        if self.errors.is_empty() { Ok(()) } else { Err(ApplicationError::validation(self.errors)) }
    }
}

/**
 * Parses a whole `YYYY-MM-DD` date or a `YYYY-MM-DDTHH:MM:SS[.fff]` timestamp. Anything else, trailing characters included, is rejected.
 */
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").map(|timestamp| timestamp.date()))
        .ok()
}

fn is_email(value: &str) -> bool {
    let mut parts = value.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.'),
        _ => false,
    }
}

/**
 * Pagination input. Only used by the log listings.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationInput {
    pub start_index: i64,
    pub page_size: i64,
}

impl PaginationInput {
    /**
     * Validates the pagination input.
     *
     * # Returns
     * The input itself, or a validation error if start index or page size are out of range.
     */
    pub fn validate(self) -> Result<Self, ApplicationError> {
        if self.start_index < 0 {
            return Err(ApplicationError::validation(vec![FieldError::new("startIndex", "must not be negative")]));
        }
        if self.page_size < 1 || self.page_size > MAX_PAGE_SIZE {
            return Err(ApplicationError::validation(vec![FieldError::new("pageSize", &format!("must be between 1 and {MAX_PAGE_SIZE}"))]));
        }
        Ok(self)
    }
}

/**
 * Validated employee data for insert and update.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmployeeAddUpdateInputType {
    pub name: String,
    pub national_id: String,
    pub registration_number: String,
    pub admission_date: NaiveDate,
    pub organization_id: Uuid,
}

/**
 * Validated profile data for insert and update.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileAddUpdateInputType {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginInputType {
    pub email: String,
    pub password: String,
}

/**
 * Filter for the external statistics API. All parts are mandatory upstream.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalRecordFilter {
    pub municipality: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub disease: String,
}

/**
 * Filter for the local epidemiological table. Absent parts match everything.
 */
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalRecordFilter {
    pub ibge_code: Option<i64>,
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    pub disease: Option<String>,
}

/**
 * Where epidemiological records are read from.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordSource {
    External(ExternalRecordFilter),
    Local(LocalRecordFilter),
}

impl RecordSource {
    /**
     * Returns true if the source filters down to something narrower than the whole local table.
     */
    pub fn is_filtered(&self) -> bool {
        match self {
            RecordSource::External(_) => true,
            RecordSource::Local(filter) => filter != &LocalRecordFilter::default(),
        }
    }
}

/**
 * Largest and smallest confirmed case count among the records of one reporting period.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeeklyCaseRangeType {
    pub period_start: NaiveDate,
    pub max_cases: i64,
    pub min_cases: i64,
}

/**
 * Sum of confirmed cases for one disease.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiseaseTotalType {
    pub disease: String,
    pub total_cases: i64,
}

/**
 * Returned when an operation needs the database but the service was built without one.
 */
pub fn no_database_error() -> ApplicationError {
    ApplicationError::new(ErrorType::DatabaseError, "No database connection available".to_string())
}
