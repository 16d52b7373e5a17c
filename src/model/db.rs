use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::model::models::{DiseaseTotalType, WeeklyCaseRangeType};

/**
 * Database row for the employee table.
 */
pub type EmployeeDbResp = (Uuid, String, String, String, NaiveDate, Uuid);

/**
 * Database row for the profile table.
 */
pub type ProfileDbResp = (Uuid, String, String);

/**
 * Database row for the epidemiological data table.
 */
pub type EpidemiologicalRecordDbResp = (i64, NaiveDate, NaiveDate, String, i64);

/**
 * Aggregated row: period start, largest and smallest confirmed case count.
 */
pub type WeeklyCaseRangeDbResp = (NaiveDate, i64, i64);

/**
 * Aggregated row: disease and its confirmed case total.
 */
pub type DiseaseTotalDbResp = (String, i64);

/**
 * Database row for the user access log table.
 */
pub type UserAccessLogDbResp = (i64, String, String, DateTime<Utc>);

/**
 * Database row for the epidemiological data ingestion log table.
 */
pub type IngestionLogDbResp = (i64, i64, String, i64, DateTime<Utc>);

/**
 * An employee registered in the system.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Employee {
    pub id: Uuid,
    pub name: String,
    /**
     * National id number (CPF). Unique across employees.
     */
    pub national_id: String,
    /**
     * Registration number (matrícula). Unique across employees.
     */
    pub registration_number: String,
    pub admission_date: NaiveDate,
    /**
     * Owning organization. Not enforced as a foreign key.
     */
    pub organization_id: Uuid,
}

impl Employee {
    pub fn new(id: Uuid, name: String, national_id: String, registration_number: String, admission_date: NaiveDate, organization_id: Uuid) -> Self {
        Employee { id, name, national_id, registration_number, admission_date, organization_id }
    }
}

impl From<EmployeeDbResp> for Employee {
    fn from(row: EmployeeDbResp) -> Self {
        Employee::new(row.0, row.1, row.2, row.3, row.4, row.5)
    }
}

/**
 * An access profile. Name is unique.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub id: Uuid,
    pub name: String,
    pub description: String,
}

impl Profile {
    pub fn new(id: Uuid, name: String, description: String) -> Self {
        Profile { id, name, description }
    }
}

impl From<ProfileDbResp> for Profile {
    fn from(row: ProfileDbResp) -> Self {
        Profile::new(row.0, row.1, row.2)
    }
}

/**
 * Confirmed cases of one arbovirus in one municipality for one epidemiological week.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpidemiologicalRecord {
    pub ibge_code: i64,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub disease: String,
    pub confirmed_cases: i64,
}

impl EpidemiologicalRecord {
    pub fn new(ibge_code: i64, period_start: NaiveDate, period_end: NaiveDate, disease: String, confirmed_cases: i64) -> Self {
        EpidemiologicalRecord { ibge_code, period_start, period_end, disease, confirmed_cases }
    }
}

impl From<EpidemiologicalRecordDbResp> for EpidemiologicalRecord {
    fn from(row: EpidemiologicalRecordDbResp) -> Self {
        EpidemiologicalRecord::new(row.0, row.1, row.2, row.3, row.4)
    }
}

impl From<WeeklyCaseRangeDbResp> for WeeklyCaseRangeType {
    fn from(row: WeeklyCaseRangeDbResp) -> Self {
        WeeklyCaseRangeType { period_start: row.0, max_cases: row.1, min_cases: row.2 }
    }
}

impl From<DiseaseTotalDbResp> for DiseaseTotalType {
    fn from(row: DiseaseTotalDbResp) -> Self {
        DiseaseTotalType { disease: row.0, total_cases: row.1 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAccessLog {
    pub id: i64,
    pub user_email: String,
    pub path: String,
    pub accessed_at: DateTime<Utc>,
}

impl From<UserAccessLogDbResp> for UserAccessLog {
    fn from(row: UserAccessLogDbResp) -> Self {
        UserAccessLog { id: row.0, user_email: row.1, path: row.2, accessed_at: row.3 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionLog {
    pub id: i64,
    pub ibge_code: i64,
    pub disease: String,
    pub records_ingested: i64,
    pub ingested_at: DateTime<Utc>,
}

impl From<IngestionLogDbResp> for IngestionLog {
    fn from(row: IngestionLogDbResp) -> Self {
        IngestionLog { id: row.0, ibge_code: row.1, disease: row.2, records_ingested: row.3, ingested_at: row.4 }
    }
}
