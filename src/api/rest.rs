use actix_web::{
    HttpRequest, HttpResponse, ResponseError,
    error::{JsonPayloadError, QueryPayloadError},
    http::StatusCode,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{
    apperror::{ApplicationError, ErrorType, FieldError},
    db::{EpidemiologicalRecord, Employee, IngestionLog, Profile, UserAccessLog},
    models::{
        DiseaseTotalType, EmployeeAddUpdateInputType, ExternalRecordFilter, FieldValidator, LocalRecordFilter, LoginInputType, PaginationInput, ProfileAddUpdateInputType, RecordSource,
        WeeklyCaseRangeType,
    },
};

/**
 * Page size used when only a start index is given.
 */
const DEFAULT_PAGE_SIZE: i64 = 100;

/***************** Employee models *********************/

/**
 * Request body for adding and updating employees. `idFuncionario` is only read on update.
 */
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeRequest {
    pub id_funcionario: Option<Uuid>,
    pub nome: Option<String>,
    pub cpf: Option<String>,
    pub matricula: Option<String>,
    pub data_admissao: Option<String>,
    pub id_empresa: Option<Uuid>,
}

impl EmployeeRequest {
    fn validate_fields(self, validator: &mut FieldValidator) -> EmployeeAddUpdateInputType {
        EmployeeAddUpdateInputType {
            name: validator.required_text("nome", self.nome, 150),
            national_id: validator.required_text("cpf", self.cpf, 14),
            registration_number: validator.required_text("matricula", self.matricula, 10),
            admission_date: validator.required_date("dataAdmissao", self.data_admissao),
            organization_id: validator.required("idEmpresa", self.id_empresa),
        }
    }

    /**
     * Validates the body of an update, which must carry the identity.
     */
    pub fn into_update_input(self) -> Result<(Uuid, EmployeeAddUpdateInputType), ApplicationError> {
        let mut validator = FieldValidator::new();
        let id = validator.required("idFuncionario", self.id_funcionario);
        let input = self.validate_fields(&mut validator);
        validator.finish()?;
        Ok((id, input))
    }
}

impl TryFrom<EmployeeRequest> for EmployeeAddUpdateInputType {
    type Error = ApplicationError;

    fn try_from(request: EmployeeRequest) -> Result<Self, Self::Error> {
        let mut validator = FieldValidator::new();
        let input = request.validate_fields(&mut validator);
        validator.finish()?;
        Ok(input)
    }
}

#[derive(Debug, Deserialize)]
pub struct EmployeeSearchQuery {
    pub nome: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeResponse {
    pub id_funcionario: Uuid,
    pub nome: String,
    pub cpf: String,
    pub matricula: String,
    pub data_admissao: NaiveDate,
    pub id_empresa: Uuid,
}

impl From<Employee> for EmployeeResponse {
    fn from(employee: Employee) -> Self {
        EmployeeResponse {
            id_funcionario: employee.id,
            nome: employee.name,
            cpf: employee.national_id,
            matricula: employee.registration_number,
            data_admissao: employee.admission_date,
            id_empresa: employee.organization_id,
        }
    }
}

/***************** Profile models *********************/

/**
 * Request body for adding and updating profiles. `idPerfil` is only read on update.
 */
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileRequest {
    pub id_perfil: Option<Uuid>,
    pub nome: Option<String>,
    pub descricao: Option<String>,
}

impl ProfileRequest {
    fn validate_fields(self, validator: &mut FieldValidator) -> ProfileAddUpdateInputType {
        ProfileAddUpdateInputType { name: validator.required_text("nome", self.nome, 150), description: validator.required_text("descricao", self.descricao, 255) }
    }

    pub fn into_update_input(self) -> Result<(Uuid, ProfileAddUpdateInputType), ApplicationError> {
        let mut validator = FieldValidator::new();
        let id = validator.required("idPerfil", self.id_perfil);
        let input = self.validate_fields(&mut validator);
        validator.finish()?;
        Ok((id, input))
    }
}

impl TryFrom<ProfileRequest> for ProfileAddUpdateInputType {
    type Error = ApplicationError;

    fn try_from(request: ProfileRequest) -> Result<Self, Self::Error> {
        let mut validator = FieldValidator::new();
        let input = request.validate_fields(&mut validator);
        validator.finish()?;
        Ok(input)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub id_perfil: Uuid,
    pub nome: String,
    pub descricao: String,
}

impl From<Profile> for ProfileResponse {
    fn from(profile: Profile) -> Self {
        ProfileResponse { id_perfil: profile.id, nome: profile.name, descricao: profile.description }
    }
}

/***************** Login models *********************/

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub senha: Option<String>,
}

impl TryFrom<LoginRequest> for LoginInputType {
    type Error = ApplicationError;

    fn try_from(request: LoginRequest) -> Result<Self, Self::Error> {
        let mut validator = FieldValidator::new();
        let email = validator.email("email", request.email);
        let password = validator.required("senha", request.senha.filter(|senha| !senha.is_empty()));
        validator.finish()?;
        Ok(LoginInputType { email, password })
    }
}

/***************** Epidemiological data models *********************/

/**
 * Query parameters selecting epidemiological records.
 *
 * `municipio` selects the external API and then requires the period and disease as well. It cannot be
 * combined with `codigoIbge`. Otherwise the local table is read and every parameter narrows the selection.
 */
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordQuery {
    pub municipio: Option<String>,
    pub codigo_ibge: Option<i64>,
    pub data_inicio: Option<String>,
    pub data_fim: Option<String>,
    pub arbovirose: Option<String>,
}

impl RecordQuery {
    /**
     * Source for the record listing, which must name a municipality either by name or by IBGE code.
     */
    pub fn filtered_source(self) -> Result<RecordSource, ApplicationError> {
        if self.municipio.is_none() && self.codigo_ibge.is_none() {
            return Err(ApplicationError::validation(vec![FieldError::new("municipio", "municipio or codigoIbge is required")]));
        }
        self.source(None)
    }

    /**
     * Source for the records of one municipality identified by its IBGE code.
     */
    pub fn municipality_source(self, ibge_code: i64) -> Result<RecordSource, ApplicationError> {
        self.source(Some(ibge_code))
    }

    /**
     * Source for the aggregations. Without parameters the whole local table is selected.
     */
    pub fn aggregate_source(self) -> Result<RecordSource, ApplicationError> {
        self.source(None)
    }

    fn source(self, ibge_code: Option<i64>) -> Result<RecordSource, ApplicationError> {
        let mut validator = FieldValidator::new();
        let source = match self.municipio {
            Some(municipality) if ibge_code.is_none() => {
                if self.codigo_ibge.is_some() {
                    validator.reject("codigoIbge", "must not be combined with municipio");
                }
                let municipality = validator.required_text("municipio", Some(municipality), 150);
                let period_given = self.data_inicio.is_some() && self.data_fim.is_some();
                let period_start = validator.required_date("dataInicio", self.data_inicio);
                let period_end = validator.required_date("dataFim", self.data_fim);
                let disease = validator.required_text("arbovirose", self.arbovirose, 50);
                if period_given && period_start > period_end {
                    validator.reject("dataFim", "must not be before dataInicio");
                }
                RecordSource::External(ExternalRecordFilter { municipality, period_start, period_end, disease })
            }
            _ => {
                let period_start = validator.optional_date("dataInicio", self.data_inicio);
                let period_end = validator.optional_date("dataFim", self.data_fim);
                if matches!((period_start, period_end), (Some(period_start), Some(period_end)) if period_start > period_end) {
                    validator.reject("dataFim", "must not be before dataInicio");
                }
                let disease = self.arbovirose.map(|disease| disease.trim().to_string()).filter(|disease| !disease.is_empty());
                RecordSource::Local(LocalRecordFilter { ibge_code: ibge_code.or(self.codigo_ibge), period_start, period_end, disease })
            }
        };
        validator.finish()?;
        Ok(source)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RecordResponse {
    pub codigo_ibge: i64,
    pub data_semana_inicio: NaiveDate,
    pub data_semana_fim: NaiveDate,
    pub arbovirose: String,
    pub casos_confirmados: i64,
}

impl From<EpidemiologicalRecord> for RecordResponse {
    fn from(record: EpidemiologicalRecord) -> Self {
        RecordResponse {
            codigo_ibge: record.ibge_code,
            data_semana_inicio: record.period_start,
            data_semana_fim: record.period_end,
            arbovirose: record.disease,
            casos_confirmados: record.confirmed_cases,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyCaseRangeResponse {
    pub data_semana_inicio: NaiveDate,
    pub max_casos: i64,
    pub min_casos: i64,
}

impl From<WeeklyCaseRangeType> for WeeklyCaseRangeResponse {
    fn from(range: WeeklyCaseRangeType) -> Self {
        WeeklyCaseRangeResponse { data_semana_inicio: range.period_start, max_casos: range.max_cases, min_casos: range.min_cases }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DiseaseTotalResponse {
    pub arbovirose: String,
    pub total_casos: i64,
}

impl From<DiseaseTotalType> for DiseaseTotalResponse {
    fn from(total: DiseaseTotalType) -> Self {
        DiseaseTotalResponse { arbovirose: total.disease, total_casos: total.total_cases }
    }
}

/***************** Log models *********************/

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessLogResponse {
    pub id: i64,
    pub email_usuario: String,
    pub rota: String,
    pub data_acesso: DateTime<Utc>,
}

impl From<UserAccessLog> for AccessLogResponse {
    fn from(log: UserAccessLog) -> Self {
        AccessLogResponse { id: log.id, email_usuario: log.user_email, rota: log.path, data_acesso: log.accessed_at }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionLogResponse {
    pub id: i64,
    pub codigo_ibge: i64,
    pub arbovirose: String,
    pub registros_incluidos: i64,
    pub data_inclusao: DateTime<Utc>,
}

impl From<IngestionLog> for IngestionLogResponse {
    fn from(log: IngestionLog) -> Self {
        IngestionLogResponse { id: log.id, codigo_ibge: log.ibge_code, arbovirose: log.disease, registros_incluidos: log.records_ingested, data_inclusao: log.ingested_at }
    }
}

/***************** Common models *********************/

/**
 * Pagination query parameters for API requests.
 */
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationQuery {
    /**
     * The index of the first item to return.
     */
    pub start_index: Option<i64>,
    /**
     * The size of the page to return.
     */
    pub page_size: Option<i64>,
}

impl PaginationQuery {
    /**
     * Converts the query into a validated page.
     *
     * # Returns
     * `None` if neither parameter is present.
     */
    pub fn into_input(self) -> Result<Option<PaginationInput>, ApplicationError> {
        if self.start_index.is_none() && self.page_size.is_none() {
            return Ok(None);
        }
        PaginationInput { start_index: self.start_index.unwrap_or(0), page_size: self.page_size.unwrap_or(DEFAULT_PAGE_SIZE) }.validate().map(Some)
    }
}

#[derive(Debug, Serialize)]
pub struct FieldErrorResponse {
    pub field: String,
    pub message: String,
}

/**
 * Error response structure for API errors.
 */
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /**
     * The error code associated with the error type.
     */
    pub code: u16,
    /**
     * A human-readable message describing the error.
     */
    pub message: String,
    /**
     * Offending fields of a validation error.
     */
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldErrorResponse>,
}

impl ResponseError for ApplicationError {
    fn status_code(&self) -> StatusCode {
        get_statuscode(&self.error_type)
    }

    /**
     * Generates an error response for the application error. Internal failures are logged and answered generically.
     */
    fn error_response(&self) -> HttpResponse {
        let message = match self.error_type {
            ErrorType::Initialization | ErrorType::DatabaseError | ErrorType::Application => {
                tracing::error!("{:?}: {}", self.error_type, self.message);
                "Internal server error".to_string()
            }
            ErrorType::Upstream => "No data available".to_string(),
            _ => self.message.clone(),
        };
        let fields = self.field_errors.iter().map(|field_error| FieldErrorResponse { field: field_error.field.clone(), message: field_error.message.clone() }).collect();
        let error_response = ErrorResponse { code: get_error_code(&self.error_type), message, fields };
        HttpResponse::build(self.status_code()).json(&error_response)
    }
}

/**
* Maps application errors to HTTP status codes.
*
* # Arguments
* `application_error`: The type of error that occurred.
*
* # Returns
* The corresponding HTTP status code.
*/
fn get_statuscode(application_error: &ErrorType) -> StatusCode {
    match application_error {
        ErrorType::JwtAuthorization => StatusCode::UNAUTHORIZED,
        ErrorType::Validation | ErrorType::ConstraintViolation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorType::NotFound | ErrorType::Upstream => StatusCode::NOT_FOUND,
        ErrorType::Initialization | ErrorType::DatabaseError | ErrorType::Application => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/**
 * Maps application errors to error codes.
 *
 * # Arguments
 * `application_error`: The type of error that occurred.
 *
 * # Returns
 * The corresponding error code.
 */
fn get_error_code(application_error: &ErrorType) -> u16 {
    match application_error {
        ErrorType::JwtAuthorization => 1000,
        ErrorType::Initialization => 1001,
        ErrorType::Application => 1002,
        ErrorType::DatabaseError => 1003,
        ErrorType::Validation => 1004,
        ErrorType::ConstraintViolation => 1005,
        ErrorType::NotFound => 1006,
        ErrorType::Upstream => 1007,
    }
}

/**
 * Turns unreadable JSON bodies into validation errors.
 */
pub fn json_error_handler(err: JsonPayloadError, _http_request: &HttpRequest) -> actix_web::Error {
    ApplicationError::validation(vec![FieldError::new("body", &err.to_string())]).into()
}

/**
 * Turns unparsable query strings into validation errors.
 */
pub fn query_error_handler(err: QueryPayloadError, _http_request: &HttpRequest) -> actix_web::Error {
    ApplicationError::validation(vec![FieldError::new("query", &err.to_string())]).into()
}
