use actix_web::{
    HttpRequest, HttpResponse, delete, get, post, put,
    web::{self, Path},
};
use tracing::{Instrument, instrument};
use uuid::Uuid;

use crate::{
    api::{
        rest::{
            AccessLogResponse, DiseaseTotalResponse, EmployeeRequest, EmployeeResponse, EmployeeSearchQuery, IngestionLogResponse, LoginRequest, PaginationQuery, ProfileRequest, ProfileResponse,
            RecordQuery, RecordResponse, WeeklyCaseRangeResponse, json_error_handler, query_error_handler,
        },
        state::AppState,
    },
    model::{
        apperror::{ApplicationError, ErrorType},
        models::{EmployeeAddUpdateInputType, LoginInputType, ProfileAddUpdateInputType},
    },
};

/**
 * Registers every endpoint together with the extractor configuration.
 */
pub fn configure(config: &mut web::ServiceConfig) {
    config
        .app_data(web::JsonConfig::default().error_handler(json_error_handler))
        .app_data(web::QueryConfig::default().error_handler(query_error_handler))
        .service(login)
        .service(records_list)
        .service(weekly_case_ranges)
        .service(disease_totals)
        .service(municipality_records)
        .service(access_logs)
        .service(ingestion_logs)
        .service(employee_list)
        .service(employee_by_national_id)
        .service(employee_by_registration_number)
        .service(employee_get)
        .service(employee_add)
        .service(employee_update)
        .service(employee_delete)
        .service(profile_list)
        .service(profile_by_name)
        .service(profile_get)
        .service(profile_add)
        .service(profile_update)
        .service(profile_delete);
}

/**
 * Exchanges the administrator credentials for a bearer token.
 */
#[instrument(skip(http_request, request_body, app_state), fields(service = "login", trace_id = get_trace_id(&http_request), result))]
#[post("/login")]
pub async fn login(http_request: HttpRequest, request_body: web::Json<LoginRequest>, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let login_input = LoginInputType::try_from(request_body.into_inner())?;
    let Some(role) = app_state.credential_verifier.verify(&login_input) else {
        tracing::Span::current().record("result", "rejected");
        return Err(ApplicationError::new(ErrorType::JwtAuthorization, "Invalid credentials".to_string()));
    };
    let token = app_state.jwt_service.issue_token(&login_input.email, &role)?;
    Ok(HttpResponse::Ok().json(token))
}

/***************** Epidemiological data *********************/

/**
 * Records of one municipality, selected by name through the external API or by IBGE code from the local table.
 */
#[instrument(skip(http_request, app_state), fields(service = "listRecords", trace_id = get_trace_id(&http_request), result))]
#[get("/municipios")]
pub async fn records_list(http_request: HttpRequest, query: web::Query<RecordQuery>, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    authorize_data_access(&http_request, &app_state)?;
    let source = query.into_inner().filtered_source()?;
    let records = app_state.epidemiology_service.get_records(&source).instrument(span.clone()).await?;
    span.record("result", records.len());
    data_response(records.into_iter().map(RecordResponse::from).collect())
}

/**
 * Records of the municipality with the given IBGE code.
 */
#[instrument(skip(http_request, app_state), fields(service = "municipalityRecords", trace_id = get_trace_id(&http_request), result))]
#[get("/municipios/{codigoIbge}")]
pub async fn municipality_records(path: Path<i64>, http_request: HttpRequest, query: web::Query<RecordQuery>, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    authorize_data_access(&http_request, &app_state)?;
    let source = query.into_inner().municipality_source(path.into_inner())?;
    let records = app_state.epidemiology_service.get_records(&source).instrument(span.clone()).await?;
    span.record("result", records.len());
    data_response(records.into_iter().map(RecordResponse::from).collect())
}

/**
 * Largest and smallest confirmed case count per reporting week.
 */
#[instrument(skip(http_request, app_state), fields(service = "weeklyCaseRanges", trace_id = get_trace_id(&http_request), result))]
#[get("/municipios/semana/maxmin")]
pub async fn weekly_case_ranges(http_request: HttpRequest, query: web::Query<RecordQuery>, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    authorize_data_access(&http_request, &app_state)?;
    let source = query.into_inner().aggregate_source()?;
    let ranges = app_state.epidemiology_service.get_weekly_case_ranges(&source).instrument(span.clone()).await?;
    span.record("result", ranges.len());
    data_response(ranges.into_iter().map(WeeklyCaseRangeResponse::from).collect())
}

/**
 * Confirmed case totals per disease.
 */
#[instrument(skip(http_request, app_state), fields(service = "diseaseTotals", trace_id = get_trace_id(&http_request), result))]
#[get("/municipios/total/arboviroses")]
pub async fn disease_totals(http_request: HttpRequest, query: web::Query<RecordQuery>, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    authorize_data_access(&http_request, &app_state)?;
    let source = query.into_inner().aggregate_source()?;
    let totals = app_state.epidemiology_service.get_disease_totals(&source).instrument(span.clone()).await?;
    span.record("result", totals.len());
    data_response(totals.into_iter().map(DiseaseTotalResponse::from).collect())
}

#[instrument(skip(http_request, app_state), fields(service = "accessLogs", trace_id = get_trace_id(&http_request), result))]
#[get("/logs/acesso")]
pub async fn access_logs(http_request: HttpRequest, pagination: web::Query<PaginationQuery>, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    authorize_data_access(&http_request, &app_state)?;
    let pagination_input = pagination.into_inner().into_input()?;
    let logs = app_state.epidemiology_service.get_access_logs(pagination_input).instrument(span).await?;
    Ok(HttpResponse::Ok().json(logs.into_iter().map(AccessLogResponse::from).collect::<Vec<_>>()))
}

#[instrument(skip(http_request, app_state), fields(service = "ingestionLogs", trace_id = get_trace_id(&http_request), result))]
#[get("/logs/inclusao")]
pub async fn ingestion_logs(http_request: HttpRequest, pagination: web::Query<PaginationQuery>, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    authorize_data_access(&http_request, &app_state)?;
    let pagination_input = pagination.into_inner().into_input()?;
    let logs = app_state.epidemiology_service.get_ingestion_logs(pagination_input).instrument(span).await?;
    Ok(HttpResponse::Ok().json(logs.into_iter().map(IngestionLogResponse::from).collect::<Vec<_>>()))
}

/***************** Employees *********************/

/**
 * Lists employees, optionally narrowed to names containing `nome`.
 */
#[instrument(skip(http_request, app_state), fields(service = "listEmployees", trace_id = get_trace_id(&http_request), result))]
#[get("/api/funcionario")]
pub async fn employee_list(http_request: HttpRequest, query: web::Query<EmployeeSearchQuery>, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    app_state.jwt_service.validate(&http_request)?;
    let name = query.into_inner().nome.filter(|nome| !nome.trim().is_empty());
    let employees = app_state.employee_service.list_employees(name.as_deref()).instrument(span).await?;
    list_response(employees.into_iter().map(EmployeeResponse::from).collect())
}

#[instrument(skip(http_request, app_state), fields(service = "getEmployee", trace_id = get_trace_id(&http_request), result))]
#[get("/api/funcionario/{id}")]
pub async fn employee_get(path: Path<Uuid>, http_request: HttpRequest, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    app_state.jwt_service.validate(&http_request)?;
    let employee = app_state.employee_service.get_employee(path.into_inner()).instrument(span).await?;
    Ok(HttpResponse::Ok().json(EmployeeResponse::from(employee)))
}

#[instrument(skip(http_request, app_state), fields(service = "getEmployeeByNationalId", trace_id = get_trace_id(&http_request), result))]
#[get("/api/funcionario/cpf/{cpf}")]
pub async fn employee_by_national_id(path: Path<String>, http_request: HttpRequest, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    app_state.jwt_service.validate(&http_request)?;
    let employee = app_state.employee_service.get_employee_by_national_id(&path.into_inner()).instrument(span).await?;
    Ok(HttpResponse::Ok().json(EmployeeResponse::from(employee)))
}

#[instrument(skip(http_request, app_state), fields(service = "getEmployeeByRegistrationNumber", trace_id = get_trace_id(&http_request), result))]
#[get("/api/funcionario/matricula/{matricula}")]
pub async fn employee_by_registration_number(path: Path<String>, http_request: HttpRequest, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    app_state.jwt_service.validate(&http_request)?;
    let employee = app_state.employee_service.get_employee_by_registration_number(&path.into_inner()).instrument(span).await?;
    Ok(HttpResponse::Ok().json(EmployeeResponse::from(employee)))
}

/**
 * Add a new employee.
 */
#[instrument(skip(http_request, request_body, app_state), fields(service = "addEmployee", trace_id = get_trace_id(&http_request), result))]
#[post("/api/funcionario")]
pub async fn employee_add(http_request: HttpRequest, request_body: web::Json<EmployeeRequest>, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    app_state.jwt_service.validate(&http_request)?;
    let employee_input = EmployeeAddUpdateInputType::try_from(request_body.into_inner())?;
    let employee = app_state.employee_service.add_employee(employee_input).instrument(span).await?;
    Ok(HttpResponse::Created().json(EmployeeResponse::from(employee)))
}

/**
 * Replace every field of an existing employee identified by `idFuncionario`.
 */
#[instrument(skip(http_request, request_body, app_state), fields(service = "updateEmployee", trace_id = get_trace_id(&http_request), result))]
#[put("/api/funcionario")]
pub async fn employee_update(http_request: HttpRequest, request_body: web::Json<EmployeeRequest>, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    app_state.jwt_service.validate(&http_request)?;
    let (id, employee_input) = request_body.into_inner().into_update_input()?;
    let employee = app_state.employee_service.update_employee(id, employee_input).instrument(span).await?;
    Ok(HttpResponse::Ok().json(EmployeeResponse::from(employee)))
}

#[instrument(skip(http_request, app_state), fields(service = "deleteEmployee", trace_id = get_trace_id(&http_request), result))]
#[delete("/api/funcionario/{id}")]
pub async fn employee_delete(path: Path<Uuid>, http_request: HttpRequest, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    app_state.jwt_service.validate(&http_request)?;
    let employee = app_state.employee_service.delete_employee(path.into_inner()).instrument(span).await?;
    Ok(HttpResponse::Ok().json(EmployeeResponse::from(employee)))
}

/***************** Profiles *********************/

#[instrument(skip(http_request, app_state), fields(service = "listProfiles", trace_id = get_trace_id(&http_request), result))]
#[get("/api/perfil")]
pub async fn profile_list(http_request: HttpRequest, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    app_state.jwt_service.validate(&http_request)?;
    let profiles = app_state.profile_service.list_profiles().instrument(span).await?;
    list_response(profiles.into_iter().map(ProfileResponse::from).collect())
}

#[instrument(skip(http_request, app_state), fields(service = "getProfile", trace_id = get_trace_id(&http_request), result))]
#[get("/api/perfil/{id}")]
pub async fn profile_get(path: Path<Uuid>, http_request: HttpRequest, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    app_state.jwt_service.validate(&http_request)?;
    let profile = app_state.profile_service.get_profile(path.into_inner()).instrument(span).await?;
    Ok(HttpResponse::Ok().json(ProfileResponse::from(profile)))
}

#[instrument(skip(http_request, app_state), fields(service = "getProfileByName", trace_id = get_trace_id(&http_request), result))]
#[get("/api/perfil/nome/{nome}")]
pub async fn profile_by_name(path: Path<String>, http_request: HttpRequest, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    app_state.jwt_service.validate(&http_request)?;
    let profile = app_state.profile_service.get_profile_by_name(&path.into_inner()).instrument(span).await?;
    Ok(HttpResponse::Ok().json(ProfileResponse::from(profile)))
}

#[instrument(skip(http_request, request_body, app_state), fields(service = "addProfile", trace_id = get_trace_id(&http_request), result))]
#[post("/api/perfil")]
pub async fn profile_add(http_request: HttpRequest, request_body: web::Json<ProfileRequest>, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    app_state.jwt_service.validate(&http_request)?;
    let profile_input = ProfileAddUpdateInputType::try_from(request_body.into_inner())?;
    let profile = app_state.profile_service.add_profile(profile_input).instrument(span).await?;
    Ok(HttpResponse::Created().json(ProfileResponse::from(profile)))
}

#[instrument(skip(http_request, request_body, app_state), fields(service = "updateProfile", trace_id = get_trace_id(&http_request), result))]
#[put("/api/perfil")]
pub async fn profile_update(http_request: HttpRequest, request_body: web::Json<ProfileRequest>, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    app_state.jwt_service.validate(&http_request)?;
    let (id, profile_input) = request_body.into_inner().into_update_input()?;
    let profile = app_state.profile_service.update_profile(id, profile_input).instrument(span).await?;
    Ok(HttpResponse::Ok().json(ProfileResponse::from(profile)))
}

#[instrument(skip(http_request, app_state), fields(service = "deleteProfile", trace_id = get_trace_id(&http_request), result))]
#[delete("/api/perfil/{id}")]
pub async fn profile_delete(path: Path<Uuid>, http_request: HttpRequest, app_state: web::Data<AppState>) -> Result<HttpResponse, ApplicationError> {
    let span = tracing::Span::current();
    app_state.jwt_service.validate(&http_request)?;
    let profile = app_state.profile_service.delete_profile(path.into_inner()).instrument(span).await?;
    Ok(HttpResponse::Ok().json(ProfileResponse::from(profile)))
}

/**
 * The data and log endpoints are public unless configured otherwise.
 */
fn authorize_data_access(http_request: &HttpRequest, app_state: &AppState) -> Result<(), ApplicationError> {
    if app_state.protect_data_endpoints {
        app_state.jwt_service.validate(http_request)?;
    }
    Ok(())
}

/**
 * 200 with the items, or not found when there are none.
 */
fn data_response<T: serde::Serialize>(items: Vec<T>) -> Result<HttpResponse, ApplicationError> {
    if items.is_empty() {
        return Err(ApplicationError::new(ErrorType::NotFound, "No data available".to_string()));
    }
    Ok(HttpResponse::Ok().json(items))
}

/**
 * 200 with the items, or 204 when the store is empty.
 */
fn list_response<T: serde::Serialize>(items: Vec<T>) -> Result<HttpResponse, ApplicationError> {
    if items.is_empty() {
        return Ok(HttpResponse::NoContent().finish());
    }
    Ok(HttpResponse::Ok().json(items))
}

/**
 * Retrieves the trace ID from the HTTP request headers.
 * If the trace ID is not present, a new UUID is generated.
 */
fn get_trace_id(http_request: &HttpRequest) -> String {
    http_request.headers().get("X-Trace-ID").and_then(|v| v.to_str().ok().map(std::string::ToString::to_string)).unwrap_or_else(|| uuid::Uuid::new_v4().to_string())
}
