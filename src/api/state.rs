use crate::{
    api::security::{CredentialVerifier, JwtSecurityService},
    service::{employee::EmployeeService, epidemiology::EpidemiologyService, profile::ProfileService},
};

/**
* Represents the application state shared across the Actix web application.
*/
pub struct AppState {
    /**
     * The JWT security service for issuing and validating tokens.
     */
    pub jwt_service: JwtSecurityService,
    /**
     * Decides which credential pairs may log in.
     */
    pub credential_verifier: Box<dyn CredentialVerifier>,
    pub employee_service: EmployeeService,
    pub profile_service: ProfileService,
    pub epidemiology_service: EpidemiologyService,
    /**
     * Require a token on the epidemiological data and log endpoints.
     */
    pub protect_data_endpoints: bool,
}

impl AppState {
    /**
     * Creates a new instance of `AppState`.
     */
    pub fn new(
        jwt_service: JwtSecurityService,
        credential_verifier: Box<dyn CredentialVerifier>,
        employee_service: EmployeeService,
        profile_service: ProfileService,
        epidemiology_service: EpidemiologyService,
        protect_data_endpoints: bool,
    ) -> Self {
        AppState { jwt_service, credential_verifier, employee_service, profile_service, epidemiology_service, protect_data_endpoints }
    }
}
