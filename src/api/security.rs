use std::str::FromStr;

use actix_web::{FromRequest, HttpRequest};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::model::{
    apperror::{ApplicationError, ErrorType},
    config::AdministratorCredential,
    models::LoginInputType,
};

/**
 * Claims carried by issued tokens.
 */
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claim {
    pub sub: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

/**
 * Decides whether a credential pair may log in.
 */
pub trait CredentialVerifier: Send + Sync {
    /**
     * Verifies the credentials.
     *
     * # Returns
     * The role to put into the token, or `None` if the credentials are not accepted.
     */
    fn verify(&self, login: &LoginInputType) -> Option<String>;
}

/**
 * Accepts the single administrator credential pair read from the configuration.
 */
pub struct ConfiguredCredentialVerifier {
    administrator: AdministratorCredential,
}

impl ConfiguredCredentialVerifier {
    pub fn new(administrator: AdministratorCredential) -> Self {
        ConfiguredCredentialVerifier { administrator }
    }
}

impl CredentialVerifier for ConfiguredCredentialVerifier {
    fn verify(&self, login: &LoginInputType) -> Option<String> {
        (login.email.eq_ignore_ascii_case(&self.administrator.email) && login.password == self.administrator.password).then(|| self.administrator.role.clone())
    }
}

/**
 * JWT Security Service for issuing and validating bearer tokens.
 */
#[derive(Clone)]
pub struct JwtSecurityService {
    /**
     * The encoding key used to sign tokens.
     */
    encoding_key: EncodingKey,
    /**
     * The decoding key used to verify tokens.
     */
    decoding_key: DecodingKey,
    /**
     * Signing algorithm.
     */
    algorithm: Algorithm,
    /**
     * The validation rules for tokens.
     */
    validation: Validation,
    /**
     * Token lifetime in minutes.
     */
    expiration_minutes: i64,
}

impl JwtSecurityService {
    /**
     * Creates a new instance of JwtSecurityService.
     *
     * # Arguments
     * `secret`: Shared secret used for signing and verification.
     * `algorithm`: One of HS256, HS384 or HS512.
     * `expiration_minutes`: Lifetime of issued tokens.
     *
     * # Returns
     * A Result containing the JwtSecurityService or an ApplicationError if initialization fails.
     */
    pub fn new(secret: &str, algorithm: &str, expiration_minutes: i64) -> Result<Self, ApplicationError> {
        let algorithm = Algorithm::from_str(algorithm).map_err(|err| ApplicationError::new(ErrorType::Initialization, format!("Invalid algorithm: {err}")))?;
        if !matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
            return Err(ApplicationError::new(ErrorType::Initialization, "Unsupported algorithm, only HMAC algorithms can be used with a shared secret".to_string()));
        }
        if secret.is_empty() {
            return Err(ApplicationError::new(ErrorType::Initialization, "Token secret must not be empty".to_string()));
        }
        if expiration_minutes <= 0 {
            return Err(ApplicationError::new(ErrorType::Initialization, "Token expiration must be positive".to_string()));
        }
        let mut validation = Validation::new(algorithm);
        validation.leeway = 0;
        Ok(JwtSecurityService {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            algorithm,
            validation,
            expiration_minutes,
        })
    }

    /**
     * Issues a token valid from now.
     */
    pub fn issue_token(&self, subject: &str, role: &str) -> Result<String, ApplicationError> {
        self.issue_token_at(subject, role, Utc::now())
    }

    /**
     * Issues a token as if it was issued at `issued_at`.
     *
     * # Returns
     * The encoded token whose `exp` is `issued_at` plus the configured minutes.
     */
    pub fn issue_token_at(&self, subject: &str, role: &str, issued_at: DateTime<Utc>) -> Result<String, ApplicationError> {
        let iat = issued_at.timestamp();
        let claim = Claim { sub: subject.to_string(), role: role.to_string(), iat, exp: iat + self.expiration_minutes * 60 };
        jsonwebtoken::encode(&Header::new(self.algorithm), &claim, &self.encoding_key).map_err(|err| ApplicationError::new(ErrorType::Application, format!("Failed to sign token: {err}")))
    }

    /**
     * Verifies signature and expiry of a token.
     */
    pub fn decode_token(&self, token: &str) -> Result<Claim, ApplicationError> {
        match jsonwebtoken::decode::<Claim>(token, &self.decoding_key, &self.validation) {
            Ok(token_data) => Ok(token_data.claims),
            Err(err) => {
                tracing::info!("JWT validation error: {err}");
                Err(ApplicationError::new(ErrorType::JwtAuthorization, "Unauthorized".to_string()))
            }
        }
    }

    /**
     * Validates the JWT token from the HTTP request.
     *
     * # Arguments
     * `http_request`: The HTTP request containing the JWT token in the Authorization header.
     *
     * # Returns
     * The claims of a valid token, or an ApplicationError if validation fails.
     */
    pub fn validate(&self, http_request: &HttpRequest) -> Result<Claim, ApplicationError> {
        let credentials = BearerAuth::from_request(http_request, &mut actix_web::dev::Payload::None).into_inner().ok();
        let Some(credentials) = credentials else {
            return Err(ApplicationError::new(ErrorType::JwtAuthorization, "Unauthorized".to_string()));
        };
        self.decode_token(credentials.token())
    }
}

#[cfg(test)]
mod test {
    use actix_web::test::TestRequest;
    use chrono::Duration;

    use super::*;

    const SECRET: &str = "a-test-secret-that-is-long-enough-for-hs256";

    fn administrator() -> AdministratorCredential {
        AdministratorCredential { email: "admin@infodengue.org".to_string(), password: "s3nha".to_string(), role: "admin".to_string() }
    }

    fn login(email: &str, password: &str) -> LoginInputType {
        LoginInputType { email: email.to_string(), password: password.to_string() }
    }

    #[test]
    fn test_jwt_security_service_initialization() {
        assert!(JwtSecurityService::new(SECRET, "HS256", 60).is_ok());
        assert!(JwtSecurityService::new(SECRET, "HS512", 60).is_ok());
        assert!(JwtSecurityService::new(SECRET, "XX256", 60).is_err());
        assert!(JwtSecurityService::new(SECRET, "RS256", 60).is_err());
        assert!(JwtSecurityService::new("", "HS256", 60).is_err());
        assert!(JwtSecurityService::new(SECRET, "HS256", 0).is_err());
    }

    #[test]
    fn test_issued_token_expiry_and_role() {
        let jwt_service = JwtSecurityService::new(SECRET, "HS256", 90).unwrap();
        let issued_at = Utc::now();
        let token = jwt_service.issue_token_at("admin@infodengue.org", "admin", issued_at).unwrap();
        let claim = jwt_service.decode_token(&token).unwrap();
        assert_eq!(claim.role, "admin");
        assert_eq!(claim.sub, "admin@infodengue.org");
        assert_eq!(claim.iat, issued_at.timestamp());
        assert_eq!(claim.exp, claim.iat + 90 * 60);
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let jwt_service = JwtSecurityService::new(SECRET, "HS256", 1).unwrap();
        let token = jwt_service.issue_token_at("admin@infodengue.org", "admin", Utc::now() - Duration::minutes(5)).unwrap();
        let err = jwt_service.decode_token(&token).unwrap_err();
        assert_eq!(err.error_type, ErrorType::JwtAuthorization);
    }

    #[test]
    fn test_token_signed_with_other_secret_is_rejected() {
        let other = JwtSecurityService::new("another-secret-another-secret-another", "HS256", 60).unwrap();
        let jwt_service = JwtSecurityService::new(SECRET, "HS256", 60).unwrap();
        let token = other.issue_token("admin@infodengue.org", "admin").unwrap();
        assert!(jwt_service.decode_token(&token).is_err());
    }

    #[test]
    fn test_jwt_security_service_validator_success() {
        let jwt_service = JwtSecurityService::new(SECRET, "HS256", 60).unwrap();
        let token = jwt_service.issue_token("admin@infodengue.org", "admin").unwrap();
        let req = TestRequest::with_uri("/api/funcionario").insert_header(("Authorization", format!("Bearer {token}"))).to_http_request();
        assert_eq!(jwt_service.validate(&req).unwrap().role, "admin");
    }

    #[test]
    fn test_jwt_security_service_validator_failure() {
        let jwt_service = JwtSecurityService::new(SECRET, "HS256", 60).unwrap();
        let req = TestRequest::with_uri("/api/funcionario").to_http_request();
        assert!(jwt_service.validate(&req).is_err());
        let req = TestRequest::with_uri("/api/funcionario").insert_header(("Authorization", "Bearer not-a-token")).to_http_request();
        assert!(jwt_service.validate(&req).is_err());
    }

    #[test]
    fn test_configured_credential_verifier() {
        let verifier = ConfiguredCredentialVerifier::new(administrator());
        assert_eq!(verifier.verify(&login("admin@infodengue.org", "s3nha")), Some("admin".to_string()));
        assert_eq!(verifier.verify(&login("ADMIN@infodengue.org", "s3nha")), Some("admin".to_string()));
        assert_eq!(verifier.verify(&login("admin@infodengue.org", "wrong")), None);
        assert_eq!(verifier.verify(&login("other@infodengue.org", "s3nha")), None);
    }
}
