use std::fmt;

/**
 * Represents the type of error that can occur within the application.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorType {
    Initialization,
    JwtAuthorization,
    Validation,
    ConstraintViolation,
    NotFound,
    Upstream,
    DatabaseError,
    Application,
}

/**
 * A single invalid or missing request field.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /**
     * Wire name of the field.
     */
    pub field: String,
    /**
     * What is wrong with it.
     */
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: &str) -> Self {
        FieldError { field: field.to_string(), message: message.to_string() }
    }
}

/**
 * Represents an error that occurs within the application.
 */
#[derive(Debug, Clone)]
pub struct ApplicationError {
    /**
     * Error type.
     */
    pub error_type: ErrorType,
    /**
     * Error message describing problem.
     */
    pub message: String,
    /**
     * Per-field details. Only populated for validation errors.
     */
    pub field_errors: Vec<FieldError>,
}

impl ApplicationError {
    /**
     * Creates a new ApplicationError.
     *
     * #Arguments
     * `error_type`: The type of error.
     * `message`: A description of the error.
     */
    pub fn new(error_type: ErrorType, message: String) -> Self {
        ApplicationError { error_type, message, field_errors: Vec::new() }
    }

    /**
     * Creates a validation error carrying the offending fields.
     *
     * #Arguments
     * `field_errors`: The fields that failed validation.
     */
    pub fn validation(field_errors: Vec<FieldError>) -> Self {
        ApplicationError { error_type: ErrorType::Validation, message: "Validation failed".to_string(), field_errors }
    }
}

impl fmt::Display for ApplicationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}
