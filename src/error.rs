use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    View,
    Column,
    Row,
}

impl std::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceType::View => write!(f, "view"),
            ResourceType::Column => write!(f, "column"),
            ResourceType::Row => write!(f, "row"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridErrorCode {
    Validation,
    InvalidConfig,
    InvalidNumber,
    InvalidDate,
    RequiredFieldMissing,
    EmptyName,
    ViewNotFound,
    ColumnNotFound,
    RowNotFound,
    ViewAlreadyExists,
    ColumnAlreadyExists,
    RowAlreadyExists,
    PermissionDenied,
    TransactionFailure,
    CascadeIncomplete,
}

impl GridErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            GridErrorCode::Validation => "validation",
            GridErrorCode::InvalidConfig => "invalid_config",
            GridErrorCode::InvalidNumber => "invalid_number",
            GridErrorCode::InvalidDate => "invalid_date",
            GridErrorCode::RequiredFieldMissing => "required_field_missing",
            GridErrorCode::EmptyName => "empty_name",
            GridErrorCode::ViewNotFound => "view_not_found",
            GridErrorCode::ColumnNotFound => "column_not_found",
            GridErrorCode::RowNotFound => "row_not_found",
            GridErrorCode::ViewAlreadyExists => "view_already_exists",
            GridErrorCode::ColumnAlreadyExists => "column_already_exists",
            GridErrorCode::RowAlreadyExists => "row_already_exists",
            GridErrorCode::PermissionDenied => "permission_denied",
            GridErrorCode::TransactionFailure => "transaction_failure",
            GridErrorCode::CascadeIncomplete => "cascade_incomplete",
        }
    }
}

#[derive(Debug, Error)]
pub enum GridError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("invalid config: {message}")]
    InvalidConfig { message: String },
    #[error("invalid number input: '{raw}'")]
    InvalidNumber { raw: String },
    #[error("invalid date input: '{raw}'")]
    InvalidDate { raw: String },
    #[error("required field '{column}' is empty")]
    RequiredFieldMissing { column: String },
    #[error("name must not be empty")]
    EmptyName,
    #[error("{resource_type} '{resource_id}' not found")]
    NotFound {
        resource_type: ResourceType,
        resource_id: String,
    },
    #[error("{resource_type} '{resource_id}' already exists")]
    AlreadyExists {
        resource_type: ResourceType,
        resource_id: String,
    },
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("transaction failure: {0}")]
    TransactionFailure(String),
    #[error("column '{column}' removed from view {view_id} but row cascade failed: {detail}")]
    CascadeIncomplete {
        view_id: i64,
        column: String,
        detail: String,
    },
}

impl GridError {
    pub fn code(&self) -> GridErrorCode {
        match self {
            GridError::Validation(_) => GridErrorCode::Validation,
            GridError::InvalidConfig { .. } => GridErrorCode::InvalidConfig,
            GridError::InvalidNumber { .. } => GridErrorCode::InvalidNumber,
            GridError::InvalidDate { .. } => GridErrorCode::InvalidDate,
            GridError::RequiredFieldMissing { .. } => GridErrorCode::RequiredFieldMissing,
            GridError::EmptyName => GridErrorCode::EmptyName,
            GridError::NotFound { resource_type, .. } => match resource_type {
                ResourceType::View => GridErrorCode::ViewNotFound,
                ResourceType::Column => GridErrorCode::ColumnNotFound,
                ResourceType::Row => GridErrorCode::RowNotFound,
            },
            GridError::AlreadyExists { resource_type, .. } => match resource_type {
                ResourceType::View => GridErrorCode::ViewAlreadyExists,
                ResourceType::Column => GridErrorCode::ColumnAlreadyExists,
                ResourceType::Row => GridErrorCode::RowAlreadyExists,
            },
            GridError::PermissionDenied(_) => GridErrorCode::PermissionDenied,
            GridError::TransactionFailure(_) => GridErrorCode::TransactionFailure,
            GridError::CascadeIncomplete { .. } => GridErrorCode::CascadeIncomplete,
        }
    }

    pub fn code_str(&self) -> &'static str {
        self.code().as_str()
    }
}
