use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Failed to fetch data from API: {0}")]
    ApiFetch(#[from] reqwest::Error),

    #[error("Failed to parse API response: {0}")]
    ApiParse(#[from] serde_json::Error),

    // Specific HTTP status code errors
    #[error("API request not found (404): {url}")]
    ApiNotFound { url: String },

    #[error("API server error ({status}): {message} (URL: {url})")]
    ApiServerError {
        status: u16,
        message: String,
        url: String,
    },

    #[error("API client error ({status}): {message} (URL: {url})")]
    ApiClientError {
        status: u16,
        message: String,
        url: String,
    },

    #[error("API rate limit exceeded (429): {message} (URL: {url})")]
    ApiRateLimit { message: String, url: String },

    #[error("API service unavailable ({status}): {message} (URL: {url})")]
    ApiServiceUnavailable {
        status: u16,
        message: String,
        url: String,
    },

    // Network-specific errors
    #[error("Network timeout while fetching data from: {url}")]
    NetworkTimeout { url: String },

    #[error("Connection failed to: {url} - {message}")]
    NetworkConnection { url: String, message: String },

    // Data parsing and validation errors
    #[error("API returned malformed JSON: {message} (URL: {url})")]
    ApiMalformedJson { message: String, url: String },

    #[error("API returned unexpected data structure: {message} (URL: {url})")]
    ApiUnexpectedStructure { message: String, url: String },

    #[error("API returned empty or missing data: {message} (URL: {url})")]
    ApiNoData { message: String, url: String },

    #[error("Invalid season id: {0}")]
    InvalidSeason(String),

    #[error("Invalid duration '{value}': expected M:SS or H:MM:SS")]
    DurationParse { value: String },

    // Warehouse and storage errors
    #[error("Invalid identifier '{name}': {reason}")]
    InvalidIdentifier { name: String, reason: String },

    #[error("Column '{column}' is not part of the schema of {table}")]
    UnknownColumn { column: String, table: String },

    #[error("Warehouse {operation} failed: {message}")]
    Warehouse { operation: String, message: String },

    #[error("Warehouse job {job_id} failed: {message}")]
    WarehouseJob { job_id: String, message: String },

    #[error("Table shape error: {0}")]
    TableShape(String),

    #[error("Object storage write failed for '{key}': {message}")]
    Storage { key: String, message: String },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDeserialize(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Date/time parsing error: {0}")]
    DateTimeParse(String),

    #[error("Log setup error: {0}")]
    LogSetup(String),
}

impl AppError {
    /// Create a configuration error with context
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a date/time parsing error with context
    pub fn datetime_parse_error(msg: impl Into<String>) -> Self {
        Self::DateTimeParse(msg.into())
    }

    /// Create a log setup error with context
    pub fn log_setup_error(msg: impl Into<String>) -> Self {
        Self::LogSetup(msg.into())
    }

    /// Create an API not found error
    pub fn api_not_found(url: impl Into<String>) -> Self {
        Self::ApiNotFound { url: url.into() }
    }

    /// Create an API server error (5xx status codes)
    pub fn api_server_error(
        status: u16,
        message: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self::ApiServerError {
            status,
            message: message.into(),
            url: url.into(),
        }
    }

    /// Create an API client error (4xx status codes except 404 and 429)
    pub fn api_client_error(
        status: u16,
        message: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self::ApiClientError {
            status,
            message: message.into(),
            url: url.into(),
        }
    }

    /// Create an API rate limit error
    pub fn api_rate_limit(message: impl Into<String>, url: impl Into<String>) -> Self {
        Self::ApiRateLimit {
            message: message.into(),
            url: url.into(),
        }
    }

    /// Create an API service unavailable error
    pub fn api_service_unavailable(
        status: u16,
        message: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self::ApiServiceUnavailable {
            status,
            message: message.into(),
            url: url.into(),
        }
    }

    /// Create a network timeout error
    pub fn network_timeout(url: impl Into<String>) -> Self {
        Self::NetworkTimeout { url: url.into() }
    }

    /// Create a network connection error
    pub fn network_connection(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NetworkConnection {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a malformed JSON error
    pub fn api_malformed_json(message: impl Into<String>, url: impl Into<String>) -> Self {
        Self::ApiMalformedJson {
            message: message.into(),
            url: url.into(),
        }
    }

    /// Create an unexpected data structure error
    pub fn api_unexpected_structure(message: impl Into<String>, url: impl Into<String>) -> Self {
        Self::ApiUnexpectedStructure {
            message: message.into(),
            url: url.into(),
        }
    }

    /// Create a no data error
    pub fn api_no_data(message: impl Into<String>, url: impl Into<String>) -> Self {
        Self::ApiNoData {
            message: message.into(),
            url: url.into(),
        }
    }

    pub fn duration_parse(value: impl Into<String>) -> Self {
        Self::DurationParse {
            value: value.into(),
        }
    }

    pub fn invalid_identifier(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn unknown_column(column: impl Into<String>, table: impl Into<String>) -> Self {
        Self::UnknownColumn {
            column: column.into(),
            table: table.into(),
        }
    }

    /// Create a warehouse error for a named operation (e.g. "create table")
    pub fn warehouse(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Warehouse {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn warehouse_job(job_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::WarehouseJob {
            job_id: job_id.into(),
            message: message.into(),
        }
    }

    pub fn table_shape(msg: impl Into<String>) -> Self {
        Self::TableShape(msg.into())
    }

    pub fn storage(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Storage {
            key: key.into(),
            message: message.into(),
        }
    }
}
