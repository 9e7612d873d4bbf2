use thiserror::Error;

#[derive(Error, Debug)]
pub enum RouletteError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Validation error{}: {field}: {message}", .row.map(|r| format!(" in row {}", r)).unwrap_or_default())]
    ValidationError {
        row: Option<usize>,
        field: String,
        message: String,
    },

    #[error("Template has unresolved placeholders: {}", .unresolved.join(", "))]
    TemplateError { unresolved: Vec<String> },

    #[error("Round '{round}' has not been computed")]
    NotFoundError { round: String },

    #[error("Notification channel failed for {recipient}: {message}")]
    ChannelError { recipient: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Template,
    State,
    Channel,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl RouletteError {
    pub fn validation(row: Option<usize>, field: &str, message: impl Into<String>) -> Self {
        RouletteError::ValidationError {
            row,
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            RouletteError::ValidationError { .. }
            | RouletteError::ConfigError { .. }
            | RouletteError::MissingConfigError { .. }
            | RouletteError::InvalidConfigValueError { .. }
            | RouletteError::CsvError(_) => ErrorCategory::Input,
            RouletteError::TemplateError { .. } => ErrorCategory::Template,
            RouletteError::NotFoundError { .. } => ErrorCategory::State,
            RouletteError::ChannelError { .. } | RouletteError::HttpError(_) => {
                ErrorCategory::Channel
            }
            RouletteError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Channel => ErrorSeverity::Medium,
            ErrorCategory::Input | ErrorCategory::Template | ErrorCategory::State => {
                ErrorSeverity::High
            }
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            RouletteError::ValidationError { row: Some(row), field, .. } => {
                format!("Fix the '{}' cell in row {} of the sheet and run again", field, row)
            }
            RouletteError::ValidationError { field, .. } => {
                format!("Fix the '{}' value and run again", field)
            }
            RouletteError::TemplateError { .. } => {
                "Supply a value for every placeholder and keep `Var…` text out of sheet values; nothing was sent"
                    .to_string()
            }
            RouletteError::NotFoundError { round } => {
                format!("Run `compute --round {}` first, review the sheet, then send", round)
            }
            RouletteError::ChannelError { .. } | RouletteError::HttpError(_) => {
                "Check the notification channel and re-run the send step; the ledger is unchanged"
                    .to_string()
            }
            RouletteError::IoError(_) => {
                "Make sure the sheet exists and is not locked by another program".to_string()
            }
            RouletteError::CsvError(_) => "Make sure the sheet is valid CSV".to_string(),
            RouletteError::ConfigError { .. }
            | RouletteError::MissingConfigError { .. }
            | RouletteError::InvalidConfigValueError { .. } => {
                "Check the configuration file and command-line flags".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Input => format!("Invalid input: {}", self),
            ErrorCategory::Template => format!("Template problem: {}", self),
            ErrorCategory::State => format!("{}", self),
            ErrorCategory::Channel => format!("Sending failed: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, RouletteError>;
