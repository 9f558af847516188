//! CLI-level errors (wraps infrastructure errors)

use thiserror::Error;

use crate::application::ApplicationError;
use crate::domain::DomainError;
use crate::exitcode;
use crate::infrastructure::InfraError;

/// CLI errors are the top-level error type.
/// These are what get displayed to the user.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{0}")]
    Infra(#[from] InfraError),

    #[error("{0}")]
    Usage(String),
}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

impl From<ApplicationError> for CliError {
    fn from(e: ApplicationError) -> Self {
        CliError::Infra(InfraError::Application(e))
    }
}

impl From<DomainError> for CliError {
    fn from(e: DomainError) -> Self {
        CliError::Infra(InfraError::Application(ApplicationError::Domain(e)))
    }
}

impl CliError {
    /// Get the appropriate exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Usage(_) => exitcode::USAGE,
            CliError::Infra(e) => match e {
                InfraError::Io { .. } => exitcode::IOERR,
                InfraError::Connect { .. } => exitcode::UNAVAILABLE,
                InfraError::Application(e) => match e {
                    ApplicationError::Domain(_) => exitcode::USAGE,
                    ApplicationError::KeyNotFound { .. }
                    | ApplicationError::BucketNotFound(_) => exitcode::NOINPUT,
                    ApplicationError::KeyExists { .. } | ApplicationError::BucketExists(_) => {
                        exitcode::CANTCREAT
                    }
                    ApplicationError::RevisionMismatch { .. } => exitcode::DATAERR,
                    ApplicationError::Unavailable { .. } => exitcode::UNAVAILABLE,
                    ApplicationError::Config { .. } => exitcode::CONFIG,
                    ApplicationError::OperationFailed { .. } => exitcode::SOFTWARE,
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(DomainError::InvalidKey(".x".into()).into(), exitcode::USAGE)]
    #[case(
        ApplicationError::KeyNotFound { bucket: "T".into(), key: "X".into() }.into(),
        exitcode::NOINPUT
    )]
    #[case(ApplicationError::BucketExists("T".into()).into(), exitcode::CANTCREAT)]
    #[case(
        ApplicationError::RevisionMismatch { key: "X".into(), expected: 1, current: Some(2) }.into(),
        exitcode::DATAERR
    )]
    #[case(
        CliError::Infra(InfraError::Connect { servers: "nats://x".into(), message: "refused".into() }),
        exitcode::UNAVAILABLE
    )]
    #[case(CliError::Usage("bad".into()), exitcode::USAGE)]
    fn given_error_when_mapping_exit_code_then_matches_sysexits(
        #[case] err: CliError,
        #[case] expected: i32,
    ) {
        assert_eq!(err.exit_code(), expected);
    }
}
