pub mod assemble;
pub mod config;
pub mod estimate;
pub mod export;
pub mod inspect;
pub mod migrate;
pub mod seed;

use std::future::Future;

use serde::Serialize;
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use claimscope_core::config::{AppConfig, LoadOptions};
use claimscope_core::errors::ApplicationError;
use claimscope_db::{connect_with_config, migrations, SqlStore};

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<Value>,
}

/// A failed command step.
#[derive(Debug)]
pub enum CommandFailure {
    /// Operator input problem, reported as is.
    Reported { error_class: &'static str, message: String, exit_code: u8 },
    /// Store, migration or export failure, reported through the interface layer.
    Application { error_class: &'static str, exit_code: u8, error: ApplicationError },
}

impl CommandFailure {
    pub fn reported(error_class: &'static str, message: impl Into<String>, exit_code: u8) -> Self {
        Self::Reported { error_class, message: message.into(), exit_code }
    }

    pub fn application(
        error_class: &'static str,
        exit_code: u8,
        error: impl Into<ApplicationError>,
    ) -> Self {
        Self::Application { error_class, exit_code, error: error.into() }
    }

    fn into_result(self, command: &str) -> CommandResult {
        match self {
            Self::Reported { error_class, message, exit_code } => {
                CommandResult::failure(command, error_class, message, exit_code)
            }
            Self::Application { error_class, exit_code, error } => {
                CommandResult::application_failure(command, error_class, exit_code, error)
            }
        }
    }
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            user_message: None,
            correlation_id: None,
            report: None,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    /// Success carrying a structured report next to the message.
    pub fn report(command: &str, message: impl Into<String>, report: &impl Serialize) -> Self {
        let report = match serde_json::to_value(report) {
            Ok(report) => report,
            Err(error) => {
                return Self::failure(command, "serialization", error.to_string(), 1);
            }
        };
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            user_message: None,
            correlation_id: None,
            report: Some(report),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            user_message: None,
            correlation_id: None,
            report: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    /// Failure mapped to a user-safe interface error under a fresh correlation id.
    pub fn application_failure(
        command: &str,
        error_class: &str,
        exit_code: u8,
        error: ApplicationError,
    ) -> Self {
        let correlation_id = format!("{command}-{}", Uuid::new_v4().simple());
        let interface = error.into_interface(correlation_id.clone());
        warn!(
            event_name = "cli.command.failed",
            command,
            error_class,
            correlation_id = %correlation_id,
            error = %interface,
            "command failed"
        );

        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: interface.to_string(),
            user_message: Some(interface.user_message().to_string()),
            correlation_id: Some(correlation_id),
            report: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Loads config, opens and migrates the database, then runs `body` on a
/// current-thread runtime.
///
/// Exit codes: 2 config, 3 runtime, 4 connectivity, 5 migration; `body`
/// picks its own from 6 upward.
pub fn run_with_store<F, Fut>(command: &str, options: &LoadOptions, body: F) -> CommandResult
where
    F: FnOnce(AppConfig, SqlStore) -> Fut,
    Fut: Future<Output = Result<CommandResult, CommandFailure>>,
{
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                command,
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                command,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database).await.map_err(|error| {
            CommandFailure::application(
                "db_connectivity",
                4,
                ApplicationError::Persistence(error.to_string()),
            )
        })?;
        migrations::run_pending(&pool).await.map_err(|error| {
            CommandFailure::application(
                "migration",
                5,
                ApplicationError::Persistence(error.to_string()),
            )
        })?;

        let outcome = body(config, SqlStore::new(pool.clone())).await;
        pool.close().await;
        outcome
    });

    match result {
        Ok(result) => result,
        Err(failure) => failure.into_result(command),
    }
}

#[cfg(test)]
mod tests {
    use claimscope_core::errors::{ApplicationError, DomainError, StoreError};
    use serde_json::Value;

    use super::{CommandFailure, CommandResult};

    fn payload(result: &CommandResult) -> Value {
        serde_json::from_str(&result.output).expect("valid json")
    }

    #[test]
    fn store_failures_carry_user_message_and_correlation_id() {
        let result = CommandFailure::application(
            "lookup",
            6,
            StoreError::Unavailable("database is locked".to_owned()),
        )
        .into_result("estimate");

        assert_eq!(result.exit_code, 6);
        let payload = payload(&result);
        assert_eq!(payload["error_class"], "lookup");
        assert_eq!(
            payload["user_message"],
            "The service is temporarily unavailable. Please retry shortly."
        );
        assert!(payload["message"].as_str().is_some_and(|message| message.contains("locked")));
        assert!(payload["correlation_id"]
            .as_str()
            .is_some_and(|id| id.starts_with("estimate-") && id.len() > "estimate-".len()));
    }

    #[test]
    fn each_application_failure_gets_its_own_correlation_id() {
        let first = CommandResult::application_failure(
            "export",
            "not_found",
            8,
            ApplicationError::Domain(DomainError::InvariantViolation("gone".to_owned())),
        );
        let second = CommandResult::application_failure(
            "export",
            "not_found",
            8,
            ApplicationError::Domain(DomainError::InvariantViolation("gone".to_owned())),
        );

        assert_ne!(payload(&first)["correlation_id"], payload(&second)["correlation_id"]);
    }

    #[test]
    fn reported_failures_omit_interface_fields() {
        let result = CommandFailure::reported("io", "could not read x.esx", 9).into_result("inspect");
        let payload = payload(&result);

        assert_eq!(payload["message"], "could not read x.esx");
        assert!(payload.get("correlation_id").is_none());
        assert!(payload.get("user_message").is_none());
    }
}
