use crate::api::ApiError;
use thiserror::Error;
use tfplug::types::Diagnostic;

use super::domain::Domain;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid {domain} settings: {message}")]
    Decode { domain: Domain, message: String },

    #[error("failed to write {domain} settings (HTTP {status}): {message}")]
    RemoteWrite {
        domain: Domain,
        status: u16,
        message: String,
    },

    #[error("failed to read {domain} settings (HTTP {status}): {message}")]
    RemoteRead {
        domain: Domain,
        status: u16,
        message: String,
    },

    #[error("project {0} not found")]
    ResourceNotFound(String),

    #[error("{domain} settings request failed: {source}")]
    Transport {
        domain: Domain,
        #[source]
        source: ApiError,
    },

    #[error("operation cancelled before {0} settings")]
    Cancelled(Domain),
}

impl SettingsError {
    pub fn decode(domain: Domain, message: impl Into<String>) -> Self {
        SettingsError::Decode {
            domain,
            message: message.into(),
        }
    }

    pub fn from_write(domain: Domain, error: ApiError) -> Self {
        match error.status() {
            Some(status) => SettingsError::RemoteWrite {
                domain,
                status,
                message: message(error),
            },
            None => SettingsError::Transport {
                domain,
                source: error,
            },
        }
    }

    pub fn from_read(domain: Domain, error: ApiError) -> Self {
        match error.status() {
            Some(status) => SettingsError::RemoteRead {
                domain,
                status,
                message: message(error),
            },
            None => SettingsError::Transport {
                domain,
                source: error,
            },
        }
    }

    /// Diagnostic for the host; decode errors point at the domain attribute
    pub fn to_diagnostic(&self) -> Diagnostic {
        let summary = match self {
            SettingsError::Decode { .. } => "Invalid settings",
            SettingsError::RemoteWrite { .. } => "Failed to update settings",
            SettingsError::RemoteRead { .. } => "Failed to read settings",
            SettingsError::ResourceNotFound(_) => "Project not found",
            SettingsError::Transport { .. } => "Settings request failed",
            SettingsError::Cancelled(_) => "Operation cancelled",
        };
        let diagnostic = Diagnostic::error(summary, self.to_string());

        match self {
            SettingsError::Decode { domain, .. } => diagnostic.with_attribute(domain.path()),
            _ => diagnostic,
        }
    }
}

fn message(error: ApiError) -> String {
    match error {
        ApiError::ApiError { message, .. } => message,
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::TransportError;
    use tfplug::types::AttributePath;

    #[test]
    fn api_errors_keep_status_and_message() {
        let error = SettingsError::from_write(
            Domain::Auth,
            ApiError::ApiError {
                status: 400,
                message: "jwt_exp must be positive".to_string(),
            },
        );

        assert!(matches!(
            error,
            SettingsError::RemoteWrite { domain: Domain::Auth, status: 400, ref message }
                if message == "jwt_exp must be positive"
        ));
        assert_eq!(
            error.to_string(),
            "failed to write auth settings (HTTP 400): jwt_exp must be positive"
        );
    }

    #[test]
    fn authentication_failures_are_remote_errors() {
        let error = SettingsError::from_read(Domain::Database, ApiError::AuthError);
        assert!(matches!(error, SettingsError::RemoteRead { status: 401, .. }));
    }

    #[test]
    fn transport_failures_have_no_status() {
        let error = SettingsError::from_read(
            Domain::Network,
            ApiError::Transport(TransportError::Timeout(30)),
        );
        assert!(matches!(error, SettingsError::Transport { domain: Domain::Network, .. }));
    }

    #[test]
    fn decode_diagnostics_point_at_the_attribute() {
        let diagnostic = SettingsError::decode(Domain::Api, "bad").to_diagnostic();
        assert!(diagnostic.is_error());
        assert_eq!(diagnostic.attribute, Some(AttributePath::new("api")));
    }
}
