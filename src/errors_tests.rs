// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `errors.rs`

#[cfg(test)]
mod tests {
    use crate::errors::{is_conflict, is_not_found, ClientError, ConfigError, ThreeScaleError};
    use anyhow::Context;

    fn not_found() -> ClientError {
        ClientError::NotFound {
            kind: "Secret".to_string(),
            name: "system-seed".to_string(),
        }
    }

    #[test]
    fn test_is_not_found_sees_through_context() {
        let err = Err::<(), _>(not_found())
            .context("failed to read admin token")
            .context("identity integration")
            .unwrap_err();

        assert!(is_not_found(&err));
        assert!(!is_conflict(&err));
    }

    #[test]
    fn test_is_conflict_covers_already_exists() {
        let exists = anyhow::Error::new(ClientError::AlreadyExists {
            kind: "Route".to_string(),
            name: "zync".to_string(),
        });
        assert!(is_conflict(&exists));
        assert!(!is_not_found(&exists));
    }

    #[test]
    fn test_untyped_errors_are_neither() {
        let err = anyhow::anyhow!("boom");
        assert!(!is_not_found(&err));
        assert!(!is_conflict(&err));
    }

    #[test]
    fn test_config_store_error_keeps_client_error() {
        let err = ConfigError::from(not_found());
        assert!(is_not_found(&anyhow::Error::new(err)));
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(not_found().to_string(), "Secret 'system-seed' not found");
        assert_eq!(
            ThreeScaleError::UnexpectedStatus {
                operation: "add_user".to_string(),
                status: 422,
            }
            .to_string(),
            "3scale admin API returned HTTP 422 for add_user"
        );
        assert!(ThreeScaleError::NotFound {
            entity: "authentication provider".to_string(),
            name: "rhsso".to_string(),
        }
        .is_not_found());
    }
}
