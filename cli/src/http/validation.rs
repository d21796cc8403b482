//! Request validation and payload-to-domain conversion.

use overwatch_core::model::{normalize_targets, slugify};
use overwatch_core::proxy::{ProxyCredentials, ProxyMeta, ProxyScheme};

use super::models::{CreateScanRequest, HttpServerError};

const MAX_NAME_LEN: usize = 100;

/// Project name must be non-empty, bounded, and yield a usable slug.
pub fn validate_project_name(name: &str) -> Result<String, HttpServerError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(HttpServerError::InvalidRequest(
            "project name cannot be empty".to_string(),
        ));
    }
    if trimmed.len() > MAX_NAME_LEN {
        return Err(HttpServerError::InvalidRequest(format!(
            "project name too long ({} chars, max {MAX_NAME_LEN})",
            trimmed.len()
        )));
    }
    let slug = slugify(trimmed);
    if slug.is_empty() {
        return Err(HttpServerError::InvalidRequest(
            "project name must contain at least one alphanumeric character".to_string(),
        ));
    }
    Ok(slug)
}

/// Split the newline-separated target blob and normalize it. Empty result
/// is a validation error.
pub fn parse_targets(blob: &str) -> Result<Vec<String>, HttpServerError> {
    let raw: Vec<String> = blob.lines().map(str::to_string).collect();
    let targets = normalize_targets(&raw);
    if targets.is_empty() {
        return Err(HttpServerError::InvalidRequest(
            "at least one target is required".to_string(),
        ));
    }
    Ok(targets)
}

/// Build the persisted proxy metadata and the transient credentials from
/// the request payload. Validation happens before any job exists.
pub fn build_proxy(
    req: &CreateScanRequest,
) -> Result<(ProxyMeta, Option<ProxyCredentials>), HttpServerError> {
    if !req.proxy_enabled {
        return Ok((ProxyMeta::default(), None));
    }

    let scheme = ProxyScheme::parse(&req.proxy_type)
        .map_err(|e| HttpServerError::InvalidRequest(e.to_string()))?;

    let credentials = credentials_from(req.proxy_user.as_deref(), req.proxy_pass.as_deref());
    let meta = ProxyMeta {
        enabled: true,
        scheme,
        host: req.proxy_host.trim().to_string(),
        port: req.proxy_port,
        authenticated: credentials.is_some(),
    };
    meta.validate()
        .map_err(|e| HttpServerError::InvalidRequest(e.to_string()))?;

    Ok((meta, credentials))
}

/// Credentials only exist when a non-empty user is supplied.
pub fn credentials_from(user: Option<&str>, pass: Option<&str>) -> Option<ProxyCredentials> {
    let user = user.map(str::trim).filter(|u| !u.is_empty())?;
    Some(ProxyCredentials {
        user: user.to_string(),
        pass: pass.unwrap_or_default().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proxied_request() -> CreateScanRequest {
        serde_json::from_str(
            r#"{
                "project_name": "Acme Corp",
                "targets": "acme.example",
                "proxy_enabled": true,
                "proxy_type": "socks5",
                "proxy_host": "127.0.0.1",
                "proxy_port": 1080,
                "proxy_user": "alice",
                "proxy_pass": "s3cret"
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_project_name_rules() {
        assert_eq!(validate_project_name(" Acme Corp ").unwrap(), "acme-corp");
        assert!(validate_project_name("").is_err());
        assert!(validate_project_name("!!!").is_err());
        assert!(validate_project_name(&"x".repeat(101)).is_err());
    }

    #[test]
    fn test_parse_targets_normalizes() {
        let targets = parse_targets("Acme.Example\n\n  acme.example \nbeta.example").unwrap();
        assert_eq!(targets, vec!["acme.example", "beta.example"]);
        assert!(parse_targets("\n  \n").is_err());
    }

    #[test]
    fn test_proxy_payload_roundtrip() {
        let (meta, creds) = build_proxy(&proxied_request()).unwrap();
        assert!(meta.enabled);
        assert!(meta.authenticated);
        assert_eq!(meta.port, 1080);
        assert_eq!(creds.unwrap().user, "alice");
    }

    #[test]
    fn test_proxy_enabled_without_host_rejected() {
        let mut req = proxied_request();
        req.proxy_host = String::new();
        assert!(build_proxy(&req).is_err());
    }

    #[test]
    fn test_blank_user_means_unauthenticated() {
        assert!(credentials_from(Some("  "), Some("pw")).is_none());
        assert!(credentials_from(None, Some("pw")).is_none());
    }
}
