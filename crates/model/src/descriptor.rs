use crate::error::ParseError;
use serde::Deserialize;

/// Base name of the primary service descriptor.
pub const DESCRIPTOR_FILE: &str = "service.yaml";

/// Service ID assumed for descriptors that omit an explicit one.
pub const DEFAULT_SERVICE: &str = "default";

/// Runtime assumed for descriptors that omit an explicit one.
pub const DEFAULT_RUNTIME: &str = "custom";

/// Parsed attribute set of a `service.yaml`.
///
/// All attributes are optional; numeric-looking values such as versions
/// must be quoted in the file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ServiceDescriptor {
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub runtime: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

impl ServiceDescriptor {
    pub fn parse(bytes: &[u8]) -> std::result::Result<Self, ParseError> {
        serde_yaml::from_slice(bytes).map_err(|err| ParseError(err.to_string()))
    }

    /// Ancillary configuration belongs only to the default service.
    #[must_use]
    pub fn is_default_service(&self) -> bool {
        match &self.service {
            None => true,
            Some(id) => id == DEFAULT_SERVICE,
        }
    }

    #[must_use]
    pub fn runtime_label(&self) -> &str {
        self.runtime.as_deref().unwrap_or(DEFAULT_RUNTIME)
    }

    /// `project:service:version` with absent parts omitted; `None` when
    /// every part is absent.
    #[must_use]
    pub fn pretty(&self) -> Option<String> {
        let parts: Vec<&str> = [
            self.project.as_deref(),
            self.service.as_deref(),
            self.version.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(":"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_all_attributes() {
        let descriptor = ServiceDescriptor::parse(
            b"service: default\nruntime: rust\nproject: storefront\nversion: \"3\"\n",
        )
        .expect("parse");
        assert_eq!(descriptor.service.as_deref(), Some("default"));
        assert_eq!(descriptor.runtime.as_deref(), Some("rust"));
        assert_eq!(descriptor.project.as_deref(), Some("storefront"));
        assert_eq!(descriptor.version.as_deref(), Some("3"));
    }

    #[test]
    fn attributes_are_all_optional() {
        let descriptor = ServiceDescriptor::parse(b"runtime: rust\n").expect("parse");
        assert_eq!(descriptor.service, None);
        assert_eq!(descriptor.project, None);
        assert_eq!(descriptor.version, None);
    }

    #[test]
    fn malformed_input_is_a_parse_error() {
        assert!(ServiceDescriptor::parse(b"service: [unclosed\n").is_err());
    }

    #[test]
    fn missing_or_sentinel_service_is_default() {
        let implicit = ServiceDescriptor::parse(b"runtime: rust\n").expect("parse");
        assert!(implicit.is_default_service());

        let explicit = ServiceDescriptor::parse(b"service: default\n").expect("parse");
        assert!(explicit.is_default_service());

        let other = ServiceDescriptor::parse(b"service: billing\n").expect("parse");
        assert!(!other.is_default_service());
    }

    #[test]
    fn runtime_label_falls_back() {
        let descriptor = ServiceDescriptor::default();
        assert_eq!(descriptor.runtime_label(), DEFAULT_RUNTIME);
    }

    #[test]
    fn pretty_omits_absent_parts() {
        let full = ServiceDescriptor {
            service: Some("default".into()),
            runtime: Some("rust".into()),
            project: Some("storefront".into()),
            version: Some("3".into()),
        };
        assert_eq!(full.pretty().as_deref(), Some("storefront:default:3"));

        let partial = ServiceDescriptor {
            project: Some("storefront".into()),
            ..ServiceDescriptor::default()
        };
        assert_eq!(partial.pretty().as_deref(), Some("storefront"));

        assert_eq!(ServiceDescriptor::default().pretty(), None);
    }
}
