//! Declaration discovery via an explicit plugin manifest.
//!
//! The host supplies a list of providers, one per extension that declares
//! reference fields; each provider registers its declarations against the
//! registry. A provider that has nothing to declare reports
//! [`DiscoveryError::NotPresent`] and is skipped. Any other failure rolls
//! back that provider's registry mutations so a failing provider never leaks
//! partial registrations.

use thiserror::Error;

use super::{Registry, RegistryError};

#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// The provider has no declarations to contribute. Skipped silently.
    #[error("no reference declarations present")]
    NotPresent,

    #[error("discovery failed for '{provider}': {reason}")]
    Import { provider: String, reason: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

pub trait DiscoveryProvider {
    fn name(&self) -> &str;

    /// Register this provider's declarations. Must be all-or-nothing from
    /// the caller's point of view; partial mutations are rolled back on
    /// error.
    fn register(&self, registry: &mut Registry) -> Result<(), DiscoveryError>;
}

#[derive(Debug, Default)]
pub struct DiscoveryReport {
    pub registered: Vec<String>,
    pub skipped: Vec<String>,
}

impl Registry {
    /// Run every provider in order. Stops at the first real failure, with
    /// that provider's mutations rolled back.
    pub fn discover(
        &mut self,
        providers: &[&dyn DiscoveryProvider],
    ) -> Result<DiscoveryReport, DiscoveryError> {
        let mut report = DiscoveryReport::default();
        for provider in providers {
            let before = self.snapshot();
            match provider.register(self) {
                Ok(()) => {
                    tracing::info!(provider = provider.name(), "registered reference fields");
                    report.registered.push(provider.name().to_string());
                }
                Err(DiscoveryError::NotPresent) => {
                    report.skipped.push(provider.name().to_string());
                }
                Err(e) => {
                    self.restore(before);
                    return Err(DiscoveryError::Import {
                        provider: provider.name().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SourceConfig;

    struct Declares(&'static str, &'static str);

    impl DiscoveryProvider for Declares {
        fn name(&self) -> &str {
            self.0
        }

        fn register(&self, registry: &mut Registry) -> Result<(), DiscoveryError> {
            registry.register(SourceConfig::new(self.1, &["report_datetime"])?)?;
            Ok(())
        }
    }

    struct Empty;

    impl DiscoveryProvider for Empty {
        fn name(&self) -> &str {
            "empty_app"
        }

        fn register(&self, _registry: &mut Registry) -> Result<(), DiscoveryError> {
            Err(DiscoveryError::NotPresent)
        }
    }

    /// Registers one source, then fails.
    struct Broken;

    impl DiscoveryProvider for Broken {
        fn name(&self) -> &str {
            "broken_app"
        }

        fn register(&self, registry: &mut Registry) -> Result<(), DiscoveryError> {
            registry.register(SourceConfig::new("broken.leaked", &["report_datetime"])?)?;
            Err(DiscoveryError::Import {
                provider: "broken_app".into(),
                reason: "syntax error".into(),
            })
        }
    }

    #[test]
    fn providers_register_in_order() {
        let mut registry = Registry::new();
        let report = registry
            .discover(&[
                &Declares("app_one", "one.subjectvisit"),
                &Declares("app_two", "two.crfone"),
            ])
            .unwrap();
        assert_eq!(report.registered, ["app_one", "app_two"]);
        assert!(registry.contains("one.subjectvisit"));
        assert!(registry.contains("two.crfone"));
    }

    #[test]
    fn not_present_is_skipped() {
        let mut registry = Registry::new();
        let report = registry
            .discover(&[&Empty, &Declares("app_one", "one.subjectvisit")])
            .unwrap();
        assert_eq!(report.skipped, ["empty_app"]);
        assert_eq!(report.registered, ["app_one"]);
    }

    #[test]
    fn failing_provider_rolls_back_its_own_registrations() {
        let mut registry = Registry::new();
        let err = registry
            .discover(&[&Declares("app_one", "one.subjectvisit"), &Broken])
            .unwrap_err();
        assert!(matches!(
            err,
            DiscoveryError::Import { ref provider, .. } if provider == "broken_app"
        ));
        // the earlier provider's work survives; the failing one leaks nothing
        assert!(registry.contains("one.subjectvisit"));
        assert!(!registry.contains("broken.leaked"));
    }
}
