use super::ConfigError;
use crate::domain::Route;
use crate::transfer::TransferConfig;
use std::collections::HashSet;

/// Checks a merged configuration before any endpoint is built.
pub fn validate_transfer_config(config: &TransferConfig) -> Result<(), ConfigError> {
    check_unique_names("exporter", &config.sources)?;
    check_unique_names("pushgateway", &config.sinks)?;
    config.validate()?;
    Ok(())
}

fn check_unique_names(role: &'static str, routes: &[Route]) -> Result<(), ConfigError> {
    let mut seen = HashSet::with_capacity(routes.len());
    for route in routes {
        if !seen.insert(route.name.as_str()) {
            return Err(ConfigError::DuplicateRoute {
                role,
                name: route.name.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::TransferError;
    use std::time::Duration;
    use url::Url;

    fn route(name: &str) -> Route {
        Route::new(name, Url::parse("http://localhost:9100/metrics").unwrap())
    }

    fn config() -> TransferConfig {
        TransferConfig {
            sources: vec![route("node"), route("app")],
            sinks: vec![route("central")],
            ..TransferConfig::default()
        }
    }

    #[test]
    fn accepts_distinct_names() {
        assert!(validate_transfer_config(&config()).is_ok());
    }

    #[test]
    fn same_name_in_both_roles_is_fine() {
        let mut config = config();
        config.sinks = vec![route("node")];
        assert!(validate_transfer_config(&config).is_ok());
    }

    #[test]
    fn rejects_duplicate_names_within_a_role() {
        let mut config = config();
        config.sources.push(route("node"));
        assert!(matches!(
            validate_transfer_config(&config),
            Err(ConfigError::DuplicateRoute {
                role: "exporter",
                ..
            })
        ));
    }

    #[test]
    fn surfaces_transfer_invariants() {
        let mut config = config();
        config.scrape_timeout = Duration::from_secs(20);
        assert!(matches!(
            validate_transfer_config(&config),
            Err(ConfigError::Transfer(TransferError::TimeoutNotBelowInterval { .. }))
        ));

        let mut config = self::config();
        config.sinks.clear();
        assert!(matches!(
            validate_transfer_config(&config),
            Err(ConfigError::Transfer(TransferError::NoSinks))
        ));
    }
}
