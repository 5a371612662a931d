use anyhow::{bail, Context};
use cloudops_common::config::{env_lookup, Lookup};
use cloudops_common::{JenkinsConfig, ProviderSettings};
use cloudops_providers::jenkins::JenkinsClient;
use cloudops_providers::{CiServer, CloudProvider};

pub struct ProviderManager;

impl ProviderManager {
    pub fn current_provider_name() -> String {
        ProviderSettings::from_env().name
    }

    pub fn get_provider(provider_name: &str) -> anyhow::Result<Box<dyn CloudProvider>> {
        Self::get_provider_with(provider_name, &env_lookup)
    }

    #[cfg_attr(not(feature = "provider-scaleway"), allow(unused_variables))]
    pub fn get_provider_with(
        provider_name: &str,
        lookup: Lookup,
    ) -> anyhow::Result<Box<dyn CloudProvider>> {
        match provider_name.to_lowercase().as_str() {
            #[cfg(feature = "provider-scaleway")]
            "scaleway" => {
                let settings = cloudops_common::ScalewaySettings::from_lookup(lookup)
                    .context("invalid Scaleway configuration")?;
                let provider = cloudops_providers::scaleway::ScalewayProvider::new(&settings)
                    .context("failed to build Scaleway HTTP client")?;
                Ok(Box::new(provider))
            }
            // Empty inventory: useful to check wiring and config without touching a cloud.
            #[cfg(feature = "provider-mock")]
            "mock" => Ok(Box::new(cloudops_providers::mock::MockProvider::new())),
            // Add other providers here:
            // "aws" => ...
            other => bail!("unknown or disabled provider '{other}'"),
        }
    }

    pub fn get_ci_server(config: &JenkinsConfig) -> anyhow::Result<Box<dyn CiServer>> {
        let client = JenkinsClient::new(config).context("failed to build Jenkins HTTP client")?;
        Ok(Box::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_provider_is_an_error() {
        let lookup = |_: &str| -> Option<String> { None };
        let err = ProviderManager::get_provider_with("ovh", &lookup).err().unwrap();
        assert!(err.to_string().contains("ovh"));
    }

    #[cfg(feature = "provider-mock")]
    #[test]
    fn mock_provider_needs_no_config() {
        let lookup = |_: &str| -> Option<String> { None };
        let provider = ProviderManager::get_provider_with("MOCK", &lookup).unwrap();
        assert_eq!(provider.provider_code(), "mock");
    }

    #[cfg(feature = "provider-scaleway")]
    #[test]
    fn scaleway_requires_credentials() {
        let lookup = |_: &str| -> Option<String> { None };
        let err = ProviderManager::get_provider_with("scaleway", &lookup).err().unwrap();
        assert!(format!("{err:#}").contains("SCALEWAY_PROJECT_ID"));
    }
}
