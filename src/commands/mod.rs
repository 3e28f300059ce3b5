//! Command handlers and the shared runtime they are built from

pub mod auth;
pub mod sync;

pub use auth::auth_command;
pub use sync::sync_command;

use crate::aggregate::Sources;
use crate::api::{MetricsCollector, ReqwestTransport, Transport};
use crate::auth::{EnvFileStore, SecretStore};
use crate::clients::{DodoIsClient, TrendyolClient, YemeksepetiClient};
use crate::config::{Settings, trendyol_regions};
use anyhow::{Context, Result};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Settings, secrets and the HTTP stack shared by every command
pub struct AppContext {
    pub settings: Settings,
    pub secrets: Arc<dyn SecretStore>,
    pub secrets_path: PathBuf,
    pub transport: Arc<dyn Transport>,
    pub metrics: MetricsCollector,
}

impl AppContext {
    pub fn load(config: Option<&Path>, env_file: Option<PathBuf>) -> Result<Self> {
        let settings = Settings::load(config).context("Failed to load settings")?;
        let secrets_path = env_file.unwrap_or_else(|| settings.env_file.clone());
        let secrets = EnvFileStore::open(&secrets_path)
            .with_context(|| format!("Failed to open secrets file {}", secrets_path.display()))?;
        let transport = ReqwestTransport::new().context("Failed to build HTTP client")?;

        Ok(Self::new(settings, Arc::new(secrets), secrets_path, Arc::new(transport)))
    }

    pub fn new(
        settings: Settings,
        secrets: Arc<dyn SecretStore>,
        secrets_path: PathBuf,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            settings,
            secrets,
            secrets_path,
            transport,
            metrics: MetricsCollector::new(),
        }
    }

    /// Clients for every upstream whose credentials are present. Missing
    /// credentials disable that upstream with a warning.
    pub fn sources(&self) -> Sources {
        let mut sources = Sources::default();
        let resilience = &self.settings.resilience;

        match DodoIsClient::from_store(self.secrets.clone(), self.transport.clone(), resilience.dodois()) {
            Ok(client) => {
                sources.dodois = Some(
                    client
                        .with_page_size(self.settings.page_size.dodois)
                        .with_metrics(self.metrics.clone()),
                )
            }
            Err(err) => warn!("Dodo IS disabled: {err}"),
        }

        for region in trendyol_regions(self.secrets.as_ref()) {
            match TrendyolClient::from_store(
                self.secrets.as_ref(),
                &region,
                self.transport.clone(),
                resilience.trendyol(),
            ) {
                Ok(client) => {
                    let client = client
                        .with_page_size(self.settings.page_size.trendyol)
                        .with_metrics(self.metrics.clone());
                    sources.trendyol.insert(client.supplier_id().to_string(), client);
                }
                Err(err) => warn!("Trendyol region {region} disabled: {err}"),
            }
        }

        match YemeksepetiClient::from_store(self.secrets.as_ref(), self.transport.clone(), resilience.yemeksepeti()) {
            Ok(client) => sources.yemeksepeti = Some(client.with_metrics(self.metrics.clone())),
            Err(err) => warn!("Yemeksepeti disabled: {err}"),
        }

        info!(
            "Sources: dodois={}, trendyol suppliers={}, yemeksepeti={}",
            sources.dodois.is_some(),
            sources.trendyol.len(),
            sources.yemeksepeti.is_some()
        );
        sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::ScriptedTransport;
    use crate::auth::MemorySecretStore;
    use crate::clients::dodois::{CLIENT_ID_KEY, CLIENT_SECRET_KEY, REFRESH_TOKEN_KEY};

    #[test]
    fn test_sources_follow_available_credentials() {
        let secrets = Arc::new(MemorySecretStore::new([
            (CLIENT_ID_KEY, "id"),
            (CLIENT_SECRET_KEY, "secret"),
            (REFRESH_TOKEN_KEY, "r1"),
            ("REGIONS", "IST,ANK"),
            ("TRENDYOL_API_KEY_IST", "key"),
            ("TRENDYOL_API_SECRET_IST", "secret"),
            ("TRENDYOL_AGENT_NAME_IST", "agent"),
            ("TRENDYOL_AGENT_MAIL_IST", "agent@example.test"),
            ("TRENDYOL_SUPPLIER_ID_IST", "1001"),
        ]));
        let context = AppContext::new(
            Settings::default(),
            secrets,
            PathBuf::from("unused.env"),
            Arc::new(ScriptedTransport::responses(vec![])),
        );

        let sources = context.sources();

        assert!(sources.dodois.is_some());
        assert_eq!(sources.trendyol.keys().collect::<Vec<_>>(), vec!["1001"]);
        assert!(sources.yemeksepeti.is_none());
    }
}
