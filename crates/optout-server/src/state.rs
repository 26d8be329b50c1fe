use std::path::PathBuf;
use std::sync::Arc;

use optout_core::config::{self, AppConfig};
use optout_core::error::Result;
use optout_core::profile::ProfileRegistry;
use optout_core::signer::Signer;
use optout_core::store::Store;
use optout_core::transport::{
    FormClient, HttpFormClient, HttpMailer, HttpProbe, Mailer, PresenceProbe,
};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub data_dir: PathBuf,
    pub config: Arc<AppConfig>,
    pub store: Arc<Store>,
    pub mailer: Arc<dyn Mailer>,
    pub forms: Arc<dyn FormClient>,
    pub probe: Arc<dyn PresenceProbe>,
}

impl AppState {
    /// Open the store and wire up the HTTP transports from the config.
    pub fn new(data_dir: PathBuf, config: AppConfig) -> Result<Self> {
        let timeout = config.timeout();
        let mailer = HttpMailer::new(config.relay_url.clone(), config.from_email.clone(), timeout)?;
        let forms = HttpFormClient::new(timeout)?;
        let probe = HttpProbe::new(timeout)?;
        Self::with_transports(
            data_dir,
            config,
            Arc::new(mailer),
            Arc::new(forms),
            Arc::new(probe),
        )
    }

    /// Same state with caller-supplied transports, so tests never touch
    /// the network.
    pub fn with_transports(
        data_dir: PathBuf,
        config: AppConfig,
        mailer: Arc<dyn Mailer>,
        forms: Arc<dyn FormClient>,
        probe: Arc<dyn PresenceProbe>,
    ) -> Result<Self> {
        optout_core::io::ensure_dir(&data_dir)?;
        let store = Store::open(&config::db_path(&data_dir))?;
        Ok(Self {
            data_dir,
            config: Arc::new(config),
            store: Arc::new(store),
            mailer,
            forms,
            probe,
        })
    }

    /// Controller registry, re-read per request so edits to the YAML file
    /// take effect without a restart.
    pub fn registry(&self) -> Result<ProfileRegistry> {
        ProfileRegistry::load(&config::registry_path(&self.data_dir))
    }

    pub fn signer(&self) -> Result<Signer> {
        Signer::from_base64(
            self.config.signing_key.as_deref(),
            self.config.signing_key_id.as_deref(),
        )
    }
}
