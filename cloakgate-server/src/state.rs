//! Application State
//!
//! Every service is built once here and shared through `Arc`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use cloakgate_core::modules::update_config;
use cloakgate_core::{AppResult, Cloaker, FingerprintTransport, MasqueradeTraceStore, SessionPoolRegistry};
use cloakgate_types::CloakgateConfig;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

pub struct AppStateInner {
    pub registry: Arc<SessionPoolRegistry>,
    pub traces: Arc<MasqueradeTraceStore>,
    pub cloaker: Arc<Cloaker>,
    /// Present only when TLS fingerprinting is enabled
    pub transport: Option<Arc<FingerprintTransport>>,
    /// File runtime toggles are written back to; `None` keeps them in memory
    pub config_path: Option<PathBuf>,
}

impl AppState {
    pub fn new(config: &CloakgateConfig, config_path: Option<PathBuf>) -> AppResult<Self> {
        let registry = Arc::new(SessionPoolRegistry::from_config(&config.session_pool));

        let traces = Arc::new(MasqueradeTraceStore::default());
        traces.apply_config(&config.masquerade_trace);

        let cloaker = Arc::new(Cloaker::new(
            Arc::clone(&registry),
            Arc::clone(&traces),
            config.cloak.clone(),
            config.session_pool,
        ));

        let transport = if config.tls_fingerprint.enabled {
            Some(Arc::new(FingerprintTransport::from_config(&config.tls_fingerprint)?))
        } else {
            None
        };

        Ok(Self::from_components(registry, traces, cloaker, transport, config_path))
    }

    pub fn from_components(
        registry: Arc<SessionPoolRegistry>,
        traces: Arc<MasqueradeTraceStore>,
        cloaker: Arc<Cloaker>,
        transport: Option<Arc<FingerprintTransport>>,
        config_path: Option<PathBuf>,
    ) -> Self {
        Self { inner: Arc::new(AppStateInner { registry, traces, cloaker, transport, config_path }) }
    }

    pub fn registry(&self) -> &SessionPoolRegistry {
        &self.inner.registry
    }

    pub fn traces(&self) -> &MasqueradeTraceStore {
        &self.inner.traces
    }

    pub fn cloaker(&self) -> &Cloaker {
        &self.inner.cloaker
    }

    pub fn transport(&self) -> Option<&FingerprintTransport> {
        self.inner.transport.as_deref()
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.inner.config_path.as_deref()
    }

    /// Write the masquerade trace toggle back to the config file, if any.
    pub fn persist_trace_enabled(&self, enabled: bool) -> AppResult<()> {
        if let Some(path) = self.config_path() {
            update_config(path, |config| config.masquerade_trace.enable = enabled)?;
            tracing::info!(path = %path.display(), enabled, "Persisted masquerade trace setting");
        }
        Ok(())
    }

    /// Drop cached upstream connections.
    pub fn shutdown(&self) {
        if let Some(transport) = self.transport() {
            transport.close();
        }
    }
}
