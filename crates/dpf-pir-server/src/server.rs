//! DPF PIR server in Plain, Leader or Helper mode

use std::sync::Arc;
use std::time::Instant;

use dpf_pir_core::{
    Database, DistributedPointFunction, LeaderRequest, PirConfig, PirRequest, PirResponse,
    PointFunction, RequestDecrypter, Role,
};
use serde::Serialize;

use crate::error::{Result, ServerError};
use crate::metrics;
use crate::state::RecordStore;

/// Leader-side capability: deliver the sealed Helper request and return the
/// Helper's serialized [`PirResponse`]
pub trait HelperForwarder: Send + Sync {
    fn forward(&self, sealed_request: &[u8]) -> dpf_pir_core::Result<Vec<u8>>;
}

impl<F> HelperForwarder for F
where
    F: Fn(&[u8]) -> dpf_pir_core::Result<Vec<u8>> + Send + Sync,
{
    fn forward(&self, sealed_request: &[u8]) -> dpf_pir_core::Result<Vec<u8>> {
        self(sealed_request)
    }
}

/// What the server does with incoming request bytes
pub enum ServerMode {
    /// Answers one of two independent plain requests
    Plain,
    /// Answers its own share and forwards the sealed Helper request
    Leader { forwarder: Box<dyn HelperForwarder> },
    /// Opens requests forwarded by the Leader
    Helper {
        decrypter: Box<dyn RequestDecrypter>,
        context_info: String,
    },
}

impl ServerMode {
    pub fn role(&self) -> Role {
        match self {
            ServerMode::Plain => Role::Plain,
            ServerMode::Leader { .. } => Role::Leader,
            ServerMode::Helper { .. } => Role::Helper,
        }
    }
}

impl std::fmt::Debug for ServerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.role().as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ServerStatus {
    Created,
    Ready,
    Destroyed,
}

enum DatabaseSource {
    Fixed(Arc<Database>),
    Store(RecordStore),
}

impl DatabaseSource {
    fn snapshot(&self) -> Arc<Database> {
        match self {
            DatabaseSource::Fixed(db) => db.clone(),
            DatabaseSource::Store(store) => store.snapshot(),
        }
    }
}

enum Lifecycle {
    Created,
    Ready(DatabaseSource),
    Destroyed,
}

/// Server statistics for monitoring
#[derive(Debug, Clone, Serialize)]
pub struct ServerStats {
    pub role: Role,
    pub status: ServerStatus,
    pub num_elements: u64,
    pub record_width: usize,
}

/// One of the two PIR servers
///
/// `handle_request` takes `&self` and may be called from many threads at
/// once; share the server through an `Arc`.
pub struct DpfPirServer {
    config: PirConfig,
    dpf: DistributedPointFunction,
    mode: ServerMode,
    lifecycle: Lifecycle,
}

impl DpfPirServer {
    /// Create a server without a database
    pub fn new(config: PirConfig, mode: ServerMode) -> Result<Self> {
        config.validate()?;
        let dpf = DistributedPointFunction::for_database_size(config.num_elements)?;
        Ok(Self {
            config,
            dpf,
            mode,
            lifecycle: Lifecycle::Created,
        })
    }

    pub fn create_plain(config: PirConfig) -> Result<Self> {
        Self::new(config, ServerMode::Plain)
    }

    pub fn create_leader(
        config: PirConfig,
        forwarder: impl HelperForwarder + 'static,
    ) -> Result<Self> {
        Self::new(
            config,
            ServerMode::Leader {
                forwarder: Box::new(forwarder),
            },
        )
    }

    /// Helper using the configured context string to open sealed requests
    pub fn create_helper(
        config: PirConfig,
        decrypter: impl RequestDecrypter + 'static,
    ) -> Result<Self> {
        let context_info = config.encryption_context_info.clone();
        Self::new(
            config,
            ServerMode::Helper {
                decrypter: Box::new(decrypter),
                context_info,
            },
        )
    }

    pub fn role(&self) -> Role {
        self.mode.role()
    }

    pub fn config(&self) -> &PirConfig {
        &self.config
    }

    pub fn status(&self) -> ServerStatus {
        match self.lifecycle {
            Lifecycle::Created => ServerStatus::Created,
            Lifecycle::Ready(_) => ServerStatus::Ready,
            Lifecycle::Destroyed => ServerStatus::Destroyed,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status() == ServerStatus::Ready
    }

    fn check_size(&self, actual: usize) -> Result<()> {
        if actual as u64 != self.config.num_elements {
            return Err(ServerError::ConfigMismatch {
                field: "num_elements".to_string(),
                config_value: self.config.num_elements.to_string(),
                actual_value: actual.to_string(),
            });
        }
        Ok(())
    }

    fn attach(&mut self, source: DatabaseSource) -> Result<()> {
        if let Lifecycle::Destroyed = self.lifecycle {
            return Err(ServerError::NotReady("server has been destroyed".to_string()));
        }
        let database = source.snapshot();
        self.check_size(database.size())?;

        tracing::info!(
            role = %self.role(),
            records = database.size(),
            record_width = database.record_width(),
            "Database attached"
        );
        self.lifecycle = Lifecycle::Ready(source);
        metrics::set_server_ready(self.role().as_str(), true);
        Ok(())
    }

    /// Attach an immutable database and become Ready
    pub fn attach_database(&mut self, database: impl Into<Arc<Database>>) -> Result<()> {
        self.attach(DatabaseSource::Fixed(database.into()))
    }

    /// Serve from a rewritable store; each request reads one snapshot
    pub fn attach_store(&mut self, store: RecordStore) -> Result<()> {
        self.attach(DatabaseSource::Store(store))
    }

    /// Release the database; every later request fails
    pub fn destroy(&mut self) {
        self.lifecycle = Lifecycle::Destroyed;
        metrics::set_server_ready(self.role().as_str(), false);
        tracing::info!(role = %self.role(), "Server destroyed");
    }

    /// Database the next request would be answered from
    pub fn database(&self) -> Result<Arc<Database>> {
        match &self.lifecycle {
            Lifecycle::Ready(source) => Ok(source.snapshot()),
            Lifecycle::Created => Err(ServerError::NotReady(
                "no database attached".to_string(),
            )),
            Lifecycle::Destroyed => Err(ServerError::NotReady(
                "server has been destroyed".to_string(),
            )),
        }
    }

    pub fn stats(&self) -> ServerStats {
        ServerStats {
            role: self.role(),
            status: self.status(),
            num_elements: self.config.num_elements,
            record_width: self.database().map(|db| db.record_width()).unwrap_or(0),
        }
    }

    /// Answer one serialized request
    pub fn handle_request(&self, request: &[u8]) -> Result<PirResponse> {
        let started = Instant::now();
        let result = self.dispatch(request);

        let outcome = metrics::outcome_label(result.as_ref().err().map(|e| e.kind()));
        metrics::record_pir_request(self.role().as_str(), outcome, started.elapsed());
        match &result {
            Ok(response) => tracing::debug!(
                role = %self.role(),
                values = response.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Request answered"
            ),
            Err(e) => tracing::debug!(role = %self.role(), error = %e, "Request rejected"),
        }
        result
    }

    /// Answer one serialized request with a serialized response
    pub fn handle_request_bytes(&self, request: &[u8]) -> Result<Vec<u8>> {
        Ok(self.handle_request(request)?.to_bytes()?)
    }

    fn dispatch(&self, request: &[u8]) -> Result<PirResponse> {
        let database = self.database()?;

        match &self.mode {
            ServerMode::Plain => {
                let request = PirRequest::from_bytes(request)?;
                self.evaluate(&database, &request, Role::Plain)
            }
            ServerMode::Leader { forwarder } => {
                let request = LeaderRequest::from_bytes(request)?;
                let own = self.evaluate(&database, &request.leader_request, Role::Leader)?;

                let Some(sealed) = &request.encrypted_helper_request else {
                    return Ok(own);
                };
                let helper_bytes = forwarder
                    .forward(sealed)
                    .map_err(|e| ServerError::Forward(e.to_string()))?;
                let helper = PirResponse::from_bytes(&helper_bytes).map_err(|e| {
                    ServerError::Forward(format!("undecodable helper response: {}", e))
                })?;
                Ok(own.combine(&helper)?)
            }
            ServerMode::Helper {
                decrypter,
                context_info,
            } => {
                let plaintext = decrypter
                    .decrypt(request, context_info)
                    .map_err(|e| ServerError::Decrypt(e.to_string()))?;
                let request = PirRequest::from_bytes(&plaintext)?;
                let mut response = self.evaluate(&database, &request, Role::Helper)?;
                // Only padded values leave the Helper
                if let Some(pad_seed) = &request.pad_seed {
                    pad_seed.apply(&mut response);
                }
                Ok(response)
            }
        }
    }

    /// Expand each share, truncate to the database size and take the inner product
    fn evaluate(
        &self,
        database: &Database,
        request: &PirRequest,
        role: Role,
    ) -> Result<PirResponse> {
        request.validate(role)?;

        let mut masked_values = Vec::with_capacity(request.len());
        for key in &request.shares {
            let mut selection = self.dpf.expand(key)?;
            selection.truncate(database.size());
            let mut product = database.inner_product(std::slice::from_ref(&selection))?;
            masked_values.append(&mut product);
        }

        Ok(PirResponse::new(masked_values))
    }
}

/// Builder for DpfPirServer
pub struct ServerBuilder {
    config: PirConfig,
    mode: ServerMode,
    database: Option<Arc<Database>>,
    store: Option<RecordStore>,
}

impl ServerBuilder {
    pub fn new(config: PirConfig) -> Self {
        Self {
            config,
            mode: ServerMode::Plain,
            database: None,
            store: None,
        }
    }

    pub fn leader(mut self, forwarder: impl HelperForwarder + 'static) -> Self {
        self.mode = ServerMode::Leader {
            forwarder: Box::new(forwarder),
        };
        self
    }

    pub fn helper(mut self, decrypter: impl RequestDecrypter + 'static) -> Self {
        self.mode = ServerMode::Helper {
            decrypter: Box::new(decrypter),
            context_info: self.config.encryption_context_info.clone(),
        };
        self
    }

    pub fn database(mut self, database: impl Into<Arc<Database>>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn store(mut self, store: RecordStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Build the server; it is Ready when a database or store was given
    pub fn build(self) -> Result<DpfPirServer> {
        let mut server = DpfPirServer::new(self.config, self.mode)?;
        if let Some(store) = self.store {
            server.attach_store(store)?;
        } else if let Some(database) = self.database {
            server.attach_database(database)?;
        }
        Ok(server)
    }
}
