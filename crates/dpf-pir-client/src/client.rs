//! DPF PIR client implementation

use dpf_pir_core::{
    unframe_record, Block, ClientState, DistributedPointFunction, DpfKey, LeaderRequest,
    PadSeed, PirConfig, PirRequest, PirResponse, PointFunction, RequestEncrypter, Role,
    DEFAULT_CONTEXT_INFO, DEFAULT_DELIMITER,
};

use crate::error::{ClientError, Result};

/// How retrieved records are handed back
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    /// One byte string per requested index
    Records,
    /// All records decoded as UTF-8 (lossily) and joined with `delimiter`
    Joined { delimiter: String },
}

impl OutputMode {
    pub fn joined() -> Self {
        OutputMode::Joined {
            delimiter: DEFAULT_DELIMITER.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrievedOutput {
    Records(Vec<Vec<u8>>),
    Joined(String),
}

/// Client side of the two-server protocol
///
/// Holds no per-query state: everything needed to combine responses is
/// returned as a [`ClientState`] alongside the requests.
pub struct DpfPirClient {
    database_size: u64,
    dpf: DistributedPointFunction,
    encrypter: Option<Box<dyn RequestEncrypter>>,
    context_info: String,
    output_mode: OutputMode,
}

impl DpfPirClient {
    pub fn database_size(&self) -> u64 {
        self.database_size
    }

    pub fn output_mode(&self) -> &OutputMode {
        &self.output_mode
    }

    fn check_indices(&self, indices: &[i64]) -> Result<Vec<u64>> {
        if indices.is_empty() {
            return Err(ClientError::EmptyQuery);
        }
        indices
            .iter()
            .map(|&index| {
                if index < 0 || index as u64 >= self.database_size {
                    Err(ClientError::IndexOutOfBounds {
                        index,
                        size: self.database_size,
                    })
                } else {
                    Ok(index as u64)
                }
            })
            .collect()
    }

    /// Fresh key pair per index, selecting with the all-ones mask
    fn generate_shares(
        &self,
        indices: &[i64],
    ) -> Result<(Vec<DpfKey>, Vec<DpfKey>, ClientState)> {
        let checked = self.check_indices(indices)?;

        let mut shares0 = Vec::with_capacity(checked.len());
        let mut shares1 = Vec::with_capacity(checked.len());
        for &index in &checked {
            let (k0, k1) = self.dpf.generate_keys(index, Block::ONES)?;
            shares0.push(k0);
            shares1.push(k1);
        }

        Ok((shares0, shares1, ClientState::new(checked)))
    }

    /// Requests for two independent Plain servers
    pub fn create_plain_requests(
        &self,
        indices: &[i64],
    ) -> Result<(PirRequest, PirRequest, ClientState)> {
        let (shares0, shares1, state) = self.generate_shares(indices)?;
        tracing::debug!(count = state.len(), "Created plain requests");
        Ok((
            PirRequest::new(Role::Plain, shares0),
            PirRequest::new(Role::Plain, shares1),
            state,
        ))
    }

    /// Single request for the Leader, carrying the Helper's request sealed
    ///
    /// The sealed request includes a fresh pad seed; the returned state keeps
    /// it for [`handle_leader_response`](Self::handle_leader_response).
    pub fn create_request(&self, indices: &[i64]) -> Result<(LeaderRequest, ClientState)> {
        let encrypter = self.encrypter.as_ref().ok_or(ClientError::MissingEncrypter)?;
        let (shares0, shares1, state) = self.generate_shares(indices)?;
        let pad_seed = PadSeed::generate();

        let helper_request = PirRequest::new(Role::Helper, shares1)
            .with_pad_seed(pad_seed)
            .to_bytes()?;
        let sealed = encrypter
            .encrypt(&helper_request, &self.context_info)
            .map_err(|e| ClientError::Encrypt(e.to_string()))?;

        tracing::debug!(
            count = state.len(),
            sealed_bytes = sealed.len(),
            "Created leader request"
        );
        Ok((
            LeaderRequest {
                leader_request: PirRequest::new(Role::Leader, shares0),
                encrypted_helper_request: Some(sealed),
            },
            state.with_pad_seed(pad_seed),
        ))
    }

    fn check_arity(&self, response: &PirResponse, state: &ClientState) -> Result<()> {
        if response.len() != state.len() {
            return Err(ClientError::ResponseMismatch(format!(
                "expected {} values, got {}",
                state.len(),
                response.len()
            )));
        }
        Ok(())
    }

    fn decode_records(&self, combined: &PirResponse) -> Result<Vec<Vec<u8>>> {
        combined
            .masked_values
            .iter()
            .map(|framed| unframe_record(framed).map_err(ClientError::from))
            .collect()
    }

    /// Combine the two Plain servers' responses into the requested records
    pub fn handle_response(
        &self,
        response1: &PirResponse,
        response2: &PirResponse,
        state: &ClientState,
    ) -> Result<Vec<Vec<u8>>> {
        self.check_arity(response1, state)?;
        self.check_arity(response2, state)?;
        let combined = response1.combine(response2)?;
        self.decode_records(&combined)
    }

    /// Strip the Helper pad from a Leader response and decode it
    ///
    /// The Leader has already combined both servers' values.
    pub fn handle_leader_response(
        &self,
        response: &PirResponse,
        state: &ClientState,
    ) -> Result<Vec<Vec<u8>>> {
        self.check_arity(response, state)?;
        let pad_seed = state.pad_seed.ok_or(ClientError::MissingPadSeed)?;

        let mut unpadded = response.clone();
        pad_seed.apply(&mut unpadded);
        self.decode_records(&unpadded)
    }

    /// Shape records according to the configured output mode
    pub fn present(&self, records: Vec<Vec<u8>>) -> RetrievedOutput {
        match &self.output_mode {
            OutputMode::Records => RetrievedOutput::Records(records),
            OutputMode::Joined { delimiter } => RetrievedOutput::Joined(
                records
                    .iter()
                    .map(|r| String::from_utf8_lossy(r))
                    .collect::<Vec<_>>()
                    .join(delimiter.as_str()),
            ),
        }
    }

    /// `handle_response` followed by `present`
    pub fn handle_response_output(
        &self,
        response1: &PirResponse,
        response2: &PirResponse,
        state: &ClientState,
    ) -> Result<RetrievedOutput> {
        Ok(self.present(self.handle_response(response1, response2, state)?))
    }
}

/// Builder for DpfPirClient
pub struct ClientBuilder {
    database_size: u64,
    encrypter: Option<Box<dyn RequestEncrypter>>,
    context_info: String,
    output_mode: OutputMode,
}

impl ClientBuilder {
    pub fn new(database_size: u64) -> Self {
        Self {
            database_size,
            encrypter: None,
            context_info: DEFAULT_CONTEXT_INFO.to_string(),
            output_mode: OutputMode::Records,
        }
    }

    /// Take database size and context string from a shared config
    pub fn from_config(config: &PirConfig) -> Self {
        Self::new(config.num_elements).context_info(config.encryption_context_info.clone())
    }

    pub fn encrypter(mut self, encrypter: impl RequestEncrypter + 'static) -> Self {
        self.encrypter = Some(Box::new(encrypter));
        self
    }

    pub fn context_info(mut self, context_info: impl Into<String>) -> Self {
        self.context_info = context_info.into();
        self
    }

    pub fn output_mode(mut self, output_mode: OutputMode) -> Self {
        self.output_mode = output_mode;
        self
    }

    pub fn build(self) -> Result<DpfPirClient> {
        let dpf = DistributedPointFunction::for_database_size(self.database_size)?;
        Ok(DpfPirClient {
            database_size: self.database_size,
            dpf,
            encrypter: self.encrypter,
            context_info: self.context_info,
            output_mode: self.output_mode,
        })
    }
}
