use serde::de::{self, Deserialize, Deserializer};

use crate::config::{ConnectionConfig, TransportMode};
use crate::error::{Error, Result};

use super::batch::BatchClient;
use super::stream::StreamingClient;

/// The live client behind a connection, chosen by [`TransportMode`].
///
/// Neither `Clone` nor deserializable: a client is only ever obtained from
/// a [`super::ClientRegistry`].
#[derive(Debug)]
pub enum Transport {
    Streaming(StreamingClient),
    Batch(BatchClient),
}

impl Transport {
    pub fn connect(config: &ConnectionConfig) -> Result<Self> {
        let base = config.base_url()?;
        let transport = match config.mode {
            TransportMode::Streaming => Transport::Streaming(StreamingClient::connect(
                base,
                &config.username,
                &config.password,
                &config.database,
                config.read_only,
            )?),
            TransportMode::Batch => Transport::Batch(BatchClient::new(
                base,
                &config.username,
                &config.password,
                &config.database,
                config.read_only,
            )?),
        };
        tracing::info!(connection = %config.display_string(), "transport client created");
        Ok(transport)
    }

    pub fn mode(&self) -> TransportMode {
        match self {
            Transport::Streaming(_) => TransportMode::Streaming,
            Transport::Batch(_) => TransportMode::Batch,
        }
    }
}

impl<'de> Deserialize<'de> for Transport {
    fn deserialize<D: Deserializer<'de>>(_deserializer: D) -> std::result::Result<Self, D::Error> {
        Err(de::Error::custom(Error::InvalidLifecycle))
    }
}
