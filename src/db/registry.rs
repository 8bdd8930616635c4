use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::{ConnectionConfig, TransportMode};
use crate::error::Result;

use super::transport::Transport;

/// Config fields that decide which server and credentials a client talks
/// to. Grammar options and the async flag do not take part.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ClientKey {
    mode: TransportMode,
    host: String,
    port: u16,
    username: String,
    password: String,
    database: String,
    use_tls: bool,
    read_only: bool,
}

impl From<&ConnectionConfig> for ClientKey {
    fn from(config: &ConnectionConfig) -> Self {
        Self {
            mode: config.mode,
            host: config.host.clone(),
            port: config.port,
            username: config.username.clone(),
            password: config.password.clone(),
            database: config.database.clone(),
            use_tls: config.use_tls,
            read_only: config.read_only,
        }
    }
}

/// At most one live client per connection identity, shared by every
/// connection built on the same registry.
#[derive(Default)]
pub struct ClientRegistry {
    clients: Mutex<HashMap<ClientKey, Arc<Transport>>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The client for `config`, created on first use.
    pub fn get_or_connect(&self, config: &ConnectionConfig) -> Result<Arc<Transport>> {
        let key = ClientKey::from(config);
        let mut clients = self.clients.lock();
        if let Some(existing) = clients.get(&key) {
            return Ok(Arc::clone(existing));
        }
        let transport = Arc::new(Transport::connect(config)?);
        clients.insert(key, Arc::clone(&transport));
        Ok(transport)
    }

    /// Forget the client for `config`; the next lookup creates a new one.
    /// Holders of the old client keep using it until they drop it.
    pub fn reset(&self, config: &ConnectionConfig) -> bool {
        self.clients.lock().remove(&ClientKey::from(config)).is_some()
    }

    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
