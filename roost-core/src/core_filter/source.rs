//! Where a remote lexicon comes from

use crate::core_loadable::TransportError;
use async_trait::async_trait;

/// Remote list of ciphered lexicon entries
#[async_trait]
pub trait LexiconSource: Send + Sync {
    async fn fetch_entries(&self) -> Result<Vec<String>, TransportError>;
}
