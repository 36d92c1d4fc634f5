//! Content filter for user-entered text
//!
//! Display names, post subjects and post bodies are checked against a
//! ciphered lexicon before they are sent anywhere.

pub mod cipher;
pub mod errors;
pub mod filter;
pub mod lexicon;
pub mod source;

pub use cipher::{Cipher, DEFAULT_KEY};
pub use errors::{CipherError, FilterError, FilterResult};
pub use filter::{ContentFilter, LexiconOrigin};
pub use lexicon::BUNDLED_LEXICON;
pub use source::LexiconSource;
