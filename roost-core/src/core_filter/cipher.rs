/*
    cipher.rs - Fixed 26-letter substitution cipher

    Lexicon entries are stored ciphered so the word list is not readable
    in the binary or the remote. Only ASCII a-z is substituted; text is
    lowercased first and everything else passes through unchanged.
*/

use super::errors::CipherError;

/// Reversed alphabet; applying it twice is the identity
pub const DEFAULT_KEY: &str = "zyxwvutsrqponmlkjihgfedcba";

/// Letter-for-letter substitution over `a..=z`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cipher {
    forward: [u8; 26],
    inverse: [u8; 26],
}

impl Cipher {
    /// Build a cipher from a key listing the image of `a`, `b`, ... `z`
    pub fn new(key: &str) -> Result<Self, CipherError> {
        let bytes: Vec<char> = key.chars().collect();
        if bytes.len() != 26 {
            return Err(CipherError::WrongLength(bytes.len()));
        }

        let mut forward = [0u8; 26];
        let mut inverse = [0u8; 26];
        let mut seen = [false; 26];

        for (i, c) in bytes.into_iter().enumerate() {
            if !c.is_ascii_lowercase() {
                return Err(CipherError::InvalidCharacter(c));
            }
            let target = c as u8 - b'a';
            if seen[target as usize] {
                return Err(CipherError::DuplicateLetter(c));
            }
            seen[target as usize] = true;
            forward[i] = c as u8;
            inverse[target as usize] = b'a' + i as u8;
        }

        Ok(Cipher { forward, inverse })
    }

    /// Lowercase `text` and substitute each letter
    pub fn encode(&self, text: &str) -> String {
        Self::map(&self.forward, text)
    }

    /// Lowercase `text` and undo the substitution
    pub fn decode(&self, text: &str) -> String {
        Self::map(&self.inverse, text)
    }

    /// True if encoding is its own inverse
    pub fn is_involution(&self) -> bool {
        self.forward == self.inverse
    }

    /// The key this cipher was built from
    pub fn key(&self) -> String {
        self.forward.iter().map(|&b| b as char).collect()
    }

    fn map(table: &[u8; 26], text: &str) -> String {
        text.to_lowercase()
            .chars()
            .map(|c| {
                if c.is_ascii_lowercase() {
                    table[(c as u8 - b'a') as usize] as char
                } else {
                    c
                }
            })
            .collect()
    }
}

impl Default for Cipher {
    fn default() -> Self {
        let mut forward = [0u8; 26];
        for (i, slot) in forward.iter_mut().enumerate() {
            *slot = b'z' - i as u8;
        }
        Cipher {
            forward,
            inverse: forward,
        }
    }
}
