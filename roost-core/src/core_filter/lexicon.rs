//! Bundled lexicon, ciphered with the default key

/// Entries compiled into the binary, used when the remote list is not wanted
pub const BUNDLED_LEXICON: &[&str] = &[
    "rwrlg",
    "nlilm",
    "hgfkrw",
    "wfnyzhh",
    "qvipuzxv",
    "xizk",
    "yzhgziw",
    "hxivdblf",
    "hsfgfk",
    "olhvi",
    "mrgdrg",
    "ylal",
];

/// Lowercase, trim and drop blank entries
pub fn normalize_entries<I, S>(entries: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    entries
        .into_iter()
        .map(|entry| entry.as_ref().trim().to_lowercase())
        .filter(|entry| !entry.is_empty())
        .collect()
}
