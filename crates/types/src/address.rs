use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Errors that can occur when parsing an account identifier string.
#[derive(Debug, thiserror::Error)]
pub enum AddressError {
    #[error("account id must start with 'a'")]
    InvalidPrefix,
    #[error("account id must be {expected} characters, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("account id payload is not valid hexadecimal")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("account id payload must be exactly 32 bytes")]
    InvalidPayloadLength,
}

/// Number of raw bytes contained in an account identifier.
pub const ACCOUNT_BYTES: usize = 32;
/// Expected string length of an encoded account id (prefix + 64 hex chars).
pub const ACCOUNT_STRING_LENGTH: usize = 1 + ACCOUNT_BYTES * 2;

/// Encode a 32-byte account identifier into its human readable form.
///
/// The encoded id always begins with the character `a` followed by the
/// hexadecimal representation of the raw bytes.
pub fn encode_account(bytes: &[u8; ACCOUNT_BYTES]) -> String {
    let mut encoded = String::with_capacity(ACCOUNT_STRING_LENGTH);
    encoded.push('a');
    encoded.push_str(&hex::encode(bytes));
    encoded
}

/// Attempt to decode a human readable account id into the raw bytes.
pub fn decode_account(account: &str) -> Result<[u8; ACCOUNT_BYTES], AddressError> {
    if !account.starts_with('a') {
        return Err(AddressError::InvalidPrefix);
    }

    if account.len() != ACCOUNT_STRING_LENGTH {
        return Err(AddressError::InvalidLength {
            expected: ACCOUNT_STRING_LENGTH,
            actual: account.len(),
        });
    }

    let payload = &account[1..];
    let decoded = hex::decode(payload)?;

    let bytes: [u8; ACCOUNT_BYTES] = decoded
        .try_into()
        .map_err(|_| AddressError::InvalidPayloadLength)?;

    Ok(bytes)
}

/// Check whether the provided string is a valid account id.
pub fn is_valid_account(account: &str) -> bool {
    decode_account(account).is_ok()
}

/// Identity of a player, game module, operator or system account.
///
/// Serialises as its string form so it can key JSON maps.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(pub [u8; ACCOUNT_BYTES]);

impl AccountId {
    pub const fn new(bytes: [u8; ACCOUNT_BYTES]) -> Self {
        Self(bytes)
    }

    /// Deterministic id derived from a label, e.g. for tests and well-known
    /// module identities: `BLAKE3("ACCOUNT" || label)`.
    pub fn from_label(label: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"ACCOUNT");
        hasher.update(label.as_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; ACCOUNT_BYTES] {
        &self.0
    }
}

impl From<[u8; ACCOUNT_BYTES]> for AccountId {
    fn from(value: [u8; ACCOUNT_BYTES]) -> Self {
        AccountId(value)
    }
}

impl From<AccountId> for String {
    fn from(value: AccountId) -> Self {
        encode_account(&value.0)
    }
}

impl TryFrom<String> for AccountId {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        decode_account(&value).map(AccountId)
    }
}

impl FromStr for AccountId {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_account(s.trim()).map(AccountId)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_account(&self.0))
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form keeps log lines readable.
        write!(f, "a{}…", &hex::encode(&self.0[..4]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip() {
        let bytes = [0xABu8; ACCOUNT_BYTES];
        let encoded = encode_account(&bytes);
        assert!(encoded.starts_with('a'));
        assert_eq!(encoded.len(), ACCOUNT_STRING_LENGTH);

        let decoded = decode_account(&encoded).expect("account should decode");
        assert_eq!(decoded, bytes);
    }

    #[test]
    fn invalid_prefix_rejected() {
        let bad = "x".to_string() + &"00".repeat(ACCOUNT_BYTES);
        let err = decode_account(&bad).unwrap_err();
        assert!(matches!(err, AddressError::InvalidPrefix));
    }

    #[test]
    fn invalid_length_rejected() {
        let bad = "a".to_string() + &"00".repeat(ACCOUNT_BYTES - 1);
        let err = decode_account(&bad).unwrap_err();
        assert!(matches!(err, AddressError::InvalidLength { .. }));
    }

    #[test]
    fn invalid_hex_rejected() {
        let bad = format!("a{}", "gg".repeat(ACCOUNT_BYTES));
        let err = decode_account(&bad).unwrap_err();
        assert!(matches!(err, AddressError::InvalidHex(_)));
    }

    #[test]
    fn labels_are_deterministic_and_distinct() {
        assert_eq!(AccountId::from_label("slots"), AccountId::from_label("slots"));
        assert_ne!(
            AccountId::from_label("slots"),
            AccountId::from_label("backgammon")
        );
    }

    #[test]
    fn serde_uses_string_form() {
        let id = AccountId::from_label("player");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));
        let back: AccountId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
