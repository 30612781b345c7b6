//! Participant identities and maker signing keys.
//!
//! Every participant (maker, taker, the market operator itself) is named by an
//! [`Address`]: the 32 raw bytes of an Ed25519 public key, rendered in base58.
//! Makers hold a [`Wallet`] and sign intent digests with it.

use std::fmt;
use std::str::FromStr;

use ed25519_dalek::{Signature as DalekSignature, Signer, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::CoreError;

/// A participant address (Ed25519 public key bytes).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address([u8; 32]);

/// A detached Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; 64]);

/// An Ed25519 keypair owned by a maker.
#[derive(Debug)]
pub struct Wallet {
    signing_key: SigningKey,
}

impl Wallet {
    /// Creates a wallet with a freshly generated keypair.
    #[must_use]
    pub fn new() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Creates a wallet from a 32-byte secret seed.
    #[must_use]
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// The address this wallet signs as.
    #[must_use]
    pub fn address(&self) -> Address {
        Address(self.signing_key.verifying_key().to_bytes())
    }

    /// Signs a message.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.signing_key.sign(message).to_bytes())
    }
}

impl Default for Wallet {
    fn default() -> Self {
        Self::new()
    }
}

impl Address {
    /// Wraps raw public key bytes.
    ///
    /// No curve check is made here; addresses that are not valid keys simply
    /// never verify a signature.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Verifies that `signature` over `message` was produced by this address.
    ///
    /// Uses strict verification so a signature has exactly one valid encoding.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidAddress` if the bytes are not a curve point,
    /// and `CoreError::InvalidSignature` if verification fails.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), CoreError> {
        let key = VerifyingKey::from_bytes(&self.0)
            .map_err(|e| CoreError::InvalidAddress(e.to_string()))?;
        key.verify_strict(message, &DalekSignature::from_bytes(&signature.0))
            .map_err(|_| CoreError::InvalidSignature)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl FromStr for Address {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| CoreError::InvalidAddress(e.to_string()))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CoreError::InvalidAddress(format!("{s} is not 32 bytes")))?;
        Ok(Self(bytes))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

impl Signature {
    /// Wraps raw signature bytes. Any 64 bytes are accepted; malformed
    /// signatures are rejected at verification time.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", bs58::encode(self.0).into_string())
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&bs58::encode(self.0).into_string())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = bs58::decode(&s).into_vec().map_err(de::Error::custom)?;
        let bytes: [u8; 64] = bytes
            .try_into()
            .map_err(|_| de::Error::custom("signature must be 64 bytes"))?;
        Ok(Self(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn signature_verifies_under_signer_address() {
        let wallet = Wallet::new();
        let sig = wallet.sign(b"intent");
        assert!(wallet.address().verify(b"intent", &sig).is_ok());
    }

    #[test]
    fn tampered_message_is_rejected() {
        let wallet = Wallet::new();
        let sig = wallet.sign(b"intent");
        assert_eq!(
            wallet.address().verify(b"other", &sig),
            Err(CoreError::InvalidSignature)
        );
    }

    #[test]
    fn other_address_is_rejected() {
        let sig = Wallet::new().sign(b"intent");
        assert!(Wallet::new().address().verify(b"intent", &sig).is_err());
    }

    #[test]
    fn zeroed_signature_is_rejected() {
        let wallet = Wallet::new();
        let sig = Signature::from_bytes([0u8; 64]);
        assert!(wallet.address().verify(b"intent", &sig).is_err());
    }

    #[test]
    fn seeded_wallet_is_deterministic() {
        let a = Wallet::from_seed(&[7u8; 32]);
        let b = Wallet::from_seed(&[7u8; 32]);
        assert_eq!(a.address(), b.address());
    }

    #[test]
    fn address_text_form_roundtrips() {
        let address = Wallet::new().address();
        let parsed: Address = address.to_string().parse().expect("parse");
        assert_eq!(parsed, address);
        assert!("not-base58-0OIl".parse::<Address>().is_err());
        assert!("3mJr7AoUXx2Wqd".parse::<Address>().is_err());
    }

    #[test]
    fn signature_serde_rejects_wrong_length() {
        let json = format!("\"{}\"", bs58::encode([1u8; 10]).into_string());
        assert!(serde_json::from_str::<Signature>(&json).is_err());
    }

    proptest! {
        #[test]
        fn prop_any_message_verifies(message in proptest::collection::vec(any::<u8>(), 0..256)) {
            let wallet = Wallet::from_seed(&[42u8; 32]);
            let sig = wallet.sign(&message);
            prop_assert!(wallet.address().verify(&message, &sig).is_ok());
        }
    }
}
