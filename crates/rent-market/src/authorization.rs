//! Intent digests and maker signature checks.
//!
//! A [`RentalTerms`] value is canonicalized into a fixed-width byte layout and
//! hashed together with a per-deployment domain separator. The separator folds
//! in the market's name, version, instance id and operator address, so the
//! same terms hash differently on every engine and a signature collected for
//! one engine cannot be replayed against another.

use std::fmt;

use rent_core::{Address, Signature, Wallet};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::config::MarketConfig;
use crate::error::MarketError;
use crate::terms::RentalTerms;

/// Type tag hashed into every terms digest.
pub const TERMS_TYPE_TAG: &[u8] = b"RentalTerms(address maker,address assetContract,uint64 assetId,\
uint64 dailyRent,uint64 maxDuration,uint64 minCollateral,int64 listingExpiry,uint64 nonce)";

/// Type tag hashed into the domain separator.
pub const DOMAIN_TYPE_TAG: &[u8] =
    b"RentalMarketDomain(string name,string version,string instanceId,address market)";

/// Prefix that keeps terms digests disjoint from any other hashed structure.
const DIGEST_PREFIX: &[u8] = b"\x19\x01";

/// Canonical 32-byte hash identifying a listing.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Digest([u8; 32]);

impl Digest {
    /// Wraps raw digest bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex encoding.
    #[must_use]
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|byte| format!("{byte:02x}")).collect()
    }

    fn from_hex(s: &str) -> Option<Self> {
        if s.len() != 64 || !s.is_ascii() {
            return None;
        }
        let mut out = [0u8; 32];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).ok()?;
        }
        Some(Self(out))
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", &self.to_hex()[..16])
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).ok_or_else(|| de::Error::custom("digest must be 64 hex chars"))
    }
}

/// A maker's signature over a terms digest, together with the address that
/// claims to have produced it.
///
/// Ed25519 has no public-key recovery, so the claimed signer travels with the
/// signature and recovery means checking the claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentSignature {
    /// Claimed signer.
    pub signer: Address,
    /// Signature over the digest bytes.
    pub signature: Signature,
}

impl IntentSignature {
    /// Signs `digest` with `wallet`.
    #[must_use]
    pub fn sign(wallet: &Wallet, digest: &Digest) -> Self {
        Self {
            signer: wallet.address(),
            signature: wallet.sign(digest.as_bytes()),
        }
    }
}

/// Recovers the address that signed a digest.
pub trait SignerRecovery: Send + Sync {
    /// Returns the signer of `digest`.
    ///
    /// # Errors
    ///
    /// Returns `MarketError::InvalidSignature` if the signature is malformed
    /// or does not match.
    fn recover_signer(
        &self,
        digest: &Digest,
        signature: &IntentSignature,
    ) -> Result<Address, MarketError>;
}

/// Strict Ed25519 verification of the claimed signer.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Recovery;

impl SignerRecovery for Ed25519Recovery {
    fn recover_signer(
        &self,
        digest: &Digest,
        signature: &IntentSignature,
    ) -> Result<Address, MarketError> {
        signature
            .signer
            .verify(digest.as_bytes(), &signature.signature)?;
        Ok(signature.signer)
    }
}

/// Digests intents for one engine instance and checks maker signatures.
pub struct OrderAuthority {
    domain_separator: Digest,
    recovery: Box<dyn SignerRecovery>,
}

impl OrderAuthority {
    /// Creates an authority for the engine described by `config`, verifying
    /// with Ed25519.
    #[must_use]
    pub fn new(config: &MarketConfig) -> Self {
        Self::with_recovery(config, Box::new(Ed25519Recovery))
    }

    /// Creates an authority with a custom signer recovery.
    #[must_use]
    pub fn with_recovery(config: &MarketConfig, recovery: Box<dyn SignerRecovery>) -> Self {
        Self {
            domain_separator: domain_separator(config),
            recovery,
        }
    }

    /// The domain-separation hash for this engine.
    #[must_use]
    pub const fn domain_separator(&self) -> Digest {
        self.domain_separator
    }

    /// Canonical digest of `terms` under this engine's domain.
    #[must_use]
    pub fn digest(&self, terms: &RentalTerms) -> Digest {
        let struct_hash = terms_struct_hash(terms);

        let mut hasher = blake3::Hasher::new();
        hasher.update(DIGEST_PREFIX);
        hasher.update(self.domain_separator.as_bytes());
        hasher.update(&struct_hash);
        Digest(*hasher.finalize().as_bytes())
    }

    /// Recovers the signer of `digest`.
    ///
    /// # Errors
    ///
    /// Returns `MarketError::InvalidSignature` if recovery fails.
    pub fn verify(
        &self,
        digest: &Digest,
        signature: &IntentSignature,
    ) -> Result<Address, MarketError> {
        self.recovery.recover_signer(digest, signature)
    }

    /// Digests `terms` and checks that `signature` was produced by its maker.
    ///
    /// # Errors
    ///
    /// Returns `MarketError::InvalidSignature` if recovery fails, or
    /// `MarketError::Unauthorized` if the signer is not the maker.
    pub fn authorize(
        &self,
        terms: &RentalTerms,
        signature: &IntentSignature,
    ) -> Result<Digest, MarketError> {
        let digest = self.digest(terms);
        let signer = self.verify(&digest, signature)?;
        if signer != terms.maker {
            return Err(MarketError::Unauthorized(format!(
                "intent {digest} signed by {signer}, maker is {}",
                terms.maker
            )));
        }
        Ok(digest)
    }
}

impl fmt::Debug for OrderAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderAuthority")
            .field("domain_separator", &self.domain_separator)
            .finish_non_exhaustive()
    }
}

fn domain_separator(config: &MarketConfig) -> Digest {
    let mut hasher = blake3::Hasher::new();
    hasher.update(blake3::hash(DOMAIN_TYPE_TAG).as_bytes());
    update_str(&mut hasher, &config.name);
    update_str(&mut hasher, &config.version);
    update_str(&mut hasher, &config.instance_id);
    hasher.update(config.market.as_bytes());
    Digest(*hasher.finalize().as_bytes())
}

fn terms_struct_hash(terms: &RentalTerms) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    hasher.update(blake3::hash(TERMS_TYPE_TAG).as_bytes());
    hasher.update(terms.maker.as_bytes());
    hasher.update(terms.asset.contract.as_bytes());
    hasher.update(&terms.asset.token_id.to_le_bytes());
    hasher.update(&terms.daily_rent.raw().to_le_bytes());
    hasher.update(&terms.max_duration.to_le_bytes());
    hasher.update(&terms.min_collateral.raw().to_le_bytes());
    hasher.update(&terms.listing_expiry.to_le_bytes());
    hasher.update(&terms.nonce.to_le_bytes());
    *hasher.finalize().as_bytes()
}

// Length-prefixed so adjacent strings cannot shift bytes between fields.
fn update_str(hasher: &mut blake3::Hasher, s: &str) {
    hasher.update(&(s.len() as u64).to_le_bytes());
    hasher.update(s.as_bytes());
}
