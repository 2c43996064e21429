// LNP/BP Core Library implementing LNPBP specifications & standards
// Written in 2020-2022 by
//     Dr. Maxim Orlovsky <orlovsky@pandoracore.com>
//
// To the extent possible under law, the author(s) have dedicated all
// copyright and related and neighboring rights to this software to
// the public domain worldwide. This software is distributed without
// any warranty.
//
// You should have received a copy of the MIT License
// along with this software.
// If not, see <https://opensource.org/licenses/MIT>.

//! Homomorphic adversarial key derivation (HAKD).
//!
//! An elkrem secret is hashed together with a one-byte tag into a scalar,
//! and the scalar is turned into an *elkrem point*. Per-state script keys
//! are computed as `base + point`, so anyone knowing the public base key and
//! the point can compute the key, while only the owner of the base private
//! key who also learned the elkrem secret can sign with it.
//!
//! Each secret produces two independent points, for revocation and timeout
//! spending paths, so that a revealed point of one kind can't be used to
//! link the other one to the channel.

use bitcoin::hashes::{sha256d, Hash, HashEngine};
use elkrem::{Elkrem, ElkremHash};
use secp256k1::{PublicKey, Scalar, SecretKey, SECP256K1};

/// Kind of elkrem point, which defines the tag byte hashed with the secret
#[derive(
    Copy,
    Clone,
    Ord,
    PartialOrd,
    Eq,
    PartialEq,
    Hash,
    Debug,
    Display,
    StrictEncode,
    StrictDecode
)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
pub enum ElkPointKind {
    /// Point used for the revocation (penalty) spending path and for refund
    /// keys; tag `'r'`
    #[display("revocation")]
    Revocation,

    /// Point used for the timeout spending path; tag `'t'`
    #[display("timeout")]
    Timeout,
}

impl ElkPointKind {
    /// Tag byte appended to the elkrem secret before hashing
    #[inline]
    pub fn tag(self) -> u8 {
        match self {
            ElkPointKind::Revocation => b'r',
            ElkPointKind::Timeout => b't',
        }
    }
}

/// Pair of elkrem points for a single channel state
#[derive(
    Copy, Clone, PartialEq, Eq, Hash, Debug, StrictEncode, StrictDecode
)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
pub struct ElkPoints {
    pub revocation: PublicKey,
    pub timeout: PublicKey,
}

impl ElkPoints {
    /// Computes both elkrem points out of an elkrem secret
    pub fn from_secret(secret: &ElkremHash) -> Result<Self, secp256k1::Error> {
        Ok(ElkPoints {
            revocation: elk_point(secret, ElkPointKind::Revocation)?,
            timeout: elk_point(secret, ElkPointKind::Timeout)?,
        })
    }

    /// Computes both elkrem points for the secret at `index` of an elkrem
    /// tree
    pub fn at_index(
        elkrem: &impl Elkrem,
        index: u64,
    ) -> Result<Self, crate::Error> {
        let secret = elkrem.at_index(index)?;
        ElkPoints::from_secret(&secret).map_err(crate::Error::from)
    }

    /// Returns point of the given kind
    #[inline]
    pub fn get(&self, kind: ElkPointKind) -> PublicKey {
        match kind {
            ElkPointKind::Revocation => self.revocation,
            ElkPointKind::Timeout => self.timeout,
        }
    }
}

/// Hashes elkrem secret with the kind tag: `sha256d(secret || tag)`
pub fn elk_hash(secret: &ElkremHash, kind: ElkPointKind) -> sha256d::Hash {
    let mut engine = sha256d::Hash::engine();
    engine.input(&secret[..]);
    engine.input(&[kind.tag()]);
    sha256d::Hash::from_engine(engine)
}

/// Converts elkrem secret into the private scalar of the elkrem point
pub fn elk_scalar(
    secret: &ElkremHash,
    kind: ElkPointKind,
) -> Result<SecretKey, secp256k1::Error> {
    SecretKey::from_slice(&elk_hash(secret, kind)[..])
}

/// Computes elkrem point of the given kind out of an elkrem secret
pub fn elk_point(
    secret: &ElkremHash,
    kind: ElkPointKind,
) -> Result<PublicKey, secp256k1::Error> {
    let scalar = elk_scalar(secret, kind)?;
    let point = PublicKey::from_secret_key(SECP256K1, &scalar);
    trace!("elkrem {} point {}", kind, point);
    Ok(point)
}

/// Derives per-state public key by adding elkrem point to the base key
#[inline]
pub fn hakd_pubkey(
    base: PublicKey,
    point: PublicKey,
) -> Result<PublicKey, secp256k1::Error> {
    base.combine(&point)
}

/// Derives private key matching [`hakd_pubkey`] once the elkrem scalar is
/// known
#[inline]
pub fn hakd_seckey(
    base: SecretKey,
    scalar: SecretKey,
) -> Result<SecretKey, secp256k1::Error> {
    base.add_tweak(&Scalar::from(scalar))
}
