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

//! Reconstruction of the locally spendable outputs from a transaction closing
//! the channel.
//!
//! A closing transaction is either a cooperative close, paying each party to
//! its refund key for the latest state, or a commitment transaction published
//! by one of the parties. The commitment carries the (obscured) index of its
//! state, so the outputs can be matched against the keys derived for that
//! state. If the remote party has published an already revoked state, its
//! revocable output is claimed with the revealed elkrem secret.

use std::fmt::{self, Display, Formatter};

use bitcoin::hashes::hex::ToHex;
use bitcoin::hashes::Hash;
use bitcoin::{OutPoint, Script, Transaction, WPubkeyHash};
use secp256k1::{PublicKey, SecretKey};

use crate::derivation::{elk_scalar, hakd_pubkey, hakd_seckey};
use crate::scripts::{
    hash_payload, revocable_script, KEY_HASH_LEN, SCRIPT_HASH_LEN,
};
use crate::{Channel, ElkPointKind, Error, StateHint};

/// Moment from which an output can be spent
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Display)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
pub enum Spendability {
    /// Spendable right after the closing transaction is mined
    #[display("immediately")]
    Immediate,

    /// Spendable once the given number of blocks is mined on top of the
    /// closing transaction
    #[display("after {0} blocks")]
    AfterBlocks(u16),
}

/// Role of a recovered output
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Display)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
pub enum OutputKind {
    /// Key-hash output paying the local party
    #[display("refund")]
    Refund,

    /// Revocable output of the local commitment, spendable by the timeout
    /// path
    #[display("timeout")]
    Timeout,

    /// Revocable output of a revoked remote commitment, spendable by the
    /// revocation path
    #[display("justice")]
    Justice,
}

/// Base key which has to be tweaked to get the key spending an output
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Display)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
pub enum KeyRole {
    /// [`crate::ChannelKeys::refund_base`]
    #[display("refund base")]
    Refund,

    /// [`crate::ChannelKeys::hakd_base`]
    #[display("HAKD base")]
    HakdBase,
}

/// Locally spendable output of a closing transaction
#[derive(Clone, PartialEq, Eq, Debug)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
pub struct OutputDescriptor {
    pub outpoint: OutPoint,
    pub value: u64,
    pub script_pubkey: Script,
    /// Witness script, present for the revocable outputs
    pub witness_script: Option<Script>,
    pub kind: OutputKind,
    pub key_role: KeyRole,
    /// Scalar which has to be added to the private key of the base key with
    /// [`OutputDescriptor::key_role`]
    pub key_tweak: SecretKey,
    pub spendability: Spendability,
    /// Height of the closing transaction, if already known
    pub height: Option<u32>,
}

impl OutputDescriptor {
    /// Computes private key spending the output from the private key of the
    /// base key with [`OutputDescriptor::key_role`]
    #[inline]
    pub fn signing_key(&self, base: SecretKey) -> Result<SecretKey, Error> {
        hakd_seckey(base, self.key_tweak).map_err(Error::from)
    }
}

/// Revocable output whose script hash differs from the one generated from
/// the channel keys
#[derive(Clone, PartialEq, Eq, Debug)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
pub struct ScriptMismatch {
    pub vout: u32,
    pub kind: OutputKind,
    /// Script hash found in the transaction output
    pub observed: Vec<u8>,
    /// Script hash of the generated witness script
    pub generated: Vec<u8>,
    pub revocation_key: PublicKey,
    pub timeout_key: PublicKey,
}

impl Display for ScriptMismatch {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} output #{} has script hash {} while {} was generated from \
             revocation key {} and timeout key {}",
            self.kind,
            self.vout,
            self.observed.to_hex(),
            self.generated.to_hex(),
            self.revocation_key,
            self.timeout_key
        )
    }
}

/// Result of a closing transaction analysis
#[derive(Clone, PartialEq, Eq, Debug, Default)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
pub struct CloseOutputs {
    /// Outputs which can be spent by the local party
    pub outputs: Vec<OutputDescriptor>,
    /// Revocable outputs which were not recognized. Any warning means that
    /// the channel keys are inconsistent with the remote peer.
    pub warnings: Vec<ScriptMismatch>,
}

impl CloseOutputs {
    /// Total value of the recovered outputs
    pub fn value(&self) -> u64 {
        self.outputs.iter().map(|output| output.value).sum()
    }
}

struct Revocable {
    vout: u32,
    kind: OutputKind,
    revocation_key: PublicKey,
    timeout_key: PublicKey,
    key_tweak: SecretKey,
    spendability: Spendability,
}

impl Channel {
    /// Finds outputs of the closing transaction which can be spent by the
    /// local party.
    ///
    /// Does not change the channel, so it can be called repeatedly with the
    /// same result.
    ///
    /// # Errors
    ///
    /// - [`Error::NotClosingTransaction`] if the transaction does not spend
    ///   the funding output with its only input;
    /// - [`Error::FutureState`] if the transaction commits to a state not
    ///   known to the channel;
    /// - [`Error::MalformedOutput`] if a commitment transaction has outputs
    ///   of unexpected size;
    /// - [`Error::NoRecognizedOutput`] if a cooperative close does not pay to
    ///   the local refund key.
    pub fn close_outputs(
        &self,
        tx: &Transaction,
    ) -> Result<CloseOutputs, Error> {
        let funding = self.funding_outpoint();
        if tx.input.len() != 1 || tx.input[0].previous_output != funding {
            return Err(Error::NotClosingTransaction {
                txid: tx.txid(),
                funding,
            });
        }

        let state_index = self.state().state_index();
        let claimed = self
            .hint_offset()
            .and_then(|offset| tx.state_index_hint(offset));
        match claimed {
            Some(claimed) if claimed > state_index => Err(Error::FutureState {
                claimed,
                known: state_index,
            }),
            Some(claimed) if claimed > 0 && tx.output.len() == 2 => {
                self.unilateral_close(tx, claimed)
            }
            // Commitments for the state #1 are signed before the offset is
            // known and carry no hint
            None if state_index > 0 && is_commitment(tx) => {
                self.unilateral_close(tx, 1)
            }
            _ => self.cooperative_close(tx),
        }
    }

    fn cooperative_close(
        &self,
        tx: &Transaction,
    ) -> Result<CloseOutputs, Error> {
        let state_index = self.state().state_index();
        let refund_hash = self.refund_hash(state_index)?;
        let vout = tx
            .output
            .iter()
            .position(|txout| {
                hash_payload(&txout.script_pubkey, KEY_HASH_LEN)
                    == Some(&refund_hash[..])
            })
            .ok_or_else(|| Error::NoRecognizedOutput(tx.txid()))?;
        debug!(
            "Channel {} closed cooperatively, refund in output #{}",
            self.funding_outpoint(),
            vout
        );
        let refund = self.refund_descriptor(tx, vout as u32, state_index)?;
        Ok(CloseOutputs {
            outputs: vec![refund],
            warnings: vec![],
        })
    }

    fn unilateral_close(
        &self,
        tx: &Transaction,
        claimed: u64,
    ) -> Result<CloseOutputs, Error> {
        let (sh_vout, pkh_vout) =
            if tx.output[0].script_pubkey.len() == SCRIPT_HASH_LEN {
                (0u32, 1u32)
            } else {
                (1u32, 0u32)
            };
        let sh_payload = payload(tx, sh_vout, SCRIPT_HASH_LEN)?;
        let pkh_payload = payload(tx, pkh_vout, KEY_HASH_LEN)?;

        let state_index = self.state().state_index();
        let timeout_blocks = self.params().timeout_blocks;
        let local = self.local_keys();
        let remote = self.remote_keys();
        let mut close = CloseOutputs::default();

        if pkh_payload != &self.refund_hash(claimed)?[..] {
            debug!(
                "Channel {} closed with local commitment #{}",
                self.funding_outpoint(),
                claimed
            );
            let secret = self.elk_secret(false, claimed)?;
            let revocable = Revocable {
                vout: sh_vout,
                kind: OutputKind::Timeout,
                revocation_key: hakd_pubkey(
                    remote.hakd_base,
                    self.elk_point(false, ElkPointKind::Revocation, claimed)?,
                )?,
                timeout_key: hakd_pubkey(
                    local.hakd_base,
                    self.elk_point(false, ElkPointKind::Timeout, claimed)?,
                )?,
                key_tweak: elk_scalar(&secret, ElkPointKind::Timeout)?,
                spendability: Spendability::AfterBlocks(timeout_blocks),
            };
            self.match_revocable(tx, sh_payload, revocable, &mut close);
            return Ok(close);
        }

        close
            .outputs
            .push(self.refund_descriptor(tx, pkh_vout, claimed)?);

        // Not revoked yet: either the latest state or the previous one
        // published before its secret was revealed
        if claimed >= self.receiver().next_index() {
            debug!(
                "Channel {} closed with unrevoked remote commitment #{}",
                self.funding_outpoint(),
                claimed
            );
        } else {
            warn!(
                "Channel {} closed by the remote peer with revoked state #{} \
                 while the channel is at state #{}",
                self.funding_outpoint(),
                claimed,
                state_index
            );
            let secret = self.elk_secret(true, claimed)?;
            let revocable = Revocable {
                vout: sh_vout,
                kind: OutputKind::Justice,
                revocation_key: hakd_pubkey(
                    local.hakd_base,
                    self.elk_point(true, ElkPointKind::Revocation, claimed)?,
                )?,
                timeout_key: hakd_pubkey(
                    remote.hakd_base,
                    self.elk_point(true, ElkPointKind::Timeout, claimed)?,
                )?,
                key_tweak: elk_scalar(&secret, ElkPointKind::Revocation)?,
                spendability: Spendability::Immediate,
            };
            self.match_revocable(tx, sh_payload, revocable, &mut close);
        }

        Ok(close)
    }

    fn refund_hash(&self, index: u64) -> Result<WPubkeyHash, Error> {
        let key = self.refund_pubkey(index)?;
        Ok(WPubkeyHash::hash(&key.serialize()))
    }

    fn refund_descriptor(
        &self,
        tx: &Transaction,
        vout: u32,
        index: u64,
    ) -> Result<OutputDescriptor, Error> {
        let secret = self.elk_secret(false, index)?;
        let txout = &tx.output[vout as usize];
        Ok(OutputDescriptor {
            outpoint: OutPoint::new(tx.txid(), vout),
            value: txout.value,
            script_pubkey: txout.script_pubkey.clone(),
            witness_script: None,
            kind: OutputKind::Refund,
            key_role: KeyRole::Refund,
            key_tweak: elk_scalar(&secret, ElkPointKind::Revocation)?,
            spendability: Spendability::Immediate,
            height: self.close().map(|close| close.height),
        })
    }

    fn match_revocable(
        &self,
        tx: &Transaction,
        observed: &[u8],
        revocable: Revocable,
        close: &mut CloseOutputs,
    ) {
        let script = revocable_script(
            revocable.revocation_key,
            revocable.timeout_key,
            self.params().timeout_blocks,
        );
        let generated = script.wscript_hash();
        if &generated[..] != observed {
            let mismatch = ScriptMismatch {
                vout: revocable.vout,
                kind: revocable.kind,
                observed: observed.to_vec(),
                generated: generated[..].to_vec(),
                revocation_key: revocable.revocation_key,
                timeout_key: revocable.timeout_key,
            };
            warn!("Channel {}: {}", self.funding_outpoint(), mismatch);
            close.warnings.push(mismatch);
            return;
        }

        let txout = &tx.output[revocable.vout as usize];
        close.outputs.push(OutputDescriptor {
            outpoint: OutPoint::new(tx.txid(), revocable.vout),
            value: txout.value,
            script_pubkey: txout.script_pubkey.clone(),
            witness_script: Some(script),
            kind: revocable.kind,
            key_role: KeyRole::HakdBase,
            key_tweak: revocable.key_tweak,
            spendability: revocable.spendability,
            height: self.close().map(|close| close.height),
        });
    }
}

fn payload(tx: &Transaction, vout: u32, len: usize) -> Result<&[u8], Error> {
    let script_pubkey = &tx.output[vout as usize].script_pubkey;
    hash_payload(script_pubkey, len).ok_or(Error::MalformedOutput {
        vout,
        len: script_pubkey.len(),
        expected: len,
    })
}

/// Checks whether the transaction has the outputs of a commitment: one
/// script-hash and one key-hash output, in any order
fn is_commitment(tx: &Transaction) -> bool {
    let mut lens = tx
        .output
        .iter()
        .map(|txout| txout.script_pubkey.len())
        .collect::<Vec<_>>();
    lens.sort_unstable();
    lens == [KEY_HASH_LEN, SCRIPT_HASH_LEN]
}

#[cfg(test)]
mod test {
    use bitcoin::hashes::sha256d;
    use secp256k1::SECP256K1;

    use super::*;

    #[test]
    fn signing_key_matches_tweaked_pubkey() {
        let base = SecretKey::from_slice(&[0x07; 32]).unwrap();
        let tweak = SecretKey::from_slice(&[0x09; 32]).unwrap();
        let descriptor = OutputDescriptor {
            outpoint: OutPoint::default(),
            value: 1000,
            script_pubkey: Script::new(),
            witness_script: None,
            kind: OutputKind::Refund,
            key_role: KeyRole::Refund,
            key_tweak: tweak,
            spendability: Spendability::Immediate,
            height: None,
        };
        let key = descriptor.signing_key(base).unwrap();
        assert_eq!(
            PublicKey::from_secret_key(SECP256K1, &key),
            hakd_pubkey(
                PublicKey::from_secret_key(SECP256K1, &base),
                PublicKey::from_secret_key(SECP256K1, &tweak)
            )
            .unwrap()
        );
    }

    #[test]
    fn mismatch_display() {
        let key = PublicKey::from_secret_key(
            SECP256K1,
            &SecretKey::from_slice(&[0x01; 32]).unwrap(),
        );
        let mismatch = ScriptMismatch {
            vout: 1,
            kind: OutputKind::Justice,
            observed: vec![0xab; 2],
            generated: sha256d::Hash::hash(b"")[..2].to_vec(),
            revocation_key: key,
            timeout_key: key,
        };
        let msg = mismatch.to_string();
        assert!(
            msg.starts_with("justice output #1 has script hash abab while")
        );
    }

    #[test]
    fn spendability_display() {
        assert_eq!(Spendability::Immediate.to_string(), "immediately");
        assert_eq!(Spendability::AfterBlocks(5).to_string(), "after 5 blocks");
    }
}
