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

//! Scripts used by commitment transactions.
//!
//! Each commitment has two outputs: a revocable script-hash output of the
//! party who holds the commitment and a key-hash refund output paying the
//! counterparty. The outputs are recognized on-chain by their exact length.

use bitcoin::blockdata::opcodes::all::*;
use bitcoin::blockdata::script;
use bitcoin::hashes::Hash;
use bitcoin::{Script, TxOut, WPubkeyHash};
use secp256k1::PublicKey;

/// Length of a P2WSH script pubkey
pub const SCRIPT_HASH_LEN: usize = 34;

/// Length of a P2WPKH script pubkey
pub const KEY_HASH_LEN: usize = 22;

/// Offset of the hash payload inside both kinds of witness v0 script pubkeys
pub const PAYLOAD_OFFSET: usize = 2;

/// Builds revocable witness script.
///
/// The output can be spent either by the revocation key at any time or by
/// the timeout key once `timeout_blocks` have passed since the commitment
/// confirmation.
pub fn revocable_script(
    revocation_key: PublicKey,
    timeout_key: PublicKey,
    timeout_blocks: u16,
) -> Script {
    script::Builder::new()
        .push_opcode(OP_IF)
        .push_key(&bitcoin::PublicKey::new(revocation_key))
        .push_opcode(OP_ELSE)
        .push_int(timeout_blocks as i64)
        .push_opcode(OP_CSV)
        .push_opcode(OP_DROP)
        .push_key(&bitcoin::PublicKey::new(timeout_key))
        .push_opcode(OP_ENDIF)
        .push_opcode(OP_CHECKSIG)
        .into_script()
}

/// Returns hash payload of a witness v0 script pubkey with the given length,
/// or `None` if the script has a different length
pub fn hash_payload(script_pubkey: &Script, len: usize) -> Option<&[u8]> {
    let bytes = script_pubkey.as_bytes();
    if bytes.len() != len {
        return None;
    }
    Some(&bytes[PAYLOAD_OFFSET..])
}

/// Generators of commitment transaction outputs
pub trait ScriptGenerators {
    /// Revocable script-hash output
    fn qchan_revocable(
        amount: u64,
        revocation_key: PublicKey,
        timeout_key: PublicKey,
        timeout_blocks: u16,
    ) -> Self;

    /// Key-hash refund output
    fn qchan_refund(amount: u64, refund_key: PublicKey) -> Self;
}

impl ScriptGenerators for Script {
    #[inline]
    fn qchan_revocable(
        _: u64,
        revocation_key: PublicKey,
        timeout_key: PublicKey,
        timeout_blocks: u16,
    ) -> Self {
        Script::new_v0_p2wsh(
            &revocable_script(revocation_key, timeout_key, timeout_blocks)
                .wscript_hash(),
        )
    }

    #[inline]
    fn qchan_refund(_: u64, refund_key: PublicKey) -> Self {
        Script::new_v0_p2wpkh(&WPubkeyHash::hash(&refund_key.serialize()))
    }
}

impl ScriptGenerators for TxOut {
    #[inline]
    fn qchan_revocable(
        amount: u64,
        revocation_key: PublicKey,
        timeout_key: PublicKey,
        timeout_blocks: u16,
    ) -> Self {
        TxOut {
            value: amount,
            script_pubkey: Script::qchan_revocable(
                amount,
                revocation_key,
                timeout_key,
                timeout_blocks,
            ),
        }
    }

    #[inline]
    fn qchan_refund(amount: u64, refund_key: PublicKey) -> Self {
        TxOut {
            value: amount,
            script_pubkey: Script::qchan_refund(amount, refund_key),
        }
    }
}
