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

use bitcoin::{OutPoint, Txid};

/// Channel errors.
///
/// Errors fall into three groups: structural errors caused by a malformed
/// input (safe to retry with corrected data), ordering errors (a protocol
/// step arrived too early or too late) and cryptographic inconsistencies,
/// after which the channel can't be continued and must be force-closed; see
/// [`Error::requires_force_close`].
#[derive(Clone, PartialEq, Eq, Hash, Debug, Display, Error, From)]
#[display(doc_comments)]
pub enum Error {
    /// elkrem failure: {0}
    #[from]
    Elkrem(elkrem::Error),

    /// elliptic curve operation failed: {0}
    #[from]
    Secp(secp256k1::Error),

    /// revocation secret for state #{index} fits the elkrem tree but produces
    /// elkrem points different from the ones committed by the remote peer;
    /// the channel history is inconsistent
    RevocationMismatch { index: u64 },

    /// revocation secret for state #{received} was provided, while the
    /// channel at state #{state} expects the secret for state #{expected}
    RevocationOutOfOrder {
        state: u64,
        expected: u64,
        received: u64,
    },

    /// channel at state #{0} has no elkrem points of the previous state to
    /// check the revocation against
    NoPendingRevocation(u64),

    /// state #{0} must be revoked by the remote peer before the channel can
    /// advance further
    UnrevokedState(u64),

    /// channel state index can't advance beyond {0}
    IndexOverflow(u64),

    /// channel has no elkrem points of the remote peer for the current state
    /// #{0}
    NoRemotePoints(u64),

    /// local balance {amount} does not fit into channel capacity {capacity}
    BalanceOutOfRange { amount: i64, capacity: u64 },

    /// transaction {txid} does not spend channel funding outpoint {funding}
    NotClosingTransaction { txid: Txid, funding: OutPoint },

    /// closing transaction indicates state #{claimed} while the channel
    /// knows states up to #{known}
    FutureState { claimed: u64, known: u64 },

    /// output #{vout} of the closing transaction has {len}-byte script while
    /// {expected}-byte script was expected
    MalformedOutput { vout: u32, len: usize, expected: usize },

    /// closing transaction {0} has no outputs belonging to the local node
    NoRecognizedOutput(Txid),

    /// channel lock was poisoned by a panicking thread
    Poisoned,
}

impl Error {
    /// Detects errors which mean that the channel state diverged from the
    /// remote peer claims and the channel must be closed unilaterally.
    pub fn requires_force_close(&self) -> bool {
        matches!(
            self,
            Error::Elkrem(elkrem::Error::TreeInsertion { .. })
                | Error::RevocationMismatch { .. }
                | Error::FutureState { .. }
        )
    }
}
