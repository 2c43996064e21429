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

use elkrem::{ElkremHash, MAX_INDEX};
use secp256k1::ecdsa::Signature;

use crate::{ElkPoints, Error};

/// Commitment state of the channel.
///
/// Fields can be changed only through the state transitions, so the state
/// index, remote elkrem points and the remote signature always describe the
/// same commitment.
#[derive(
    Getters,
    Clone,
    PartialEq,
    Eq,
    Debug,
    Default,
    StrictEncode,
    StrictDecode
)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
pub struct StateCommitment {
    /// Index of the current state; starts at zero and never decreases
    #[getter(as_copy)]
    state_index: u64,

    /// Balance of the local party, in satoshis
    #[getter(as_copy)]
    local_amount: i64,

    /// Amount in flight which is not yet committed; applied to the local
    /// balance on the next state advance
    #[getter(as_copy)]
    delta: i32,

    /// Remote elkrem points for the current state. Absent only for the state
    /// #0.
    #[getter(as_copy)]
    current: Option<ElkPoints>,

    /// Remote elkrem points for the previous state, kept until the remote
    /// peer reveals the secret revoking it
    #[getter(as_copy)]
    previous: Option<ElkPoints>,

    /// Remote signature of the current commitment transaction. Absent only
    /// for the state #0.
    #[getter(as_copy)]
    signature: Option<Signature>,
}

impl StateCommitment {
    /// Constructs initial state (#0) with the given local balance
    pub fn with(local_amount: i64) -> StateCommitment {
        StateCommitment {
            local_amount,
            ..Default::default()
        }
    }

    /// Records amount in flight
    #[inline]
    pub fn set_delta(&mut self, delta: i32) {
        self.delta = delta;
    }

    /// Moves to the next state, committed by the remote peer with elkrem
    /// points and a signature.
    ///
    /// # Errors
    ///
    /// - [`Error::UnrevokedState`] if the remote peer has not revoked the
    ///   previous state yet;
    /// - [`Error::IndexOverflow`] if all elkrem secrets are used up.
    pub fn advance(
        &mut self,
        points: ElkPoints,
        signature: Signature,
    ) -> Result<(), Error> {
        if self.previous.is_some() {
            return Err(Error::UnrevokedState(self.state_index - 1));
        }
        if self.state_index >= MAX_INDEX {
            return Err(Error::IndexOverflow(self.state_index));
        }
        self.state_index += 1;
        self.local_amount += self.delta as i64;
        self.delta = 0;
        self.previous = self.current;
        self.current = Some(points);
        self.signature = Some(signature);
        Ok(())
    }

    /// Checks that the revealed secret matches the elkrem points of the
    /// previous state. Does not change the state.
    pub(crate) fn check_revocation(
        &self,
        secret: &ElkremHash,
    ) -> Result<(), Error> {
        let previous = match self.previous {
            Some(previous) => previous,
            // Remote peer has not given us points for the state #0, so there
            // is nothing to check them against.
            None if self.state_index == 1 => return Ok(()),
            None => return Err(Error::NoPendingRevocation(self.state_index)),
        };
        if ElkPoints::from_secret(secret)? != previous {
            return Err(Error::RevocationMismatch {
                index: self.state_index - 1,
            });
        }
        Ok(())
    }

    #[inline]
    pub(crate) fn clear_previous(&mut self) {
        self.previous = None;
    }
}
