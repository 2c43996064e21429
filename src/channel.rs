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

use std::fmt::{self, Display, Formatter};

use bitcoin::{
    OutPoint, PackedLockTime, Script, Sequence, Transaction, TxIn, TxOut,
    Txid, Witness,
};
use elkrem::{Elkrem, ElkremHash, ElkremReceiver, ElkremSender};
use secp256k1::ecdsa::Signature;
use secp256k1::PublicKey;

use crate::derivation::{elk_point, hakd_pubkey};
use crate::hint::{self, StateHint};
use crate::{
    ChannelParams, ElkPointKind, ElkPoints, Error, ScriptGenerators,
    StateCommitment,
};

/// Identity and base keys of one of the channel parties
#[derive(
    Copy, Clone, PartialEq, Eq, Hash, Debug, StrictEncode, StrictDecode
)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
pub struct ChannelKeys {
    /// Node identity key
    pub node_id: PublicKey,
    /// Key used in the funding output multisig
    pub channel_key: PublicKey,
    /// Base key for refund (key-hash) outputs
    pub refund_base: PublicKey,
    /// Base key for revocable (script-hash) outputs
    pub hakd_base: PublicKey,
}

/// Information about the transaction which closed the channel
#[derive(
    Copy, Clone, PartialEq, Eq, Hash, Debug, Display, StrictEncode, StrictDecode
)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
#[display("{txid} at height {height}")]
pub struct CloseData {
    pub txid: Txid,
    pub height: u32,
    pub closed: bool,
}

/// Two-party payment channel.
///
/// Owns both elkrem trees: the sender produces the local secrets, which are
/// revealed to the remote peer once the state they protect is replaced, and
/// the receiver collects the secrets revealed by the remote peer. The trees
/// are created together with the channel and are never replaced.
#[derive(Getters, Clone, PartialEq, Eq, Debug)]
pub struct Channel {
    #[getter(as_copy)]
    funding_outpoint: OutPoint,

    /// Channel capacity, in satoshis
    #[getter(as_copy)]
    capacity: u64,

    #[getter(as_copy)]
    local_keys: ChannelKeys,

    #[getter(as_copy)]
    remote_keys: ChannelKeys,

    #[getter(skip)]
    sender: ElkremSender,

    receiver: ElkremReceiver,

    state: StateCommitment,

    #[getter(as_copy)]
    close: Option<CloseData>,

    #[getter(as_copy)]
    params: ChannelParams,
}

impl Channel {
    /// Constructs channel at state #0
    pub fn with(
        funding_outpoint: OutPoint,
        capacity: u64,
        local_amount: i64,
        local_keys: ChannelKeys,
        remote_keys: ChannelKeys,
        elkrem_root: ElkremHash,
        params: ChannelParams,
    ) -> Channel {
        Channel {
            funding_outpoint,
            capacity,
            local_keys,
            remote_keys,
            sender: ElkremSender::new(elkrem_root),
            receiver: ElkremReceiver::new(),
            state: StateCommitment::with(local_amount),
            close: None,
            params,
        }
    }

    /// Returns elkrem secret at `index`: the local one if `mine` is `false`
    /// or the one revealed by the remote peer otherwise
    pub(crate) fn elk_secret(
        &self,
        mine: bool,
        index: u64,
    ) -> Result<ElkremHash, Error> {
        let secret = if mine {
            self.receiver.at_index(index)?
        } else {
            self.sender.at_index(index)?
        };
        Ok(secret)
    }

    /// Derives elkrem point for the given state. With `mine` set to `false`
    /// the point comes from the local elkrem sender (these are the points
    /// given to the remote peer); with `mine` set to `true` it comes from
    /// the secrets revealed by the remote peer.
    pub fn elk_point(
        &self,
        mine: bool,
        kind: ElkPointKind,
        index: u64,
    ) -> Result<PublicKey, Error> {
        let secret = self.elk_secret(mine, index)?;
        elk_point(&secret, kind).map_err(Error::from)
    }

    /// Elkrem points for the state `index` to be given to the remote peer
    #[inline]
    pub fn outgoing_points(&self, index: u64) -> Result<ElkPoints, Error> {
        ElkPoints::at_index(&self.sender, index)
    }

    /// Elkrem points of the current state to be given to the remote peer
    #[inline]
    pub fn current_outgoing_points(&self) -> Result<ElkPoints, Error> {
        self.outgoing_points(self.state.state_index())
    }

    /// Local secret revoking the previous state, which has to be revealed to
    /// the remote peer after the channel advances. `None` for the state #0.
    pub fn revocation_secret(&self) -> Result<Option<ElkremHash>, Error> {
        match self.state.state_index().checked_sub(1) {
            Some(index) => Ok(Some(self.sender.at_index(index)?)),
            None => Ok(None),
        }
    }

    /// Key receiving local refunds at the state `index`
    pub fn refund_pubkey(&self, index: u64) -> Result<PublicKey, Error> {
        let point = self.elk_point(false, ElkPointKind::Revocation, index)?;
        hakd_pubkey(self.local_keys.refund_base, point).map_err(Error::from)
    }

    /// Offset obscuring state index in the commitment transactions. Known
    /// only after the remote peer revoked the state #0.
    #[inline]
    pub fn hint_offset(&self) -> Option<u64> {
        hint::hint_offset(&self.sender, &self.receiver)
    }

    /// Records amount in flight, which will be applied to the local balance
    /// on the next advance
    #[inline]
    pub fn set_delta(&mut self, delta: i32) {
        self.state.set_delta(delta)
    }

    /// Advances channel to the next state with remote elkrem points and the
    /// remote signature of the new commitment.
    ///
    /// # Errors
    ///
    /// - [`Error::UnrevokedState`] if the remote peer has not yet revealed
    ///   the secret for the previous state;
    /// - [`Error::IndexOverflow`] if the channel is out of states.
    pub fn advance(
        &mut self,
        points: ElkPoints,
        signature: Signature,
    ) -> Result<(), Error> {
        let state_index = self.state.state_index();
        if state_index > 0 && self.receiver.next_index() < state_index {
            return Err(Error::UnrevokedState(state_index - 1));
        }
        self.state.advance(points, signature)?;
        debug!(
            "Channel {} advanced to state #{}",
            self.funding_outpoint,
            self.state.state_index()
        );
        Ok(())
    }

    /// Ingests secret revealed by the remote peer which revokes the previous
    /// state.
    ///
    /// The secret is added to the elkrem receiver and checked against the
    /// elkrem points the remote peer has committed to for the previous state.
    /// If any check fails, neither the receiver nor the state are changed.
    /// Errors for which [`Error::requires_force_close`] is `true` mean that
    /// the channel can't be continued.
    pub fn ingest_revocation(
        &mut self,
        secret: ElkremHash,
    ) -> Result<(), Error> {
        let state_index = self.state.state_index();
        let expected = state_index
            .checked_sub(1)
            .ok_or(Error::NoPendingRevocation(state_index))?;
        let received = self.receiver.next_index();
        if received != expected {
            return Err(Error::RevocationOutOfOrder {
                state: state_index,
                expected,
                received,
            });
        }

        let mut receiver = self.receiver.clone();
        receiver.add_next(secret)?;
        self.state.check_revocation(&secret)?;

        self.receiver = receiver;
        self.state.clear_previous();
        debug!(
            "Channel {} state #{} revoked by the remote peer",
            self.funding_outpoint, expected
        );
        Ok(())
    }

    /// Local balance as a non-negative amount bounded by the capacity
    fn local_sats(&self) -> Result<u64, Error> {
        let amount = self.state.local_amount();
        u64::try_from(amount)
            .ok()
            .filter(|sats| *sats <= self.capacity)
            .ok_or(Error::BalanceOutOfRange {
                amount,
                capacity: self.capacity,
            })
    }

    /// Builds local commitment transaction for the current state, spending
    /// the funding output into a revocable output for the local balance and
    /// a refund to the remote peer.
    ///
    /// The transaction is unsigned; its witness is filled in by the wallet.
    /// Commitments for the states after #1 carry the obscured state index.
    pub fn commitment_tx(&self) -> Result<Transaction, Error> {
        let state_index = self.state.state_index();
        let remote_points = self
            .state
            .current()
            .ok_or(Error::NoRemotePoints(state_index))?;
        let local_points = self.outgoing_points(state_index)?;

        let timeout_key =
            hakd_pubkey(self.local_keys.hakd_base, local_points.timeout)?;
        let revocation_key =
            hakd_pubkey(self.remote_keys.hakd_base, local_points.revocation)?;
        let refund_key = hakd_pubkey(
            self.remote_keys.refund_base,
            remote_points.revocation,
        )?;

        let local_amount = self.local_sats()?;
        let mut tx = Transaction {
            version: 2,
            lock_time: PackedLockTime::ZERO,
            input: vec![TxIn {
                previous_output: self.funding_outpoint,
                script_sig: Script::new(),
                sequence: Sequence::MAX,
                witness: Witness::default(),
            }],
            output: vec![
                TxOut::qchan_revocable(
                    local_amount,
                    revocation_key,
                    timeout_key,
                    self.params.timeout_blocks,
                ),
                TxOut::qchan_refund(self.capacity - local_amount, refund_key),
            ],
        };
        // The state #1 is signed before the offset is known, so its
        // commitment never carries a hint
        if let Some(offset) = self.hint_offset().filter(|_| state_index > 1) {
            tx.set_state_index_hint(state_index, offset)?;
        }
        Ok(tx)
    }

    /// Records confirmed closing transaction
    pub fn mark_closed(&mut self, txid: Txid, height: u32) {
        debug!(
            "Channel {} closed by {} at height {}",
            self.funding_outpoint, txid, height
        );
        self.close = Some(CloseData {
            txid,
            height,
            closed: true,
        });
    }

    /// Summary of the channel
    pub fn info(&self) -> ChannelInfo {
        let remote_refund = self.state.current().and_then(|points| {
            hakd_pubkey(self.remote_keys.refund_base, points.revocation).ok()
        });
        ChannelInfo {
            funding_outpoint: self.funding_outpoint,
            capacity: self.capacity,
            local_amount: self.state.local_amount(),
            delta: self.state.delta(),
            state_index: self.state.state_index(),
            received_up_to: self.receiver.up_to(),
            local_refund: self.refund_pubkey(self.state.state_index()).ok(),
            remote_refund,
            close: self.close,
        }
    }
}

/// Summary of the channel state
#[derive(Clone, PartialEq, Eq, Debug)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
pub struct ChannelInfo {
    pub funding_outpoint: OutPoint,
    pub capacity: u64,
    pub local_amount: i64,
    pub delta: i32,
    pub state_index: u64,
    pub received_up_to: Option<u64>,
    pub local_refund: Option<PublicKey>,
    pub remote_refund: Option<PublicKey>,
    pub close: Option<CloseData>,
}

impl Display for ChannelInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "funding: {}", self.funding_outpoint)?;
        writeln!(
            f,
            "capacity: {} sat, local: {} sat, in flight: {} sat",
            self.capacity, self.local_amount, self.delta
        )?;
        write!(f, "state: #{}, revoked: ", self.state_index)?;
        match self.received_up_to {
            Some(index) => writeln!(f, "up to #{}", index)?,
            None => writeln!(f, "none")?,
        }
        if let Some(key) = self.local_refund {
            writeln!(f, "local refund: {}", key)?;
        }
        if let Some(key) = self.remote_refund {
            writeln!(f, "remote refund: {}", key)?;
        }
        match self.close {
            Some(close) => write!(f, "closed: {}", close),
            None => write!(f, "open"),
        }
    }
}

#[cfg(test)]
mod test {
    use bitcoin::hashes::Hash;
    use secp256k1::{Message, SecretKey, SECP256K1};

    use super::*;

    fn pk(byte: u8) -> PublicKey {
        let sk = SecretKey::from_slice(&[byte; 32]).unwrap();
        PublicKey::from_secret_key(SECP256K1, &sk)
    }

    fn keys(seed: u8) -> ChannelKeys {
        ChannelKeys {
            node_id: pk(seed),
            channel_key: pk(seed + 1),
            refund_base: pk(seed + 2),
            hakd_base: pk(seed + 3),
        }
    }

    fn signature() -> Signature {
        let sk = SecretKey::from_slice(&[0x42; 32]).unwrap();
        let msg = Message::from_slice(&[0x01; 32]).unwrap();
        SECP256K1.sign_ecdsa(&msg, &sk)
    }

    fn pair() -> (Channel, Channel) {
        let funding = OutPoint::new(Txid::hash(b"funding"), 0);
        let alice = Channel::with(
            funding,
            100_000,
            60_000,
            keys(0x10),
            keys(0x20),
            ElkremHash::hash(b"alice"),
            ChannelParams::default(),
        );
        let bob = Channel::with(
            funding,
            100_000,
            40_000,
            keys(0x20),
            keys(0x10),
            ElkremHash::hash(b"bob"),
            ChannelParams::default(),
        );
        (alice, bob)
    }

    fn step(alice: &mut Channel, bob: &mut Channel) {
        let next = alice.state().state_index() + 1;
        let alice_points = alice.outgoing_points(next).unwrap();
        let bob_points = bob.outgoing_points(next).unwrap();
        alice.advance(bob_points, signature()).unwrap();
        bob.advance(alice_points, signature()).unwrap();
        let alice_secret = alice.revocation_secret().unwrap().unwrap();
        let bob_secret = bob.revocation_secret().unwrap().unwrap();
        alice.ingest_revocation(bob_secret).unwrap();
        bob.ingest_revocation(alice_secret).unwrap();
    }

    #[test]
    fn elk_points_sides() {
        let (mut alice, mut bob) = pair();
        step(&mut alice, &mut bob);
        for kind in [ElkPointKind::Revocation, ElkPointKind::Timeout] {
            assert_eq!(
                alice.elk_point(true, kind, 0).unwrap(),
                bob.elk_point(false, kind, 0).unwrap()
            );
        }
        assert_eq!(
            alice.elk_point(true, ElkPointKind::Revocation, 1),
            Err(Error::Elkrem(elkrem::Error::NotYetReceived {
                requested: 1,
                received: 1
            }))
        );
    }

    #[test]
    fn no_revocation_at_start() {
        let (mut alice, _) = pair();
        assert_eq!(alice.revocation_secret(), Ok(None));
        assert_eq!(
            alice.ingest_revocation(ElkremHash::hash(b"secret")),
            Err(Error::NoPendingRevocation(0))
        );
        assert_eq!(alice.commitment_tx(), Err(Error::NoRemotePoints(0)));
    }

    #[test]
    fn advance_waits_for_revocation() {
        let (mut alice, bob) = pair();
        alice.advance(bob.outgoing_points(1).unwrap(), signature()).unwrap();
        assert_eq!(
            alice.advance(bob.outgoing_points(2).unwrap(), signature()),
            Err(Error::UnrevokedState(0))
        );
    }

    #[test]
    fn revocation_order() {
        let (mut alice, mut bob) = pair();
        step(&mut alice, &mut bob);
        step(&mut alice, &mut bob);
        assert_eq!(alice.state().state_index(), 2);
        // Bob's secret for state #0 is already known
        let stale = bob.sender.at_index(0).unwrap();
        let receiver = alice.receiver().clone();
        assert_eq!(
            alice.ingest_revocation(stale),
            Err(Error::RevocationOutOfOrder {
                state: 2,
                expected: 1,
                received: 2
            })
        );
        assert_eq!(alice.receiver(), &receiver);
    }

    #[test]
    fn delta_applied_on_advance() {
        let (mut alice, mut bob) = pair();
        alice.set_delta(-1_000);
        bob.set_delta(1_000);
        step(&mut alice, &mut bob);
        assert_eq!(alice.state().local_amount(), 59_000);
        assert_eq!(bob.state().local_amount(), 41_000);
        assert_eq!(alice.state().delta(), 0);
    }

    #[test]
    fn commitment_amounts() {
        let (mut alice, mut bob) = pair();
        step(&mut alice, &mut bob);
        let tx = alice.commitment_tx().unwrap();
        assert_eq!(tx.input.len(), 1);
        assert_eq!(tx.input[0].previous_output, alice.funding_outpoint());
        assert_eq!(tx.output[0].value, 60_000);
        assert!(tx.output[0].script_pubkey.is_v0_p2wsh());
        assert_eq!(tx.output[1].value, 40_000);
        assert_eq!(
            tx.output[1].script_pubkey,
            Script::qchan_refund(0, bob.refund_pubkey(1).unwrap())
        );
        assert_eq!(tx.state_index_hint(alice.hint_offset().unwrap()), None);

        step(&mut alice, &mut bob);
        let tx = alice.commitment_tx().unwrap();
        assert_eq!(tx.state_index_hint(alice.hint_offset().unwrap()), Some(2));
    }

    #[test]
    fn first_commitment_unchanged_by_revocation() {
        let (mut alice, mut bob) = pair();
        let alice_points = alice.outgoing_points(1).unwrap();
        let bob_points = bob.outgoing_points(1).unwrap();
        alice.advance(bob_points, signature()).unwrap();
        bob.advance(alice_points, signature()).unwrap();
        let signed = alice.commitment_tx().unwrap();
        assert_eq!(alice.hint_offset(), None);

        let secret = bob.revocation_secret().unwrap().unwrap();
        alice.ingest_revocation(secret).unwrap();
        assert!(alice.hint_offset().is_some());
        assert_eq!(alice.commitment_tx().unwrap(), signed);
    }

    #[test]
    fn overdrawn_balance() {
        let (mut alice, mut bob) = pair();
        alice.set_delta(-70_000);
        step(&mut alice, &mut bob);
        assert_eq!(
            alice.commitment_tx(),
            Err(Error::BalanceOutOfRange {
                amount: -10_000,
                capacity: 100_000
            })
        );
    }

    #[test]
    fn info_display() {
        let (mut alice, mut bob) = pair();
        let info = alice.info();
        assert_eq!(info.received_up_to, None);
        assert_eq!(info.remote_refund, None);
        assert!(info.to_string().ends_with("open"));

        step(&mut alice, &mut bob);
        alice.mark_closed(Txid::hash(b"close"), 800_000);
        let info = alice.info();
        assert_eq!(info.state_index, 1);
        assert_eq!(info.received_up_to, Some(0));
        assert_eq!(info.remote_refund, Some(bob.refund_pubkey(1).unwrap()));
        assert!(info.to_string().contains("at height 800000"));
    }
}
