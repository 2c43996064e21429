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

//! State index hints.
//!
//! A commitment transaction carries the index of the state it commits to,
//! obscured by XOR with a 48-bit per-channel offset. The upper 24 bits of
//! the obscured value go into the input sequence and the lower 24 bits into
//! the transaction lock time; the highest byte of both fields is a fixed
//! marker, so cooperative closes (which use final sequence and zero lock time)
//! never carry a hint.

use bitcoin::{PackedLockTime, Sequence, Transaction};
use elkrem::{Elkrem, ElkremReceiver, ElkremSender};

use crate::Error;

/// Marker byte in the highest byte of the input sequence
pub const SEQUENCE_MARKER: u32 = 0xFF00_0000;

/// Marker byte in the highest byte of the transaction lock time
pub const LOCKTIME_MARKER: u32 = 0x2100_0000;

const MARKER_MASK: u32 = 0xFF00_0000;
const LOWER_24_BITS: u64 = 0x00_FF_FF_FF;
const LOWER_48_BITS: u64 = 0x00_00_FF_FF_FF_FF_FF_FF;

/// Encoding of the state index hint inside transaction sequence and lock time
pub trait StateHint {
    /// Extracts state index from the transaction. Returns `None` if the
    /// transaction has not exactly one input or does not carry hint markers.
    fn state_index_hint(&self, offset: u64) -> Option<u64>;

    /// Writes state index hint into the transaction lock time and the
    /// sequence of each input.
    ///
    /// # Errors
    ///
    /// [`Error::IndexOverflow`] if the index does not fit into 48 bits.
    fn set_state_index_hint(
        &mut self,
        index: u64,
        offset: u64,
    ) -> Result<(), Error>;
}

impl StateHint for Transaction {
    fn state_index_hint(&self, offset: u64) -> Option<u64> {
        if self.input.len() != 1 {
            return None;
        }
        let sequence = self.input[0].sequence.0;
        let lock_time = self.lock_time.0;
        if sequence & MARKER_MASK != SEQUENCE_MARKER
            || lock_time & MARKER_MASK != LOCKTIME_MARKER
        {
            return None;
        }
        let obscured = ((sequence as u64 & LOWER_24_BITS) << 24)
            | (lock_time as u64 & LOWER_24_BITS);
        Some(obscured ^ (offset & LOWER_48_BITS))
    }

    fn set_state_index_hint(
        &mut self,
        index: u64,
        offset: u64,
    ) -> Result<(), Error> {
        if index > LOWER_48_BITS {
            return Err(Error::IndexOverflow(index));
        }
        let obscured = index ^ (offset & LOWER_48_BITS);
        self.lock_time =
            PackedLockTime(LOCKTIME_MARKER | (obscured & LOWER_24_BITS) as u32);
        let sequence = Sequence(SEQUENCE_MARKER | (obscured >> 24) as u32);
        for txin in &mut self.input {
            txin.sequence = sequence;
        }
        Ok(())
    }
}

/// Computes per-channel hint offset from the first elkrem secrets of both
/// parties. The offset is symmetric, so both parties arrive at the same
/// value. Returns `None` until the remote secret for state #0 is received.
pub fn hint_offset(
    sender: &ElkremSender,
    receiver: &ElkremReceiver,
) -> Option<u64> {
    let local = sender.at_index(0).ok()?;
    let remote = receiver.at_index(0).ok()?;
    let mut buf = [0u8; 8];
    for (pos, byte) in buf.iter_mut().enumerate().skip(2) {
        *byte = local[pos] ^ remote[pos];
    }
    Some(u64::from_be_bytes(buf))
}

#[cfg(test)]
mod test {
    use bitcoin::hashes::Hash;
    use bitcoin::{OutPoint, Script, TxIn, Witness};
    use elkrem::ElkremHash;

    use super::*;

    fn tx(inputs: usize) -> Transaction {
        Transaction {
            version: 2,
            lock_time: PackedLockTime::ZERO,
            input: vec![
                TxIn {
                    previous_output: OutPoint::default(),
                    script_sig: Script::new(),
                    sequence: Sequence::MAX,
                    witness: Witness::default(),
                };
                inputs
            ],
            output: vec![],
        }
    }

    #[test]
    fn hint_layout() {
        let mut tx = tx(1);
        tx.set_state_index_hint(0x0102_0304_0506, 0).unwrap();
        assert_eq!(tx.lock_time.0, 0x2104_0506);
        assert_eq!(tx.input[0].sequence.0, 0xFF01_0203);
        assert_eq!(tx.state_index_hint(0), Some(0x0102_0304_0506));
    }

    #[test]
    fn hint_with_offset() {
        let offset = 0xA5A5_5A5A_F00F;
        for index in [0u64, 1, 2, 1000, 0xFFFF_FFFF_FFFE] {
            let mut tx = tx(1);
            tx.set_state_index_hint(index, offset).unwrap();
            assert_eq!(tx.state_index_hint(offset), Some(index));
        }
    }

    #[test]
    fn no_hint() {
        assert_eq!(tx(1).state_index_hint(0), None);

        let mut tx2 = tx(2);
        tx2.set_state_index_hint(5, 0).unwrap();
        assert_eq!(tx2.state_index_hint(0), None);

        let mut tx1 = tx(1);
        tx1.set_state_index_hint(5, 0).unwrap();
        tx1.lock_time = PackedLockTime(0x2000_0005);
        assert_eq!(tx1.state_index_hint(0), None);
    }

    #[test]
    fn index_overflow() {
        assert_eq!(
            tx(1).set_state_index_hint(1 << 48, 0),
            Err(Error::IndexOverflow(1 << 48))
        );
    }

    #[test]
    fn offset_is_symmetric() {
        let alice = ElkremSender::new(ElkremHash::hash(b"alice"));
        let bob = ElkremSender::new(ElkremHash::hash(b"bob"));
        let mut alice_rcv = ElkremReceiver::new();
        let mut bob_rcv = ElkremReceiver::new();
        assert_eq!(hint_offset(&alice, &alice_rcv), None);

        alice_rcv.add_next(bob.at_index(0).unwrap()).unwrap();
        bob_rcv.add_next(alice.at_index(0).unwrap()).unwrap();
        let offset = hint_offset(&alice, &alice_rcv).unwrap();
        assert_eq!(Some(offset), hint_offset(&bob, &bob_rcv));
        assert!(offset <= LOWER_48_BITS);
    }
}
