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

use std::sync::{Arc, Mutex, MutexGuard};

use bitcoin::{Transaction, Txid};
use elkrem::ElkremHash;
use secp256k1::ecdsa::Signature;

use crate::{Channel, ChannelInfo, CloseOutputs, ElkPoints, Error};

/// Channel shared between threads.
///
/// Each operation holds the channel lock for its whole duration, so state
/// advances, revocations and close analysis on the same channel never
/// interleave. Clones refer to the same channel.
#[derive(Clone, Debug)]
pub struct SharedChannel(Arc<Mutex<Channel>>);

impl From<Channel> for SharedChannel {
    fn from(channel: Channel) -> Self {
        SharedChannel(Arc::new(Mutex::new(channel)))
    }
}

impl SharedChannel {
    fn lock(&self) -> Result<MutexGuard<'_, Channel>, Error> {
        self.0.lock().map_err(|_| Error::Poisoned)
    }

    /// Runs `f` with exclusive access to the channel
    pub fn with<T>(
        &self,
        f: impl FnOnce(&mut Channel) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let mut channel = self.lock()?;
        f(&mut channel)
    }

    /// Copy of the channel in its current state
    pub fn snapshot(&self) -> Result<Channel, Error> {
        Ok(self.lock()?.clone())
    }

    /// See [`Channel::current_outgoing_points`]
    pub fn outgoing_points(&self) -> Result<ElkPoints, Error> {
        self.lock()?.current_outgoing_points()
    }

    /// See [`Channel::advance`]
    pub fn advance(
        &self,
        points: ElkPoints,
        signature: Signature,
    ) -> Result<(), Error> {
        self.lock()?.advance(points, signature)
    }

    /// See [`Channel::ingest_revocation`]
    pub fn ingest_revocation(&self, secret: ElkremHash) -> Result<(), Error> {
        self.lock()?.ingest_revocation(secret)
    }

    /// See [`Channel::commitment_tx`]
    pub fn commitment_tx(&self) -> Result<Transaction, Error> {
        self.lock()?.commitment_tx()
    }

    /// See [`Channel::close_outputs`]
    pub fn close_outputs(
        &self,
        tx: &Transaction,
    ) -> Result<CloseOutputs, Error> {
        self.lock()?.close_outputs(tx)
    }

    /// See [`Channel::mark_closed`]
    pub fn mark_closed(&self, txid: Txid, height: u32) -> Result<(), Error> {
        self.lock()?.mark_closed(txid, height);
        Ok(())
    }

    /// See [`Channel::info`]
    pub fn info(&self) -> Result<ChannelInfo, Error> {
        Ok(self.lock()?.info())
    }
}

#[cfg(test)]
mod test {
    use std::thread;

    use bitcoin::hashes::Hash;
    use bitcoin::OutPoint;
    use secp256k1::{PublicKey, SecretKey, SECP256K1};

    use super::*;
    use crate::{ChannelKeys, ChannelParams};

    fn channel() -> Channel {
        let pk = |byte: u8| {
            PublicKey::from_secret_key(
                SECP256K1,
                &SecretKey::from_slice(&[byte; 32]).unwrap(),
            )
        };
        let keys = ChannelKeys {
            node_id: pk(1),
            channel_key: pk(2),
            refund_base: pk(3),
            hakd_base: pk(4),
        };
        Channel::with(
            OutPoint::new(Txid::hash(b"funding"), 1),
            10_000,
            5_000,
            keys,
            keys,
            ElkremHash::hash(b"root"),
            ChannelParams::default(),
        )
    }

    #[test]
    fn shared_between_threads() {
        let shared = SharedChannel::from(channel());
        let expected = channel().current_outgoing_points().unwrap();
        let handles = (0..4)
            .map(|_| {
                let shared = shared.clone();
                thread::spawn(move || shared.outgoing_points().unwrap())
            })
            .collect::<Vec<_>>();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    }

    #[test]
    fn errors_leave_channel_intact() {
        let shared = SharedChannel::from(channel());
        let before = shared.snapshot().unwrap();
        assert_eq!(
            shared.ingest_revocation(ElkremHash::hash(b"secret")),
            Err(Error::NoPendingRevocation(0))
        );
        assert_eq!(shared.snapshot().unwrap(), before);
    }

    #[test]
    fn poisoned_lock() {
        let shared = SharedChannel::from(channel());
        let cloned = shared.clone();
        let _ = thread::spawn(move || {
            cloned
                .with(|_| -> Result<(), Error> { panic!("poisoning") })
                .ok();
        })
        .join();
        assert_eq!(shared.info(), Err(Error::Poisoned));
    }
}
