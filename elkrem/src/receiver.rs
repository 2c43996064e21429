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

use crate::{
    left_hash, right_hash, ChildSide, Elkrem, ElkremHash, ElkremNode, Error,
    MAX_INDEX,
};

/// Collector of the secrets revealed by the counterparty.
///
/// Keeps a stack of subtree roots: whenever the two topmost nodes have the
/// same height, the next secret must be their parent and is checked against
/// both of them before the children are dropped.
#[derive(
    Clone, PartialEq, Eq, Debug, Default, StrictEncode, StrictDecode
)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
pub struct ElkremReceiver {
    stack: Vec<ElkremNode>,
}

impl ElkremReceiver {
    /// Constructs receiver which has not seen any secrets yet
    #[inline]
    pub fn new() -> Self {
        ElkremReceiver::default()
    }

    /// Subtree roots kept by the receiver
    #[inline]
    pub fn nodes(&self) -> &[ElkremNode] {
        &self.stack
    }

    /// Index which the next call to [`ElkremReceiver::add_next`] will fill
    #[inline]
    pub fn next_index(&self) -> u64 {
        self.up_to().map(|index| index + 1).unwrap_or_default()
    }

    /// Adds secret with the next index, verifying that it is consistent with
    /// the previously received ones. The receiver is left untouched if the
    /// check fails.
    ///
    /// Secrets which become leaves of the tree can't be checked at the moment
    /// of insertion; they are verified once their parent arrives.
    pub fn add_next(&mut self, hash: ElkremHash) -> Result<(), Error> {
        let index = self.next_index();
        if index > MAX_INDEX {
            return Err(Error::Exhausted);
        }

        let mut node = ElkremNode {
            height: 0,
            index,
            hash,
        };

        let len = self.stack.len();
        if len >= 2 && self.stack[len - 2].height == self.stack[len - 1].height
        {
            let left = &self.stack[len - 2];
            let right = &self.stack[len - 1];
            node.height = right.height + 1;

            let computed = left_hash(&hash);
            if computed != left.hash {
                return Err(Error::TreeInsertion {
                    side: ChildSide::Left,
                    index,
                    expected: left.hash,
                    computed,
                });
            }
            let computed = right_hash(&hash);
            if computed != right.hash {
                return Err(Error::TreeInsertion {
                    side: ChildSide::Right,
                    index,
                    expected: right.hash,
                    computed,
                });
            }
            self.stack.truncate(len - 2);
        }

        self.stack.push(node);
        Ok(())
    }
}

impl Elkrem for ElkremReceiver {
    fn at_index(&self, index: u64) -> Result<ElkremHash, Error> {
        self.stack
            .iter()
            .find(|node| index <= node.index)
            .ok_or(Error::NotYetReceived {
                requested: index,
                received: self.next_index(),
            })?
            .descend(index)
    }

    #[inline]
    fn up_to(&self) -> Option<u64> {
        self.stack.last().map(|node| node.index)
    }
}

#[cfg(test)]
mod test {
    use bitcoin::hashes::Hash;

    use super::*;
    use crate::ElkremSender;

    #[test]
    fn empty_receiver() {
        let receiver = ElkremReceiver::new();
        assert_eq!(receiver.up_to(), None);
        assert_eq!(receiver.next_index(), 0);
        assert_eq!(
            receiver.at_index(0),
            Err(Error::NotYetReceived {
                requested: 0,
                received: 0
            })
        );
    }

    #[test]
    fn not_yet_received() {
        let sender = ElkremSender::new(ElkremHash::hash(b"seed"));
        let mut receiver = ElkremReceiver::new();
        for index in 0..5 {
            receiver.add_next(sender.at_index(index).unwrap()).unwrap();
        }
        assert_eq!(receiver.up_to(), Some(4));
        assert_eq!(
            receiver.at_index(5),
            Err(Error::NotYetReceived {
                requested: 5,
                received: 5
            })
        );
        assert!(receiver.at_index(4).is_ok());
    }

    #[test]
    fn right_child_mismatch() {
        let sender = ElkremSender::new(ElkremHash::hash(b"seed"));
        let mut receiver = ElkremReceiver::new();
        receiver.add_next(sender.at_index(0).unwrap()).unwrap();
        // leaf at index 1 can't be checked on insertion
        receiver.add_next(ElkremHash::hash(b"bad leaf")).unwrap();
        let err = receiver.add_next(sender.at_index(2).unwrap()).unwrap_err();
        assert!(matches!(err, Error::TreeInsertion {
            side: ChildSide::Right,
            index: 2,
            ..
        }));
        assert_eq!(receiver.up_to(), Some(1));
    }

    #[test]
    fn stack_collapses() {
        let sender = ElkremSender::new(ElkremHash::hash(b"seed"));
        let mut receiver = ElkremReceiver::new();
        for index in 0..=6 {
            receiver.add_next(sender.at_index(index).unwrap()).unwrap();
        }
        // indexes 0..=6 form a complete subtree of height 2
        assert_eq!(receiver.nodes().len(), 1);
        assert_eq!(receiver.nodes()[0].height, 2);
        assert_eq!(receiver.nodes()[0].index, 6);
    }
}
