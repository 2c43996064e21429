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

use crate::{Elkrem, ElkremHash, ElkremNode, Error, MAX_HEIGHT, MAX_INDEX};

/// Owner of the elkrem tree root, able to produce every secret of the
/// sequence.
///
/// The root is secret material and is not persisted: it must be re-derived
/// from the channel key each time the channel is loaded.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ElkremSender {
    root: ElkremNode,
}

impl ElkremSender {
    /// Constructs sender from the tree root secret
    pub fn new(root: ElkremHash) -> Self {
        ElkremSender {
            root: ElkremNode {
                height: MAX_HEIGHT,
                index: MAX_INDEX,
                hash: root,
            },
        }
    }
}

impl Elkrem for ElkremSender {
    fn at_index(&self, index: u64) -> Result<ElkremHash, Error> {
        if index > MAX_INDEX {
            return Err(Error::IndexOutOfRange(index));
        }
        self.root.descend(index)
    }

    #[inline]
    fn up_to(&self) -> Option<u64> {
        Some(MAX_INDEX)
    }
}
