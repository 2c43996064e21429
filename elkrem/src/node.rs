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

use bitcoin::hashes::{sha256d, Hash, HashEngine};

use crate::{ElkremHash, Error};

/// Computes left child of a tree node: `sha256d(parent)`
#[inline]
pub fn left_hash(parent: &ElkremHash) -> ElkremHash {
    sha256d::Hash::hash(&parent[..])
}

/// Computes right child of a tree node: `sha256d(parent || 0x01)`
#[inline]
pub fn right_hash(parent: &ElkremHash) -> ElkremHash {
    let mut engine = sha256d::Hash::engine();
    engine.input(&parent[..]);
    engine.input(&[0x01]);
    sha256d::Hash::from_engine(engine)
}

/// Elkrem tree node with its position.
///
/// Nodes are numbered in post-order: both subtrees of a node always precede
/// it. For a node with index `i` and height `h` the right child has index
/// `i - 1` and the left child has index `i - 2^h`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, StrictEncode, StrictDecode)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate")
)]
pub struct ElkremNode {
    /// Height of the node above the leaves
    pub height: u8,
    /// Position of the node in the secret sequence
    pub index: u64,
    /// Node secret
    pub hash: ElkremHash,
}

impl ElkremNode {
    /// Derives secret at `target` index from this node, descending the
    /// subtree. Fails if `target` is not inside the subtree of the node.
    pub fn descend(&self, target: u64) -> Result<ElkremHash, Error> {
        let mut index = self.index;
        let mut height = self.height;
        let mut hash = self.hash;

        while target < index {
            // leaves have no children
            if height == 0 {
                break;
            }
            match index.checked_sub(1u64 << height) {
                Some(left_index) if target <= left_index => {
                    hash = left_hash(&hash);
                    index = left_index;
                }
                _ => {
                    hash = right_hash(&hash);
                    index -= 1;
                }
            }
            height -= 1;
        }

        if target != index {
            return Err(Error::Underivable {
                from: self.index,
                height: self.height,
                to: target,
            });
        }
        Ok(hash)
    }
}
