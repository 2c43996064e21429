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

use crate::ElkremHash;

/// Which of the two children of a newly received parent node failed the
/// consistency check
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Display)]
pub enum ChildSide {
    /// Left child, `sha256d(parent)`
    #[display("left")]
    Left,

    /// Right child, `sha256d(parent || 0x01)`
    #[display("right")]
    Right,
}

/// Errors of elkrem tree operations
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Display, Error)]
#[display(doc_comments)]
pub enum Error {
    /// elkrem index {0} is outside of the tree (the maximum index is
    /// 281474976710654)
    IndexOutOfRange(u64),

    /// elkrem node {from} (height {height}) does not cover index {to}
    Underivable {
        /// Index of the node used for the derivation
        from: u64,
        /// Height of the node used for the derivation
        height: u8,
        /// Requested index
        to: u64,
    },

    /// secret #{index} does not fit the elkrem tree: its {side} child is
    /// {computed} while the previously received node is {expected}
    TreeInsertion {
        /// Child which did not match
        side: ChildSide,
        /// Index the secret was inserted at
        index: u64,
        /// Hash of the previously received child node
        expected: ElkremHash,
        /// Child hash computed from the inserted secret
        computed: ElkremHash,
    },

    /// elkrem secret #{requested} is not received yet ({received} secrets
    /// are known)
    NotYetReceived {
        /// Requested index
        requested: u64,
        /// Number of secrets received so far
        received: u64,
    },

    /// elkrem receiver already holds all secrets of the tree
    Exhausted,
}
