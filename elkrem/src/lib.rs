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

//! Elkrem is a hash tree producing a sequence of 2^48 - 1 secrets out of a
//! single root. The party knowing the root ([`ElkremSender`]) derives any
//! secret at will; the counterparty ([`ElkremReceiver`]) receives secrets one
//! by one, checks that each new secret is consistent with the ones it already
//! has and stores only O(log n) tree nodes.
//!
//! Revealing secret `i` does not reveal any secret with a higher index, which
//! makes the sequence usable for revoking old channel states.

// Coding conventions
#![deny(
    non_upper_case_globals,
    non_camel_case_types,
    non_snake_case,
    unused_mut,
    unused_imports,
    dead_code,
    missing_docs
)]

#[macro_use]
extern crate amplify;
#[macro_use]
extern crate strict_encoding;
#[cfg(feature = "serde")]
#[macro_use]
extern crate serde_crate as serde;

mod error;
mod node;
mod receiver;
mod sender;

pub use bitcoin::hashes::sha256d::Hash as ElkremHash;
pub use error::{ChildSide, Error};
pub use node::{left_hash, right_hash, ElkremNode};
pub use receiver::ElkremReceiver;
pub use sender::ElkremSender;

/// Height of the elkrem tree root; leaves have height 0
pub const MAX_HEIGHT: u8 = 47;

/// Index of the tree root, which is the last secret of the sequence
pub const MAX_INDEX: u64 = (1 << (MAX_HEIGHT as u64 + 1)) - 2;

/// Common read access to the secrets of an elkrem tree, independently of
/// whether the tree is owned (sender) or collected from the counterparty
/// (receiver).
pub trait Elkrem {
    /// Returns secret with the given index
    fn at_index(&self, index: u64) -> Result<ElkremHash, Error>;

    /// Highest index accessible through [`Elkrem::at_index`], or `None` if
    /// no secrets are known yet
    fn up_to(&self) -> Option<u64>;
}
