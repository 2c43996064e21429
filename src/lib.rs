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

//! Core of a two-party revocable payment channel.
//!
//! Each commitment state is protected by a pair of per-state keys derived
//! with homomorphic adversarial key derivation (HAKD): a long-lived base
//! public key is tweaked with a point produced from an elkrem secret. Once a
//! state is replaced, its elkrem secret is revealed to the counterparty,
//! which lets it sweep the whole commitment output should the old state ever
//! be published.

// Coding conventions
#![deny(
    non_upper_case_globals,
    non_camel_case_types,
    non_snake_case,
    unused_mut,
    unused_imports,
    dead_code,
    //missing_docs
)]

#[macro_use]
extern crate amplify;
#[macro_use]
extern crate strict_encoding;
#[macro_use]
extern crate log;

#[cfg(feature = "serde")]
#[macro_use]
extern crate serde_crate as serde;

pub extern crate elkrem;

mod channel;
pub mod close;
pub mod derivation;
mod error;
pub mod hint;
mod params;
pub mod scripts;
mod shared;
mod state;

pub use channel::{Channel, ChannelInfo, ChannelKeys, CloseData};
pub use close::{
    CloseOutputs, KeyRole, OutputDescriptor, OutputKind, ScriptMismatch,
    Spendability,
};
pub use derivation::{ElkPointKind, ElkPoints};
pub use error::Error;
pub use hint::StateHint;
pub use params::{ChannelParams, DEFAULT_TIMEOUT_BLOCKS};
pub use scripts::ScriptGenerators;
pub use shared::SharedChannel;
pub use state::StateCommitment;
