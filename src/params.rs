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

/// Relative timelock used by channels which were not configured otherwise
pub const DEFAULT_TIMEOUT_BLOCKS: u16 = 5;

/// Channel parameters agreed by both peers at channel opening
#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Debug,
    Display,
    StrictEncode,
    StrictDecode
)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(crate = "serde_crate", default)
)]
#[display("timeout: {timeout_blocks} blocks")]
pub struct ChannelParams {
    /// Number of blocks the broadcaster of a commitment transaction has to
    /// wait before spending its own revocable output. During this period the
    /// counterparty can sweep the output if the commitment was revoked.
    pub timeout_blocks: u16,
}

impl Default for ChannelParams {
    fn default() -> Self {
        ChannelParams {
            timeout_blocks: DEFAULT_TIMEOUT_BLOCKS,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_timeout() {
        assert_eq!(ChannelParams::default().timeout_blocks, 5);
        assert_eq!(
            ChannelParams::default().to_string(),
            "timeout: 5 blocks"
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn params_from_json() {
        let params: ChannelParams =
            serde_json::from_str(r#"{"timeout_blocks": 144}"#).unwrap();
        assert_eq!(params.timeout_blocks, 144);

        let params: ChannelParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params, ChannelParams::default());
    }
}
