// ABI encoding for constructor arguments
//
// The verifier recomputes the constructor-encoded data from the same
// arguments, so creation and verification must share this encoding.

use crate::types::Address;

/// ABI-encode one address: 12 zero bytes then the 20 address bytes
pub fn encode_address(addr: &Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(addr.as_bytes());
    word
}

/// ABI-encode a static argument list of addresses (32 bytes each, in order)
pub fn encode_constructor_args(args: &[Address]) -> Vec<u8> {
    let mut out = Vec::with_capacity(args.len() * 32);
    for arg in args {
        out.extend_from_slice(&encode_address(arg));
    }
    out
}

/// Hex form of the encoded arguments, without 0x, as the Etherscan API expects
pub fn constructor_args_hex(args: &[Address]) -> String {
    hex::encode(encode_constructor_args(args))
}
