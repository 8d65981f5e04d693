//! Canonical output encoding and leaf hashing.
//!
//! Outputs are committed as the keccak-256 of their ABI call encoding, the
//! same layout the base-chain application contract executes them with. The
//! 4-byte selector doubles as the kind discriminant, so a voucher and a
//! notice with identical payload bytes never share a leaf digest.

use alloy::{
    primitives::{keccak256, B256},
    sol,
    sol_types::SolCall,
};

use crate::output::{Output, OutputKind};

sol! {
    function Voucher(address destination, uint256 value, bytes payload);
    function Notice(bytes payload);
}

/// Hashes a single output into its tree leaf. Total and deterministic;
/// validating destinations and values is the caller's job.
pub fn leaf_hash(output: &Output) -> B256 {
    let encoded = match &output.kind {
        OutputKind::Voucher { destination, value } => VoucherCall {
            destination: *destination,
            value: *value,
            payload: output.payload.clone().into(),
        }
        .abi_encode(),
        OutputKind::Notice => NoticeCall {
            payload: output.payload.clone().into(),
        }
        .abi_encode(),
    };
    keccak256(&encoded)
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{Address, U256};

    use super::*;

    #[test]
    fn leaf_hash_is_deterministic() {
        let v = Output::voucher(0, 0, Address::ZERO, U256::from(10), vec![0xde, 0xad]);
        assert_eq!(leaf_hash(&v), leaf_hash(&v.clone()));
    }

    #[test]
    fn kinds_never_collide_on_same_payload() {
        let payload = vec![1, 2, 3];
        let v = Output::voucher(0, 0, Address::ZERO, U256::ZERO, payload.clone());
        let n = Output::notice(0, 0, payload);
        assert_ne!(leaf_hash(&v), leaf_hash(&n));
    }

    #[test]
    fn voucher_fields_affect_leaf() {
        let base = Output::voucher(0, 0, Address::ZERO, U256::from(1), vec![7]);
        let other_value = Output::voucher(0, 0, Address::ZERO, U256::from(2), vec![7]);
        let other_dest = Output::voucher(0, 0, Address::repeat_byte(1), U256::from(1), vec![7]);
        assert_ne!(leaf_hash(&base), leaf_hash(&other_value));
        assert_ne!(leaf_hash(&base), leaf_hash(&other_dest));
    }
}
