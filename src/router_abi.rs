//! `alloy` contract bindings for the on-chain Settlement Router.
//!
//! The teacher binds contracts from JSON ABI files (`sol!(USDC, "abi/USDC.json")`
//! in `facilitator_local.rs`), but it also uses inline Solidity-interface
//! blocks directly where no ABI file is vendored (`Sig6492` and the
//! `TransferWithAuthorization` struct in `types.rs`). The Settlement Router
//! is our own contract with no vendored ABI, so we follow that second,
//! equally-idiomatic path.

use alloy_sol_types::sol;

sol! {
    #[derive(Debug)]
    interface SettlementRouter {
        function settleAndExecute(
            address token,
            address from,
            uint256 value,
            uint256 validAfter,
            uint256 validBefore,
            bytes32 nonce,
            bytes signature,
            bytes32 salt,
            address payTo,
            uint256 facilitatorFee,
            address hook,
            bytes hookData
        ) external;

        function getPendingFees(address facilitator, address token) external view returns (uint256);

        function claimFees(address[] tokens) external;
    }
}

sol! {
    /// The EIP-712 struct signed by the payer, matching EIP-3009's
    /// `TransferWithAuthorization`. The router recomputes this hash itself
    /// when it forwards the signature to the asset's `transferWithAuthorization`.
    #[derive(Debug)]
    struct TransferWithAuthorization {
        address from;
        address to;
        uint256 value;
        uint256 validAfter;
        uint256 validBefore;
        bytes32 nonce;
    }
}

sol! {
    /// ERC-6492 wraps a signature for a not-yet-deployed (counterfactual)
    /// smart contract wallet: the inner signature plus the deployment
    /// calldata needed to counterfactually validate it.
    #[derive(Debug)]
    struct Erc6492Signature {
        address factory;
        bytes factoryCalldata;
        bytes innerSignature;
    }
}

/// The fixed suffix ERC-6492 appends to a wrapped signature, per the ERC.
pub const ERC6492_MAGIC_SUFFIX: [u8; 32] = [
    0x64, 0x92, 0x64, 0x92, 0x64, 0x92, 0x64, 0x92, 0x64, 0x92, 0x64, 0x92, 0x64, 0x92, 0x64, 0x92,
    0x64, 0x92, 0x64, 0x92, 0x64, 0x92, 0x64, 0x92, 0x64, 0x92, 0x64, 0x92, 0x64, 0x92, 0x64, 0x92,
];
