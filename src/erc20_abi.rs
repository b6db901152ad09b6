//! Minimal ERC-20 bindings used by the balance checker and domain resolution,
//! following the teacher's `sol!(USDC, "abi/USDC.json")` binding shape but
//! inline, since no USDC ABI file is vendored in this workspace.

use alloy_sol_types::sol;

sol! {
    #[derive(Debug)]
    interface Erc20 {
        function balanceOf(address account) external view returns (uint256);
        function decimals() external view returns (uint8);
        /// Not every ERC-20 deployment exposes this (USDC proxies do); callers
        /// fall back to a configured EIP-712 version when the call reverts.
        function version() external view returns (string);
    }
}

sol! {
    /// ERC-3009's gasless-transfer entry point, used directly by the legacy
    /// v1 settlement path (no router in between).
    #[derive(Debug)]
    interface Eip3009 {
        function transferWithAuthorization(
            address from,
            address to,
            uint256 value,
            uint256 validAfter,
            uint256 validBefore,
            bytes32 nonce,
            bytes signature
        ) external;
    }
}
