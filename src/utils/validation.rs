//! Input validation utilities.
//!
//! Precondition checks composed at the start of each engine operation,
//! before any ledger is staged or collaborator called.

use tracing::debug;

use crate::core::assets::{AssetId, AssetRegistry};
use crate::error::{Error, Result};
use crate::utils::crypto::Address;

// ═══════════════════════════════════════════════════════════════════════════════
// AMOUNT VALIDATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Validate that an amount is non-zero
pub fn validate_non_zero(amount: u128, name: &str) -> Result<()> {
    if amount == 0 {
        debug!(field = name, "Rejected zero amount");
        return Err(Error::InvalidAmount);
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// ASSET VALIDATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Validate that `asset` is deposit-eligible
pub fn validate_supported_asset(registry: &AssetRegistry, asset: &AssetId) -> Result<()> {
    if !registry.contains(asset) {
        return Err(Error::UnsupportedAsset(asset.to_string()));
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════════
// ACCOUNT VALIDATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Validate that an account address is set
pub fn validate_address(address: &Address, name: &str) -> Result<()> {
    if address.is_zero() {
        return Err(Error::InvalidParameter {
            name: name.into(),
            reason: "zero address".into(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_non_zero() {
        assert!(validate_non_zero(1, "amount").is_ok());
        assert!(matches!(validate_non_zero(0, "amount"), Err(Error::InvalidAmount)));
    }

    #[test]
    fn test_validate_address() {
        assert!(validate_address(&Address::from_label("alice"), "user").is_ok());
        assert!(validate_address(&Address::ZERO, "user").is_err());
    }

    #[test]
    fn test_validate_supported_asset() {
        let registry = AssetRegistry::default();
        assert!(matches!(
            validate_supported_asset(&registry, &AssetId::from("WETH")),
            Err(Error::UnsupportedAsset(_))
        ));
    }
}
