//! Supported collateral assets.
//!
//! The set of deposit-eligible assets is fixed when the engine is built:
//! an ordered list of collateral tokens paired one-to-one with their price
//! feeds. Nothing adds or removes assets afterwards.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::core::vault::CollateralAsset;
use crate::error::{Error, Result};
use crate::oracle::price_feed::PriceFeed;

// ═══════════════════════════════════════════════════════════════════════════════
// ASSET ID
// ═══════════════════════════════════════════════════════════════════════════════

/// Identifier of a collateral asset (its symbol)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(String);

impl AssetId {
    /// Create a new asset identifier
    pub fn new(symbol: impl Into<String>) -> Self {
        Self(symbol.into())
    }

    /// Symbol as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetId {
    fn from(symbol: &str) -> Self {
        Self::new(symbol)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SUPPORTED ASSET
// ═══════════════════════════════════════════════════════════════════════════════

/// A deposit-eligible asset and the feed that prices it
#[derive(Clone)]
pub struct SupportedAsset {
    /// Asset identifier
    pub id: AssetId,
    /// Token contract moving the asset in and out of custody
    pub token: Arc<dyn CollateralAsset>,
    /// Price source for one unit of the asset
    pub price_feed: Arc<dyn PriceFeed>,
}

impl fmt::Debug for SupportedAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupportedAsset")
            .field("id", &self.id)
            .field("price_feed", &self.price_feed.description())
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ASSET REGISTRY
// ═══════════════════════════════════════════════════════════════════════════════

/// Immutable, ordered set of supported assets
#[derive(Debug, Clone, Default)]
pub struct AssetRegistry {
    assets: Vec<SupportedAsset>,
    index: HashMap<AssetId, usize>,
}

impl AssetRegistry {
    /// Pair collateral tokens with price feeds, position by position
    pub fn new(
        tokens: Vec<Arc<dyn CollateralAsset>>,
        price_feeds: Vec<Arc<dyn PriceFeed>>,
    ) -> Result<Self> {
        if tokens.len() != price_feeds.len() {
            return Err(Error::LengthMismatch {
                assets: tokens.len(),
                price_feeds: price_feeds.len(),
            });
        }

        let mut assets = Vec::with_capacity(tokens.len());
        let mut index = HashMap::with_capacity(tokens.len());

        for (token, price_feed) in tokens.into_iter().zip(price_feeds) {
            let id = token.asset_id();
            if index.insert(id.clone(), assets.len()).is_some() {
                return Err(Error::DuplicateAsset(id.to_string()));
            }
            assets.push(SupportedAsset { id, token, price_feed });
        }

        Ok(Self { assets, index })
    }

    /// Look up a supported asset
    pub fn get(&self, id: &AssetId) -> Result<&SupportedAsset> {
        self.index
            .get(id)
            .map(|&i| &self.assets[i])
            .ok_or_else(|| Error::UnsupportedAsset(id.to_string()))
    }

    /// Check whether an asset is deposit-eligible
    pub fn contains(&self, id: &AssetId) -> bool {
        self.index.contains_key(id)
    }

    /// Asset identifiers in registration order
    pub fn ids(&self) -> impl Iterator<Item = &AssetId> {
        self.assets.iter().map(|a| &a.id)
    }

    /// Supported assets in registration order
    pub fn iter(&self) -> impl Iterator<Item = &SupportedAsset> {
        self.assets.iter()
    }

    /// Number of supported assets
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    /// True when no assets are registered
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}
