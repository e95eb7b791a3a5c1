// =============================================================================
// Simulated price source — geometric random walk per asset
// =============================================================================
//
// Each step multiplies the price by (1 + r) with r ~ N(drift, volatility).
// A step that would take the price to zero or below is discarded and the
// previous price repeated, so the book never sees a non-positive sample.
// =============================================================================

use std::collections::HashMap;

use anyhow::{anyhow, ensure, Result};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use crate::runtime_config::SimulatedAsset;

struct Walk {
    symbol: String,
    returns: Normal<f64>,
}

pub struct SimulatedSource {
    walks: Vec<Walk>,
    prices: Mutex<HashMap<String, f64>>,
    rng: Mutex<StdRng>,
}

impl SimulatedSource {
    /// Random walk seeded from OS entropy.
    pub fn new(assets: &[SimulatedAsset]) -> Result<Self> {
        Self::with_rng(assets, StdRng::from_entropy())
    }

    /// Deterministic random walk for reproducible runs.
    #[cfg(test)]
    pub fn seeded(assets: &[SimulatedAsset], seed: u64) -> Result<Self> {
        Self::with_rng(assets, StdRng::seed_from_u64(seed))
    }

    fn with_rng(assets: &[SimulatedAsset], rng: StdRng) -> Result<Self> {
        let mut walks = Vec::with_capacity(assets.len());
        let mut prices = HashMap::with_capacity(assets.len());

        for asset in assets {
            ensure!(
                asset.price.is_finite() && asset.price > 0.0,
                "simulated asset {} has invalid starting price {}",
                asset.symbol,
                asset.price
            );
            ensure!(
                asset.volatility.is_finite() && asset.volatility >= 0.0,
                "simulated asset {} has invalid volatility {}",
                asset.symbol,
                asset.volatility
            );
            ensure!(
                asset.drift.is_finite(),
                "simulated asset {} has invalid drift {}",
                asset.symbol,
                asset.drift
            );
            let returns = Normal::new(asset.drift, asset.volatility).map_err(|e| {
                anyhow!("simulated asset {}: {e}", asset.symbol)
            })?;
            walks.push(Walk {
                symbol: asset.symbol.clone(),
                returns,
            });
            prices.insert(asset.symbol.clone(), asset.price);
        }

        Ok(Self {
            walks,
            prices: Mutex::new(prices),
            rng: Mutex::new(rng),
        })
    }

    #[cfg(test)]
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.walks.iter().map(|w| w.symbol.as_str())
    }

    /// Current simulated price of `symbol`, without stepping.
    pub fn price(&self, symbol: &str) -> Option<f64> {
        self.prices.lock().get(symbol).copied()
    }

    /// Advance every walk by one step and return the new prices.
    pub fn step(&self) -> HashMap<String, f64> {
        let mut rng = self.rng.lock();
        let mut prices = self.prices.lock();

        for walk in &self.walks {
            let r = walk.returns.sample(&mut *rng);
            if let Some(price) = prices.get_mut(&walk.symbol) {
                let next = *price * (1.0 + r);
                if next.is_finite() && next > 0.0 {
                    *price = next;
                }
            }
        }

        prices.clone()
    }
}
