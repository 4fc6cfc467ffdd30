//! Synthetic price series for the chart.
//!
//! RULE: the series is drawn AFTER the stage outcome is known and only
//! ever follows a direction it is given. Nothing reads a series back to
//! decide a result.

use crate::{
    rng::{RngBank, StreamRng, StreamSlot},
    types::Direction,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub name:   String,
    pub symbol: String,
    pub price:  f64,
}

impl Asset {
    pub fn new(name: &str, symbol: &str, price: f64) -> Self {
        Self { name: name.into(), symbol: symbol.into(), price }
    }
}

pub fn default_assets() -> Vec<Asset> {
    vec![
        Asset::new("Bitcoin", "BTC", 250_000.0),
        Asset::new("Ethereum", "ETH", 12_000.0),
        Asset::new("Binance Coin", "BNB", 1_800.0),
        Asset::new("Solana", "SOL", 700.0),
        Asset::new("Cardano", "ADA", 2.5),
        Asset::new("Polkadot", "DOT", 40.0),
        Asset::new("Dogecoin", "DOGE", 0.75),
        Asset::new("Ripple", "XRP", 2.3),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketPoint {
    pub time_label: String,
    pub price:      f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketSettings {
    pub tick_count: usize,
    /// Unsigned trend applied every point before jitter.
    pub base_step:  f64,
    pub jitter_min: f64,
    pub jitter_max: f64,
    pub price_floor: f64,
}

impl Default for MarketSettings {
    fn default() -> Self {
        Self {
            tick_count:  15,
            base_step:   25.0,
            jitter_min:  -5.0,
            jitter_max:  15.0,
            price_floor: 10.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MarketSeriesGenerator {
    settings: MarketSettings,
}

impl MarketSeriesGenerator {
    pub fn new(settings: MarketSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &MarketSettings {
        &self.settings
    }

    /// Start a fresh series. The returned iterator owns its RNG stream and
    /// yields `tick_count` points exactly once.
    pub fn generate(&self, initial_price: f64, direction: Direction, rng: StreamRng) -> MarketSeries {
        MarketSeries {
            settings: self.settings,
            direction,
            price: initial_price,
            emitted: 0,
            rng,
        }
    }
}

/// Lazily evaluated price walk. Not restartable.
pub struct MarketSeries {
    settings:  MarketSettings,
    direction: Direction,
    price:     f64,
    emitted:   usize,
    rng:       StreamRng,
}

impl MarketSeries {
    pub fn direction(&self) -> Direction {
        self.direction
    }
}

impl Iterator for MarketSeries {
    type Item = MarketPoint;

    fn next(&mut self) -> Option<MarketPoint> {
        if self.emitted >= self.settings.tick_count {
            return None;
        }
        self.emitted += 1;

        let jitter = self.rng.range_f64(self.settings.jitter_min, self.settings.jitter_max);
        let step = self.direction.sign() * (self.settings.base_step + jitter);
        self.price = (self.price + step).max(self.settings.price_floor);

        Some(MarketPoint {
            time_label: format!("{}s", self.emitted),
            price: self.price,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.settings.tick_count - self.emitted;
        (left, Some(left))
    }
}

impl ExactSizeIterator for MarketSeries {}

/// Hands out fresh series and asset picks for a run. Each draw uses its
/// own salted stream, so regenerating is always a new series.
#[derive(Debug, Clone)]
pub struct MarketFeed {
    generator:     MarketSeriesGenerator,
    bank:          RngBank,
    series_drawn:  u64,
    assets_drawn:  u64,
}

impl MarketFeed {
    pub fn new(generator: MarketSeriesGenerator, bank: RngBank) -> Self {
        Self { generator, bank, series_drawn: 0, assets_drawn: 0 }
    }

    pub fn draw_series(&mut self, initial_price: f64, direction: Direction) -> Vec<MarketPoint> {
        let rng = self.bank.for_stream(StreamSlot::Market, self.series_drawn);
        self.series_drawn += 1;
        self.generator.generate(initial_price, direction, rng).collect()
    }

    /// `None` only for an empty catalog, which config validation rejects.
    pub fn pick_asset(&mut self, assets: &[Asset]) -> Option<Asset> {
        if assets.is_empty() {
            return None;
        }
        let mut rng = self.bank.for_stream(StreamSlot::Asset, self.assets_drawn);
        self.assets_drawn += 1;
        assets.get(rng.index_below(assets.len())).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(direction: Direction, price: f64, salt: u64) -> Vec<MarketPoint> {
        let rng = RngBank::new(99).for_stream(StreamSlot::Market, salt);
        MarketSeriesGenerator::default().generate(price, direction, rng).collect()
    }

    #[test]
    fn yields_fixed_number_of_labelled_points() {
        let points = series(Direction::Up, 700.0, 0);
        assert_eq!(points.len(), 15);
        assert_eq!(points[0].time_label, "1s");
        assert_eq!(points[14].time_label, "15s");
    }

    #[test]
    fn up_series_rises_every_tick() {
        let points = series(Direction::Up, 700.0, 1);
        let mut prev = 700.0;
        for p in &points {
            assert!(p.price > prev, "{} did not rise above {prev}", p.price);
            prev = p.price;
        }
    }

    #[test]
    fn down_series_falls_and_respects_floor() {
        let points = series(Direction::Down, 40.0, 2);
        assert!(points.iter().all(|p| p.price >= 10.0));
        assert_eq!(points.last().unwrap().price, 10.0);

        let points = series(Direction::Down, 250_000.0, 3);
        assert!(points.last().unwrap().price < 250_000.0);
    }

    #[test]
    fn series_is_not_restartable() {
        let rng = RngBank::new(1).for_stream(StreamSlot::Market, 0);
        let mut s = MarketSeriesGenerator::default().generate(100.0, Direction::Up, rng);
        assert_eq!(s.len(), 15);
        assert_eq!(s.by_ref().count(), 15);
        assert!(s.next().is_none());
    }

    #[test]
    fn feed_never_replays_a_series() {
        let mut feed = MarketFeed::new(MarketSeriesGenerator::default(), RngBank::new(5));
        let a = feed.draw_series(700.0, Direction::Up);
        let b = feed.draw_series(700.0, Direction::Up);
        assert_eq!(a.len(), b.len());
        assert_ne!(a, b, "Second draw must be an independent series");
    }

    #[test]
    fn feed_picks_from_catalog() {
        let assets = default_assets();
        let mut feed = MarketFeed::new(MarketSeriesGenerator::default(), RngBank::new(5));
        for _ in 0..20 {
            let asset = feed.pick_asset(&assets).unwrap();
            assert!(assets.contains(&asset));
        }
        assert!(feed.pick_asset(&[]).is_none());
    }
}
