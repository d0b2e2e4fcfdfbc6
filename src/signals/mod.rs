//! Property-signal enrichment. Each sub-source is fetched independently and
//! degrades to a deterministic synthetic value on failure, so the aggregate
//! bundle always comes back complete. Synthetic values are a pure function
//! of the location string.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Location {
    pub postcode: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub area_code: Option<String>,
}

impl Location {
    pub fn for_postcode(postcode: &str) -> Self {
        Self {
            postcode: postcode.to_string(),
            lat: None,
            lon: None,
            area_code: None,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum SignalError {
    #[error("source unavailable")]
    Unavailable,
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    Parse(String),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalOrigin {
    Live,
    Fallback,
}

/// A sub-source value tagged with where it came from.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sourced<T> {
    pub value: T,
    pub origin: SignalOrigin,
}

impl<T> Sourced<T> {
    fn live(value: T) -> Self {
        Self {
            value,
            origin: SignalOrigin::Live,
        }
    }

    fn fallback(value: T) -> Self {
        Self {
            value,
            origin: SignalOrigin::Fallback,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparableSale {
    pub price: f64,
    pub months_ago: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceStats {
    pub recent_sales: Vec<ComparableSale>,
    pub median_price: f64,
    pub mean_price: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexPoint {
    pub level: f64,
    pub yoy_change: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanningCounts {
    pub pending: u32,
    pub approved: u32,
    pub refused: u32,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FloodRiskBand {
    VeryLow,
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoiseLevels {
    pub day_db: f64,
    pub night_db: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrimeSummary {
    pub total: u32,
    pub top_categories: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolQuality {
    pub outstanding_share: f64,
    pub good_share: f64,
    pub below_share: f64,
}

/// The full enrichment bundle. Every field is independently sourced and
/// independently tagged.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertySignals {
    pub postcode: String,
    pub price_stats: Sourced<PriceStats>,
    pub house_price_index: Sourced<IndexPoint>,
    pub rent_index: Sourced<IndexPoint>,
    pub planning: Sourced<PlanningCounts>,
    pub flood_risk: Sourced<FloodRiskBand>,
    /// UK DAQI scale, 1..=10.
    pub air_quality_index: Sourced<u32>,
    pub noise: Sourced<NoiseLevels>,
    pub crime: Sourced<CrimeSummary>,
    pub schools: Sourced<SchoolQuality>,
    pub nuisance_complaints: Sourced<u32>,
}

/// One method per sub-source. Live adapters implement the ones they cover;
/// everything defaults to unavailable, which routes through the fallback.
pub trait SignalBackend: Sync {
    fn price_stats(
        &self,
        location: &Location,
    ) -> impl Future<Output = Result<PriceStats, SignalError>> + Send {
        let _ = location;
        async { Err(SignalError::Unavailable) }
    }

    fn house_price_index(
        &self,
        location: &Location,
    ) -> impl Future<Output = Result<IndexPoint, SignalError>> + Send {
        let _ = location;
        async { Err(SignalError::Unavailable) }
    }

    fn rent_index(
        &self,
        location: &Location,
    ) -> impl Future<Output = Result<IndexPoint, SignalError>> + Send {
        let _ = location;
        async { Err(SignalError::Unavailable) }
    }

    fn planning(
        &self,
        location: &Location,
    ) -> impl Future<Output = Result<PlanningCounts, SignalError>> + Send {
        let _ = location;
        async { Err(SignalError::Unavailable) }
    }

    fn flood_risk(
        &self,
        location: &Location,
    ) -> impl Future<Output = Result<FloodRiskBand, SignalError>> + Send {
        let _ = location;
        async { Err(SignalError::Unavailable) }
    }

    fn air_quality_index(
        &self,
        location: &Location,
    ) -> impl Future<Output = Result<u32, SignalError>> + Send {
        let _ = location;
        async { Err(SignalError::Unavailable) }
    }

    fn noise(
        &self,
        location: &Location,
    ) -> impl Future<Output = Result<NoiseLevels, SignalError>> + Send {
        let _ = location;
        async { Err(SignalError::Unavailable) }
    }

    fn crime(
        &self,
        location: &Location,
    ) -> impl Future<Output = Result<CrimeSummary, SignalError>> + Send {
        let _ = location;
        async { Err(SignalError::Unavailable) }
    }

    fn schools(
        &self,
        location: &Location,
    ) -> impl Future<Output = Result<SchoolQuality, SignalError>> + Send {
        let _ = location;
        async { Err(SignalError::Unavailable) }
    }

    fn nuisance_complaints(
        &self,
        location: &Location,
    ) -> impl Future<Output = Result<u32, SignalError>> + Send {
        let _ = location;
        async { Err(SignalError::Unavailable) }
    }
}

/// Backend with no live sources; every signal comes from the synthesizer.
pub struct OfflineBackend;

impl SignalBackend for OfflineBackend {}

/// Fans out all sub-fetches, joins them, and fills failures from the
/// location-seeded synthesizer. Never fails as a whole.
pub async fn fetch_property_signals<B: SignalBackend>(
    backend: &B,
    location: &Location,
) -> PropertySignals {
    let (
        price_stats,
        house_price_index,
        rent_index,
        planning,
        flood_risk,
        air_quality_index,
        noise,
        crime,
        schools,
        nuisance_complaints,
    ) = tokio::join!(
        backend.price_stats(location),
        backend.house_price_index(location),
        backend.rent_index(location),
        backend.planning(location),
        backend.flood_risk(location),
        backend.air_quality_index(location),
        backend.noise(location),
        backend.crime(location),
        backend.schools(location),
        backend.nuisance_complaints(location),
    );

    let synth = Synth::for_location(location);
    PropertySignals {
        postcode: location.postcode.clone(),
        price_stats: resolve(price_stats, || synth.price_stats()),
        house_price_index: resolve(house_price_index, || synth.house_price_index()),
        rent_index: resolve(rent_index, || synth.rent_index()),
        planning: resolve(planning, || synth.planning()),
        flood_risk: resolve(flood_risk, || synth.flood_risk()),
        air_quality_index: resolve(air_quality_index, || synth.air_quality_index()),
        noise: resolve(noise, || synth.noise()),
        crime: resolve(crime, || synth.crime()),
        schools: resolve(schools, || synth.schools()),
        nuisance_complaints: resolve(nuisance_complaints, || synth.nuisance_complaints()),
    }
}

fn resolve<T>(result: Result<T, SignalError>, fallback: impl FnOnce() -> T) -> Sourced<T> {
    match result {
        Ok(value) => Sourced::live(value),
        Err(_) => Sourced::fallback(fallback()),
    }
}

const CRIME_CATEGORIES: [&str; 8] = [
    "anti-social-behaviour",
    "burglary",
    "criminal-damage",
    "drugs",
    "public-order",
    "robbery",
    "vehicle-crime",
    "violence",
];

/// Deterministic synthesizer. Each sub-source draws from its own stream so
/// the values for one source never depend on which other sources failed.
struct Synth {
    base_seed: u64,
}

impl Synth {
    fn for_location(location: &Location) -> Self {
        Self {
            base_seed: location_seed(&location.postcode),
        }
    }

    fn rng(&self, source_tag: u64) -> Rng {
        Rng::new(splitmix64(self.base_seed ^ source_tag))
    }

    fn price_stats(&self) -> PriceStats {
        let mut rng = self.rng(0x01);
        let median = rng.in_range(150_000.0, 650_000.0).round();
        let count = rng.int_in_range(3, 8);
        let mut recent_sales = Vec::with_capacity(count as usize);
        let mut sum = 0.0;
        for _ in 0..count {
            let price = (median * rng.in_range(0.8, 1.2)).round();
            sum += price;
            recent_sales.push(ComparableSale {
                price,
                months_ago: rng.int_in_range(1, 24),
            });
        }
        PriceStats {
            mean_price: (sum / count as f64).round(),
            median_price: median,
            recent_sales,
        }
    }

    fn house_price_index(&self) -> IndexPoint {
        let mut rng = self.rng(0x02);
        IndexPoint {
            level: rng.in_range(95.0, 160.0),
            yoy_change: rng.in_range(-0.05, 0.10),
        }
    }

    fn rent_index(&self) -> IndexPoint {
        let mut rng = self.rng(0x03);
        IndexPoint {
            level: rng.in_range(85.0, 140.0),
            yoy_change: rng.in_range(-0.02, 0.08),
        }
    }

    fn planning(&self) -> PlanningCounts {
        let mut rng = self.rng(0x04);
        PlanningCounts {
            pending: rng.int_in_range(0, 25),
            approved: rng.int_in_range(0, 40),
            refused: rng.int_in_range(0, 10),
        }
    }

    fn flood_risk(&self) -> FloodRiskBand {
        let mut rng = self.rng(0x05);
        // Most postcodes sit in the low bands.
        match rng.int_in_range(0, 9) {
            0..=4 => FloodRiskBand::VeryLow,
            5..=7 => FloodRiskBand::Low,
            8 => FloodRiskBand::Medium,
            _ => FloodRiskBand::High,
        }
    }

    fn air_quality_index(&self) -> u32 {
        let mut rng = self.rng(0x06);
        rng.int_in_range(1, 10)
    }

    fn noise(&self) -> NoiseLevels {
        let mut rng = self.rng(0x07);
        let day_db = rng.in_range(45.0, 75.0);
        NoiseLevels {
            day_db,
            night_db: day_db - rng.in_range(5.0, 15.0),
        }
    }

    fn crime(&self) -> CrimeSummary {
        let mut rng = self.rng(0x08);
        let total = rng.int_in_range(20, 400);
        let first = rng.int_in_range(0, CRIME_CATEGORIES.len() as u32 - 1) as usize;
        let top_categories = (0..3)
            .map(|offset| CRIME_CATEGORIES[(first + offset * 3) % CRIME_CATEGORIES.len()].to_string())
            .collect();
        CrimeSummary {
            total,
            top_categories,
        }
    }

    fn schools(&self) -> SchoolQuality {
        let mut rng = self.rng(0x09);
        let outstanding_share = rng.in_range(0.05, 0.35);
        let good_share = rng.in_range(0.30, 0.60);
        SchoolQuality {
            outstanding_share,
            good_share,
            below_share: 1.0 - outstanding_share - good_share,
        }
    }

    fn nuisance_complaints(&self) -> u32 {
        let mut rng = self.rng(0x0A);
        rng.int_in_range(0, 60)
    }
}

/// Seed derived from the normalized postcode text, so "sw1a 1aa" and
/// "SW1A 1AA" synthesize the same bundle.
fn location_seed(postcode: &str) -> u64 {
    let mut seed = 0xA076_1D64_78BD_642F_u64;
    for byte in postcode.trim().to_uppercase().bytes() {
        if byte == b' ' {
            continue;
        }
        seed = splitmix64(seed ^ byte as u64);
    }
    seed
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

struct Rng {
    state: u64,
}

impl Rng {
    fn new(seed: u64) -> Self {
        let state = if seed == 0 {
            0xA5A5_A5A5_A5A5_A5A5
        } else {
            seed
        };
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    fn next_f64(&mut self) -> f64 {
        const DENOM: f64 = (1_u64 << 53) as f64;
        let v = self.next_u64() >> 11;
        ((v as f64) + 0.5) / DENOM
    }

    fn in_range(&mut self, lo: f64, hi: f64) -> f64 {
        lo + self.next_f64() * (hi - lo)
    }

    fn int_in_range(&mut self, lo: u32, hi: u32) -> u32 {
        lo + (self.next_u64() % (hi - lo + 1) as u64) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct LiveIndexBackend;

    impl SignalBackend for LiveIndexBackend {
        async fn house_price_index(
            &self,
            _location: &Location,
        ) -> Result<IndexPoint, SignalError> {
            Ok(IndexPoint {
                level: 131.4,
                yoy_change: 0.021,
            })
        }

        async fn crime(&self, _location: &Location) -> Result<CrimeSummary, SignalError> {
            Err(SignalError::Transport("connection reset".to_string()))
        }
    }

    fn as_json(signals: &PropertySignals) -> serde_json::Value {
        serde_json::to_value(signals).expect("signals serialize")
    }

    #[tokio::test]
    async fn offline_backend_yields_complete_fallback_bundle() {
        let location = Location::for_postcode("SW1A 1AA");
        let signals = fetch_property_signals(&OfflineBackend, &location).await;

        for origin in [
            signals.price_stats.origin,
            signals.house_price_index.origin,
            signals.rent_index.origin,
            signals.planning.origin,
            signals.flood_risk.origin,
            signals.air_quality_index.origin,
            signals.noise.origin,
            signals.crime.origin,
            signals.schools.origin,
            signals.nuisance_complaints.origin,
        ] {
            assert_eq!(origin, SignalOrigin::Fallback);
        }

        assert!(!signals.price_stats.value.recent_sales.is_empty());
        assert!((1..=10).contains(&signals.air_quality_index.value));
        assert_eq!(signals.crime.value.top_categories.len(), 3);
        let schools = &signals.schools.value;
        let total = schools.outstanding_share + schools.good_share + schools.below_share;
        assert!((total - 1.0).abs() < 1e-9);
        assert!(signals.noise.value.night_db < signals.noise.value.day_db);
    }

    #[tokio::test]
    async fn fallback_bundle_is_deterministic_per_location() {
        let location = Location::for_postcode("M1 1AE");
        let first = fetch_property_signals(&OfflineBackend, &location).await;
        let second = fetch_property_signals(&OfflineBackend, &location).await;
        assert_eq!(as_json(&first), as_json(&second));

        // Normalization: case and spacing do not change the seed.
        let shouty = fetch_property_signals(&OfflineBackend, &Location::for_postcode("m11ae")).await;
        assert_eq!(
            as_json(&first)["priceStats"],
            as_json(&shouty)["priceStats"]
        );
    }

    #[tokio::test]
    async fn distinct_locations_synthesize_distinct_bundles() {
        let a = fetch_property_signals(&OfflineBackend, &Location::for_postcode("SW1A 1AA")).await;
        let b = fetch_property_signals(&OfflineBackend, &Location::for_postcode("LS1 4AP")).await;
        assert_ne!(as_json(&a)["priceStats"], as_json(&b)["priceStats"]);
    }

    #[tokio::test]
    async fn partial_failure_mixes_live_and_fallback() {
        let location = Location::for_postcode("EC1A 1BB");
        let signals = fetch_property_signals(&LiveIndexBackend, &location).await;

        assert_eq!(signals.house_price_index.origin, SignalOrigin::Live);
        assert_eq!(signals.house_price_index.value.level, 131.4);
        // Transport failure on crime degrades to a fallback, not an error.
        assert_eq!(signals.crime.origin, SignalOrigin::Fallback);
        // Sources the backend does not cover also fall back.
        assert_eq!(signals.rent_index.origin, SignalOrigin::Fallback);

        // The crime fallback matches what a fully-offline fetch produces:
        // one source's failure never perturbs another stream.
        let offline = fetch_property_signals(&OfflineBackend, &location).await;
        assert_eq!(as_json(&signals)["crime"], as_json(&offline)["crime"]);
    }
}
