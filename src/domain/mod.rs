// Domain layer - Readings, samples and air-quality derivation
pub mod air_quality;
pub mod reading;
