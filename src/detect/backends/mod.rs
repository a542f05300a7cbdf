pub mod fixture;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use fixture::FixtureEstimator;

#[cfg(feature = "backend-tract")]
pub use tract::TractEstimator;
