use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use image::DynamicImage;

use crate::pose::Pose;

use super::backend::{EstimatorConfig, PoseEstimator};

/// Thread-safe registry of pose estimators.
///
/// Estimators are wrapped in `Mutex` because `PoseEstimator::estimate` takes `&mut self`.
pub struct EstimatorRegistry {
    estimators: HashMap<String, Arc<Mutex<dyn PoseEstimator>>>,
    default_name: Option<String>,
}

impl EstimatorRegistry {
    pub fn new() -> Self {
        Self {
            estimators: HashMap::new(),
            default_name: None,
        }
    }

    /// Register an estimator. The first registered estimator becomes the default.
    pub fn register<E: PoseEstimator + 'static>(&mut self, estimator: E) {
        let name = estimator.name().to_string();
        if self.default_name.is_none() {
            self.default_name = Some(name.clone());
        }
        self.estimators
            .insert(name, Arc::new(Mutex::new(estimator)));
    }

    /// Set default estimator by name.
    pub fn set_default(&mut self, name: &str) -> Result<()> {
        if !self.estimators.contains_key(name) {
            return Err(anyhow!("estimator '{}' not registered", name));
        }
        self.default_name = Some(name.to_string());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<Mutex<dyn PoseEstimator>>> {
        self.estimators.get(name).cloned()
    }

    pub fn default_estimator(&self) -> Option<Arc<Mutex<dyn PoseEstimator>>> {
        self.default_name.as_ref().and_then(|name| self.get(name))
    }

    /// List registered estimators, sorted by name.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.estimators.keys().cloned().collect();
        names.sort();
        names
    }

    /// Run the default estimator.
    pub fn estimate(&self, image: &DynamicImage, config: &EstimatorConfig) -> Result<Vec<Pose>> {
        let estimator = self
            .default_estimator()
            .ok_or_else(|| anyhow!("no pose estimator registered"))?;
        let mut guard = estimator
            .lock()
            .map_err(|_| anyhow!("estimator lock poisoned"))?;
        log::debug!("running pose estimator '{}'", guard.name());
        guard.estimate(image, config)
    }
}

impl Default for EstimatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::FixtureEstimator;

    struct FailingEstimator;

    impl PoseEstimator for FailingEstimator {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn estimate(&mut self, _image: &DynamicImage, _config: &EstimatorConfig) -> Result<Vec<Pose>> {
            Err(anyhow!("model load rejected"))
        }
    }

    #[test]
    fn first_registered_is_default() -> Result<()> {
        let mut registry = EstimatorRegistry::new();
        registry.register(FixtureEstimator::new(Vec::new()));
        registry.register(FailingEstimator);

        assert_eq!(registry.list(), vec!["failing", "fixture"]);
        let image = DynamicImage::new_rgb8(4, 4);
        let poses = registry.estimate(&image, &EstimatorConfig::default())?;
        assert!(poses.is_empty());

        registry.set_default("failing")?;
        assert!(registry
            .estimate(&image, &EstimatorConfig::default())
            .is_err());
        Ok(())
    }

    #[test]
    fn empty_registry_and_unknown_names_error() {
        let mut registry = EstimatorRegistry::default();
        let image = DynamicImage::new_rgb8(2, 2);
        assert!(registry
            .estimate(&image, &EstimatorConfig::default())
            .is_err());
        assert!(registry.set_default("tract").is_err());
    }
}
