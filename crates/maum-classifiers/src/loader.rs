//! Model loading and caching.
//!
//! The loader is the only component with filesystem side effects: it places
//! fine-tuned weights at a deterministic path named by model name under its
//! cache directory, fetching from the weight source when absent. Loaded
//! models live in an in-memory map for the process lifetime, a memoizing
//! cache with no eviction. First-time loads of the same descriptor are
//! single-flighted through a per-name cell so concurrent requests never
//! duplicate a download.

use crate::acoustic_cnn::SpectrogramCnnClassifier;
use crate::acoustic_transform::AcousticTransformClassifier;
use crate::catalog::{ModelDescriptor, WeightSource};
use crate::model_config::{ArchitectureKind, DeviceSpec};
use crate::predictor::EmotionPredictor;
use crate::text_encoder::TextEmotionClassifier;
use candle_core::Device;
use hf_hub::{api::sync::Api, Repo, RepoType};
use maum_core::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};

type SharedPredictor = Arc<dyn EmotionPredictor>;

/// Process-lifetime model cache and weight fetcher.
///
/// Owned by a long-lived service object; tests inject a fresh instance (or
/// pre-seed it via [`ModelLoader::insert`]) instead of relying on ambient
/// global state.
pub struct ModelLoader {
    device: Device,
    cache_dir: PathBuf,
    cache: Mutex<HashMap<String, Arc<OnceCell<SharedPredictor>>>>,
}

impl ModelLoader {
    /// Create a loader with the default cache directory
    /// (`~/.cache/maum/models`).
    pub fn new(device: DeviceSpec) -> Result<Self> {
        let cache_dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".cache/maum/models");
        Self::with_cache_dir(device, cache_dir)
    }

    /// Create a loader with an explicit cache directory.
    pub fn with_cache_dir(device: DeviceSpec, cache_dir: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            device: resolve_device(device)?,
            cache_dir: cache_dir.into(),
            cache: Mutex::new(HashMap::new()),
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Seed the cache directly. Used by tests and by embedders that build
    /// predictors out of band.
    pub async fn insert(&self, name: impl Into<String>, predictor: SharedPredictor) {
        let mut cache = self.cache.lock().await;
        cache.insert(
            name.into(),
            Arc::new(OnceCell::new_with(Some(predictor))),
        );
    }

    /// Whether a model is already resident.
    pub async fn is_loaded(&self, name: &str) -> bool {
        let cache = self.cache.lock().await;
        cache.get(name).map(|cell| cell.initialized()).unwrap_or(false)
    }

    /// Resolve a descriptor into a ready-to-run predictor.
    ///
    /// Cache hits are lock-free after the map lookup; misses build the
    /// model on the blocking pool. A failed build leaves the cell empty, so
    /// a later request retries the load.
    pub async fn load(&self, descriptor: &ModelDescriptor) -> Result<SharedPredictor> {
        let cell = {
            let mut cache = self.cache.lock().await;
            cache
                .entry(descriptor.name.clone())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let predictor = cell
            .get_or_try_init(|| {
                let descriptor = descriptor.clone();
                let device = self.device.clone();
                let cache_dir = self.cache_dir.clone();
                async move {
                    let name = descriptor.name.clone();
                    tokio::task::spawn_blocking(move || {
                        build_predictor(&descriptor, &device, &cache_dir)
                    })
                    .await
                    .map_err(|e| {
                        Error::model_unavailable(name, format!("load task failed: {e}"))
                    })?
                }
            })
            .await?;

        Ok(predictor.clone())
    }
}

/// Turn a descriptor into a loaded, inference-ready predictor.
fn build_predictor(
    descriptor: &ModelDescriptor,
    device: &Device,
    cache_dir: &Path,
) -> Result<SharedPredictor> {
    let weights_path = ensure_weights(descriptor, cache_dir).map_err(|e| {
        tracing::warn!(model = %descriptor.name, error = %e, "weight fetch failed");
        e
    })?;

    match descriptor.architecture {
        ArchitectureKind::TextEncoder => {
            let base = base_repo(descriptor)?;
            let tokenizer_path = fetch_base_file(&descriptor.name, base, "tokenizer.json")?;
            let config_path = fetch_base_file(&descriptor.name, base, "config.json")?;
            Ok(Arc::new(TextEmotionClassifier::load(
                descriptor,
                device,
                &tokenizer_path,
                &config_path,
                &weights_path,
            )?))
        }
        ArchitectureKind::AcousticTransform => {
            let base = base_repo(descriptor)?;
            let config_path = fetch_base_file(&descriptor.name, base, "config.json")?;
            Ok(Arc::new(AcousticTransformClassifier::load(
                descriptor,
                device,
                &config_path,
                &weights_path,
            )?))
        }
        ArchitectureKind::SpectrogramCnn => Ok(Arc::new(SpectrogramCnnClassifier::load(
            descriptor,
            device,
            &weights_path,
        )?)),
    }
}

fn base_repo(descriptor: &ModelDescriptor) -> Result<&str> {
    descriptor.base.as_deref().ok_or_else(|| {
        Error::model_unavailable(
            descriptor.name.clone(),
            "descriptor has no pretrained base reference",
        )
    })
}

/// Ensure the fine-tuned weight file exists at
/// `<cache_dir>/<name>.safetensors`, fetching it when absent.
///
/// Idempotent: a second call with the file present is a no-op.
pub(crate) fn ensure_weights(descriptor: &ModelDescriptor, cache_dir: &Path) -> Result<PathBuf> {
    let dest = cache_dir.join(format!("{}.safetensors", descriptor.name));
    if dest.exists() {
        return Ok(dest);
    }

    std::fs::create_dir_all(cache_dir)?;

    match &descriptor.weights {
        WeightSource::Local { path } => {
            if !path.exists() {
                return Err(Error::model_unavailable(
                    descriptor.name.clone(),
                    format!("weight file not found: {}", path.display()),
                ));
            }
            std::fs::copy(path, &dest)?;
        }
        WeightSource::HuggingFace {
            repo,
            filename,
            revision,
        } => {
            tracing::debug!(model = %descriptor.name, repo = %repo, "fetching weights");
            let api = Api::new().map_err(|e| {
                Error::model_unavailable(
                    descriptor.name.clone(),
                    format!("failed to initialize hub api: {e}"),
                )
            })?;
            let repo = api.repo(Repo::with_revision(
                repo.clone(),
                RepoType::Model,
                revision.clone(),
            ));
            let fetched = repo.get(filename).map_err(|e| {
                Error::model_unavailable(
                    descriptor.name.clone(),
                    format!("weight fetch failed: {e}"),
                )
            })?;
            std::fs::copy(&fetched, &dest)?;
        }
    }

    tracing::info!(model = %descriptor.name, path = %dest.display(), "weights cached");
    Ok(dest)
}

/// Fetch a base-repo artifact (tokenizer, config) through the hub cache.
fn fetch_base_file(model_name: &str, repo: &str, filename: &str) -> Result<PathBuf> {
    let api = Api::new().map_err(|e| {
        Error::model_unavailable(
            model_name.to_string(),
            format!("failed to initialize hub api: {e}"),
        )
    })?;
    api.repo(Repo::model(repo.to_string()))
        .get(filename)
        .map_err(|e| {
            Error::model_unavailable(
                model_name.to_string(),
                format!("failed to fetch {filename} from {repo}: {e}"),
            )
        })
}

fn resolve_device(spec: DeviceSpec) -> Result<Device> {
    match spec {
        DeviceSpec::Cpu => Ok(Device::Cpu),
        DeviceSpec::Cuda => Device::new_cuda(0)
            .map_err(|e| Error::config(format!("failed to initialize cuda device: {e}"))),
        DeviceSpec::Metal => Device::new_metal(0)
            .map_err(|e| Error::config(format!("failed to initialize metal device: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ModelCatalog;
    use crate::predictor::{ModelInput, Prediction};
    use async_trait::async_trait;
    use maum_core::Modality;

    struct StaticPredictor {
        name: String,
    }

    #[async_trait]
    impl EmotionPredictor for StaticPredictor {
        async fn predict(&self, _input: ModelInput<'_>) -> Result<Prediction> {
            Ok(Prediction::new("중립", 0.5))
        }

        fn name(&self) -> &str {
            &self.name
        }

        fn modality(&self) -> Modality {
            Modality::Text
        }
    }

    fn local_descriptor(name: &str, weights: &Path) -> ModelDescriptor {
        let mut descriptor = ModelCatalog::builtin().get("kcbert").unwrap().clone();
        descriptor.name = name.to_string();
        descriptor.weights = WeightSource::Local {
            path: weights.to_path_buf(),
        };
        descriptor
    }

    #[tokio::test]
    async fn test_seeded_cache_is_returned_without_fetching() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ModelLoader::with_cache_dir(DeviceSpec::Cpu, dir.path()).unwrap();

        loader
            .insert(
                "kcbert_test",
                Arc::new(StaticPredictor {
                    name: "kcbert_test".to_string(),
                }),
            )
            .await;

        // Weight source points nowhere; a cache hit must not touch it.
        let descriptor = local_descriptor("kcbert_test", Path::new("/no/such/weights"));
        let a = loader.load(&descriptor).await.unwrap();
        let b = loader.load(&descriptor).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(loader.is_loaded("kcbert_test").await);
    }

    #[tokio::test]
    async fn test_missing_local_weights_is_model_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ModelLoader::with_cache_dir(DeviceSpec::Cpu, dir.path()).unwrap();

        let descriptor = local_descriptor("ghost", Path::new("/no/such/weights"));
        // `load` returns `Arc<dyn EmotionPredictor>` on the Ok side, which is
        // not `Debug`; `.err().unwrap()` extracts the error without that bound.
        let err = loader.load(&descriptor).await.err().unwrap();
        assert!(matches!(err, Error::ModelUnavailable { .. }));
        assert!(!loader.is_loaded("ghost").await);
    }

    #[tokio::test]
    async fn test_failed_load_is_retried_not_poisoned() {
        let dir = tempfile::tempdir().unwrap();
        let loader = ModelLoader::with_cache_dir(DeviceSpec::Cpu, dir.path()).unwrap();

        let descriptor = local_descriptor("flaky", Path::new("/no/such/weights"));
        assert!(loader.load(&descriptor).await.is_err());

        // After a failure the cell stays empty; a seeded predictor can
        // still take the slot on the retry path.
        loader
            .insert(
                "flaky",
                Arc::new(StaticPredictor {
                    name: "flaky".to_string(),
                }),
            )
            .await;
        assert!(loader.load(&descriptor).await.is_ok());
    }

    #[test]
    fn test_ensure_weights_copies_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.safetensors");
        std::fs::write(&source, b"weights").unwrap();

        let cache_dir = dir.path().join("cache");
        let descriptor = local_descriptor("copied", &source);

        let dest = ensure_weights(&descriptor, &cache_dir).unwrap();
        assert_eq!(dest, cache_dir.join("copied.safetensors"));
        assert!(dest.exists());

        // Second call with the file present is a no-op.
        let again = ensure_weights(&descriptor, &cache_dir).unwrap();
        assert_eq!(dest, again);
        assert_eq!(std::fs::read(&dest).unwrap(), b"weights");
    }
}
