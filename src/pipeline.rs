//! Derived-image pipeline.
//!
//! Turns (photo, spec name) into encoded bytes:
//!
//! ```text
//! resolve spec ─► cache hit? ──yes──► count ─► cached bytes
//!                     │ no
//!                     ▼
//!   load original ─► decode ─► stage 0 ─► stage 1 ─► … ─► encode ─► publish ─► count
//! ```
//!
//! Each stage consumes the previous stage's output; the decoded original is
//! never modified in place. Stages that would not change the image (a fit
//! resize on an already-small photo, identity factors, a zero-size
//! reflection) are skipped. Any failure aborts the whole render: nothing is
//! published and no counter moves.
//!
//! Counting happens once per successful resolution of a spec with
//! `increment_count`, whether the bytes came from the cache or were
//! rendered.
//!
//! ## Pre-warming
//!
//! [`Pipeline::prewarm`] renders every `pre_cache` spec for a photo without
//! counting. [`Pipeline::prewarm_all`] fans that out over a rayon pool;
//! failures are logged and reported, never fatal.

use crate::cache::{CacheKey, DerivedCache};
use crate::catalog::{Catalog, CatalogError};
use crate::imaging::calculations::{plan_crop, plan_resize, reflection_height};
use crate::imaging::{BackendError, Dimensions, GeometryError, ImageBackend, OutputFormat, ResizePlan};
use crate::specs::{ImageSpec, SpecRegistry, Stage};
use crate::types::{CropAnchor, Photo};
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, warn};

/// Why a single stage failed.
#[derive(Error, Debug)]
pub enum StageFailure {
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("unknown image specification '{0}'")]
    UnknownSpec(String),
    #[error("stage {index} ({stage}) failed: {cause}")]
    Stage {
        stage: &'static str,
        index: usize,
        #[source]
        cause: StageFailure,
    },
    #[error("failed to decode original: {0}")]
    Decode(#[source] BackendError),
    #[error("failed to encode result: {0}")]
    Encode(#[source] BackendError),
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("cache IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where a derived image's bytes came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// Served from a stored entry.
    Hit,
    /// Rendered and published to the cache.
    Stored,
    /// Rendered for a spec with `cache = false`.
    Uncached,
}

/// A rendered (or cached) variant of a photo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedImage {
    pub spec: String,
    pub access_as: String,
    pub format: OutputFormat,
    pub dimensions: Dimensions,
    pub bytes: Vec<u8>,
    pub cache: CacheOutcome,
}

/// Outcome of pre-warming one photo.
#[derive(Debug)]
pub struct PrewarmReport {
    pub photo: String,
    pub rendered: Vec<String>,
    pub failed: Vec<(String, PipelineError)>,
}

/// Borrowed collaborators for rendering. Cheap to construct per request.
pub struct Pipeline<'a, B: ImageBackend, C: Catalog> {
    registry: &'a SpecRegistry,
    backend: &'a B,
    catalog: &'a C,
    cache: &'a DerivedCache,
}

impl<'a, B: ImageBackend, C: Catalog> Pipeline<'a, B, C> {
    pub fn new(
        registry: &'a SpecRegistry,
        backend: &'a B,
        catalog: &'a C,
        cache: &'a DerivedCache,
    ) -> Self {
        Self {
            registry,
            backend,
            catalog,
            cache,
        }
    }

    fn resolve(&self, spec_name: &str) -> Result<&'a ImageSpec, PipelineError> {
        self.registry
            .resolve(spec_name)
            .map_err(|_| PipelineError::UnknownSpec(spec_name.to_string()))
    }

    /// Resolve `spec_name` for `photo`, counting the access when the spec
    /// asks for it.
    pub fn render(&self, photo: &Photo, spec_name: &str) -> Result<DerivedImage, PipelineError> {
        let spec = self.resolve(spec_name)?;
        let derived = self.produce(photo, spec)?;
        if spec.increment_count {
            let count = self.catalog.increment_view_count(&photo.slug)?;
            debug!(photo = %photo.slug, spec = %spec.name, count, "view counted");
        }
        Ok(derived)
    }

    /// Cache-relative path of `photo` rendered with `spec_name`.
    pub fn url_key(&self, photo: &Photo, spec_name: &str) -> Result<String, PipelineError> {
        let spec = self.resolve(spec_name)?;
        Ok(CacheKey::new(photo, spec).url_key())
    }

    /// Render every `pre_cache` spec for `photo` without counting.
    pub fn prewarm(&self, photo: &Photo) -> PrewarmReport {
        let mut report = PrewarmReport {
            photo: photo.slug.clone(),
            rendered: Vec::new(),
            failed: Vec::new(),
        };
        for spec in self.registry.pre_cache_specs() {
            match self.produce(photo, spec) {
                Ok(_) => report.rendered.push(spec.name.clone()),
                Err(e) => {
                    warn!(photo = %photo.slug, spec = %spec.name, error = %e, "pre-warm failed");
                    report.failed.push((spec.name.clone(), e));
                }
            }
        }
        report
    }

    /// Pre-warm many photos in parallel on the current rayon pool.
    pub fn prewarm_all(&self, photos: &[Photo]) -> Vec<PrewarmReport> {
        photos.par_iter().map(|photo| self.prewarm(photo)).collect()
    }

    /// Remove every derived image of `photo` from the cache.
    pub fn purge(&self, photo: &Photo) -> Result<usize, PipelineError> {
        Ok(self.cache.purge(&photo.slug)?)
    }

    /// Cache lookup, or render + publish. Never counts.
    fn produce(&self, photo: &Photo, spec: &ImageSpec) -> Result<DerivedImage, PipelineError> {
        let key = CacheKey::new(photo, spec);
        let derived = |bytes: Vec<u8>, dimensions: Dimensions, cache: CacheOutcome| DerivedImage {
            spec: spec.name.clone(),
            access_as: spec.access_as.clone(),
            format: spec.format,
            dimensions,
            bytes,
            cache,
        };

        if spec.cache {
            if let Some(bytes) = self.cache.load(&key)? {
                match self.backend.probe(&bytes) {
                    Ok(dimensions) => {
                        self.cache.stats().hit();
                        debug!(photo = %photo.slug, spec = %spec.name, "cache hit");
                        return Ok(derived(bytes, dimensions, CacheOutcome::Hit));
                    }
                    // Unreadable entry: fall through and render over it
                    Err(e) => warn!(path = %self.cache.path(&key).display(), error = %e, "discarding unreadable cache entry"),
                }
            }
            self.cache.stats().miss();
        }

        let (bytes, dimensions) = self.render_stages(photo, spec)?;
        if spec.cache {
            self.cache.store(&key, &bytes)?;
            debug!(photo = %photo.slug, spec = %spec.name, key = %key.url_key(), "cache stored");
            Ok(derived(bytes, dimensions, CacheOutcome::Stored))
        } else {
            Ok(derived(bytes, dimensions, CacheOutcome::Uncached))
        }
    }

    fn render_stages(&self, photo: &Photo, spec: &ImageSpec) -> Result<(Vec<u8>, Dimensions), PipelineError> {
        let original = self.catalog.read_original(photo)?;
        let mut image = self
            .backend
            .decode(&original)
            .map_err(PipelineError::Decode)?;

        for (index, stage) in spec.stages.iter().enumerate() {
            let next = self
                .apply(&image, stage, photo.crop)
                .map_err(|cause| PipelineError::Stage {
                    stage: stage.name(),
                    index,
                    cause,
                })?;
            if let Some(next) = next {
                image = next;
            }
        }

        let dimensions = self.backend.dimensions(&image);
        let bytes = self
            .backend
            .encode(&image, spec.format, spec.quality)
            .map_err(PipelineError::Encode)?;
        Ok((bytes, dimensions))
    }

    /// Apply one stage. `Ok(None)` means the stage leaves the image as it is.
    fn apply(
        &self,
        image: &B::Image,
        stage: &Stage,
        anchor: CropAnchor,
    ) -> Result<Option<B::Image>, StageFailure> {
        let backend = self.backend;
        let source = backend.dimensions(image);
        let next = match stage {
            Stage::Resize(resize) => match plan_resize(source, resize, anchor)? {
                ResizePlan::Unchanged => None,
                ResizePlan::Scale { width, height } => Some(backend.resize(image, width, height)?),
                ResizePlan::Fill {
                    width,
                    height,
                    crop,
                } => {
                    let filled = backend.resize(image, width, height)?;
                    Some(backend.crop(&filled, crop)?)
                }
            },
            Stage::Crop(crop) => match plan_crop(source, crop, anchor)? {
                Some(region) => Some(backend.crop(image, region)?),
                None => None,
            },
            Stage::Adjust(adjustment) if adjustment.is_identity() => None,
            Stage::Adjust(adjustment) => Some(backend.adjust(image, adjustment)?),
            Stage::Reflect(reflection) if reflection_height(source.height, reflection.size) == 0 => None,
            Stage::Reflect(reflection) => Some(backend.reflect(image, reflection)?),
            Stage::Transpose { method } => Some(backend.transpose(image, *method)?),
        };
        Ok(next)
    }
}
