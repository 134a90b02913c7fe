//! Pipeline execution implementation.

use super::config::DetectionConfig;
use super::result::{DetectionResult, DetectionStats};
use crate::core::align::{align, Interpolation};
use crate::core::backend::Backend;
use crate::core::difference::{difference_map, DiffReduction};
use crate::core::geometry::SelectionRect;
use crate::core::loader::{load_pair, ImageSource};
use crate::core::raster::RasterImage;
use crate::core::regions::boxes_from_contours;
use crate::core::threshold::{binarize, clean, Sensitivity, FOREGROUND};
use crate::error::{Result, SpotDiffError};
use crate::events::{
    null_sender, Event, EventSender, PipelineEvent, PipelineStage, PipelineSummary, StageEvent,
};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Builder for pipeline configuration
pub struct DiffPipelineBuilder {
    config: DetectionConfig,
    backend: Option<Backend>,
}

impl DiffPipelineBuilder {
    pub fn new() -> Self {
        Self {
            config: DetectionConfig::default(),
            backend: None,
        }
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: DetectionConfig) -> Self {
        self.config = config;
        self
    }

    /// Keypoint budget per photo
    pub fn max_features(mut self, max_features: usize) -> Self {
        self.config.align.orb.max_features = max_features;
        self
    }

    pub fn max_good_matches(mut self, max_good_matches: usize) -> Self {
        self.config.align.max_good_matches = max_good_matches;
        self
    }

    /// RANSAC inlier tolerance in pixels
    pub fn reprojection_threshold(mut self, threshold: f64) -> Self {
        self.config.align.ransac.reprojection_threshold = threshold;
        self
    }

    /// RANSAC seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.align.ransac.seed = seed;
        self
    }

    pub fn interpolation(mut self, interpolation: Interpolation) -> Self {
        self.config.align.interpolation = interpolation;
        self
    }

    pub fn reduction(mut self, reduction: DiffReduction) -> Self {
        self.config.reduction = reduction;
        self
    }

    /// Structuring element side for open/close
    pub fn kernel_size(mut self, kernel_size: u8) -> Self {
        self.config.kernel_size = kernel_size;
        self
    }

    /// Noise floor for reported rectangles
    pub fn min_region_size(mut self, min_region_size: u32) -> Self {
        self.config.min_region_size = min_region_size;
        self
    }

    /// Use these capabilities instead of the native ones
    pub fn backend(mut self, backend: Backend) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Validate the settings and build the pipeline
    pub fn build(self) -> Result<DiffPipeline> {
        self.config.validate()?;
        let backend = self
            .backend
            .unwrap_or_else(|| Backend::native(&self.config.align));

        Ok(DiffPipeline {
            config: self.config,
            backend,
        })
    }
}

impl Default for DiffPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The difference detection pipeline.
///
/// Holds only configuration; every buffer lives inside a single call, so
/// one pipeline can serve concurrent comparisons.
#[derive(Debug)]
pub struct DiffPipeline {
    config: DetectionConfig,
    backend: Backend,
}

impl DiffPipeline {
    pub fn builder() -> DiffPipelineBuilder {
        DiffPipelineBuilder::new()
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Compare two encoded photos without events
    pub fn detect(
        &self,
        image1: &ImageSource,
        image2: &ImageSource,
        selection: SelectionRect,
        sensitivity: Sensitivity,
    ) -> Result<DetectionResult> {
        self.detect_with_events(image1, image2, selection, sensitivity, &null_sender())
    }

    /// Compare two encoded photos with event reporting
    pub fn detect_with_events(
        &self,
        image1: &ImageSource,
        image2: &ImageSource,
        selection: SelectionRect,
        sensitivity: Sensitivity,
        events: &EventSender,
    ) -> Result<DetectionResult> {
        let start = Instant::now();
        events.send(Event::Pipeline(PipelineEvent::Started));

        let result = self
            .load(image1, image2, events)
            .and_then(|(reference, moving)| {
                self.compare(&reference, &moving, selection, sensitivity, events, start)
            });

        self.finish(result, events)
    }

    /// Compare two already-decoded photos without events
    pub fn detect_rasters(
        &self,
        image1: &RasterImage,
        image2: &RasterImage,
        selection: SelectionRect,
        sensitivity: Sensitivity,
    ) -> Result<DetectionResult> {
        self.detect_rasters_with_events(image1, image2, selection, sensitivity, &null_sender())
    }

    /// Compare two already-decoded photos with event reporting
    pub fn detect_rasters_with_events(
        &self,
        image1: &RasterImage,
        image2: &RasterImage,
        selection: SelectionRect,
        sensitivity: Sensitivity,
        events: &EventSender,
    ) -> Result<DetectionResult> {
        let start = Instant::now();
        events.send(Event::Pipeline(PipelineEvent::Started));

        let result = self.compare(image1, image2, selection, sensitivity, events, start);
        self.finish(result, events)
    }

    fn load(
        &self,
        image1: &ImageSource,
        image2: &ImageSource,
        events: &EventSender,
    ) -> Result<(RasterImage, RasterImage)> {
        enter(events, PipelineStage::Loading);
        let (reference, moving) = load_pair(image1, image2)?;

        events.send(Event::Stage(StageEvent::Loaded {
            width: reference.width(),
            height: reference.height(),
            second_width: moving.width(),
            second_height: moving.height(),
        }));
        Ok((reference, moving))
    }

    fn compare(
        &self,
        reference: &RasterImage,
        moving: &RasterImage,
        selection: SelectionRect,
        sensitivity: Sensitivity,
        events: &EventSender,
        start: Instant,
    ) -> Result<DetectionResult> {
        let (width, height) = reference.dimensions();
        let region = selection
            .clamp_to(width, height)
            .ok_or(SpotDiffError::InvalidRegion { selection })?;
        debug!(?region, %selection, "selection clamped");

        // Stage 2: Align
        enter(events, PipelineStage::Aligning);
        let alignment = align(
            reference,
            moving,
            &self.backend,
            self.config.align.max_good_matches,
        )?;
        events.send(Event::Stage(StageEvent::Aligned {
            keypoints: alignment.summary.reference_keypoints,
            second_keypoints: alignment.summary.moving_keypoints,
            good_matches: alignment.summary.good_matches,
            inliers: alignment.summary.inliers,
        }));

        // Stage 3: Difference
        enter(events, PipelineStage::Differencing);
        let diff = difference_map(reference, &alignment.warped, region, self.config.reduction);
        events.send(Event::Stage(StageEvent::Differenced {
            width: region.width,
            height: region.height,
            peak: diff.peak(),
        }));

        // Stage 4: Threshold and clean
        enter(events, PipelineStage::Cleaning);
        let threshold = sensitivity.threshold();
        let mask = binarize(&diff.intensity, threshold);
        let cleaned = clean(&mask, self.backend.morphology.as_ref(), self.config.kernel_size);
        let foreground_pixels = cleaned.pixels().filter(|p| p[0] == FOREGROUND).count();
        debug!(threshold, foreground_pixels, "mask cleaned");
        events.send(Event::Stage(StageEvent::Cleaned {
            threshold,
            foreground_pixels,
        }));

        // Stage 5: Extract
        enter(events, PipelineStage::Extracting);
        let contours = self.backend.contours.external_contours(&cleaned);
        let diffs = boxes_from_contours(&contours, region, self.config.min_region_size);
        debug!(contours = contours.len(), regions = diffs.len(), "regions extracted");
        events.send(Event::Stage(StageEvent::Extracted {
            regions: diffs.len(),
        }));

        Ok(DetectionResult {
            diffs,
            stats: DetectionStats {
                image_width: width,
                image_height: height,
                region,
                alignment: alignment.summary,
                threshold,
                foreground_pixels,
                contours: contours.len(),
                duration_ms: start.elapsed().as_millis() as u64,
            },
        })
    }

    /// Emit the terminal event for a run.
    fn finish(
        &self,
        result: Result<DetectionResult>,
        events: &EventSender,
    ) -> Result<DetectionResult> {
        match &result {
            Ok(detection) => {
                info!(
                    regions = detection.diffs.len(),
                    duration_ms = detection.stats.duration_ms,
                    "comparison complete"
                );
                events.send(Event::Pipeline(PipelineEvent::Completed {
                    summary: PipelineSummary {
                        regions: detection.diffs.len(),
                        inliers: detection.stats.alignment.inliers,
                        duration_ms: detection.stats.duration_ms,
                    },
                }));
            }
            Err(error) => {
                if matches!(error, SpotDiffError::Alignment(_)) {
                    warn!(%error, "alignment failed, no differences reported");
                } else {
                    debug!(%error, "comparison failed");
                }
                events.send(Event::Pipeline(PipelineEvent::Failed {
                    message: error.to_string(),
                }));
            }
        }
        result
    }
}

fn enter(events: &EventSender, stage: PipelineStage) {
    debug!(%stage, "entering stage");
    events.send(Event::Pipeline(PipelineEvent::StageChanged { stage }));
}
