//! Card field recognition pipeline.
//!
//! Ties the stages together: normalize the frame, crop and enhance the
//! field regions, run every engine profile over each crop, canonicalize
//! the readings and keep the best. Alternative region layouts are only
//! attempted when the first layout comes back empty-handed.

pub mod canonicalize;
pub mod engine;
pub mod normalize;
pub mod regions;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::RgbImage;
use tracing::{debug, warn};

use crate::config::PipelineConfig;

pub use engine::{ProfileReading, TextEngine, TextRecognizer};
pub use regions::{Field, FieldCrops, RegionLayout, REGION_LAYOUTS};

#[cfg(test)]
use engine::EngineProfile;
#[cfg(test)]
use image::GrayImage;
#[cfg(test)]
use parking_lot::Mutex;
#[cfg(test)]
use std::collections::VecDeque;

/// One recognition attempt under a single region layout.
#[derive(Debug, Clone)]
pub struct AttemptResult {
    /// Label of the region layout this attempt used.
    pub layout: &'static str,
    pub name: String,
    pub ethnicity: String,
    /// Set only when every recognition pass of the attempt failed.
    pub error: Option<String>,
}

impl AttemptResult {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }

    /// True when the attempt ran but neither field yielded text.
    pub fn is_total_miss(&self) -> bool {
        self.name.is_empty() && self.ethnicity.is_empty()
    }
}

/// Pick the attempt worth reporting: a complete read beats a partial
/// one, a partial read beats an empty one, and an empty read beats a
/// failure. Within a tier the earliest attempt wins.
pub fn select_best_attempt(attempts: &[AttemptResult]) -> Option<AttemptResult> {
    let successful = || attempts.iter().filter(|a| a.succeeded());
    successful()
        .find(|a| !a.name.is_empty() && !a.ethnicity.is_empty())
        .or_else(|| successful().find(|a| !a.name.is_empty() || !a.ethnicity.is_empty()))
        .or_else(|| successful().next())
        .or_else(|| attempts.first())
        .cloned()
}

/// Canonicalize every successful reading of a field and keep the longest
/// result; the earliest reading wins ties.
fn select_field_text(readings: &[ProfileReading], field: Field) -> String {
    let mut best = String::new();
    for reading in readings {
        if let Ok(raw) = &reading.outcome {
            let cleaned = match field {
                Field::Name => canonicalize::canonicalize_name(raw),
                Field::Ethnicity => canonicalize::canonicalize_ethnicity(raw),
            };
            if cleaned.chars().count() > best.chars().count() {
                best = cleaned;
            }
        }
    }
    best
}

/// End-to-end recognizer for single card photographs.
pub struct CardPipeline<E = TextEngine> {
    engine: E,
    pipeline: PipelineConfig,
    debug_dir: Option<PathBuf>,
}

impl<E: TextRecognizer> CardPipeline<E> {
    pub fn new(engine: E, pipeline: PipelineConfig) -> Self {
        Self {
            engine,
            pipeline,
            debug_dir: None,
        }
    }

    /// Write normalized cards and enhanced crops under `dir` for visual
    /// inspection. The directory must already exist.
    pub fn with_debug_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.debug_dir = dir;
        self
    }

    /// Decode an image file and extract its fields. Decode failures are
    /// the only errors; recognition itself always produces an attempt.
    pub fn recognize_image(&self, path: &Path) -> Result<AttemptResult> {
        let frame = image::open(path)
            .with_context(|| format!("reading image {}", path.display()))?
            .to_rgb8();
        Ok(self.recognize_frame(path, frame))
    }

    /// Extract fields from an already decoded frame.
    pub fn recognize_frame(&self, source: &Path, frame: RgbImage) -> AttemptResult {
        let card = normalize::normalize(frame, &self.pipeline);
        if !card.card_detected {
            debug!(
                image = %source.display(),
                "card outline not found, reading resized frame"
            );
        }
        self.dump_artifact(source, "card", &card.image);

        let mut attempts = Vec::with_capacity(REGION_LAYOUTS.len());
        let first = self.run_attempt(&card.image, &REGION_LAYOUTS[0], source);
        let retry = !first.succeeded() || first.is_total_miss();
        attempts.push(first);
        if retry {
            for layout in &REGION_LAYOUTS[1..] {
                attempts.push(self.run_attempt(&card.image, layout, source));
            }
        }

        let fallback = attempts[0].clone();
        select_best_attempt(&attempts).unwrap_or(fallback)
    }

    fn run_attempt(&self, card: &RgbImage, layout: &RegionLayout, source: &Path) -> AttemptResult {
        let crops = regions::extract_regions(card, layout, self.pipeline.region_upscale);
        self.dump_crops(source, layout.label, &crops);

        let name_readings = self.engine.recognize_all(&crops.name);
        let ethnicity_readings = self.engine.recognize_all(&crops.ethnicity);

        let all_failed = name_readings
            .iter()
            .chain(ethnicity_readings.iter())
            .all(|reading| reading.outcome.is_err());
        let error = if all_failed {
            name_readings
                .iter()
                .chain(ethnicity_readings.iter())
                .find_map(|reading| reading.outcome.as_ref().err().cloned())
                .or_else(|| Some("no recognition passes completed".to_string()))
        } else {
            None
        };

        let result = AttemptResult {
            layout: layout.label,
            name: select_field_text(&name_readings, Field::Name),
            ethnicity: select_field_text(&ethnicity_readings, Field::Ethnicity),
            error,
        };
        debug!(
            image = %source.display(),
            layout = layout.label,
            name = %result.name,
            ethnicity = %result.ethnicity,
            failed = !result.succeeded(),
            "recognition attempt finished"
        );
        result
    }

    fn dump_crops(&self, source: &Path, layout: &str, crops: &FieldCrops) {
        if self.debug_dir.is_some() {
            let tag = |field: Field| format!("{layout}-{}", field.as_str());
            self.dump_gray(source, &tag(Field::Name), &crops.name);
            self.dump_gray(source, &tag(Field::Ethnicity), &crops.ethnicity);
        }
    }

    fn dump_artifact(&self, source: &Path, tag: &str, image: &RgbImage) {
        if let Some(dir) = &self.debug_dir {
            let path = dir.join(artifact_name(source, tag));
            if let Err(err) = image.save(&path) {
                warn!(path = %path.display(), error = %err, "failed to write debug artifact");
            }
        }
    }

    fn dump_gray(&self, source: &Path, tag: &str, image: &image::GrayImage) {
        if let Some(dir) = &self.debug_dir {
            let path = dir.join(artifact_name(source, tag));
            if let Err(err) = image.save(&path) {
                warn!(path = %path.display(), error = %err, "failed to write debug artifact");
            }
        }
    }
}

fn artifact_name(source: &Path, tag: &str) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    format!("{stem}-{tag}.png")
}

/// Engine that answers each recognition call with the next scripted
/// line, one line per field crop.
#[cfg(test)]
pub struct ScriptedEngine {
    responses: Mutex<VecDeque<String>>,
}

#[cfg(test)]
impl ScriptedEngine {
    pub fn new(responses: &[&str]) -> Self {
        Self {
            responses: Mutex::new(responses.iter().map(|s| s.to_string()).collect()),
        }
    }

    fn remaining(&self) -> usize {
        self.responses.lock().len()
    }
}

#[cfg(test)]
impl TextRecognizer for ScriptedEngine {
    fn recognize_one(&self, _image: &GrayImage, _profile: EngineProfile) -> Result<String> {
        Ok(self.responses.lock().pop_front().unwrap_or_default())
    }

    fn recognize_all(&self, image: &GrayImage) -> Vec<ProfileReading> {
        vec![ProfileReading {
            profile: EngineProfile::Block,
            outcome: self
                .recognize_one(image, EngineProfile::Block)
                .map_err(|err| format!("{err:#}")),
        }]
    }
}
