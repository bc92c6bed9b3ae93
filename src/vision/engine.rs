//! Text recognition engine wrapper.
//!
//! Wraps the Tesseract C API behind a small trait so the rest of the
//! pipeline can be exercised with scripted engines in tests. Each call
//! builds a fresh engine handle; the handles are cheap next to the
//! recognition itself and a fresh handle cannot leak state between crops.

use std::io::Cursor;

use anyhow::{Context, Result};
use image::{GrayImage, ImageFormat};
use parking_lot::Mutex;
use tesseract::{PageSegMode, Tesseract};
use tracing::warn;

use crate::config::EngineConfig;

/// Page segmentation profile for one recognition pass.
///
/// Field crops are short fragments, so the full-page layout analysis is
/// skipped in favor of modes matched to the crop shape. Profiles are
/// attempted in declaration order and all readings are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineProfile {
    /// Uniform block of text, the nominal shape of a field crop.
    #[default]
    Block,
    /// Single word, for crops that collapse to one token.
    Word,
    /// Single character, catches heavily truncated ethnicity crops.
    Char,
    /// Sparse text, finds scattered characters in noisy crops.
    Sparse,
}

impl EngineProfile {
    pub const ALL: [EngineProfile; 4] = [
        EngineProfile::Block,
        EngineProfile::Word,
        EngineProfile::Char,
        EngineProfile::Sparse,
    ];

    pub fn page_seg_mode(self) -> PageSegMode {
        match self {
            EngineProfile::Block => PageSegMode::PsmSingleBlock,
            EngineProfile::Word => PageSegMode::PsmSingleWord,
            EngineProfile::Char => PageSegMode::PsmSingleChar,
            EngineProfile::Sparse => PageSegMode::PsmSparseText,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EngineProfile::Block => "block",
            EngineProfile::Word => "word",
            EngineProfile::Char => "char",
            EngineProfile::Sparse => "sparse",
        }
    }
}

/// Outcome of one recognition pass under one profile.
#[derive(Debug, Clone)]
pub struct ProfileReading {
    pub profile: EngineProfile,
    pub outcome: Result<String, String>,
}

/// Anything that can read text off an enhanced field crop.
pub trait TextRecognizer {
    /// Recognize a crop under a single profile.
    fn recognize_one(&self, image: &GrayImage, profile: EngineProfile) -> Result<String>;

    /// Recognize a crop under every profile, isolating per-profile
    /// failures so one broken pass never hides the others.
    fn recognize_all(&self, image: &GrayImage) -> Vec<ProfileReading> {
        EngineProfile::ALL
            .iter()
            .map(|&profile| ProfileReading {
                profile,
                outcome: self
                    .recognize_one(image, profile)
                    .map_err(|err| format!("{err:#}")),
            })
            .collect()
    }

    fn is_available(&self) -> bool {
        true
    }
}

/// Tesseract-backed recognizer.
pub struct TextEngine {
    language: String,
    tessdata_dir: Option<String>,
    source_dpi: i32,
    available: bool,
    // The C engine keeps process-global state, so recognitions are
    // serialized even though each call owns its handle.
    session: Mutex<()>,
}

impl TextEngine {
    /// Checks the engine once at startup. A missing installation or
    /// language pack degrades recognition to empty readings instead of
    /// failing the whole run.
    pub fn new(config: &EngineConfig) -> Self {
        let tessdata_dir = config
            .tessdata_dir
            .as_ref()
            .map(|path| path.to_string_lossy().into_owned());
        let available = match Tesseract::new(tessdata_dir.as_deref(), Some(config.language.as_str()))
        {
            Ok(_) => true,
            Err(err) => {
                warn!(
                    language = %config.language,
                    error = %err,
                    "text engine unavailable, all readings will be empty"
                );
                false
            }
        };
        Self {
            language: config.language.clone(),
            tessdata_dir,
            source_dpi: config.source_dpi,
            available,
            session: Mutex::new(()),
        }
    }
}

impl TextRecognizer for TextEngine {
    fn recognize_one(&self, image: &GrayImage, profile: EngineProfile) -> Result<String> {
        if !self.available {
            return Ok(String::new());
        }
        let _session = self.session.lock();

        let png = encode_png(image)?;
        let mut engine = Tesseract::new(self.tessdata_dir.as_deref(), Some(self.language.as_str()))
            .context("initializing text engine")?;
        engine.set_page_seg_mode(profile.page_seg_mode());
        let mut engine = engine
            .set_image_from_mem(&png)
            .context("loading field crop into text engine")?;
        let mut engine = engine.set_source_resolution(self.source_dpi);
        let text = engine.get_text().context("running text recognition")?;
        Ok(text.trim().to_string())
    }

    fn is_available(&self) -> bool {
        self.available
    }
}

/// Encode a crop as PNG for handoff to the engine.
fn encode_png(image: &GrayImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .context("encoding field crop")?;
    Ok(buffer.into_inner())
}
