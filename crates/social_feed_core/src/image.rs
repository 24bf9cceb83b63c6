//! crates/social_feed_core/src/image.rs
//!
//! Client-side image preparation before upload.
//!
//! A selected file is validated, probed for its natural size, and wrapped in
//! an [`ImageJob`]. The job tracks the target size (aspect-locked unless a
//! preset is applied) and JPEG quality. Each change asks for a fresh encode;
//! every encode gets a ticket and only the newest ticket may replace the
//! preview, so a slow encode can never overwrite a newer one.

use bytes::Bytes;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::domain::{ImageDimensions, ImageFile, TargetDimensions};
use crate::ports::{ImageCodec, PortError, PortResult};

/// Largest accepted upload: 5 MiB.
pub const MAX_IMAGE_BYTES: u64 = 5 * 1024 * 1024;

pub const ACCEPTED_MIME_TYPES: [&str; 5] = [
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
];

/// MIME type of every resized output.
pub const RESIZED_MIME_TYPE: &str = "image/jpeg";

/// Largest side accepted for an encode, whether typed or derived.
pub const MAX_DIMENSION: u32 = 4000;
const OVERSIZE_REASON: &str = "Width and height must be at most 4000 pixels";

pub const MIN_QUALITY: f32 = 0.1;
pub const MAX_QUALITY: f32 = 1.0;
pub const DEFAULT_QUALITY: f32 = 0.8;

/// Target size used until the source has been probed.
pub const DEFAULT_TARGET: TargetDimensions = TargetDimensions {
    width: 800,
    height: 600,
};

const INVALID_TYPE_REASON: &str = "Please select a valid image file (JPEG, PNG, GIF, or WebP)";
const TOO_LARGE_REASON: &str = "Image size must be less than 5MB";

//=========================================================================================
// Presets
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preset {
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
}

pub const PRESETS: [Preset; 4] = [
    Preset { name: "Small", width: 400, height: 300 },
    Preset { name: "Medium", width: 800, height: 600 },
    Preset { name: "Large", width: 1200, height: 900 },
    Preset { name: "HD", width: 1920, height: 1080 },
];

/// Looks up a preset by name, ignoring case.
pub fn preset(name: &str) -> Option<&'static Preset> {
    PRESETS.iter().find(|p| p.name.eq_ignore_ascii_case(name))
}

//=========================================================================================
// Validation and formatting helpers
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    pub valid: bool,
    pub reason: Option<String>,
}

impl Validation {
    fn ok() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    fn rejected(reason: &str) -> Self {
        Self {
            valid: false,
            reason: Some(reason.to_string()),
        }
    }
}

/// Rejects non-image MIME types and files over [`MAX_IMAGE_BYTES`].
pub fn validate(file: &ImageFile) -> Validation {
    let mime = file.mime_type.to_ascii_lowercase();
    if !ACCEPTED_MIME_TYPES.contains(&mime.as_str()) {
        return Validation::rejected(INVALID_TYPE_REASON);
    }
    if file.size() > MAX_IMAGE_BYTES {
        return Validation::rejected(TOO_LARGE_REASON);
    }
    Validation::ok()
}

/// Guesses a MIME type from a file name's extension.
pub fn mime_from_extension(name: &str) -> Option<&'static str> {
    let ext = name.rsplit_once('.')?.1.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "bmp" => Some("image/bmp"),
        "svg" => Some("image/svg+xml"),
        "txt" => Some("text/plain"),
        _ => None,
    }
}

/// Human-readable size: "0 Bytes", "512 Bytes", "1.5 KB", "2 MB".
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let exponent = ((bytes as f64).ln() / 1024f64.ln()).floor() as usize;
    let exponent = exponent.min(UNITS.len() - 1);
    let value = bytes as f64 / 1024f64.powi(exponent as i32);
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[exponent])
}

/// Clamps to `MIN_QUALITY..=MAX_QUALITY`; NaN becomes the default.
pub fn clamp_quality(quality: f32) -> f32 {
    if quality.is_nan() {
        return DEFAULT_QUALITY;
    }
    quality.clamp(MIN_QUALITY, MAX_QUALITY)
}

/// Parses typed dimension input the way a number field does: leading digits
/// only, anything else is 0, capped at [`MAX_DIMENSION`].
pub fn parse_dimension(input: &str) -> u32 {
    let digits: String = input
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits
        .parse::<u64>()
        .map(|value| value.min(MAX_DIMENSION as u64) as u32)
        .unwrap_or(0)
}

fn round_dimension(value: f64) -> u32 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    value.round().min(u32::MAX as f64) as u32
}

//=========================================================================================
// Image Job
//=========================================================================================

/// One encode the caller should run. Hand the ticket back to
/// [`ImageJob::complete`] with the result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeRequest {
    pub ticket: u64,
    pub width: u32,
    pub height: u32,
    pub quality: f32,
}

/// The most recent committed encode.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizedImage {
    pub ticket: u64,
    pub width: u32,
    pub height: u32,
    pub quality: f32,
    pub data: Bytes,
}

#[derive(Debug, Clone)]
pub struct ImageJob {
    source: ImageFile,
    original: Option<ImageDimensions>,
    target: TargetDimensions,
    quality: f32,
    latest_ticket: u64,
    resized: Option<ResizedImage>,
}

impl ImageJob {
    pub fn new(source: ImageFile) -> Self {
        Self {
            source,
            original: None,
            target: DEFAULT_TARGET,
            quality: DEFAULT_QUALITY,
            latest_ticket: 0,
            resized: None,
        }
    }

    pub fn source(&self) -> &ImageFile {
        &self.source
    }

    pub fn original(&self) -> Option<ImageDimensions> {
        self.original
    }

    pub fn target(&self) -> TargetDimensions {
        self.target
    }

    pub fn quality(&self) -> f32 {
        self.quality
    }

    pub fn resized(&self) -> Option<&ResizedImage> {
        self.resized.as_ref()
    }

    /// Ticket of the most recently issued request; 0 before the first.
    pub fn latest_ticket(&self) -> u64 {
        self.latest_ticket
    }

    /// Records the probed size and resets the target to it.
    pub fn set_original(&mut self, dimensions: ImageDimensions) {
        self.original = Some(dimensions);
        self.target = TargetDimensions {
            width: dimensions.width,
            height: dimensions.height,
        };
    }

    fn aspect_ratio(&self) -> f64 {
        self.original
            .map(|d| d.aspect_ratio)
            .filter(|r| r.is_finite() && *r > 0.0)
            .unwrap_or(1.0)
    }

    /// Aspect-locked: height becomes `round(width / ratio)`.
    pub fn set_target_width(&mut self, width: u32) {
        let height = round_dimension(width as f64 / self.aspect_ratio());
        self.target = TargetDimensions { width, height };
    }

    /// Aspect-locked: width becomes `round(height * ratio)`.
    pub fn set_target_height(&mut self, height: u32) {
        let width = round_dimension(height as f64 * self.aspect_ratio());
        self.target = TargetDimensions { width, height };
    }

    /// Sets both dimensions exactly, ignoring the aspect lock.
    pub fn apply_preset(&mut self, preset: &Preset) {
        self.target = TargetDimensions {
            width: preset.width,
            height: preset.height,
        };
    }

    pub fn set_quality(&mut self, quality: f32) {
        self.quality = clamp_quality(quality);
    }

    /// The aspect lock may derive a side beyond [`MAX_DIMENSION`] from an
    /// in-range entry.
    pub fn is_oversize(&self) -> bool {
        self.target.width > MAX_DIMENSION || self.target.height > MAX_DIMENSION
    }

    /// Issues a new ticket for the current settings. `None` while either
    /// dimension is zero or oversize.
    pub fn issue_request(&mut self) -> Option<ResizeRequest> {
        if self.target.width == 0 || self.target.height == 0 || self.is_oversize() {
            return None;
        }
        self.latest_ticket += 1;
        Some(ResizeRequest {
            ticket: self.latest_ticket,
            width: self.target.width,
            height: self.target.height,
            quality: self.quality,
        })
    }

    /// Commits an encode result if its ticket is still the latest.
    /// Returns whether the result was kept.
    pub fn complete(&mut self, request: ResizeRequest, data: Bytes) -> bool {
        if request.ticket != self.latest_ticket {
            debug!(
                ticket = request.ticket,
                latest = self.latest_ticket,
                "Discarding superseded resize result"
            );
            return false;
        }
        self.resized = Some(ResizedImage {
            ticket: request.ticket,
            width: request.width,
            height: request.height,
            quality: request.quality,
            data,
        });
        true
    }

    /// Whether the current preview reflects the latest request.
    pub fn is_current(&self) -> bool {
        self.resized
            .as_ref()
            .is_some_and(|r| r.ticket == self.latest_ticket)
    }

    /// Discards any resize and forwards the source untouched.
    pub fn use_original(self) -> ImageFile {
        self.source
    }

    /// Forwards the latest committed encode under the source's file name.
    pub fn use_resized(self) -> Option<ImageFile> {
        let resized = self.resized?;
        Some(ImageFile::new(self.source.name, RESIZED_MIME_TYPE, resized.data))
    }
}

//=========================================================================================
// Codec-backed operations
//=========================================================================================

/// Natural dimensions and aspect ratio of `file`.
pub async fn decode(codec: &dyn ImageCodec, file: &ImageFile) -> PortResult<ImageDimensions> {
    codec.probe(file.data.clone()).await
}

/// Scales `file` to `width` x `height` and re-encodes at `quality`.
pub async fn resize(
    codec: &dyn ImageCodec,
    file: &ImageFile,
    width: u32,
    height: u32,
    quality: f32,
) -> PortResult<Bytes> {
    if width == 0 || height == 0 {
        return Err(PortError::Validation(
            "Width and height must be at least 1 pixel".to_string(),
        ));
    }
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(PortError::Validation(OVERSIZE_REASON.to_string()));
    }
    codec
        .resize(file.data.clone(), width, height, clamp_quality(quality))
        .await
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeOutcome {
    /// The encode finished and now backs the preview.
    Committed { ticket: u64 },
    /// A newer request was issued while this one ran.
    Superseded { ticket: u64 },
    /// Nothing to encode (a zero dimension).
    Skipped,
}

/// An interactive resize session around one [`ImageJob`].
///
/// Settings methods only mutate state; call [`refresh`](Self::refresh) after
/// each change to re-encode. Concurrent refreshes are safe: the job lock is
/// never held across the encode.
pub struct ImageResizer {
    codec: Arc<dyn ImageCodec>,
    job: Mutex<ImageJob>,
}

impl ImageResizer {
    /// Validates and probes `file`. Invalid files are rejected with the
    /// validation reason before the codec is touched.
    pub async fn open(codec: Arc<dyn ImageCodec>, file: ImageFile) -> PortResult<Self> {
        let validation = validate(&file);
        if !validation.valid {
            return Err(PortError::Validation(
                validation.reason.unwrap_or_default(),
            ));
        }

        let dimensions = decode(codec.as_ref(), &file).await?;
        debug!(
            width = dimensions.width,
            height = dimensions.height,
            "Probed source image"
        );

        let mut job = ImageJob::new(file);
        job.set_original(dimensions);
        Ok(Self {
            codec,
            job: Mutex::new(job),
        })
    }

    fn lock(&self) -> MutexGuard<'_, ImageJob> {
        self.job.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Runs `f` against the job under the lock.
    pub fn with_job<R>(&self, f: impl FnOnce(&mut ImageJob) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn set_target_width(&self, width: u32) {
        self.lock().set_target_width(width);
    }

    pub fn set_target_height(&self, height: u32) {
        self.lock().set_target_height(height);
    }

    pub fn apply_preset(&self, preset: &Preset) {
        self.lock().apply_preset(preset);
    }

    pub fn set_quality(&self, quality: f32) {
        self.lock().set_quality(quality);
    }

    pub fn target(&self) -> TargetDimensions {
        self.lock().target()
    }

    /// Encodes the current settings and commits the result if no newer
    /// request was issued meanwhile. An oversize target is refused without
    /// touching the codec.
    pub async fn refresh(&self) -> PortResult<ResizeOutcome> {
        let (request, source) = {
            let mut job = self.lock();
            if job.is_oversize() {
                let target = job.target();
                warn!(
                    width = target.width,
                    height = target.height,
                    "Refusing oversize resize target"
                );
                return Err(PortError::Validation(OVERSIZE_REASON.to_string()));
            }
            match job.issue_request() {
                Some(request) => (request, job.source().clone()),
                None => return Ok(ResizeOutcome::Skipped),
            }
        };

        let data = resize(
            self.codec.as_ref(),
            &source,
            request.width,
            request.height,
            request.quality,
        )
        .await
        .map_err(|e| {
            warn!(ticket = request.ticket, "Error resizing image: {}", e);
            e
        })?;

        if self.lock().complete(request, data) {
            Ok(ResizeOutcome::Committed {
                ticket: request.ticket,
            })
        } else {
            Ok(ResizeOutcome::Superseded {
                ticket: request.ticket,
            })
        }
    }

    pub fn into_job(self) -> ImageJob {
        self.job
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn use_original(self) -> ImageFile {
        self.into_job().use_original()
    }

    pub fn use_resized(self) -> Option<ImageFile> {
        self.into_job().use_resized()
    }

    /// Drops the job and any preview bytes it holds.
    pub fn cancel(self) {
        drop(self.into_job());
        debug!("Image resize cancelled");
    }
}
