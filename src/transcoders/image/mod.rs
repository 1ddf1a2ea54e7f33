pub mod container;

use ::image::codecs::jpeg::JpegEncoder;
use ::image::codecs::png::PngEncoder;
use ::image::imageops::{self, FilterType};
use ::image::{ExtendedColorType, ImageEncoder, RgbImage, RgbaImage};
use log::{debug, info};
use rayon::prelude::*;

use crate::errors::ConvertError;
use crate::progress::ProgressReporter;
use crate::transcoders::fallback_target;

/// declared media types routed to this pipeline
pub const SUPPORTED_MEDIA_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/webp",
    "image/gif",
    "image/bmp",
];

/// extensions recognized when the media type is missing or unknown
pub const EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "bmp", "ico", "tiff", "tif"];

const TARGETS: &[&str] = &["jpg", "png", "webp", "bmp", "ico"];

/// icon entries cannot describe anything larger
pub const ICO_MAX_DIMENSION: u32 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageTarget {
    Jpeg,
    Png,
    WebP,
    Bmp,
    Ico,
}

impl ImageTarget {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(ImageTarget::Jpeg),
            "png" => Some(ImageTarget::Png),
            "webp" => Some(ImageTarget::WebP),
            "bmp" => Some(ImageTarget::Bmp),
            "ico" => Some(ImageTarget::Ico),
            _ => None,
        }
    }

    /// JPEG and BMP carry no alpha channel
    pub fn supports_alpha(&self) -> bool {
        !matches!(self, ImageTarget::Jpeg | ImageTarget::Bmp)
    }
}

/// legal targets for a source extension; `jpeg` counts as `jpg`
pub fn available_formats(source_ext: &str) -> Vec<&'static str> {
    let source = source_ext.to_ascii_lowercase();
    let source = if source == "jpeg" { "jpg".to_string() } else { source };
    TARGETS.iter().copied().filter(|f| *f != source).collect()
}

/// surface size for a target: natural size, or fitted inside 256x256 for icons
pub fn surface_size(width: u32, height: u32, target: ImageTarget) -> (u32, u32) {
    if target != ImageTarget::Ico || (width <= ICO_MAX_DIMENSION && height <= ICO_MAX_DIMENSION) {
        return (width, height);
    }

    let ratio = f64::min(
        ICO_MAX_DIMENSION as f64 / width as f64,
        ICO_MAX_DIMENSION as f64 / height as f64,
    );
    let scaled = |d: u32| ((d as f64 * ratio).round() as u32).max(1);
    (scaled(width), scaled(height))
}

/// composites the surface over opaque white, leaving every pixel fully opaque
pub fn flatten_onto_white(surface: &mut RgbaImage) {
    surface.par_chunks_exact_mut(4).for_each(|pixel| {
        let alpha = pixel[3] as u32;
        for channel in &mut pixel[..3] {
            *channel = ((*channel as u32 * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        }
        pixel[3] = 255;
    });
}

/// decodes `data`, redraws it onto a fresh surface and encodes it as `target`
pub fn convert(
    data: &[u8],
    target: &str,
    quality: f32,
    progress: &ProgressReporter,
) -> Result<Vec<u8>, ConvertError> {
    let target = ImageTarget::from_extension(target)
        .unwrap_or_else(|| fallback_target("Image", target, ImageTarget::Png));

    info!("Image pipeline: decoding {} bytes for {:?} output", data.len(), target);
    progress.report(10.0);

    let decoded = ::image::load_from_memory(data)?;
    progress.report(40.0);

    let (width, height) = surface_size(decoded.width(), decoded.height(), target);
    let source = decoded.to_rgba8();
    let mut surface = if (width, height) == source.dimensions() {
        source
    } else {
        debug!("Image pipeline: resizing {:?} to {}x{}", source.dimensions(), width, height);
        imageops::resize(&source, width, height, FilterType::Lanczos3)
    };
    progress.report(60.0);

    if !target.supports_alpha() {
        flatten_onto_white(&mut surface);
    }
    progress.report(80.0);

    let encoded = encode(&surface, target, quality)?;
    progress.report(100.0);

    info!("Image pipeline: produced {} bytes of {:?}", encoded.len(), target);
    Ok(encoded)
}

fn encode(surface: &RgbaImage, target: ImageTarget, quality: f32) -> Result<Vec<u8>, ConvertError> {
    let (width, height) = surface.dimensions();
    let mut out = Vec::new();

    match target {
        ImageTarget::Jpeg => {
            let rgb: RgbImage = RgbImage::from_fn(width, height, |x, y| {
                let [r, g, b, _] = surface.get_pixel(x, y).0;
                ::image::Rgb([r, g, b])
            });
            JpegEncoder::new_with_quality(&mut out, lossy_quality(quality)).write_image(
                rgb.as_raw(),
                width,
                height,
                ExtendedColorType::Rgb8,
            )?;
        }
        ImageTarget::Png => {
            PngEncoder::new(&mut out).write_image(surface.as_raw(), width, height, ExtendedColorType::Rgba8)?;
        }
        ImageTarget::WebP => {
            let encoded = webp::Encoder::from_rgba(surface.as_raw(), width, height)
                .encode_simple(false, lossy_quality(quality) as f32)
                .map_err(|e| ConvertError::WebP(format!("{:?}", e)))?;
            out = encoded.to_vec();
        }
        ImageTarget::Bmp => out = container::encode_bmp(surface),
        ImageTarget::Ico => {
            let mut png = Vec::new();
            PngEncoder::new(&mut png).write_image(surface.as_raw(), width, height, ExtendedColorType::Rgba8)?;
            out = container::encode_ico(&png, width, height);
        }
    }

    Ok(out)
}

/// maps a [0, 1] quality onto the 1..=100 scale of the lossy encoders
fn lossy_quality(quality: f32) -> u8 {
    let quality = if quality.is_finite() { quality.clamp(0.0, 1.0) } else { 0.92 };
    ((quality * 100.0).round() as u8).max(1)
}
