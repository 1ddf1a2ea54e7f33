//! the user-facing format table
//!
//! Built from the classifier's extension lists and each pipeline's own
//! `available_formats`, so what the table advertises is what a conversion accepts.

use serde::Serialize;

use crate::classifier::{self, Category};
use crate::transcoders::{audio, image, text, video};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatInfo {
    pub extension: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub category: Category,
    pub convert_to: Vec<&'static str>,
}

// (display name, description)
fn describe(extension: &str) -> (&'static str, &'static str) {
    match extension {
        "png" => ("PNG", "Portable Network Graphics"),
        "jpg" => ("JPG", "JPEG Image"),
        "jpeg" => ("JPEG", "JPEG Image"),
        "webp" => ("WebP", "WebP Image"),
        "bmp" => ("BMP", "Bitmap Image"),
        "ico" => ("ICO", "Icon Image"),
        "tiff" => ("TIFF", "Tagged Image File Format"),
        "tif" => ("TIF", "Tagged Image File Format"),

        "txt" => ("TXT", "Plain Text"),
        "md" => ("Markdown", "Markdown Document"),
        "csv" => ("CSV", "Comma-Separated Values"),
        "json" => ("JSON", "JavaScript Object Notation"),
        "html" => ("HTML", "HyperText Markup Language"),
        "xml" => ("XML", "Extensible Markup Language"),
        "yaml" => ("YAML", "YAML Ain't Markup Language"),
        "yml" => ("YML", "YAML Ain't Markup Language"),

        "mp3" => ("MP3", "MPEG Audio Layer III"),
        "wav" => ("WAV", "Waveform Audio File"),
        "wave" => ("WAVE", "Waveform Audio File"),
        "ogg" => ("OGG", "Ogg Vorbis Audio"),
        "flac" => ("FLAC", "Free Lossless Audio Codec"),
        "aac" => ("AAC", "Advanced Audio Coding"),
        "m4a" => ("M4A", "MPEG-4 Audio"),
        "wma" => ("WMA", "Windows Media Audio"),

        "mp4" => ("MP4", "MPEG-4 Video"),
        "webm" => ("WebM", "WebM Video"),
        "avi" => ("AVI", "Audio Video Interleave"),
        "mov" => ("MOV", "QuickTime Movie"),
        "mkv" => ("MKV", "Matroska Video"),
        "gif" => ("GIF", "Graphics Interchange Format (Animated)"),
        "flv" => ("FLV", "Flash Video"),
        "wmv" => ("WMV", "Windows Media Video"),
        "3gp" => ("3GP", "3GPP Multimedia"),

        _ => ("", ""),
    }
}

/// every recognized source extension, grouped image, text, audio, video
pub fn supported_formats() -> Vec<FormatInfo> {
    let groups: [(Category, &[&'static str]); 5] = [
        (Category::Image, image::EXTENSIONS),
        (Category::Text, text::EXTENSIONS),
        (Category::Audio, audio::EXTENSIONS),
        (Category::Video, video::EXTENSIONS),
        (Category::Video, &["gif"]),
    ];

    groups
        .into_iter()
        .flat_map(|(category, extensions)| extensions.iter().map(move |&ext| entry(category, ext)))
        .collect()
}

/// looks an extension up case-insensitively
pub fn format_info(extension: &str) -> Option<FormatInfo> {
    let extension = extension.to_ascii_lowercase();
    supported_formats().into_iter().find(|f| f.extension == extension)
}

fn entry(category: Category, extension: &'static str) -> FormatInfo {
    let (name, description) = describe(extension);
    FormatInfo {
        extension,
        name,
        description,
        category,
        convert_to: classifier::available_formats_for(category, extension),
    }
}
