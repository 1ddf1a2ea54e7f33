use infer::Type;

/// inspects the beginning of a payload to determine its media type
pub fn infer_file_type(head: &[u8]) -> Option<Type> {
    let sniff_len = head.len().min(4096);
    infer::get(&head[..sniff_len])
}

/// lowercase extension of a display name, empty when the name has no dot
pub fn name_extension(name: &str) -> String {
    match name.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => String::new(),
    }
}

/// display name with its last extension stripped; `a.b.mp4` -> `a.b`
pub fn base_name(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !ext.is_empty() && !ext.contains('/') => stem,
        _ => name,
    }
}

/// output name: source basename, a dot, then the target extension
pub fn output_filename(source_name: &str, target: &str) -> String {
    format!("{}.{}", base_name(source_name), target)
}

/// formats a duration as `m:ss`
pub fn format_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 { seconds.floor() as u64 } else { 0 };
    format!("{}:{:02}", total / 60, total % 60)
}

/// formats a byte count for display using 1024-based units
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }

    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut exponent = 0;
    let mut value = bytes as f64;
    while value >= 1024.0 && exponent < UNITS.len() - 1 {
        value /= 1024.0;
        exponent += 1;
    }

    // one decimal, trailing zero dropped
    let rounded = (value * 10.0).round() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{} {}", rounded as u64, UNITS[exponent])
    } else {
        format!("{:.1} {}", rounded, UNITS[exponent])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(125.0), "2:05");
        assert_eq!(format_duration(59.0), "0:59");
        assert_eq!(format_duration(59.9), "0:59");
        assert_eq!(format_duration(3600.0), "60:00");
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(100 * 1024 * 1024), "100 MB");
    }

    #[test]
    fn test_output_filename_strips_last_extension_only() {
        assert_eq!(output_filename("holiday.final.MOV", "mp4"), "holiday.final.mp4");
        assert_eq!(output_filename("README", "txt"), "README.txt");
        assert_eq!(output_filename("Photo.JPEG", "png"), "Photo.png");
    }

    #[test]
    fn test_name_extension() {
        assert_eq!(name_extension("clip.GIF"), "gif");
        assert_eq!(name_extension("noext"), "");
        assert_eq!(name_extension("Song.FLAC"), "flac");
    }

    #[test]
    fn test_infer_file_type_png() {
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        assert_eq!(infer_file_type(&png).map(|t| t.mime_type()), Some("image/png"));
        assert!(infer_file_type(&[1, 2, 3]).is_none());
    }
}
