//! ffmpeg argument lists per target format

use super::VideoQuality;

const EVEN_DIMENSIONS: &str = "scale=trunc(iw/2)*2:trunc(ih/2)*2";
const GIF_FILTER: &str = "fps=10,scale=480:-1:flags=lanczos";

/// builds `-i <input> ... <output>` for a target
///
/// GIF inputs have no audio stream, so audio codec arguments are left out.
/// Unknown targets get a bare `-i input output` and ffmpeg picks codecs itself.
pub fn build(input: &str, output: &str, target: &str, quality: VideoQuality, gif_input: bool) -> Vec<String> {
    let crf_value = quality.crf().to_string();
    let q_value = (quality.crf() / 5).to_string();
    let (crf, q_scale) = (crf_value.as_str(), q_value.as_str());

    let mut args: Vec<&str> = vec!["-i", input];
    let audio = |codec_args: &'static [&'static str]| -> &'static [&'static str] {
        if gif_input { &[] } else { codec_args }
    };

    match target.to_ascii_lowercase().as_str() {
        "mp4" => {
            args.extend(["-c:v", "libx264", "-preset", "fast", "-crf", crf, "-pix_fmt", "yuv420p"]);
            args.extend(audio(&["-c:a", "aac", "-b:a", "128k"]));
            args.extend(["-movflags", "+faststart", "-vf", EVEN_DIMENSIONS]);
        }
        "webm" => {
            args.extend(["-c:v", "libvpx", "-crf", crf, "-b:v", "1M"]);
            args.extend(audio(&["-c:a", "libvorbis", "-b:a", "128k"]));
            args.extend(["-vf", EVEN_DIMENSIONS]);
        }
        "avi" => {
            args.extend(["-c:v", "mpeg4", "-q:v", q_scale]);
            args.extend(audio(&["-c:a", "libmp3lame", "-b:a", "192k"]));
            args.extend(["-vf", EVEN_DIMENSIONS]);
        }
        "mov" => {
            args.extend(["-c:v", "libx264", "-preset", "fast", "-crf", crf, "-pix_fmt", "yuv420p"]);
            args.extend(audio(&["-c:a", "aac", "-b:a", "128k"]));
            args.extend(["-vf", EVEN_DIMENSIONS]);
        }
        "gif" => args.extend(["-vf", GIF_FILTER, "-loop", "0"]),
        "mp3" => args.extend(["-vn", "-c:a", "libmp3lame", "-b:a", "192k"]),
        "wav" => args.extend(["-vn", "-c:a", "pcm_s16le", "-ar", "44100"]),
        _ => {}
    }

    args.push(output);
    args.into_iter().map(str::to_string).collect()
}
