//! Check system capabilities.

use lumagrade_render_engine::backends::command_exists;
use lumagrade_render_engine::{EncoderKind, FfmpegDecoder};
use lumagrade_upscale::{BuiltinLoader, ModelLoader, SessionKind, DEFAULT_MODEL};

pub async fn run() -> anyhow::Result<()> {
    println!("Lumagrade System Check");
    println!("{}", "=".repeat(50));

    for binary in ["ffmpeg", "ffprobe"] {
        if command_exists(binary) {
            println!("[OK] {binary} found");
        } else {
            println!("[MISSING] {binary} not found on PATH");
        }
    }

    let decode_ok = FfmpegDecoder::is_available();
    println!(
        "[{}] Decoding (ffmpeg + ffprobe)",
        if decode_ok { "OK" } else { "MISSING" }
    );

    for kind in [EncoderKind::H264, EncoderKind::Y4m] {
        let pipeline = kind.pipeline();
        let ok = pipeline.is_available();
        println!(
            "[{}] Encoder {kind}: {}",
            if ok { "OK" } else { "MISSING" },
            pipeline.encoder_name()
        );
    }

    match BuiltinLoader.load(DEFAULT_MODEL).await {
        Ok(session) if session.kind() == SessionKind::Interpolating => println!(
            "[WARN] Upscale model: {} interpolates; no neural runtime is bundled",
            session.name()
        ),
        Ok(session) => println!("[OK] Upscale model: {}", session.name()),
        Err(e) => println!("[WARN] Upscale model: {e}"),
    }

    println!();
    if decode_ok && EncoderKind::H264.pipeline().is_available() {
        println!("All required capabilities are available. Lumagrade is ready.");
    } else if decode_ok {
        println!("H.264 export is unavailable; use --codec y4m or install ffmpeg with libx264.");
    } else {
        println!("Install ffmpeg and ffprobe to export video.");
    }

    Ok(())
}
