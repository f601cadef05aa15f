//! Uncompressed YUV4MPEG2 output.
//!
//! Every frame is intra, so every chunk is a keyframe. Color conversion is
//! BT.601 full range with 2x2 averaged chroma (`C420jpeg`).

use lumagrade_common::error::{LumaError, LumaResult};

use crate::encode::{ContainerMuxer, EncodedChunk, EncoderConfig, VideoEncoder};
use crate::frame::Frame;

/// RGBA8 to planar I420.
#[derive(Debug, Default)]
pub struct RawI420Encoder {
    dims: Option<(u32, u32)>,
}

impl RawI420Encoder {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl VideoEncoder for RawI420Encoder {
    fn name(&self) -> &str {
        "raw-i420"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn configure(&mut self, config: &EncoderConfig) -> LumaResult<()> {
        if config.width == 0 || config.height == 0 || config.width % 2 != 0 || config.height % 2 != 0
        {
            return Err(LumaError::encode(format!(
                "I420 needs non-zero even dimensions, got {}x{}",
                config.width, config.height
            )));
        }
        self.dims = Some((config.width, config.height));
        Ok(())
    }

    async fn encode(&mut self, frame: &Frame, _keyframe: bool) -> LumaResult<Vec<EncodedChunk>> {
        let (w, h) = self
            .dims
            .ok_or_else(|| LumaError::encode("encoder is not configured"))?;
        if frame.dimensions() != (w, h) {
            return Err(LumaError::encode("frame size changed mid-stream"));
        }
        Ok(vec![EncodedChunk {
            data: rgba_to_i420(frame.pixels.as_raw(), w as usize, h as usize),
            timestamp_micros: frame.timestamp_micros,
            duration_micros: frame.duration_micros,
            keyframe: true,
        }])
    }

    async fn flush(&mut self) -> LumaResult<Vec<EncodedChunk>> {
        Ok(Vec::new())
    }

    fn reset(&mut self) {
        self.dims = None;
    }
}

fn luma(r: f32, g: f32, b: f32) -> f32 {
    0.299 * r + 0.587 * g + 0.114 * b
}

fn to_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Convert interleaved RGBA to I420. `w` and `h` must be even.
pub fn rgba_to_i420(rgba: &[u8], w: usize, h: usize) -> Vec<u8> {
    let (cw, ch) = (w / 2, h / 2);
    let mut out = vec![0u8; w * h + 2 * cw * ch];
    let (y_plane, chroma) = out.split_at_mut(w * h);
    let (u_plane, v_plane) = chroma.split_at_mut(cw * ch);

    let px = |x: usize, y: usize| {
        let i = (y * w + x) * 4;
        (rgba[i] as f32, rgba[i + 1] as f32, rgba[i + 2] as f32)
    };

    for y in 0..h {
        for x in 0..w {
            let (r, g, b) = px(x, y);
            y_plane[y * w + x] = to_u8(luma(r, g, b));
        }
    }

    for cy in 0..ch {
        for cx in 0..cw {
            let (mut r, mut g, mut b) = (0.0, 0.0, 0.0);
            for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                let (pr, pg, pb) = px(cx * 2 + dx, cy * 2 + dy);
                r += pr;
                g += pg;
                b += pb;
            }
            let (r, g, b) = (r / 4.0, g / 4.0, b / 4.0);
            u_plane[cy * cw + cx] = to_u8(128.0 - 0.168736 * r - 0.331264 * g + 0.5 * b);
            v_plane[cy * cw + cx] = to_u8(128.0 + 0.5 * r - 0.418688 * g - 0.081312 * b);
        }
    }
    out
}

/// YUV4MPEG2 stream writer.
#[derive(Debug, Default)]
pub struct Y4mMuxer {
    buffer: Vec<u8>,
    frame_size: usize,
    frames: u64,
}

impl Y4mMuxer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ContainerMuxer for Y4mMuxer {
    fn extension(&self) -> &'static str {
        "y4m"
    }

    fn begin(&mut self, config: &EncoderConfig) -> LumaResult<()> {
        self.buffer.clear();
        self.frames = 0;
        let (w, h) = (config.width as usize, config.height as usize);
        self.frame_size = w * h + 2 * (w / 2) * (h / 2);
        let header = format!(
            "YUV4MPEG2 W{} H{} F{}:1 Ip A1:1 C420jpeg XYSCSS=420JPEG\n",
            config.width, config.height, config.fps
        );
        self.buffer.extend_from_slice(header.as_bytes());
        Ok(())
    }

    fn add_chunk(&mut self, chunk: EncodedChunk) -> LumaResult<()> {
        if self.frame_size == 0 {
            return Err(LumaError::encode("muxer has not been started"));
        }
        if chunk.data.len() != self.frame_size {
            return Err(LumaError::encode(format!(
                "I420 frame has {} bytes, expected {}",
                chunk.data.len(),
                self.frame_size
            )));
        }
        self.buffer.extend_from_slice(b"FRAME\n");
        self.buffer.extend_from_slice(&chunk.data);
        self.frames += 1;
        Ok(())
    }

    fn finalize(&mut self) -> LumaResult<Vec<u8>> {
        if self.frames == 0 {
            return Err(LumaError::encode("no frames were written"));
        }
        self.frame_size = 0;
        Ok(std::mem::take(&mut self.buffer))
    }

    fn discard(&mut self) {
        self.buffer.clear();
        self.frame_size = 0;
        self.frames = 0;
    }
}
