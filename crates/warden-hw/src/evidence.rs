//! Evidence files encoded with ffmpeg.
//!
//! Frames are converted RGB24 → YUV420P and encoded as MPEG-4 Part 2. The
//! container is picked from the file extension, so `unknown_*.avi` paths
//! produce AVI files.

use ffmpeg_next::format::Pixel;
use ffmpeg_next::software::scaling;
use ffmpeg_next::{codec, encoder, format, Rational};
use std::path::Path;
use thiserror::Error;
use warden_core::{EvidenceSink, EvidenceWriter, Frame, SinkError};

#[derive(Error, Debug)]
pub enum EvidenceError {
    #[error("ffmpeg: {0}")]
    Ffmpeg(#[from] ffmpeg_next::Error),
    #[error("MPEG4 encoder not found")]
    MissingEncoder,
    #[error("output has no video stream")]
    MissingStream,
    #[error("frame is {actual_w}x{actual_h}, recording was opened at {expected_w}x{expected_h}")]
    SizeMismatch {
        expected_w: u32,
        expected_h: u32,
        actual_w: u32,
        actual_h: u32,
    },
    #[error("invalid frame rate {0}")]
    InvalidFps(f64),
}

/// Opens [`FfmpegEvidenceWriter`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegEvidenceSink;

impl EvidenceSink for FfmpegEvidenceSink {
    type Writer = FfmpegEvidenceWriter;

    fn open(&mut self, path: &Path, width: u32, height: u32, fps: f64) -> Result<FfmpegEvidenceWriter, SinkError> {
        Ok(FfmpegEvidenceWriter::create(path, width, height, fps)?)
    }
}

pub struct FfmpegEvidenceWriter {
    octx: format::context::Output,
    encoder: encoder::video::Encoder,
    scaler: scaling::Context,
    width: u32,
    height: u32,
    encoder_time_base: Rational,
    stream_time_base: Rational,
    frame_count: i64,
}

// Safety: a writer is owned by the watch loop thread and never shared.
// The raw pointers inside the ffmpeg contexts do not escape it.
unsafe impl Send for FfmpegEvidenceWriter {}

impl FfmpegEvidenceWriter {
    pub fn create(path: &Path, width: u32, height: u32, fps: f64) -> Result<Self, EvidenceError> {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(EvidenceError::InvalidFps(fps));
        }
        ffmpeg_next::init()?;

        let mut octx = format::output(&path)?;
        let global_header = octx.format().flags().contains(format::Flags::GLOBAL_HEADER);

        let codec = encoder::find(codec::Id::MPEG4).ok_or(EvidenceError::MissingEncoder)?;
        let mut ost = octx.add_stream(Some(codec))?;

        let mut encoder_ctx = codec::context::Context::new_with_codec(codec).encoder().video()?;
        encoder_ctx.set_width(width);
        encoder_ctx.set_height(height);
        encoder_ctx.set_format(Pixel::YUV420P);

        let fps_i = fps.round().max(1.0) as i32;
        let encoder_time_base = Rational(1, fps_i);
        encoder_ctx.set_time_base(encoder_time_base);
        encoder_ctx.set_frame_rate(Some(Rational(fps_i, 1)));
        if global_header {
            encoder_ctx.set_flags(codec::Flags::GLOBAL_HEADER);
        }

        let encoder = encoder_ctx.open_with(ffmpeg_next::Dictionary::new())?;
        ost.set_parameters(&encoder);

        octx.write_header()?;
        // The muxer may replace the stream time base while writing the header.
        let stream_time_base = octx.stream(0).ok_or(EvidenceError::MissingStream)?.time_base();

        let scaler = scaling::Context::get(
            Pixel::RGB24,
            width,
            height,
            Pixel::YUV420P,
            width,
            height,
            scaling::Flags::BILINEAR,
        )?;

        tracing::debug!(path = %path.display(), width, height, fps = fps_i, "evidence encoder opened");

        Ok(Self {
            octx,
            encoder,
            scaler,
            width,
            height,
            encoder_time_base,
            stream_time_base,
            frame_count: 0,
        })
    }

    fn encode(&mut self, frame: &Frame) -> Result<(), EvidenceError> {
        if frame.width() != self.width || frame.height() != self.height {
            return Err(EvidenceError::SizeMismatch {
                expected_w: self.width,
                expected_h: self.height,
                actual_w: frame.width(),
                actual_h: frame.height(),
            });
        }

        let mut rgb = ffmpeg_next::util::frame::video::Video::new(Pixel::RGB24, self.width, self.height);
        let stride = rgb.stride(0);
        let row_len = self.width as usize * 3;
        let src = frame.image.as_raw();
        let dst = rgb.data_mut(0);
        for (row, line) in src.chunks_exact(row_len).enumerate() {
            let start = row * stride;
            dst[start..start + row_len].copy_from_slice(line);
        }

        let mut yuv = ffmpeg_next::util::frame::video::Video::empty();
        self.scaler.run(&rgb, &mut yuv)?;
        yuv.set_pts(Some(self.frame_count));

        self.encoder.send_frame(&yuv)?;
        self.drain()?;
        self.frame_count += 1;
        Ok(())
    }

    fn drain(&mut self) -> Result<(), EvidenceError> {
        let mut packet = ffmpeg_next::Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(0);
            packet.rescale_ts(self.encoder_time_base, self.stream_time_base);
            packet.write_interleaved(&mut self.octx)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), EvidenceError> {
        self.encoder.send_eof()?;
        self.drain()?;
        self.octx.write_trailer()?;
        tracing::debug!(frames = self.frame_count, "evidence encoder closed");
        Ok(())
    }
}

impl EvidenceWriter for FfmpegEvidenceWriter {
    fn write(&mut self, frame: &Frame) -> Result<(), SinkError> {
        Ok(self.encode(frame)?)
    }

    fn close(mut self) -> Result<(), SinkError> {
        Ok(self.finish()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn solid_frame(seq: u32, w: u32, h: u32, value: u8) -> Frame {
        Frame::new(RgbImage::from_pixel(w, h, Rgb([value, value / 2, 255 - value])), seq)
    }

    #[test]
    fn test_write_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unknown_20240309_140507.avi");

        let mut writer = FfmpegEvidenceSink.open(&path, 64, 48, 20.0).unwrap();
        for i in 0..5 {
            writer.write(&solid_frame(i, 64, 48, (i * 40) as u8)).unwrap();
        }
        writer.close().unwrap();

        assert!(path.exists());
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn test_written_video_has_opened_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.avi");

        let mut writer = FfmpegEvidenceSink.open(&path, 64, 48, 20.0).unwrap();
        writer.write(&solid_frame(0, 64, 48, 128)).unwrap();
        writer.close().unwrap();

        let ictx = ffmpeg_next::format::input(&path).unwrap();
        let stream = ictx.streams().best(ffmpeg_next::media::Type::Video).unwrap();
        let decoder = codec::context::Context::from_parameters(stream.parameters())
            .unwrap()
            .decoder()
            .video()
            .unwrap();
        assert_eq!(decoder.width(), 64);
        assert_eq!(decoder.height(), 48);
    }

    #[test]
    fn test_frame_size_must_match() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = FfmpegEvidenceWriter::create(&dir.path().join("out.avi"), 64, 48, 20.0).unwrap();

        let err = writer.encode(&solid_frame(0, 32, 48, 0)).unwrap_err();
        assert!(matches!(
            err,
            EvidenceError::SizeMismatch {
                expected_w: 64,
                actual_w: 32,
                ..
            }
        ));
        // The writer stays usable after a rejected frame.
        writer.encode(&solid_frame(1, 64, 48, 0)).unwrap();
        writer.finish().unwrap();
    }

    #[test]
    fn test_invalid_fps_rejected() {
        let dir = tempfile::tempdir().unwrap();
        for fps in [0.0, -20.0, f64::NAN, f64::INFINITY] {
            let path = dir.path().join("out.avi");
            assert!(matches!(
                FfmpegEvidenceWriter::create(&path, 64, 48, fps),
                Err(EvidenceError::InvalidFps(_))
            ));
            assert!(!path.exists());
        }
    }

    #[test]
    fn test_missing_directory_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent").join("out.avi");
        assert!(FfmpegEvidenceSink.open(&path, 64, 48, 20.0).is_err());
    }
}
