// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Preview frames pushed by the platform camera.

use docscan_core::error::{Result, ScanError};
use docscan_core::types::{FrameSize, Rotation};
use image::{DynamicImage, GrayImage, RgbaImage};

use super::processor::ImageProcessor;

/// One decoded preview frame plus the rotation that makes it upright.
#[derive(Debug, Clone)]
pub struct Frame {
    image: DynamicImage,
    rotation: Rotation,
}

impl Frame {
    pub fn new(image: DynamicImage, rotation: Rotation) -> Self {
        Self { image, rotation }
    }

    /// Wrap a single-channel sensor plane (e.g. the Y plane of YUV).
    pub fn from_luma(width: u32, height: u32, bytes: Vec<u8>, rotation: Rotation) -> Result<Self> {
        let expected = width as usize * height as usize;
        let len = bytes.len();
        let image = GrayImage::from_raw(width, height, bytes).ok_or_else(|| {
            ScanError::InvalidFrame(format!(
                "luma buffer of {len} bytes does not match {width}x{height} (expected {expected})"
            ))
        })?;
        Ok(Self::new(DynamicImage::ImageLuma8(image), rotation))
    }

    /// Wrap an interleaved RGBA buffer.
    pub fn from_rgba(width: u32, height: u32, bytes: Vec<u8>, rotation: Rotation) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        let len = bytes.len();
        let image = RgbaImage::from_raw(width, height, bytes).ok_or_else(|| {
            ScanError::InvalidFrame(format!(
                "rgba buffer of {len} bytes does not match {width}x{height} (expected {expected})"
            ))
        })?;
        Ok(Self::new(DynamicImage::ImageRgba8(image), rotation))
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation
    }

    /// Dimensions as delivered by the sensor.
    pub fn raw_size(&self) -> FrameSize {
        FrameSize::new(self.image.width(), self.image.height())
    }

    /// Dimensions after rotating upright; the reference frame for detection.
    pub fn size(&self) -> FrameSize {
        self.rotation.apply_to(self.raw_size())
    }

    /// The upright image, consuming the frame.
    pub fn into_upright(self) -> DynamicImage {
        ImageProcessor::from_dynamic(self.image)
            .rotate(self.rotation)
            .into_dynamic()
    }

    /// The upright image, borrowing when no rotation is needed.
    pub fn upright(&self) -> std::borrow::Cow<'_, DynamicImage> {
        match self.rotation {
            Rotation::Deg0 => std::borrow::Cow::Borrowed(&self.image),
            rotation => std::borrow::Cow::Owned(
                ImageProcessor::from_dynamic(self.image.clone())
                    .rotate(rotation)
                    .into_dynamic(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luma_length_mismatch_is_rejected() {
        let err = Frame::from_luma(4, 4, vec![0; 15], Rotation::Deg0).err().expect("error");
        assert!(matches!(err, ScanError::InvalidFrame(_)));
    }

    #[test]
    fn rotated_frame_reports_upright_size() {
        let frame = Frame::from_luma(8, 4, vec![0; 32], Rotation::Deg90).expect("frame");
        assert_eq!(frame.raw_size(), FrameSize::new(8, 4));
        assert_eq!(frame.size(), FrameSize::new(4, 8));
        let upright = frame.upright();
        assert_eq!((upright.width(), upright.height()), (4, 8));
    }

    #[test]
    fn rgba_frame() {
        let frame = Frame::from_rgba(2, 3, vec![255; 24], Rotation::Deg180).expect("frame");
        assert_eq!(frame.size(), FrameSize::new(2, 3));
        assert_eq!(frame.into_upright().width(), 2);
    }
}
