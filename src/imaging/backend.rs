//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait is the single narrow interface between the
//! derived-image pipeline and pixel work: decode, one method per stage
//! kind, and encode. The pipeline decides *which* operations run and in
//! what order; a backend only executes them.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), built on the `image`
//! crate. Tests use a recording mock whose "images" are just sizes.

use super::calculations::CropBox;
use super::params::{Adjustment, OutputFormat, Quality, Reflection, TransposeMethod};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Width and height of an image in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image processing backends.
///
/// Every operation takes the previous image by reference and returns a new
/// one, so a stage can never alter its input.
pub trait ImageBackend: Sync {
    /// Decoded image representation.
    type Image;

    /// Decode encoded bytes (JPEG, PNG, ...).
    fn decode(&self, bytes: &[u8]) -> Result<Self::Image, BackendError>;

    fn dimensions(&self, image: &Self::Image) -> Dimensions;

    /// Read dimensions from encoded bytes without a full decode.
    fn probe(&self, bytes: &[u8]) -> Result<Dimensions, BackendError>;

    /// Scale to exactly `width × height`.
    fn resize(&self, image: &Self::Image, width: u32, height: u32)
    -> Result<Self::Image, BackendError>;

    /// Keep only `region`.
    fn crop(&self, image: &Self::Image, region: CropBox) -> Result<Self::Image, BackendError>;

    fn adjust(&self, image: &Self::Image, adjustment: &Adjustment)
    -> Result<Self::Image, BackendError>;

    fn reflect(&self, image: &Self::Image, reflection: &Reflection)
    -> Result<Self::Image, BackendError>;

    fn transpose(&self, image: &Self::Image, method: TransposeMethod)
    -> Result<Self::Image, BackendError>;

    /// Encode for storage / delivery.
    fn encode(
        &self,
        image: &Self::Image,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Stand-in for decoded pixels: only the size is tracked.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MockImage {
        pub width: u32,
        pub height: u32,
    }

    /// Mock backend that records operations and tracks sizes only.
    ///
    /// `decode` ignores the bytes and returns [`MockBackend::source`];
    /// `encode` returns `"{format}:{width}x{height}"` as bytes.
    pub struct MockBackend {
        pub source: Dimensions,
        pub fail_on: Option<&'static str>,
        pub operations: Mutex<Vec<RecordedOp>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Decode,
        Resize { width: u32, height: u32 },
        Crop(CropBox),
        Adjust { contrast: f64, sharpness: f64 },
        Reflect { size: f64 },
        Transpose(TransposeMethod),
        Encode { format: OutputFormat, quality: u32 },
    }

    impl MockBackend {
        pub fn new(width: u32, height: u32) -> Self {
            Self {
                source: Dimensions { width, height },
                fail_on: None,
                operations: Mutex::new(Vec::new()),
            }
        }

        /// Make the named operation (`"resize"`, `"adjust"`, ...) fail.
        pub fn failing(mut self, operation: &'static str) -> Self {
            self.fail_on = Some(operation);
            self
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().clone()
        }

        fn record(&self, name: &str, op: RecordedOp) -> Result<(), BackendError> {
            self.operations.lock().push(op);
            if self.fail_on == Some(name) {
                return Err(BackendError::ProcessingFailed(format!("mock {name} failure")));
            }
            Ok(())
        }
    }

    impl ImageBackend for MockBackend {
        type Image = MockImage;

        fn decode(&self, _bytes: &[u8]) -> Result<MockImage, BackendError> {
            self.record("decode", RecordedOp::Decode)?;
            Ok(MockImage {
                width: self.source.width,
                height: self.source.height,
            })
        }

        fn dimensions(&self, image: &MockImage) -> Dimensions {
            Dimensions {
                width: image.width,
                height: image.height,
            }
        }

        /// Parses the `"{format}:{width}x{height}"` bytes produced by `encode`.
        fn probe(&self, bytes: &[u8]) -> Result<Dimensions, BackendError> {
            let text = std::str::from_utf8(bytes)
                .map_err(|e| BackendError::ProcessingFailed(e.to_string()))?;
            let parsed = text
                .split_once(':')
                .and_then(|(_, size)| size.split_once('x'))
                .and_then(|(w, h)| Some((w.parse().ok()?, h.parse().ok()?)));
            match parsed {
                Some((width, height)) => Ok(Dimensions { width, height }),
                None => Err(BackendError::ProcessingFailed(format!("not a mock image: {text}"))),
            }
        }

        fn resize(&self, _image: &MockImage, width: u32, height: u32) -> Result<MockImage, BackendError> {
            self.record("resize", RecordedOp::Resize { width, height })?;
            Ok(MockImage { width, height })
        }

        fn crop(&self, _image: &MockImage, region: CropBox) -> Result<MockImage, BackendError> {
            self.record("crop", RecordedOp::Crop(region))?;
            Ok(MockImage {
                width: region.width,
                height: region.height,
            })
        }

        fn adjust(&self, image: &MockImage, adjustment: &Adjustment) -> Result<MockImage, BackendError> {
            self.record(
                "adjust",
                RecordedOp::Adjust {
                    contrast: adjustment.contrast,
                    sharpness: adjustment.sharpness,
                },
            )?;
            Ok(*image)
        }

        fn reflect(&self, image: &MockImage, reflection: &Reflection) -> Result<MockImage, BackendError> {
            self.record("reflect", RecordedOp::Reflect { size: reflection.size })?;
            let extra = crate::imaging::calculations::reflection_height(image.height, reflection.size);
            Ok(MockImage {
                width: image.width,
                height: image.height + extra,
            })
        }

        fn transpose(&self, image: &MockImage, method: TransposeMethod) -> Result<MockImage, BackendError> {
            self.record("transpose", RecordedOp::Transpose(method))?;
            Ok(match method {
                TransposeMethod::Rotate90 | TransposeMethod::Rotate270 => MockImage {
                    width: image.height,
                    height: image.width,
                },
                _ => *image,
            })
        }

        fn encode(
            &self,
            image: &MockImage,
            format: OutputFormat,
            quality: Quality,
        ) -> Result<Vec<u8>, BackendError> {
            self.record(
                "encode",
                RecordedOp::Encode {
                    format,
                    quality: quality.value(),
                },
            )?;
            Ok(format!("{}:{}x{}", format.extension(), image.width, image.height).into_bytes())
        }
    }

    #[test]
    fn mock_decode_returns_configured_size() {
        let backend = MockBackend::new(800, 600);
        let image = backend.decode(b"ignored").unwrap();
        assert_eq!(
            backend.dimensions(&image),
            Dimensions {
                width: 800,
                height: 600
            }
        );
        assert_eq!(backend.get_operations(), vec![RecordedOp::Decode]);
    }

    #[test]
    fn mock_records_resize_and_crop() {
        let backend = MockBackend::new(800, 600);
        let image = backend.decode(b"").unwrap();
        let resized = backend.resize(&image, 400, 300).unwrap();
        let region = CropBox {
            x: 50,
            y: 0,
            width: 300,
            height: 300,
        };
        let cropped = backend.crop(&resized, region).unwrap();

        assert_eq!(cropped, MockImage { width: 300, height: 300 });
        let ops = backend.get_operations();
        assert_eq!(ops[1], RecordedOp::Resize { width: 400, height: 300 });
        assert_eq!(ops[2], RecordedOp::Crop(region));
    }

    #[test]
    fn mock_failure_is_reported_after_recording() {
        let backend = MockBackend::new(10, 10).failing("adjust");
        let image = backend.decode(b"").unwrap();
        assert!(backend.adjust(&image, &Adjustment::default()).is_err());
        assert_eq!(backend.get_operations().len(), 2);
    }

    #[test]
    fn mock_encode_describes_output() {
        let backend = MockBackend::new(120, 90);
        let image = backend.decode(b"").unwrap();
        let bytes = backend
            .encode(&image, OutputFormat::Png, Quality::default())
            .unwrap();
        assert_eq!(bytes, b"png:120x90");
        assert_eq!(
            backend.probe(&bytes).unwrap(),
            Dimensions {
                width: 120,
                height: 90
            }
        );
    }
}
