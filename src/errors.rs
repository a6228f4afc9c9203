// SPDX-License-Identifier: MPL-2.0

//! Error types for the capture, conversion, transform and render stages

use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Clone, PartialEq)]
pub enum AppError {
    /// Capture device errors
    Camera(CameraError),
    /// Malformed plane geometry
    Format(FormatError),
    /// External transform broke its contract
    Transform(TransformError),
    /// GPU context errors
    Render(RenderError),
    /// Configuration errors
    Config(String),
    /// Storage/filesystem errors
    Storage(String),
    /// Generic error with message
    Other(String),
}

/// Capture device errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    /// No back-facing capture device was enumerated
    NoSuitableDevice,
    /// Device open or permission failure reported by the platform
    DeviceUnavailable(String),
}

/// Which plane of a planar YUV frame an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plane {
    Y,
    U,
    V,
}

/// Malformed planar frame geometry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// Width or height is zero
    EmptyFrame,
    /// Width or height is odd, 4:2:0 subsampling needs both even
    OddDimensions { width: u32, height: u32 },
    /// Pixel stride is zero or the row stride cannot hold one row of samples
    InvalidStride {
        plane: Plane,
        row_stride: usize,
        pixel_stride: usize,
    },
    /// U and V planes must share row and pixel strides
    MismatchedChromaStrides,
    /// Plane buffer is shorter than `row_stride * rows`
    PlaneTooShort {
        plane: Plane,
        len: usize,
        required: usize,
    },
}

/// External transform errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    /// Output length differs from `width * height * 4`
    ContractViolation {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

/// GPU context errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// No usable GPU adapter
    NoAdapter(String),
    /// Device or queue creation failed
    DeviceCreation(String),
    /// Texture handle is unknown to the context or has no storage yet
    InvalidTexture,
    /// Only texture unit 0 is wired up
    UnsupportedTextureUnit(u32),
    /// Shader program failed to compile or link
    Shader(String),
    /// Upload data does not match the texture dimensions
    UploadSize { expected: usize, actual: usize },
    /// Framebuffer readback failed
    Readback(String),
    /// Render thread is gone
    Disconnected,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Camera(e) => write!(f, "Camera error: {}", e),
            AppError::Format(e) => write!(f, "Format error: {}", e),
            AppError::Transform(e) => write!(f, "Transform error: {}", e),
            AppError::Render(e) => write!(f, "Render error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraError::NoSuitableDevice => write!(f, "No back-facing camera found"),
            CameraError::DeviceUnavailable(msg) => write!(f, "Camera unavailable: {}", msg),
        }
    }
}

impl fmt::Display for Plane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Plane::Y => write!(f, "Y"),
            Plane::U => write!(f, "U"),
            Plane::V => write!(f, "V"),
        }
    }
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::EmptyFrame => write!(f, "Frame has zero width or height"),
            FormatError::OddDimensions { width, height } => {
                write!(f, "Frame dimensions must be even, got {}x{}", width, height)
            }
            FormatError::InvalidStride {
                plane,
                row_stride,
                pixel_stride,
            } => write!(
                f,
                "{} plane has invalid strides (row {}, pixel {})",
                plane, row_stride, pixel_stride
            ),
            FormatError::MismatchedChromaStrides => {
                write!(f, "U and V planes have different strides")
            }
            FormatError::PlaneTooShort {
                plane,
                len,
                required,
            } => write!(
                f,
                "{} plane holds {} bytes, needs at least {}",
                plane, len, required
            ),
        }
    }
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformError::ContractViolation {
                width,
                height,
                expected,
                actual,
            } => write!(
                f,
                "Transform returned {} bytes for a {}x{} frame, expected {}",
                actual, width, height, expected
            ),
        }
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::NoAdapter(msg) => write!(f, "No GPU adapter: {}", msg),
            RenderError::DeviceCreation(msg) => write!(f, "GPU device creation failed: {}", msg),
            RenderError::InvalidTexture => write!(f, "Invalid texture handle"),
            RenderError::UnsupportedTextureUnit(unit) => {
                write!(f, "Texture unit {} is not supported", unit)
            }
            RenderError::Shader(msg) => write!(f, "Shader program error: {}", msg),
            RenderError::UploadSize { expected, actual } => write!(
                f,
                "Texture upload of {} bytes, expected {}",
                actual, expected
            ),
            RenderError::Readback(msg) => write!(f, "Framebuffer readback failed: {}", msg),
            RenderError::Disconnected => write!(f, "Render thread is not running"),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for CameraError {}
impl std::error::Error for FormatError {}
impl std::error::Error for TransformError {}
impl std::error::Error for RenderError {}

impl From<CameraError> for AppError {
    fn from(err: CameraError) -> Self {
        AppError::Camera(err)
    }
}

impl From<FormatError> for AppError {
    fn from(err: FormatError) -> Self {
        AppError::Format(err)
    }
}

impl From<TransformError> for AppError {
    fn from(err: TransformError) -> Self {
        AppError::Transform(err)
    }
}

impl From<RenderError> for AppError {
    fn from(err: RenderError) -> Self {
        AppError::Render(err)
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<image::ImageError> for AppError {
    fn from(err: image::ImageError) -> Self {
        AppError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_violation_message() {
        let err = TransformError::ContractViolation {
            width: 4,
            height: 2,
            expected: 32,
            actual: 24,
        };
        assert_eq!(
            err.to_string(),
            "Transform returned 24 bytes for a 4x2 frame, expected 32"
        );
    }

    #[test]
    fn test_sub_errors_wrap_into_app_error() {
        let err: AppError = CameraError::NoSuitableDevice.into();
        assert_eq!(err, AppError::Camera(CameraError::NoSuitableDevice));
        assert!(err.to_string().starts_with("Camera error"));

        let err: AppError = FormatError::OddDimensions {
            width: 3,
            height: 2,
        }
        .into();
        assert!(matches!(err, AppError::Format(_)));
    }
}
