use std::error::Error;
use std::fmt;

/// Error taxonomy shared by every codec entry point. Each variant maps 1:1
/// to a user-facing status code, so callers can surface failures without
/// inspecting the message text.
#[derive(Debug)]
pub enum PortError {
    /// Input too small or structurally unrecognizable to attempt parsing.
    InvalidFormat(String),
    /// NBT decoded but required fields are missing, malformed, or reference
    /// an out-of-range palette index.
    ParseError(String),
    /// Canonical model failed validation or a format-specific cap.
    ExportFailed(String),
    /// Requested target format has no serializer.
    UnsupportedConversion(String),
    /// Source or target Minecraft version is below the supported minimum.
    UnsupportedVersion(String),
    /// Conversion pipeline failed after the version gate.
    ConversionFailed(String),
    /// No cached structure under the requested ID.
    NotFound(String),
    IoError(std::io::Error),
}

impl PortError {
    /// Stable status code for the presentation layer.
    pub fn code(&self) -> &'static str {
        match self {
            PortError::InvalidFormat(_) => "INVALID_FORMAT",
            PortError::ParseError(_) => "PARSE_ERROR",
            PortError::ExportFailed(_) => "EXPORT_FAILED",
            PortError::UnsupportedConversion(_) => "UNSUPPORTED_CONVERSION",
            PortError::UnsupportedVersion(_) => "UNSUPPORTED_VERSION",
            PortError::ConversionFailed(_) => "CONVERSION_FAILED",
            PortError::NotFound(_) => "NOT_FOUND",
            PortError::IoError(_) => "IO_ERROR",
        }
    }
}

impl fmt::Display for PortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortError::InvalidFormat(msg) => write!(f, "Invalid format: {}", msg),
            PortError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            PortError::ExportFailed(msg) => write!(f, "Export failed: {}", msg),
            PortError::UnsupportedConversion(msg) => write!(f, "Unsupported conversion: {}", msg),
            PortError::UnsupportedVersion(msg) => write!(f, "Unsupported version: {}", msg),
            PortError::ConversionFailed(msg) => write!(f, "Conversion failed: {}", msg),
            PortError::NotFound(msg) => write!(f, "Not found: {}", msg),
            PortError::IoError(err) => write!(f, "IO error: {}", err),
        }
    }
}

impl Error for PortError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PortError::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PortError {
    fn from(err: std::io::Error) -> Self {
        PortError::IoError(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(PortError::InvalidFormat(String::new()).code(), "INVALID_FORMAT");
        assert_eq!(PortError::ParseError(String::new()).code(), "PARSE_ERROR");
        assert_eq!(PortError::ExportFailed(String::new()).code(), "EXPORT_FAILED");
        assert_eq!(
            PortError::UnsupportedConversion(String::new()).code(),
            "UNSUPPORTED_CONVERSION"
        );
        assert_eq!(
            PortError::UnsupportedVersion(String::new()).code(),
            "UNSUPPORTED_VERSION"
        );
        assert_eq!(PortError::NotFound(String::new()).code(), "NOT_FOUND");
    }

    #[test]
    fn test_display_includes_message() {
        let err = PortError::ParseError("missing tag `Width`".to_string());
        assert_eq!(err.to_string(), "Parse error: missing tag `Width`");
    }

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let err: PortError = io.into();
        assert_eq!(err.code(), "IO_ERROR");
    }
}
