//! Image annotation for detection results.
//!
//! Draws a box and a `class (confidence)` label for every prediction that
//! carries spatial fields. Images without detections pass through untouched.

pub mod annotate;
pub mod error;
pub mod font;

pub use annotate::{
    content_type_for_extension, extension_for_bytes, supported_extension, AnnotatedImage,
    AnnotationStyle, Annotator,
};
pub use error::{MediaError, MediaResult};
pub use font::{load_font, locate_font};
