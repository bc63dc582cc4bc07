pub mod filename;
pub mod reference;
pub mod variant;

pub use filename::{content_type, AttachmentName};
pub use reference::{MediaReference, ReferenceError};
pub use variant::{FormatVariant, MediaMetadata, ResolvedMedia, VariantKind};
