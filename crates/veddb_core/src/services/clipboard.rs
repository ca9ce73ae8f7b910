//! System clipboard port.

use crate::error::VeddbError;

/// Text clipboard, supplied by the host UI.
///
/// Copy operations always write the exact serialized query text, never the
/// display summary.
pub trait Clipboard {
    /// Replace the clipboard contents with `text`.
    fn write_text(&self, text: &str) -> Result<(), VeddbError>;
}
