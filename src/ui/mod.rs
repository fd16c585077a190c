/// User interface
///
/// - `keys.rs` - keyboard and mouse wheel bindings
/// - `pages.rs` - page layout (single page, double page spread, page number)
/// - `prompt.rs` - "jump to page" modal

pub mod keys;
pub mod pages;
pub mod prompt;

use rfd::{MessageDialog, MessageLevel};
use std::fmt::Display;

/// Show a blocking error dialog
pub fn show_error_dialog(err: &dyn Display) {
    let description = err.to_string();
    tracing::error!("{}", description);

    MessageDialog::new()
        .set_level(MessageLevel::Error)
        .set_title("Error")
        .set_description(description.as_str())
        .show();
}
