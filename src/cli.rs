use clap::Parser;
use std::path::PathBuf;

use crate::state::settings::Settings;

/// A comic and manga reader for image folders and ZIP/CBZ archives
#[derive(Debug, Clone, Parser)]
#[command(name = "comic-reader", version, about)]
pub struct Args {
    /// Folder, .zip or .cbz file to open
    pub path: Option<PathBuf>,

    /// Enable/disable double-page mode
    #[arg(long, value_name = "BOOL")]
    pub double_page: Option<bool>,

    /// Enable/disable right-to-left mode
    #[arg(long, value_name = "BOOL")]
    pub right_to_left: Option<bool>,

    /// Keep the window decorations instead of a borderless maximized window
    #[arg(long)]
    pub windowed: bool,

    /// Don't read or write the reading history
    #[arg(long)]
    pub no_history: bool,
}

impl Args {
    /// Override saved settings with the ones given on the command line
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(double_page) = self.double_page {
            settings.double_page = double_page;
        }

        if let Some(right_to_left) = self.right_to_left {
            settings.right_to_left = right_to_left;
        }
    }
}
