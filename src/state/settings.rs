/// Reader display settings
///
/// Persisted as JSON in the library database and restored on startup.

use serde::{Deserialize, Serialize};

/// All user-togglable display options
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Read from right to left (manga)
    /// - In double page mode, the first page of a spread is on the right
    /// - Left arrow moves forward
    pub right_to_left: bool,

    /// Show two pages side by side
    pub double_page: bool,

    /// Show the "current/total" overlay in the top-right corner
    pub display_pages_number: bool,

    /// In double page mode, keep the first page (the cover) alone
    pub display_first_page_in_single_mode: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            right_to_left: false,
            double_page: false,
            display_pages_number: false,
            display_first_page_in_single_mode: true,
        }
    }
}

impl Settings {
    /// Convert to JSON string for database storage
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse from JSON string (from database)
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn toggle_double_page(&mut self) {
        self.double_page = !self.double_page;
    }

    pub fn toggle_right_to_left(&mut self) {
        self.right_to_left = !self.right_to_left;
    }

    pub fn toggle_pages_number(&mut self) {
        self.display_pages_number = !self.display_pages_number;
    }

    pub fn toggle_first_page_single(&mut self) {
        self.display_first_page_in_single_mode = !self.display_first_page_in_single_mode;
    }
}
