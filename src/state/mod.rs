/// State management module
///
/// This module handles all application state, including:
/// - Page navigation for the opened book (reader.rs)
/// - Display settings (settings.rs)
/// - Reading history and saved preferences (library.rs)

pub mod library;
pub mod reader;
pub mod settings;
