// Don't open a terminal when launching the reader on Windows
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use clap::Parser;
use iced::time;
use iced::widget::{container, Stack};
use iced::{event, keyboard, mouse, window, Color, Element, Event, Length, Subscription, Task, Theme};
use rfd::FileDialog;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod cli;
mod decode;
mod loader;
mod sources;
mod state;
mod ui;

use cli::Args;
use decode::{decode_page_async, DecodedPage};
use loader::PageLoader;
use sources::{neighbour, open_source, Direction, SourceError};
use state::library::{BookRecord, Library};
use state::reader::Reader;
use state::settings::Settings;
use ui::keys::{self, Action};
use ui::pages::PageView;
use ui::prompt::JumpPrompt;

/// How often visible pages are checked while the loader is still reading them
const LOADING_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How often the loading progress in the title is refreshed
const PROGRESS_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Archive extensions offered by the open-file dialog
const COMIC_EXTENSIONS: [&str; 2] = ["zip", "cbz"];

/// Number of books offered on the empty screen
const RECENT_BOOKS_LIMIT: usize = 8;

/// Main application state
struct ComicReader {
    /// Reading history and saved settings (None if the database is unavailable)
    library: Option<Library>,
    settings: Settings,
    /// Currently opened folder or archive (None = nothing opened)
    path: Option<PathBuf>,
    reader: Reader,
    loader: PageLoader,
    /// Bumped each time a book is opened, decode results of older books are dropped
    generation: u64,
    /// Display state of the visible pages only
    visible: HashMap<usize, PageView>,
    /// "Jump to page" modal, if opened
    prompt: Option<JumpPrompt>,
    /// Last books read, offered when nothing is opened
    recent: Vec<BookRecord>,
}

/// Application messages (events)
#[derive(Debug, Clone)]
enum Message {
    /// Keyboard shortcut or mouse wheel
    Action(Action),
    /// A file or folder was dropped on the window
    FileDropped(PathBuf),
    /// A book of the history was picked
    OpenRecent(PathBuf),
    /// Periodic check while visible pages are loading
    Tick,
    /// Background decoding of a page finished
    PageDecoded {
        generation: u64,
        page: usize,
        result: Result<DecodedPage, String>,
    },
    PromptInput(String),
    PromptSubmit,
    PromptCancel,
}

impl ComicReader {
    /// Create a new instance of the application
    fn new(args: Args) -> (Self, Task<Message>) {
        let library = if args.no_history {
            Library::open_in_memory()
        } else {
            Library::open_default()
        };

        let library = match library {
            Ok(library) => Some(library),
            Err(err) => {
                tracing::warn!("Reading history unavailable: {}", err);
                None
            }
        };

        let mut settings = library
            .as_ref()
            .and_then(|library| match library.load_settings() {
                Ok(settings) => Some(settings),
                Err(err) => {
                    tracing::warn!("Failed to load settings, using defaults: {}", err);
                    None
                }
            })
            .unwrap_or_default();
        args.apply(&mut settings);

        let reader = Reader::new(0);

        let mut app = ComicReader {
            library,
            settings,
            path: None,
            reader,
            loader: PageLoader::idle(),
            generation: 0,
            visible: HashMap::new(),
            prompt: None,
            recent: Vec::new(),
        };
        app.load_recent();

        let mut tasks = Vec::new();

        if !args.windowed {
            tasks.push(window::get_oldest().and_then(|id| window::maximize(id, true)));
        }

        if let Some(path) = args.path {
            if let Err(err) = app.open_book(path) {
                ui::show_error_dialog(&err);
                return (app, window::get_latest().and_then(window::close));
            }
            tasks.push(app.refresh_pages());
        }

        app.save_settings();
        tracing::info!("Comic reader started");

        (app, Task::batch(tasks))
    }

    fn title(&self) -> String {
        let Some(name) = self.path.as_ref().and_then(|path| path.file_name()) else {
            return "Comic Reader".to_owned();
        };

        if self.loader.is_complete() {
            format!("{} - Comic Reader", name.to_string_lossy())
        } else {
            format!(
                "{} ({}/{} loaded) - Comic Reader",
                name.to_string_lossy(),
                self.loader.loaded_count(),
                self.reader.total_pages()
            )
        }
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }

    /// Open a folder or an archive
    ///
    /// The new book is fully validated before the current one is closed, so
    /// a failure leaves the reader untouched.
    fn open_book(&mut self, path: PathBuf) -> Result<(), SourceError> {
        let path = path.canonicalize().unwrap_or(path);
        let source = open_source(&path)?;

        let reader = Reader::new(source.total_pages());
        if let Some(page) = self.saved_position(&path) {
            reader.restore(page);
        }

        let loader = PageLoader::start(&*source, reader.current_page_handle())?;

        // Stop the previous workers before switching
        self.loader.shutdown();
        self.loader = loader;
        self.reader = reader;
        self.generation += 1;
        self.visible.clear();
        self.prompt = None;

        tracing::info!(
            "Opened {} ({} pages)",
            path.display(),
            self.reader.total_pages()
        );

        if let Some(library) = &self.library {
            if let Err(err) = library.record_open(&path, self.reader.total_pages()) {
                tracing::warn!("Failed to record {} in history: {}", path.display(), err);
            }
        }

        self.path = Some(path);
        self.load_recent();
        Ok(())
    }

    fn load_recent(&mut self) {
        let Some(library) = &self.library else {
            return;
        };

        match library.recent_books(RECENT_BOOKS_LIMIT) {
            Ok(recent) => self.recent = recent,
            Err(err) => tracing::warn!("Failed to read history: {}", err),
        }
    }

    fn saved_position(&self, path: &std::path::Path) -> Option<usize> {
        let library = self.library.as_ref()?;

        match library.last_page(path) {
            Ok(page) => page,
            Err(err) => {
                tracing::warn!("Failed to read saved position: {}", err);
                None
            }
        }
    }

    fn open_and_refresh(&mut self, path: PathBuf) -> Task<Message> {
        match self.open_book(path) {
            Ok(()) => self.refresh_pages(),
            Err(err) => {
                ui::show_error_dialog(&err);
                Task::none()
            }
        }
    }

    fn save_settings(&self) {
        if let Some(library) = &self.library {
            if let Err(err) = library.save_settings(&self.settings) {
                tracing::warn!("Failed to save settings: {}", err);
            }
        }
    }

    fn save_progress(&self) {
        let (Some(library), Some(path)) = (&self.library, &self.path) else {
            return;
        };

        if let Err(err) = library.save_progress(path, self.reader.current_page()) {
            tracing::warn!("Failed to save reading position: {}", err);
        }
    }

    /// Update the display state of the visible pages
    /// Pages whose bytes just became available are sent to decoding
    fn refresh_pages(&mut self) -> Task<Message> {
        let pages = self.reader.spread(&self.settings).pages();

        // Only the visible pages keep their texture
        self.visible.retain(|page, _| pages.contains(page));

        let mut tasks = Vec::new();

        for page in pages {
            if matches!(
                self.visible.get(&page),
                Some(PageView::Decoding | PageView::Ready(_) | PageView::Failed(_))
            ) {
                continue;
            }

            let view = match self.loader.get(page) {
                None => PageView::Loading,
                Some(Err(err)) => PageView::Failed(err.to_string()),
                Some(Ok(data)) => {
                    let generation = self.generation;
                    tasks.push(Task::perform(decode_page_async(data), move |result| {
                        Message::PageDecoded {
                            generation,
                            page,
                            result,
                        }
                    }));
                    PageView::Decoding
                }
            };

            self.visible.insert(page, view);
        }

        Task::batch(tasks)
    }

    /// Position changed, persist it and show the new pages
    fn after_navigation(&mut self) -> Task<Message> {
        self.save_progress();
        self.refresh_pages()
    }

    /// Display settings changed
    fn after_settings_change(&mut self) -> Task<Message> {
        self.save_settings();
        self.refresh_pages()
    }

    fn open_dialog(&mut self, folder: bool) -> Task<Message> {
        let mut dialog = FileDialog::new();

        if let Some(parent_dir) = self.path.as_ref().and_then(|path| path.parent()) {
            dialog = dialog.set_directory(parent_dir);
        }

        if let Some((name, extensions)) = dialog_filter(folder) {
            dialog = dialog.add_filter(name, extensions);
        }

        let item = if folder {
            dialog.set_title("Open Folder").pick_folder()
        } else {
            dialog.set_title("Open Comic").pick_file()
        };

        match item {
            Some(item) => self.open_and_refresh(item),
            None => Task::none(),
        }
    }

    fn open_sibling(&mut self, direction: Direction) -> Task<Message> {
        // Nothing opened, nothing to move from
        let Some(path) = self.path.clone() else {
            return Task::none();
        };

        match neighbour(&path, direction) {
            Ok(sibling) => self.open_and_refresh(sibling),
            Err(err) => {
                ui::show_error_dialog(&err);
                Task::none()
            }
        }
    }

    fn exit(&mut self) -> Task<Message> {
        self.save_progress();
        self.save_settings();
        self.loader.shutdown();

        tracing::info!("Exiting");
        window::get_latest().and_then(window::close)
    }

    fn handle_action(&mut self, action: Action) -> Task<Message> {
        match action {
            Action::Turn { side, single_step } => {
                let step = keys::step_for(side, self.settings.right_to_left);
                self.reader
                    .relative_change(step, single_step, &self.settings);
                self.after_navigation()
            }
            Action::Advance(step) => {
                self.reader.relative_change(step, false, &self.settings);
                self.after_navigation()
            }
            Action::SiblingBook(direction) => self.open_sibling(direction),
            Action::FirstPage => {
                self.reader.first();
                self.after_navigation()
            }
            Action::LastPage => {
                self.reader.last(&self.settings);
                self.after_navigation()
            }
            Action::ToggleDoublePage => {
                self.settings.toggle_double_page();
                self.after_settings_change()
            }
            Action::ToggleRightToLeft => {
                self.settings.toggle_right_to_left();
                self.after_settings_change()
            }
            Action::TogglePagesNumber => {
                self.settings.toggle_pages_number();
                self.after_settings_change()
            }
            Action::ToggleFirstPageSingle => {
                self.settings.toggle_first_page_single();
                self.after_settings_change()
            }
            Action::OpenJumpPrompt => {
                let (prompt, focus) = JumpPrompt::open();
                self.prompt = Some(prompt);
                focus
            }
            Action::OpenFile => self.open_dialog(false),
            Action::OpenFolder => self.open_dialog(true),
            Action::Escape => {
                if self.prompt.take().is_some() {
                    Task::none()
                } else {
                    self.exit()
                }
            }
        }
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Action(action) => self.handle_action(action),
            Message::FileDropped(path) | Message::OpenRecent(path) => self.open_and_refresh(path),
            Message::Tick => self.refresh_pages(),
            Message::PageDecoded {
                generation,
                page,
                result,
            } => {
                // Late result from a previously opened book
                if generation != self.generation {
                    return Task::none();
                }

                // Only pages still on screen are kept
                if let Some(view) = self.visible.get_mut(&page) {
                    *view = match result {
                        Ok(decoded) => PageView::from_decoded(decoded),
                        Err(err) => {
                            tracing::warn!("Failed to decode page {}: {}", page, err);
                            PageView::Failed(err)
                        }
                    };
                }

                Task::none()
            }
            Message::PromptInput(input) => {
                if let Some(prompt) = &mut self.prompt {
                    prompt.set_input(input);
                }
                Task::none()
            }
            Message::PromptSubmit => {
                let Some(prompt) = &mut self.prompt else {
                    return Task::none();
                };

                match self.reader.jump(&prompt.input) {
                    Ok(_) => {
                        self.prompt = None;
                        self.after_navigation()
                    }
                    Err(err) => {
                        prompt.error = Some(err.to_string());
                        Task::none()
                    }
                }
            }
            Message::PromptCancel => {
                self.prompt = None;
                Task::none()
            }
        }
    }

    /// Refresh rate needed while pages are still being read, `None` once
    /// the whole book is loaded
    fn poll_interval(&self) -> Option<Duration> {
        if self.visible.values().any(PageView::is_waiting) {
            Some(LOADING_POLL_INTERVAL)
        } else if !self.loader.is_complete() {
            Some(PROGRESS_POLL_INTERVAL)
        } else {
            None
        }
    }

    fn subscription(&self) -> Subscription<Message> {
        let key_presses = keyboard::on_key_press(|key, modifiers| {
            keys::action_for_key(key, modifiers).map(Message::Action)
        });

        let events = event::listen_with(|event, status, _window| match event {
            Event::Window(window::Event::FileDropped(path)) => Some(Message::FileDropped(path)),
            // A focused prompt input captures Escape, it must still close the prompt
            Event::Keyboard(keyboard::Event::KeyPressed { key, .. }) if keys::is_escape(&key) => {
                Some(Message::Action(Action::Escape))
            }
            Event::Mouse(mouse::Event::WheelScrolled { delta })
                if matches!(status, event::Status::Ignored) =>
            {
                keys::action_for_scroll(delta).map(Message::Action)
            }
            _ => None,
        });

        let mut subscriptions = vec![key_presses, events];

        if let Some(interval) = self.poll_interval() {
            subscriptions.push(time::every(interval).map(|_| Message::Tick));
        }

        Subscription::batch(subscriptions)
    }

    /// Build the user interface
    fn view(&self) -> Element<'_, Message> {
        let spread = self.reader.spread(&self.settings);

        let mut layers = Stack::new()
            .width(Length::Fill)
            .height(Length::Fill)
            .push(ui::pages::spread_view(spread, &self.visible, &self.recent));

        if self.settings.display_pages_number {
            layers = layers.push(ui::pages::page_number_overlay(
                spread.label(self.reader.total_pages()),
            ));
        }

        if let Some(prompt) = &self.prompt {
            layers = layers.push(prompt.view());
        }

        container(layers)
            .width(Length::Fill)
            .height(Length::Fill)
            .style(|_theme| container::Style {
                background: Some(Color::BLACK.into()),
                ..container::Style::default()
            })
            .into()
    }
}

/// Extension filter of the open dialog, folder pickers are not filtered
fn dialog_filter(folder: bool) -> Option<(&'static str, &'static [&'static str])> {
    if folder {
        None
    } else {
        Some(("comics", &COMIC_EXTENSIONS[..]))
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("comic_reader=info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> iced::Result {
    init_logging();
    let args = Args::parse();

    // Borderless maximized window unless asked otherwise
    let window = window::Settings {
        decorations: args.windowed,
        ..window::Settings::default()
    };

    iced::application(ComicReader::title, ComicReader::update, ComicReader::view)
        .subscription(ComicReader::subscription)
        .theme(ComicReader::theme)
        .window(window)
        .run_with(move || ComicReader::new(args))
}

#[cfg(test)]
mod tests {
    use super::*;
    use state::reader::Spread;
    use std::fs::{self, File};
    use std::io::Write;
    use std::path::Path;
    use std::thread;
    use std::time::Instant;
    use tempfile::tempdir;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn reader_app() -> ComicReader {
        let args = Args::try_parse_from(["comic-reader", "--no-history", "--windowed"]).unwrap();
        let (app, _) = ComicReader::new(args);
        app
    }

    /// Folder of `pages` files, their content is never decoded here
    fn image_folder(root: &Path, name: &str, pages: usize) -> PathBuf {
        let dir = root.join(name);
        fs::create_dir(&dir).unwrap();
        for page in 0..pages {
            fs::write(dir.join(format!("{page:02}.png")), b"page").unwrap();
        }
        dir
    }

    fn comic_archive(root: &Path, name: &str, pages: usize) -> PathBuf {
        let path = root.join(name);
        let mut writer = ZipWriter::new(File::create(&path).unwrap());
        for page in 0..pages {
            writer
                .start_file(format!("{page:02}.jpg"), SimpleFileOptions::default())
                .unwrap();
            writer.write_all(b"page").unwrap();
        }
        writer.finish().unwrap();
        path
    }

    fn wait_until_loaded(app: &ComicReader) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !app.loader.is_complete() {
            assert!(Instant::now() < deadline, "book did not load in time");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_nothing_opened() {
        let app = reader_app();

        assert_eq!(app.path, None);
        assert_eq!(app.title(), "Comic Reader");
        assert_eq!(app.poll_interval(), None);
        assert_eq!(app.reader.spread(&app.settings), Spread::Empty);
    }

    #[test]
    fn test_failed_open_keeps_current_book() {
        let dir = tempdir().unwrap();
        let book = image_folder(dir.path(), "volume-01", 3);
        let mut app = reader_app();

        app.open_book(book.clone()).unwrap();
        let _ = app.refresh_pages();
        let generation = app.generation;

        let result = app.open_book(dir.path().join("missing.cbz"));
        assert!(matches!(result, Err(SourceError::NotFound(_))));

        assert_eq!(app.path, Some(book.canonicalize().unwrap()));
        assert_eq!(app.generation, generation);
        assert_eq!(app.reader.total_pages(), 3);
        assert!(app.visible.contains_key(&0));

        // The loader of the current book keeps running
        wait_until_loaded(&app);
        assert!(app.loader.get(2).unwrap().is_ok());
    }

    #[test]
    fn test_stale_decode_result_is_dropped() {
        let dir = tempdir().unwrap();
        let mut app = reader_app();

        app.open_book(image_folder(dir.path(), "volume-01", 2)).unwrap();
        app.open_book(image_folder(dir.path(), "volume-02", 2)).unwrap();
        let _ = app.refresh_pages();

        let _ = app.update(Message::PageDecoded {
            generation: app.generation - 1,
            page: 0,
            result: Err("from the previous book".to_owned()),
        });
        assert!(!matches!(app.visible.get(&0), Some(PageView::Failed(_))));

        let _ = app.update(Message::PageDecoded {
            generation: app.generation,
            page: 0,
            result: Err("broken".to_owned()),
        });
        assert!(matches!(app.visible.get(&0), Some(PageView::Failed(err)) if err == "broken"));
    }

    #[test]
    fn test_position_restored_on_reopen() {
        let dir = tempdir().unwrap();
        let first = image_folder(dir.path(), "volume-01", 5);
        let second = comic_archive(dir.path(), "volume-02.cbz", 4);
        let mut app = reader_app();

        let _ = app.update(Message::OpenRecent(first.clone()));
        let _ = app.update(Message::Action(Action::LastPage));
        assert_eq!(app.reader.current_page(), 4);

        let _ = app.update(Message::FileDropped(second));
        assert_eq!(app.reader.total_pages(), 4);
        assert_eq!(app.reader.current_page(), 0);

        let _ = app.update(Message::OpenRecent(first));
        assert_eq!(app.reader.current_page(), 4);
        assert_eq!(app.recent.len(), 2);
    }

    #[test]
    fn test_escape_closes_prompt_first() {
        let dir = tempdir().unwrap();
        let mut app = reader_app();
        app.open_book(image_folder(dir.path(), "volume-01", 3)).unwrap();

        let _ = app.update(Message::Action(Action::OpenJumpPrompt));
        let _ = app.update(Message::PromptInput("9".to_owned()));
        let _ = app.update(Message::PromptSubmit);
        assert_eq!(
            app.prompt.as_ref().and_then(|prompt| prompt.error.clone()),
            Some("Book only contains 3 pages".to_owned())
        );

        let _ = app.update(Message::Action(Action::Escape));
        assert!(app.prompt.is_none());
        // Only the prompt was closed, the book stays where it was
        assert!(app.path.is_some());
        assert_eq!(app.reader.current_page(), 0);
    }

    #[test]
    fn test_only_file_dialog_is_filtered() {
        assert_eq!(dialog_filter(true), None);
        assert_eq!(dialog_filter(false), Some(("comics", &["zip", "cbz"][..])));
    }

    #[test]
    fn test_polling_stops_once_loaded() {
        let dir = tempdir().unwrap();
        let mut app = reader_app();
        app.open_book(image_folder(dir.path(), "volume-01", 6)).unwrap();

        wait_until_loaded(&app);
        let _ = app.refresh_pages();

        // Visible pages are now decoding, nothing left to wait for
        assert_eq!(app.poll_interval(), None);
        assert_eq!(app.title(), "volume-01 - Comic Reader");
    }
}
