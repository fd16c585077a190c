/// Page navigation
///
/// Keeps track of the current page of the opened book and decides which
/// pages are on screen. The current page lives in an `AtomicUsize` shared
/// with the loader threads, which use it to load visible pages first.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;

use super::settings::Settings;

/// Direction of a page change, in reading order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Backward,
    Forward,
}

/// Pages currently on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Spread {
    /// Nothing to display
    Empty,
    /// A single page, centered
    Single(usize),
    /// Two pages side by side, in screen order (left, right)
    Double { left: usize, right: usize },
}

impl Spread {
    /// Visible pages, in screen order
    pub fn pages(&self) -> Vec<usize> {
        match *self {
            Spread::Empty => vec![],
            Spread::Single(page) => vec![page],
            Spread::Double { left, right } => vec![left, right],
        }
    }

    /// Page indicator: "-/0", "5/20" or "5-6/20" (1-based, reading order)
    pub fn label(&self, total_pages: usize) -> String {
        match *self {
            Spread::Empty => format!("-/{}", total_pages),
            Spread::Single(page) => format!("{}/{}", page + 1, total_pages),
            Spread::Double { left, right } => {
                let (first, second) = (left.min(right), left.max(right));
                format!("{}-{}/{}", first + 1, second + 1, total_pages)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JumpError {
    #[error("Invalid page number provided")]
    Invalid,

    #[error("Book only contains {total} pages")]
    OutOfRange { total: usize },
}

/// Navigation state for the opened book
pub struct Reader {
    total_pages: usize,
    current_page: Arc<AtomicUsize>,
}

impl Reader {
    pub fn new(total_pages: usize) -> Self {
        Self {
            total_pages,
            current_page: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    pub fn current_page(&self) -> usize {
        self.current_page.load(Ordering::Acquire)
    }

    /// Shared handle on the current page, for the loader threads
    pub fn current_page_handle(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.current_page)
    }

    fn last_index(&self) -> usize {
        self.total_pages.saturating_sub(1)
    }

    fn set_page(&self, page: usize) {
        self.current_page
            .store(page.min(self.last_index()), Ordering::Release);
    }

    /// Move one step backward or forward
    ///
    /// In double page mode a step is two pages, unless `single_step` is set
    /// or the cover is displayed alone on page 0.
    pub fn relative_change(&self, step: Step, single_step: bool, settings: &Settings) {
        let current = self.current_page();

        let double_step = settings.double_page
            && !single_step
            && (current != 0 || !settings.display_first_page_in_single_mode);
        let amount = if double_step { 2 } else { 1 };

        let target = match step {
            Step::Backward => current.saturating_sub(amount),
            Step::Forward => current.saturating_add(amount),
        };

        self.set_page(target);
    }

    /// Go to the first page
    pub fn first(&self) {
        self.set_page(0);
    }

    /// Go to the last page (last spread in double page mode)
    pub fn last(&self, settings: &Settings) {
        let page = if settings.double_page && self.total_pages >= 2 {
            self.total_pages - 2
        } else {
            self.last_index()
        };

        self.set_page(page);
    }

    /// Jump to a 1-based page number typed by the user
    /// Returns the new (0-based) current page
    pub fn jump(&self, input: &str) -> Result<usize, JumpError> {
        let page = input
            .trim()
            .parse::<usize>()
            .map_err(|_| JumpError::Invalid)?;

        if page == 0 {
            return Err(JumpError::Invalid);
        }

        if page > self.total_pages {
            return Err(JumpError::OutOfRange {
                total: self.total_pages,
            });
        }

        self.set_page(page - 1);
        Ok(page - 1)
    }

    /// Restore a saved position, clamped to the book
    pub fn restore(&self, page: usize) {
        self.set_page(page);
    }

    /// Pages to display for the current position
    pub fn spread(&self, settings: &Settings) -> Spread {
        if self.total_pages == 0 {
            return Spread::Empty;
        }

        let current = self.current_page();

        if !settings.double_page
            || current + 1 >= self.total_pages
            || (current == 0 && settings.display_first_page_in_single_mode)
        {
            return Spread::Single(current);
        }

        if settings.right_to_left {
            Spread::Double {
                left: current + 1,
                right: current,
            }
        } else {
            Spread::Double {
                left: current,
                right: current + 1,
            }
        }
    }
}

impl fmt::Debug for Reader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reader")
            .field("total_pages", &self.total_pages)
            .field("current_page", &self.current_page())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn double() -> Settings {
        Settings {
            double_page: true,
            ..Settings::default()
        }
    }

    #[test]
    fn test_single_page_navigation() {
        let reader = Reader::new(3);
        let settings = Settings::default();

        reader.relative_change(Step::Forward, false, &settings);
        assert_eq!(reader.current_page(), 1);

        reader.relative_change(Step::Forward, false, &settings);
        reader.relative_change(Step::Forward, false, &settings);
        assert_eq!(reader.current_page(), 2, "clamped to the last page");

        reader.relative_change(Step::Backward, false, &settings);
        assert_eq!(reader.current_page(), 1);
    }

    #[test]
    fn test_backward_stops_at_first_page() {
        let reader = Reader::new(10);
        reader.relative_change(Step::Backward, false, &double());
        assert_eq!(reader.current_page(), 0);
    }

    #[test]
    fn test_double_page_steps_by_two_after_cover() {
        let reader = Reader::new(10);
        let settings = double();

        // Cover is alone, single step
        reader.relative_change(Step::Forward, false, &settings);
        assert_eq!(reader.current_page(), 1);

        reader.relative_change(Step::Forward, false, &settings);
        assert_eq!(reader.current_page(), 3);

        // Shift moves one page to fix the pairing
        reader.relative_change(Step::Forward, true, &settings);
        assert_eq!(reader.current_page(), 4);

        reader.relative_change(Step::Backward, false, &settings);
        assert_eq!(reader.current_page(), 2);
    }

    #[test]
    fn test_double_page_without_single_cover() {
        let reader = Reader::new(10);
        let settings = Settings {
            display_first_page_in_single_mode: false,
            ..double()
        };

        reader.relative_change(Step::Forward, false, &settings);
        assert_eq!(reader.current_page(), 2);
    }

    #[test]
    fn test_empty_book() {
        let reader = Reader::new(0);
        let settings = double();

        reader.relative_change(Step::Forward, false, &settings);
        reader.last(&settings);
        assert_eq!(reader.current_page(), 0);
        assert_eq!(reader.spread(&settings), Spread::Empty);
        assert_eq!(reader.spread(&settings).label(0), "-/0");
    }

    #[test]
    fn test_first_and_last() {
        let reader = Reader::new(7);

        reader.last(&Settings::default());
        assert_eq!(reader.current_page(), 6);

        reader.last(&double());
        assert_eq!(reader.current_page(), 5);

        reader.first();
        assert_eq!(reader.current_page(), 0);

        let one_page = Reader::new(1);
        one_page.last(&double());
        assert_eq!(one_page.current_page(), 0);
    }

    #[test]
    fn test_jump() {
        let reader = Reader::new(12);

        assert_eq!(reader.jump(" 5 "), Ok(4));
        assert_eq!(reader.current_page(), 4);

        assert_eq!(reader.jump("0"), Err(JumpError::Invalid));
        assert_eq!(reader.jump("abc"), Err(JumpError::Invalid));
        assert_eq!(reader.jump("-3"), Err(JumpError::Invalid));
        assert_eq!(reader.jump("13"), Err(JumpError::OutOfRange { total: 12 }));
        assert_eq!(reader.current_page(), 4, "errors keep the position");

        assert_eq!(reader.jump("12"), Ok(11));
    }

    #[test]
    fn test_jump_error_messages() {
        assert_eq!(
            JumpError::OutOfRange { total: 3 }.to_string(),
            "Book only contains 3 pages"
        );
    }

    #[test]
    fn test_restore_clamps() {
        let reader = Reader::new(4);
        reader.restore(2);
        assert_eq!(reader.current_page(), 2);

        reader.restore(40);
        assert_eq!(reader.current_page(), 3);
    }

    #[test]
    fn test_spread_single_mode() {
        let reader = Reader::new(5);
        reader.restore(2);

        let spread = reader.spread(&Settings::default());
        assert_eq!(spread, Spread::Single(2));
        assert_eq!(spread.label(5), "3/5");
    }

    #[test]
    fn test_spread_double_mode() {
        let reader = Reader::new(6);
        let settings = double();

        assert_eq!(reader.spread(&settings), Spread::Single(0), "cover alone");

        reader.restore(1);
        let spread = reader.spread(&settings);
        assert_eq!(spread, Spread::Double { left: 1, right: 2 });
        assert_eq!(spread.label(6), "2-3/6");

        // The last page has no partner
        reader.restore(5);
        assert_eq!(reader.spread(&settings), Spread::Single(5));
    }

    #[test]
    fn test_spread_right_to_left() {
        let reader = Reader::new(6);
        let settings = Settings {
            right_to_left: true,
            ..double()
        };

        reader.restore(3);
        let spread = reader.spread(&settings);
        assert_eq!(spread, Spread::Double { left: 4, right: 3 });
        assert_eq!(spread.pages(), vec![4, 3]);
        // Label stays in reading order
        assert_eq!(spread.label(6), "4-5/6");
    }

    #[test]
    fn test_shared_handle() {
        let reader = Reader::new(10);
        let handle = reader.current_page_handle();

        reader.restore(7);
        assert_eq!(handle.load(Ordering::Acquire), 7);
    }
}
