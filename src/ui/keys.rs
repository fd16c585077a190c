/// Keyboard and mouse wheel bindings
///
/// Raw input is mapped to reader actions here. Arrow keys carry a screen side,
/// which only becomes a reading direction once the right-to-left setting is
/// known (see `step_for`).
use iced::keyboard::key::Named;
use iced::keyboard::{Key, Modifiers};
use iced::mouse::ScrollDelta;

use crate::sources::Direction;
use crate::state::reader::Step;

/// Minimal pixel delta for a wheel/touchpad scroll to turn the page
const SCROLL_PIXELS_THRESHOLD: f32 = 50.0;

/// High resolution wheels report fractions of a line, any of them turns the page
const SCROLL_LINES_THRESHOLD: f32 = f32::EPSILON;

/// Screen side of an arrow key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Arrow keys, Shift moves a single page in double page mode
    Turn { side: Side, single_step: bool },
    /// Page change in reading order (space bar, mouse wheel)
    Advance(Step),
    /// Open the previous/next book of the parent directory
    SiblingBook(Direction),
    FirstPage,
    LastPage,
    ToggleDoublePage,
    ToggleRightToLeft,
    TogglePagesNumber,
    ToggleFirstPageSingle,
    OpenJumpPrompt,
    OpenFile,
    OpenFolder,
    /// Closes the jump prompt, or exits
    /// Not produced by `action_for_key`, see `is_escape`
    Escape,
}

/// Reading direction of an arrow key
/// In right-to-left mode the left arrow moves forward
pub fn step_for(side: Side, right_to_left: bool) -> Step {
    match (side, right_to_left) {
        (Side::Left, false) | (Side::Right, true) => Step::Backward,
        (Side::Right, false) | (Side::Left, true) => Step::Forward,
    }
}

fn arrow(side: Side, modifiers: Modifiers) -> Action {
    if modifiers.control() {
        Action::SiblingBook(match side {
            Side::Left => Direction::Previous,
            Side::Right => Direction::Next,
        })
    } else {
        Action::Turn {
            side,
            single_step: modifiers.shift(),
        }
    }
}

/// Map a key press to an action
pub fn action_for_key(key: Key, modifiers: Modifiers) -> Option<Action> {
    match key.as_ref() {
        Key::Named(Named::ArrowLeft) => Some(arrow(Side::Left, modifiers)),
        Key::Named(Named::ArrowRight) => Some(arrow(Side::Right, modifiers)),
        Key::Named(Named::Space) => Some(Action::Advance(Step::Forward)),
        Key::Named(Named::Home) => Some(Action::FirstPage),
        Key::Named(Named::End) => Some(Action::LastPage),
        Key::Character(c) => match c.to_ascii_lowercase().as_str() {
            "o" if modifiers.control() && modifiers.shift() => Some(Action::OpenFolder),
            "o" if modifiers.control() => Some(Action::OpenFile),
            // Letters with Ctrl/Alt are left to the system
            _ if modifiers.control() || modifiers.alt() => None,
            "d" => Some(Action::ToggleDoublePage),
            "r" => Some(Action::ToggleRightToLeft),
            "i" => Some(Action::TogglePagesNumber),
            "f" => Some(Action::ToggleFirstPageSingle),
            "g" => Some(Action::OpenJumpPrompt),
            _ => None,
        },
        _ => None,
    }
}

/// Escape is listened to even when captured by a widget (the focused
/// prompt input), so it is kept out of `action_for_key`
pub fn is_escape(key: &Key) -> bool {
    matches!(key.as_ref(), Key::Named(Named::Escape))
}

/// Map a mouse wheel movement to a page change (up = previous page)
pub fn action_for_scroll(delta: ScrollDelta) -> Option<Action> {
    let (x, y, threshold) = match delta {
        ScrollDelta::Lines { x, y } => (x, y, SCROLL_LINES_THRESHOLD),
        ScrollDelta::Pixels { x, y } => (x, y, SCROLL_PIXELS_THRESHOLD),
    };

    if x >= threshold || y >= threshold {
        Some(Action::Advance(Step::Backward))
    } else if x <= -threshold || y <= -threshold {
        Some(Action::Advance(Step::Forward))
    } else {
        None
    }
}
