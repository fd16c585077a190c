use chrono::DateTime;
use iced::alignment::{Horizontal, Vertical};
use iced::widget::image::{Handle, Image};
use iced::widget::{button, column, container, row, text, Container};
use iced::{Alignment, Color, ContentFit, Element, Length};
use std::collections::HashMap;

use crate::decode::DecodedPage;
use crate::state::library::BookRecord;
use crate::state::reader::Spread;
use crate::Message;

/// Display state of a visible page
#[derive(Debug, Clone)]
pub enum PageView {
    /// Bytes not read by the loader yet
    Loading,
    /// Bytes available, decoding in the background
    Decoding,
    Ready(Handle),
    Failed(String),
}

impl PageView {
    pub fn from_decoded(decoded: DecodedPage) -> Self {
        PageView::Ready(Handle::from_rgba(
            decoded.width,
            decoded.height,
            decoded.rgba,
        ))
    }

    /// Still waiting for the loader threads
    pub fn is_waiting(&self) -> bool {
        matches!(self, PageView::Loading)
    }
}

fn status<'a>(message: String) -> Element<'a, Message> {
    text(message).size(28).color(Color::WHITE).into()
}

/// A page scaled to fit the available height
/// `fill_width` stretches the image to the whole cell (single page mode)
fn page<'a>(view: Option<&PageView>, fill_width: bool) -> Element<'a, Message> {
    match view {
        Some(PageView::Ready(handle)) => {
            let image = Image::new(handle.clone())
                .height(Length::Fill)
                .content_fit(ContentFit::Contain);

            if fill_width {
                image.width(Length::Fill).into()
            } else {
                image.into()
            }
        }
        Some(PageView::Failed(err)) => status(format!("Failed to load page: {err}")),
        Some(PageView::Loading | PageView::Decoding) | None => status("Loading...".to_owned()),
    }
}

fn cell<'a>(content: Element<'a, Message>) -> Container<'a, Message> {
    container(content).width(Length::Fill).height(Length::Fill)
}

fn recent_label(book: &BookRecord) -> String {
    let name = book
        .path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| book.path.display().to_string());

    let opened = DateTime::from_timestamp(book.opened_at, 0)
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_default();

    if book.total_pages == 0 {
        format!("{name}  {opened}")
    } else {
        format!(
            "{name}  page {}/{}  {opened}",
            book.last_page + 1,
            book.total_pages
        )
    }
}

/// Shown when nothing is opened, with shortcuts to the last books read
fn empty_view<'a>(recent: &[BookRecord]) -> Element<'a, Message> {
    let mut content = column![status("Nothing to display".to_owned())]
        .spacing(12)
        .align_x(Alignment::Center);

    if !recent.is_empty() {
        content = content.push(text("Recently opened:").color(Color::WHITE));

        for book in recent {
            content = content.push(
                button(text(recent_label(book)))
                    .on_press(Message::OpenRecent(book.path.clone()))
                    .padding(8),
            );
        }
    }

    cell(content.into())
        .center_x(Length::Fill)
        .center_y(Length::Fill)
        .into()
}

/// Render the pages of a spread
pub fn spread_view<'a>(
    spread: Spread,
    views: &HashMap<usize, PageView>,
    recent: &[BookRecord],
) -> Element<'a, Message> {
    match spread {
        Spread::Empty => empty_view(recent),

        Spread::Single(current) => cell(page(views.get(&current), true))
            .center_x(Length::Fill)
            .center_y(Length::Fill)
            .into(),

        // Both pages meet at the middle of the screen, without any gap
        Spread::Double { left, right } => row![
            cell(page(views.get(&left), false))
                .align_x(Horizontal::Right)
                .align_y(Vertical::Center),
            cell(page(views.get(&right), false))
                .align_x(Horizontal::Left)
                .align_y(Vertical::Center),
        ]
        .width(Length::Fill)
        .height(Length::Fill)
        .into(),
    }
}

/// "current/total" indicator in the top-right corner
pub fn page_number_overlay<'a>(label: String) -> Element<'a, Message> {
    let badge = container(text(label).size(24).color(Color::WHITE))
        .padding([4, 10])
        .style(|_theme| container::Style {
            background: Some(Color::BLACK.into()),
            ..container::Style::default()
        });

    container(badge)
        .width(Length::Fill)
        .height(Length::Fill)
        .align_x(Horizontal::Right)
        .align_y(Vertical::Top)
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_recent_label() {
        let book = BookRecord {
            path: PathBuf::from("/comics/volume-02.cbz"),
            total_pages: 180,
            last_page: 41,
            opened_at: 0,
        };
        assert_eq!(recent_label(&book), "volume-02.cbz  page 42/180  1970-01-01");

        let empty = BookRecord {
            total_pages: 0,
            ..book
        };
        assert_eq!(recent_label(&empty), "volume-02.cbz  1970-01-01");
    }

    #[test]
    fn test_decoded_page_becomes_ready() {
        let decoded = DecodedPage {
            width: 1,
            height: 1,
            rgba: vec![255, 0, 0, 255],
        };

        let view = PageView::from_decoded(decoded);
        assert!(matches!(view, PageView::Ready(_)));
        assert!(!view.is_waiting());
        assert!(PageView::Loading.is_waiting());
        assert!(!PageView::Decoding.is_waiting());
    }
}
