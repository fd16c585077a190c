use iced::widget::{button, column, container, row, text, text_input};
use iced::{Border, Color, Element, Length, Task, Theme};

use crate::Message;

/// "Jump to page" modal
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JumpPrompt {
    pub input: String,
    /// Validation error of the last submission
    pub error: Option<String>,
}

fn input_id() -> text_input::Id {
    text_input::Id::new("jump-to-page")
}

impl JumpPrompt {
    /// Open the prompt with the keyboard focus on its input
    pub fn open() -> (Self, Task<Message>) {
        (Self::default(), text_input::focus(input_id()))
    }

    pub fn set_input(&mut self, input: String) {
        self.input = input;
        self.error = None;
    }

    pub fn view(&self) -> Element<'_, Message> {
        let input = text_input("Page number", &self.input)
            .id(input_id())
            .on_input(Message::PromptInput)
            .on_submit(Message::PromptSubmit)
            .padding(8);

        let error = self
            .error
            .as_ref()
            .map(|err| text(err.as_str()).color(Color::from_rgb(1.0, 0.4, 0.4)));

        let panel = container(
            column![
                text("Jump to page:"),
                input,
            ]
            .push_maybe(error)
            .push(
                row![
                    button("OK").on_press(Message::PromptSubmit),
                    button("Cancel").on_press(Message::PromptCancel),
                ]
                .spacing(10),
            )
            .spacing(12),
        )
        .padding(20)
        .width(320)
        .style(panel_style);

        container(panel)
            .width(Length::Fill)
            .height(Length::Fill)
            .center_x(Length::Fill)
            .center_y(Length::Fill)
            .into()
    }
}

fn panel_style(theme: &Theme) -> container::Style {
    let palette = theme.extended_palette();

    container::Style {
        background: Some(palette.background.weak.color.into()),
        text_color: Some(palette.background.weak.text),
        border: Border {
            color: palette.background.strong.color,
            width: 1.0,
            radius: 6.0.into(),
        },
        ..container::Style::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typing_clears_error() {
        let (mut prompt, _) = JumpPrompt::open();
        assert_eq!(prompt.input, "");

        prompt.error = Some("Invalid page number provided".to_owned());
        prompt.set_input("12".to_owned());

        assert_eq!(prompt.input, "12");
        assert_eq!(prompt.error, None);
    }
}
