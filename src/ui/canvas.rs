use iced::mouse::{self, Cursor};
use iced::widget::canvas::{self, Frame, Path, Program, Stroke};
use iced::{Color, Point, Rectangle, Renderer, Theme, Vector};

use crate::Message;

/// Interaction layer over the crop preview.
///
/// The rendered crop sits underneath; this canvas only draws the crop circle
/// and turns mouse input into pan/zoom messages. Drag messages carry the
/// total translation since the button went down, matching `CropTransform`.
pub struct CropOverlay {
    /// Diameter of the crop circle in logical pixels
    pub diameter: f32,
}

impl Program<Message> for CropOverlay {
    type State = DragState;

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: Cursor,
    ) -> Vec<canvas::Geometry> {
        let mut frame = Frame::new(renderer, bounds.size());
        let center = frame.center();
        let size = frame.size();
        let radius = self.diameter / 2.0;

        // Shade the corners outside the circle
        let outside = Path::new(|builder| {
            builder.rectangle(Point::ORIGIN, size);
            builder.circle(center, radius);
        });
        frame.fill(
            &outside,
            canvas::Fill {
                style: canvas::Style::Solid(Color { a: 0.55, ..Color::BLACK }),
                rule: canvas::fill::Rule::EvenOdd,
            },
        );

        frame.stroke(
            &Path::circle(center, radius),
            Stroke::default().with_color(Color::WHITE).with_width(2.0),
        );

        vec![frame.into_geometry()]
    }

    fn update(
        &self,
        state: &mut Self::State,
        event: canvas::Event,
        bounds: Rectangle,
        cursor: Cursor,
    ) -> (canvas::event::Status, Option<Message>) {
        match event {
            // Mouse wheel zooms about the center
            canvas::Event::Mouse(mouse::Event::WheelScrolled { delta }) => {
                if cursor.is_over(bounds) {
                    let step = match delta {
                        mouse::ScrollDelta::Lines { y, .. } => y * 0.1,
                        mouse::ScrollDelta::Pixels { y, .. } => y * 0.01,
                    };
                    let factor = (1.0 + step).max(0.1);
                    return (canvas::event::Status::Captured, Some(Message::CropZoomed(factor)));
                }
            }

            // Mouse button press - start dragging
            canvas::Event::Mouse(mouse::Event::ButtonPressed(mouse::Button::Left)) => {
                if let Some(pos) = cursor.position_over(bounds) {
                    state.drag_origin = Some(pos);
                    return (canvas::event::Status::Captured, None);
                }
            }

            // Mouse button release - commit the drag
            canvas::Event::Mouse(mouse::Event::ButtonReleased(mouse::Button::Left)) => {
                if let Some(origin) = state.drag_origin.take() {
                    let translation = cursor.position().map(|pos| pos - origin).unwrap_or(state.last_translation);
                    state.last_translation = Vector::ZERO;
                    return (
                        canvas::event::Status::Captured,
                        Some(Message::CropDragEnded(to_vector(translation))),
                    );
                }
            }

            // Mouse move - report the running translation
            canvas::Event::Mouse(mouse::Event::CursorMoved { position }) => {
                if let Some(origin) = state.drag_origin {
                    let translation = position - origin;
                    state.last_translation = translation;
                    return (
                        canvas::event::Status::Captured,
                        Some(Message::CropDragged(to_vector(translation))),
                    );
                }
            }

            _ => {}
        }

        (canvas::event::Status::Ignored, None)
    }

    fn mouse_interaction(&self, state: &Self::State, bounds: Rectangle, cursor: Cursor) -> mouse::Interaction {
        if state.drag_origin.is_some() {
            mouse::Interaction::Grabbing
        } else if cursor.is_over(bounds) {
            mouse::Interaction::Grab
        } else {
            mouse::Interaction::default()
        }
    }
}

fn to_vector(translation: Vector) -> cgmath::Vector2<f32> {
    cgmath::Vector2::new(translation.x, translation.y)
}

/// State for drag interactions
#[derive(Debug, Clone, Default)]
pub struct DragState {
    /// Where the left button went down, while it is held
    pub drag_origin: Option<Point>,
    /// Translation from the most recent move, used if the cursor leaves the window
    pub last_translation: Vector,
}
