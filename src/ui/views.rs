/// Screens and dialogs
///
/// Pure functions from application state to widgets. Anything that changes
/// state is a `Message`.

use iced::widget::{
    button, canvas, center, column, container, horizontal_space, image as picture, mouse_area, opaque, row,
    scrollable, stack, text, text_input,
};
use iced::{Alignment, Color, Element, Length, Theme};

use super::canvas::CropOverlay;
use crate::photo::transform::EDITOR_FRAME_SIZE;
use crate::state::data::{AuthorizationStatus, ContactRecord};
use crate::state::dialog::DialogKind;
use crate::state::list::ListScope;
use crate::viewmodel::detail::DetailViewModel;
use crate::{ContactPhotos, Message};

const AVATAR_SIZE: f32 = 40.0;
const DETAIL_AVATAR_SIZE: f32 = 120.0;

/// Whole window: the current screen plus any error alert on top
pub fn root(app: &ContactPhotos) -> Element<'_, Message> {
    let screen = if !app.contacts.is_authorized() {
        permission(app.contacts.authorization())
    } else if let Some(detail) = &app.detail {
        detail_screen(app, detail)
    } else {
        contact_list(app)
    };

    let error = app
        .detail
        .as_ref()
        .and_then(|detail| detail.error.visible())
        .or_else(|| app.contacts.error.visible());

    match error {
        Some(message) => modal(screen, alert(message), Message::DismissError),
        None => screen,
    }
}

fn permission(status: AuthorizationStatus) -> Element<'static, Message> {
    let content = match status {
        AuthorizationStatus::Denied => column![
            text("Contacts access denied").size(28),
            text("Contact Photos cannot show or update contacts without access."),
        ],
        _ => column![
            text("Contact Photos").size(28),
            text("Find the contacts that have no profile photo and give them one."),
            button("Allow Access").on_press(Message::RequestAccess).padding(10),
        ],
    };

    center(content.spacing(20).align_x(Alignment::Center)).padding(40).into()
}

fn contact_list(app: &ContactPhotos) -> Element<'_, Message> {
    let list = app.contacts.list();

    let scope_button = |label: String, scope: ListScope| {
        let style: fn(&Theme, button::Status) -> button::Style = if app.scope == scope {
            button::primary
        } else {
            button::secondary
        };
        button(text(label)).style(style).on_press(Message::ScopeChanged(scope))
    };

    let header = row![
        text("Contact Photos").size(28),
        horizontal_space(),
        scope_button(format!("Missing Photo ({})", list.missing_photo().len()), ListScope::MissingPhoto),
        scope_button(format!("All ({})", list.all().len()), ListScope::All),
        button("Refresh").on_press_maybe((!app.contacts.is_refreshing()).then_some(Message::Refresh)),
        button("Import vCards").on_press(Message::ImportVCards),
    ]
    .spacing(10)
    .align_y(Alignment::Center);

    let filter = text_input("Search contacts", &app.filter)
        .on_input(Message::FilterChanged)
        .padding(8);

    let records = list.filtered(app.scope, &app.filter);
    let body: Element<Message> = if app.contacts.is_loading() && list.is_empty() {
        center(text("Loading contacts...")).into()
    } else if records.is_empty() {
        let message = match (app.scope, app.filter.trim().is_empty()) {
            (_, false) => "No contacts match your search.",
            (ListScope::MissingPhoto, true) if !list.is_empty() => "Every contact has a photo.",
            _ => "No contacts yet. Import a folder of vCards to get started.",
        };
        center(text(message)).into()
    } else {
        scrollable(column(records.into_iter().map(contact_row)).spacing(4)).height(Length::Fill).into()
    };

    column![header, filter, body, text(&app.status).size(14)]
        .spacing(16)
        .padding(20)
        .into()
}

fn contact_row(record: &ContactRecord) -> Element<'_, Message> {
    let details = [record.organization.clone(), record.location().unwrap_or_default()]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" · ");

    let content = row![
        avatar(record, AVATAR_SIZE),
        column![text(record.display_name()).size(16), text(details).size(12)].spacing(2),
    ]
    .spacing(12)
    .align_y(Alignment::Center);

    button(content)
        .on_press(Message::OpenContact(record.id))
        .style(button::text)
        .width(Length::Fill)
        .into()
}

/// Profile photo, or initials when there is none
fn avatar(record: &ContactRecord, size: f32) -> Element<'_, Message> {
    match record.image.as_ref().filter(|bytes| !bytes.is_empty()) {
        Some(bytes) => picture(picture::Handle::from_bytes(bytes.clone()))
            .width(size)
            .height(size)
            .into(),
        None => container(text(record.initials()).size(size * 0.4))
            .center_x(Length::Fixed(size))
            .center_y(Length::Fixed(size))
            .style(container::rounded_box)
            .into(),
    }
}

fn detail_screen<'a>(app: &'a ContactPhotos, detail: &'a DetailViewModel) -> Element<'a, Message> {
    let record = detail.record();
    let idle = !detail.is_saving();
    let enabled = |message: Message| idle.then_some(message);

    let mut info = column![
        avatar(record, DETAIL_AVATAR_SIZE),
        text(record.display_name()).size(28),
    ]
    .spacing(8)
    .align_x(Alignment::Center);
    if !record.organization.is_empty() {
        info = info.push(text(&record.organization));
    }
    if let Some(location) = record.location() {
        info = info.push(text(location).size(14));
    }

    let actions = row![
        button("Search Web").on_press_maybe(enabled(Message::OpenSearch)),
        button("Take Photo").on_press_maybe(enabled(Message::OpenCamera)),
        button("Choose from Library").on_press_maybe(enabled(Message::PickFromLibrary)),
    ]
    .spacing(10);

    let mut content = column![
        row![button("Back").on_press_maybe(enabled(Message::CloseDetail)).style(button::text)],
        info,
        actions,
    ]
    .spacing(24)
    .padding(20)
    .align_x(Alignment::Center);
    if detail.is_saving() {
        content = content.push(text("Saving..."));
    }

    let base: Element<Message> = container(content).center_x(Length::Fill).into();
    match detail.active_dialog() {
        Some(kind) => modal(base, dialog(app, detail, kind), Message::CancelDialog),
        None => base,
    }
}

fn dialog<'a>(app: &'a ContactPhotos, detail: &'a DetailViewModel, kind: DialogKind) -> Element<'a, Message> {
    let content: Element<Message> = match kind {
        DialogKind::Search => search_dialog(detail),
        DialogKind::Camera => camera_dialog(app, detail),
        DialogKind::Editor => editor_dialog(app, detail),
    };

    container(content)
        .width(420)
        .padding(20)
        .style(container::rounded_box)
        .into()
}

fn search_dialog(detail: &DetailViewModel) -> Element<'_, Message> {
    let Some(search) = detail.search() else {
        return text("Search is not available.").into();
    };

    let mut content = column![
        text("Find a Photo").size(20),
        text(format!("Searching for \"{}\". Open the page below, copy an image address and paste it here.", search.query())),
        text_input("", search.renderer().loaded().map(|url| url.as_str()).unwrap_or_default()),
        text_input("Paste image address", &search.renderer().pasted)
            .on_input(Message::PastedLinkChanged)
            .on_submit(Message::UsePastedLink)
            .padding(8),
    ]
    .spacing(12);

    if search.is_loading() {
        content = content.push(text("Loading...").size(12));
    }
    if detail.is_acquiring() {
        content = content.push(text("Downloading...").size(12));
    }
    if let Some(error) = search.error() {
        content = content.push(text(error).color(Color::from_rgb(1.0, 0.4, 0.4)));
    }

    content
        .push(row![
            button("Cancel").on_press(Message::CancelDialog).style(button::secondary),
            horizontal_space(),
            button("Use Image").on_press_maybe((!detail.is_acquiring()).then_some(Message::UsePastedLink)),
        ])
        .into()
}

fn camera_dialog<'a>(app: &'a ContactPhotos, detail: &'a DetailViewModel) -> Element<'a, Message> {
    let capturing = detail.is_acquiring();
    column![
        text("Take Photo").size(20),
        text(format!("Capture runs: {}", app.config.camera_command.join(" "))).size(12),
        row![
            button("Cancel").on_press(Message::CancelDialog).style(button::secondary),
            horizontal_space(),
            button(if capturing { "Capturing..." } else { "Capture" })
                .on_press_maybe((!capturing).then_some(Message::Capture)),
        ],
    ]
    .spacing(12)
    .into()
}

fn editor_dialog<'a>(app: &'a ContactPhotos, detail: &'a DetailViewModel) -> Element<'a, Message> {
    let Some(editor) = detail.editor() else {
        return text("No photo selected.").into();
    };
    let frame = EDITOR_FRAME_SIZE as f32;
    let diameter = editor.output_size() as f32;

    let preview: Element<Message> = match &app.crop_preview {
        Some(handle) => picture(handle.clone()).width(diameter).height(diameter).into(),
        None => text("Rendering...").into(),
    };

    let cropper = stack![
        container(preview).center_x(Length::Fixed(frame)).center_y(Length::Fixed(frame)),
        canvas(CropOverlay { diameter })
            .width(Length::Fixed(frame))
            .height(Length::Fixed(frame)),
    ];

    let save_label = if detail.is_saving() { "Saving..." } else { "Save" };
    column![
        text("Move and Scale").size(20),
        container(cropper).center_x(Length::Fill),
        text("Drag to move, scroll to zoom.").size(12),
        row![
            button("Cancel").on_press(Message::CancelDialog).style(button::secondary),
            button("Reset").on_press(Message::CropReset).style(button::secondary),
            horizontal_space(),
            button(save_label).on_press_maybe((!detail.is_saving()).then_some(Message::Save)),
        ]
        .spacing(10),
    ]
    .spacing(12)
    .into()
}

fn alert(message: &str) -> Element<'_, Message> {
    container(
        column![
            text(message).size(16),
            button("OK").on_press(Message::DismissError),
        ]
        .spacing(16)
        .align_x(Alignment::Center),
    )
    .width(320)
    .padding(20)
    .style(container::rounded_box)
    .into()
}

/// Show `content` above a dimmed `base`; clicking outside sends `on_blur`
fn modal<'a>(
    base: impl Into<Element<'a, Message>>,
    content: impl Into<Element<'a, Message>>,
    on_blur: Message,
) -> Element<'a, Message> {
    stack![
        base.into(),
        opaque(
            mouse_area(center(opaque(content)).style(|_theme| container::Style {
                background: Some(Color { a: 0.8, ..Color::BLACK }.into()),
                ..container::Style::default()
            }))
            .on_press(on_blur)
        )
    ]
    .into()
}
