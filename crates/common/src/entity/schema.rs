//! Type ids and shapes of the built-in protocol entities

use super::shape::{Format, Shape};

pub const ACTOR: &str = "parley.actor";
pub const FIRST_CONTACT: &str = "parley.first-contact";
pub const CONTACT: &str = "parley.contact";
pub const FILES: &str = "parley.files";
pub const MESSAGE: &str = "parley.message";

pub const DISPLAY_NAME_MAX_LEN: usize = 100;
pub const DESCRIPTION_MAX_LEN: usize = 500;
pub const TITLE_MAX_LEN: usize = 100;
pub const ATTACHMENT_NAME_MAX_LEN: usize = 100;

pub fn file_data() -> Shape {
    Shape::object()
        .required("hash", Shape::formatted(Format::Hash))
        .optional(
            "encryption",
            Shape::object()
                .required("key", Shape::formatted(Format::SecretKey))
                .required("algorithm", Shape::string().min_len(1)),
        )
}

pub fn profile() -> Shape {
    Shape::object()
        .optional(
            "displayName",
            Shape::string().max_len(DISPLAY_NAME_MAX_LEN),
        )
        .optional(
            "description",
            Shape::string().max_len(DESCRIPTION_MAX_LEN),
        )
        .optional("avatar", file_data())
        .allow_additional()
}

pub fn actor() -> Shape {
    Shape::object()
        .required("publicKey", Shape::formatted(Format::PublicKey))
        .required("profile", profile())
}

pub fn first_contact() -> Shape {
    Shape::object()
        .required("contactPublicKey", Shape::formatted(Format::PublicKey))
        .required("actorAddress", Shape::formatted(Format::Address))
}

pub fn mailboxes() -> Shape {
    Shape::map(
        Some(Format::MailboxName),
        Shape::formatted(Format::PublicKey),
    )
}

pub fn contact() -> Shape {
    Shape::object()
        .optional("profile", profile())
        .optional("fileSystemKey", Shape::formatted(Format::PublicKey))
        .optional("mailboxes", mailboxes())
        .allow_additional()
}

pub fn files() -> Shape {
    Shape::map(Some(Format::AbsolutePath), file_data())
}

pub fn message() -> Shape {
    Shape::object()
        .required("body", Shape::string())
        .optional("title", Shape::string().max_len(TITLE_MAX_LEN))
        .optional("thread", Shape::formatted(Format::Hash))
        .optional("replyTo", Shape::formatted(Format::Hash))
        .optional(
            "attachments",
            Shape::array(
                Shape::object()
                    .required("file", file_data())
                    .optional("name", Shape::string().max_len(ATTACHMENT_NAME_MAX_LEN)),
            ),
        )
}

/// Every built-in `(type id, shape)` pair
pub fn builtin() -> Vec<(&'static str, Shape)> {
    vec![
        (ACTOR, actor()),
        (FIRST_CONTACT, first_contact()),
        (CONTACT, contact()),
        (FILES, files()),
        (MESSAGE, message()),
    ]
}
