//! Protocols built on the channel layer
//!
//! Actor → FirstContact → Contact → {Mailbox, FileSystem}

pub mod actor;
pub mod contact;
pub mod fs;
pub mod messaging;

pub use actor::{
    actor_subscriber, actor_writer, read_actor, write_actor, Actor, ActorWriter, Profile,
};
pub use contact::{
    contact_subscriber, first_contact_subscriber, read_contact, read_first_contact,
    write_contact, write_first_contact, Contact, FirstContact, MailboxesRecord,
};
pub use fs::{
    download_file, upload_file, upload_json, FileData, FileEncryption, FileSystem,
    FileSystemError, FileSystemReader, FileSystemWriter, FilesRecord, UploadOptions,
};
pub use messaging::{
    mailbox_reader, mailbox_writer, Attachment, MailboxReader, MailboxWriter, Message,
    MAILBOX_TOPIC,
};
