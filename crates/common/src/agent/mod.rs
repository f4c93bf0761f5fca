//! Long running agents over mailboxes
//!
//! - [`InboxAgent`]: polls one mailbox and accumulates its messages
//! - [`InboxesAgent`]: a named set of inboxes behind one message stream
//! - [`OutboxesAgent`]: a named set of mailboxes written toward one reader

mod inbox;
mod inboxes;
mod outboxes;

pub use inbox::{InboxAgent, InboxParams, InboxState};
pub use inboxes::{InboxMessage, InboxesAgent, InboxesParams};
pub use outboxes::OutboxesAgent;
