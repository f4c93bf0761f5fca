use std::collections::HashMap;

use crate::crypto::{PeerId, PublicKey, SecretKey};
use crate::protocol::{mailbox_writer, MailboxWriter, Message};
use crate::store::Hash;
use crate::sync::{ChannelError, Channels};

#[derive(Debug)]
struct Outbox {
    key_pair: SecretKey,
    writer: MailboxWriter,
}

/// A named collection of mailboxes, all written toward the same reader
#[derive(Debug)]
pub struct OutboxesAgent {
    channels: Channels,
    reader: PeerId,
    outboxes: HashMap<String, Outbox>,
}

impl OutboxesAgent {
    /// Create the agent with the initial `outboxes`, name to key pair
    pub fn new(
        channels: &Channels,
        reader: impl Into<PeerId>,
        outboxes: HashMap<String, SecretKey>,
    ) -> Result<Self, ChannelError> {
        let mut agent = Self {
            channels: channels.clone(),
            reader: reader.into(),
            outboxes: HashMap::new(),
        };
        for (name, key_pair) in outboxes {
            agent.register(name, key_pair)?;
        }
        Ok(agent)
    }

    fn register(&mut self, name: String, key_pair: SecretKey) -> Result<(), ChannelError> {
        let writer = mailbox_writer(&self.channels, key_pair.clone(), Some(self.reader))?;
        self.outboxes.insert(name, Outbox { key_pair, writer });
        Ok(())
    }

    /// Key pair of outbox `name`, created with a fresh identity if absent
    pub fn add_outbox(&mut self, name: &str) -> Result<SecretKey, ChannelError> {
        if let Some(outbox) = self.outboxes.get(name) {
            return Ok(outbox.key_pair.clone());
        }
        let key_pair = SecretKey::generate();
        self.register(name.to_string(), key_pair.clone())?;
        tracing::info!("created outbox {} as {}", name, key_pair.public());
        Ok(key_pair)
    }

    pub fn outbox_key(&self, name: &str) -> Option<PublicKey> {
        self.outboxes.get(name).map(|outbox| outbox.key_pair.public())
    }

    pub fn names(&self) -> Vec<String> {
        self.outboxes.keys().cloned().collect()
    }

    /// Publish `message` in outbox `name`, creating it on first use
    ///
    /// # Returns
    /// The chapter id of the published message
    pub async fn send_message(
        &mut self,
        name: &str,
        message: &Message,
    ) -> Result<Hash, ChannelError> {
        self.add_outbox(name)?;
        let writer = match self.outboxes.get(name) {
            Some(outbox) => outbox.writer.clone(),
            None => {
                return Err(ChannelError::InvalidParameters(format!(
                    "outbox {} is not registered",
                    name
                )))
            }
        };
        writer.publish(message).await
    }
}
