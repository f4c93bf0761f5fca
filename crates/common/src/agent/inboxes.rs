use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use super::inbox::{InboxAgent, InboxParams};
use crate::config::Config;
use crate::crypto::{PeerId, SecretKey};
use crate::protocol::Message;
use crate::sync::{ChannelError, Channels, Chapter};

/// A message tagged with the name of the inbox it arrived in
#[derive(Debug, Clone, PartialEq)]
pub struct InboxMessage {
    pub inbox: String,
    pub chapter: Chapter<Message>,
}

impl InboxMessage {
    pub fn message(&self) -> &Message {
        &self.chapter.content
    }
}

#[derive(Debug, Clone)]
pub struct InboxesParams {
    /// Our key pair, shared by every inbox
    pub key_pair: Option<SecretKey>,
    /// Initial inboxes, name to mailbox writer
    pub inboxes: HashMap<String, PeerId>,
    pub interval: Duration,
    pub capacity: usize,
    /// Start every inbox on construction, and the default for
    ///  [`InboxesAgent::inbox_params`]
    pub auto_start: bool,
}

impl Default for InboxesParams {
    fn default() -> Self {
        let config = Config::default();
        Self {
            key_pair: None,
            inboxes: HashMap::new(),
            interval: config.poll_interval(),
            capacity: config.channel_capacity,
            auto_start: false,
        }
    }
}

impl InboxesParams {
    pub fn new(key_pair: SecretKey) -> Self {
        Self {
            key_pair: Some(key_pair),
            ..Default::default()
        }
    }

    pub fn inbox(mut self, name: impl Into<String>, writer: impl Into<PeerId>) -> Self {
        self.inboxes.insert(name.into(), writer.into());
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }

    pub fn config(mut self, config: &Config) -> Self {
        self.interval = config.poll_interval();
        self.capacity = config.channel_capacity;
        self
    }
}

#[derive(Debug)]
struct Entry {
    agent: InboxAgent,
    forward: JoinHandle<()>,
}

impl Drop for Entry {
    fn drop(&mut self) {
        self.agent.stop();
        self.forward.abort();
    }
}

/// A named collection of [`InboxAgent`]s with one combined message stream
#[derive(Debug)]
pub struct InboxesAgent {
    channels: Channels,
    key_pair: Option<SecretKey>,
    interval: Duration,
    capacity: usize,
    auto_start: bool,
    inboxes: HashMap<String, Entry>,
    new_message: broadcast::Sender<InboxMessage>,
}

impl InboxesAgent {
    pub fn new(channels: &Channels, params: InboxesParams) -> Result<Self, ChannelError> {
        let (new_message, _) = broadcast::channel(params.capacity.max(1));
        let mut agent = Self {
            channels: channels.clone(),
            key_pair: params.key_pair,
            interval: params.interval,
            capacity: params.capacity,
            auto_start: params.auto_start,
            inboxes: HashMap::new(),
            new_message,
        };
        for (name, writer) in params.inboxes {
            let params = agent.inbox_params(writer);
            agent.add_inbox(name, params)?;
        }
        Ok(agent)
    }

    /// Receive messages from every inbox, tagged with the inbox name
    pub fn subscribe(&self) -> broadcast::Receiver<InboxMessage> {
        self.new_message.subscribe()
    }

    /// Parameters for following `writer` with this agent's key pair,
    ///  interval, capacity and start policy
    pub fn inbox_params(&self, writer: impl Into<PeerId>) -> InboxParams {
        let mut params = InboxParams::new(writer)
            .interval(self.interval)
            .auto_start(self.auto_start);
        params.key_pair = self.key_pair.clone();
        params.capacity = self.capacity;
        params
    }

    /// Follow a mailbox as inbox `name`, replacing any inbox already
    ///  registered under that name
    ///
    /// The new inbox starts polling when `params.auto_start` is set or this
    ///  agent was built with `auto_start`.
    pub fn add_inbox(
        &mut self,
        name: impl Into<String>,
        params: InboxParams,
    ) -> Result<(), ChannelError> {
        let name = name.into();
        let start = params.auto_start || self.auto_start;
        let agent = InboxAgent::new(&self.channels, params.auto_start(false))?;

        // subscribe before starting so nothing is missed
        let forward = tokio::spawn(forward_messages(
            name.clone(),
            agent.subscribe(),
            self.new_message.clone(),
        ));
        if start {
            agent.start();
        }

        tracing::info!("added inbox {}", name);
        self.inboxes.insert(name, Entry { agent, forward });
        Ok(())
    }

    /// Stop and forget inbox `name`, returns whether it existed
    pub fn remove_inbox(&mut self, name: &str) -> bool {
        let removed = self.inboxes.remove(name).is_some();
        if removed {
            tracing::info!("removed inbox {}", name);
        }
        removed
    }

    pub fn inbox(&self, name: &str) -> Option<&InboxAgent> {
        self.inboxes.get(name).map(|entry| &entry.agent)
    }

    pub fn names(&self) -> Vec<String> {
        self.inboxes.keys().cloned().collect()
    }

    pub fn start_all(&self) {
        for entry in self.inboxes.values() {
            entry.agent.start();
        }
    }

    pub fn stop_all(&self) {
        for entry in self.inboxes.values() {
            entry.agent.stop();
        }
    }
}

async fn forward_messages(
    name: String,
    mut inbox: broadcast::Receiver<Chapter<Message>>,
    combined: broadcast::Sender<InboxMessage>,
) {
    loop {
        match inbox.recv().await {
            Ok(chapter) => {
                let _ = combined.send(InboxMessage {
                    inbox: name.clone(),
                    chapter,
                });
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!("inbox {} dropped {} messages", name, skipped);
            }
            Err(RecvError::Closed) => return,
        }
    }
}
