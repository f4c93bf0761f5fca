use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::Config;
use crate::crypto::{PeerId, SecretKey};
use crate::protocol::{mailbox_reader, MailboxReader, Message};
use crate::store::Hash;
use crate::sync::{check_interval, ChannelError, Channels, Chapter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboxState {
    Stopped,
    Started,
}

#[derive(Debug, Clone)]
pub struct InboxParams {
    /// Mailbox to follow
    pub writer: PeerId,
    /// Needed when the mailbox is encrypted toward us
    pub key_pair: Option<SecretKey>,
    pub interval: Duration,
    /// Capacity of the new message broadcast
    pub capacity: usize,
    /// Start polling on construction
    pub auto_start: bool,
}

impl InboxParams {
    pub fn new(writer: impl Into<PeerId>) -> Self {
        let config = Config::default();
        Self {
            writer: writer.into(),
            key_pair: None,
            interval: config.poll_interval(),
            capacity: config.channel_capacity,
            auto_start: false,
        }
    }

    pub fn key_pair(mut self, key_pair: SecretKey) -> Self {
        self.key_pair = Some(key_pair);
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

    /// Take the polling interval and capacity from `config`
    pub fn config(mut self, config: &Config) -> Self {
        self.interval = config.poll_interval();
        self.capacity = config.channel_capacity;
        self
    }
}

#[derive(Debug, Default)]
struct Inbox {
    chapters: Vec<Chapter<Message>>,
    last_seen: Option<Hash>,
    /// Bumped on every start, so a task outliving its stop can tell
    generation: u64,
    /// Generation of the running task
    active: Option<u64>,
    task: Option<JoinHandle<()>>,
}

/// Follows one mailbox, accumulating its messages
///
/// While started, the mailbox head is polled every interval. When it
/// moves, every chapter since the last one seen is appended to
/// [`InboxAgent::messages`] and broadcast to subscribers, oldest first.
/// Nothing is appended or broadcast once [`InboxAgent::stop`] returns.
///
/// Store failures are retried on the next tick. Other failures are
/// broadcast on [`InboxAgent::errors`]:
/// - a chapter that cannot be fetched or decoded is skipped together
///   with everything older than it, newer chapters are still delivered
/// - a head pointer that cannot be decoded stops the agent
#[derive(Debug)]
pub struct InboxAgent {
    reader: MailboxReader,
    interval: Duration,
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    inbox: Mutex<Inbox>,
    state: watch::Sender<InboxState>,
    new_message: broadcast::Sender<Chapter<Message>>,
    errors: broadcast::Sender<ChannelError>,
}

impl InboxAgent {
    /// Fails with `InvalidParameters` on a zero interval
    pub fn new(channels: &Channels, params: InboxParams) -> Result<Self, ChannelError> {
        check_interval(params.interval)?;
        let reader = mailbox_reader(channels, params.writer, params.key_pair)?;
        let capacity = params.capacity.max(1);
        let (state, _) = watch::channel(InboxState::Stopped);
        let (new_message, _) = broadcast::channel(capacity);
        let (errors, _) = broadcast::channel(capacity);
        let agent = Self {
            reader,
            interval: params.interval,
            shared: Arc::new(Shared {
                inbox: Mutex::new(Inbox::default()),
                state,
                new_message,
                errors,
            }),
        };
        if params.auto_start {
            agent.start();
        }
        Ok(agent)
    }

    pub fn state(&self) -> InboxState {
        *self.shared.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<InboxState> {
        self.shared.state.subscribe()
    }

    /// Every message received so far, in the order observed
    pub fn messages(&self) -> Vec<Message> {
        self.shared
            .inbox
            .lock()
            .chapters
            .iter()
            .map(|chapter| chapter.content.clone())
            .collect()
    }

    /// Every chapter received so far, in the order observed
    pub fn chapters(&self) -> Vec<Chapter<Message>> {
        self.shared.inbox.lock().chapters.clone()
    }

    /// Receive each new message as it is observed
    pub fn subscribe(&self) -> broadcast::Receiver<Chapter<Message>> {
        self.shared.new_message.subscribe()
    }

    /// Receive the failures the agent did not retry
    pub fn errors(&self) -> broadcast::Receiver<ChannelError> {
        self.shared.errors.subscribe()
    }

    /// Start polling, no-op if already started
    pub fn start(&self) {
        let mut inbox = self.shared.inbox.lock();
        if inbox.active.is_some() {
            return;
        }
        inbox.generation += 1;
        let generation = inbox.generation;
        inbox.active = Some(generation);
        inbox.task = Some(tokio::spawn(poll_inbox(
            self.reader.clone(),
            self.interval,
            self.shared.clone(),
            generation,
        )));
        self.shared.state.send_replace(InboxState::Started);
        tracing::info!("inbox {} started", self.reader.address());
    }

    /// Stop polling, no-op if already stopped
    pub fn stop(&self) {
        let mut inbox = self.shared.inbox.lock();
        if inbox.active.take().is_none() {
            return;
        }
        if let Some(task) = inbox.task.take() {
            task.abort();
        }
        self.shared.state.send_replace(InboxState::Stopped);
        tracing::info!("inbox {} stopped", self.reader.address());
    }
}

impl Drop for InboxAgent {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Chapters observed on one tick
struct CatchUp {
    head: Hash,
    /// Oldest first
    chapters: Vec<Chapter<Message>>,
    /// Why the walk ended before reaching the last seen chapter
    skipped: Option<ChannelError>,
}

async fn poll_inbox(
    reader: MailboxReader,
    interval: Duration,
    shared: Arc<Shared>,
    generation: u64,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let last_seen = shared.inbox.lock().last_seen;
        let head = match reader.head().await {
            Ok(Some(head)) => head,
            Ok(None) => continue,
            Err(err @ ChannelError::Network(_)) => {
                // retried on the next tick
                tracing::warn!("inbox {} failed to poll: {}", reader.address(), err);
                continue;
            }
            Err(err) => {
                tracing::warn!("inbox {} stopped on unreadable head: {}", reader.address(), err);
                fail(&shared, generation, err);
                return;
            }
        };
        if last_seen == Some(head) {
            continue;
        }
        let catch_up = match catch_up(&reader, head, last_seen).await {
            Ok(catch_up) => catch_up,
            Err(err) => {
                tracing::warn!("inbox {} failed to poll: {}", reader.address(), err);
                continue;
            }
        };

        let mut inbox = shared.inbox.lock();
        if inbox.active != Some(generation) {
            return;
        }
        for chapter in catch_up.chapters {
            tracing::debug!("inbox {} received chapter {}", reader.address(), chapter.id);
            inbox.chapters.push(chapter.clone());
            // no receivers is fine
            let _ = shared.new_message.send(chapter);
        }
        inbox.last_seen = Some(catch_up.head);
        if let Some(err) = catch_up.skipped {
            tracing::warn!("inbox {} skipped unreadable chapters: {}", reader.address(), err);
            let _ = shared.errors.send(err);
        }
    }
}

/// Walk back from `head` to `last_seen`
///
/// Only store failures are returned as errors. Any other failure ends the
/// walk and is reported in [`CatchUp::skipped`].
async fn catch_up(
    reader: &MailboxReader,
    head: Hash,
    last_seen: Option<Hash>,
) -> Result<CatchUp, ChannelError> {
    let mut chapters = Vec::new();
    let mut skipped = None;
    let mut next = Some(head);
    while let Some(id) = next {
        if Some(id) == last_seen {
            break;
        }
        match reader.chapter(id).await {
            Ok(chapter) => {
                next = chapter.previous;
                chapters.push(chapter);
            }
            Err(err @ ChannelError::Network(_)) => return Err(err),
            Err(err) => {
                skipped = Some(err);
                break;
            }
        }
    }
    chapters.reverse();
    Ok(CatchUp {
        head,
        chapters,
        skipped,
    })
}

/// Stop the agent from its own task and report why
fn fail(shared: &Shared, generation: u64, err: ChannelError) {
    let mut inbox = shared.inbox.lock();
    if inbox.active != Some(generation) {
        return;
    }
    inbox.active = None;
    inbox.task = None;
    shared.state.send_replace(InboxState::Stopped);
    let _ = shared.errors.send(err);
}
