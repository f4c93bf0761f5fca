use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::crypto::{PeerId, Secret, SecretKey, ALGORITHM};
use crate::entity::{schema, Entity};
use crate::store::Hash;
use crate::sync::{
    ChannelError, Channels, FeedReader, FeedWriter, Publisher, ReaderParams, WriterParams,
};

/// Topic name file systems are published on
pub const FILES_TOPIC: &str = "files";

#[derive(Debug, thiserror::Error)]
pub enum FileSystemError {
    #[error("file not found: {0}")]
    FileNotFound(String),
    #[error("invalid path: {0}, paths must start with '/'")]
    InvalidPath(String),
    #[error(transparent)]
    Channel(#[from] ChannelError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("file is not valid utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// How a stored file was encrypted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEncryption {
    pub key: Secret,
    pub algorithm: String,
}

/// Reference to an immutable file in the blob store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileData {
    #[serde(with = "crate::store::hash_hex")]
    pub hash: Hash,
    /// Present iff the blob is encrypted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption: Option<FileEncryption>,
}

/// Virtual path to file mapping
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FilesRecord(BTreeMap<String, FileData>);

impl Deref for FilesRecord {
    type Target = BTreeMap<String, FileData>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for FilesRecord {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<BTreeMap<String, FileData>> for FilesRecord {
    fn from(files: BTreeMap<String, FileData>) -> Self {
        Self(files)
    }
}

impl FromIterator<(String, FileData)> for FilesRecord {
    fn from_iter<I: IntoIterator<Item = (String, FileData)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Entity for FilesRecord {
    const TYPE: &'static str = schema::FILES;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UploadOptions {
    /// Encrypt with a fresh key embedded in the returned [`FileData`]
    pub encrypt: bool,
}

impl UploadOptions {
    pub fn encrypted() -> Self {
        Self { encrypt: true }
    }
}

/// Store `content` as a blob, encrypting it under a fresh key if asked
pub async fn upload_file(
    channels: &Channels,
    content: impl Into<Vec<u8>>,
    opts: UploadOptions,
) -> Result<FileData, ChannelError> {
    let content = content.into();
    if !opts.encrypt {
        let hash = channels.blobs().put(content).await?;
        return Ok(FileData {
            hash,
            encryption: None,
        });
    }

    let key = Secret::generate();
    let sealed = key
        .encrypt(&content)
        .map_err(|e| ChannelError::InvalidParameters(e.to_string()))?;
    let hash = channels.blobs().put(sealed).await?;
    Ok(FileData {
        hash,
        encryption: Some(FileEncryption {
            key,
            algorithm: ALGORITHM.to_string(),
        }),
    })
}

/// Store `value` as a JSON file
pub async fn upload_json<S: Serialize>(
    channels: &Channels,
    value: &S,
    opts: UploadOptions,
) -> Result<FileData, FileSystemError> {
    let content = serde_json::to_vec(value)?;
    Ok(upload_file(channels, content, opts).await?)
}

/// Fetch a file, decrypting it with its embedded key when encrypted
///
/// # Returns
/// * `Err(ChannelError::NotFound)` - the blob is not in the store
/// * `Err(ChannelError::Decode)` - the blob does not open with the key
pub async fn download_file(channels: &Channels, file: &FileData) -> Result<Bytes, ChannelError> {
    let bytes = channels.blobs().get(&file.hash).await?;
    match &file.encryption {
        None => Ok(bytes),
        Some(encryption) => {
            if encryption.algorithm != ALGORITHM {
                return Err(ChannelError::Decode(format!(
                    "unsupported file encryption algorithm {}",
                    encryption.algorithm
                )));
            }
            let plain = encryption
                .key
                .decrypt(&bytes)
                .map_err(|e| ChannelError::Decode(format!("failed to decrypt file: {}", e)))?;
            Ok(Bytes::from(plain))
        }
    }
}

/// Read-only view over a live [`FilesRecord`]
///
/// Whoever holds the sending side of the watch channel can replace the
/// record at any time, every read sees the latest one.
#[derive(Debug, Clone)]
pub struct FileSystem {
    channels: Channels,
    files: watch::Receiver<FilesRecord>,
}

impl FileSystem {
    pub fn new(channels: Channels, files: watch::Receiver<FilesRecord>) -> Self {
        Self { channels, files }
    }

    /// A view over a record that never changes
    pub fn fixed(channels: Channels, files: FilesRecord) -> Self {
        let (_, files) = watch::channel(files);
        Self::new(channels, files)
    }

    /// Snapshot of the current record
    pub fn files(&self) -> FilesRecord {
        self.files.borrow().clone()
    }

    /// Receiver notified whenever the record is replaced
    pub fn subscribe(&self) -> watch::Receiver<FilesRecord> {
        self.files.clone()
    }

    pub fn has_file(&self, path: &str) -> bool {
        self.files.borrow().contains_key(path)
    }

    pub fn get_file(&self, path: &str) -> Option<FileData> {
        self.files.borrow().get(path).cloned()
    }

    pub async fn download_file(&self, path: &str) -> Result<Bytes, FileSystemError> {
        let file = self
            .get_file(path)
            .ok_or_else(|| FileSystemError::FileNotFound(path.to_string()))?;
        Ok(download_file(&self.channels, &file).await?)
    }

    pub async fn download_text(&self, path: &str) -> Result<String, FileSystemError> {
        let bytes = self.download_file(path).await?;
        Ok(String::from_utf8(bytes.to_vec())?)
    }

    pub async fn download_json<D: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<D, FileSystemError> {
        let bytes = self.download_file(path).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

fn check_path(path: &str) -> Result<(), FileSystemError> {
    if path.starts_with('/') {
        Ok(())
    } else {
        Err(FileSystemError::InvalidPath(path.to_string()))
    }
}

/// The single writer of a file system
///
/// Mutations only touch the local record. [`FileSystemWriter::push`]
/// publishes the whole record, replacing whatever was published before.
/// Two writers over the same key pair overwrite each other: the last
/// push wins.
#[derive(Debug)]
pub struct FileSystemWriter {
    fs: FileSystem,
    record: watch::Sender<FilesRecord>,
    publisher: Publisher<FeedWriter<FilesRecord>>,
    own_feed: FeedReader<FilesRecord>,
    dirty: bool,
}

impl Deref for FileSystemWriter {
    type Target = FileSystem;
    fn deref(&self) -> &Self::Target {
        &self.fs
    }
}

impl FileSystemWriter {
    /// Create a writer over the file system feed of `key_pair`,
    ///  encrypted toward `reader` when one is given
    pub fn new(
        channels: &Channels,
        key_pair: SecretKey,
        reader: Option<PeerId>,
    ) -> Result<Self, ChannelError> {
        Self::with_files(channels, key_pair, reader, FilesRecord::default())
    }

    /// Create a writer starting from an existing local record
    pub fn with_files(
        channels: &Channels,
        key_pair: SecretKey,
        reader: Option<PeerId>,
        files: FilesRecord,
    ) -> Result<Self, ChannelError> {
        let mut params = WriterParams::new(key_pair).name(FILES_TOPIC);
        params.reader = reader;
        let writer = channels.feed_writer::<FilesRecord>(params)?;
        let own_feed = writer.reader();

        let (record, rx) = watch::channel(files);
        Ok(Self {
            fs: FileSystem::new(channels.clone(), rx),
            record,
            publisher: Publisher::new(writer),
            own_feed,
            dirty: false,
        })
    }

    /// Whether the local record has changes that were not pushed
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Replace the local record with the last pushed one, if any
    pub async fn initialize(&mut self) -> Result<(), ChannelError> {
        if let Some(files) = self.own_feed.read().await? {
            self.record.send_replace(files);
            self.dirty = false;
        }
        Ok(())
    }

    pub async fn upload_file(
        &mut self,
        path: &str,
        content: impl Into<Vec<u8>>,
        opts: UploadOptions,
    ) -> Result<FileData, FileSystemError> {
        check_path(path)?;
        let file = upload_file(&self.fs.channels, content, opts).await?;
        self.set_file(path, file.clone())?;
        Ok(file)
    }

    pub async fn upload_json<S: Serialize>(
        &mut self,
        path: &str,
        value: &S,
        opts: UploadOptions,
    ) -> Result<FileData, FileSystemError> {
        check_path(path)?;
        let file = upload_json(&self.fs.channels, value, opts).await?;
        self.set_file(path, file.clone())?;
        Ok(file)
    }

    pub fn set_file(
        &mut self,
        path: impl Into<String>,
        file: FileData,
    ) -> Result<(), FileSystemError> {
        let path = path.into();
        check_path(&path)?;
        self.record.send_modify(|files| {
            files.insert(path, file);
        });
        self.dirty = true;
        Ok(())
    }

    /// Returns whether `path` existed
    pub fn remove_file(&mut self, path: &str) -> bool {
        let removed = self.record.send_if_modified(|files| files.remove(path).is_some());
        self.dirty |= removed;
        removed
    }

    /// Move `from` to `to`, replacing whatever `to` held
    ///
    /// Returns whether `from` existed. Nothing changes when it did not,
    /// or when `to` is not an absolute path.
    pub fn move_file(&mut self, from: &str, to: &str) -> Result<bool, FileSystemError> {
        check_path(to)?;
        let moved = self.record.send_if_modified(|files| match files.remove(from) {
            Some(file) => {
                files.insert(to.to_string(), file);
                true
            }
            None => false,
        });
        self.dirty |= moved;
        Ok(moved)
    }

    /// Publish the entire local record
    pub async fn push(&mut self) -> Result<(), FileSystemError> {
        let files = self.files();
        self.publisher.publish(&files).await?;
        self.dirty = false;
        tracing::debug!("pushed file system with {} files", files.len());
        Ok(())
    }
}

/// Follows the file system published by a remote writer
#[derive(Debug)]
pub struct FileSystemReader {
    fs: FileSystem,
    record: watch::Sender<FilesRecord>,
    feed: FeedReader<FilesRecord>,
}

impl Deref for FileSystemReader {
    type Target = FileSystem;
    fn deref(&self) -> &Self::Target {
        &self.fs
    }
}

impl FileSystemReader {
    /// Create a reader over the file system of `writer`. `key_pair`
    ///  is needed when the writer encrypted toward it.
    pub fn new(
        channels: &Channels,
        writer: impl Into<PeerId>,
        key_pair: Option<SecretKey>,
    ) -> Result<Self, ChannelError> {
        let mut params = ReaderParams::new(writer).name(FILES_TOPIC);
        params.key_pair = key_pair;
        let feed = channels.feed_reader::<FilesRecord>(params)?;

        let (record, rx) = watch::channel(FilesRecord::default());
        Ok(Self {
            fs: FileSystem::new(channels.clone(), rx),
            record,
            feed,
        })
    }

    /// Replace the local record with the last pushed one
    pub async fn pull(&self) -> Result<(), ChannelError> {
        let files = self.feed.read().await?.unwrap_or_default();
        tracing::debug!("pulled file system with {} files", files.len());
        self.record.send_replace(files);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_upload_and_download() {
        let channels = Channels::builder().build().await.unwrap();

        let plain = upload_file(&channels, "hello test", UploadOptions::default())
            .await
            .unwrap();
        assert!(plain.encryption.is_none());
        assert_eq!(
            download_file(&channels, &plain).await.unwrap().as_ref(),
            b"hello test"
        );

        let sealed = upload_file(&channels, "hello test", UploadOptions::encrypted())
            .await
            .unwrap();
        assert_ne!(sealed.hash, plain.hash);
        let encryption = sealed.encryption.as_ref().unwrap();
        assert_eq!(encryption.algorithm, ALGORITHM);
        assert_eq!(
            download_file(&channels, &sealed).await.unwrap().as_ref(),
            b"hello test"
        );
    }

    #[tokio::test]
    async fn test_wrong_key_is_decode_error() {
        let channels = Channels::builder().build().await.unwrap();
        let mut file = upload_file(&channels, "secret", UploadOptions::encrypted())
            .await
            .unwrap();
        if let Some(encryption) = file.encryption.as_mut() {
            encryption.key = Secret::generate();
        }
        assert!(matches!(
            download_file(&channels, &file).await,
            Err(ChannelError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_file_data_json() {
        let channels = Channels::builder().build().await.unwrap();
        let file = upload_file(&channels, "x", UploadOptions::encrypted())
            .await
            .unwrap();
        let value = serde_json::to_value(&file).unwrap();
        assert_eq!(value["hash"].as_str().unwrap().len(), 64);
        assert_eq!(value["encryption"]["algorithm"], ALGORITHM);

        let plain = upload_file(&channels, "x", UploadOptions::default())
            .await
            .unwrap();
        let value = serde_json::to_value(&plain).unwrap();
        assert!(value.get("encryption").is_none());
    }

    #[tokio::test]
    async fn test_local_mutations() {
        let channels = Channels::builder().build().await.unwrap();
        let mut writer = FileSystemWriter::new(&channels, SecretKey::generate(), None).unwrap();
        assert!(!writer.is_dirty());

        assert!(matches!(
            writer
                .upload_file("test.txt", "hello", UploadOptions::default())
                .await,
            Err(FileSystemError::InvalidPath(_))
        ));
        assert!(!writer.is_dirty());

        assert!(!writer.move_file("/test.txt", "/hello.txt").unwrap());
        let file = writer
            .upload_file("/test.txt", "hello", UploadOptions::default())
            .await
            .unwrap();
        assert!(writer.is_dirty());
        assert!(writer.move_file("/test.txt", "/hello.txt").unwrap());
        assert!(!writer.has_file("/test.txt"));
        assert_eq!(writer.get_file("/hello.txt"), Some(file.clone()));
        assert!(!writer.remove_file("/test.txt"));

        writer.set_file("/same.txt", file).unwrap();
        assert!(writer.remove_file("/hello.txt"));
        assert_eq!(writer.files().len(), 1);

        writer.push().await.unwrap();
        assert!(!writer.is_dirty());
    }

    #[tokio::test]
    async fn test_relative_paths_never_enter_the_record() {
        let channels = Channels::builder().build().await.unwrap();
        let mut writer = FileSystemWriter::new(&channels, SecretKey::generate(), None).unwrap();
        let file = writer
            .upload_file("/a", "a", UploadOptions::default())
            .await
            .unwrap();
        writer.push().await.unwrap();

        assert!(matches!(
            writer.move_file("/a", "b"),
            Err(FileSystemError::InvalidPath(_))
        ));
        assert!(writer.has_file("/a"));
        assert!(!writer.has_file("b"));

        assert!(matches!(
            writer.set_file("c", file),
            Err(FileSystemError::InvalidPath(_))
        ));
        assert_eq!(writer.files().len(), 1);
        assert!(!writer.is_dirty());

        // the record still publishes
        writer
            .upload_file("/c", "c", UploadOptions::default())
            .await
            .unwrap();
        writer.push().await.unwrap();
    }
}
