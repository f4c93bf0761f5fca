//! Integration tests for file system writers and readers

mod common;

use ::common::crypto::Secret;
use ::common::protocol::{
    download_file, upload_file, FileData, FileSystem, FileSystemError, FileSystemReader,
    FileSystemWriter, FilesRecord, UploadOptions,
};
use ::common::store::Hash;
use ::common::sync::ChannelError;
use ::common::testkit::TestEnv;
use serde_json::json;

#[tokio::test]
async fn test_upload_download_preserves_content() {
    common::init_tracing();
    let env = TestEnv::on_disk().await.unwrap();
    let contents: [&[u8]; 3] = [b"", b"hello world", &[0u8, 159, 146, 150, 255]];

    for content in contents {
        for opts in [UploadOptions::default(), UploadOptions::encrypted()] {
            let file = upload_file(env.channels(), content, opts).await.unwrap();
            assert_eq!(file.encryption.is_some(), opts.encrypt);
            let downloaded = download_file(env.channels(), &file).await.unwrap();
            assert_eq!(downloaded.as_ref(), content);
        }
    }
}

#[tokio::test]
async fn test_encrypted_blob_is_not_plaintext() {
    let env = common::setup_test_env().await;
    let file = upload_file(env.channels(), "top secret", UploadOptions::encrypted())
        .await
        .unwrap();

    let stored = env.channels().blobs().get(&file.hash).await.unwrap();
    assert_ne!(stored.as_ref(), b"top secret");
}

#[tokio::test]
async fn test_missing_blob_is_not_found() {
    let env = common::setup_test_env().await;
    let file = FileData {
        hash: Hash::new(b"never uploaded"),
        encryption: None,
    };

    let result = download_file(env.channels(), &file).await;
    assert!(matches!(result, Err(ChannelError::NotFound(_))));
}

#[tokio::test]
async fn test_wrong_key_fails_to_decode() {
    let env = common::setup_test_env().await;
    let mut file = upload_file(env.channels(), "sealed", UploadOptions::encrypted())
        .await
        .unwrap();
    if let Some(encryption) = file.encryption.as_mut() {
        encryption.key = Secret::generate();
    }

    let result = download_file(env.channels(), &file).await;
    assert!(matches!(result, Err(ChannelError::Decode(_))));
}

#[tokio::test]
async fn test_writer_flow() {
    let env = common::setup_test_env().await;
    let alice = TestEnv::party();
    let bob = TestEnv::party();

    let mut writer =
        FileSystemWriter::new(env.channels(), alice.clone(), Some(bob.public().into())).unwrap();
    assert!(!writer.is_dirty());

    // paths are absolute
    let result = writer
        .upload_file("notes.txt", "hello", UploadOptions::default())
        .await;
    assert!(matches!(result, Err(FileSystemError::InvalidPath(_))));
    assert!(writer.files().is_empty());

    writer
        .upload_file("/notes.txt", "hello", UploadOptions::default())
        .await
        .unwrap();
    writer
        .upload_json("/data.json", &json!({ "a": 1 }), UploadOptions::encrypted())
        .await
        .unwrap();
    assert!(writer.is_dirty());
    assert_eq!(writer.download_text("/notes.txt").await.unwrap(), "hello");

    assert!(writer.move_file("/notes.txt", "/docs/notes.txt").unwrap());
    assert!(!writer.has_file("/notes.txt"));
    assert!(!writer.move_file("/notes.txt", "/elsewhere.txt").unwrap());
    assert_eq!(
        writer.download_text("/docs/notes.txt").await.unwrap(),
        "hello"
    );

    let extra = writer
        .upload_file("/extra.bin", vec![1u8, 2, 3], UploadOptions::default())
        .await
        .unwrap();
    assert!(writer.remove_file("/extra.bin"));
    assert!(!writer.remove_file("/extra.bin"));

    // a file already in the store can be linked under any path
    writer.set_file("/linked.bin", extra).unwrap();
    writer.push().await.unwrap();
    assert!(!writer.is_dirty());

    let paths: Vec<String> = writer.files().keys().cloned().collect();
    assert_eq!(paths, vec!["/data.json", "/docs/notes.txt", "/linked.bin"]);

    // a second writer over the same key picks up the pushed record
    let mut clone =
        FileSystemWriter::new(env.channels(), alice.clone(), Some(bob.public().into())).unwrap();
    assert!(clone.files().is_empty());
    clone.initialize().await.unwrap();
    assert_eq!(clone.files(), writer.files());
    let data: serde_json::Value = clone.download_json("/data.json").await.unwrap();
    assert_eq!(data, json!({ "a": 1 }));
}

#[tokio::test]
async fn test_initialize_without_push_keeps_local_record() {
    let env = common::setup_test_env().await;
    let alice = TestEnv::party();

    let mut writer = FileSystemWriter::new(env.channels(), alice, None).unwrap();
    writer
        .upload_file("/draft.txt", "draft", UploadOptions::default())
        .await
        .unwrap();
    writer.initialize().await.unwrap();
    assert!(writer.has_file("/draft.txt"));
    assert!(writer.is_dirty());
}

#[tokio::test]
async fn test_reader_flow() {
    let env = common::setup_test_env().await;
    let alice = TestEnv::party();
    let bob = TestEnv::party();
    let eve = TestEnv::party();

    let mut writer =
        FileSystemWriter::new(env.channels(), alice.clone(), Some(bob.public().into())).unwrap();
    let reader =
        FileSystemReader::new(env.channels(), alice.public(), Some(bob.clone())).unwrap();
    let mut changes = reader.subscribe();

    // nothing pushed yet
    reader.pull().await.unwrap();
    assert!(reader.files().is_empty());

    writer
        .upload_file("/hello.txt", "hello bob", UploadOptions::encrypted())
        .await
        .unwrap();
    writer.push().await.unwrap();

    reader.pull().await.unwrap();
    assert!(changes.has_changed().unwrap());
    assert!(changes.borrow_and_update().contains_key("/hello.txt"));
    assert_eq!(reader.download_text("/hello.txt").await.unwrap(), "hello bob");

    // later pushes replace the whole record
    writer.remove_file("/hello.txt");
    writer
        .upload_file("/bye.txt", "bye bob", UploadOptions::default())
        .await
        .unwrap();
    writer.push().await.unwrap();
    reader.pull().await.unwrap();
    assert!(!reader.has_file("/hello.txt"));
    assert_eq!(reader.download_text("/bye.txt").await.unwrap(), "bye bob");

    // a reader the record was not written for sees nothing
    let outsider =
        FileSystemReader::new(env.channels(), alice.public(), Some(eve)).unwrap();
    outsider.pull().await.unwrap();
    assert!(outsider.files().is_empty());
}

#[tokio::test]
async fn test_public_file_system() {
    let env = common::setup_test_env().await;
    let alice = TestEnv::party();

    let mut writer = FileSystemWriter::new(env.channels(), alice.clone(), None).unwrap();
    writer
        .upload_file("/index.html", "<h1>alice</h1>", UploadOptions::default())
        .await
        .unwrap();
    writer.push().await.unwrap();

    let reader = FileSystemReader::new(env.channels(), alice.public(), None).unwrap();
    reader.pull().await.unwrap();
    assert_eq!(
        reader.download_text("/index.html").await.unwrap(),
        "<h1>alice</h1>"
    );
}

#[tokio::test]
async fn test_file_system_downloads() {
    let env = common::setup_test_env().await;
    let text = upload_file(env.channels(), "not json", UploadOptions::default())
        .await
        .unwrap();
    let binary = upload_file(env.channels(), vec![0xffu8, 0xfe], UploadOptions::default())
        .await
        .unwrap();
    let files: FilesRecord = [
        ("/text".to_string(), text),
        ("/binary".to_string(), binary),
    ]
    .into_iter()
    .collect();
    let fs = FileSystem::fixed(env.channels().clone(), files);

    assert!(matches!(
        fs.download_file("/missing").await,
        Err(FileSystemError::FileNotFound(_))
    ));
    assert!(matches!(
        fs.download_json::<serde_json::Value>("/text").await,
        Err(FileSystemError::Json(_))
    ));
    assert!(matches!(
        fs.download_text("/binary").await,
        Err(FileSystemError::Utf8(_))
    ));
    assert_eq!(fs.download_text("/text").await.unwrap(), "not json");
}
