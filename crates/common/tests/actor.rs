//! Integration tests for the actor protocol

mod common;

use ::common::crypto::address;
use ::common::protocol::{
    actor_subscriber, actor_writer, read_actor, write_actor, FirstContact, Profile,
};
use ::common::sync::{ChannelError, ReaderParams};
use ::common::testkit::TestEnv;
use tokio::time::timeout;

#[tokio::test]
async fn test_write_and_read_by_address() {
    let env = common::setup_test_env().await;
    let alice = TestEnv::party();

    assert!(read_actor(env.channels(), address(&alice.public()))
        .await
        .unwrap()
        .is_none());

    let actor = common::actor(&alice, "Alice");
    write_actor(env.channels(), &alice, &actor).await.unwrap();

    let by_address = read_actor(env.channels(), address(&alice.public()))
        .await
        .unwrap();
    assert_eq!(by_address, Some(actor.clone()));

    let by_key = read_actor(env.channels(), alice.public()).await.unwrap();
    assert_eq!(by_key, Some(actor));
}

#[tokio::test]
async fn test_write_overwrites() {
    let env = common::setup_test_env().await;
    let alice = TestEnv::party();

    write_actor(env.channels(), &alice, &common::actor(&alice, "Alice"))
        .await
        .unwrap();
    let mut renamed = common::actor(&alice, "Alice B.");
    renamed.profile.description = Some("second profile".to_string());
    write_actor(env.channels(), &alice, &renamed).await.unwrap();

    let read = read_actor(env.channels(), alice.public()).await.unwrap();
    assert_eq!(read, Some(renamed));
}

#[tokio::test]
async fn test_actor_record_must_name_writer() {
    let env = common::setup_test_env().await;
    let alice = TestEnv::party();
    let mallory = TestEnv::party();

    let result = write_actor(env.channels(), &mallory, &common::actor(&alice, "Alice")).await;
    assert!(matches!(result, Err(ChannelError::InvalidParameters(_))));
}

#[tokio::test]
async fn test_profile_limits_are_enforced() {
    let env = common::setup_test_env().await;
    let alice = TestEnv::party();

    let mut actor = common::actor(&alice, "Alice");
    actor.profile = Profile::named("A".repeat(101));
    let result = write_actor(env.channels(), &alice, &actor).await;
    assert!(matches!(result, Err(ChannelError::Validation(_))));
    assert!(read_actor(env.channels(), alice.public())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_subscriber_sees_publication() {
    let env = common::setup_test_env().await;
    let alice = TestEnv::party();
    let actor = common::actor(&alice, "Alice");

    let mut subscription =
        actor_subscriber(env.channels(), alice.public(), common::INTERVAL).unwrap();

    // the empty feed is observed first
    let first = timeout(common::WAIT, subscription.recv())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(first, None);

    let writer = actor_writer(env.channels(), &alice).unwrap();
    writer.publish(&actor).await.unwrap();

    let next = timeout(common::WAIT, subscription.recv())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(next, Some(actor));

    subscription.cancel();
    assert!(subscription.recv().await.is_none());
}

#[tokio::test]
async fn test_writer_rejects_foreign_record() {
    let env = common::setup_test_env().await;
    let alice = TestEnv::party();
    let mallory = TestEnv::party();

    let writer = actor_writer(env.channels(), &mallory).unwrap();
    let result = writer.publish(&common::actor(&alice, "Alice")).await;
    assert!(matches!(result, Err(ChannelError::InvalidParameters(_))));
    assert!(read_actor(env.channels(), mallory.public())
        .await
        .unwrap()
        .is_none());

    // the writer stays usable for its own record
    let own = common::actor(&mallory, "Mallory");
    writer.publish(&own).await.unwrap();
    let read = read_actor(env.channels(), mallory.public()).await.unwrap();
    assert_eq!(read, Some(own));
}

#[tokio::test]
async fn test_subscriber_reports_wrong_entity_type() {
    let env = common::setup_test_env().await;
    let alice = TestEnv::party();
    write_actor(env.channels(), &alice, &common::actor(&alice, "Alice"))
        .await
        .unwrap();

    // the actor slot holds an Actor, not a FirstContact
    let mut subscription = env
        .channels()
        .feed_subscriber::<FirstContact>(
            ReaderParams::new(alice.public()).name("actor"),
            common::INTERVAL,
        )
        .unwrap();

    let first = timeout(common::WAIT, subscription.recv()).await.unwrap();
    assert!(matches!(first, Some(Err(ChannelError::Decode(_)))));
    let next = timeout(common::WAIT, subscription.recv()).await.unwrap();
    assert!(next.is_none());
}

#[tokio::test]
async fn test_zero_interval_subscription_fails() {
    let env = common::setup_test_env().await;
    let alice = TestEnv::party();

    let mut subscription =
        actor_subscriber(env.channels(), alice.public(), std::time::Duration::ZERO).unwrap();
    let first = timeout(common::WAIT, subscription.recv()).await.unwrap();
    assert!(matches!(first, Some(Err(ChannelError::InvalidParameters(_)))));
    assert!(subscription.recv().await.is_none());
}
