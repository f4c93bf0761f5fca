//! Integration tests for the first contact / contact handshake

mod common;

use std::collections::BTreeMap;

use ::common::crypto::address;
use ::common::protocol::{
    contact_subscriber, first_contact_subscriber, read_actor, read_contact, read_first_contact,
    write_actor, write_contact, write_first_contact, Contact, FirstContact, Profile,
};
use ::common::sync::ChannelError;
use ::common::testkit::TestEnv;
use tokio::time::timeout;

#[tokio::test]
async fn test_first_contact_handshake_for_many_pairs() {
    let env = common::setup_test_env().await;

    for _ in 0..5 {
        let alice = TestEnv::party();
        let bob = TestEnv::party();

        write_actor(env.channels(), &alice, &common::actor(&alice, "Alice"))
            .await
            .unwrap();
        let alice_actor = read_actor(env.channels(), address(&alice.public()))
            .await
            .unwrap()
            .unwrap();
        write_actor(env.channels(), &bob, &common::actor(&bob, "Bob"))
            .await
            .unwrap();
        let bob_actor = read_actor(env.channels(), address(&bob.public()))
            .await
            .unwrap()
            .unwrap();

        let sent = FirstContact {
            contact_public_key: TestEnv::party().public(),
            actor_address: address(&alice.public()),
        };
        write_first_contact(env.channels(), &alice, bob_actor.public_key, &sent)
            .await
            .unwrap();

        let received = read_first_contact(env.channels(), &bob, alice_actor.public_key)
            .await
            .unwrap();
        assert_eq!(received, Some(sent));

        // nothing travels the other way until bob writes
        let reverse = read_first_contact(env.channels(), &alice, bob_actor.public_key)
            .await
            .unwrap();
        assert_eq!(reverse, None);
    }
}

#[tokio::test]
async fn test_first_contact_requires_public_key() {
    let env = common::setup_test_env().await;
    let alice = TestEnv::party();
    let bob = TestEnv::party();

    let sent = FirstContact {
        contact_public_key: TestEnv::party().public(),
        actor_address: address(&alice.public()),
    };
    let result =
        write_first_contact(env.channels(), &alice, address(&bob.public()), &sent).await;
    assert!(matches!(result, Err(ChannelError::InvalidParameters(_))));

    let result = read_first_contact(env.channels(), &bob, address(&alice.public())).await;
    assert!(matches!(result, Err(ChannelError::InvalidParameters(_))));
}

#[tokio::test]
async fn test_third_party_cannot_read_first_contact() {
    let env = common::setup_test_env().await;
    let alice = TestEnv::party();
    let bob = TestEnv::party();
    let eve = TestEnv::party();

    let sent = FirstContact {
        contact_public_key: TestEnv::party().public(),
        actor_address: address(&alice.public()),
    };
    write_first_contact(env.channels(), &alice, bob.public(), &sent)
        .await
        .unwrap();

    let seen = read_first_contact(env.channels(), &eve, alice.public())
        .await
        .unwrap();
    assert_eq!(seen, None);
}

#[tokio::test]
async fn test_contact_round_trip() {
    let env = common::setup_test_env().await;
    let alice_contact = TestEnv::party();
    let bob_contact = TestEnv::party();
    let mailbox = TestEnv::party();

    let mut extra = serde_json::Map::new();
    extra.insert("note".to_string(), serde_json::json!("met at the conference"));
    let sent = Contact {
        profile: Some(Profile::named("Alice")),
        file_system_key: Some(TestEnv::party().public()),
        mailboxes: Some(BTreeMap::from([("outbox".to_string(), mailbox.public())])),
        extra,
    };

    write_contact(env.channels(), &alice_contact, bob_contact.public(), &sent)
        .await
        .unwrap();
    let received = read_contact(env.channels(), &bob_contact, alice_contact.public())
        .await
        .unwrap();
    assert_eq!(received, Some(sent));
}

#[tokio::test]
async fn test_contact_rejects_bad_mailbox_name() {
    let env = common::setup_test_env().await;
    let alice_contact = TestEnv::party();
    let bob_contact = TestEnv::party();

    let sent = Contact {
        mailboxes: Some(BTreeMap::from([(
            "not/allowed".to_string(),
            TestEnv::party().public(),
        )])),
        ..Default::default()
    };
    let result = write_contact(env.channels(), &alice_contact, bob_contact.public(), &sent).await;
    assert!(matches!(result, Err(ChannelError::Validation(_))));
}

#[tokio::test]
async fn test_subscribers() {
    let env = common::setup_test_env().await;
    let alice = TestEnv::party();
    let bob = TestEnv::party();

    let mut first_contacts =
        first_contact_subscriber(env.channels(), &bob, alice.public(), common::INTERVAL)
            .unwrap();
    let mut contacts =
        contact_subscriber(env.channels(), &bob, alice.public(), common::INTERVAL).unwrap();

    let first_contact = FirstContact {
        contact_public_key: TestEnv::party().public(),
        actor_address: address(&alice.public()),
    };
    write_first_contact(env.channels(), &alice, bob.public(), &first_contact)
        .await
        .unwrap();
    let contact = Contact {
        profile: Some(Profile::named("Alice")),
        ..Default::default()
    };
    write_contact(env.channels(), &alice, bob.public(), &contact)
        .await
        .unwrap();

    // skip the empty observation, if it was made before the write
    let mut seen = None;
    while seen.is_none() {
        seen = timeout(common::WAIT, first_contacts.recv())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
    assert_eq!(seen, Some(first_contact));

    let mut seen = None;
    while seen.is_none() {
        seen = timeout(common::WAIT, contacts.recv())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
    assert_eq!(seen, Some(contact));
}
