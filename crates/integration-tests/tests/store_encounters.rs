mod support;

use chrono::Utc;
use serial_test::serial;
use shared::models::{Message, MessageContent, OwnerId};
use shared::repos::{HistoryStore, HistoryStoreError, MAX_HISTORY_LIMIT};

fn owner(raw: &str) -> OwnerId {
    OwnerId::new(raw).expect("owner id should be valid")
}

#[tokio::test]
#[serial]
async fn upsert_replaces_messages_and_preserves_created_at() {
    let Some(store) = support::test_store().await else {
        return;
    };
    support::reset_database(store.pool()).await;
    let owner = owner("owner-1");

    let first = vec![Message::user("1", "hello", Utc::now())];
    let second = vec![
        Message::user("1", "hello", Utc::now()),
        Message::assistant(
            "2",
            MessageContent::Plain("Hi, how can I help?".to_string()),
            Utc::now(),
        ),
    ];

    let created = store
        .upsert_encounter(&owner, Some("enc-1"), &first)
        .await
        .expect("first upsert should succeed");
    let updated = store
        .upsert_encounter(&owner, Some("enc-1"), &second)
        .await
        .expect("second upsert should succeed");

    assert!(created.created);
    assert!(!updated.created);
    assert_eq!(updated.created_at, created.created_at);
    assert!(updated.updated_at >= created.updated_at);

    let listed = store
        .fetch_encounters(&owner, MAX_HISTORY_LIMIT)
        .await
        .expect("listing should succeed");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].messages.len(), second.len());
    assert_eq!(listed[0].messages[1].content, second[1].content);
    assert_eq!(listed[0].created_at, created.created_at);
}

#[tokio::test]
#[serial]
async fn listing_is_owner_scoped_newest_first_and_capped() {
    let Some(store) = support::test_store().await else {
        return;
    };
    support::reset_database(store.pool()).await;
    let alice = owner("alice");

    for index in 0..(MAX_HISTORY_LIMIT + 2) {
        let encounter_id = format!("enc-{index:03}");
        store
            .upsert_encounter(
                &alice,
                Some(encounter_id.as_str()),
                &[Message::user("1", "hi", Utc::now())],
            )
            .await
            .expect("upsert should succeed");
    }
    store
        .upsert_encounter(
            &owner("bob"),
            None,
            &[Message::user("1", "hi", Utc::now())],
        )
        .await
        .expect("upsert should succeed");

    let listed = store
        .fetch_encounters(&alice, 500)
        .await
        .expect("listing should succeed");
    assert_eq!(listed.len(), MAX_HISTORY_LIMIT);
    assert_eq!(
        listed[0].encounter_id,
        format!("enc-{:03}", MAX_HISTORY_LIMIT + 1)
    );
    assert!(listed.iter().all(|encounter| encounter.owner == alice));
}

#[tokio::test]
#[serial]
async fn empty_message_sequences_are_rejected() {
    let Some(store) = support::test_store().await else {
        return;
    };

    let result = store
        .upsert_encounter(&owner("owner-1"), Some("enc-1"), &[])
        .await;

    assert!(matches!(result, Err(HistoryStoreError::EmptyEncounter)));
}
