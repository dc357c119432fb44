use std::time::Duration;

use quarry::prelude::*;
use quarry::{Action, ClientConfig};
use quarry_drivers::{MemoryStore, MemoryTransaction};

#[macro_use]
mod common;

use common::{component, id, setup};

fn create_component(name: &str) -> CreateArgs {
    CreateArgs::new(Data::new().set("name", name).set("type", "CACHE_LAYER"))
}

#[tokio::test]
async fn interactive_transaction_commits_on_ok() {
    let (client, store) = setup();

    let created = client
        .transaction(async |tx: &TxClient<MemoryTransaction>| -> quarry::Result<Record> {
            let created = tx.model("Component").create(create_component("cache")).exec().await?;
            let seen = tx
                .model("Component")
                .find_unique(FindUniqueArgs::new(WhereUniqueInput::by("id", id(&created))))
                .exec()
                .await?;
            assert!(seen.is_some());
            Ok(created)
        })
        .await
        .unwrap();

    let rows = store.rows("Component").await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("id"), &quarry::core::Value::from(id(&created)));
}

#[tokio::test]
async fn interactive_transaction_rolls_back_on_err() {
    let (client, store) = setup();
    component(&client, "kept", Data::new()).await;

    let err = client
        .transaction(async |tx: &TxClient<MemoryTransaction>| -> quarry::Result<()> {
            tx.model("Component").create(create_component("discarded")).exec().await?;
            tx.model("Component")
                .delete_many(DeleteManyArgs::new())
                .exec()
                .await?;
            Err(QuarryError::validation("changed my mind"))
        })
        .await
        .unwrap_err();

    assert!(matches!(err, QuarryError::Validation(_)));
    let rows = store.rows("Component").await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("name"), &quarry::core::Value::from("kept"));
}

#[tokio::test]
async fn interactive_transaction_times_out_and_rolls_back() {
    let (client, store) = setup();
    let options = TransactionOptions::default().timeout(Duration::from_millis(50));

    let err = client
        .transaction_with(options, async |tx: &TxClient<MemoryTransaction>| -> quarry::Result<()> {
            tx.model("Component").create(create_component("slow")).exec().await?;
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(())
        })
        .await
        .unwrap_err();

    assert!(matches!(err, QuarryError::TransactionTimeout(_)));
    assert_eq!(err.code(), "P2028");
    assert!(store.rows("Component").await.is_empty());
}

#[tokio::test]
async fn waiting_too_long_to_start_is_a_timeout() {
    let (client, _) = setup();
    let impatient = TransactionOptions::default().max_wait(Duration::from_millis(20));

    let (held, waited) = tokio::join!(
        client.transaction(async |_: &TxClient<MemoryTransaction>| -> quarry::Result<()> {
            tokio::time::sleep(Duration::from_millis(300)).await;
            Ok(())
        }),
        async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            client
                .transaction_with(impatient, async |_: &TxClient<MemoryTransaction>| -> quarry::Result<()> {
                    Ok(())
                })
                .await
        }
    );

    held.unwrap();
    assert!(matches!(waited, Err(QuarryError::TransactionTimeout(_))));
}

#[tokio::test]
async fn batch_runs_all_or_nothing() {
    let (client, store) = setup();
    let components = client.model("Component");

    let payloads = client
        .batch(vec![
            components.create(create_component("a")).into_operation(),
            components.create(create_component("b")).into_operation(),
            components.count(CountArgs::new()).into_operation(),
        ])
        .await
        .unwrap();
    assert_eq!(payloads.len(), 3);
    assert_eq!(payloads[2], Payload::Count(CountResult::Total(2)));

    let err = client
        .batch(vec![
            components.create(create_component("c")).into_operation(),
            components
                .create(CreateArgs::new(Data::new().set("name", "untyped")))
                .into_operation(),
        ])
        .await
        .unwrap_err();
    assert!(matches!(err, QuarryError::Validation(_)));
    assert_eq!(store.rows("Component").await.len(), 2);
}

#[tokio::test]
async fn deferred_operations_are_inspectable() {
    let (client, store) = setup();
    let query = client
        .model("Setting")
        .update_many(UpdateManyArgs::new(Data::new().set("value", "off")));

    assert_eq!(query.operation().entity, "Setting");
    assert_eq!(query.operation().action.name(), "updateMany");
    assert!(matches!(query.into_operation().action, Action::UpdateMany(_)));
    assert_eq!(store.statement_count(), 0);
}

#[tokio::test]
async fn connect_reports_an_unreachable_store() {
    let schema = common::schema();
    let client = Client::new(MemoryStore::unreachable(schema.clone()), schema).unwrap();
    let err = client.connect().await.unwrap_err();
    assert!(matches!(err, QuarryError::Initialization(_)));
    assert_eq!(err.code(), "P1001");

    let (reachable, _) = setup();
    reachable.connect().await.unwrap();
    reachable.disconnect().await.unwrap();
}

#[tokio::test]
async fn config_file_sets_transaction_defaults_and_omits() {
    let config = ClientConfig::parse(
        r#"
        log_queries = true

        [transaction]
        timeout_ms = 40

        [omit]
        Setting = ["description"]
        "#,
    )
    .unwrap();
    let schema = common::schema();
    let client = Client::builder(MemoryStore::new(schema.clone()), schema)
        .config(&config)
        .build()
        .unwrap();

    let setting = exec!(client.model("Setting").create(CreateArgs::new(
        Data::new()
            .set("key", "k")
            .set("value", "v")
            .set("description", "hidden"),
    )));
    assert!(!setting.contains("description"));

    let err = client
        .transaction(async |_: &TxClient<MemoryTransaction>| -> quarry::Result<()> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        })
        .await
        .unwrap_err();
    assert!(matches!(err, QuarryError::TransactionTimeout(_)));
}
