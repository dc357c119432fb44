//! Shared setup for the integration tests: a client over a fresh in-memory
//! store, plus seed helpers for the entities most tests touch.
#![allow(dead_code)]

use std::sync::Arc;

use quarry::prelude::*;
use quarry_drivers::MemoryStore;
use serde_json::Value as Json;

pub type TestClient = Client<MemoryStore>;

pub fn schema() -> Arc<quarry::Schema> {
    Arc::new(quarry_schema::schema().expect("schema is valid"))
}

/// A client plus a handle on its store for inspecting committed rows.
pub fn setup() -> (TestClient, MemoryStore) {
    let schema = schema();
    let store = MemoryStore::new(schema.clone());
    let client = Client::new(store.clone(), schema).expect("client builds");
    (client, store)
}

/// Unwraps an operation result, panicking with the error code on failure.
macro_rules! exec {
    ($query:expr) => {
        match $query.exec().await {
            Ok(v) => v,
            Err(e) => panic!("{} failed [{}]: {e}", stringify!($query), e.code()),
        }
    };
}

pub async fn component(client: &TestClient, name: &str, data: Data) -> Record {
    exec!(client.model("Component").create(CreateArgs::new(
        data.set("name", name).set("type", "DATABASE"),
    )))
}

pub async fn metric(client: &TestClient, component_id: &str, name: &str, value: f64) -> Record {
    exec!(client.model("Metric").create(CreateArgs::new(
        Data::new()
            .set("componentId", component_id)
            .set("name", name)
            .set("value", value),
    )))
}

pub fn id(record: &Record) -> String {
    string(record, "id")
}

pub fn string(record: &Record, field: &str) -> String {
    record
        .get(field)
        .and_then(Json::as_str)
        .unwrap_or_else(|| panic!("`{field}` is not a string in {record:?}"))
        .to_owned()
}

pub fn strings(records: &[Record], field: &str) -> Vec<String> {
    records.iter().map(|r| string(r, field)).collect()
}
