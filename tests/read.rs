use quarry::prelude::*;
use serde_json::json;

#[macro_use]
mod common;

use common::{component, id, metric, setup, string, strings};

#[tokio::test]
async fn create_then_find_unique_round_trips() {
    let (client, _) = setup();
    let created = component(&client, "primary-db", Data::new().set("responseTime", 12)).await;

    let found = exec!(
        client
            .model("Component")
            .find_unique(FindUniqueArgs::new(WhereUniqueInput::by("id", id(&created))))
    )
    .expect("component exists");

    assert_eq!(found, created);
    assert_eq!(found.get("status"), Some(&json!("UNKNOWN")));
    assert_eq!(found.get("health").and_then(|h| h.as_f64()), Some(100.0));

    let typed: quarry_schema::Component = found.into_model().unwrap();
    assert_eq!(typed.name, "primary-db");
    assert_eq!(typed.response_time, Some(12));
    assert!(typed.metrics.is_none());
}

#[tokio::test]
async fn find_unique_misses_return_none_and_or_throw_fails() {
    let (client, _) = setup();
    let model = client.model("Component");

    let missing = exec!(model.find_unique(FindUniqueArgs::new(WhereUniqueInput::by("id", "nope"))));
    assert!(missing.is_none());

    let err = model
        .find_unique_or_throw(FindUniqueArgs::new(WhereUniqueInput::by("id", "nope")))
        .exec()
        .await
        .unwrap_err();
    assert!(matches!(err, QuarryError::RecordNotFound(_)));
    assert_eq!(err.code(), "P2025");

    let err = model
        .find_first_or_throw(FindManyArgs::new())
        .exec()
        .await
        .unwrap_err();
    assert!(matches!(err, QuarryError::RecordNotFound(_)));
}

#[tokio::test]
async fn unique_lookup_requires_a_unique_key() {
    let (client, store) = setup();
    let err = client
        .model("User")
        .find_unique(FindUniqueArgs::new(WhereUniqueInput::by("name", "ada")))
        .exec()
        .await
        .unwrap_err();
    assert!(matches!(err, QuarryError::Validation(_)));
    assert_eq!(store.statement_count(), 0);
}

#[tokio::test]
async fn empty_or_matches_nothing_and_empty_and_matches_everything() {
    let (client, _) = setup();
    component(&client, "a", Data::new()).await;
    component(&client, "b", Data::new()).await;
    let model = client.model("Component");

    let none = exec!(model.find_many(FindManyArgs::new().filter(WhereInput::new().or(vec![]))));
    assert!(none.is_empty());

    let all = exec!(model.find_many(FindManyArgs::new().filter(WhereInput::new().and(vec![]))));
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn scalar_filters_and_ordering() {
    let (client, _) = setup();
    for (name, rt) in [("alpha", 30), ("beta", 10), ("Gamma", 20)] {
        component(&client, name, Data::new().set("responseTime", rt)).await;
    }
    component(&client, "delta", Data::new()).await;
    let model = client.model("Component");

    let fast = exec!(model.find_many(
        FindManyArgs::new()
            .filter(WhereInput::new().field("responseTime", ScalarFilter::new().lte(20)))
            .order_by(OrderBy::desc("responseTime")),
    ));
    assert_eq!(strings(&fast, "name"), ["Gamma", "beta"]);

    let by_name = exec!(model.find_many(
        FindManyArgs::new()
            .filter(WhereInput::new().field(
                "name",
                ScalarFilter::new().starts_with("g").insensitive(),
            )),
    ));
    assert_eq!(strings(&by_name, "name"), ["Gamma"]);

    let nulls_first = exec!(model.find_many(
        FindManyArgs::new().order_by(OrderBy::asc("responseTime").nulls_first()),
    ));
    assert_eq!(strings(&nulls_first, "name"), ["delta", "beta", "Gamma", "alpha"]);

    let unset = exec!(model.find_many(
        FindManyArgs::new().filter(WhereInput::new().field("responseTime", ScalarFilter::new().is_null())),
    ));
    assert_eq!(strings(&unset, "name"), ["delta"]);
}

#[tokio::test]
async fn cursor_and_negative_take_page_through_a_window() {
    let (client, _) = setup();
    for name in ["c1", "c2", "c3", "c4", "c5"] {
        component(&client, name, Data::new()).await;
    }
    let model = client.model("Component");
    let cursor = exec!(model.find_first(
        FindManyArgs::new().filter(WhereInput::new().eq("name", "c3")),
    ))
    .unwrap();

    let forward = exec!(model.find_many(
        FindManyArgs::new()
            .order_by(OrderBy::asc("name"))
            .cursor(WhereUniqueInput::by("id", id(&cursor)))
            .skip(1)
            .take(2),
    ));
    assert_eq!(strings(&forward, "name"), ["c4", "c5"]);

    let backward = exec!(model.find_many(
        FindManyArgs::new()
            .order_by(OrderBy::asc("name"))
            .cursor(WhereUniqueInput::by("id", id(&cursor)))
            .take(-2),
    ));
    assert_eq!(strings(&backward, "name"), ["c2", "c3"]);

    let last = exec!(model.find_first(FindManyArgs::new().order_by(OrderBy::asc("name")).take(-1)))
        .unwrap();
    assert_eq!(string(&last, "name"), "c5");
}

#[tokio::test]
async fn distinct_keeps_the_first_row_per_value() {
    let (client, _) = setup();
    component(&client, "a", Data::new().set("status", "HEALTHY")).await;
    component(&client, "b", Data::new().set("status", "CRITICAL")).await;
    component(&client, "c", Data::new().set("status", "HEALTHY")).await;

    let rows = exec!(client.model("Component").find_many(
        FindManyArgs::new()
            .order_by(OrderBy::asc("name"))
            .distinct(["status"]),
    ));
    assert_eq!(strings(&rows, "name"), ["a", "b"]);
}

#[tokio::test]
async fn include_loads_related_rows_and_counts() {
    let (client, _) = setup();
    let db = component(&client, "db", Data::new()).await;
    let cache = component(&client, "cache", Data::new()).await;
    metric(&client, &id(&db), "cpu", 0.5).await;
    metric(&client, &id(&db), "mem", 0.7).await;
    metric(&client, &id(&cache), "hits", 0.9).await;

    let rows = exec!(client.model("Component").find_many(
        FindManyArgs::new()
            .order_by(OrderBy::asc("name"))
            .include(
                Include::new()
                    .relation_with("metrics", FindManyArgs::new().order_by(OrderBy::desc("name")))
                    .count(CountSelect::all()),
            ),
    ));

    assert_eq!(rows.len(), 2);
    let db_metrics = rows[1].get("metrics").and_then(|m| m.as_array()).unwrap();
    let names: Vec<_> = db_metrics.iter().map(|m| m["name"].as_str().unwrap()).collect();
    assert_eq!(names, ["mem", "cpu"]);
    assert_eq!(rows[0].get("_count"), Some(&json!({ "metrics": 1, "alerts": 0 })));
    assert_eq!(rows[1].get("_count"), Some(&json!({ "metrics": 2, "alerts": 0 })));

    let typed: quarry_schema::Component = rows[1].clone().into_model().unwrap();
    assert_eq!(typed.metrics.map(|m| m.len()), Some(2));
}

#[tokio::test]
async fn incident_counts_its_events() {
    let (client, _) = setup();
    let incident = exec!(client.model("Incident").create(CreateArgs::new(
        Data::new()
            .set("title", "outage")
            .set("status", "OPEN")
            .set("severity", "HIGH")
            .create("events", Data::new().set("type", "DETECTED").set("description", "d").set("severity", "HIGH"))
            .create("events", Data::new().set("type", "PAGED").set("description", "p").set("severity", "HIGH"))
            .create("events", Data::new().set("type", "MITIGATED").set("description", "m").set("severity", "LOW")),
    )));

    let counted = exec!(client.model("Incident").find_unique(
        FindUniqueArgs::new(WhereUniqueInput::by("id", id(&incident)))
            .select(Select::new().field("title").count(CountSelect::all().relation("events"))),
    ))
    .unwrap();
    assert_eq!(
        counted.into_json(),
        json!({ "title": "outage", "_count": { "events": 3 } })
    );
}

#[tokio::test]
async fn select_and_include_together_are_rejected_before_any_statement() {
    let (client, store) = setup();
    let err = client
        .model("Component")
        .find_many(
            FindManyArgs::new()
                .select(Select::new().field("name"))
                .include(Include::new().relation("metrics")),
        )
        .exec()
        .await
        .unwrap_err();
    assert!(matches!(err, QuarryError::Validation(_)));
    assert_eq!(store.statement_count(), 0);
}

#[tokio::test]
async fn omit_hides_fields_locally_and_globally() {
    let schema = common::schema();
    let store = quarry_drivers::MemoryStore::new(schema.clone());
    let client = Client::builder(store, schema)
        .omit("User", ["password"])
        .build()
        .unwrap();

    let user = exec!(client.model("User").create(CreateArgs::new(
        Data::new().set("email", "ada@example.com").set("password", "hunter2"),
    )));
    assert!(!user.contains("password"));

    let with_password = exec!(client.model("User").find_unique(
        FindUniqueArgs::new(WhereUniqueInput::by("email", "ada@example.com"))
            .omit(Omit::new().keep("password").field("image")),
    ))
    .unwrap();
    assert_eq!(with_password.get("password"), Some(&json!("hunter2")));
    assert!(!with_password.contains("image"));

    let err = Client::builder(quarry_drivers::MemoryStore::new(common::schema()), common::schema())
        .omit("User", ["nickname"])
        .build()
        .unwrap_err();
    assert!(matches!(err, QuarryError::Validation(_)));
}

#[tokio::test]
async fn relation_filters_some_every_none() {
    let (client, _) = setup();
    let busy = component(&client, "busy", Data::new()).await;
    let mixed = component(&client, "mixed", Data::new()).await;
    component(&client, "idle", Data::new()).await;
    metric(&client, &id(&busy), "cpu", 0.9).await;
    metric(&client, &id(&mixed), "cpu", 0.9).await;
    metric(&client, &id(&mixed), "cpu", 0.1).await;

    let hot = || WhereInput::new().field("value", ScalarFilter::new().gt(0.5));
    let names = |filter: RelationFilter| {
        let client = &client;
        async move {
            let rows = exec!(client.model("Component").find_many(
                FindManyArgs::new()
                    .filter(WhereInput::new().field("metrics", filter))
                    .order_by(OrderBy::asc("name")),
            ));
            strings(&rows, "name")
        }
    };

    assert_eq!(names(RelationFilter::Some(hot())).await, ["busy", "mixed"]);
    assert_eq!(names(RelationFilter::Every(hot())).await, ["busy", "idle"]);
    assert_eq!(names(RelationFilter::None(hot())).await, ["idle"]);

    let owned = exec!(client.model("Metric").find_many(FindManyArgs::new().filter(
        WhereInput::new().field("component", RelationFilter::Is(Some(WhereInput::new().eq("name", "busy")))),
    )));
    assert_eq!(owned.len(), 1);
}

#[tokio::test]
async fn json_null_markers_filter_differently() {
    let (client, _) = setup();
    let model = client.model("SystemHealth");
    for (status, metadata) in [
        ("HEALTHY", None),
        ("WARNING", Some(NullMarker::JsonNull)),
        ("CRITICAL", Some(NullMarker::DbNull)),
    ] {
        let mut data = Data::new().set("status", status).set("healthPercentage", 90.0);
        if let Some(marker) = metadata {
            data = data.json_null("metadata", marker);
        }
        exec!(model.create(CreateArgs::new(data)));
    }
    exec!(model.create(CreateArgs::new(
        Data::new()
            .set("status", "UNKNOWN")
            .set("healthPercentage", 10.0)
            .set("metadata", json!({ "region": "eu" })),
    )));

    let matching = |marker: NullMarker| {
        let model = model;
        async move {
            let rows = exec!(model.find_many(
                FindManyArgs::new()
                    .filter(WhereInput::new().field("metadata", JsonFilter::new().equals(marker)))
                    .order_by(OrderBy::asc("status")),
            ));
            strings(&rows, "status")
        }
    };

    assert_eq!(matching(NullMarker::DbNull).await, ["CRITICAL", "HEALTHY"]);
    assert_eq!(matching(NullMarker::JsonNull).await, ["WARNING"]);
    assert_eq!(matching(NullMarker::AnyNull).await, ["CRITICAL", "HEALTHY", "WARNING"]);

    let eu = exec!(model.find_many(FindManyArgs::new().filter(WhereInput::new().field(
        "metadata",
        JsonFilter::new().path(["region"]).equals(json!("eu")),
    ))));
    assert_eq!(strings(&eu, "status"), ["UNKNOWN"]);
}

#[tokio::test]
async fn fluent_follows_a_relation_from_one_record() {
    let (client, _) = setup();
    let db = component(&client, "db", Data::new()).await;
    metric(&client, &id(&db), "cpu", 0.5).await;
    let mem = metric(&client, &id(&db), "mem", 0.7).await;

    let metrics = exec!(client
        .model("Component")
        .find_unique(FindUniqueArgs::new(WhereUniqueInput::by("id", id(&db))))
        .fluent_with("metrics", FindManyArgs::new().order_by(OrderBy::asc("name"))))
    .into_records()
    .unwrap();
    assert_eq!(strings(&metrics, "name"), ["cpu", "mem"]);

    let owner = exec!(client
        .model("Metric")
        .find_unique_or_throw(FindUniqueArgs::new(WhereUniqueInput::by("id", id(&mem))))
        .fluent("component"))
    .into_record()
    .unwrap()
    .unwrap();
    assert_eq!(string(&owner, "name"), "db");

    let missing = exec!(client
        .model("Component")
        .find_unique(FindUniqueArgs::new(WhereUniqueInput::by("id", "nope")))
        .fluent("metrics"));
    assert_eq!(missing, Payload::Record(None));
}

#[tokio::test]
async fn unknown_fields_and_unorderable_fields_are_validation_errors() {
    let (client, store) = setup();
    let model = client.model("Metric");

    let err = model
        .find_many(FindManyArgs::new().filter(WhereInput::new().eq("colour", "red")))
        .exec()
        .await
        .unwrap_err();
    assert!(matches!(err, QuarryError::Validation(_)));

    let err = model
        .find_many(FindManyArgs::new().order_by(OrderBy::asc("metadata")))
        .exec()
        .await
        .unwrap_err();
    assert!(matches!(err, QuarryError::Validation(_)));

    let err = client.model("Widget").find_many(FindManyArgs::new()).exec().await.unwrap_err();
    assert!(matches!(err, QuarryError::Validation(_)));
    assert_eq!(store.statement_count(), 0);
}

#[tokio::test]
async fn component_with_included_metrics() {
    let (client, _) = setup();
    let db = exec!(client.model("Component").create(CreateArgs::new(
        Data::new().set("name", "orders-db").set("type", "DATABASE").set("health", 98.5),
    )));
    exec!(client.model("Metric").create(CreateArgs::new(
        Data::new()
            .set("componentId", id(&db))
            .set("name", "latency")
            .set("value", 12.3),
    )));

    let found = exec!(client.model("Component").find_unique(
        FindUniqueArgs::new(WhereUniqueInput::by("id", id(&db))).include(Include::new().relation("metrics")),
    ))
    .unwrap();
    assert_eq!(found.get("health"), Some(&json!(98.5)));
    let metrics = found.get("metrics").and_then(|m| m.as_array()).unwrap();
    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0]["name"], json!("latency"));
    assert_eq!(metrics[0]["value"], json!(12.3));
}

#[tokio::test]
async fn include_count_of_events_created_in_bulk() {
    let (client, _) = setup();
    let incident = exec!(client.model("Incident").create(CreateArgs::new(
        Data::new().set("title", "latency spike").set("status", "OPEN").set("severity", "MEDIUM"),
    )));
    let events = ["opened", "escalated", "closed"]
        .into_iter()
        .map(|description| {
            Data::new()
                .set("type", "UPDATE")
                .set("description", description)
                .set("severity", "MEDIUM")
                .set("incidentId", id(&incident))
        })
        .collect();
    let created = exec!(client.model("SystemEvent").create_many(CreateManyArgs::new(events)));
    assert_eq!(created.count, 3);

    let found = exec!(client.model("Incident").find_unique(
        FindUniqueArgs::new(WhereUniqueInput::by("id", id(&incident)))
            .include(Include::new().count(CountSelect::all().relation("events"))),
    ))
    .unwrap();
    assert_eq!(found.get("_count"), Some(&json!({ "events": 3 })));
    assert_eq!(string(&found, "title"), "latency spike");
}
