//! Storage behaviour against the in-memory store
//!
//! Covers table lifecycle, descriptor reflection, catalog prefix/filter
//! handling and the insert-or-update write path.

use serde_json::json;
use tableschema_core::mapping::{to_logical, to_native, BIJECTIVE};
use tableschema_core::{
    FieldDescriptor, ForeignKey, LogicalType, NativeType, PrimaryKey, SchemaDescriptor,
    SchemaError, UnsupportedType, Value,
};
use tableschema_sql::{
    CreateOptions, MemoryStore, MemoryStoreError, NativeColumn, RawRow, RelationalStore,
    Storage, StorageConfig, StorageError, StoreError, TableLayout, WriteOptions, WriteOutcome,
};

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("tableschema_sql=debug")
        .try_init()
        .ok();
}

fn articles_schema() -> SchemaDescriptor {
    SchemaDescriptor::new(vec![
        FieldDescriptor::new("person_id", LogicalType::Integer),
        FieldDescriptor::new("name", LogicalType::String),
        FieldDescriptor::new("color", LogicalType::String),
    ])
}

fn row(person_id: i64, name: &str, color: &str) -> RawRow {
    RawRow::Positional(vec![json!(person_id), json!(name), json!(color)])
}

fn original_rows() -> Vec<RawRow> {
    vec![
        row(1, "alice", "red"),
        row(2, "bob", "green"),
        row(3, "carol", "blue"),
        row(4, "dave", "black"),
        row(5, "erin", "white"),
    ]
}

/// Three keys match the original rows, two are new.
fn second_batch() -> Vec<RawRow> {
    vec![
        row(3, "carol", "yellow"),
        row(6, "frank", "purple"),
        row(1, "alice", "orange"),
        row(7, "grace", "pink"),
        row(5, "erin", "grey"),
    ]
}

fn identity_storage() -> Storage<MemoryStore> {
    Storage::new(
        MemoryStore::new(),
        StorageConfig::new().with_identity_column("__id"),
    )
}

#[test]
fn test_mapping_round_trip() {
    for logical in BIJECTIVE {
        let native = to_native(logical).unwrap();
        assert_eq!(to_logical(native).unwrap(), logical, "round trip of {logical}");
    }
}

#[tokio::test]
async fn test_create_delete_exists() {
    init_tracing();
    let mut storage = Storage::new(MemoryStore::new(), StorageConfig::default());

    assert!(!storage.exists("articles").await.unwrap());
    storage.create("articles", &articles_schema()).await.unwrap();
    assert!(storage.exists("articles").await.unwrap());
    assert_eq!(storage.tables().await.unwrap(), vec!["articles"]);

    storage.delete("articles").await.unwrap();
    assert!(!storage.exists("articles").await.unwrap());
    assert!(storage.tables().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_existence_conflicts() {
    let mut storage = Storage::new(MemoryStore::new(), StorageConfig::default());
    storage.create("articles", &articles_schema()).await.unwrap();

    let err = storage
        .create("articles", &articles_schema())
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::AlreadyExists(ref t) if t == "articles"));

    let err = storage.delete("missing").await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound(ref t) if t == "missing"));

    let err = storage.describe("missing").await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound(_)));

    let err = storage.read("missing").await.unwrap_err();
    assert!(matches!(err, StorageError::NotFound(_)));

    let err = storage
        .write("missing", original_rows(), WriteOptions::insert())
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound(_)));
}

#[tokio::test]
async fn test_describe_reproduces_schema() {
    let mut storage = identity_storage();
    let schema = SchemaDescriptor::new(
        BIJECTIVE
            .iter()
            .map(|t| FieldDescriptor::new(format!("field_{t}"), *t))
            .chain(std::iter::once(FieldDescriptor::required(
                "id",
                LogicalType::Integer,
            )))
            .collect(),
    )
    .with_primary_key(PrimaryKey::Single("id".to_string()));

    storage.create("everything", &schema).await.unwrap();
    assert_eq!(storage.describe("everything").await.unwrap(), schema);
}

#[tokio::test]
async fn test_lossy_types_describe_as_object() {
    let mut storage = Storage::new(MemoryStore::new(), StorageConfig::default());
    let schema = SchemaDescriptor::new(vec![
        FieldDescriptor::new("tags", LogicalType::Array),
        FieldDescriptor::new("shape", LogicalType::Geojson),
    ]);
    storage.create("lossy", &schema).await.unwrap();

    let described = storage.describe("lossy").await.unwrap();
    let types: Vec<_> = described.fields.iter().map(|f| f.field_type).collect();
    assert_eq!(types, vec![LogicalType::Object, LogicalType::Object]);
}

#[tokio::test]
async fn test_unsupported_type() {
    let mut storage = Storage::new(MemoryStore::new(), StorageConfig::default());
    let schema = SchemaDescriptor::new(vec![
        FieldDescriptor::new("id", LogicalType::Integer),
        FieldDescriptor::new("anything", LogicalType::Any),
    ]);

    let err = storage.create("bad", &schema).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Type \"any\" of field \"anything\" is not supported"
    );
    assert!(matches!(
        err,
        StorageError::UnsupportedType(UnsupportedType::Field { ref field, field_type: LogicalType::Any })
            if field == "anything"
    ));
    assert!(!storage.exists("bad").await.unwrap());
}

#[tokio::test]
async fn test_array_fields_are_writable() {
    let mut storage = Storage::new(MemoryStore::new(), StorageConfig::default());
    let schema = SchemaDescriptor::new(vec![
        FieldDescriptor::new("id", LogicalType::Integer),
        FieldDescriptor::new("tags", LogicalType::Array),
    ]);
    storage.create("tagged", &schema).await.unwrap();

    let rows = vec![
        RawRow::Positional(vec![json!(1), json!(["a"])]),
        RawRow::Positional(vec![json!(2), json!("[1,2]")]),
    ];
    storage
        .write("tagged", rows.clone(), WriteOptions::insert())
        .await
        .unwrap();
    // Upserts cast against the reflected JSON column the same way.
    let outcomes = storage
        .write("tagged", rows, WriteOptions::upsert(["id"]))
        .await
        .unwrap();
    assert!(outcomes.iter().all(|o| o.updated));

    assert_eq!(
        storage.read("tagged").await.unwrap(),
        vec![
            vec![Value::Integer(1), Value::Json(json!(["a"]))],
            vec![Value::Integer(2), Value::Json(json!([1, 2]))],
        ]
    );

    let err = storage
        .write(
            "tagged",
            vec![RawRow::Positional(vec![json!(3), json!("plain text")])],
            WriteOptions::insert(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Cast(ref e) if e.field == "tags"));
}

#[tokio::test]
async fn test_upsert_with_identity() {
    init_tracing();
    let mut storage = identity_storage();
    storage.create("articles", &articles_schema()).await.unwrap();
    let keys = WriteOptions::upsert(["person_id", "name"]);

    let first = storage
        .write("articles", original_rows(), keys.clone())
        .await
        .unwrap();
    assert_eq!(
        first,
        (1..=5)
            .map(|id| WriteOutcome::inserted(Some(id)))
            .collect::<Vec<_>>()
    );

    let second = storage
        .write("articles", second_batch(), keys.clone())
        .await
        .unwrap();
    assert_eq!(
        second,
        vec![
            WriteOutcome::updated(Some(3)),
            WriteOutcome::inserted(Some(6)),
            WriteOutcome::updated(Some(1)),
            WriteOutcome::inserted(Some(7)),
            WriteOutcome::updated(Some(5)),
        ]
    );

    let third = storage
        .write("articles", second_batch(), keys)
        .await
        .unwrap();
    let identities: Vec<_> = third.iter().map(|o| o.identity).collect();
    assert!(third.iter().all(|o| o.updated));
    assert_eq!(identities, vec![Some(3), Some(6), Some(1), Some(7), Some(5)]);

    // Non-key fields were updated in place.
    let rows = storage.read("articles").await.unwrap();
    assert_eq!(rows.len(), 7);
    assert!(rows.contains(&vec![
        Value::Integer(1),
        Value::String("alice".into()),
        Value::String("orange".into()),
    ]));
}

#[tokio::test]
async fn test_upsert_without_identity() {
    let mut storage = Storage::new(MemoryStore::new(), StorageConfig::default());
    storage.create("articles", &articles_schema()).await.unwrap();
    let keys = WriteOptions::upsert(["person_id", "name"]);

    let first = storage
        .write("articles", original_rows(), keys.clone())
        .await
        .unwrap();
    let second = storage
        .write("articles", second_batch(), keys)
        .await
        .unwrap();

    assert!(first.iter().chain(&second).all(|o| o.identity.is_none()));
    assert_eq!(second.iter().filter(|o| o.updated).count(), 3);
}

#[tokio::test]
async fn test_plain_insert_in_batches() {
    let mut storage = Storage::new(
        MemoryStore::new(),
        StorageConfig::new()
            .with_identity_column("__id")
            .with_batch_size(2),
    );
    storage.create("articles", &articles_schema()).await.unwrap();

    let outcomes = storage
        .write("articles", original_rows(), WriteOptions::insert())
        .await
        .unwrap();
    assert_eq!(
        outcomes,
        (1..=5)
            .map(|id| WriteOutcome::inserted(Some(id)))
            .collect::<Vec<_>>()
    );

    // Identities continue from the table's current maximum.
    let more = storage
        .write("articles", vec![row(9, "ivan", "red")], WriteOptions::insert())
        .await
        .unwrap();
    assert_eq!(more, vec![WriteOutcome::inserted(Some(6))]);
}

#[tokio::test]
async fn test_duplicate_key_within_batch_updates() {
    let mut storage = identity_storage();
    storage.create("articles", &articles_schema()).await.unwrap();

    let outcomes = storage
        .write(
            "articles",
            vec![row(1, "alice", "red"), row(1, "alice", "blue")],
            WriteOptions::upsert(["person_id", "name"]),
        )
        .await
        .unwrap();
    assert_eq!(
        outcomes,
        vec![WriteOutcome::inserted(Some(1)), WriteOutcome::updated(Some(1))]
    );
}

#[tokio::test]
async fn test_null_key_matches_null() {
    let mut storage = Storage::new(MemoryStore::new(), StorageConfig::default());
    storage.create("articles", &articles_schema()).await.unwrap();
    let keys = WriteOptions::upsert(["person_id", "name"]);

    let rows = || vec![RawRow::Positional(vec![json!(1), json!(null), json!("red")])];
    storage.write("articles", rows(), keys.clone()).await.unwrap();
    let again = storage.write("articles", rows(), keys).await.unwrap();
    assert_eq!(again, vec![WriteOutcome::updated(None)]);
}

#[tokio::test]
async fn test_cast_failure_rolls_back() {
    let mut storage = identity_storage();
    storage.create("articles", &articles_schema()).await.unwrap();
    storage
        .write("articles", original_rows(), WriteOptions::insert())
        .await
        .unwrap();

    let mut batch = second_batch();
    batch.insert(3, row(8, "heidi", "red"));
    batch.insert(
        4,
        RawRow::Positional(vec![json!("not a number"), json!("x"), json!("y")]),
    );

    for options in [WriteOptions::insert(), WriteOptions::upsert(["person_id", "name"])] {
        let err = storage
            .write("articles", batch.clone(), options)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Cast(ref e) if e.field == "person_id"));
        assert_eq!(storage.read("articles").await.unwrap().len(), 5);
        assert!(!storage.store().in_transaction());
    }

    let rows = storage.read("articles").await.unwrap();
    assert!(rows.contains(&vec![
        Value::Integer(3),
        Value::String("carol".into()),
        Value::String("blue".into()),
    ]));
}

#[tokio::test]
async fn test_invalid_update_keys() {
    let mut storage = Storage::new(MemoryStore::new(), StorageConfig::default());
    storage.create("articles", &articles_schema()).await.unwrap();

    let err = storage
        .write("articles", original_rows(), WriteOptions::upsert(["missing"]))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StorageError::InvalidKey { ref table, ref field } if table == "articles" && field == "missing"
    ));

    let err = storage
        .write(
            "articles",
            original_rows(),
            WriteOptions::upsert(Vec::<String>::new()),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::InvalidKey { .. }));
}

#[tokio::test]
async fn test_prefix_and_filter() {
    let mut store = MemoryStore::new();
    {
        let mut unprefixed = Storage::new(store, StorageConfig::default());
        for name in ["test_keep", "test_skip", "other"] {
            unprefixed.create(name, &articles_schema()).await.unwrap();
        }
        store = unprefixed.into_inner();
    }

    let mut prefixed = Storage::new(store, StorageConfig::new().with_prefix("test_"));
    assert_eq!(prefixed.tables().await.unwrap(), vec!["keep", "skip"]);

    let store = prefixed.into_inner();
    let mut filtered = Storage::new(
        store,
        StorageConfig::new()
            .with_prefix("test_")
            .with_table_filter(|name| !name.ends_with("skip")),
    );
    assert_eq!(filtered.tables().await.unwrap(), vec!["keep"]);
    assert!(!filtered.exists("skip").await.unwrap());
    assert!(matches!(
        filtered.describe("skip").await.unwrap_err(),
        StorageError::NotFound(_)
    ));
}

#[tokio::test]
async fn test_create_with_force_and_indexes() {
    let mut storage = Storage::new(MemoryStore::new(), StorageConfig::new().with_prefix("t_"));
    storage.create("articles", &articles_schema()).await.unwrap();
    storage
        .write("articles", original_rows(), WriteOptions::insert())
        .await
        .unwrap();

    let options = CreateOptions {
        force: true,
        indexes: vec![vec!["name".to_string()], vec!["person_id".to_string(), "color".to_string()]],
    };
    storage
        .create_with("articles", &articles_schema(), &options)
        .await
        .unwrap();

    assert!(storage.read("articles").await.unwrap().is_empty());
    assert_eq!(
        storage.store().index_names(None, "t_articles"),
        vec!["t_articles_1_idx", "t_articles_2_idx"]
    );

    let bad_index = CreateOptions {
        force: true,
        indexes: vec![vec!["nope".to_string()]],
    };
    assert!(matches!(
        storage
            .create_with("articles", &articles_schema(), &bad_index)
            .await
            .unwrap_err(),
        StorageError::Schema(_)
    ));
}

#[tokio::test]
async fn test_create_many_and_delete_all() {
    let mut storage = Storage::new(MemoryStore::new(), StorageConfig::default());
    let schema = articles_schema();
    storage
        .create_many(&[("a", &schema), ("b", &schema)])
        .await
        .unwrap();
    assert_eq!(storage.tables().await.unwrap(), vec!["a", "b"]);

    storage.delete_all().await.unwrap();
    assert!(storage.tables().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_identity_column_collision() {
    let mut storage = identity_storage();
    let schema = SchemaDescriptor::new(vec![FieldDescriptor::new("__id", LogicalType::Integer)]);
    assert!(matches!(
        storage.create("t", &schema).await.unwrap_err(),
        StorageError::Schema(_)
    ));
}

#[tokio::test]
async fn test_lazy_writer() {
    let mut storage = identity_storage();
    storage.create("articles", &articles_schema()).await.unwrap();

    {
        let mut writer = storage
            .writer(
                "articles",
                original_rows(),
                WriteOptions::upsert(["person_id", "name"]),
            )
            .await
            .unwrap();
        let first = writer.next().await.unwrap().unwrap();
        assert_eq!(first, WriteOutcome::inserted(Some(1)));
        let second = writer.next().await.unwrap().unwrap();
        assert_eq!(second, WriteOutcome::inserted(Some(2)));
        // Dropped with three rows unconsumed.
    }

    assert_eq!(storage.read("articles").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_keyed_rows_and_temporal_values() {
    let mut storage = Storage::new(MemoryStore::new(), StorageConfig::default());
    let schema = SchemaDescriptor::new(vec![
        FieldDescriptor::new("day", LogicalType::Date),
        FieldDescriptor::new("rating", LogicalType::Number),
        FieldDescriptor::new("meta", LogicalType::Object),
    ]);
    storage.create("events", &schema).await.unwrap();

    let raw: RawRow = serde_json::from_value(json!({
        "rating": "4.5",
        "day": "2024-03-01",
        "meta": "{\"source\": \"csv\"}"
    }))
    .unwrap();
    storage
        .write("events", vec![raw], WriteOptions::insert())
        .await
        .unwrap();

    let rows = storage.read("events").await.unwrap();
    assert_eq!(
        rows,
        vec![vec![
            Value::Date(chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()),
            Value::Number(4.5),
            Value::Json(json!({"source": "csv"})),
        ]]
    );
}

#[tokio::test]
async fn test_identity_overflow_is_an_error() {
    let mut store = MemoryStore::new();
    let columns = vec![
        NativeColumn::new("__id", NativeType::BigInt, false),
        NativeColumn::new("name", NativeType::Text, true),
    ];
    let layout = TableLayout {
        columns: columns.clone(),
        ..Default::default()
    };
    store.create_table(None, "counters", &layout).await.unwrap();
    store
        .insert(
            None,
            "counters",
            &columns,
            vec![vec![Value::Integer(i64::MAX), Value::String("last".into())]],
        )
        .await
        .unwrap();

    let mut storage = Storage::new(store, StorageConfig::new().with_identity_column("__id"));
    let rows = vec![RawRow::Positional(vec![json!("next")])];
    for options in [WriteOptions::insert(), WriteOptions::upsert(["name"])] {
        let err = storage
            .write("counters", rows.clone(), options)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::IdentityOverflow { ref table } if table == "counters"));
    }
    assert_eq!(storage.store().row_count(None, "counters"), Some(1));
}

/// Budget lines whose `parent` references another line of the same table.
fn spending_schema() -> SchemaDescriptor {
    SchemaDescriptor::new(vec![
        FieldDescriptor::required("id", LogicalType::String),
        FieldDescriptor::new("parent", LogicalType::String),
        FieldDescriptor::new("amount", LogicalType::Number),
    ])
    .with_primary_key(PrimaryKey::Single("id".to_string()))
    .with_foreign_key(ForeignKey::to_self("parent", "id"))
}

fn spending(id: &str, parent: &str, amount: f64) -> RawRow {
    RawRow::Positional(vec![json!(id), json!(parent), json!(amount)])
}

#[tokio::test]
async fn test_self_referencing_foreign_key() {
    let mut storage = Storage::new(MemoryStore::new(), StorageConfig::new().with_prefix("app_"));
    storage.create("spending", &spending_schema()).await.unwrap();
    assert_eq!(storage.describe("spending").await.unwrap(), spending_schema());

    storage
        .write(
            "spending",
            vec![spending("A3001", "A3001", 10.0), spending("A5032", "A3001", 20.0)],
            WriteOptions::insert(),
        )
        .await
        .unwrap();

    let err = storage
        .write(
            "spending",
            vec![spending("A6000", "A3001", 5.0), spending("A7000", "B1", 5.0)],
            WriteOptions::insert(),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StorageError::Store(StoreError::Memory(MemoryStoreError::ForeignKeyViolation { .. }))
    ));
    assert_eq!(storage.read("spending").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_bucket_foreign_key_and_delete_order() {
    let mut storage = Storage::new(MemoryStore::new(), StorageConfig::new().with_prefix("app_"));
    let authors = SchemaDescriptor::new(vec![
        FieldDescriptor::required("id", LogicalType::Integer),
        FieldDescriptor::new("name", LogicalType::String),
    ])
    .with_primary_key(PrimaryKey::Single("id".to_string()));
    let books = SchemaDescriptor::new(vec![
        FieldDescriptor::new("title", LogicalType::String),
        FieldDescriptor::new("author", LogicalType::Integer),
    ])
    .with_foreign_key(ForeignKey::to_bucket("author", "authors", "id"));

    // The referenced table must exist first.
    assert!(storage.create("books", &books).await.is_err());
    storage
        .create_many(&[("authors", &authors), ("books", &books)])
        .await
        .unwrap();

    let foreign_keys = storage
        .store()
        .reflect_foreign_keys(None, "app_books")
        .await
        .unwrap();
    assert_eq!(foreign_keys[0].referenced_table, "app_authors");
    assert_eq!(storage.describe("books").await.unwrap(), books);

    storage
        .write(
            "authors",
            vec![RawRow::Positional(vec![json!(1), json!("ursula")])],
            WriteOptions::insert(),
        )
        .await
        .unwrap();
    storage
        .write(
            "books",
            vec![RawRow::Positional(vec![json!("earthsea"), json!(1)])],
            WriteOptions::insert(),
        )
        .await
        .unwrap();
    assert!(storage
        .write(
            "books",
            vec![RawRow::Positional(vec![json!("unknown"), json!(2)])],
            WriteOptions::insert(),
        )
        .await
        .is_err());

    // "authors" sorts first but is referenced by "books".
    assert!(storage.delete("authors").await.is_err());
    storage.delete_all().await.unwrap();
    assert!(storage.tables().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unsupported_foreign_key_resource() {
    let mut storage = Storage::new(MemoryStore::new(), StorageConfig::default());
    let schema: SchemaDescriptor = serde_json::from_value(json!({
        "fields": [{"name": "id", "type": "integer"}],
        "foreignKeys": [{"fields": "id", "reference": {"resource": "http://example.com/other", "fields": "id"}}]
    }))
    .unwrap();

    let err = storage.create("linked", &schema).await.unwrap_err();
    assert!(matches!(
        err,
        StorageError::Schema(SchemaError::UnsupportedReference(_))
    ));
    assert!(!storage.exists("linked").await.unwrap());
}
