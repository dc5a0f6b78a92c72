//! End-to-end tests of the five RPC handlers over the in-memory backends.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use prost::Message;
use tokio::sync::mpsc;
use tonic::Request;

use saltfish_core::ids::id_to_str;
use saltfish_kv::MemoryKvStore;
use saltfish_metadata::{MemoryMetadataStore, MetadataStore};
use saltfish_proto::saltfish::dataset_store_server::DatasetStore;
use saltfish_proto::saltfish::{
    create_dataset_response, delete_dataset_response, feature, generate_id_response,
    get_datasets_response, put_records_response, CreateDatasetRequest, DeleteDatasetRequest,
    Dataset, Feature, GenerateIdRequest, GetDatasetsRequest, PutRecordsRequest, Record,
    RequestType, Schema, TaggedRecord,
};
use saltfish_server::{
    DatasetStoreService, Listener, ListenerBus, Publication, ServiceConfig, SummarizerListener,
};
use saltfish_summarizer::{RecordSummarizer, SummarizerMap, SUMMARIZERS_BUCKET};

const USER_ID: i64 = 42;

struct Harness {
    service: DatasetStoreService,
    metadata: Arc<MemoryMetadataStore>,
    kv: Arc<MemoryKvStore>,
}

fn harness_with_bus(bus: ListenerBus) -> Harness {
    let metadata = Arc::new(MemoryMetadataStore::new());
    metadata.add_user(USER_ID, "marvin", "marvin@example.com");
    let kv = Arc::new(MemoryKvStore::new());
    let service = DatasetStoreService::new(
        metadata.clone(),
        kv.clone(),
        Arc::new(bus),
        ServiceConfig::default(),
    );
    Harness {
        service,
        metadata,
        kv,
    }
}

fn harness() -> Harness {
    harness_with_bus(ListenerBus::new())
}

fn schema(features: &[(&str, feature::Type)]) -> Schema {
    Schema {
        features: features
            .iter()
            .map(|(name, kind)| Feature {
                name: name.to_string(),
                feature_type: *kind as i32,
            })
            .collect(),
    }
}

fn iris_schema() -> Schema {
    schema(&[
        ("sepal_len", feature::Type::Numerical),
        ("species", feature::Type::Categorical),
    ])
}

fn dataset(name: &str, schema: Schema) -> Dataset {
    Dataset {
        id: Vec::new(),
        user_id: USER_ID,
        schema: Some(schema),
        name: name.to_string(),
        private: false,
        frozen: false,
    }
}

fn tagged(numerical: f64, categorical: &str) -> TaggedRecord {
    TaggedRecord {
        record_id: Vec::new(),
        record: Some(Record {
            numericals: vec![numerical],
            categoricals: vec![categorical.to_string()],
            texts: Vec::new(),
        }),
        source: String::new(),
    }
}

async fn create(
    harness: &Harness,
    dataset: Dataset,
) -> saltfish_proto::saltfish::CreateDatasetResponse {
    harness
        .service
        .create_dataset(Request::new(CreateDatasetRequest {
            dataset: Some(dataset),
        }))
        .await
        .unwrap()
        .into_inner()
}

async fn put_records(
    harness: &Harness,
    dataset_id: Vec<u8>,
    records: Vec<TaggedRecord>,
) -> saltfish_proto::saltfish::PutRecordsResponse {
    harness
        .service
        .put_records(Request::new(PutRecordsRequest {
            dataset_id,
            records,
            source: String::new(),
        }))
        .await
        .unwrap()
        .into_inner()
}

async fn delete(
    harness: &Harness,
    dataset_id: Vec<u8>,
) -> saltfish_proto::saltfish::DeleteDatasetResponse {
    harness
        .service
        .delete_dataset(Request::new(DeleteDatasetRequest { dataset_id }))
        .await
        .unwrap()
        .into_inner()
}

struct Recorder {
    tx: mpsc::UnboundedSender<Publication>,
}

#[async_trait]
impl Listener for Recorder {
    async fn handle(&mut self, publication: Publication) {
        let _ = self.tx.send(publication);
    }
}

fn recorder() -> (Recorder, mpsc::UnboundedReceiver<Publication>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Recorder { tx }, rx)
}

// ---------------------------------------------------------------------------
// CreateDataset / GetDatasets / DeleteDataset
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_list_delete_happy_path() {
    use get_datasets_response::Status as GetStatus;
    let harness = harness();

    let resp = create(&harness, dataset("iris", iris_schema())).await;
    assert_eq!(resp.status, create_dataset_response::Status::Ok as i32);
    assert_eq!(resp.dataset_id.len(), 24);
    let dataset_id = resp.dataset_id;

    let listed = harness
        .service
        .get_datasets(Request::new(GetDatasetsRequest {
            dataset_id: None,
            user_id: Some(USER_ID),
            username: None,
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(listed.status, GetStatus::Ok as i32);
    assert_eq!(listed.datasets.len(), 1);
    let detail = &listed.datasets[0];
    assert_eq!(detail.dataset.as_ref().unwrap().name, "iris");
    assert_eq!(detail.dataset.as_ref().unwrap().id, dataset_id);
    assert_eq!(detail.username, "marvin");

    let first = delete(&harness, dataset_id.clone()).await;
    assert_eq!(first.status, delete_dataset_response::Status::Ok as i32);
    assert!(first.updated);

    let second = delete(&harness, dataset_id).await;
    assert_eq!(second.status, delete_dataset_response::Status::Ok as i32);
    assert!(!second.updated);
}

#[tokio::test]
async fn create_writes_schema_snapshot() {
    let harness = harness();
    let resp = create(&harness, dataset("iris", iris_schema())).await;
    assert_eq!(resp.status, create_dataset_response::Status::Ok as i32);

    let snapshot = harness
        .kv
        .object_at("schemas", &resp.dataset_id)
        .expect("schema snapshot must exist");
    assert_eq!(snapshot.value.as_ref(), iris_schema().encode_to_vec());
}

#[tokio::test]
async fn duplicate_feature_name_rejected() {
    let harness = harness();
    let resp = create(
        &harness,
        dataset(
            "bad",
            schema(&[
                ("x", feature::Type::Numerical),
                ("x", feature::Type::Numerical),
            ]),
        ),
    )
    .await;
    assert_eq!(
        resp.status,
        create_dataset_response::Status::DuplicateFeatureName as i32
    );
    assert_eq!(harness.metadata.dataset_count(), 0);
}

#[tokio::test]
async fn invalid_feature_type_rejected() {
    let harness = harness();
    let resp = create(
        &harness,
        dataset("bad", schema(&[("x", feature::Type::Invalid)])),
    )
    .await;
    assert_eq!(
        resp.status,
        create_dataset_response::Status::InvalidFeatureType as i32
    );
}

#[tokio::test]
async fn malformed_dataset_id_rejected() {
    let harness = harness();
    let mut bad = dataset("iris", iris_schema());
    bad.id = vec![0u8; 7];
    let resp = create(&harness, bad).await;
    assert_eq!(
        resp.status,
        create_dataset_response::Status::InvalidDatasetId as i32
    );
}

#[tokio::test]
async fn idempotent_create_with_client_supplied_id() {
    let harness = harness();
    let mut supplied = dataset("iris", iris_schema());
    supplied.id = vec![0u8; 24];

    let first = create(&harness, supplied.clone()).await;
    assert_eq!(first.status, create_dataset_response::Status::Ok as i32);
    assert_eq!(first.dataset_id, vec![0u8; 24]);
    assert_eq!(id_to_str(&first.dataset_id), "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA");

    let second = create(&harness, supplied).await;
    assert_eq!(second.status, create_dataset_response::Status::Ok as i32);
    assert_eq!(second.dataset_id, vec![0u8; 24]);

    assert_eq!(harness.metadata.dataset_count(), 1);
}

#[tokio::test]
async fn same_id_different_schema_conflicts() {
    let harness = harness();
    let mut first = dataset("iris", iris_schema());
    first.id = vec![1u8; 24];
    assert_eq!(
        create(&harness, first).await.status,
        create_dataset_response::Status::Ok as i32
    );

    let mut second = dataset("iris2", schema(&[("v", feature::Type::Numerical)]));
    second.id = vec![1u8; 24];
    let resp = create(&harness, second).await;
    assert_eq!(
        resp.status,
        create_dataset_response::Status::DatasetIdAlreadyExists as i32
    );
    assert_eq!(harness.metadata.dataset_count(), 1);
}

#[tokio::test]
async fn unknown_user_and_duplicate_name() {
    let harness = harness();
    let mut foreign = dataset("iris", iris_schema());
    foreign.user_id = 404;
    assert_eq!(
        create(&harness, foreign).await.status,
        create_dataset_response::Status::InvalidUserId as i32
    );

    assert_eq!(
        create(&harness, dataset("iris", iris_schema())).await.status,
        create_dataset_response::Status::Ok as i32
    );
    let resp = create(&harness, dataset("iris", iris_schema())).await;
    assert_eq!(
        resp.status,
        create_dataset_response::Status::DuplicateDatasetName as i32
    );
}

#[tokio::test]
async fn metadata_outage_maps_to_network_error() {
    let harness = harness();
    harness.metadata.fail_operations(true);
    let resp = create(&harness, dataset("iris", iris_schema())).await;
    assert_eq!(
        resp.status,
        create_dataset_response::Status::NetworkError as i32
    );
}

#[tokio::test]
async fn snapshot_store_outage_maps_to_network_error() {
    let harness = harness();
    harness.kv.fail_stores(true);
    let resp = create(&harness, dataset("iris", iris_schema())).await;
    assert_eq!(
        resp.status,
        create_dataset_response::Status::NetworkError as i32
    );
    // The metadata row is stranded until a client retry repairs it.
    assert_eq!(harness.metadata.dataset_count(), 1);

    harness.kv.fail_stores(false);
    let retry = create(&harness, {
        let mut d = dataset("iris", iris_schema());
        d.id = harness
            .metadata
            .get_datasets_by_user(USER_ID)
            .await
            .unwrap()[0]
            .id
            .clone();
        d
    })
    .await;
    assert_eq!(retry.status, create_dataset_response::Status::Ok as i32);
    assert!(harness.kv.object_at("schemas", &retry.dataset_id).is_some());
}

#[tokio::test]
async fn delete_rejects_malformed_id() {
    let harness = harness();
    let resp = delete(&harness, vec![1, 2, 3]).await;
    assert_eq!(
        resp.status,
        delete_dataset_response::Status::InvalidDatasetId as i32
    );
}

// ---------------------------------------------------------------------------
// GenerateId
// ---------------------------------------------------------------------------

#[tokio::test]
async fn generate_id_boundaries() {
    use generate_id_response::Status as GenStatus;
    let harness = harness();
    let max = ServiceConfig::default().max_generate_id_count;

    let resp = harness
        .service
        .generate_id(Request::new(GenerateIdRequest { count: max - 1 }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(resp.status, GenStatus::Ok as i32);
    assert_eq!(resp.ids.len(), (max - 1) as usize);
    assert!(resp.ids.iter().all(|id| id.len() == 24));
    let distinct: HashSet<_> = resp.ids.iter().collect();
    assert_eq!(distinct.len(), resp.ids.len());

    let resp = harness
        .service
        .generate_id(Request::new(GenerateIdRequest { count: max }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(resp.status, GenStatus::CountTooLarge as i32);
    assert!(resp.msg.contains(&max.to_string()));
}

// ---------------------------------------------------------------------------
// GetDatasets selectors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn get_datasets_requires_exactly_one_selector() {
    use get_datasets_response::Status as GetStatus;
    let harness = harness();

    let none = harness
        .service
        .get_datasets(Request::new(GetDatasetsRequest {
            dataset_id: None,
            user_id: None,
            username: None,
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(none.status, GetStatus::InvalidRequest as i32);

    let both = harness
        .service
        .get_datasets(Request::new(GetDatasetsRequest {
            dataset_id: Some(vec![0u8; 24]),
            user_id: Some(USER_ID),
            username: None,
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(both.status, GetStatus::InvalidRequest as i32);
}

#[tokio::test]
async fn get_datasets_by_each_selector() {
    use get_datasets_response::Status as GetStatus;
    let harness = harness();
    let created = create(&harness, dataset("iris", iris_schema())).await;

    let by_id = harness
        .service
        .get_datasets(Request::new(GetDatasetsRequest {
            dataset_id: Some(created.dataset_id.clone()),
            user_id: None,
            username: None,
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(by_id.status, GetStatus::Ok as i32);
    assert_eq!(by_id.datasets.len(), 1);
    // The stored schema round-trips through the listing.
    assert_eq!(
        by_id.datasets[0].dataset.as_ref().unwrap().schema,
        Some(iris_schema())
    );

    let unknown = harness
        .service
        .get_datasets(Request::new(GetDatasetsRequest {
            dataset_id: Some(vec![9u8; 24]),
            user_id: None,
            username: None,
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(unknown.status, GetStatus::InvalidDatasetId as i32);

    let by_username = harness
        .service
        .get_datasets(Request::new(GetDatasetsRequest {
            dataset_id: None,
            user_id: None,
            username: Some("marvin".to_string()),
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(by_username.status, GetStatus::Ok as i32);
    assert_eq!(by_username.datasets.len(), 1);

    let nobody = harness
        .service
        .get_datasets(Request::new(GetDatasetsRequest {
            dataset_id: None,
            user_id: None,
            username: Some("nobody".to_string()),
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(nobody.status, GetStatus::InvalidUsername as i32);
}

// ---------------------------------------------------------------------------
// PutRecords
// ---------------------------------------------------------------------------

#[tokio::test]
async fn put_records_fan_out() {
    use put_records_response::Status as PutStatus;
    let harness = harness();
    let created = create(
        &harness,
        dataset(
            "d",
            schema(&[
                ("a", feature::Type::Numerical),
                ("b", feature::Type::Categorical),
            ]),
        ),
    )
    .await;
    let dataset_id = created.dataset_id;

    let resp = put_records(
        &harness,
        dataset_id.clone(),
        vec![tagged(1.0, "x"), tagged(f64::NAN, ""), tagged(2.5, "y")],
    )
    .await;
    assert_eq!(resp.status, PutStatus::Ok as i32);
    assert_eq!(resp.record_ids.len(), 3);
    assert!(resp.record_ids.iter().all(|id| id.len() == 8));
    let distinct: HashSet<_> = resp.record_ids.iter().collect();
    assert_eq!(distinct.len(), 3);

    let bucket = format!("records/{}", id_to_str(&dataset_id));
    assert_eq!(harness.kv.key_count(&bucket), 3);
    for record_id in &resp.record_ids {
        let object = harness.kv.object_at(&bucket, record_id).unwrap();
        for index in ["timestamp_int", "sequence_int", "randomindex_int"] {
            let value = object
                .index(index)
                .unwrap_or_else(|| panic!("missing index {index}"));
            value.parse::<i64>().unwrap();
        }
        // The stored value decodes back into a record of the right shape.
        let record = Record::decode(object.value.as_ref()).unwrap();
        assert_eq!(record.numericals.len(), 1);
        assert_eq!(record.categoricals.len(), 1);
    }
}

#[tokio::test]
async fn put_records_attaches_source_tag() {
    use put_records_response::Status as PutStatus;
    let harness = harness();
    let created = create(
        &harness,
        dataset("d", schema(&[("a", feature::Type::Numerical)])),
    )
    .await;

    let mut record = TaggedRecord {
        record_id: Vec::new(),
        record: Some(Record {
            numericals: vec![1.0],
            categoricals: Vec::new(),
            texts: Vec::new(),
        }),
        source: String::new(),
    };
    record.source = "sensor-7".to_string();

    let resp = harness
        .service
        .put_records(Request::new(PutRecordsRequest {
            dataset_id: created.dataset_id.clone(),
            records: vec![record],
            source: "batch-import".to_string(),
        }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(resp.status, PutStatus::Ok as i32);

    let bucket = format!("records/{}", id_to_str(&created.dataset_id));
    let object = harness.kv.object_at(&bucket, &resp.record_ids[0]).unwrap();
    // The per-record tag wins over the batch-level one.
    assert_eq!(object.index("source_bin"), Some("sensor-7"));
}

#[tokio::test]
async fn put_records_rejects_bad_requests() {
    use put_records_response::Status as PutStatus;
    let harness = harness();

    let wrong_width = put_records(&harness, vec![1, 2, 3], vec![tagged(1.0, "x")]).await;
    assert_eq!(wrong_width.status, PutStatus::InvalidDatasetId as i32);

    let created = create(
        &harness,
        dataset(
            "d",
            schema(&[
                ("a", feature::Type::Numerical),
                ("b", feature::Type::Categorical),
            ]),
        ),
    )
    .await;

    let empty = put_records(&harness, created.dataset_id.clone(), Vec::new()).await;
    assert_eq!(empty.status, PutStatus::NoRecordsInRequest as i32);

    let unknown = put_records(&harness, vec![7u8; 24], vec![tagged(1.0, "x")]).await;
    assert_eq!(unknown.status, PutStatus::InvalidDatasetId as i32);
}

#[tokio::test]
async fn put_records_invalid_record_writes_nothing() {
    use put_records_response::Status as PutStatus;
    let harness = harness();
    let created = create(
        &harness,
        dataset(
            "d",
            schema(&[
                ("a", feature::Type::Numerical),
                ("b", feature::Type::Categorical),
            ]),
        ),
    )
    .await;

    // Second record is missing its categorical value.
    let bad = TaggedRecord {
        record_id: Vec::new(),
        record: Some(Record {
            numericals: vec![2.0],
            categoricals: Vec::new(),
            texts: Vec::new(),
        }),
        source: String::new(),
    };
    let resp = put_records(
        &harness,
        created.dataset_id.clone(),
        vec![tagged(1.0, "x"), bad],
    )
    .await;
    assert_eq!(resp.status, PutStatus::InvalidRecord as i32);
    assert!(resp.msg.contains("At position 1"), "msg was: {}", resp.msg);
    assert!(resp.record_ids.is_empty());

    let bucket = format!("records/{}", id_to_str(&created.dataset_id));
    assert_eq!(harness.kv.key_count(&bucket), 0);
}

#[tokio::test]
async fn put_records_respects_client_supplied_ids() {
    use put_records_response::Status as PutStatus;
    let harness = harness();
    let created = create(
        &harness,
        dataset("d", schema(&[("a", feature::Type::Numerical)])),
    )
    .await;

    let mut first = tagged(1.0, "");
    first.record = Some(Record {
        numericals: vec![1.0],
        categoricals: Vec::new(),
        texts: Vec::new(),
    });
    first.record_id = vec![8u8; 8];
    let mut second = first.clone();
    second.record_id = Vec::new();

    let resp = put_records(&harness, created.dataset_id.clone(), vec![first, second]).await;
    assert_eq!(resp.status, PutStatus::Ok as i32);
    assert_eq!(resp.record_ids[0], vec![8u8; 8]);
    assert_eq!(resp.record_ids[1].len(), 8);

    // A record id of the wrong width fails that entry.
    let mut bad = tagged(1.0, "");
    bad.record = Some(Record {
        numericals: vec![1.0],
        categoricals: Vec::new(),
        texts: Vec::new(),
    });
    bad.record_id = vec![1, 2, 3];
    let resp = put_records(&harness, created.dataset_id.clone(), vec![bad]).await;
    assert_eq!(resp.status, PutStatus::InvalidRecord as i32);
    assert!(resp.msg.contains("At position 0"));
}

#[tokio::test]
async fn put_records_storage_outage_is_a_single_network_error() {
    use put_records_response::Status as PutStatus;
    let harness = harness();
    let created = create(
        &harness,
        dataset("d", schema(&[("a", feature::Type::Numerical)])),
    )
    .await;
    harness.kv.fail_stores(true);

    let records = (0..4)
        .map(|i| {
            let mut t = tagged(i as f64, "");
            t.record = Some(Record {
                numericals: vec![i as f64],
                categoricals: Vec::new(),
                texts: Vec::new(),
            });
            t
        })
        .collect();
    let resp = put_records(&harness, created.dataset_id.clone(), records).await;
    assert_eq!(resp.status, PutStatus::NetworkError as i32);
    assert!(resp.record_ids.is_empty());
}

// ---------------------------------------------------------------------------
// Listener dispatch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn listener_dispatch_by_kind_and_order() {
    let mut bus = ListenerBus::new();
    let (put_listener, mut put_rx) = recorder();
    let (all_listener, mut all_rx) = recorder();
    bus.register(RequestType::PutRecords, put_listener);
    bus.register(RequestType::All, all_listener);
    let harness = harness_with_bus(bus);

    let created = create(
        &harness,
        dataset("d", schema(&[("a", feature::Type::Numerical)])),
    )
    .await;
    let mut record = tagged(1.0, "");
    record.record = Some(Record {
        numericals: vec![1.0],
        categoricals: Vec::new(),
        texts: Vec::new(),
    });
    let put_resp = put_records(&harness, created.dataset_id.clone(), vec![record]).await;
    assert_eq!(put_resp.status, put_records_response::Status::Ok as i32);
    let del_resp = delete(&harness, created.dataset_id.clone()).await;
    assert!(del_resp.updated);

    // The ALL listener sees every mutation in publish order.
    let kinds: Vec<RequestType> = [
        all_rx.recv().await.unwrap(),
        all_rx.recv().await.unwrap(),
        all_rx.recv().await.unwrap(),
    ]
    .iter()
    .map(|p| p.kind)
    .collect();
    assert_eq!(
        kinds,
        vec![
            RequestType::CreateDataset,
            RequestType::PutRecords,
            RequestType::DeleteDataset
        ]
    );

    // The PUT_RECORDS listener sees exactly the one put, with assigned ids.
    let publication = put_rx.recv().await.unwrap();
    assert_eq!(publication.kind, RequestType::PutRecords);
    let published = PutRecordsRequest::decode(publication.payload.as_ref()).unwrap();
    assert_eq!(published.records.len(), 1);
    assert_eq!(published.records[0].record_id, put_resp.record_ids[0]);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(put_rx.try_recv().is_err());
}

#[tokio::test]
async fn failed_put_records_is_not_published() {
    let mut bus = ListenerBus::new();
    let (put_listener, mut put_rx) = recorder();
    bus.register(RequestType::PutRecords, put_listener);
    let harness = harness_with_bus(bus);

    let created = create(
        &harness,
        dataset("d", schema(&[("a", feature::Type::Numerical)])),
    )
    .await;
    harness.kv.fail_stores(true);
    let mut record = tagged(1.0, "");
    record.record = Some(Record {
        numericals: vec![1.0],
        categoricals: Vec::new(),
        texts: Vec::new(),
    });
    let resp = put_records(&harness, created.dataset_id.clone(), vec![record]).await;
    assert_eq!(resp.status, put_records_response::Status::NetworkError as i32);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(put_rx.try_recv().is_err());
}

// ---------------------------------------------------------------------------
// Summarizer listener end to end
// ---------------------------------------------------------------------------

#[tokio::test]
async fn summarizer_consumes_put_records_and_persists_snapshots() {
    let metadata = Arc::new(MemoryMetadataStore::new());
    metadata.add_user(USER_ID, "marvin", "");
    let kv = Arc::new(MemoryKvStore::new());

    let mut bus = ListenerBus::new();
    bus.register(
        RequestType::PutRecords,
        SummarizerListener::new(SummarizerMap::new(kv.clone(), "schemas")),
    );
    let service = DatasetStoreService::new(
        metadata.clone(),
        kv.clone(),
        Arc::new(bus),
        ServiceConfig::default(),
    );
    let harness = Harness {
        service,
        metadata,
        kv,
    };

    let created = create(
        &harness,
        dataset(
            "d",
            schema(&[
                ("a", feature::Type::Numerical),
                ("b", feature::Type::Categorical),
            ]),
        ),
    )
    .await;
    let resp = put_records(
        &harness,
        created.dataset_id.clone(),
        vec![tagged(1.0, "x"), tagged(3.0, "x"), tagged(f64::NAN, "y")],
    )
    .await;
    assert_eq!(resp.status, put_records_response::Status::Ok as i32);

    // Dispatch is asynchronous; wait for the snapshot to land.
    let mut snapshot = None;
    for _ in 0..100 {
        if let Some(object) = harness.kv.object_at(SUMMARIZERS_BUCKET, &created.dataset_id) {
            snapshot = Some(object);
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let snapshot = snapshot.expect("summarizer snapshot was never persisted");

    let restored = RecordSummarizer::decode(&snapshot.value).unwrap();
    assert_eq!(restored.numericals()[0].num_values(), 2);
    assert_eq!(restored.numericals()[0].num_missing(), 1);
    assert!((restored.numericals()[0].mean() - 2.0).abs() < 1e-12);
    assert_eq!(restored.categoricals()[0].value_count("x"), 2);
    assert_eq!(restored.categoricals()[0].value_count("y"), 1);
}
