//! The five RPC state machines.
//!
//! Handlers are request-scoped and stateless: they orchestrate the metadata
//! store, the KV object store and the listener bus, and map every lower
//! layer error onto exactly one response status. Domain failures always
//! travel in band; a handler never surfaces a transport error for them.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use prost::Message;
use tokio::sync::oneshot;
use tonic::{Request, Response, Status};

use saltfish_core::ids::{
    gen_dataset_id, gen_random_string, gen_random_u64, gen_record_id, id_to_str, monotonic_tick,
    DATASET_ID_WIDTH, RECORD_ID_WIDTH,
};
use saltfish_core::sync::ReplySync;
use saltfish_core::validate::{
    check_record, schema_has_duplicates, schema_has_invalid_features, schema_to_str,
};
use saltfish_kv::{KvObject, KvStore};
use saltfish_metadata::{DatasetConfig, MetadataError, MetadataStore};
use saltfish_proto::saltfish::dataset_store_server::DatasetStore;
use saltfish_proto::saltfish::{
    create_dataset_response, delete_dataset_response, generate_id_response, get_datasets_response,
    put_records_response, CreateDatasetRequest, CreateDatasetResponse, Dataset, DatasetDetail,
    DeleteDatasetRequest, DeleteDatasetResponse, GenerateIdRequest, GenerateIdResponse,
    GetDatasetsRequest, GetDatasetsResponse, PutRecordsRequest, PutRecordsResponse, Record,
    RequestType, Schema,
};

use crate::listeners::ListenerBus;

pub const UNKNOWN_ERROR_MESSAGE: &str =
    "Unknown error status: most likely using protobufs with mismatched versions.";
pub const NETWORK_ERROR_MESSAGE: &str =
    "Internal error: could not connect to the storage backend.";

// Secondary indexes stamped on every stored record.
const TIMESTAMP_INDEX: &str = "timestamp_int";
const SEQUENCE_INDEX: &str = "sequence_int";
const RANDOM_INDEX: &str = "randomindex_int";
const SOURCE_INDEX: &str = "source_bin";

/// Immutable limits and bucket names, resolved from the configuration at
/// startup.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub records_bucket_prefix: String,
    pub schemas_bucket: String,
    pub max_generate_id_count: u32,
    pub max_random_index: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            records_bucket_prefix: "records/".to_string(),
            schemas_bucket: "schemas".to_string(),
            max_generate_id_count: 1000,
            max_random_index: i64::MAX as u64,
        }
    }
}

pub struct DatasetStoreService {
    metadata: Arc<dyn MetadataStore>,
    kv: Arc<dyn KvStore>,
    bus: Arc<ListenerBus>,
    config: ServiceConfig,
}

impl DatasetStoreService {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        kv: Arc<dyn KvStore>,
        bus: Arc<ListenerBus>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            metadata,
            kv,
            bus,
            config,
        }
    }

    /// Bucket holding the records of one dataset.
    fn records_bucket(&self, dataset_id: &[u8]) -> String {
        format!(
            "{}{}",
            self.config.records_bucket_prefix,
            id_to_str(dataset_id)
        )
    }

    /// Writes the schema snapshot for `dataset_id`, preserving the causal
    /// context of any previous snapshot.
    async fn store_schema_snapshot(
        &self,
        dataset_id: &[u8],
        schema_bytes: &[u8],
    ) -> saltfish_kv::Result<()> {
        let fetched = self
            .kv
            .fetch(&self.config.schemas_bucket, dataset_id)
            .await?;
        let mut object = KvObject::new(
            self.config.schemas_bucket.clone(),
            dataset_id.to_vec(),
            schema_bytes.to_vec(),
        );
        object.context = Some(fetched.context);
        self.kv.store(object).await
    }
}

fn detail_to_proto(detail: saltfish_metadata::DatasetDetail) -> DatasetDetail {
    let schema = match Schema::decode(detail.schema.as_slice()) {
        Ok(schema) => Some(schema),
        Err(e) => {
            tracing::warn!(
                dataset_id = %id_to_str(&detail.id),
                error = %e,
                "stored schema blob is not decodable"
            );
            None
        }
    };
    DatasetDetail {
        dataset: Some(Dataset {
            id: detail.id,
            user_id: detail.user_id,
            schema,
            name: detail.name,
            private: detail.private,
            frozen: detail.frozen,
        }),
        username: detail.username,
        email: detail.email,
        created: detail.created.to_rfc3339(),
    }
}

/// One record's fetch-then-store against the KV store, stamping the three
/// mandatory secondary indexes plus the optional provenance tag.
async fn store_record(
    kv: Arc<dyn KvStore>,
    bucket: String,
    record_id: Bytes,
    value: Vec<u8>,
    source: String,
    max_random_index: u64,
) -> saltfish_kv::Result<()> {
    let fetched = kv.fetch(&bucket, &record_id).await?;

    let mut object = KvObject::new(bucket, record_id, value);
    object.add_index(
        TIMESTAMP_INDEX,
        chrono::Utc::now().timestamp_micros().to_string(),
    );
    object.add_index(SEQUENCE_INDEX, monotonic_tick().to_string());
    object.add_index(
        RANDOM_INDEX,
        (gen_random_u64() % max_random_index.max(1)).to_string(),
    );
    if !source.is_empty() {
        object.add_index(SOURCE_INDEX, source);
    }
    object.context = Some(fetched.context);

    kv.store(object).await
}

#[tonic::async_trait]
impl DatasetStore for DatasetStoreService {
    #[tracing::instrument(skip(self, request))]
    async fn create_dataset(
        &self,
        request: Request<CreateDatasetRequest>,
    ) -> Result<Response<CreateDatasetResponse>, Status> {
        use create_dataset_response::Status as RespStatus;

        let reply = |status: RespStatus, msg: &str| {
            Ok(Response::new(CreateDatasetResponse {
                status: status as i32,
                msg: msg.to_string(),
                ..Default::default()
            }))
        };

        let req = request.into_inner();
        let Some(dataset) = req.dataset else {
            return reply(RespStatus::UnknownError, UNKNOWN_ERROR_MESSAGE);
        };
        let schema = dataset.schema.unwrap_or_default();

        if schema_has_duplicates(&schema) {
            return reply(
                RespStatus::DuplicateFeatureName,
                "The provided schema contains duplicate feature names.",
            );
        }
        if schema_has_invalid_features(&schema) {
            return reply(
                RespStatus::InvalidFeatureType,
                "The provided schema contains a feature marked as invalid.",
            );
        }

        let (dataset_id, new_id) = if dataset.id.is_empty() {
            (gen_dataset_id(), true)
        } else if dataset.id.len() == DATASET_ID_WIDTH {
            (dataset.id.clone(), false)
        } else {
            return reply(
                RespStatus::InvalidDatasetId,
                "The dataset id provided is invalid.",
            );
        };
        let schema_bytes = schema.encode_to_vec();

        // A client-supplied id may be a retry of a create whose reply was
        // lost; an identical schema makes the call idempotent.
        let mut already_exists = false;
        if !new_id {
            match self.metadata.fetch_schema(&dataset_id).await {
                Ok(existing) if existing == schema_bytes => {
                    tracing::info!(
                        dataset_id = %id_to_str(&dataset_id),
                        "dataset already exists with an identical schema"
                    );
                    already_exists = true;
                }
                Ok(_) => {
                    tracing::info!(
                        dataset_id = %id_to_str(&dataset_id),
                        "dataset already exists with a different schema"
                    );
                    return reply(
                        RespStatus::DatasetIdAlreadyExists,
                        "A dataset with the same id but a different schema already exists.",
                    );
                }
                Err(MetadataError::InvalidDatasetId) => {}
                Err(e) => {
                    tracing::warn!(
                        dataset_id = %id_to_str(&dataset_id),
                        error = %e,
                        "create_dataset: idempotency check failed"
                    );
                    return reply(RespStatus::NetworkError, NETWORK_ERROR_MESSAGE);
                }
            }
        }

        if !already_exists {
            tracing::info!(
                dataset_id = %id_to_str(&dataset_id),
                user_id = dataset.user_id,
                name = %dataset.name,
                schema = %schema_to_str(&schema),
                "creating dataset"
            );
            let config = DatasetConfig {
                id: dataset_id.clone(),
                user_id: dataset.user_id,
                schema: schema_bytes.clone(),
                name: dataset.name.clone(),
                private: dataset.private,
                frozen: dataset.frozen,
            };
            match self.metadata.create_dataset(config).await {
                Ok(()) => {}
                Err(MetadataError::InvalidUserId) => {
                    return reply(RespStatus::InvalidUserId, "The user id does not exist.")
                }
                Err(MetadataError::DuplicateDatasetName) => {
                    return reply(
                        RespStatus::DuplicateDatasetName,
                        "A dataset with the same name already exists for this user.",
                    )
                }
                Err(e) => {
                    tracing::warn!(
                        dataset_id = %id_to_str(&dataset_id),
                        error = %e,
                        "create_dataset: metadata insert failed"
                    );
                    return reply(RespStatus::NetworkError, NETWORK_ERROR_MESSAGE);
                }
            }
        }

        // The metadata row is visible before the snapshot lands; a failure
        // here strands the row until a client retry repairs it.
        if let Err(e) = self
            .store_schema_snapshot(&dataset_id, &schema_bytes)
            .await
        {
            tracing::warn!(
                dataset_id = %id_to_str(&dataset_id),
                error = %e,
                "create_dataset: schema snapshot store failed"
            );
            return reply(RespStatus::NetworkError, NETWORK_ERROR_MESSAGE);
        }

        let published = CreateDatasetRequest {
            dataset: Some(Dataset {
                id: dataset_id.clone(),
                user_id: dataset.user_id,
                schema: Some(schema),
                name: dataset.name,
                private: dataset.private,
                frozen: dataset.frozen,
            }),
        };
        self.bus.publish(
            RequestType::CreateDataset,
            published.encode_to_vec().into(),
        );

        Ok(Response::new(CreateDatasetResponse {
            status: RespStatus::Ok as i32,
            dataset_id,
            msg: String::new(),
        }))
    }

    #[tracing::instrument(skip(self, request))]
    async fn delete_dataset(
        &self,
        request: Request<DeleteDatasetRequest>,
    ) -> Result<Response<DeleteDatasetResponse>, Status> {
        use delete_dataset_response::Status as RespStatus;

        let req = request.into_inner();
        if req.dataset_id.len() != DATASET_ID_WIDTH {
            return Ok(Response::new(DeleteDatasetResponse {
                status: RespStatus::InvalidDatasetId as i32,
                msg: "The dataset id provided is invalid.".to_string(),
                ..Default::default()
            }));
        }

        match self.metadata.delete_dataset(&req.dataset_id).await {
            Ok(0) => Ok(Response::new(DeleteDatasetResponse {
                status: RespStatus::Ok as i32,
                updated: false,
                msg: String::new(),
            })),
            Ok(_) => {
                tracing::info!(
                    dataset_id = %id_to_str(&req.dataset_id),
                    "dataset deleted; records await garbage collection"
                );
                self.bus
                    .publish(RequestType::DeleteDataset, req.encode_to_vec().into());
                Ok(Response::new(DeleteDatasetResponse {
                    status: RespStatus::Ok as i32,
                    updated: true,
                    msg: String::new(),
                }))
            }
            Err(e) => {
                tracing::warn!(
                    dataset_id = %id_to_str(&req.dataset_id),
                    error = %e,
                    "delete_dataset failed"
                );
                Ok(Response::new(DeleteDatasetResponse {
                    status: RespStatus::NetworkError as i32,
                    msg: NETWORK_ERROR_MESSAGE.to_string(),
                    ..Default::default()
                }))
            }
        }
    }

    async fn generate_id(
        &self,
        request: Request<GenerateIdRequest>,
    ) -> Result<Response<GenerateIdResponse>, Status> {
        use generate_id_response::Status as RespStatus;

        let req = request.into_inner();
        if req.count >= self.config.max_generate_id_count {
            return Ok(Response::new(GenerateIdResponse {
                status: RespStatus::CountTooLarge as i32,
                msg: format!(
                    "Cannot generate more than {} ids in one call ({} requested)",
                    self.config.max_generate_id_count, req.count
                ),
                ..Default::default()
            }));
        }

        let ids = (0..req.count)
            .map(|_| gen_random_string(DATASET_ID_WIDTH))
            .collect();
        Ok(Response::new(GenerateIdResponse {
            status: RespStatus::Ok as i32,
            ids,
            msg: String::new(),
        }))
    }

    #[tracing::instrument(skip(self, request))]
    async fn get_datasets(
        &self,
        request: Request<GetDatasetsRequest>,
    ) -> Result<Response<GetDatasetsResponse>, Status> {
        use get_datasets_response::Status as RespStatus;

        let reply_error = |status: RespStatus, msg: String| {
            Ok(Response::new(GetDatasetsResponse {
                status: status as i32,
                msg,
                ..Default::default()
            }))
        };

        let req = request.into_inner();
        let selectors = usize::from(req.dataset_id.is_some())
            + usize::from(req.user_id.is_some())
            + usize::from(req.username.is_some());
        if selectors != 1 {
            return reply_error(
                RespStatus::InvalidRequest,
                "Exactly one of dataset_id, user_id or username must be set.".to_string(),
            );
        }

        let result = if let Some(dataset_id) = &req.dataset_id {
            self.metadata
                .get_dataset_by_id(dataset_id)
                .await
                .map(|detail| vec![detail])
        } else if let Some(user_id) = req.user_id {
            self.metadata.get_datasets_by_user(user_id).await
        } else {
            // Presence checked above.
            let username = req.username.as_deref().unwrap_or_default();
            self.metadata.get_datasets_by_username(username).await
        };

        match result {
            Ok(details) => Ok(Response::new(GetDatasetsResponse {
                status: RespStatus::Ok as i32,
                datasets: details.into_iter().map(detail_to_proto).collect(),
                msg: String::new(),
            })),
            Err(MetadataError::InvalidDatasetId) => reply_error(
                RespStatus::InvalidDatasetId,
                "The dataset id provided is invalid.".to_string(),
            ),
            Err(MetadataError::InvalidUsername(username)) => reply_error(
                RespStatus::InvalidUsername,
                format!("No user exists with username {username}"),
            ),
            Err(e) => {
                tracing::warn!(error = %e, "get_datasets failed");
                reply_error(RespStatus::NetworkError, NETWORK_ERROR_MESSAGE.to_string())
            }
        }
    }

    #[tracing::instrument(skip(self, request), fields(records = request.get_ref().records.len()))]
    async fn put_records(
        &self,
        request: Request<PutRecordsRequest>,
    ) -> Result<Response<PutRecordsResponse>, Status> {
        use put_records_response::Status as RespStatus;

        let reply_error = |status: RespStatus, msg: String| {
            Ok(Response::new(PutRecordsResponse {
                status: status as i32,
                msg,
                ..Default::default()
            }))
        };

        let mut req = request.into_inner();
        if req.dataset_id.len() != DATASET_ID_WIDTH {
            return reply_error(
                RespStatus::InvalidDatasetId,
                "The dataset id is not set or malformed in the request.".to_string(),
            );
        }
        if req.records.is_empty() {
            return reply_error(
                RespStatus::NoRecordsInRequest,
                "No records in the request.".to_string(),
            );
        }

        let schema_bytes = match self.metadata.fetch_schema(&req.dataset_id).await {
            Ok(bytes) => bytes,
            Err(MetadataError::InvalidDatasetId) => {
                return reply_error(
                    RespStatus::InvalidDatasetId,
                    format!("Dataset does not exist (id={})", id_to_str(&req.dataset_id)),
                )
            }
            Err(e) => {
                tracing::warn!(
                    dataset_id = %id_to_str(&req.dataset_id),
                    error = %e,
                    "put_records: schema fetch failed"
                );
                return reply_error(RespStatus::NetworkError, NETWORK_ERROR_MESSAGE.to_string());
            }
        };
        let schema = match Schema::decode(schema_bytes.as_slice()) {
            Ok(schema) => schema,
            Err(e) => {
                tracing::error!(
                    dataset_id = %id_to_str(&req.dataset_id),
                    error = %e,
                    "put_records: stored schema blob failed to parse"
                );
                return reply_error(
                    RespStatus::InvalidSchema,
                    "The dataset does not have a valid schema.".to_string(),
                );
            }
        };

        // Validate everything up front; a single bad record fails the batch
        // before any write is issued.
        let empty_record = Record::default();
        for (index, tagged) in req.records.iter().enumerate() {
            let record = tagged.record.as_ref().unwrap_or(&empty_record);
            if let Err(e) = check_record(&schema, record) {
                return reply_error(
                    RespStatus::InvalidRecord,
                    format!("At position {index}: {e}"),
                );
            }
        }

        let mut record_ids: Vec<Vec<u8>> = Vec::with_capacity(req.records.len());
        for (index, tagged) in req.records.iter().enumerate() {
            if tagged.record_id.is_empty() {
                record_ids.push(gen_record_id());
            } else if tagged.record_id.len() == RECORD_ID_WIDTH {
                record_ids.push(tagged.record_id.clone());
            } else {
                return reply_error(
                    RespStatus::InvalidRecord,
                    format!(
                        "At position {index}: record id must be {RECORD_ID_WIDTH} bytes when set"
                    ),
                );
            }
        }

        // Scatter one task per record; the barrier folds their outcomes
        // into a single reply sent down the oneshot channel.
        let (reply_tx, reply_rx) = oneshot::channel::<PutRecordsResponse>();
        let reply_tx = Arc::new(Mutex::new(Some(reply_tx)));

        let success_tx = reply_tx.clone();
        let success_ids = record_ids.clone();
        let barrier = Arc::new(ReplySync::new(req.records.len() as u32, move || {
            if let Some(tx) = success_tx.lock().unwrap().take() {
                let _ = tx.send(PutRecordsResponse {
                    status: RespStatus::Ok as i32,
                    record_ids: success_ids,
                    msg: String::new(),
                });
            }
        }));

        let bucket = self.records_bucket(&req.dataset_id);
        for (tagged, record_id) in req.records.iter().zip(&record_ids) {
            let kv = self.kv.clone();
            let barrier = barrier.clone();
            let reply_tx = reply_tx.clone();
            let bucket = bucket.clone();
            let record_id = Bytes::from(record_id.clone());
            let value = tagged.record.clone().unwrap_or_default().encode_to_vec();
            let source = if tagged.source.is_empty() {
                req.source.clone()
            } else {
                tagged.source.clone()
            };
            let max_random_index = self.config.max_random_index;

            tokio::spawn(async move {
                match store_record(kv, bucket.clone(), record_id, value, source, max_random_index)
                    .await
                {
                    Ok(()) => barrier.ok(),
                    Err(e) => {
                        tracing::warn!(bucket = %bucket, error = %e, "record write failed");
                        barrier.error(move || {
                            if let Some(tx) = reply_tx.lock().unwrap().take() {
                                let _ = tx.send(PutRecordsResponse {
                                    status: RespStatus::NetworkError as i32,
                                    msg: "Could not connect to the storage backend.".to_string(),
                                    ..Default::default()
                                });
                            }
                        });
                    }
                }
            });
        }

        let response = reply_rx.await.unwrap_or_else(|_| PutRecordsResponse {
            status: RespStatus::UnknownError as i32,
            msg: UNKNOWN_ERROR_MESSAGE.to_string(),
            ..Default::default()
        });

        if response.status == RespStatus::Ok as i32 {
            // Publish the completed request, assigned ids included, so
            // downstream consumers see exactly what was written.
            for (tagged, record_id) in req.records.iter_mut().zip(&record_ids) {
                tagged.record_id = record_id.clone();
            }
            self.bus
                .publish(RequestType::PutRecords, req.encode_to_vec().into());
        }

        Ok(Response::new(response))
    }
}
