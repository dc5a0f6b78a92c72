//! The typed client.

use tonic::transport::Channel;

use saltfish_proto::saltfish::dataset_store_client::DatasetStoreClient;
use saltfish_proto::saltfish::{
    create_dataset_response, delete_dataset_response, generate_id_response, get_datasets_response,
    put_records_response, CreateDatasetRequest, Dataset, DatasetDetail, DeleteDatasetRequest,
    GenerateIdRequest, GetDatasetsRequest, PutRecordsRequest, Schema, TaggedRecord,
};

use crate::error::{ClientError, Result};

/// Parameters for a dataset registration. Leave `id` empty to let the
/// server assign one; supply it to make the call an idempotent retry.
#[derive(Debug, Clone, Default)]
pub struct NewDataset {
    pub id: Option<Vec<u8>>,
    pub user_id: i64,
    pub name: String,
    pub schema: Schema,
    pub private: bool,
    pub frozen: bool,
}

pub struct SaltfishClient {
    inner: DatasetStoreClient<Channel>,
}

impl SaltfishClient {
    /// Connects to a saltfish endpoint, e.g. `http://localhost:5555`.
    pub async fn connect(endpoint: impl Into<String>) -> Result<Self> {
        let inner = DatasetStoreClient::connect(endpoint.into()).await?;
        Ok(Self { inner })
    }

    pub fn from_channel(channel: Channel) -> Self {
        Self {
            inner: DatasetStoreClient::new(channel),
        }
    }

    /// Registers a dataset and returns its 24-byte id.
    pub async fn create_dataset(&mut self, dataset: NewDataset) -> Result<Vec<u8>> {
        use create_dataset_response::Status;

        let request = CreateDatasetRequest {
            dataset: Some(Dataset {
                id: dataset.id.unwrap_or_default(),
                user_id: dataset.user_id,
                schema: Some(dataset.schema),
                name: dataset.name,
                private: dataset.private,
                frozen: dataset.frozen,
            }),
        };
        let resp = self.inner.create_dataset(request).await?.into_inner();
        if resp.status == Status::Ok as i32 {
            Ok(resp.dataset_id)
        } else {
            Err(rejected(
                "create_dataset",
                Status::try_from(resp.status)
                    .map(|s| s.as_str_name())
                    .unwrap_or("UNKNOWN_ERROR"),
                resp.msg,
            ))
        }
    }

    /// Deletes a dataset; `true` when a row was removed, `false` when it
    /// was already gone.
    pub async fn delete_dataset(&mut self, dataset_id: Vec<u8>) -> Result<bool> {
        use delete_dataset_response::Status;

        let resp = self
            .inner
            .delete_dataset(DeleteDatasetRequest { dataset_id })
            .await?
            .into_inner();
        if resp.status == Status::Ok as i32 {
            Ok(resp.updated)
        } else {
            Err(rejected(
                "delete_dataset",
                Status::try_from(resp.status)
                    .map(|s| s.as_str_name())
                    .unwrap_or("UNKNOWN_ERROR"),
                resp.msg,
            ))
        }
    }

    /// Asks the server for `count` fresh dataset ids.
    pub async fn generate_ids(&mut self, count: u32) -> Result<Vec<Vec<u8>>> {
        use generate_id_response::Status;

        let resp = self
            .inner
            .generate_id(GenerateIdRequest { count })
            .await?
            .into_inner();
        if resp.status == Status::Ok as i32 {
            Ok(resp.ids)
        } else {
            Err(rejected(
                "generate_id",
                Status::try_from(resp.status)
                    .map(|s| s.as_str_name())
                    .unwrap_or("UNKNOWN_ERROR"),
                resp.msg,
            ))
        }
    }

    pub async fn get_dataset(&mut self, dataset_id: Vec<u8>) -> Result<DatasetDetail> {
        let mut details = self
            .get_datasets(GetDatasetsRequest {
                dataset_id: Some(dataset_id),
                user_id: None,
                username: None,
            })
            .await?;
        // By-id lookups return exactly one entry.
        details.pop().ok_or(ClientError::Rejected {
            operation: "get_datasets",
            status: "UNKNOWN_ERROR".to_string(),
            msg: "server returned no dataset for an OK by-id lookup".to_string(),
        })
    }

    pub async fn get_datasets_by_user(&mut self, user_id: i64) -> Result<Vec<DatasetDetail>> {
        self.get_datasets(GetDatasetsRequest {
            dataset_id: None,
            user_id: Some(user_id),
            username: None,
        })
        .await
    }

    pub async fn get_datasets_by_username(
        &mut self,
        username: impl Into<String>,
    ) -> Result<Vec<DatasetDetail>> {
        self.get_datasets(GetDatasetsRequest {
            dataset_id: None,
            user_id: None,
            username: Some(username.into()),
        })
        .await
    }

    async fn get_datasets(&mut self, request: GetDatasetsRequest) -> Result<Vec<DatasetDetail>> {
        use get_datasets_response::Status;

        let resp = self.inner.get_datasets(request).await?.into_inner();
        if resp.status == Status::Ok as i32 {
            Ok(resp.datasets)
        } else {
            Err(rejected(
                "get_datasets",
                Status::try_from(resp.status)
                    .map(|s| s.as_str_name())
                    .unwrap_or("UNKNOWN_ERROR"),
                resp.msg,
            ))
        }
    }

    /// Appends a batch of records, returning their 8-byte ids in request
    /// order.
    pub async fn put_records(
        &mut self,
        dataset_id: Vec<u8>,
        records: Vec<TaggedRecord>,
        source: impl Into<String>,
    ) -> Result<Vec<Vec<u8>>> {
        use put_records_response::Status;

        let resp = self
            .inner
            .put_records(PutRecordsRequest {
                dataset_id,
                records,
                source: source.into(),
            })
            .await?
            .into_inner();
        if resp.status == Status::Ok as i32 {
            Ok(resp.record_ids)
        } else {
            Err(rejected(
                "put_records",
                Status::try_from(resp.status)
                    .map(|s| s.as_str_name())
                    .unwrap_or("UNKNOWN_ERROR"),
                resp.msg,
            ))
        }
    }
}

fn rejected(operation: &'static str, status: &str, msg: String) -> ClientError {
    ClientError::Rejected {
        operation,
        status: status.to_string(),
        msg,
    }
}
