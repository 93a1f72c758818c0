use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    error::{EngineError, EngineResult},
    models::{ContractVersion, NewContractVersion, VERSION_STATUS_DRAFT},
    storage::{version_object_key, ObjectStorage, PDF_CONTENT_TYPE},
    store::{ContractStore, StoreError},
};

/// The row goes in before the blob; the unique version key settles concurrent uploads.
pub struct VersionManager {
    store: Arc<dyn ContractStore>,
    storage: Arc<dyn ObjectStorage>,
    max_attempts: u32,
}

impl VersionManager {
    pub fn new(
        store: Arc<dyn ContractStore>,
        storage: Arc<dyn ObjectStorage>,
        max_attempts: u32,
    ) -> Self {
        Self {
            store,
            storage,
            max_attempts: max_attempts.max(1),
        }
    }

    pub async fn create_next_version(
        &self,
        contract_id: Uuid,
        bytes: Vec<u8>,
    ) -> EngineResult<ContractVersion> {
        if bytes.is_empty() {
            return Err(EngineError::validation("uploaded file is empty"));
        }

        let checksum = hex::encode(Sha256::digest(&bytes));
        let size_bytes = bytes.len() as i64;
        let version = self
            .claim_next_number(contract_id, checksum, size_bytes)
            .await?;

        let key = version_object_key(contract_id, version.version_num);
        let disposition = format!("inline; filename=\"v{}.pdf\"", version.version_num);
        if let Err(err) = self
            .storage
            .put_object(
                &key,
                bytes,
                Some(PDF_CONTENT_TYPE.to_string()),
                Some(disposition),
            )
            .await
        {
            error!(%contract_id, version_id = %version.id, error = %err, "version upload failed; releasing version number");
            if let Err(cleanup) = self.store.delete_version(version.id).await {
                error!(version_id = %version.id, error = %cleanup, "failed to remove version row after upload failure");
            }
            return Err(EngineError::Storage(err));
        }

        info!(%contract_id, version_id = %version.id, version_num = version.version_num, "contract version created");
        Ok(version)
    }

    async fn claim_next_number(
        &self,
        contract_id: Uuid,
        checksum: String,
        size_bytes: i64,
    ) -> EngineResult<ContractVersion> {
        for attempt in 1..=self.max_attempts {
            let next = self.store.max_version_num(contract_id).await?.unwrap_or(0) + 1;
            let key = version_object_key(contract_id, next);

            let candidate = NewContractVersion {
                id: Uuid::new_v4(),
                contract_id,
                version_num: next,
                file_url: self.storage.object_url(&key),
                checksum: checksum.clone(),
                size_bytes,
                status: VERSION_STATUS_DRAFT.to_string(),
            };

            match self.store.insert_version(candidate).await {
                Ok(version) => return Ok(version),
                Err(StoreError::Conflict(detail)) => {
                    debug!(%contract_id, version_num = next, attempt, %detail, "version number taken; retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }

        warn!(%contract_id, attempts = self.max_attempts, "gave up allocating a version number");
        Err(EngineError::VersionConflict {
            attempts: self.max_attempts,
        })
    }
}
