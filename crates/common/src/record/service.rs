use bytes::Bytes;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::index::{IndexError, RecordIndex, RecordIndexEntry};
use crate::anchor::{AnchorError, AnchorRegistry};
use crate::content::{ContentError, ContentStore};
use crate::crypto::{decrypt_json, CipherBlob, CodecError, Secret};
use crate::linked_data::Cid;

/// Last stage a record write completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStage {
    /// Plaintext accepted, nothing done yet
    Pending,
    Encrypted,
    /// Ciphertext pinned, not yet anchored
    Uploaded,
    /// Live in the anchor registry, not yet in the record index
    Anchored,
    /// Anchored and indexed, the write succeeded
    Indexed,
}

impl std::fmt::Display for RecordStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stage = match self {
            RecordStage::Pending => "pending",
            RecordStage::Encrypted => "encrypted",
            RecordStage::Uploaded => "uploaded",
            RecordStage::Anchored => "anchored",
            RecordStage::Indexed => "indexed",
        };
        write!(f, "{}", stage)
    }
}

/// Error raised by one of the pipeline's components, passed through untouched
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error(transparent)]
    Anchor(#[from] AnchorError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error("record is not valid json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("anchor key must not be empty")]
    EmptyAnchorKey,
    /// A write failed part way. Stages before `stage` are not rolled back,
    ///  so an uploaded blob may remain pinned without an anchor.
    #[error("write of record {record_id} under {anchor_key:?} failed after stage {stage}: {source}")]
    Write {
        record_id: Uuid,
        anchor_key: String,
        stage: RecordStage,
        #[source]
        source: PipelineError,
    },
    #[error("record {record_id} not found: {reason}")]
    NotFound { record_id: Uuid, reason: String },
    #[error("read of record {record_id} under {anchor_key:?} failed: {source}")]
    Read {
        record_id: Uuid,
        anchor_key: String,
        #[source]
        source: PipelineError,
    },
}

impl RecordError {
    /// Whether the failure was the ciphertext not opening under the given key
    pub fn is_decryption(&self) -> bool {
        matches!(
            self,
            RecordError::Read {
                source: PipelineError::Codec(CodecError::Decryption(_)),
                ..
            }
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RecordError::NotFound { .. })
    }

    /// Last completed stage of a failed write
    pub fn stage(&self) -> Option<RecordStage> {
        match self {
            RecordError::Write { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

/// Identifiers of a successfully anchored record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenRecord {
    pub record_id: Uuid,
    pub cid: Cid,
}

/// Encrypts, pins and anchors JSON records, and reads them back by id
///
/// A record is reported as written only once it is anchored and indexed.
#[derive(Debug, Clone)]
pub struct RecordService<C, A, I> {
    content: C,
    anchors: A,
    index: I,
}

impl<C, A, I> RecordService<C, A, I>
where
    C: ContentStore,
    A: AnchorRegistry,
    I: RecordIndex,
{
    pub fn new(content: C, anchors: A, index: I) -> Self {
        Self {
            content,
            anchors,
            index,
        }
    }

    pub fn content(&self) -> &C {
        &self.content
    }

    pub fn anchors(&self) -> &A {
        &self.anchors
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    pub async fn write_record(
        &self,
        anchor_key: &str,
        document: &Value,
        secret: &Secret,
    ) -> Result<WrittenRecord, RecordError> {
        if anchor_key.trim().is_empty() {
            return Err(RecordError::EmptyAnchorKey);
        }

        let record_id = Uuid::new_v4();
        let mut stage = RecordStage::Pending;
        tracing::debug!(%record_id, anchor_key, "writing record");

        match self.run_write(record_id, anchor_key, document, secret, &mut stage).await {
            Ok(cid) => {
                tracing::info!(%record_id, anchor_key, %cid, "record anchored");
                Ok(WrittenRecord { record_id, cid })
            }
            Err(source) => {
                tracing::error!(
                    %record_id,
                    anchor_key,
                    %stage,
                    "record write failed: {}",
                    source
                );
                Err(RecordError::Write {
                    record_id,
                    anchor_key: anchor_key.to_string(),
                    stage,
                    source,
                })
            }
        }
    }

    async fn run_write(
        &self,
        record_id: Uuid,
        anchor_key: &str,
        document: &Value,
        secret: &Secret,
        stage: &mut RecordStage,
    ) -> Result<Cid, PipelineError> {
        let plaintext = serde_json::to_vec(document)?;
        let blob = secret.encrypt(&plaintext)?;
        advance(stage, RecordStage::Encrypted, record_id);

        let name = format!("{}.enc", record_id);
        let cid = self.content.put(Bytes::from(blob.to_bytes()), &name).await?;
        advance(stage, RecordStage::Uploaded, record_id);

        self.anchors.store(anchor_key, &cid).await?;
        advance(stage, RecordStage::Anchored, record_id);

        let entry = RecordIndexEntry {
            record_id,
            anchor_key: anchor_key.to_string(),
            cid,
            created_at: Utc::now(),
        };
        self.index.upsert(&entry).await?;
        advance(stage, RecordStage::Indexed, record_id);

        Ok(cid)
    }

    /// Resolve `record_id` to its anchor key, look up the key's current CID,
    ///  fetch the blob and decrypt it
    pub async fn read_record(&self, record_id: Uuid, secret: &Secret) -> Result<Value, RecordError> {
        let entry = self
            .index
            .get(record_id)
            .await
            .map_err(|e| RecordError::Read {
                record_id,
                anchor_key: String::new(),
                source: e.into(),
            })?
            .ok_or_else(|| RecordError::NotFound {
                record_id,
                reason: "not in the record index".to_string(),
            })?;
        let anchor_key = entry.anchor_key.as_str();
        let fail = |source: PipelineError| RecordError::Read {
            record_id,
            anchor_key: anchor_key.to_string(),
            source,
        };

        let cid = match self.anchors.lookup(anchor_key).await {
            Ok(cid) => cid,
            Err(AnchorError::NotFound(_)) => {
                return Err(RecordError::NotFound {
                    record_id,
                    reason: format!("nothing anchored under {:?}", anchor_key),
                })
            }
            Err(e) => return Err(fail(e.into())),
        };
        if cid != entry.cid {
            tracing::debug!(%record_id, anchor_key, "record superseded by {}", cid);
        }

        let data = match self.content.get(&cid).await {
            Ok(data) => data,
            Err(ContentError::NotFound(cid)) => {
                return Err(RecordError::NotFound {
                    record_id,
                    reason: format!("blob {} is not pinned", cid),
                })
            }
            Err(e) => return Err(fail(e.into())),
        };

        let blob = CipherBlob::from_bytes(&data).map_err(|e| fail(e.into()))?;
        decrypt_json(&blob, secret).map_err(|e| fail(e.into()))
    }
}

fn advance(stage: &mut RecordStage, next: RecordStage, record_id: Uuid) {
    tracing::debug!(%record_id, from = %stage, to = %next, "record stage");
    *stage = next;
}
