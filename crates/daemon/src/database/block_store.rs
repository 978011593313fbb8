use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use common::chain::{AnchorPayload, Block, BlockStore, BlockStoreError};

use crate::database::Database;

const BLOCK_COLUMNS: &str = "id, timestamp, payload, previous_hash, merkle_root, nonce, hash";
/// The anchor key, read from the hashed payload
const PAYLOAD_KEY: &str = "json_extract(payload, '$.key')";

fn backend(e: sqlx::Error) -> BlockStoreError {
    BlockStoreError::Backend(e.to_string())
}

fn block_from_row(row: &SqliteRow) -> Result<Block, BlockStoreError> {
    let id: i64 = row.try_get("id").map_err(backend)?;
    let payload: String = row.try_get("payload").map_err(backend)?;
    let payload: AnchorPayload = serde_json::from_str(&payload)
        .map_err(|e| BlockStoreError::Backend(format!("block {} has a bad payload: {}", id, e)))?;
    let nonce: String = row.try_get("nonce").map_err(backend)?;
    let nonce = nonce
        .parse::<u64>()
        .map_err(|e| BlockStoreError::Backend(format!("block {} has a bad nonce: {}", id, e)))?;

    Ok(Block {
        id: id as u64,
        timestamp: row.try_get("timestamp").map_err(backend)?,
        payload,
        previous_hash: row.try_get("previous_hash").map_err(backend)?,
        merkle_root: row.try_get("merkle_root").map_err(backend)?,
        nonce,
        hash: row.try_get("hash").map_err(backend)?,
    })
}

#[async_trait]
impl BlockStore for Database {
    async fn append(&self, block: &Block) -> Result<(), BlockStoreError> {
        let mut tx = self.begin().await.map_err(backend)?;

        let count: i64 = sqlx::query("SELECT COUNT(*) AS count FROM chain_blocks")
            .fetch_one(&mut *tx)
            .await
            .map_err(backend)?
            .try_get("count")
            .map_err(backend)?;
        if block.id != count as u64 {
            return Err(BlockStoreError::Conflict {
                id: block.id,
                expected: count as u64,
            });
        }

        sqlx::query(
            r#"
            INSERT INTO chain_blocks
                (id, timestamp, payload, previous_hash, merkle_root, nonce, hash)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(block.id as i64)
        .bind(block.timestamp)
        .bind(block.payload.to_json())
        .bind(&block.previous_hash)
        .bind(&block.merkle_root)
        .bind(block.nonce.to_string())
        .bind(&block.hash)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        tx.commit().await.map_err(backend)?;
        Ok(())
    }

    async fn blocks(&self) -> Result<Vec<Block>, BlockStoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM chain_blocks ORDER BY id ASC",
            BLOCK_COLUMNS
        ))
        .fetch_all(&**self)
        .await
        .map_err(backend)?;

        rows.iter().map(block_from_row).collect()
    }

    async fn tip(&self) -> Result<Option<Block>, BlockStoreError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM chain_blocks ORDER BY id DESC LIMIT 1",
            BLOCK_COLUMNS
        ))
        .fetch_optional(&**self)
        .await
        .map_err(backend)?;

        row.as_ref().map(block_from_row).transpose()
    }

    async fn len(&self) -> Result<u64, BlockStoreError> {
        let count: i64 = sqlx::query("SELECT COUNT(*) AS count FROM chain_blocks")
            .fetch_one(&**self)
            .await
            .map_err(backend)?
            .try_get("count")
            .map_err(backend)?;
        Ok(count as u64)
    }

    async fn latest_for_key(&self, key: &str) -> Result<Option<Block>, BlockStoreError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM chain_blocks WHERE {} = $1 AND id > 0 ORDER BY id DESC LIMIT 1",
            BLOCK_COLUMNS, PAYLOAD_KEY
        ))
        .bind(key)
        .fetch_optional(&**self)
        .await
        .map_err(backend)?;

        row.as_ref().map(block_from_row).transpose()
    }

    async fn history_for_key(&self, key: &str) -> Result<Vec<Block>, BlockStoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM chain_blocks WHERE {} = $1 AND id > 0 ORDER BY id DESC",
            BLOCK_COLUMNS, PAYLOAD_KEY
        ))
        .bind(key)
        .fetch_all(&**self)
        .await
        .map_err(backend)?;

        rows.iter().map(block_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::anchor::{AnchorError, HistoryRange};
    use common::chain::{ChainAnchorRegistry, ChainIntegrityError, HashChain, MiningConfig};
    use common::prelude::AnchorRegistry;
    use common::linked_data::content_cid;
    use std::sync::Arc;

    fn mining() -> MiningConfig {
        MiningConfig {
            difficulty: 1,
            timeout: None,
            attempt_budget: None,
        }
    }

    #[tokio::test]
    async fn test_chain_over_sqlite() {
        let db = Database::in_memory().await.unwrap();
        let chain = HashChain::open(db.clone(), mining()).await.unwrap();
        let registry = ChainAnchorRegistry::new(Arc::new(chain));
        let cid = content_cid(b"record");

        registry.store("user@example.com", &cid).await.unwrap();
        assert_eq!(registry.lookup("user@example.com").await.unwrap(), cid);

        let report = registry.chain().verify().await.unwrap();
        assert_eq!(report.blocks, 2);
        assert_eq!(db.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_blocks_round_trip() {
        let db = Database::in_memory().await.unwrap();
        let chain = HashChain::open(db.clone(), mining()).await.unwrap();
        let appended = chain
            .append(AnchorPayload::new("k", content_cid(b"x").to_string()))
            .await
            .unwrap();

        let blocks = db.blocks().await.unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[1], appended);
        assert_eq!(db.tip().await.unwrap(), Some(appended.clone()));
        assert_eq!(db.latest_for_key("k").await.unwrap(), Some(appended));
        assert_eq!(db.latest_for_key("").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rejects_out_of_sequence_block() {
        let db = Database::in_memory().await.unwrap();
        let chain = HashChain::open(db.clone(), mining()).await.unwrap();
        let genesis = chain.store().tip().await.unwrap().unwrap();

        let err = db.append(&genesis).await.unwrap_err();
        assert_eq!(err, BlockStoreError::Conflict { id: 0, expected: 1 });
    }

    #[tokio::test]
    async fn test_tampered_row_fails_verification() {
        let db = Database::in_memory().await.unwrap();
        let chain = HashChain::open(db.clone(), mining()).await.unwrap();
        chain
            .append(AnchorPayload::new("k", content_cid(b"x").to_string()))
            .await
            .unwrap();

        let forged = AnchorPayload::new("k", content_cid(b"forged").to_string());
        sqlx::query("UPDATE chain_blocks SET payload = $1 WHERE id = 1")
            .bind(forged.to_json())
            .execute(&*db)
            .await
            .unwrap();

        assert!(chain.verify().await.is_err());
    }

    #[tokio::test]
    async fn test_history_over_sqlite() {
        let db = Database::in_memory().await.unwrap();
        let registry = ChainAnchorRegistry::new(Arc::new(HashChain::open(db.clone(), mining()).await.unwrap()));
        let first = content_cid(b"v1");
        let second = content_cid(b"v2");
        registry.store("k", &first).await.unwrap();
        registry.store("other", &first).await.unwrap();
        registry.store("k", &second).await.unwrap();

        let ids: Vec<u64> = db.history_for_key("k").await.unwrap().iter().map(|b| b.id).collect();
        assert_eq!(ids, vec![3, 1]);

        let history = registry.history("k", &HistoryRange::all()).await.unwrap();
        assert_eq!(history.iter().map(|e| e.cid).collect::<Vec<_>>(), vec![second, first]);
    }

    #[tokio::test]
    async fn test_rewritten_payload_key_is_detected() {
        let db = Database::in_memory().await.unwrap();
        let chain = Arc::new(HashChain::open(db.clone(), mining()).await.unwrap());
        let registry = ChainAnchorRegistry::new(chain.clone());
        let victim = content_cid(b"victim");
        registry.store("victim@example.com", &victim).await.unwrap();
        registry.store("attacker@example.com", &content_cid(b"attacker")).await.unwrap();

        // re-point the attacker's block at the victim's key
        sqlx::query("UPDATE chain_blocks SET payload = json_set(payload, '$.key', $1) WHERE id = 2")
            .bind("victim@example.com")
            .execute(&*db)
            .await
            .unwrap();

        assert!(matches!(
            chain.verify().await,
            Err(common::chain::ChainError::Integrity(ChainIntegrityError::MerkleMismatch { block: 2 }))
        ));
        assert!(matches!(
            registry.lookup("victim@example.com").await,
            Err(AnchorError::ChainIntegrity(ChainIntegrityError::MerkleMismatch { block: 2 }))
        ));
    }
}
