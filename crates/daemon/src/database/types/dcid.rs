use sqlx::encode::IsNull;
use sqlx::error::BoxDynError;
use sqlx::sqlite::{SqliteArgumentValue, SqliteTypeInfo, SqliteValueRef};
use sqlx::{Decode, Encode, Sqlite, Type};

use common::linked_data::{parse_cid, Cid, CidError};

/// A CID stored as its canonical string form
///
/// CIDv0 values reported by pinning services stay base58, so they are
///  never re-encoded into another base.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct DCid(Cid);

impl From<DCid> for Cid {
    fn from(val: DCid) -> Self {
        val.0
    }
}

impl From<Cid> for DCid {
    fn from(cid: Cid) -> Self {
        Self(cid)
    }
}

impl Decode<'_, Sqlite> for DCid {
    fn decode(value: SqliteValueRef<'_>) -> Result<Self, BoxDynError> {
        let db_val = <String as Decode<Sqlite>>::decode(value)?;
        let cid = parse_cid(&db_val).map_err(DCidError::InvalidCid)?;

        Ok(Self(cid))
    }
}

impl Encode<'_, Sqlite> for DCid {
    fn encode_by_ref(
        &self,
        args: &mut Vec<SqliteArgumentValue<'_>>,
    ) -> Result<IsNull, BoxDynError> {
        args.push(SqliteArgumentValue::Text(self.0.to_string().into()));
        Ok(IsNull::No)
    }
}

impl Type<Sqlite> for DCid {
    fn compatible(ty: &SqliteTypeInfo) -> bool {
        <String as Type<Sqlite>>::compatible(ty)
    }

    fn type_info() -> SqliteTypeInfo {
        <String as Type<Sqlite>>::type_info()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DCidError {
    #[error("invalid cid: {0}")]
    InvalidCid(#[from] CidError),
}
