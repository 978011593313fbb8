mod dcid;
mod duuid;

pub use dcid::DCid;
pub use duuid::DUuid;
