//! Encoding of the persisted ledger: a JSON array of sample objects in
//! ledger order, with absent readings written as `null`.

use crate::sample::record::LocationSample;
use crate::store::StoreError;

pub fn encode_ledger(samples: &[LocationSample]) -> Result<Vec<u8>, StoreError> {
    Ok(serde_json::to_vec(samples)?)
}

pub fn decode_ledger(bytes: &[u8]) -> Result<Vec<LocationSample>, StoreError> {
    Ok(serde_json::from_slice(bytes)?)
}
