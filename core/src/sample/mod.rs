pub mod codec;
pub mod ledger;
pub mod record;

pub use codec::{to_sample, RawCoords, RawLocationUpdate};
pub use ledger::{decode_ledger, encode_ledger};
pub use record::LocationSample;
