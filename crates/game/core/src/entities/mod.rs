//! Entity stores fed by sensing events.
mod parcels;
mod rivals;

pub use parcels::{Parcel, ParcelStore};
pub use rivals::{Observer, Rival, RivalStore};
