pub mod attributions;
pub mod balances;
pub mod history;
pub mod prices;
pub mod util;

pub use attributions::{
    AffiliateAmounts, Attribute, AttributionEvent, AttributionLookback, AttributionPercents,
    SharedAttributions,
};
pub use balances::Balances;
pub use history::{Snapshot, SparseHistory};
pub use prices::{PricePoint, Prices};
