pub mod account;
pub mod intent;
pub mod market;
pub mod wad_ray;

pub use account::{AccountSnapshot, AccountView, HealthDisplay, HealthTone};
pub use intent::{Action, FormState, IntentKind, Mode, TxIntent, TxStatus};
pub use market::{ProjectionPoint, YieldReading};
