//! Domain models for the social automation backend.
//!
//! Database-backed records plus the API views derived from them.

pub mod oauth_state;
pub mod sync_log;
pub mod user;
pub mod wallet;
pub mod x_account;

pub use oauth_state::OAuthState;
pub use sync_log::{SyncLog, SyncStatus, SyncType};
pub use user::User;
pub use wallet::Wallet;
pub use x_account::{
    AutoGrowSettings, AutoGrowSettingsPatch, BindingStatus, GrowthSpeed, XAccount, XAccountDetail,
    XAccountInfo,
};
