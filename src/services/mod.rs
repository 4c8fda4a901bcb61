pub mod analysis_client;
pub mod user_service;
pub mod x_account_service;
pub mod x_api_client;

pub use analysis_client::{AnalysisClient, AnalyzeRequest};
pub use user_service::{Registration, Session, UserService};
pub use x_account_service::{
    AccountPage, AccountUpdate, BindPreferences, XAccountService, XAccountStats,
};
pub use x_api_client::{XApiClient, XUserProfile};
