pub mod client;
pub mod designs;

pub use self::client::{ApiClient, ApiError, ApiRequest, AuthMode};
pub use self::designs::{
    DesignApi, DesignRecord, FunFact, GenerateRequest, GenerateResponse, SaveDesignRequest,
};
