//! HTTP middleware and request extractors

pub mod request_id;
pub mod user;

pub use request_id::{REQUEST_ID_HEADER, RequestId, request_id_middleware};
pub use user::{AuthUser, USER_ID_HEADER};
