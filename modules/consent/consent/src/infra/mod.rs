pub mod converter;
pub mod endpoints;
pub mod http_gateway;
pub mod storage;
