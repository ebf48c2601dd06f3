pub mod db;
pub mod minio;
pub mod push;
pub mod rabbitmq;
