//! # DynamoDB Facade
//!
//! Typed helpers that assemble DynamoDB request arguments and forward them
//! to a remote client, with `GetItem` / `BatchGetItem` served through the
//! read-through cache when one is configured.

pub mod attribute;
pub mod client;

pub use attribute::{format_attributes, format_value, AttributeFormat};
pub use client::{
    calculate_retry_delay, ConditionalOperator, CreateTableInput, DeleteItemInput, DynamoDbClient,
    GetItemInput, PutItemInput, ReturnConsumedCapacity, ReturnItemCollectionMetrics, ReturnValues,
    UpdateItemInput, WriteOptions,
};
