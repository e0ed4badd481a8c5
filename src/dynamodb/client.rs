//! DynamoDB client facade
//!
//! Each method builds the argument map for one operation and hands it to
//! the [`ReadThroughCache`]. Optional parameters are left out of the request
//! when empty so equivalent calls produce identical arguments.

use super::attribute::{format_attributes, format_value, AttributeFormat};
use crate::caching::{CacheOverrides, CacheSettings, CacheStore, ReadThroughCache};
use crate::core::error::BundleResult;
use crate::core::types::{ArgumentsBuilder, RemoteOperationResult, RequestArguments};
use crate::remote::RemoteServiceClient;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $wire:literal),+ $(,)? } default $default:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl $name {
            /// Value sent on the wire
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $wire,)+
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::$default
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl From<$name> for Value {
            fn from(value: $name) -> Self {
                Value::String(value.as_str().to_string())
            }
        }
    };
}

wire_enum!(
    /// Consumed capacity return mode
    ReturnConsumedCapacity {
        Indexes => "INDEXES",
        Total => "TOTAL",
        None => "NONE",
    } default None
);

wire_enum!(
    /// Item collection statistics return mode
    ReturnItemCollectionMetrics {
        Size => "SIZE",
        None => "NONE",
    } default None
);

wire_enum!(
    /// Operator between the conditions of an `Expected` block
    ConditionalOperator {
        And => "AND",
        Or => "OR",
    } default And
);

wire_enum!(
    /// Which item attributes a write returns
    ReturnValues {
        None => "NONE",
        AllOld => "ALL_OLD",
        UpdatedOld => "UPDATED_OLD",
        AllNew => "ALL_NEW",
        UpdatedNew => "UPDATED_NEW",
    } default None
);

/// Delay to wait before retry number `retries`
///
/// Zero for the first attempt, then 50ms doubled on every retry.
pub fn calculate_retry_delay(retries: u32) -> Duration {
    if retries == 0 {
        return Duration::ZERO;
    }

    let factor = 1u32.checked_shl(retries - 1).unwrap_or(u32::MAX);
    Duration::from_millis(50).saturating_mul(factor)
}

/// Arguments of `GetItem`
#[derive(Debug, Clone, PartialEq)]
pub struct GetItemInput {
    pub table_name: String,
    /// Primary key, already in attribute-value form
    pub key: Value,
    pub attributes_to_get: Vec<String>,
    pub consistent_read: bool,
    pub return_consumed_capacity: ReturnConsumedCapacity,
}

impl GetItemInput {
    pub fn new<T: Into<String>>(table_name: T, key: Value) -> Self {
        Self {
            table_name: table_name.into(),
            key,
            attributes_to_get: Vec::new(),
            consistent_read: false,
            return_consumed_capacity: ReturnConsumedCapacity::default(),
        }
    }

    pub fn attributes_to_get<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes_to_get = attributes.into_iter().map(Into::into).collect();
        self
    }

    pub fn consistent_read(mut self, consistent_read: bool) -> Self {
        self.consistent_read = consistent_read;
        self
    }

    pub fn return_consumed_capacity(mut self, mode: ReturnConsumedCapacity) -> Self {
        self.return_consumed_capacity = mode;
        self
    }

    fn into_arguments(self) -> RequestArguments {
        let attributes = Value::from(self.attributes_to_get);

        ArgumentsBuilder::new()
            .set("TableName", self.table_name)
            .set("Key", self.key)
            .set_non_empty("AttributesToGet", attributes)
            .set("ConsistentRead", self.consistent_read)
            .set("ReturnConsumedCapacity", self.return_consumed_capacity)
            .build()
    }
}

/// Options shared by the conditional single-item writes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteOptions {
    /// Conditional block, sent only when non-empty
    pub expected: Map<String, Value>,
    pub conditional_operator: ConditionalOperator,
    pub return_values: ReturnValues,
    pub return_consumed_capacity: ReturnConsumedCapacity,
    pub return_item_collection_metrics: ReturnItemCollectionMetrics,
}

impl WriteOptions {
    fn apply(self, builder: ArgumentsBuilder) -> ArgumentsBuilder {
        builder
            .set_non_empty("Expected", Value::Object(self.expected))
            .set("ConditionalOperator", self.conditional_operator)
            .set("ReturnValues", self.return_values)
            .set("ReturnConsumedCapacity", self.return_consumed_capacity)
            .set("ReturnItemCollectionMetrics", self.return_item_collection_metrics)
    }
}

macro_rules! write_option_setters {
    ($name:ident) => {
        impl $name {
            pub fn expected(mut self, expected: Map<String, Value>) -> Self {
                self.options.expected = expected;
                self
            }

            pub fn conditional_operator(mut self, operator: ConditionalOperator) -> Self {
                self.options.conditional_operator = operator;
                self
            }

            pub fn return_values(mut self, return_values: ReturnValues) -> Self {
                self.options.return_values = return_values;
                self
            }

            pub fn return_consumed_capacity(mut self, mode: ReturnConsumedCapacity) -> Self {
                self.options.return_consumed_capacity = mode;
                self
            }

            pub fn return_item_collection_metrics(mut self, mode: ReturnItemCollectionMetrics) -> Self {
                self.options.return_item_collection_metrics = mode;
                self
            }
        }
    };
}

/// Arguments of `PutItem`
#[derive(Debug, Clone, PartialEq)]
pub struct PutItemInput {
    pub table_name: String,
    /// Plain values; formatted as attribute values on the way out
    pub item: Map<String, Value>,
    pub options: WriteOptions,
}

impl PutItemInput {
    pub fn new<T: Into<String>>(table_name: T, item: Map<String, Value>) -> Self {
        Self {
            table_name: table_name.into(),
            item,
            options: WriteOptions::default(),
        }
    }

    fn into_arguments(self) -> RequestArguments {
        let builder = ArgumentsBuilder::new()
            .set("TableName", self.table_name)
            .set("Item", format_attributes(&self.item, AttributeFormat::Put));
        self.options.apply(builder).build()
    }
}

write_option_setters!(PutItemInput);

/// Arguments of `UpdateItem`
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateItemInput {
    pub table_name: String,
    pub key: Value,
    /// Plain values; formatted as `{"Value": ...}` updates on the way out
    pub attribute_updates: Map<String, Value>,
    pub options: WriteOptions,
}

impl UpdateItemInput {
    pub fn new<T: Into<String>>(table_name: T, key: Value) -> Self {
        Self {
            table_name: table_name.into(),
            key,
            attribute_updates: Map::new(),
            options: WriteOptions::default(),
        }
    }

    pub fn attribute_updates(mut self, updates: Map<String, Value>) -> Self {
        self.attribute_updates = updates;
        self
    }

    fn into_arguments(self) -> RequestArguments {
        let updates = format_attributes(&self.attribute_updates, AttributeFormat::Update);
        let builder = ArgumentsBuilder::new()
            .set("TableName", self.table_name)
            .set("Key", self.key)
            .set_non_empty("AttributeUpdates", Value::Object(updates));
        self.options.apply(builder).build()
    }
}

write_option_setters!(UpdateItemInput);

/// Arguments of `DeleteItem`
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteItemInput {
    pub table_name: String,
    pub key: Value,
    pub options: WriteOptions,
}

impl DeleteItemInput {
    pub fn new<T: Into<String>>(table_name: T, key: Value) -> Self {
        Self {
            table_name: table_name.into(),
            key,
            options: WriteOptions::default(),
        }
    }

    fn into_arguments(self) -> RequestArguments {
        let builder = ArgumentsBuilder::new()
            .set("TableName", self.table_name)
            .set("Key", self.key);
        self.options.apply(builder).build()
    }
}

write_option_setters!(DeleteItemInput);

/// Arguments of `CreateTable`
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTableInput {
    pub table_name: String,
    pub attribute_definitions: Value,
    pub key_schema: Value,
    pub provisioned_throughput: Value,
    pub local_secondary_indexes: Option<Value>,
    pub global_secondary_indexes: Option<Value>,
}

impl CreateTableInput {
    pub fn new<T: Into<String>>(
        table_name: T,
        attribute_definitions: Value,
        key_schema: Value,
        provisioned_throughput: Value,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            attribute_definitions,
            key_schema,
            provisioned_throughput,
            local_secondary_indexes: None,
            global_secondary_indexes: None,
        }
    }

    pub fn local_secondary_indexes(mut self, indexes: Value) -> Self {
        self.local_secondary_indexes = Some(indexes);
        self
    }

    pub fn global_secondary_indexes(mut self, indexes: Value) -> Self {
        self.global_secondary_indexes = Some(indexes);
        self
    }

    fn into_arguments(self) -> RequestArguments {
        ArgumentsBuilder::new()
            .set("AttributeDefinitions", self.attribute_definitions)
            .set("TableName", self.table_name)
            .set("KeySchema", self.key_schema)
            .set("ProvisionedThroughput", self.provisioned_throughput)
            .set_opt("LocalSecondaryIndexes", self.local_secondary_indexes)
            .set_opt("GlobalSecondaryIndexes", self.global_secondary_indexes)
            .build()
    }
}

/// DynamoDB facade over a remote client
#[derive(Debug, Clone)]
pub struct DynamoDbClient {
    reads: ReadThroughCache,
}

impl DynamoDbClient {
    /// Facade without cache
    pub fn new(client: Arc<dyn RemoteServiceClient>) -> Self {
        Self {
            reads: ReadThroughCache::new(client),
        }
    }

    /// Facade over an already configured read-through wrapper
    pub fn from_read_through(reads: ReadThroughCache) -> Self {
        Self { reads }
    }

    /// Serve `GetItem` / `BatchGetItem` from `store`
    pub fn with_cache(self, store: Arc<dyn CacheStore>, settings: CacheSettings) -> Self {
        Self {
            reads: self.reads.with_cache(store, settings),
        }
    }

    /// Direct access to the underlying remote client
    pub fn client(&self) -> &Arc<dyn RemoteServiceClient> {
        self.reads.client()
    }

    pub fn read_through(&self) -> &ReadThroughCache {
        &self.reads
    }

    pub fn format_value(&self, value: &Value, format: AttributeFormat) -> Option<Value> {
        format_value(value, format)
    }

    pub fn format_attributes(&self, values: &Map<String, Value>, format: AttributeFormat) -> Map<String, Value> {
        format_attributes(values, format)
    }

    pub fn calculate_retry_delay(&self, retries: u32) -> Duration {
        calculate_retry_delay(retries)
    }

    /// Run any operation with prebuilt arguments
    pub async fn execute(&self, operation: &str, args: &RequestArguments) -> BundleResult<RemoteOperationResult> {
        debug!(operation = %operation, "DynamoDB call");
        self.reads.execute(operation, args).await
    }

    pub async fn get_item(&self, input: GetItemInput) -> BundleResult<RemoteOperationResult> {
        self.execute("GetItem", &input.into_arguments()).await
    }

    /// `GetItem` with a per-call cache TTL or prefix
    pub async fn get_item_with(
        &self,
        input: GetItemInput,
        overrides: CacheOverrides,
    ) -> BundleResult<RemoteOperationResult> {
        self.reads
            .execute_with("GetItem", &input.into_arguments(), overrides)
            .await
    }

    pub async fn batch_get_item(
        &self,
        request_items: Value,
        return_consumed_capacity: ReturnConsumedCapacity,
    ) -> BundleResult<RemoteOperationResult> {
        let args = ArgumentsBuilder::new()
            .set("RequestItems", request_items)
            .set("ReturnConsumedCapacity", return_consumed_capacity)
            .build();
        self.execute("BatchGetItem", &args).await
    }

    pub async fn batch_write_item(
        &self,
        request_items: Value,
        return_consumed_capacity: ReturnConsumedCapacity,
        return_item_collection_metrics: ReturnItemCollectionMetrics,
    ) -> BundleResult<RemoteOperationResult> {
        let args = ArgumentsBuilder::new()
            .set("RequestItems", request_items)
            .set("ReturnConsumedCapacity", return_consumed_capacity)
            .set("ReturnItemCollectionMetrics", return_item_collection_metrics)
            .build();
        self.execute("BatchWriteItem", &args).await
    }

    pub async fn put_item(&self, input: PutItemInput) -> BundleResult<RemoteOperationResult> {
        self.execute("PutItem", &input.into_arguments()).await
    }

    pub async fn update_item(&self, input: UpdateItemInput) -> BundleResult<RemoteOperationResult> {
        self.execute("UpdateItem", &input.into_arguments()).await
    }

    pub async fn delete_item(&self, input: DeleteItemInput) -> BundleResult<RemoteOperationResult> {
        self.execute("DeleteItem", &input.into_arguments()).await
    }

    pub async fn create_table(&self, input: CreateTableInput) -> BundleResult<RemoteOperationResult> {
        self.execute("CreateTable", &input.into_arguments()).await
    }

    pub async fn delete_table(&self, table_name: &str) -> BundleResult<RemoteOperationResult> {
        let args = ArgumentsBuilder::new().set("TableName", table_name).build();
        self.execute("DeleteTable", &args).await
    }

    pub async fn describe_table(&self, table_name: &str) -> BundleResult<RemoteOperationResult> {
        let args = ArgumentsBuilder::new().set("TableName", table_name).build();
        self.execute("DescribeTable", &args).await
    }

    pub async fn list_tables(
        &self,
        exclusive_start_table_name: Option<&str>,
        limit: Option<u32>,
    ) -> BundleResult<RemoteOperationResult> {
        let args = ArgumentsBuilder::new()
            .set_opt("ExclusiveStartTableName", exclusive_start_table_name)
            .set_opt("Limit", limit)
            .build();
        self.execute("ListTables", &args).await
    }
}
