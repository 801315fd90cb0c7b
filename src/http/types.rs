#[derive(Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct DatasetReference {
    /// Required. A unique ID for this dataset, without the project name.
    pub dataset_id: String,
    /// Optional. The ID of the project containing this dataset.
    pub project_id: String,
}

#[derive(Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ErrorProto {
    /// A short error code that summarizes the error.
    pub reason: Option<String>,
    /// Specifies where the error occurred, if present.
    pub location: Option<String>,
    /// Debugging information. This property is internal to Google and should not be used.
    pub debug_info: Option<String>,
    /// A human-readable description of the error.
    pub message: Option<String>,
}

/// The type of a query parameter. `STRUCT` carries `struct_types`,
/// `ARRAY` carries `array_type`.
#[derive(Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct QueryParameterType {
    /// Required. The top level type of this field.
    #[serde(rename(serialize = "type", deserialize = "type"))]
    pub parameter_type: String,
    /// Optional. The type of the array's elements, if this is an array.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub array_type: Option<Box<QueryParameterType>>,
    /// Optional. The types of the fields of this struct, in order, if this is a struct.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub struct_types: Option<Vec<QueryParameterStructType>>,
}

#[derive(Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct QueryParameterStructType {
    /// Optional. The name of this field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Required. The type of this field.
    #[serde(rename(serialize = "type", deserialize = "type"))]
    pub field_type: QueryParameterType,
    /// Optional. Human-oriented description of the field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The value of a query parameter. An empty scalar string is meaningful for
/// STRING parameters, so `value` is always serialized once set, even when empty.
#[derive(Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct QueryParameterValue {
    /// Optional. The value of this value, if a simple scalar type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Optional. The array values, if this is an array type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub array_values: Option<Vec<QueryParameterValue>>,
    /// The struct field values.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub struct_values: Option<std::collections::HashMap<String, QueryParameterValue>>,
}

#[derive(Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct QueryParameter {
    /// Optional. If unset, this is a positional parameter.
    /// Otherwise, should be unique within a query.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Required. The type of this parameter.
    pub parameter_type: QueryParameterType,
    /// Required. The value of this parameter.
    pub parameter_value: QueryParameterValue,
}

#[derive(Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct EncryptionConfiguration {
    /// Optional. Describes the Cloud KMS encryption key that will be used to
    /// protect the destination BigQuery table. The BigQuery service account
    /// associated with your project requires access to this encryption key.
    pub kms_key_name: Option<String>,
}

#[derive(Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionProperty {
    /// The key of the property to set.
    pub key: String,
    /// The value of the property to set.
    pub value: String,
}
