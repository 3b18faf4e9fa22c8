use crate::error::CodecError;
use alloy_primitives::U256;
use std::collections::BTreeMap;
use std::str::FromStr;

/// Flat string key → string value map, the storage form of every stream
/// record. Integers encode decimal; big integers encode as decimal strings.
pub type FieldMap = BTreeMap<String, String>;

/// Typed accessors over a [`FieldMap`], turning absent or unparsable fields
/// into structured [`CodecError`]s.
#[derive(Debug, Copy, Clone)]
pub struct Fields<'a>(pub &'a FieldMap);

impl<'a> Fields<'a> {
    pub fn req_str(&self, key: &str) -> Result<&'a str, CodecError> {
        self.0
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| CodecError::MissingField(key.to_string()))
    }

    pub fn req_parse<T>(&self, key: &str) -> Result<T, CodecError>
    where
        T: FromStr,
    {
        let value = self.req_str(key)?;
        value.parse::<T>().map_err(|_| CodecError::MalformedField {
            field: key.to_string(),
            value: value.to_string(),
        })
    }

    pub fn req_u256(&self, key: &str) -> Result<U256, CodecError> {
        let value = self.req_str(key)?;
        U256::from_str_radix(value, 10).map_err(|_| CodecError::MalformedField {
            field: key.to_string(),
            value: value.to_string(),
        })
    }

    /// Decode an embedded JSON field into the target type.
    pub fn req_json<T>(&self, key: &str) -> Result<T, CodecError>
    where
        T: serde::de::DeserializeOwned,
    {
        let value = self.req_str(key)?;
        serde_json::from_str(value).map_err(|_| CodecError::MalformedField {
            field: key.to_string(),
            value: value.to_string(),
        })
    }

    pub fn opt_str(&self, key: &str) -> Option<&'a str> {
        self.0.get(key).map(String::as_str)
    }
}

/// Builder for a [`FieldMap`], keeping call sites flat.
#[derive(Debug, Default)]
pub struct FieldMapBuilder(FieldMap);

impl FieldMapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, key: &str, value: impl ToString) -> Self {
        self.0.insert(key.to_string(), value.to_string());
        self
    }

    /// Embed a JSON rendering of the provided value.
    pub fn json_field<T>(mut self, key: &str, value: &T) -> Result<Self, CodecError>
    where
        T: serde::Serialize,
    {
        let json = serde_json::to_string(value).map_err(|_| CodecError::MalformedField {
            field: key.to_string(),
            value: "<unserialisable>".to_string(),
        })?;
        self.0.insert(key.to_string(), json);
        Ok(self)
    }

    pub fn build(self) -> FieldMap {
        self.0
    }
}
