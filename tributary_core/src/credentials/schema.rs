use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::marker::PhantomData;

use crate::auth::CredentialFields;
use crate::credentials::traits::CredentialSchema;
use crate::{Error, Result};

/// Credential schema backed by a serde type.
///
/// Fields are validated by deserializing into `T` and normalized by
/// serializing it back, so unknown fields are dropped and defaults applied.
pub struct SerdeSchema<T> {
    name: &'static str,
    non_empty: &'static [&'static str],
    _marker: PhantomData<fn() -> T>,
}

impl<T> SerdeSchema<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            non_empty: &[],
            _marker: PhantomData,
        }
    }

    /// String fields that must also be non-blank.
    pub const fn non_empty(mut self, fields: &'static [&'static str]) -> Self {
        self.non_empty = fields;
        self
    }
}

impl<T> CredentialSchema for SerdeSchema<T>
where
    T: DeserializeOwned + Serialize,
{
    fn name(&self) -> &str {
        self.name
    }

    fn validate(&self, fields: CredentialFields) -> Result<CredentialFields> {
        let typed: T = serde_json::from_value(Value::Object(fields)).map_err(|e| {
            let message = e.to_string();
            let field = offending_field(&message).unwrap_or(self.name).to_string();
            Error::validation(field, message)
        })?;
        let Value::Object(normalized) =
            serde_json::to_value(&typed).map_err(|e| Error::backend("serialize credentials", e))?
        else {
            return Err(Error::InvalidInput(format!(
                "{} does not serialize to an object",
                self.name
            )));
        };

        for field in self.non_empty {
            let blank = normalized
                .get(*field)
                .and_then(Value::as_str)
                .is_none_or(|s| s.trim().is_empty());
            if blank {
                return Err(Error::validation(*field, "must not be empty"));
            }
        }
        Ok(normalized)
    }
}

// serde_json reports "missing field `name`" / "unknown field `name`".
fn offending_field(message: &str) -> Option<&str> {
    let start = message.find('`')? + 1;
    let len = message[start..].find('`')?;
    Some(&message[start..start + len])
}
