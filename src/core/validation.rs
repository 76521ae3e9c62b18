//! Response Validation
//!
//! Declared shapes of token endpoint responses.

use serde_json::Value;

/// JSON kind a field must have.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    String,
    /// Non-negative integer.
    Integer,
}

impl FieldKind {
    fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_u64(),
        }
    }
}

/// One declared field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldSpec {
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
        }
    }
}

/// A token response shape. Unknown fields are allowed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResponseSchema {
    fields: Vec<FieldSpec>,
}

impl ResponseSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    /// Plain OAuth2 token response.
    pub fn oauth2() -> Self {
        Self::new(vec![
            FieldSpec::required("access_token", FieldKind::String),
            FieldSpec::required("expires_in", FieldKind::Integer),
            FieldSpec::optional("token_type", FieldKind::String),
            FieldSpec::optional("refresh_token", FieldKind::String),
            FieldSpec::optional("scope", FieldKind::String),
            FieldSpec::optional("id_token", FieldKind::String),
        ])
    }

    /// OpenID Connect code exchange response: OAuth2 plus `id_token`.
    pub fn openid() -> Self {
        Self::oauth2().require("id_token", FieldKind::String)
    }

    /// Declare `name` as required, replacing an earlier declaration.
    pub fn require(mut self, name: &'static str, kind: FieldKind) -> Self {
        self.fields.retain(|f| f.name != name);
        self.fields.push(FieldSpec::required(name, kind));
        self
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Whether `raw` is an object with every declared field in shape.
    pub fn matches(&self, raw: &Value) -> bool {
        raw.is_object() && self.violations(raw).is_empty()
    }

    /// Names of the fields that are missing or of the wrong kind.
    pub fn violations(&self, raw: &Value) -> Vec<&'static str> {
        let Some(object) = raw.as_object() else {
            return self.fields.iter().map(|f| f.name).collect();
        };

        self.fields
            .iter()
            .filter(|field| match object.get(field.name) {
                None | Some(Value::Null) => field.required,
                Some(value) => !field.kind.accepts(value),
            })
            .map(|field| field.name)
            .collect()
    }
}
