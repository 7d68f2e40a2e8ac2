//! Query options for resource requests.

use serde::{Deserialize, Serialize};

/// Query options appended to a resource URL.
///
/// `page_size` becomes `page-size=<n>` and `fields` becomes a comma-joined
/// `fields=<a,b,...>` parameter. Values are inserted as-is, without
/// percent-encoding.
///
/// # Examples
///
/// ```
/// use qcrest::QueryOptions;
///
/// let options = QueryOptions::new()
///     .page_size(50)
///     .fields(["id", "name", "status"]);
///
/// assert_eq!(options.page_size, Some(50));
/// assert_eq!(options.fields, vec!["id", "name", "status"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryOptions {
    /// Maximum number of entities per page.
    #[serde(default)]
    pub page_size: Option<u32>,

    /// Fields to return, in order.
    #[serde(default)]
    pub fields: Vec<String>,
}

impl QueryOptions {
    /// Creates empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the page size.
    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Appends a field to the field list.
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.fields.push(name.into());
        self
    }

    /// Appends several fields to the field list, keeping their order.
    pub fn fields<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields.extend(names.into_iter().map(Into::into));
        self
    }

    /// Builds options from an untyped JSON value.
    ///
    /// `null` yields empty options. Anything other than a JSON object is
    /// rejected, as is an object whose members have the wrong types.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`](crate::Error::InvalidArgument).
    ///
    /// # Examples
    ///
    /// ```
    /// use qcrest::QueryOptions;
    /// use serde_json::json;
    ///
    /// let options = QueryOptions::from_value(json!({"pageSize": 10, "fields": ["a"]})).unwrap();
    /// assert_eq!(options.page_size, Some(10));
    ///
    /// assert!(QueryOptions::from_value(json!("page-size=10")).is_err());
    /// ```
    pub fn from_value(value: serde_json::Value) -> crate::Result<Self> {
        match value {
            serde_json::Value::Null => Ok(Self::default()),
            serde_json::Value::Object(_) => serde_json::from_value(value)
                .map_err(|e| crate::Error::InvalidArgument(format!("Invalid options: {}", e))),
            other => Err(crate::Error::InvalidArgument(format!(
                "Expected parameter options to be an object but got {}",
                json_type_name(&other)
            ))),
        }
    }

    /// Renders the query parameters in order, skipping unset ones.
    pub(crate) fn query_pairs(&self) -> Vec<String> {
        let mut pairs = Vec::new();

        // zero counts as unset
        if let Some(page_size) = self.page_size.filter(|n| *n > 0) {
            pairs.push(format!("page-size={}", page_size));
        }

        if !self.fields.is_empty() {
            pairs.push(format!("fields={}", self.fields.join(",")));
        }

        pairs
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
