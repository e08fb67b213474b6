use std::str::FromStr;

/// Logical OPC UA data type a tag carries. Unknown strings are preserved
/// verbatim in `DataType::Other` so the validator can fall back to
/// accept-on-unknown instead of rejecting tags with an exotic type name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataType {
    Int16,
    Int32,
    Int64,
    UInt16,
    UInt32,
    UInt64,
    Float,
    Double,
    Boolean,
    String,
    Other(String),
}

impl FromStr for DataType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "Int16" => DataType::Int16,
            "Int32" => DataType::Int32,
            "Int64" => DataType::Int64,
            "UInt16" => DataType::UInt16,
            "UInt32" => DataType::UInt32,
            "UInt64" => DataType::UInt64,
            "Float" => DataType::Float,
            "Double" => DataType::Double,
            "Boolean" => DataType::Boolean,
            "String" => DataType::String,
            other => DataType::Other(other.to_string()),
        })
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataType::Int16 => write!(f, "Int16"),
            DataType::Int32 => write!(f, "Int32"),
            DataType::Int64 => write!(f, "Int64"),
            DataType::UInt16 => write!(f, "UInt16"),
            DataType::UInt32 => write!(f, "UInt32"),
            DataType::UInt64 => write!(f, "UInt64"),
            DataType::Float => write!(f, "Float"),
            DataType::Double => write!(f, "Double"),
            DataType::Boolean => write!(f, "Boolean"),
            DataType::String => write!(f, "String"),
            DataType::Other(s) => write!(f, "{s}"),
        }
    }
}

/// A single monitored variable on a machine.
///
/// Invariant: `node_id` is unique across the fleet; `(machine_id, name)` is
/// unique within a machine. `allowed_values` and `(min_value, max_value)` are
/// mutually exclusive by data shape — the metadata store never populates both.
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub id: i32,
    pub machine_id: i32,
    pub name: String,
    pub node_id: String,
    pub data_type: DataType,
    pub unit: Option<String>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    /// Serialized list of permissible string forms, e.g. `["Run","Stop","Fault"]`.
    pub allowed_values: Option<String>,
    pub is_active: bool,
}

impl Tag {
    /// Parse `allowed_values` into its list form. Returns `None` if the field
    /// is unset; a parse failure of a set field is treated as an empty list
    /// so the enumerated-values check still runs (and rejects) rather than
    /// silently falling through to the range check.
    pub fn allowed_values_list(&self) -> Option<Vec<String>> {
        let raw = self.allowed_values.as_ref()?;
        let parsed: Vec<String> = serde_json::from_str(raw).unwrap_or_default();
        Some(parsed)
    }

    pub fn has_range(&self) -> bool {
        self.min_value.is_some() || self.max_value.is_some()
    }
}
