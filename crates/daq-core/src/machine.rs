use crate::tag::Tag;

/// A controller reachable over OPC UA.
///
/// Invariant: an inactive machine is never subscribed — callers that open
/// sessions must filter on `is_active` before touching `opc_endpoint`.
#[derive(Debug, Clone, PartialEq)]
pub struct Machine {
    pub id: i32,
    pub name: String,
    pub opc_endpoint: String,
    pub automate_type: String,
    pub is_active: bool,
    pub tags: Vec<Tag>,
}

impl Machine {
    pub fn active_tags(&self) -> impl Iterator<Item = &Tag> {
        self.tags.iter().filter(|t| t.is_active)
    }
}
