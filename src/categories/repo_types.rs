use serde::{Deserialize, Serialize};

/// Category record as persisted under the `categories` key. Not user-scoped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub color: String, // #RGB or #RRGGBB
}
