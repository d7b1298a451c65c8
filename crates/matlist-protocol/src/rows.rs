//! The material-list row model and its boundary validation.

use serde::{Deserialize, Deserializer, Serialize};

/// Status given to freshly parsed rows.
pub const STATUS_NOT_COMPLETED: &str = "未完成";
/// Status set while somebody is working on an item.
pub const STATUS_IN_PROGRESS: &str = "in-progress";
/// Status set when an item has been packed.
pub const STATUS_COMPLETED: &str = "completed";

/// One line item of a material list.
///
/// `quantity` stays a display string exactly as it appeared in the source
/// file; the derived packing counts are computed once at parse time. `status`
/// is free-form — the server stores whatever string the client sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    pub name: String,
    pub quantity: String,
    pub boxes: u32,
    pub groups: u32,
    pub pieces: u32,
    pub status: String,
}

impl Row {
    pub fn new(
        name: impl Into<String>,
        quantity: impl Into<String>,
        boxes: u32,
        groups: u32,
        pieces: u32,
    ) -> Self {
        Self {
            name: name.into(),
            quantity: quantity.into(),
            boxes,
            groups,
            pieces,
            status: STATUS_NOT_COMPLETED.into(),
        }
    }
}

/// Accepted external forms of a row. Snapshot files written by the previous
/// deployment store rows as 6-element positional arrays; everything current
/// uses named fields. Both are validated for arity and field types here, so
/// nothing downstream ever indexes into raw JSON.
#[derive(Deserialize)]
#[serde(untagged)]
enum RowRepr {
    Record {
        name: String,
        quantity: String,
        boxes: u32,
        groups: u32,
        pieces: u32,
        status: String,
    },
    Legacy(String, String, u32, u32, u32, String),
}

impl<'de> Deserialize<'de> for Row {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let row = match RowRepr::deserialize(deserializer)? {
            RowRepr::Record {
                name,
                quantity,
                boxes,
                groups,
                pieces,
                status,
            }
            | RowRepr::Legacy(name, quantity, boxes, groups, pieces, status) => Self {
                name,
                quantity,
                boxes,
                groups,
                pieces,
                status,
            },
        };
        Ok(row)
    }
}
