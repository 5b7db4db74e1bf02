use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const SHOT_LIST_HEADER: &str = "output shot";
pub const TASK_IDS_HEADER: &str = "image task id";
pub const MIN_ROW_FIELDS: usize = 3;

const SHOT_LIST_FALLBACK_COLUMN: usize = 1;
const TASK_IDS_FALLBACK_COLUMN: usize = 2;
const MAX_DECODE_ROUNDS: usize = 2;

/// One step of an output plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shot {
    pub shot_number: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shot_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shot_description: Option<String>,
    pub description: String,
}

impl Shot {
    pub fn free_text(shot_number: u64, description: &str) -> Self {
        Self {
            shot_number,
            shot_name: None,
            shot_description: None,
            description: description.to_string(),
        }
    }
}

/// One spreadsheet row after normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub prompt: String,
    pub shots: Vec<Shot>,
    pub task_ids: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetColumns {
    pub shots: usize,
    pub task_ids: usize,
}

impl SheetColumns {
    /// Resolves columns by header name, last match winning, with positional
    /// fallback when no header matches.
    pub fn resolve(header: &[String]) -> Self {
        let mut shots = None;
        let mut task_ids = None;
        for (idx, name) in header.iter().enumerate() {
            let lowered = name.to_lowercase();
            if lowered.contains(SHOT_LIST_HEADER) {
                shots = Some(idx);
            }
            if lowered.contains(TASK_IDS_HEADER) {
                task_ids = Some(idx);
            }
        }
        Self {
            shots: shots.unwrap_or(SHOT_LIST_FALLBACK_COLUMN),
            task_ids: task_ids.unwrap_or(TASK_IDS_FALLBACK_COLUMN),
        }
    }
}

/// Turns parsed CSV rows (header first) into conversations.
///
/// Rows with fewer than three fields are skipped; malformed cells degrade to
/// a single free-text shot or a best-effort id list instead of dropping the row.
pub fn normalize_rows(rows: &[Vec<String>]) -> Vec<Conversation> {
    let Some((header, body)) = rows.split_first() else {
        return Vec::new();
    };
    let columns = SheetColumns::resolve(header);
    body.iter()
        .filter(|row| row.len() >= MIN_ROW_FIELDS)
        .map(|row| Conversation {
            prompt: cell(row, 0).to_string(),
            shots: decode_shots(cell(row, columns.shots)),
            task_ids: decode_task_ids(cell(row, columns.task_ids)),
        })
        .collect()
}

fn cell(row: &[String], idx: usize) -> &str {
    row.get(idx).map(|value| value.trim()).unwrap_or("")
}

pub fn decode_shots(cell: &str) -> Vec<Shot> {
    let raw = cell.trim();
    if raw.is_empty() {
        return Vec::new();
    }
    let Some(decoded) = decode_nested(raw) else {
        return vec![Shot::free_text(1, raw)];
    };
    let Value::Array(items) = decoded else {
        return Vec::new();
    };
    items
        .iter()
        .enumerate()
        .filter_map(|(idx, item)| shot_from_element(item, idx as u64 + 1))
        .collect()
}

/// Decodes up to two rounds so that a JSON string holding JSON is unwrapped.
fn decode_nested(raw: &str) -> Option<Value> {
    let mut current = Value::String(raw.to_string());
    for _ in 0..MAX_DECODE_ROUNDS {
        if let Value::String(text) = &current {
            current = serde_json::from_str(text).ok()?;
        }
    }
    Some(current)
}

fn shot_from_element(item: &Value, position: u64) -> Option<Shot> {
    match item {
        Value::Object(obj) => Some(shot_from_object(obj, position, "")),
        Value::String(text) => match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(obj)) => Some(shot_from_object(&obj, position, text)),
            _ => Some(Shot::free_text(position, text)),
        },
        _ => None,
    }
}

fn shot_from_object(obj: &Map<String, Value>, position: u64, fallback: &str) -> Shot {
    let description = ["description", "shot_description", "output"]
        .iter()
        .filter_map(|key| text_field(obj, key))
        .find(|value| !value.is_empty())
        .unwrap_or_else(|| fallback.to_string());
    Shot {
        shot_number: obj
            .get("shot_number")
            .and_then(positive_number)
            .unwrap_or(position),
        shot_name: text_field(obj, "shot_name"),
        shot_description: text_field(obj, "shot_description"),
        description,
    }
}

fn text_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn positive_number(value: &Value) -> Option<u64> {
    let parsed = match value {
        Value::Number(number) => number
            .as_u64()
            .or_else(|| number.as_f64().filter(|v| *v >= 1.0).map(|v| v as u64)),
        Value::String(text) => text.trim().parse::<u64>().ok(),
        _ => None,
    };
    parsed.filter(|number| *number > 0)
}

pub fn decode_task_ids(cell: &str) -> Vec<String> {
    let raw = cell.trim();
    if raw.is_empty() {
        return Vec::new();
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(items)) => items.iter().filter_map(task_id_from_value).collect(),
        Ok(value @ Value::String(_)) => task_id_from_value(&value).into_iter().collect(),
        Ok(_) => Vec::new(),
        Err(_) if raw.contains(',') => raw
            .split(',')
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .collect(),
        Err(_) => vec![raw.to_string()],
    }
}

fn task_id_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.trim().to_string()).filter(|id| !id.is_empty()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
