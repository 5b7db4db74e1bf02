use anyhow::bail;
use serde_json::Value;

/// Known locations of result URLs in an image-status response, in the order
/// they are tried.
pub const RESULT_URL_SHAPES: &[&str] = &[
    "/data/response/resultUrls",
    "/resultUrls",
    "/response/resultUrls",
    "/data/image_urls",
    "/image_urls",
    "/data/urls",
    "/urls",
    "/data/response/image_urls",
    "/response/image_urls",
];

/// Extracts result URLs from a status body.
///
/// The first shape holding an array wins, even an empty one (a task that is
/// still running). A body matching none of the shapes is an error so that
/// upstream schema drift shows up in the event log.
pub fn result_urls(body: &Value) -> anyhow::Result<Vec<String>> {
    for pointer in RESULT_URL_SHAPES {
        if let Some(items) = body.pointer(pointer).and_then(Value::as_array) {
            return Ok(items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .map(str::to_string)
                .collect());
        }
    }
    bail!(
        "unrecognized image status response shape (top-level keys: {})",
        top_level_keys(body)
    )
}

fn top_level_keys(body: &Value) -> String {
    match body.as_object() {
        Some(obj) if !obj.is_empty() => obj.keys().cloned().collect::<Vec<String>>().join(", "),
        Some(_) => "none".to_string(),
        None => "not an object".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::result_urls;

    #[test]
    fn nested_response_shape_is_preferred() -> anyhow::Result<()> {
        let body = json!({
            "resultUrls": ["https://top.example/a.png"],
            "data": {"response": {"resultUrls": ["https://nested.example/a.png"]}}
        });
        assert_eq!(result_urls(&body)?, vec!["https://nested.example/a.png"]);
        Ok(())
    }

    #[test]
    fn top_level_shape_is_recognized() -> anyhow::Result<()> {
        let body = json!({"resultUrls": ["u1", "u2"]});
        assert_eq!(result_urls(&body)?, vec!["u1", "u2"]);
        Ok(())
    }

    #[test]
    fn alternate_image_url_shapes_are_recognized() -> anyhow::Result<()> {
        assert_eq!(result_urls(&json!({"data": {"image_urls": ["a"]}}))?, vec!["a"]);
        assert_eq!(result_urls(&json!({"urls": ["b"]}))?, vec!["b"]);
        assert_eq!(
            result_urls(&json!({"response": {"image_urls": ["c"]}}))?,
            vec!["c"]
        );
        assert_eq!(
            result_urls(&json!({"data": {"response": {"image_urls": ["d"]}}}))?,
            vec!["d"]
        );
        Ok(())
    }

    #[test]
    fn blank_and_non_string_entries_are_dropped() -> anyhow::Result<()> {
        let body = json!({"data": {"response": {"resultUrls": ["", " u1 ", 3, null]}}});
        assert_eq!(result_urls(&body)?, vec!["u1"]);
        Ok(())
    }

    #[test]
    fn pending_task_with_empty_list_is_not_an_error() -> anyhow::Result<()> {
        let body = json!({"data": {"response": {"resultUrls": []}}});
        assert!(result_urls(&body)?.is_empty());
        Ok(())
    }

    #[test]
    fn unknown_shape_fails_loudly() {
        let err = result_urls(&json!({"code": 200, "data": {"status": "GENERATING"}}))
            .err()
            .map(|err| err.to_string())
            .unwrap_or_default();
        assert!(err.contains("unrecognized image status response shape"));
        assert!(err.contains("code"));
        assert!(result_urls(&json!([1, 2])).is_err());
    }
}
