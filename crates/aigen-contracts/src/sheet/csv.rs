/// Splits published-sheet CSV text into rows of trimmed fields.
///
/// Only the subset the sheet export produces is understood:
/// - rows are separated by `\n` (a trailing `\r` is trimmed away with the line)
/// - `"` toggles quoted mode and is never part of the field value
/// - commas inside quotes are literal
/// - blank lines are skipped
///
/// Escaped quotes and quoted fields spanning lines are not supported.
pub fn parse_csv(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    for raw_line in text.split('\n') {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        rows.push(parse_line(line));
    }
    rows
}

fn parse_line(line: &str) -> Vec<String> {
    let mut row = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for ch in line.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                row.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    row.push(current.trim().to_string());
    row
}

#[cfg(test)]
mod tests {
    use super::parse_csv;

    #[test]
    fn quoted_commas_stay_in_one_field() {
        let rows = parse_csv("prompt,shots,ids\n\"a, b and c\",x,\"t1,t2\"\n");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], vec!["a, b and c", "x", "t1,t2"]);
    }

    #[test]
    fn blank_lines_are_skipped_and_fields_trimmed() {
        let rows = parse_csv("a , b\r\n\n   \n c,d \n");
        assert_eq!(rows, vec![vec!["a", "b"], vec!["c", "d"]]);
    }

    #[test]
    fn empty_fields_are_kept_positionally() {
        let rows = parse_csv("a,,c,");
        assert_eq!(rows, vec![vec!["a", "", "c", ""]]);
    }

    #[test]
    fn quote_characters_are_dropped() {
        let rows = parse_csv("\"[\"\"x\"\"]\",y");
        assert_eq!(rows, vec![vec!["[x]", "y"]]);
    }

    #[test]
    fn empty_input_has_no_rows() {
        assert!(parse_csv("").is_empty());
        assert!(parse_csv("\n\n").is_empty());
    }
}
