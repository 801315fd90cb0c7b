use crate::error::Error;
use crate::ingestion::{Destination, Ingestion, Kind};

/// Parses one LOAD/STREAM statement:
///
/// ```text
/// LOAD 'Reader:<format>:<readerID>' DATA INTO TABLE <dest>
/// STREAM 'Reader:<insertIdField>:<format>:<readerID>' DATA INTO TABLE <dest>
/// ```
///
/// Keywords are case-insensitive. Whitespace between tokens is required and
/// may be repeated; leading whitespace before the kind keyword is rejected,
/// trailing whitespace is tolerated. No whitespace is tolerated around the
/// separators inside the quoted reader body; the readerID is taken verbatim.
pub fn parse(sql: &str) -> Result<Ingestion, Error> {
    let mut cursor = Cursor::new(sql);

    let kind = if cursor.match_keyword("LOAD") {
        Kind::Load
    } else if cursor.match_keyword("STREAM") {
        Kind::Stream
    } else {
        return Err(cursor.expected("LOAD|STREAM"));
    };

    if !cursor.match_whitespace() {
        return Err(cursor.expected("WHITESPACE"));
    }

    let body = match cursor.match_quoted() {
        Some(body) => body,
        None => return Err(cursor.expected("READER OPTIONS")),
    };
    let (insert_id_field, format, reader_id) = decode_reader_body(body, kind)?;

    if !cursor.match_whitespace() {
        return Err(cursor.expected("WHITESPACE"));
    }

    if !cursor.match_spaced_fragment(&["DATA", "INTO", "TABLE"]) {
        return Err(cursor.expected("DATA INTO TABLE"));
    }

    if !cursor.match_whitespace() {
        return Err(cursor.expected("WHITESPACE"));
    }

    let destination_text = match cursor.match_selector() {
        Some(text) => text,
        None => return Err(cursor.expected("DESTINATION")),
    };
    let destination = decode_destination(destination_text)?;

    cursor.match_whitespace();
    if cursor.has_more() {
        return Err(Error::Parse(format!("unexpected sequence: {}", cursor.remainder())));
    }

    Ok(Ingestion {
        kind,
        format,
        insert_id_field,
        reader_id,
        destination,
        hint: String::new(),
    })
}

/// Splits the quoted reader body into its colon-separated elements. The
/// STREAM form carries an extra insert-id element that may be empty.
fn decode_reader_body(body: &str, kind: Kind) -> Result<(String, String, String), Error> {
    let parts_wanted = match kind {
        Kind::Load => 3,
        Kind::Stream => 4,
    };
    let parts: Vec<&str> = body.splitn(parts_wanted, ':').collect();
    if parts.len() != parts_wanted {
        return Err(Error::Parse(format!(
            "failed to split reader options: {body}, supported: ['Reader:<format>:<readerID>' | 'Reader:<insertIdField>:<format>:<readerID>']"
        )));
    }

    if !parts[0].eq_ignore_ascii_case("Reader") {
        return Err(Error::Parse(format!(
            "expected Reader keyword, current token: {}",
            parts[0]
        )));
    }

    let (insert_id_field, format, reader_id) = match kind {
        Kind::Load => (String::new(), parts[1], parts[2]),
        Kind::Stream => (parts[1].to_string(), parts[2], parts[3]),
    };

    let format_allowed = match kind {
        Kind::Load => {
            format.eq_ignore_ascii_case("CSV") || format.eq_ignore_ascii_case("JSON") || format.eq_ignore_ascii_case("PARQUET")
        }
        Kind::Stream => format.eq_ignore_ascii_case("JSON"),
    };
    if !format_allowed {
        return Err(Error::Parse(format!(
            "expected data format CSV|JSON|PARQUET, current token: {format}"
        )));
    }

    Ok((insert_id_field, format.to_string(), reader_id.to_string()))
}

fn decode_destination(text: &str) -> Result<Destination, Error> {
    let parts: Vec<&str> = text.splitn(3, '.').collect();
    let mut destination = Destination::default();
    match parts.as_slice() {
        [project_id, dataset_id, table_id] => {
            destination.project_id = project_id.to_string();
            destination.dataset_id = dataset_id.to_string();
            destination.table_id = table_id.to_string();
        }
        [dataset_id, table_id] => {
            destination.dataset_id = dataset_id.to_string();
            destination.table_id = table_id.to_string();
        }
        [table_id] => {
            destination.table_id = table_id.to_string();
        }
        _ => return Err(Error::Parse(format!("failed to split destination: {text}"))),
    }

    if !is_valid_selector(&destination.table_id) {
        return Err(Error::Parse(format!("invalid table: {}", destination.table_id)));
    }
    if !destination.dataset_id.is_empty() && !is_valid_selector(&destination.dataset_id) {
        return Err(Error::Parse(format!("invalid dataset: {}", destination.dataset_id)));
    }
    if !destination.project_id.is_empty() && !is_valid_selector(&destination.project_id) {
        return Err(Error::Parse(format!("invalid project: {}", destination.project_id)));
    }
    Ok(destination)
}

fn is_valid_selector(id: &str) -> bool {
    Cursor::new(id).match_selector().is_some()
}

/// Byte cursor with the handful of matchers the grammar needs.
struct Cursor<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn bytes(&self) -> &'a [u8] {
        self.input.as_bytes()
    }

    fn has_more(&self) -> bool {
        self.pos < self.input.len()
    }

    fn remainder(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn expected(&self, token: &str) -> Error {
        Error::Parse(format!("expected {token}, current token: {}", self.remainder()))
    }

    /// Consumes one or more whitespace bytes.
    fn match_whitespace(&mut self) -> bool {
        let start = self.pos;
        let bytes = self.bytes();
        while self.pos < bytes.len() && bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
        self.pos > start
    }

    /// Consumes a case-insensitive ASCII literal.
    fn match_keyword(&mut self, keyword: &str) -> bool {
        let bytes = self.bytes();
        let end = self.pos + keyword.len();
        if end <= bytes.len() && bytes[self.pos..end].eq_ignore_ascii_case(keyword.as_bytes()) {
            self.pos = end;
            return true;
        }
        false
    }

    /// Consumes keywords separated by required (repeatable) whitespace.
    fn match_spaced_fragment(&mut self, words: &[&str]) -> bool {
        let start = self.pos;
        for (i, word) in words.iter().enumerate() {
            if i > 0 && !self.match_whitespace() {
                self.pos = start;
                return false;
            }
            if !self.match_keyword(word) {
                self.pos = start;
                return false;
            }
        }
        true
    }

    /// Consumes a single-quoted block; `\'` escapes a quote inside the body.
    /// Returns the body without the surrounding quotes, escapes intact.
    fn match_quoted(&mut self) -> Option<&'a str> {
        let bytes = self.bytes();
        if self.pos >= bytes.len() || bytes[self.pos] != b'\'' {
            return None;
        }
        let body_start = self.pos + 1;
        let mut i = body_start;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' if i + 1 < bytes.len() => i += 2,
                b'\'' => {
                    self.pos = i + 1;
                    return Some(&self.input[body_start..i]);
                }
                _ => i += 1,
            }
        }
        None
    }

    /// Consumes a destination selector: a letter or a bracket/backtick quoted
    /// block first, then letters, digits and `_ . : -`. A digit at the
    /// leading position does not match.
    fn match_selector(&mut self) -> Option<&'a str> {
        let bytes = self.bytes();
        let start = self.pos;
        if self.pos >= bytes.len() {
            return None;
        }
        match bytes[self.pos] {
            b if b.is_ascii_alphabetic() => self.pos += 1,
            b'[' => {
                let close = bytes[self.pos + 1..].iter().position(|b| *b == b']')?;
                self.pos += close + 2;
            }
            b'`' => {
                let close = bytes[self.pos + 1..].iter().position(|b| *b == b'`')?;
                self.pos += close + 2;
            }
            _ => return None,
        }
        while self.pos < bytes.len() {
            match bytes[self.pos] {
                b'0'..=b'9' | b'_' | b'.' | b':' | b'-' => self.pos += 1,
                b if b.is_ascii_alphabetic() => self.pos += 1,
                _ => break,
            }
        }
        Some(&self.input[start..self.pos])
    }
}

#[cfg(test)]
mod tests {
    use super::parse;
    use crate::ingestion::{Destination, Kind};

    #[test]
    fn test_load_with_absolute_destination() {
        let ingestion = parse("LOAD 'Reader:csv:123e4567-e89b-12d3-a456-426614174012' DATA INTO TABLE project.set.table").unwrap();
        assert_eq!(ingestion.kind, Kind::Load);
        assert_eq!(ingestion.format, "csv");
        assert_eq!(ingestion.reader_id, "123e4567-e89b-12d3-a456-426614174012");
        assert_eq!(
            ingestion.destination,
            Destination {
                project_id: "project".to_string(),
                dataset_id: "set".to_string(),
                table_id: "table".to_string(),
            }
        );
    }

    #[test]
    fn test_case_insensitive_keywords() {
        let upper = parse("LOAD 'READER:CSV:ABC' DATA INTO TABLE PROJECT.SET.T").unwrap();
        assert_eq!(upper.format, "CSV");
        assert_eq!(upper.reader_id, "ABC");

        let lower = parse("load 'reader:csv:abc' data into table project.set.t").unwrap();
        assert_eq!(lower.format, "csv");
        assert_eq!(lower.destination.table_id, "t");
    }

    #[test]
    fn test_relative_destinations() {
        let ingestion = parse("LOAD 'Reader:json:r1' DATA INTO TABLE set.table").unwrap();
        assert_eq!(ingestion.destination.project_id, "");
        assert_eq!(ingestion.destination.dataset_id, "set");
        assert_eq!(ingestion.destination.table_id, "table");

        let ingestion = parse("LOAD 'Reader:json:r1' DATA INTO TABLE table").unwrap();
        assert_eq!(ingestion.destination.dataset_id, "");
        assert_eq!(ingestion.destination.table_id, "table");
    }

    #[test]
    fn test_stream_with_insert_id_field() {
        let ingestion = parse("STREAM 'Reader:ID:json:123' DATA INTO TABLE ingestion_case_001").unwrap();
        assert_eq!(ingestion.kind, Kind::Stream);
        assert_eq!(ingestion.insert_id_field, "ID");
        assert_eq!(ingestion.format, "json");
        assert_eq!(ingestion.reader_id, "123");
    }

    #[test]
    fn test_stream_with_empty_insert_id_field() {
        let ingestion = parse("STREAM 'Reader::json:123' DATA INTO TABLE t1").unwrap();
        assert_eq!(ingestion.insert_id_field, "");
        assert_eq!(ingestion.format, "json");
    }

    #[test]
    fn test_leading_whitespace_rejected() {
        assert!(parse(" LOAD 'Reader:csv:r1' DATA INTO TABLE t").is_err());
    }

    #[test]
    fn test_missing_whitespace_rejected() {
        assert!(parse("LOAD'Reader:csv:r1' DATA INTO TABLE t").is_err());
        assert!(parse("LOAD 'Reader:csv:r1'DATA INTO TABLE t").is_err());
        assert!(parse("LOAD 'Reader:csv:r1' DATA INTO TABLEt").is_err());
    }

    #[test]
    fn test_whitespace_in_reader_body_rejected() {
        assert!(parse("LOAD ' Reader:csv:r1' DATA INTO TABLE t").is_err());
        assert!(parse("LOAD 'Reader :csv:r1' DATA INTO TABLE t").is_err());
        assert!(parse("LOAD 'Reader: csv:r1' DATA INTO TABLE t").is_err());
        assert!(parse("LOAD 'Reader:csv :r1' DATA INTO TABLE t").is_err());
    }

    #[test]
    fn test_whitespace_in_reader_id_tolerated() {
        let ingestion = parse("LOAD 'Reader:csv: r1' DATA INTO TABLE t").unwrap();
        assert_eq!(ingestion.reader_id, " r1");
    }

    #[test]
    fn test_repeated_internal_whitespace_tolerated() {
        let ingestion = parse("LOAD  'Reader:csv:r1'  DATA  INTO  TABLE  project.set.table  ").unwrap();
        assert_eq!(ingestion.destination.table_id, "table");
    }

    #[test]
    fn test_digit_leading_destination_segment_rejected() {
        assert!(parse("LOAD 'Reader:csv:r1' DATA INTO TABLE project.9set.table").is_err());
        assert!(parse("LOAD 'Reader:csv:r1' DATA INTO TABLE 9table").is_err());
    }

    #[test]
    fn test_quoted_destination_segments() {
        let ingestion = parse("LOAD 'Reader:csv:r1' DATA INTO TABLE `project`.set.table").unwrap();
        assert_eq!(ingestion.destination.project_id, "`project`");

        let ingestion = parse("LOAD 'Reader:csv:r1' DATA INTO TABLE [project].set.table").unwrap();
        assert_eq!(ingestion.destination.project_id, "[project]");
    }

    #[test]
    fn test_trailing_garbage_rejected() {
        assert!(parse("LOAD 'Reader:csv:r1' DATA INTO TABLE t extra").is_err());
        assert!(parse("LOAD 'Reader:csv:r1' DATA INTO TABLE t;").is_err());
    }

    #[test]
    fn test_unknown_format_rejected() {
        assert!(parse("LOAD 'Reader:avro:r1' DATA INTO TABLE t").is_err());
        // STREAM restricts the format to JSON
        assert!(parse("STREAM 'Reader::csv:r1' DATA INTO TABLE t").is_err());
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let err = parse("COPY 'Reader:csv:r1' DATA INTO TABLE t").unwrap_err();
        assert!(err.to_string().contains("LOAD|STREAM"), "{err}");
    }

    #[test]
    fn test_escaped_quote_in_body() {
        let ingestion = parse(r"LOAD 'Reader:csv:id\'1' DATA INTO TABLE t").unwrap();
        assert_eq!(ingestion.reader_id, r"id\'1");
    }
}
