use crate::http::job::JobConfigurationQuery;

pub(crate) const DSN_PROJECT_ID: &str = "$ProjectID";
pub(crate) const DSN_DATASET_ID: &str = "$DatasetID";
pub(crate) const DSN_LOCATION: &str = "$Location";

const HINT_OPEN: &str = "/*+";
const HINT_CLOSE: &str = "+*/";

/// Query hint embedded as `/*+ {...} +*/`: the full query job configuration
/// plus the `ExpandDSN` flag controlling `$ProjectID`/`$DatasetID`/`$Location`
/// substitution in the query body.
#[derive(serde::Deserialize, Debug, Default)]
pub(crate) struct QueryHint {
    #[serde(flatten)]
    pub(crate) config: JobConfigurationQuery,
    #[serde(default, rename = "ExpandDSN")]
    pub(crate) expand_dsn: bool,
}

/// Extracts the JSON body of the first `/*+ {...} +*/` block, without the
/// fences. The block must hold a JSON object: anything not brace-delimited
/// is ignored.
pub(crate) fn extract(sql: &str) -> Option<String> {
    let start = sql.find(HINT_OPEN)?;
    let end = sql[start..].find(HINT_CLOSE)? + start;
    let body = sql[start + HINT_OPEN.len()..end].trim();
    if body.starts_with('{') && body.ends_with('}') {
        Some(body.to_string())
    } else {
        None
    }
}

/// Removes exactly one hint block, preserving the surrounding text
/// character for character. SQL without a block passes through unchanged.
pub(crate) fn strip(sql: &str) -> String {
    if let Some(start) = sql.find(HINT_OPEN) {
        if let Some(end) = sql[start..].find(HINT_CLOSE) {
            let end = start + end + HINT_CLOSE.len();
            return format!("{}{}", &sql[..start], &sql[end..]);
        }
    }
    sql.to_string()
}

/// Substitutes the DSN placeholders in the query body.
pub(crate) fn expand_dsn(sql: &str, project_id: &str, dataset_id: &str, location: &str) -> String {
    sql.replace(DSN_PROJECT_ID, project_id)
        .replace(DSN_DATASET_ID, dataset_id)
        .replace(DSN_LOCATION, location)
}
