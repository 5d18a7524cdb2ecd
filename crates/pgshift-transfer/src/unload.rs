//! UNLOAD statement construction for exporting a warehouse table back into
//! the object store as gzipped JSON.
//!
//! The warehouse cannot serialize rows to JSON itself, so the SELECT inside
//! the UNLOAD builds each document by hand: one CASE expression per column,
//! concatenated into an object literal. Escape sequences in the string
//! literals below rely on the warehouse treating backslash as an escape
//! character.

use pgshift_common::RedshiftCredentials;

use crate::warehouse::ColumnInfo;

enum ColumnKind {
    Boolean,
    Numeric,
    Text,
}

fn classify(data_type: &str) -> ColumnKind {
    match data_type.to_ascii_lowercase().as_str() {
        "boolean" => ColumnKind::Boolean,
        "smallint" | "integer" | "bigint" | "numeric" | "decimal" | "real"
        | "double precision" => ColumnKind::Numeric,
        _ => ColumnKind::Text,
    }
}

/// Nested REPLACE chain turning a text column into a JSON-safe string:
/// backslashes first, then quotes, then the control characters.
fn escaped_text(ident: &str) -> String {
    let replacements: [(&str, &str); 7] = [
        (r"\\", r"\\\\"),
        (r#"""#, r#"\\""#),
        (r"\n", r"\\n"),
        (r"\t", r"\\t"),
        (r"\r", r"\\r"),
        (r"\f", r"\\f"),
        (r"\b", r"\\b"),
    ];

    let mut expr = ident.to_string();
    for (from, to) in replacements {
        expr = format!("REPLACE({expr}, '{from}', '{to}')");
    }
    expr
}

fn json_case_expression(column: &ColumnInfo) -> String {
    let name = &column.name;
    let ident = format!("\"{}\"", name.replace('"', "\"\""));

    match classify(&column.data_type) {
        ColumnKind::Boolean => format!(
            r#"CASE WHEN {ident} IS NULL THEN '"{name}": null' WHEN {ident} THEN '"{name}": true' ELSE '"{name}": false' END"#
        ),
        ColumnKind::Numeric => format!(
            r#"CASE WHEN {ident} IS NULL THEN '"{name}": null' ELSE '"{name}": ' || {ident} END"#
        ),
        ColumnKind::Text => format!(
            r#"CASE WHEN {ident} IS NULL THEN '"{name}": null' ELSE '"{name}": "' || {escaped} || '"' END"#,
            escaped = escaped_text(&ident),
        ),
    }
}

/// Destination URL for an unload: a directory-style prefix the warehouse
/// writes its numbered part files under.
pub(crate) fn unload_destination(bucket: &str, key_prefix: &str, table: &str) -> String {
    format!("s3://{bucket}/{key_prefix}{table}/")
}

pub(crate) fn unload_statement(
    table: &str,
    columns: &[ColumnInfo],
    destination: &str,
    credentials: &RedshiftCredentials,
) -> String {
    let casts: Vec<String> = columns.iter().map(json_case_expression).collect();
    let col_str = format!("'{{' || {} || '}}'", casts.join(" || ', ' || "));

    format!(
        "UNLOAD ($$SELECT {col_str} FROM {table}$$)\nTO '{destination}'\nCREDENTIALS '{creds}'\nMANIFEST GZIP ALLOWOVERWRITE",
        creds = credentials.credentials_string(),
    )
}
