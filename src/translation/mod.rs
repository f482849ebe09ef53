use std::borrow::Cow;

mod parsers;
mod scanner;

use parsers::{
    is_block_comment_end, is_block_comment_start, is_cast, is_line_comment_start, matches_tag,
    try_start_dollar_quote,
};
use scanner::{State, scan_bind_name};

use crate::error::SqlWarehouseError;
use crate::types::RowValues;

/// SQL rewritten from `:name` binds to `$n`, plus the bind names in `$n` order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedBinds<'a> {
    pub sql: Cow<'a, str>,
    pub names: Vec<String>,
}

/// Rewrite `:name` binds to Postgres `$n` placeholders.
///
/// Repeated names share one index. Quoted strings, quoted identifiers, comments,
/// dollar-quoted blocks and `::` casts are left alone, as is a colon glued to a preceding
/// identifier character (`arr[lo:hi]`). Returns a borrowed `Cow` when there are no binds.
///
/// ```rust
/// use sql_warehouse::translation::translate_named_binds;
///
/// let binds = translate_named_binds("select :id::text, ':x' where b = :name or a = :id");
/// assert_eq!(binds.sql, "select $1::text, ':x' where b = $2 or a = $1");
/// assert_eq!(binds.names, vec!["id", "name"]);
/// ```
#[must_use]
pub fn translate_named_binds(sql: &str) -> NamedBinds<'_> {
    let bytes = sql.as_bytes();
    let mut names: Vec<String> = Vec::new();
    let mut out: Option<String> = None;
    let mut copied = 0;
    let mut state = State::Normal;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                _ if is_line_comment_start(bytes, idx) => {
                    state = State::LineComment;
                    idx += 1;
                }
                _ if is_block_comment_start(bytes, idx) => {
                    state = State::BlockComment(1);
                    idx += 1;
                }
                b'$' => {
                    if let Some((tag, close)) = try_start_dollar_quote(bytes, idx) {
                        state = State::DollarQuoted(tag);
                        idx = close;
                    }
                }
                _ if is_cast(bytes, idx) => idx += 1,
                b':' if !follows_identifier(bytes, idx) => {
                    if let Some((end, name)) = scan_bind_name(bytes, idx + 1) {
                        let position = match names.iter().position(|n| n == name) {
                            Some(existing) => existing + 1,
                            None => {
                                names.push(name.to_string());
                                names.len()
                            }
                        };
                        let buf = out.get_or_insert_with(|| String::with_capacity(sql.len()));
                        buf.push_str(&sql[copied..idx]);
                        buf.push('$');
                        buf.push_str(&position.to_string());
                        copied = end;
                        idx = end;
                        continue;
                    }
                }
                _ => {}
            },
            State::SingleQuoted => {
                if b == b'\'' {
                    if bytes.get(idx + 1) == Some(&b'\'') {
                        idx += 1; // escaped quote
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::DoubleQuoted => {
                if b == b'"' {
                    if bytes.get(idx + 1) == Some(&b'"') {
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment(depth) => {
                if is_block_comment_start(bytes, idx) {
                    state = State::BlockComment(depth + 1);
                    idx += 1;
                } else if is_block_comment_end(bytes, idx) {
                    state = if depth == 1 {
                        State::Normal
                    } else {
                        State::BlockComment(depth - 1)
                    };
                    idx += 1;
                }
            }
            State::DollarQuoted(ref tag) => {
                if b == b'$' && matches_tag(bytes, idx, tag) {
                    idx += tag.len() + 1;
                    state = State::Normal;
                }
            }
        }
        idx += 1;
    }

    let sql = match out {
        Some(mut buf) => {
            buf.push_str(&sql[copied..]);
            Cow::Owned(buf)
        }
        None => Cow::Borrowed(sql),
    };
    NamedBinds { sql, names }
}

fn follows_identifier(bytes: &[u8], idx: usize) -> bool {
    idx > 0 && (bytes[idx - 1].is_ascii_alphanumeric() || bytes[idx - 1] == b'_')
}

/// Order named values to match `names`. Extra values are ignored.
///
/// # Errors
/// Returns `ParameterError` for a bind name with no value.
pub fn bind_named(
    names: &[String],
    params: &[(String, RowValues)],
) -> Result<Vec<RowValues>, SqlWarehouseError> {
    names
        .iter()
        .map(|name| {
            params
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.clone())
                .ok_or_else(|| {
                    SqlWarehouseError::ParameterError(format!("no value bound for ':{name}'"))
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_binds_in_first_seen_order() {
        let res = translate_named_binds("insert into t (a, b) values (:a, :b)");
        assert_eq!(res.sql, "insert into t (a, b) values ($1, $2)");
        assert_eq!(res.names, vec!["a", "b"]);
    }

    #[test]
    fn skips_inside_literals_and_comments() {
        let sql = "select ':a', \":b\", :c -- :d\n/* :e /* :f */ */ from t where x = :c";
        let res = translate_named_binds(sql);
        assert_eq!(
            res.sql,
            "select ':a', \":b\", $1 -- :d\n/* :e /* :f */ */ from t where x = $1"
        );
        assert_eq!(res.names, vec!["c"]);
    }

    #[test]
    fn skips_dollar_quoted_blocks_and_casts() {
        let sql = "$fn$ select :a $fn$ where a = :a::int and b = arr[lo:hi] and c := 1";
        let res = translate_named_binds(sql);
        assert_eq!(
            res.sql,
            "$fn$ select :a $fn$ where a = $1::int and b = arr[lo:hi] and c := 1"
        );
    }

    #[test]
    fn keeps_multibyte_text_intact() {
        let res = translate_named_binds("select 'é' as x, :naïve_is_not_ascii, :ok");
        assert_eq!(res.sql, "select 'é' as x, $1ïve_is_not_ascii, $2");
        assert_eq!(res.names, vec!["na", "ok"]);
    }

    #[test]
    fn borrows_when_nothing_to_rewrite() {
        let res = translate_named_binds("select 1::int");
        assert!(matches!(res.sql, Cow::Borrowed(_)));
        assert!(res.names.is_empty());
    }

    #[test]
    fn binds_values_by_name() {
        let names = vec!["b".to_string(), "a".to_string()];
        let params = vec![
            ("a".to_string(), RowValues::Int(1)),
            ("b".to_string(), RowValues::Int(2)),
            ("unused".to_string(), RowValues::Null),
        ];
        assert_eq!(
            bind_named(&names, &params).unwrap(),
            vec![RowValues::Int(2), RowValues::Int(1)]
        );
        assert!(bind_named(&["zzz".to_string()], &params).is_err());
    }
}
