//! SQL expression tokenisation and lexical translation.
//!
//! Policy expressions and RPC bodies are authored in a Postgres-flavoured
//! dialect and arrive here as opaque strings. Translation is a token walk,
//! never a regex: string literals pass through untouched, so a policy like
//! `note <> 'call now()'` keeps its literal while a bare `now()` becomes the
//! engine's clock expression. Session placeholders (`auth.uid()`,
//! `auth.role()`) and named row/argument references become bound parameters.

use std::collections::HashMap;

use litebase_catalog::schema::{ENGINE_NOW_EXPR, ENGINE_UUID_EXPR};
use litebase_catalog::SqlValue;
use litebase_core::ApiError;
use litebase_security::Principal;

use crate::compile::SqlFragment;

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Ident(String),
    Number(String),
    /// Full lexeme including the surrounding single quotes.
    Str(String),
    /// Operator or punctuation, one or two characters.
    Op(String),
}

fn tokenize(expr: &str) -> Result<Vec<Token>, ApiError> {
    let bytes = expr.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0usize;
    while i < bytes.len() {
        let c = bytes[i] as char;
        if c.is_ascii_whitespace() {
            i += 1;
        } else if c == '\'' {
            let start = i;
            i += 1;
            loop {
                match bytes.get(i) {
                    Some(b'\'') if bytes.get(i + 1) == Some(&b'\'') => i += 2,
                    Some(b'\'') => {
                        i += 1;
                        break;
                    }
                    Some(_) => i += 1,
                    None => {
                        return Err(ApiError::validation(format!(
                            "unterminated string literal in expression: {expr}"
                        )))
                    }
                }
            }
            tokens.push(Token::Str(expr[start..i].to_string()));
        } else if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < bytes.len()
                && ((bytes[i] as char).is_ascii_alphanumeric() || bytes[i] == b'_')
            {
                i += 1;
            }
            tokens.push(Token::Ident(expr[start..i].to_string()));
        } else if c.is_ascii_digit() {
            let start = i;
            while i < bytes.len()
                && ((bytes[i] as char).is_ascii_digit() || bytes[i] == b'.')
            {
                i += 1;
            }
            tokens.push(Token::Number(expr[start..i].to_string()));
        } else {
            let two = expr.get(i..i + 2).unwrap_or_default();
            if matches!(two, ">=" | "<=" | "<>" | "!=" | "||") {
                tokens.push(Token::Op(two.to_string()));
                i += 2;
            } else {
                tokens.push(Token::Op(c.to_string()));
                i += 1;
            }
        }
    }
    Ok(tokens)
}

fn is_op(token: Option<&Token>, op: &str) -> bool {
    matches!(token, Some(Token::Op(o)) if o == op)
}

/// Translate one expression to engine dialect, producing SQL plus the bound
/// parameters created by substitution.
///
/// `named` maps bare identifiers (row columns for WITH CHECK probes, argument
/// names for RPC bodies) to the values they should bind; pass an empty map
/// for USING expressions, whose column references must survive as column
/// references.
pub fn translate_expr(
    expr: &str,
    principal: &Principal,
    named: &HashMap<String, SqlValue>,
) -> Result<SqlFragment, ApiError> {
    let tokens = tokenize(expr)?;
    let mut sql: Vec<String> = Vec::with_capacity(tokens.len());
    let mut params: Vec<SqlValue> = Vec::new();
    let mut i = 0usize;

    while i < tokens.len() {
        match &tokens[i] {
            Token::Ident(name) if name == "auth" && is_op(tokens.get(i + 1), ".") => {
                let func = match tokens.get(i + 2) {
                    Some(Token::Ident(f))
                        if is_op(tokens.get(i + 3), "(") && is_op(tokens.get(i + 4), ")") =>
                    {
                        f.as_str()
                    }
                    _ => {
                        return Err(ApiError::validation(format!(
                            "malformed auth reference in expression: {expr}"
                        )))
                    }
                };
                match func {
                    "uid" => {
                        sql.push("?".into());
                        params.push(match principal.uid() {
                            Some(uid) => SqlValue::Text(uid.to_string()),
                            None => SqlValue::Null,
                        });
                    }
                    "role" => {
                        sql.push("?".into());
                        params.push(SqlValue::Text(principal.role().as_str().to_string()));
                    }
                    other => {
                        return Err(ApiError::validation(format!(
                            "unsupported auth function: auth.{other}()"
                        )))
                    }
                }
                i += 5;
            }
            Token::Ident(name)
                if name.eq_ignore_ascii_case("now")
                    && is_op(tokens.get(i + 1), "(")
                    && is_op(tokens.get(i + 2), ")") =>
            {
                sql.push(ENGINE_NOW_EXPR.into());
                i += 3;
            }
            Token::Ident(name)
                if name.eq_ignore_ascii_case("gen_random_uuid")
                    && is_op(tokens.get(i + 1), "(")
                    && is_op(tokens.get(i + 2), ")") =>
            {
                sql.push(ENGINE_UUID_EXPR.into());
                i += 3;
            }
            Token::Ident(name) if name.eq_ignore_ascii_case("true") => {
                sql.push("1".into());
                i += 1;
            }
            Token::Ident(name) if name.eq_ignore_ascii_case("false") => {
                sql.push("0".into());
                i += 1;
            }
            Token::Ident(name)
                if named.contains_key(name.as_str())
                    && !is_op(tokens.get(i + 1), "(")
                    && (i == 0 || !is_op(tokens.get(i - 1), ".")) =>
            {
                sql.push("?".into());
                params.push(named[name.as_str()].clone());
                i += 1;
            }
            Token::Ident(name) => {
                sql.push(name.clone());
                i += 1;
            }
            Token::Number(n) => {
                sql.push(n.clone());
                i += 1;
            }
            Token::Str(s) => {
                sql.push(s.clone());
                i += 1;
            }
            Token::Op(o) => {
                sql.push(o.clone());
                i += 1;
            }
        }
    }

    Ok(SqlFragment {
        sql: sql.join(" "),
        params,
    })
}
