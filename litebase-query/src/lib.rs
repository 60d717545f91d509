//! # litebase-query — the predicate compiler
//!
//! Turns the URL-facing grammars and the catalog's policy expressions into
//! parameterised SQL for the embedded engine:
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`ast`] | Predicate tree, operator set, select tree, order terms |
//! | [`filter`] | `col=op.value` / logical-combinator query-string parsing |
//! | [`select`] | `select=` list parsing with aliases and embeds |
//! | [`expr`] | SQL expression tokeniser and dialect/placeholder translation |
//! | [`compile`] | Statement builders emitting `?` placeholders and quoted identifiers |
//!
//! The compiler's contract (and the system's injection defence): every
//! user-supplied scalar becomes a bound parameter. The only strings
//! concatenated into statements are quoted identifiers and policy fragments
//! that have been tokenised and re-emitted by [`expr`].

pub mod ast;
pub mod compile;
pub mod expr;
pub mod filter;
pub mod select;

pub use ast::{FilterValue, IsArg, Operator, OrderTerm, Predicate, SelectField, SelectItem};
pub use compile::{quote_ident, CompiledStatement, SqlFragment};
