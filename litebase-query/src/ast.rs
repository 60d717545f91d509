//! The parsed shapes of the URL grammars.

/// The closed operator set of the filter grammar.
///
/// Kept a plain enum (rather than anything open-ended) so the compiler's
/// dispatch is exhaustive and every arm is testable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    Ilike,
    In,
    Is,
    /// JSON array contains.
    Cs,
    /// JSON array contained-in.
    Cd,
    /// Text search (substring containment on this engine).
    Fts,
    /// Engine-native glob pattern match.
    Match,
}

impl Operator {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "eq" => Some(Operator::Eq),
            "neq" => Some(Operator::Neq),
            "gt" => Some(Operator::Gt),
            "gte" => Some(Operator::Gte),
            "lt" => Some(Operator::Lt),
            "lte" => Some(Operator::Lte),
            "like" => Some(Operator::Like),
            "ilike" => Some(Operator::Ilike),
            "in" => Some(Operator::In),
            "is" => Some(Operator::Is),
            "cs" => Some(Operator::Cs),
            "cd" => Some(Operator::Cd),
            "fts" => Some(Operator::Fts),
            "match" => Some(Operator::Match),
            _ => None,
        }
    }
}

/// Argument of the `is` operator; never parameterised.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IsArg {
    Null,
    NotNull,
    True,
    False,
}

/// The right-hand side of a filter leaf, still in URL text form. Coercion to
/// the column's storage type happens at compile time.
#[derive(Clone, Debug, PartialEq)]
pub enum FilterValue {
    Scalar(String),
    List(Vec<String>),
    Is(IsArg),
}

/// The recursive predicate tree of one request.
#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    Leaf {
        column: String,
        op: Operator,
        value: FilterValue,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

/// One entry of the `select=` list.
#[derive(Clone, Debug, PartialEq)]
pub struct SelectItem {
    pub alias: Option<String>,
    pub field: SelectField,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SelectField {
    Column(String),
    /// `relation(col, ...)` — resolved against declared foreign keys.
    Embed {
        relation: String,
        items: Vec<SelectItem>,
    },
}

impl SelectItem {
    /// The key this item appears under in emitted JSON objects.
    pub fn output_name(&self) -> &str {
        match (&self.alias, &self.field) {
            (Some(alias), _) => alias,
            (None, SelectField::Column(name)) => name,
            (None, SelectField::Embed { relation, .. }) => relation,
        }
    }
}

/// One `order=` term.
#[derive(Clone, Debug, PartialEq)]
pub struct OrderTerm {
    pub column: String,
    pub ascending: bool,
    pub nulls_first: bool,
}

impl OrderTerm {
    /// `ASC NULLS LAST` unless the client said otherwise.
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: true,
            nulls_first: false,
        }
    }
}
