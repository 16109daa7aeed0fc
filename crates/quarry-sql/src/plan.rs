//! Query plan algebra.
//!
//! A query is a pipeline of single-purpose steps; each step transforms the
//! row sequence produced by the step before it. Subqueries stay embedded as
//! opaque token slices until the executor pre-resolves them, producing a
//! resolved copy of the owning condition tree (the plan itself is never
//! mutated in place).

use serde::{Deserialize, Serialize};

use quarry_types::{ColumnType, Value};

use crate::token::Token;

//─────────────────────────────
//  Operators
//─────────────────────────────

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmpOp {
    /// `=`
    Eq,
    /// `!=` / `<>`
    Neq,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    Lte,
    /// `>=`
    Gte,
}

impl CmpOp {
    /// Parse from operator text.
    pub fn from_text(text: &str) -> Option<CmpOp> {
        match text {
            "=" => Some(CmpOp::Eq),
            "!=" | "<>" => Some(CmpOp::Neq),
            "<" => Some(CmpOp::Lt),
            ">" => Some(CmpOp::Gt),
            "<=" => Some(CmpOp::Lte),
            ">=" => Some(CmpOp::Gte),
            _ => None,
        }
    }
}

/// Binary arithmetic operators. `||` compiles to `CONCAT` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
}

//─────────────────────────────
//  Expressions
//─────────────────────────────

/// Scalar expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Literal value.
    Literal(Value),
    /// Column reference, possibly qualified (`t.col`).
    Column(String),
    /// Binary arithmetic.
    Binary {
        /// Operator.
        op: BinOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },
    /// Unary minus.
    Neg(Box<Expr>),
    /// Function call; name is stored uppercase.
    Call {
        /// Uppercase function name.
        name: String,
        /// Arguments in order.
        args: Vec<Expr>,
    },
    /// `CAST(expr AS type)`.
    Cast {
        /// Operand.
        expr: Box<Expr>,
        /// Target type.
        ty: ColumnType,
    },
    /// `CASE WHEN … THEN … [ELSE …] END` (`IIF` desugars here).
    Case {
        /// WHEN/THEN branches in order.
        branches: Vec<CaseBranch>,
        /// ELSE arm.
        otherwise: Option<Box<Expr>>,
    },
    /// Scalar subquery.
    Subquery(Subquery),
}

/// One `WHEN cond THEN expr` arm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseBranch {
    /// Branch condition.
    pub when: Condition,
    /// Result when the condition holds.
    pub then: Expr,
}

/// Embedded subquery: owned token slice plus the annotation the executor
/// attaches after pre-evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subquery {
    /// The subquery's SELECT tokens (without the wrapping parentheses).
    pub tokens: Vec<Token>,
    /// Pre-evaluation result; `None` until the executor resolves it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved: Option<ResolvedSubquery>,
}

impl Subquery {
    /// Wrap a token slice, unresolved.
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, resolved: None }
    }
}

/// Pre-evaluated subquery result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResolvedSubquery {
    /// First column of the first row (scalar position).
    Scalar(Value),
    /// First-column values of every row (`IN` position).
    Rows(Vec<Value>),
    /// Row-existence (`EXISTS` position).
    Exists(bool),
}

//─────────────────────────────
//  Conditions
//─────────────────────────────

/// WHERE/HAVING/ON condition tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Condition {
    /// Conjunction.
    And(Vec<Condition>),
    /// Disjunction.
    Or(Vec<Condition>),
    /// Negation.
    Not(Box<Condition>),
    /// Bare column against a literal. The general shape below subsumes
    /// this; it is kept as its own variant because the index rewrite keys
    /// off it.
    Simple {
        /// Column reference.
        column: String,
        /// Operator.
        op: CmpOp,
        /// Literal right-hand side.
        value: Value,
    },
    /// General comparison between two expressions.
    Cmp {
        /// Left expression.
        left: Expr,
        /// Operator.
        op: CmpOp,
        /// Right expression.
        right: Expr,
    },
    /// `expr IS [NOT] NULL`.
    IsNull {
        /// Tested expression.
        expr: Expr,
        /// `IS NOT NULL` when true.
        negated: bool,
    },
    /// `expr [NOT] IN (item, …)`.
    InList {
        /// Tested expression.
        expr: Expr,
        /// List items.
        items: Vec<Expr>,
        /// `NOT IN` when true.
        negated: bool,
    },
    /// `expr [NOT] IN (SELECT …)`.
    InSubquery {
        /// Tested expression.
        expr: Expr,
        /// The subquery.
        subquery: Subquery,
        /// `NOT IN` when true.
        negated: bool,
    },
    /// `expr [NOT] LIKE/ILIKE pattern`.
    Like {
        /// Tested expression.
        expr: Expr,
        /// Pattern expression (`%`/`_` wildcards).
        pattern: Expr,
        /// `ILIKE` when true.
        case_insensitive: bool,
        /// `NOT LIKE` when true.
        negated: bool,
    },
    /// `[NOT] EXISTS (SELECT …)`.
    Exists {
        /// The subquery.
        subquery: Subquery,
        /// `NOT EXISTS` when true.
        negated: bool,
    },
}

//─────────────────────────────
//  Step parameters
//─────────────────────────────

/// Join flavors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinKind {
    /// Matched pairs only.
    Inner,
    /// Unmatched left rows null-filled.
    Left,
    /// Unmatched right rows null-filled.
    Right,
    /// Both sides null-filled.
    Full,
    /// Cartesian product.
    Cross,
}

/// One equality predicate of a join's ON clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinOn {
    /// Left column reference (usually qualified).
    pub left: String,
    /// Right column reference.
    pub right: String,
}

/// One ORDER BY key. Numeric select-column references are resolved to the
/// named output column at parse time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderKey {
    /// Output column to sort by.
    pub column: String,
    /// Descending when true.
    pub desc: bool,
    /// Explicit NULLS FIRST/LAST; default is NULLS LAST.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nulls_first: Option<bool>,
}

/// Aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggFunc {
    /// `COUNT(*)` / `COUNT(col)`.
    Count,
    /// `SUM`.
    Sum,
    /// `AVG`.
    Avg,
    /// `MIN`.
    Min,
    /// `MAX`.
    Max,
    /// `GROUP_CONCAT`.
    GroupConcat,
}

impl AggFunc {
    /// Uppercase textual name.
    pub fn name(&self) -> &'static str {
        match self {
            AggFunc::Count => "COUNT",
            AggFunc::Sum => "SUM",
            AggFunc::Avg => "AVG",
            AggFunc::Min => "MIN",
            AggFunc::Max => "MAX",
            AggFunc::GroupConcat => "GROUP_CONCAT",
        }
    }

    /// Classify an uppercase function name.
    pub fn from_name(name: &str) -> Option<AggFunc> {
        match name {
            "COUNT" => Some(AggFunc::Count),
            "SUM" => Some(AggFunc::Sum),
            "AVG" => Some(AggFunc::Avg),
            "MIN" => Some(AggFunc::Min),
            "MAX" => Some(AggFunc::Max),
            "GROUP_CONCAT" => Some(AggFunc::GroupConcat),
            _ => None,
        }
    }
}

/// One aggregate computed by an `aggregate` step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggSpec {
    /// Function.
    pub func: AggFunc,
    /// Argument; `None` for `COUNT(*)`.
    pub arg: Option<Expr>,
    /// `COUNT(DISTINCT col)`.
    pub distinct: bool,
    /// Output key for the result.
    pub alias: String,
    /// Uppercase textual form (`SUM(amount)`) written as the synthetic key
    /// so HAVING can reference the aggregate by spelling.
    pub display: String,
    /// `GROUP_CONCAT` separator; default `,`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separator: Option<String>,
}

/// Window functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WinFunc {
    /// Position within the partition.
    RowNumber,
    /// Rank with gaps.
    Rank,
    /// Rank without gaps.
    DenseRank,
    /// Partition-wide sum.
    Sum,
    /// Partition-wide average.
    Avg,
    /// Partition-wide count.
    Count,
    /// Partition-wide minimum.
    Min,
    /// Partition-wide maximum.
    Max,
}

impl WinFunc {
    /// Classify an uppercase function name.
    pub fn from_name(name: &str) -> Option<WinFunc> {
        match name {
            "ROW_NUMBER" => Some(WinFunc::RowNumber),
            "RANK" => Some(WinFunc::Rank),
            "DENSE_RANK" => Some(WinFunc::DenseRank),
            "SUM" => Some(WinFunc::Sum),
            "AVG" => Some(WinFunc::Avg),
            "COUNT" => Some(WinFunc::Count),
            "MIN" => Some(WinFunc::Min),
            "MAX" => Some(WinFunc::Max),
            _ => None,
        }
    }
}

/// One window function computed by a `window` step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WinSpec {
    /// Function.
    pub func: WinFunc,
    /// Argument for the aggregate flavors.
    pub arg: Option<Expr>,
    /// PARTITION BY columns.
    pub partition_by: Vec<String>,
    /// Window ORDER BY keys.
    pub order_by: Vec<OrderKey>,
    /// Output key for the per-row value.
    pub alias: String,
}

/// One output column of a `project` step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProjColumn {
    /// `*`: every key of the row.
    Star,
    /// Column reference; qualified dot-notation is stripped for the output
    /// key unless an alias overrides it.
    Column {
        /// Source column reference.
        name: String,
        /// Output alias.
        alias: Option<String>,
    },
    /// Computed expression under a mandatory alias.
    Expr {
        /// Expression.
        expr: Expr,
        /// Output key.
        alias: String,
    },
}

/// Set operations composing two pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SetOpKind {
    /// Concatenation.
    Union,
    /// Difference.
    Except,
    /// Intersection.
    Intersect,
}

/// Index comparison ops for `index_scan`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexOp {
    /// Key equals.
    Eq,
    /// Key differs.
    Neq,
    /// Key greater.
    Gt,
    /// Key less.
    Lt,
    /// Key greater-or-equal.
    Gte,
    /// Key less-or-equal.
    Lte,
    /// Closed range.
    Range,
}

//─────────────────────────────
//  Pipeline
//─────────────────────────────

/// One step of a query pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlanStep {
    /// Single empty row (`SELECT expr` without FROM).
    VirtualRow,
    /// All rows of a table (or CTE overlay) in ref order.
    TableScan {
        /// Table or CTE name.
        table: String,
        /// FROM alias.
        alias: Option<String>,
    },
    /// Rows produced by a nested pipeline (derived table).
    DerivedScan {
        /// Nested plan.
        plan: Box<QueryPlan>,
        /// Mandatory alias.
        alias: String,
    },
    /// Rows reached through a flat index.
    IndexScan {
        /// Table name.
        table: String,
        /// Index name.
        index: String,
        /// Comparison against entry keys.
        op: IndexOp,
        /// Comparison key (range low bound).
        key: Value,
        /// Range high bound.
        high: Option<Value>,
    },
    /// Retain rows satisfying a condition.
    Filter {
        /// Condition tree.
        cond: Condition,
    },
    /// Project each row to the requested output columns.
    Project {
        /// Output columns.
        columns: Vec<ProjColumn>,
    },
    /// Stable multi-key sort.
    OrderBy {
        /// Sort keys, most significant first.
        keys: Vec<OrderKey>,
    },
    /// Slice by offset and limit.
    Limit {
        /// Max rows; `None` = unbounded.
        limit: Option<i64>,
        /// Rows to skip.
        offset: i64,
    },
    /// Deduplicate by canonical row (or by named columns).
    Distinct {
        /// Restrict the key to these columns.
        columns: Option<Vec<String>>,
    },
    /// Partition by GROUP BY keys and fold aggregates.
    Aggregate {
        /// Grouping columns; empty = one group.
        group_by: Vec<String>,
        /// Aggregates to compute.
        aggs: Vec<AggSpec>,
    },
    /// Assign per-row window function values.
    Window {
        /// Window functions to compute.
        funcs: Vec<WinSpec>,
    },
    /// Join the current rows against another table.
    Join {
        /// Flavor.
        kind: JoinKind,
        /// Right-side table (or CTE) name.
        table: String,
        /// Right-side alias.
        alias: Option<String>,
        /// Equality predicates; `None` = cartesian.
        on: Option<Vec<JoinOn>>,
    },
    /// Compose with another pipeline by set semantics.
    SetOp {
        /// union / except / intersect.
        op: SetOpKind,
        /// Keep duplicates (`ALL`).
        all: bool,
        /// Right-side plan.
        right: Box<QueryPlan>,
    },
}

/// A common table expression carried alongside a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cte {
    /// CTE name.
    pub name: String,
    /// Declared column names (may be empty).
    pub columns: Vec<String>,
    /// The CTE body tokens (a SELECT, possibly with a top-level UNION for
    /// the recursive form).
    pub tokens: Vec<Token>,
    /// `WITH RECURSIVE`.
    pub recursive: bool,
}

/// An executable query: pipeline plus the CTEs in scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPlan {
    /// Steps in execution order.
    pub pipeline: Vec<PlanStep>,
    /// CTEs visible to scans inside the pipeline.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ctes: Vec<Cte>,
}

impl QueryPlan {
    /// Find a CTE by name.
    pub fn cte(&self, name: &str) -> Option<&Cte> {
        self.ctes.iter().find(|c| c.name == name)
    }
}
