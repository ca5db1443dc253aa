//! Problem model: variables, linear constraints and the objective.
//!
//! A `ProblemModel` is what the caller hands to the kernel. Variable and
//! constraint order carries no meaning; [`crate::canonical`] fixes the order
//! before anything is solved or hashed.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind tag of a problem.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    GeneralMilp,
    Scheduling,
    CompositeStructure,
    Other(String),
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::GeneralMilp => write!(f, "general_milp"),
            ModelKind::Scheduling => write!(f, "scheduling"),
            ModelKind::CompositeStructure => write!(f, "composite_structure"),
            ModelKind::Other(tag) => write!(f, "{tag}"),
        }
    }
}

impl ModelKind {
    /// Parse a kind tag as written in manifests.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "general_milp" | "milp" => ModelKind::GeneralMilp,
            "scheduling" => ModelKind::Scheduling,
            "composite_structure" => ModelKind::CompositeStructure,
            other => ModelKind::Other(other.to_string()),
        }
    }
}

/// Domain of a decision variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarType {
    Continuous,
    Integer,
    Binary,
}

impl VarType {
    /// Integer and binary variables must take integral values.
    pub fn is_integral(self) -> bool {
        matches!(self, VarType::Integer | VarType::Binary)
    }
}

/// A decision variable. `None` bounds are unbounded in that direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub var_type: VarType,
    #[serde(default)]
    pub lower: Option<f64>,
    #[serde(default)]
    pub upper: Option<f64>,
}

impl Variable {
    pub fn continuous(name: impl Into<String>, lower: Option<f64>, upper: Option<f64>) -> Self {
        Self {
            name: name.into(),
            var_type: VarType::Continuous,
            lower,
            upper,
        }
    }

    pub fn integer(name: impl Into<String>, lower: Option<f64>, upper: Option<f64>) -> Self {
        Self {
            name: name.into(),
            var_type: VarType::Integer,
            lower,
            upper,
        }
    }

    pub fn binary(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            var_type: VarType::Binary,
            lower: Some(0.0),
            upper: Some(1.0),
        }
    }
}

/// One `coef * var` term of a linear expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Term {
    pub var: String,
    pub coef: f64,
}

/// `sum(terms) + constant`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinearExpr {
    pub terms: Vec<Term>,
    #[serde(default)]
    pub constant: f64,
}

impl LinearExpr {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: append a term.
    pub fn term(mut self, var: impl Into<String>, coef: f64) -> Self {
        self.terms.push(Term {
            var: var.into(),
            coef,
        });
        self
    }

    /// Builder: set the constant offset.
    pub fn plus(mut self, constant: f64) -> Self {
        self.constant = constant;
        self
    }

    /// Evaluate against an assignment; unknown variables count as zero.
    pub fn evaluate(&self, assignment: &BTreeMap<String, f64>) -> f64 {
        self.terms.iter().fold(self.constant, |acc, t| {
            acc + t.coef * assignment.get(&t.var).copied().unwrap_or(0.0)
        })
    }
}

/// Relational operator of a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Relation {
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "=")]
    Eq,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relation::Le => write!(f, "<="),
            Relation::Ge => write!(f, ">="),
            Relation::Eq => write!(f, "="),
        }
    }
}

/// `expr <relation> rhs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub name: String,
    pub expr: LinearExpr,
    pub relation: Relation,
    pub rhs: f64,
}

impl Constraint {
    pub fn new(name: impl Into<String>, expr: LinearExpr, relation: Relation, rhs: f64) -> Self {
        Self {
            name: name.into(),
            expr,
            relation,
            rhs,
        }
    }

    /// Amount by which `assignment` violates this constraint (0 when satisfied).
    pub fn violation(&self, assignment: &BTreeMap<String, f64>) -> f64 {
        let lhs = self.expr.evaluate(assignment);
        match self.relation {
            Relation::Le => (lhs - self.rhs).max(0.0),
            Relation::Ge => (self.rhs - lhs).max(0.0),
            Relation::Eq => (lhs - self.rhs).abs(),
        }
    }
}

/// Optimization direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sense {
    Minimize,
    Maximize,
}

/// Objective function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    pub sense: Sense,
    pub expr: LinearExpr,
}

impl Objective {
    pub fn minimize(expr: LinearExpr) -> Self {
        Self {
            sense: Sense::Minimize,
            expr,
        }
    }

    pub fn maximize(expr: LinearExpr) -> Self {
        Self {
            sense: Sense::Maximize,
            expr,
        }
    }

    /// Whether objective value `a` is strictly better than `b`.
    pub fn is_better(&self, a: f64, b: f64) -> bool {
        match self.sense {
            Sense::Minimize => a < b,
            Sense::Maximize => a > b,
        }
    }
}

/// The caller-supplied decision problem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemModel {
    /// Domain-qualified, date-stamped identifier, e.g. `ops.thermal/2025-01-15`.
    pub id: String,
    pub kind: ModelKind,
    pub variables: Vec<Variable>,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    pub objective: Objective,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl ProblemModel {
    pub fn new(id: impl Into<String>, kind: ModelKind, objective: Objective) -> Self {
        Self {
            id: id.into(),
            kind,
            variables: Vec::new(),
            constraints: Vec::new(),
            objective,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_variable(mut self, variable: Variable) -> Self {
        self.variables.push(variable);
        self
    }

    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
