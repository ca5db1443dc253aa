//! Model canonicalization.
//!
//! [`canonicalize`] turns a caller-supplied [`ProblemModel`] into a
//! [`CanonicalModel`]: variables and constraints sorted by name, duplicate
//! terms merged, zero coefficients dropped, constants folded into right-hand
//! sides and every term addressed by its variable's canonical index. Two
//! models that differ only in ordering canonicalize (and therefore hash)
//! identically.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::domain::digest;
use crate::domain::error::{Result, ValidationError};
use crate::domain::model::{LinearExpr, ModelKind, ProblemModel, Relation, Sense, VarType};

/// Absolute feasibility tolerance, scaled by `max(1, |rhs|)` per constraint.
pub const FEASIBILITY_TOL: f64 = 1e-6;

/// A variable in canonical order. Binary bounds are pinned to `[0, 1]` and
/// integer bounds are rounded inward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalVar {
    pub name: String,
    pub var_type: VarType,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

impl CanonicalVar {
    /// Clamp `value` into the variable's bounds.
    pub fn clamp(&self, value: f64) -> f64 {
        let mut v = value;
        if let Some(l) = self.lower {
            v = v.max(l);
        }
        if let Some(u) = self.upper {
            v = v.min(u);
        }
        v
    }
}

/// `coef * variables[index]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CanonicalTerm {
    pub index: usize,
    pub coef: f64,
}

/// A constraint with its expression constant folded into `rhs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalConstraint {
    pub name: String,
    pub terms: Vec<CanonicalTerm>,
    pub relation: Relation,
    pub rhs: f64,
}

impl CanonicalConstraint {
    pub fn activity(&self, values: &[f64]) -> f64 {
        self.terms.iter().map(|t| t.coef * values[t.index]).sum()
    }

    /// Amount of violation at `values` (0 when satisfied).
    pub fn violation(&self, values: &[f64]) -> f64 {
        let lhs = self.activity(values);
        match self.relation {
            Relation::Le => (lhs - self.rhs).max(0.0),
            Relation::Ge => (self.rhs - lhs).max(0.0),
            Relation::Eq => (lhs - self.rhs).abs(),
        }
    }

    /// Tolerance this constraint is checked with.
    pub fn tolerance(&self) -> f64 {
        FEASIBILITY_TOL * self.rhs.abs().max(1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalObjective {
    pub sense: Sense,
    pub terms: Vec<CanonicalTerm>,
    pub constant: f64,
}

impl CanonicalObjective {
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .fold(self.constant, |acc, t| acc + t.coef * values[t.index])
    }

    pub fn is_better(&self, a: f64, b: f64) -> bool {
        match self.sense {
            Sense::Minimize => a < b,
            Sense::Maximize => a > b,
        }
    }
}

/// Order-independent, validated form of a problem model.
///
/// Fields are read-only outside the crate; the adversarial sandbox perturbs
/// clones through the crate-private mutators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalModel {
    id: String,
    kind: ModelKind,
    variables: Vec<CanonicalVar>,
    constraints: Vec<CanonicalConstraint>,
    objective: CanonicalObjective,
    metadata: BTreeMap<String, String>,
}

impl CanonicalModel {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> &ModelKind {
        &self.kind
    }

    pub fn variables(&self) -> &[CanonicalVar] {
        &self.variables
    }

    pub fn constraints(&self) -> &[CanonicalConstraint] {
        &self.constraints
    }

    pub fn objective(&self) -> &CanonicalObjective {
        &self.objective
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Index of a variable by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.variables
            .binary_search_by(|v| v.name.as_str().cmp(name))
            .ok()
    }

    /// Map a dense value vector to a name-keyed assignment.
    pub fn to_assignment(&self, values: &[f64]) -> BTreeMap<String, f64> {
        self.variables
            .iter()
            .zip(values)
            .map(|(v, x)| (v.name.clone(), snap(*x)))
            .collect()
    }

    /// Map a name-keyed assignment back to dense values; missing names are 0.
    pub fn to_values(&self, assignment: &BTreeMap<String, f64>) -> Vec<f64> {
        self.variables
            .iter()
            .map(|v| assignment.get(&v.name).copied().unwrap_or(0.0))
            .collect()
    }

    pub fn evaluate_objective(&self, values: &[f64]) -> f64 {
        self.objective.evaluate(values)
    }

    /// Names of constraints (and `bound:`/`integrality:` pseudo-constraints)
    /// violated by `values` beyond tolerance.
    pub fn violations(&self, values: &[f64]) -> Vec<String> {
        let mut out = Vec::new();
        if values.len() != self.variables.len() {
            out.push(format!(
                "dimension: expected {} values, got {}",
                self.variables.len(),
                values.len()
            ));
            return out;
        }
        for (var, &x) in self.variables.iter().zip(values) {
            if !x.is_finite() {
                out.push(format!("finite:{}", var.name));
                continue;
            }
            let below = var.lower.map_or(false, |l| x < l - FEASIBILITY_TOL * l.abs().max(1.0));
            let above = var.upper.map_or(false, |u| x > u + FEASIBILITY_TOL * u.abs().max(1.0));
            if below || above {
                out.push(format!("bound:{}", var.name));
            }
            if var.var_type.is_integral() && (x - x.round()).abs() > FEASIBILITY_TOL {
                out.push(format!("integrality:{}", var.name));
            }
        }
        for c in &self.constraints {
            if c.violation(values) > c.tolerance() {
                out.push(c.name.clone());
            }
        }
        out
    }

    pub fn is_feasible(&self, values: &[f64]) -> bool {
        self.violations(values).is_empty()
    }

    /// Feasibility check over a name-keyed assignment.
    pub fn is_feasible_assignment(&self, assignment: &BTreeMap<String, f64>) -> bool {
        self.is_feasible(&self.to_values(assignment))
    }

    /// SHA-256 over the canonical JSON of this model.
    pub fn digest(&self) -> Result<String> {
        digest::digest_of(self)
    }

    pub(crate) fn constraints_mut(&mut self) -> &mut [CanonicalConstraint] {
        &mut self.constraints
    }

    pub(crate) fn objective_mut(&mut self) -> &mut CanonicalObjective {
        &mut self.objective
    }
}

/// Snap values within 1e-9 of an integer onto it so that assignments
/// serialize stably.
fn snap(x: f64) -> f64 {
    let r = x.round();
    if (x - r).abs() < 1e-9 {
        if r == 0.0 {
            0.0
        } else {
            r
        }
    } else {
        x
    }
}

fn check_finite(value: f64, location: impl FnOnce() -> String) -> std::result::Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::NonFinite {
            location: location(),
        })
    }
}

/// Merge duplicate terms, drop zeros and resolve names to canonical indices.
fn canonical_terms(
    expr: &LinearExpr,
    index: &BTreeMap<&str, usize>,
    location: &str,
) -> std::result::Result<Vec<CanonicalTerm>, ValidationError> {
    let mut merged: BTreeMap<usize, f64> = BTreeMap::new();
    for term in &expr.terms {
        let idx = *index
            .get(term.var.as_str())
            .ok_or_else(|| ValidationError::UndefinedVariable {
                location: location.to_string(),
                name: term.var.clone(),
            })?;
        check_finite(term.coef, || format!("{location} coefficient of {}", term.var))?;
        *merged.entry(idx).or_insert(0.0) += term.coef;
    }
    Ok(merged
        .into_iter()
        .filter(|(_, coef)| *coef != 0.0)
        .map(|(index, coef)| CanonicalTerm { index, coef })
        .collect())
}

/// Validate and canonicalize a model. Pure: `model` is never modified.
pub fn canonicalize(model: &ProblemModel) -> std::result::Result<CanonicalModel, ValidationError> {
    if model.id.trim().is_empty() || model.id.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidProblemId(model.id.clone()));
    }

    let mut variables = Vec::with_capacity(model.variables.len());
    let mut seen = BTreeSet::new();
    for var in &model.variables {
        if var.name.trim().is_empty() {
            return Err(ValidationError::EmptyName("variable".to_string()));
        }
        if !seen.insert(var.name.as_str()) {
            return Err(ValidationError::DuplicateVariable(var.name.clone()));
        }
        if let Some(l) = var.lower {
            check_finite(l, || format!("lower bound of {}", var.name))?;
        }
        if let Some(u) = var.upper {
            check_finite(u, || format!("upper bound of {}", var.name))?;
        }
        if let (Some(l), Some(u)) = (var.lower, var.upper) {
            if l > u {
                return Err(ValidationError::InvertedBounds {
                    name: var.name.clone(),
                    lower: l,
                    upper: u,
                });
            }
        }

        let (lower, upper) = match var.var_type {
            VarType::Continuous => (var.lower, var.upper),
            VarType::Integer => (var.lower.map(f64::ceil), var.upper.map(f64::floor)),
            VarType::Binary => (
                Some(var.lower.map_or(0.0, |l| l.max(0.0).ceil())),
                Some(var.upper.map_or(1.0, |u| u.min(1.0).floor())),
            ),
        };
        if let (Some(l), Some(u)) = (lower, upper) {
            if l > u {
                return Err(ValidationError::InvertedBounds {
                    name: var.name.clone(),
                    lower: l,
                    upper: u,
                });
            }
        }

        variables.push(CanonicalVar {
            name: var.name.clone(),
            var_type: var.var_type,
            lower,
            upper,
        });
    }
    variables.sort_by(|a, b| a.name.cmp(&b.name));

    let index: BTreeMap<&str, usize> = variables
        .iter()
        .enumerate()
        .map(|(i, v)| (v.name.as_str(), i))
        .collect();

    let mut constraints = Vec::with_capacity(model.constraints.len());
    let mut seen = BTreeSet::new();
    for c in &model.constraints {
        if c.name.trim().is_empty() {
            return Err(ValidationError::EmptyName("constraint".to_string()));
        }
        if !seen.insert(c.name.as_str()) {
            return Err(ValidationError::DuplicateConstraint(c.name.clone()));
        }
        let location = format!("constraint {}", c.name);
        check_finite(c.rhs, || format!("{location} rhs"))?;
        check_finite(c.expr.constant, || format!("{location} constant"))?;
        let terms = canonical_terms(&c.expr, &index, &location)?;
        constraints.push(CanonicalConstraint {
            name: c.name.clone(),
            terms,
            relation: c.relation,
            rhs: c.rhs - c.expr.constant,
        });
    }
    constraints.sort_by(|a, b| a.name.cmp(&b.name));

    check_finite(model.objective.expr.constant, || "objective constant".to_string())?;
    let objective = CanonicalObjective {
        sense: model.objective.sense,
        terms: canonical_terms(&model.objective.expr, &index, "objective")?,
        constant: model.objective.expr.constant,
    };

    Ok(CanonicalModel {
        id: model.id.clone(),
        kind: model.kind.clone(),
        variables,
        constraints,
        objective,
        metadata: model.metadata.clone(),
    })
}

/// Canonicalize and digest in one step.
pub fn canonical_digest(model: &ProblemModel) -> Result<String> {
    canonicalize(model)?.digest()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{Constraint, Objective, Variable};

    fn two_var_model() -> ProblemModel {
        ProblemModel::new(
            "ops.test/2025-01-15",
            ModelKind::GeneralMilp,
            Objective::maximize(LinearExpr::new().term("x", 3.0).term("y", 2.0)),
        )
        .with_variable(Variable::continuous("y", Some(0.0), Some(10.0)))
        .with_variable(Variable::continuous("x", Some(0.0), Some(3.0)))
        .with_constraint(Constraint::new(
            "cap",
            LinearExpr::new().term("x", 1.0).term("y", 1.0),
            Relation::Le,
            4.0,
        ))
    }

    #[test]
    fn test_variables_sorted_by_name() {
        let canon = canonicalize(&two_var_model()).expect("canonicalize");
        let names: Vec<&str> = canon.variables().iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["x", "y"]);
        assert_eq!(canon.index_of("y"), Some(1));
        assert_eq!(canon.index_of("z"), None);
    }

    #[test]
    fn test_duplicate_terms_merged_and_zeros_dropped() {
        let model = two_var_model().with_constraint(Constraint::new(
            "dup",
            LinearExpr::new()
                .term("y", 1.0)
                .term("x", 2.0)
                .term("y", -1.0)
                .term("x", 0.5)
                .plus(1.0),
            Relation::Ge,
            3.0,
        ));
        let canon = canonicalize(&model).expect("canonicalize");
        let dup = canon
            .constraints()
            .iter()
            .find(|c| c.name == "dup")
            .expect("dup constraint");
        assert_eq!(dup.terms, vec![CanonicalTerm { index: 0, coef: 2.5 }]);
        assert_eq!(dup.rhs, 2.0);
    }

    #[test]
    fn test_order_independent_digest() {
        let a = two_var_model().with_constraint(Constraint::new(
            "aux",
            LinearExpr::new().term("y", 1.0),
            Relation::Ge,
            0.5,
        ));
        let mut b = a.clone();
        b.variables.reverse();
        b.constraints.reverse();
        b.objective.expr.terms.reverse();

        assert_eq!(
            canonical_digest(&a).expect("digest a"),
            canonical_digest(&b).expect("digest b")
        );
    }

    #[test]
    fn test_undefined_variable_in_constraint() {
        let model = two_var_model().with_constraint(Constraint::new(
            "ghostly",
            LinearExpr::new().term("ghost", 1.0),
            Relation::Le,
            1.0,
        ));
        match canonicalize(&model) {
            Err(ValidationError::UndefinedVariable { name, location }) => {
                assert_eq!(name, "ghost");
                assert!(location.contains("ghostly"));
            }
            other => panic!("expected UndefinedVariable, got {other:?}"),
        }
    }

    #[test]
    fn test_undefined_variable_in_objective() {
        let mut model = two_var_model();
        model.objective.expr = model.objective.expr.term("phantom", 1.0);
        assert!(matches!(
            canonicalize(&model),
            Err(ValidationError::UndefinedVariable { .. })
        ));
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let model = two_var_model().with_variable(Variable::continuous("z", Some(5.0), Some(1.0)));
        assert!(matches!(
            canonicalize(&model),
            Err(ValidationError::InvertedBounds { .. })
        ));
    }

    #[test]
    fn test_integer_bounds_rounded_inward() {
        let model = two_var_model().with_variable(Variable::integer("n", Some(0.5), Some(3.7)));
        let canon = canonicalize(&model).expect("canonicalize");
        let n = &canon.variables()[canon.index_of("n").expect("n")];
        assert_eq!((n.lower, n.upper), (Some(1.0), Some(3.0)));

        let empty = two_var_model().with_variable(Variable::integer("m", Some(0.2), Some(0.8)));
        assert!(canonicalize(&empty).is_err());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let model = two_var_model().with_variable(Variable::binary("x"));
        assert_eq!(
            canonicalize(&model),
            Err(ValidationError::DuplicateVariable("x".to_string()))
        );
    }

    #[test]
    fn test_non_finite_coefficient_rejected() {
        let model = two_var_model().with_constraint(Constraint::new(
            "nan",
            LinearExpr::new().term("x", f64::NAN),
            Relation::Le,
            1.0,
        ));
        assert!(matches!(
            canonicalize(&model),
            Err(ValidationError::NonFinite { .. })
        ));
    }

    #[test]
    fn test_whitespace_problem_id_rejected() {
        let mut model = two_var_model();
        model.id = "ops thermal".to_string();
        assert!(matches!(
            canonicalize(&model),
            Err(ValidationError::InvalidProblemId(_))
        ));
    }

    #[test]
    fn test_canonicalize_leaves_input_untouched() {
        let model = two_var_model();
        let before = model.clone();
        let _ = canonicalize(&model).expect("canonicalize");
        assert_eq!(model, before);
    }

    #[test]
    fn test_feasibility_checks() {
        let canon = canonicalize(&two_var_model()).expect("canonicalize");
        assert!(canon.is_feasible(&[3.0, 1.0]));
        assert_eq!(canon.violations(&[3.0, 2.0]), vec!["cap".to_string()]);
        assert_eq!(canon.violations(&[4.0, 0.0]), vec!["bound:x".to_string()]);
        assert_eq!(canon.evaluate_objective(&[3.0, 1.0]), 11.0);
    }
}
