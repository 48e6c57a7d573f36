//! Area specification and validation. An `AreaSpec` is the frozen,
//! loader-produced tree the solver audits; `validate()` is the one-time
//! check run at load time, not per-audit.

use std::collections::{HashMap, HashSet};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::area_pointer::{AreaKind, AreaPointer};
use crate::claim::MulticountableTable;
use crate::context::RequirementContext;
use crate::error::SpecificationError;
use crate::grade::Grade;
use crate::limit::LimitSet;
use crate::path::Path;
use crate::rule::from::FromSource;
use crate::rule::{Rule, RequirementRule, ResultNode};
use crate::value::Value;

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct AreaSpec {
    pub name: String,
    pub kind: AreaKind,
    pub code: String,
    pub degree: String,
    pub result: Rule,
    pub requirements: HashMap<String, RequirementRule>,
    #[serde(default)]
    pub emphases: HashMap<String, RequirementRule>,
    #[serde(default)]
    pub limit: LimitSet,
    #[serde(default)]
    pub multicountable: MulticountableTable,
    #[serde(default)]
    pub attributes: HashMap<String, Value>,
}

impl AreaSpec {
    /// Compiles declared emphases into synthetic named requirements,
    /// grounded in `original_source`'s `degreepath/area.py`: an emphasis
    /// `E` becomes requirement `"Emphasis: {E.name}"`; if more
    /// than one emphasis is declared, a synthetic `"Emphasis"` requirement
    /// is also added — a Count-of-1-of-N over references to each.
    pub fn compile_emphases(&mut self) {
        if self.emphases.is_empty() {
            return;
        }

        let mut names: Vec<String> = self.emphases.keys().cloned().collect();
        names.sort();

        for name in &names {
            if let Some(rule) = self.emphases.remove(name) {
                self.requirements.insert(format!("Emphasis: {}", name), rule);
            }
        }

        if names.len() > 1 {
            let path = Path::new(["$", ".emphasis"]);
            let of = names
                .iter()
                .enumerate()
                .map(|(i, name)| {
                    Rule::Reference(crate::rule::reference::ReferenceRule {
                        name: format!("Emphasis: {}", name),
                        path: path.child(format!("[{}]", i)),
                    })
                })
                .collect();
            self.requirements.insert(
                "Emphasis".to_string(),
                RequirementRule {
                    name: "Emphasis".to_string(),
                    message: None,
                    audited_by: None,
                    in_gpa: false,
                    contract: false,
                    child: Some(Rule::Count(crate::rule::count::CountRule {
                        count: 1,
                        at_most: false,
                        of,
                        audit: Vec::new(),
                        path: path.clone(),
                        is_top_level: false,
                    })),
                    path,
                },
            );
        }
    }

    /// Runs the full validation pipeline: path uniqueness, reference
    /// resolution, cycle detection, count-range checks.
    pub fn validate(&self) -> Result<(), SpecificationError> {
        self.check_path_uniqueness()?;
        self.check_references_resolve()?;
        self.check_reference_cycles()?;
        self.check_forward_references()?;
        self.check_unused_requirements()?;
        self.check_requirement_completeness()?;
        self.check_count_ranges(&self.result)?;
        for req in self.requirements.values() {
            if let Some(child) = &req.child {
                self.check_count_ranges(child)?;
            }
        }
        Ok(())
    }

    fn check_path_uniqueness(&self) -> Result<(), SpecificationError> {
        let mut paths = Vec::new();
        collect_all_paths(&self.result, &mut paths);
        for req in self.requirements.values() {
            paths.push(req.path.clone());
            if let Some(child) = &req.child {
                collect_all_paths(child, &mut paths);
            }
        }

        let mut seen = HashSet::new();
        for path in paths {
            if !seen.insert(path.clone()) {
                return Err(SpecificationError::DuplicatePath { path });
            }
        }
        Ok(())
    }

    fn check_references_resolve(&self) -> Result<(), SpecificationError> {
        let mut refs = Vec::new();
        collect_references(&self.result, &mut refs);
        collect_from_requirement_names(&self.result, &mut refs);
        for req in self.requirements.values() {
            if let Some(child) = &req.child {
                collect_references(child, &mut refs);
                collect_from_requirement_names(child, &mut refs);
            }
        }
        for (name, path) in refs {
            if !self.requirements.contains_key(&name) {
                return Err(SpecificationError::UnresolvedReference { path, name });
            }
        }
        Ok(())
    }

    /// Rejects a `From` rule's `requirements: […]` source naming a
    /// requirement that is not resolved anywhere earlier in the area's
    /// pre-order traversal. Position is assigned by the same
    /// depth-first, declaration-order walk the solver effectively
    /// performs, expanding `Reference` nodes into their target's subtree
    /// the first time each is encountered.
    fn check_forward_references(&self) -> Result<(), SpecificationError> {
        let mut position = 0usize;
        let mut first_seen: HashMap<String, usize> = HashMap::new();
        let mut visiting: HashSet<String> = HashSet::new();
        let mut from_nodes: Vec<(Path, usize, Vec<String>)> = Vec::new();

        self.walk_for_order(&self.result, &mut position, &mut first_seen, &mut visiting, &mut from_nodes);

        for (path, pos, names) in from_nodes {
            for name in names {
                match first_seen.get(&name) {
                    Some(&def_pos) if def_pos < pos => {}
                    _ => return Err(SpecificationError::ForwardReference { path, name }),
                }
            }
        }
        Ok(())
    }

    fn walk_for_order(
        &self,
        rule: &Rule,
        position: &mut usize,
        first_seen: &mut HashMap<String, usize>,
        visiting: &mut HashSet<String>,
        from_nodes: &mut Vec<(Path, usize, Vec<String>)>,
    ) {
        *position += 1;
        let here = *position;
        match rule {
            Rule::Count(c) => {
                for child in &c.of {
                    self.walk_for_order(child, position, first_seen, visiting, from_nodes);
                }
            }
            Rule::Requirement(r) => {
                if let Some(child) = &r.child {
                    self.walk_for_order(child, position, first_seen, visiting, from_nodes);
                }
            }
            Rule::Reference(r) => {
                first_seen.entry(r.name.clone()).or_insert(here);
                if visiting.insert(r.name.clone()) {
                    if let Some(target) = self.requirements.get(&r.name) {
                        if let Some(child) = &target.child {
                            self.walk_for_order(child, position, first_seen, visiting, from_nodes);
                        }
                    }
                    visiting.remove(&r.name);
                }
            }
            Rule::From(f) => {
                if let FromSource::Requirements(names) = &f.source {
                    from_nodes.push((f.path.clone(), here, names.clone()));
                }
            }
            Rule::Course(_) | Rule::Assertion(_) => {}
        }
    }

    /// Flags a declared requirement that no `Reference` in the tree ever
    /// resolves to. Synthetic `Emphasis` requirements compiled by
    /// `compile_emphases` are exempt: an area may declare emphases
    /// without the result rule itself referencing the synthetic
    /// `"Emphasis"` umbrella requirement.
    fn check_unused_requirements(&self) -> Result<(), SpecificationError> {
        let mut reachable = HashSet::new();
        self.mark_reachable(&self.result, &mut reachable);
        for name in self.requirements.keys() {
            if !reachable.contains(name) && !name.starts_with("Emphasis") {
                return Err(SpecificationError::UnusedRequirement { name: name.clone() });
            }
        }
        Ok(())
    }

    fn mark_reachable(&self, rule: &Rule, reachable: &mut HashSet<String>) {
        match rule {
            Rule::Count(c) => {
                for child in &c.of {
                    self.mark_reachable(child, reachable);
                }
            }
            Rule::Requirement(r) => {
                if let Some(child) = &r.child {
                    self.mark_reachable(child, reachable);
                }
            }
            Rule::Reference(r) => {
                if reachable.insert(r.name.clone()) {
                    if let Some(target) = self.requirements.get(&r.name) {
                        if let Some(child) = &target.child {
                            self.mark_reachable(child, reachable);
                        }
                    }
                }
            }
            Rule::Course(_) | Rule::From(_) | Rule::Assertion(_) => {}
        }
    }

    /// Rejects a `Requirement` node declared with neither a `child` rule
    /// nor `audited_by`: the data model only allows an absent child when
    /// the requirement is externally audited, and a node satisfying
    /// neither has no way to ever be evaluated.
    fn check_requirement_completeness(&self) -> Result<(), SpecificationError> {
        for req in self.requirements.values() {
            if req.child.is_none() && req.audited_by.is_none() {
                return Err(SpecificationError::IncompleteRequirement { path: req.path.clone(), name: req.name.clone() });
            }
            if let Some(child) = &req.child {
                self.check_requirement_completeness_in(child)?;
            }
        }
        self.check_requirement_completeness_in(&self.result)
    }

    fn check_requirement_completeness_in(&self, rule: &Rule) -> Result<(), SpecificationError> {
        match rule {
            Rule::Count(c) => {
                for child in &c.of {
                    self.check_requirement_completeness_in(child)?;
                }
                Ok(())
            }
            Rule::Requirement(r) => {
                if r.child.is_none() && r.audited_by.is_none() {
                    return Err(SpecificationError::IncompleteRequirement { path: r.path.clone(), name: r.name.clone() });
                }
                if let Some(child) = &r.child {
                    self.check_requirement_completeness_in(child)?;
                }
                Ok(())
            }
            Rule::Course(_) | Rule::From(_) | Rule::Reference(_) | Rule::Assertion(_) => Ok(()),
        }
    }

    fn check_reference_cycles(&self) -> Result<(), SpecificationError> {
        let mut graph: DiGraph<String, ()> = DiGraph::new();
        let mut index_of: HashMap<String, NodeIndex> = HashMap::new();
        for name in self.requirements.keys() {
            let idx = graph.add_node(name.clone());
            index_of.insert(name.clone(), idx);
        }

        for (name, req) in &self.requirements {
            let mut refs = Vec::new();
            if let Some(child) = &req.child {
                collect_references(child, &mut refs);
            }
            let from = index_of[name];
            for (target, _path) in refs {
                if let Some(&to) = index_of.get(&target) {
                    graph.add_edge(from, to, ());
                }
            }
        }

        for edge in graph.edge_indices() {
            if let Some((a, b)) = graph.edge_endpoints(edge) {
                if a == b {
                    let name = graph[a].clone();
                    return Err(SpecificationError::ReferenceCycle { cycle: vec![name.clone(), name] });
                }
            }
        }

        for scc in tarjan_scc(&graph) {
            if scc.len() > 1 {
                let cycle: Vec<String> = scc.iter().map(|idx| graph[*idx].clone()).collect();
                return Err(SpecificationError::ReferenceCycle { cycle });
            }
        }

        Ok(())
    }

    fn check_count_ranges(&self, rule: &Rule) -> Result<(), SpecificationError> {
        match rule {
            Rule::Count(c) => {
                let max = c.of.len();
                if c.count > max {
                    return Err(SpecificationError::CountOutOfRange {
                        path: c.path.clone(),
                        count: c.count as i64,
                        max,
                    });
                }
                for child in &c.of {
                    self.check_count_ranges(child)?;
                }
                Ok(())
            }
            Rule::Requirement(r) => {
                if let Some(child) = &r.child {
                    self.check_count_ranges(child)?;
                }
                Ok(())
            }
            Rule::Course(_) | Rule::From(_) | Rule::Reference(_) | Rule::Assertion(_) => Ok(()),
        }
    }
}

fn collect_all_paths(rule: &Rule, out: &mut Vec<Path>) {
    out.push(rule.path().clone());
    match rule {
        Rule::Count(c) => {
            for child in &c.of {
                collect_all_paths(child, out);
            }
        }
        Rule::Requirement(r) => {
            if let Some(child) = &r.child {
                collect_all_paths(child, out);
            }
        }
        _ => {}
    }
}

fn collect_references(rule: &Rule, out: &mut Vec<(String, Path)>) {
    match rule {
        Rule::Reference(r) => out.push((r.name.clone(), r.path.clone())),
        Rule::Count(c) => {
            for child in &c.of {
                collect_references(child, out);
            }
        }
        Rule::Requirement(r) => {
            if let Some(child) = &r.child {
                collect_references(child, out);
            }
        }
        _ => {}
    }
}

/// Collects the requirement names a `From` rule's `requirements: […]`
/// source names, so they participate in the same existence and
/// forward-reference checks as plain `Reference` nodes.
fn collect_from_requirement_names(rule: &Rule, out: &mut Vec<(String, Path)>) {
    match rule {
        Rule::From(f) => {
            if let FromSource::Requirements(names) = &f.source {
                for name in names {
                    out.push((name.clone(), f.path.clone()));
                }
            }
        }
        Rule::Count(c) => {
            for child in &c.of {
                collect_from_requirement_names(child, out);
            }
        }
        Rule::Requirement(r) => {
            if let Some(child) = &r.child {
                collect_from_requirement_names(child, out);
            }
        }
        _ => {}
    }
}

/// The outcome of auditing an entire area.
#[derive(Clone, Debug, Serialize)]
pub struct AreaResult {
    pub ok: bool,
    pub rank: f64,
    pub max_rank: f64,
    pub node: Option<ResultNode>,
}

/// Pairs of area codes treated as "common major requirement" partners,
/// grounded in `original_source`'s `area.py::prepare_common_rules`:
/// Studio Art (140) and Art History (135) share a reduced
/// credits-outside-the-major threshold when both are declared as a
/// double major.
const DOUBLE_MAJOR_PAIRS: &[(&str, &str)] = &[("140", "135")];
const BASE_CREDITS_OUTSIDE_MAJOR: i64 = 21;
const DOUBLE_MAJOR_DISCOUNT: i64 = 3;

fn credits_outside_major_threshold(area_code: &str, pointers: &[AreaPointer]) -> i64 {
    let partner = DOUBLE_MAJOR_PAIRS.iter().find_map(|(a, b)| {
        if *a == area_code {
            Some(*b)
        } else if *b == area_code {
            Some(*a)
        } else {
            None
        }
    });

    if let Some(partner_code) = partner {
        let partner_declared = pointers
            .iter()
            .any(|p| p.code == partner_code && matches!(p.kind, AreaKind::Major));
        if partner_declared {
            return BASE_CREDITS_OUTSIDE_MAJOR - DOUBLE_MAJOR_DISCOUNT;
        }
    }

    BASE_CREDITS_OUTSIDE_MAJOR
}

const MIN_C_OR_BETTER_CREDITS: i64 = 6;
const MAX_SU_CREDITS: i64 = 8;

/// Synthesizes the three common-major-requirement assertions every
/// major-kind area carries in addition to its own declared result rule:
/// a minimum of credits at C-or-better, a cap on pass/fail credits, and
/// the credits-outside-the-major threshold.
///
/// "In the major" is determined the way `prepare_common_rules` does it:
/// by comparing each transcript course's subject code against the
/// declaring `AreaPointer`'s `department`, not by which courses the
/// audited result tree happened to claim. A student with no department
/// on file for this area can't have the outside-major threshold
/// evaluated at all, so it is treated as satisfied rather than computed
/// against an empty major set.
pub fn common_major_requirement_results(area: &AreaSpec, ctx: &RequirementContext) -> Vec<ResultNode> {
    if area.kind != AreaKind::Major {
        return Vec::new();
    }

    let dept_code = ctx.pointers.iter().find(|p| p.code == area.code).and_then(|p| p.department.clone());
    let in_major = |c: &crate::course::CourseInstance| -> bool {
        matches!(&dept_code, Some(dept) if c.code.subject == *dept)
    };

    let path_root = Path::new(["$", ".common"]);

    let c_or_better_credits: Decimal = ctx
        .transcript
        .iter()
        .filter(|c| in_major(c))
        .filter(|c| matches!(c.grade, Some(g) if g >= Grade::C))
        .map(|c| c.credits)
        .sum();
    let c_or_better_ok = c_or_better_credits >= Decimal::from(MIN_C_OR_BETTER_CREDITS);

    let su_credits: Decimal = ctx
        .transcript
        .iter()
        .filter(|c| in_major(c))
        .filter(|c| c.grade_option == crate::grade::GradeOption::SU)
        .map(|c| c.credits)
        .sum();
    let su_ok = su_credits <= Decimal::from(MAX_SU_CREDITS);

    let threshold = credits_outside_major_threshold(&area.code, &ctx.pointers);
    let (outside_credits, outside_ok) = match &dept_code {
        Some(dept) => {
            let credits: Decimal = ctx
                .transcript
                .iter()
                .filter(|c| c.code.subject != *dept && c.code.subject != "REG")
                .map(|c| c.credits)
                .sum();
            let ok = credits >= Decimal::from(threshold);
            (credits, ok)
        }
        None => (Decimal::from(threshold), true),
    };

    vec![
        assertion_result(path_root.child("c-or-better"), c_or_better_ok, Value::Decimal(c_or_better_credits), Value::Integer(MIN_C_OR_BETTER_CREDITS)),
        assertion_result(path_root.child("su-cap"), su_ok, Value::Decimal(su_credits), Value::Integer(MAX_SU_CREDITS)),
        assertion_result(path_root.child("outside-major"), outside_ok, Value::Decimal(outside_credits), Value::Integer(threshold)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::area_pointer::AreaStatus;
    use crate::course::{CourseCode, CourseInstance, Transcript};
    use crate::grade::GradeOption;
    use crate::rule::course::CourseRule;

    fn course_rule(code: &str) -> Rule {
        Rule::Course(CourseRule {
            course: code.to_string(),
            grade: None,
            grade_option: None,
            hidden: false,
            allow_claimed: false,
            ap_ib_source: None,
            repeats: crate::course::RepeatMode::All,
            forced_clbid: None,
            path: Path::new(["$".to_string(), format!("*{}", code)]),
        })
    }

    fn base_area(result: Rule) -> AreaSpec {
        AreaSpec {
            name: "Test Area".to_string(),
            kind: AreaKind::Major,
            code: "140".to_string(),
            degree: "B.A.".to_string(),
            result,
            requirements: HashMap::new(),
            emphases: HashMap::new(),
            limit: LimitSet::default(),
            multicountable: MulticountableTable::default(),
            attributes: HashMap::new(),
        }
    }

    fn course(clbid: &str, code: &str, credits: i64) -> CourseInstance {
        CourseInstance {
            clbid: clbid.to_string(),
            code: CourseCode::parse(code).unwrap(),
            shorthand: None,
            credits: Decimal::from(credits),
            grade: Some(Grade::A),
            grade_option: GradeOption::Graded,
            is_in_progress: false,
            attempted: true,
            earned: true,
            term: 1,
            gereqs: vec![],
            attributes: vec![],
            source: None,
        }
    }

    fn ctx(courses: Vec<CourseInstance>, pointers: Vec<AreaPointer>) -> RequirementContext {
        RequirementContext::new(
            Transcript::new(courses),
            pointers,
            crate::exception::ExceptionSet::default(),
            HashMap::new(),
            MulticountableTable::default(),
        )
    }

    fn pointer(code: &str, department: Option<&str>) -> AreaPointer {
        AreaPointer {
            code: code.to_string(),
            status: AreaStatus::Declared,
            kind: AreaKind::Major,
            name: "Test Area".to_string(),
            degree: "B.A.".to_string(),
            department: department.map(|d| d.to_string()),
            gpa: None,
        }
    }

    #[test]
    fn validate_rejects_a_requirement_with_neither_child_nor_audited_by() {
        let mut spec = base_area(course_rule("CSCI 251"));
        spec.requirements.insert(
            "Incomplete".to_string(),
            RequirementRule {
                name: "Incomplete".to_string(),
                message: None,
                audited_by: None,
                in_gpa: false,
                contract: false,
                child: None,
                path: Path::new(["$", "%Incomplete"]),
            },
        );
        let err = spec.validate().unwrap_err();
        assert!(matches!(err, SpecificationError::IncompleteRequirement { .. }));
    }

    #[test]
    fn validate_accepts_a_requirement_audited_by_the_registrar() {
        let mut spec = base_area(course_rule("CSCI 251"));
        spec.requirements.insert(
            "External".to_string(),
            RequirementRule {
                name: "External".to_string(),
                message: None,
                audited_by: Some(crate::rule::requirement::AuditedBy::Registrar),
                in_gpa: false,
                contract: false,
                child: None,
                path: Path::new(["$", "%External"]),
            },
        );
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn non_major_area_yields_no_common_requirement_results() {
        let mut spec = base_area(course_rule("CSCI 251"));
        spec.kind = AreaKind::Degree;
        let context = ctx(vec![course("1", "CSCI 251", 3)], vec![]);
        assert!(common_major_requirement_results(&spec, &context).is_empty());
    }

    #[test]
    fn outside_major_credits_are_counted_by_subject_not_by_claim() {
        let spec = base_area(course_rule("ARTH 140"));
        let pointers = vec![pointer("140", Some("ARTH"))];
        let context = ctx(
            vec![course("1", "ARTH 140", 3), course("2", "MATH 101", 21)],
            pointers,
        );
        let results = common_major_requirement_results(&spec, &context);
        let outside = results.iter().find(|r| r.path.to_string().ends_with("outside-major")).unwrap();
        assert!(outside.ok());
    }

    #[test]
    fn missing_department_pointer_defaults_outside_major_to_satisfied() {
        let spec = base_area(course_rule("ARTH 140"));
        let context = ctx(vec![course("1", "ARTH 140", 3)], vec![]);
        let results = common_major_requirement_results(&spec, &context);
        let outside = results.iter().find(|r| r.path.to_string().ends_with("outside-major")).unwrap();
        assert!(outside.ok());
    }
}

fn assertion_result(path: Path, ok: bool, actual: Value, expected: Value) -> ResultNode {
    use crate::assertion::BoundAssertion;
    use crate::rule::ResultDetail;

    let rank = if ok { 1.0 } else { 0.0 };
    ResultNode {
        path: path.clone(),
        ok,
        rank,
        max_rank: 1.0,
        detail: ResultDetail::Assertion(BoundAssertion {
            actual,
            expected,
            ok,
            rank,
            inserted: Vec::new(),
            path,
            message: None,
            overridden: false,
        }),
    }
}
