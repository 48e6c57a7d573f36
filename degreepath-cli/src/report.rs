//! Human-readable and JSON rendering of an `AreaResult`. Output
//! formatting is this binary's concern, not the core's.

use colored::Colorize;
use degreepath_core::{AreaResult, ResultDetail, ResultNode};

pub fn to_json(result: &AreaResult) -> serde_json::Result<String> {
    serde_json::to_string_pretty(result)
}

/// Renders the result tree as an indented outline, colored by verdict.
pub fn print_tree(result: &AreaResult) {
    let verdict = if result.ok { "PASS".green().bold() } else { "FAIL".red().bold() };
    println!(
        "{} rank={:.2}/{:.2}",
        verdict,
        result.rank,
        result.max_rank
    );
    if let Some(node) = &result.node {
        print_node(node, 1);
    }
}

fn indent(depth: usize) -> String {
    "  ".repeat(depth)
}

fn mark(ok: bool) -> colored::ColoredString {
    if ok {
        "✓".green()
    } else {
        "✗".red()
    }
}

fn print_node(node: &ResultNode, depth: usize) {
    match &node.detail {
        ResultDetail::Course { course, matched_clbid, claim_conflict } => {
            let claimed = matched_clbid
                .as_ref()
                .map(|c| format!(" ({})", c))
                .unwrap_or_default();
            let conflict = if *claim_conflict { " [claim conflict]".yellow().to_string() } else { String::new() };
            println!("{}{} {}{}{}", indent(depth), mark(node.ok()), course, claimed, conflict);
        }
        ResultDetail::Count { children, satisfied_count, required_count, at_most, audit } => {
            let verb = if *at_most { "exactly" } else { "at least" };
            println!(
                "{}{} {} of {} ({} satisfied)",
                indent(depth),
                mark(node.ok()),
                verb,
                required_count,
                satisfied_count
            );
            for child in children {
                print_node(child, depth + 1);
            }
            for bound in audit {
                print_assertion(bound, depth + 1);
            }
        }
        ResultDetail::From { matched, assertions } => {
            println!("{}{} from ({} matched)", indent(depth), mark(node.ok()), matched.len());
            for bound in assertions {
                print_assertion(bound, depth + 1);
            }
        }
        ResultDetail::Requirement { name, child, audited_by, waived } => {
            let suffix = if *waived {
                " (waived)".to_string()
            } else if let Some(by) = audited_by {
                format!(" (audited by {})", by)
            } else {
                String::new()
            };
            println!("{}{} {}{}", indent(depth), mark(node.ok()), name.bold(), suffix);
            if let Some(child) = child {
                print_node(child, depth + 1);
            }
        }
        ResultDetail::Reference { name, result } => {
            println!("{}{} -> {}", indent(depth), mark(node.ok()), name.italic());
            print_node(result, depth + 1);
        }
        ResultDetail::Assertion(bound) => print_assertion(bound, depth),
    }
}

fn print_assertion(bound: &degreepath_core::assertion::BoundAssertion, depth: usize) {
    println!(
        "{}{} {} (expected {})",
        indent(depth),
        mark(bound.ok),
        bound.actual,
        bound.expected
    );
}
