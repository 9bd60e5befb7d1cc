//! Synthetic query generators for evtgen benchmarks.
//!
//! Builds logical query trees of configurable width: flat conjunctions,
//! wide disjunctions and correlated sequences. All generators are seeded
//! for reproducibility.

#![allow(dead_code)]

use evtgen_ast::{CompareOp, LogicalNode, Sequence, SequenceStep};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Fixed seed for reproducible benchmarks.
const SEED: u64 = 0xDEAD_BEEF_CAFE;

pub fn rng() -> StdRng {
    StdRng::seed_from_u64(SEED)
}

// ---------------------------------------------------------------------------
// Field / value pools
// ---------------------------------------------------------------------------

const KEYWORD_FIELDS: &[&str] = &[
    "process.name",
    "process.parent.name",
    "process.executable",
    "process.command_line",
    "file.name",
    "file.path",
    "user.name",
    "host.name",
    "dns.question.name",
    "registry.path",
];

const INTEGER_FIELDS: &[&str] = &[
    "process.pid",
    "process.parent.pid",
    "destination.port",
    "source.port",
    "file.size",
];

const CATEGORIES: &[&str] = &["process", "file", "network", "registry", "dns"];

const STRING_VALUES: &[&str] = &[
    "cmd.exe",
    "powershell.exe",
    "regsvr32.exe",
    "rundll32.exe",
    "certutil.exe",
    "mshta.exe",
    "wscript.exe",
    "svchost.exe",
    "lsass.exe",
    "explorer.exe",
];

const WILDCARD_PATTERNS: &[&str] = &[
    "*.exe",
    "*mimikatz*",
    "C:/Windows/Temp/*",
    "*/AppData/Local/Temp/*",
    "*.ps1",
    "scrobj?.dll",
    "/i:http*",
    "*-encoded*",
];

// ---------------------------------------------------------------------------
// Comparison generators
// ---------------------------------------------------------------------------

fn pick<'a>(rng: &mut StdRng, pool: &[&'a str]) -> &'a str {
    pool[rng.random_range(0..pool.len())]
}

/// A random comparison on `field`, chosen to stay satisfiable on its own.
pub fn gen_comparison(rng: &mut StdRng, field: &str, integer: bool) -> LogicalNode {
    if integer {
        let n = rng.random_range(0..65_536i64);
        match rng.random_range(0..5u8) {
            0 => LogicalNode::equals(field, n),
            1 => LogicalNode::cmp(field, CompareOp::Gt, n),
            2 => LogicalNode::cmp(field, CompareOp::Lte, n + 1000),
            3 => LogicalNode::cmp(field, CompareOp::NotEq, n),
            _ => LogicalNode::cmp(field, CompareOp::In, vec![n, n + 1, n + 2]),
        }
    } else {
        match rng.random_range(0..4u8) {
            0 => LogicalNode::equals(field, pick(rng, STRING_VALUES)),
            1 => LogicalNode::cmp(field, CompareOp::Wildcard, pick(rng, WILDCARD_PATTERNS)),
            2 => LogicalNode::cmp(field, CompareOp::NotEq, pick(rng, STRING_VALUES)),
            _ => LogicalNode::cmp(field, CompareOp::NotIn, vec![
                pick(rng, STRING_VALUES),
                pick(rng, STRING_VALUES),
            ]),
        }
    }
}

/// A conjunction of `n` comparisons, each on a distinct field so that no
/// two terms can conflict.
pub fn gen_conjunction(rng: &mut StdRng, n: usize) -> LogicalNode {
    let terms = (0..n).map(|i| {
        if i % 3 == 2 {
            let field = format!("{}.{i}", pick(rng, INTEGER_FIELDS));
            gen_comparison(rng, &field, true)
        } else {
            let field = format!("{}.{i}", pick(rng, KEYWORD_FIELDS));
            gen_comparison(rng, &field, false)
        }
    });
    LogicalNode::and(terms.collect::<Vec<_>>())
}

/// A category-typed disjunction of `width` small conjunctions.
pub fn gen_disjunction(rng: &mut StdRng, width: usize) -> LogicalNode {
    let alternatives: Vec<LogicalNode> = (0..width)
        .map(|_| {
            let keyword = pick(rng, KEYWORD_FIELDS);
            let integer = pick(rng, INTEGER_FIELDS);
            LogicalNode::and([
                gen_comparison(rng, keyword, false),
                gen_comparison(rng, integer, true),
            ])
        })
        .collect();
    LogicalNode::event(pick(rng, CATEGORIES), LogicalNode::or(alternatives))
}

/// A sequence of `steps` events joined on `user.name` and `host.name`,
/// each step a two-way disjunction.
pub fn gen_sequence(rng: &mut StdRng, steps: usize) -> LogicalNode {
    let steps = (0..steps)
        .map(|_| SequenceStep {
            query: LogicalNode::event(
                pick(rng, CATEGORIES),
                LogicalNode::or([
                    gen_comparison(rng, "process.name", false),
                    gen_comparison(rng, "process.pid", true),
                ]),
            ),
            by: vec!["host.name".to_string()],
        })
        .collect();
    LogicalNode::Sequence(Sequence {
        by: vec!["user.name".to_string()],
        steps,
    })
}

/// `count` independent disjunction queries of the given width.
pub fn gen_n_queries(count: usize, width: usize) -> Vec<LogicalNode> {
    let mut rng = rng();
    (0..count).map(|_| gen_disjunction(&mut rng, width)).collect()
}
