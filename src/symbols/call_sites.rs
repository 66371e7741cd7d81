//! Call-site examples gathered from function bodies.

use std::collections::HashMap;

use tracing::debug;

use crate::model::{CallSite, CallableBody, PositionMode};

use super::builder::span_position;
use super::index::{ProgramIndex, Scope, Target};

/// For every callable that is called from somewhere in the program, the
/// list of `called by <caller>` strings, keyed by callee qualified name.
///
/// Only calls that resolve to a single known callable are recorded; calls
/// through interfaces, function values, and external packages are skipped.
/// Each list holds distinct callers in discovery order, capped at `max`.
pub fn collect_call_examples(
    index: &ProgramIndex,
    max: Option<usize>,
) -> HashMap<String, Vec<String>> {
    let mut by_callee: HashMap<usize, Vec<String>> = HashMap::new();
    let mut resolved = 0usize;

    for caller in &index.callables {
        let Some(body) = caller.fact.body.as_ref() else {
            continue;
        };
        for call in &body.calls {
            let scope = Scope::body(caller.loc, body, call.span.start_byte);
            let Some(Target::Static(callee)) = index.resolve_call(&call.callee, scope) else {
                continue;
            };
            resolved += 1;

            let examples = by_callee.entry(callee).or_default();
            if max.is_some_and(|limit| examples.len() >= limit) {
                continue;
            }
            let example = format!("called by {}", caller.qualified_name);
            if !examples.contains(&example) {
                examples.push(example);
            }
        }
    }

    debug!(resolved, callees = by_callee.len(), "collected call examples");

    by_callee
        .into_iter()
        .map(|(callee, examples)| (index.callables[callee].qualified_name.clone(), examples))
        .collect()
}

/// Line extent and call sites of callable `c`.
pub fn callable_body(index: &ProgramIndex, c: usize, positions: PositionMode) -> Option<CallableBody> {
    let entry = &index.callables[c];
    let body = entry.fact.body.as_ref()?;
    let file = &index.file(entry.loc).path;

    let call_sites = body
        .calls
        .iter()
        .map(|call| {
            let scope = Scope::body(entry.loc, body, call.span.start_byte);
            let target = match index.resolve_call(&call.callee, scope) {
                Some(Target::Static(callee)) => index.callables[callee].qualified_name.clone(),
                Some(Target::Dynamic { iface, method }) => {
                    format!("{}.{}", index.types[iface].qualified_name, method)
                }
                None => call.text.clone(),
            };
            CallSite {
                target,
                position: positions.slot(span_position(file, &call.span)),
                kind: call.kind.into(),
            }
        })
        .collect();

    Some(CallableBody {
        start_line: body.span.start_line,
        end_line: body.span.end_line,
        line_count: body.span.end_line - body.span.start_line + 1,
        call_sites,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EdgeKind, Slot};
    use crate::symbols::index::tests::program;

    const SOURCE: &str = r#"package main

func add(a, b int) int { return a + b }

func twice(x int) int {
	return add(x, x)
}

func main() {
	add(1, 2)
	add(3, 4)
	twice(5)
	println(add(6, 7))
}
"#;

    #[test]
    fn test_callers_are_distinct() {
        let program = program(&[("app", &[("main.go", SOURCE)])]);
        let index = ProgramIndex::build(&program);
        let examples = collect_call_examples(&index, None);

        assert_eq!(
            examples["app.add"],
            vec!["called by app.twice".to_string(), "called by app.main".to_string()]
        );
        assert_eq!(examples["app.twice"], vec!["called by app.main".to_string()]);
        assert!(!examples.contains_key("app.main"));
    }

    #[test]
    fn test_cap_limits_examples() {
        let program = program(&[("app", &[("main.go", SOURCE)])]);
        let index = ProgramIndex::build(&program);
        let examples = collect_call_examples(&index, Some(1));
        assert_eq!(examples["app.add"], vec!["called by app.twice".to_string()]);
    }

    #[test]
    fn test_body_lists_call_sites() {
        let source = r#"package main

import "fmt"

type Shape interface{ Area() float64 }

func measure(s Shape) {
	defer fmt.Println("done")
	go s.Area()
	twice(add(1, 2))
}

func add(a, b int) int { return a + b }

func twice(x int) int { return x * 2 }
"#;
        let program = program(&[("app", &[("main.go", source)])]);
        let index = ProgramIndex::build(&program);
        let measure = index.callable_index("app.measure").unwrap();
        let body = callable_body(&index, measure, PositionMode::Detailed).unwrap();

        assert_eq!(body.start_line, 7);
        assert_eq!(body.end_line, 11);
        assert_eq!(body.line_count, 5);

        let sites: Vec<(&str, EdgeKind)> = body
            .call_sites
            .iter()
            .map(|s| (s.target.as_str(), s.kind))
            .collect();
        assert_eq!(
            sites,
            vec![
                ("fmt.Println", EdgeKind::Defer),
                ("app.Shape.Area", EdgeKind::Go),
                ("app.twice", EdgeKind::Call),
                ("app.add", EdgeKind::Call),
            ]
        );
        assert_eq!(body.call_sites[2].position.as_ref().unwrap().start_line, 10);

        let none = callable_body(&index, measure, PositionMode::None).unwrap();
        assert_eq!(none.call_sites[0].position, Slot::Omitted);
    }
}
