use grafcet_core::element::{ActionQualifier, GateKind, StepType};
use grafcet_parser::{Statement, error::ErrorCode, parse};
use proptest::prelude::*;

fn codes(source: &str) -> Vec<ErrorCode> {
    parse(source)
        .expect_err("source should not parse")
        .diagnostics()
        .iter()
        .filter_map(|d| d.code())
        .collect()
}

#[test]
fn test_linear_chart() {
    let source = r#"
SFC "Conveyor"
Step 0 (Initial) "Idle"
Transition "Start"
Step 1
    Action "Motor" S
    Action Lamp (D, "5s")
Transition T7 Done AND NOT Fault
Jump 0
"#;

    let input = parse(source).expect("Failed to parse");
    assert_eq!(input.title.as_ref().map(|t| t.inner().as_str()), Some("Conveyor"));
    assert_eq!(input.statements.len(), 5);

    let Statement::Step(idle) = input.statements[0].inner() else {
        panic!("Expected step");
    };
    assert_eq!(idle.number, 0);
    assert_eq!(idle.step_type, StepType::Initial);
    assert_eq!(idle.label.as_deref(), Some("Idle"));

    let Statement::Transition(start) = input.statements[1].inner() else {
        panic!("Expected transition");
    };
    assert_eq!(start.name, None);
    assert_eq!(start.condition.inner(), "Start");

    let Statement::Step(running) = input.statements[2].inner() else {
        panic!("Expected step");
    };
    assert_eq!(running.number, 1);
    assert_eq!(running.actions.len(), 2);
    assert_eq!(running.actions[0].variable, "Motor");
    assert_eq!(running.actions[0].qualifier, ActionQualifier::Set);
    assert_eq!(running.actions[1].qualifier, ActionQualifier::Delayed);
    assert_eq!(running.actions[1].duration.as_deref(), Some("5s"));

    let Statement::Transition(done) = input.statements[3].inner() else {
        panic!("Expected transition");
    };
    assert_eq!(done.name.as_deref(), Some("T7"));
    assert_eq!(done.condition.inner(), "Done AND NOT Fault");

    let Statement::Jump(jump) = input.statements[4].inner() else {
        panic!("Expected jump");
    };
    assert_eq!(*jump.target.inner(), 0);
}

#[test]
fn test_step_numbering() {
    let source = "Step S3 (Initial)\nTransition\nStep Fill\nTransition\nStep 10\nTransition\nStep Drain\n";
    let input = parse(source).expect("Failed to parse");

    let numbers: Vec<u32> = input
        .steps()
        .iter()
        .filter_map(|s| match s.inner() {
            Statement::Step(step) => Some(step.number),
            _ => None,
        })
        .collect();
    assert_eq!(numbers, vec![3, 4, 10, 11]);
}

#[test]
fn test_nested_divergences() {
    let source = r#"
Step 0 (Initial)
Transition go
Divergence AND
Branch
    Step 1
    Divergence OR
    Branch
        Transition a
        Step 3
        Transition a_done
    EndBranch
    Branch
        Transition b
        Step 4
        Transition b_done
    EndBranch
    EndDivergence OR
    Step 5
EndBranch
Branch
    Step 2
EndBranch
EndDivergence AND
Transition join
Jump 0
"#;

    let input = parse(source).expect("Failed to parse");
    assert_eq!(input.statements.len(), 5);

    let Statement::Divergence(and) = input.statements[2].inner() else {
        panic!("Expected divergence");
    };
    assert_eq!(and.kind, GateKind::And);
    assert_eq!(and.branches.len(), 2);
    assert!(and.branches.iter().all(|b| b.closed));
    assert_eq!(and.end.and_then(|end| end.kind), Some(GateKind::And));

    let nested = &and.branches[0].statements;
    assert_eq!(nested.len(), 3);
    let Statement::Divergence(or) = nested[1].inner() else {
        panic!("Expected nested divergence");
    };
    assert_eq!(or.kind, GateKind::Or);
    assert_eq!(or.branches[1].statements.len(), 3);

    assert_eq!(input.steps().len(), 6);
}

#[test]
fn test_unclosed_divergence_is_kept() {
    let source = "Step 0 (Initial)\nTransition\nDivergence AND\nBranch\nStep 1\n";
    let input = parse(source).expect("Failed to parse");

    let Statement::Divergence(block) = input.statements[2].inner() else {
        panic!("Expected divergence");
    };
    assert!(block.end.is_none());
    assert_eq!(block.branches.len(), 1);
    assert!(!block.branches[0].closed);
}

#[test]
fn test_duplicate_step_number() {
    let err = parse("Step 1 (Initial)\nTransition\nStep S1\n").unwrap_err();
    let diag = &err.diagnostics()[0];
    assert_eq!(diag.code(), Some(ErrorCode::E103));
    assert_eq!(diag.line_col("Step 1 (Initial)\nTransition\nStep S1\n"), Some((3, 1)));
    assert_eq!(diag.labels().len(), 2);
}

#[test]
fn test_nesting_errors() {
    assert_eq!(codes("Branch\n"), vec![ErrorCode::E106]);
    assert_eq!(codes("EndBranch\n"), vec![ErrorCode::E106]);
    assert_eq!(codes("EndDivergence\n"), vec![ErrorCode::E106]);
    assert_eq!(
        codes("Divergence OR\nBranch\nBranch\nEndBranch\nEndDivergence\n"),
        vec![ErrorCode::E106]
    );
    assert_eq!(
        codes("Divergence OR\nBranch\nTransition\nEndDivergence\n"),
        vec![ErrorCode::E106]
    );
    assert_eq!(codes("Divergence OR\nStep 1\n"), vec![ErrorCode::E106]);
}

#[test]
fn test_attachment_errors() {
    assert_eq!(codes("Action Motor\n"), vec![ErrorCode::E104]);
    assert_eq!(
        codes("Step 0\nTransition\nAction Motor\n"),
        vec![ErrorCode::E104]
    );
    assert_eq!(codes("Step 0\nAction Motor X\n"), vec![ErrorCode::E105]);
}

#[test]
fn test_statement_errors() {
    assert_eq!(codes("Motor on\n"), vec![ErrorCode::E102]);
    assert_eq!(codes("Jump\n"), vec![ErrorCode::E101]);
    assert_eq!(codes("Jump x\n"), vec![ErrorCode::E100]);
    assert_eq!(codes("Jump 1.5\n"), vec![ErrorCode::E109]);
    assert_eq!(codes("Step 0 (Start)\n"), vec![ErrorCode::E107]);
    assert_eq!(codes("Step 0 \"a\" \"b\"\n"), vec![ErrorCode::E100]);
}

#[test]
fn test_errors_are_collected_across_lines() {
    let source = "Step 0 (Initial)\nBranch\nStep 0\nAction\n";
    let err = parse(source).unwrap_err();
    let codes: Vec<_> = err.diagnostics().iter().filter_map(|d| d.code()).collect();
    assert_eq!(codes, vec![ErrorCode::E106, ErrorCode::E103, ErrorCode::E101]);
}

#[test]
fn test_lexer_errors_stop_before_parsing() {
    let err = parse("Step 0 (Initial)\nTransition \"open\nStep 1 @\n").unwrap_err();
    let codes: Vec<_> = err.diagnostics().iter().filter_map(|d| d.code()).collect();
    assert_eq!(codes, vec![ErrorCode::E001, ErrorCode::E002]);
}

#[test]
fn test_comments_and_blank_lines() {
    let source = "// tank filling\n\nStep 0 (Initial) // idle\n\n   \nTransition level > 80 // full\n";
    let input = parse(source).expect("Failed to parse");
    assert_eq!(input.statements.len(), 2);

    let Statement::Transition(t) = input.statements[1].inner() else {
        panic!("Expected transition");
    };
    assert_eq!(t.condition.inner(), "level > 80");
}

fn check_sequential_chart_parses(len: usize) -> Result<(), TestCaseError> {
    let mut source = String::from("Step 0 (Initial)\n");
    for i in 1..=len {
        source.push_str(&format!("Transition \"t{i}\"\nStep {i}\n    Action out{i} N\n"));
    }
    source.push_str("Transition\nJump 0\n");

    let input = parse(&source).map_err(|e| TestCaseError::fail(e.to_string()))?;
    prop_assert_eq!(input.steps().len(), len + 1);
    prop_assert_eq!(input.statements.len(), 2 * len + 3);
    Ok(())
}

fn check_step_numbers_are_unique(labels: &[String]) -> Result<(), TestCaseError> {
    let source: String = labels
        .iter()
        .map(|label| format!("Step {label}\nTransition\n"))
        .collect();

    let Ok(input) = parse(&source) else {
        return Ok(());
    };
    let mut numbers: Vec<u32> = input
        .steps()
        .iter()
        .filter_map(|s| match s.inner() {
            Statement::Step(step) => Some(step.number),
            _ => None,
        })
        .collect();
    let total = numbers.len();
    numbers.sort_unstable();
    numbers.dedup();
    prop_assert_eq!(numbers.len(), total);
    Ok(())
}

proptest! {
    #[test]
    fn sequential_chart_parses(len in 1usize..20) {
        check_sequential_chart_parses(len)?;
    }

    #[test]
    fn step_numbers_are_unique(labels in prop::collection::vec("[A-Z][a-z]{0,4}[0-9]{0,2}", 1..12)) {
        check_step_numbers_are_unique(&labels)?;
    }
}
