//! Tests for formula evaluation through the manager

use pretty_assertions::assert_eq;
use reckon::prelude::*;

fn n(v: f64) -> Option<Thing> {
    Some(Thing::Number(v))
}

/// Test basic formulas without variable references
#[test]
fn test_evaluate_simple_formulas() {
    let m = FormulaManager::standard().unwrap();

    // Arithmetic
    m.assign_formula("x", "1+2*3").unwrap();
    assert_eq!(m.get_thing("x").unwrap(), n(7.0));

    // Text concatenation
    m.assign_formula("greeting", "\"Hello \" & \"World\"").unwrap();
    assert_eq!(
        m.get_thing("greeting").unwrap(),
        Some(Thing::text("Hello World"))
    );

    // Comparison
    m.assign_formula("cmp", "5>3").unwrap();
    assert_eq!(m.get_thing("cmp").unwrap(), Some(Thing::Bool(true)));

    // Scientific notation
    m.assign_formula("small", "2.5e-1 * 4").unwrap();
    assert_eq!(m.get_thing("small").unwrap(), n(1.0));
}

/// Test built-in functions
#[test]
fn test_evaluate_functions() {
    let m = FormulaManager::standard().unwrap();

    m.assign_formula("s", "SUM(1,2,3,4,5)").unwrap();
    assert_eq!(m.get_thing("s").unwrap(), n(15.0));

    m.assign_formula("yes", "IF(1>0, \"Yes\", \"No\")").unwrap();
    assert_eq!(m.get_thing("yes").unwrap(), Some(Thing::text("Yes")));

    m.assign_formula("no", "if(1<0, \"Yes\", \"No\")").unwrap();
    assert_eq!(m.get_thing("no").unwrap(), Some(Thing::text("No")));

    m.assign_formula("r", "round(sqrt(2), 3)").unwrap();
    assert_eq!(m.get_thing("r").unwrap(), n(1.414));

    m.assign_formula("l", "len(list(1, 2, 3)) + len(\"abcd\")").unwrap();
    assert_eq!(m.get_thing("l").unwrap(), n(7.0));

    assert_eq!(m.get_errors("s"), None);
}

/// A+B follows its inputs without being reassigned
#[test]
fn test_dependents_follow_inputs() {
    let m = FormulaManager::standard().unwrap();
    m.set_thing("A", 2.0).unwrap();
    m.set_thing("B", 3.0).unwrap();
    m.assign_formula("C", "A+B").unwrap();
    assert_eq!(m.get_thing("C").unwrap(), n(5.0));

    m.set_thing("A", 10.0).unwrap();
    assert_eq!(m.get_thing("C").unwrap(), n(13.0));
    assert_eq!(m.get_errors("C"), None);
}

/// Changes propagate through chains and diamonds
#[test]
fn test_propagation_through_graph() {
    let m = FormulaManager::standard().unwrap();
    m.set_thing("base", 1.0).unwrap();
    m.assign_formula("left", "base * 2").unwrap();
    m.assign_formula("right", "base + 10").unwrap();
    m.assign_formula("top", "left + right").unwrap();
    assert_eq!(m.get_thing("top").unwrap(), n(13.0));

    m.set_thing("base", 5.0).unwrap();
    assert_eq!(m.get_thing("left").unwrap(), n(10.0));
    assert_eq!(m.get_thing("right").unwrap(), n(15.0));
    assert_eq!(m.get_thing("top").unwrap(), n(25.0));
    assert_eq!(
        m.get_dependents("base").unwrap(),
        vec!["left".to_string(), "right".to_string()]
    );
}

/// Reassigning a formula rewires its edges
#[test]
fn test_reassignment_rewires() {
    let m = FormulaManager::standard().unwrap();
    m.set_thing("a", 1.0).unwrap();
    m.set_thing("b", 100.0).unwrap();
    m.assign_formula("c", "a + 1").unwrap();
    m.assign_formula("c", "b + 1").unwrap();
    assert_eq!(m.get_thing("c").unwrap(), n(101.0));
    assert_eq!(m.get_dependencies("c").unwrap(), vec!["b".to_string()]);
    assert!(m.get_dependents("a").unwrap().is_empty());

    // The old input no longer drives the formula.
    m.set_thing("a", 50.0).unwrap();
    assert_eq!(m.get_thing("c").unwrap(), n(101.0));
}

/// A cycle is rejected, logged, and the previous definition kept
#[test]
fn test_cycle_rejected() {
    let m = FormulaManager::standard().unwrap();
    m.set_thing("C", 7.0).unwrap();
    m.assign_formula("A", "C * 2").unwrap();
    m.assign_formula("B", "A+1").unwrap();

    let err = m.assign_formula("A", "B+1").unwrap_err();
    assert!(matches!(err, FormulaError::InfiniteLoop(_)));
    assert_eq!(
        m.get_errors("A"),
        Some(vec!["formula creates an infinite loop".to_string()])
    );

    assert_eq!(m.get_formula("A").unwrap().as_deref(), Some("C * 2"));
    assert_eq!(m.get_dependencies("A").unwrap(), vec!["C".to_string()]);
    assert_eq!(m.get_dependents("A").unwrap(), vec!["B".to_string()]);
    assert!(m.get_dependents("B").unwrap().is_empty());

    // The restored formula is still live.
    m.set_thing("C", 1.0).unwrap();
    assert_eq!(m.get_thing("A").unwrap(), n(2.0));
    assert_eq!(m.get_thing("B").unwrap(), n(3.0));
}

/// Longer cycles are found through intermediate variables
#[test]
fn test_indirect_cycle_rejected() {
    let m = FormulaManager::standard().unwrap();
    m.assign_formula("b", "a + 1").unwrap();
    m.assign_formula("c", "b + 1").unwrap();
    m.assign_formula("d", "c + 1").unwrap();
    assert!(matches!(
        m.assign_formula("a", "1 + d"),
        Err(FormulaError::InfiniteLoop(_))
    ));
    assert!(m.get_dependencies("a").unwrap().is_empty());

    m.set_thing("a", 0.0).unwrap();
    assert_eq!(m.get_thing("d").unwrap(), n(3.0));
}

/// A variable can be removed only once nothing reads it
#[test]
fn test_remove_requires_no_dependents() {
    let m = FormulaManager::standard().unwrap();
    m.set_thing("A", 1.0).unwrap();
    m.assign_formula("B", "A * 3").unwrap();

    assert!(!m.can_be_removed("A").unwrap());
    match m.remove("A") {
        Err(FormulaError::InUse { name, dependents }) => {
            assert_eq!(name, "A");
            assert_eq!(dependents, vec!["B".to_string()]);
        }
        other => panic!("expected InUse, got {:?}", other),
    }
    assert!(m.exists("A"));
    assert_eq!(m.get_dependents("A").unwrap(), vec!["B".to_string()]);

    m.assign_formula("B", "2").unwrap();
    assert!(m.can_be_removed("A").unwrap());
    m.remove("A").unwrap();
    assert!(!m.exists("A"));

    // Removing a formula variable also drops its own edges.
    m.set_thing("x", 1.0).unwrap();
    m.assign_formula("y", "x + 1").unwrap();
    m.remove("y").unwrap();
    assert!(m.get_dependents("x").unwrap().is_empty());
    assert_eq!(m.get_reference("x").unwrap().subscriber_count(), 0);
}

/// get_errors returns the log once, then nothing
#[test]
fn test_get_errors_clears_log() {
    let m = FormulaManager::standard().unwrap();
    m.assign_formula("bad", "sqrt(0 - 1)").unwrap();

    let errors = m.get_errors("bad").unwrap();
    assert_eq!(
        errors,
        vec![
            "could not evaluate function sqrt".to_string(),
            "formula evaluated to no value".to_string(),
        ]
    );
    assert_eq!(m.get_errors("bad"), None);
}

/// Evaluation errors stay on the variable that produced them
#[test]
fn test_errors_do_not_cascade() {
    let m = FormulaManager::standard().unwrap();
    m.set_thing("x", 4.0).unwrap();
    m.assign_formula("root", "sqrt(x)").unwrap();
    m.assign_formula("twice", "root * 2").unwrap();
    assert_eq!(m.get_thing("twice").unwrap(), n(4.0));

    // root fails and keeps its old value, so twice is not recomputed.
    m.set_thing("x", -1.0).unwrap();
    assert_eq!(m.get_thing("root").unwrap(), n(2.0));
    assert!(m.get_errors("root").is_some());
    assert_eq!(m.get_errors("twice"), None);
}

/// The first candidate that declines hands over to the next
#[test]
fn test_operator_candidates_fall_back() {
    let lib = StandardLibrary::new()
        .with_implementation("locked", |_| Err(CallError::NoPermission))
        .with_implementation("sum_both", |args: &[Thing]| {
            Ok(Some(Thing::Number(
                args[0].to_number()? + args[1].to_number()?,
            )))
        });
    let spec = RegistrySpec::new().binary("+", 1, &["locked", "sum_both"]);
    let m = FormulaManager::new(&spec, &lib, ManagerOptions::default()).unwrap();

    m.set_thing("a", 2.0).unwrap();
    m.assign_formula("b", "a + 40").unwrap();
    assert_eq!(m.get_thing("b").unwrap(), n(42.0));
    assert_eq!(m.get_errors("b"), None);
}

/// Named calls and implicit calls each consume only their own operands
#[test]
fn test_nested_named_and_implicit_calls() {
    let m = FormulaManager::standard().unwrap();
    m.assign_formula("v", "list(10, 20, 30)").unwrap();
    m.assign_formula("grid", "list(list(1, 2), list(3, 4))").unwrap();
    m.assign_formula("pick", "max(v(1), grid(1, 1) * 10, min(v[0], 5)) + grid[0][1]")
        .unwrap();

    assert_eq!(
        m.get_program("pick").unwrap().as_deref(),
        Some("v 1 1 grid 1 1 2 10 * v 0 1 5 2 min 3 max grid 0 1 1 1 +")
    );
    assert_eq!(m.get_thing("pick").unwrap(), n(42.0));
    assert_eq!(m.get_errors("pick"), None);

    m.assign_formula("v", "list(1, 2, 3)").unwrap();
    assert_eq!(m.get_thing("pick").unwrap(), n(42.0));
    m.assign_formula("grid", "list(list(0, 0), list(0, 0))").unwrap();
    assert_eq!(m.get_thing("pick").unwrap(), n(2.0));
}

/// Rebinding storage moves every reader to the new cell
#[test]
fn test_set_reference_moves_readers() {
    let m = FormulaManager::standard().unwrap();
    m.set_thing("price", 10.0).unwrap();
    m.assign_formula("total", "price * 2").unwrap();
    let old = m.get_reference("price").unwrap();

    let shared = ThingCell::with_value(7.0);
    m.set_reference("price", shared.clone()).unwrap();
    assert_eq!(m.get_thing("total").unwrap(), n(14.0));
    assert_eq!(old.subscriber_count(), 0);

    shared.set(8.0);
    assert_eq!(m.get_thing("total").unwrap(), n(16.0));

    // Writes to the abandoned cell are ignored.
    old.set(1000.0);
    assert_eq!(m.get_thing("total").unwrap(), n(16.0));
}

/// A text cell can drive a variable's formula
#[test]
fn test_text_reference_drives_formula() {
    let m = FormulaManager::standard().unwrap();
    m.set_thing("a", 3.0).unwrap();
    let source = ThingCell::with_value("a * 2");
    m.set_text_ref("f", source.clone()).unwrap();
    assert_eq!(m.get_formula("f").unwrap().as_deref(), Some("a * 2"));
    assert_eq!(m.get_thing("f").unwrap(), n(6.0));

    source.set("a + 100");
    assert_eq!(m.get_thing("f").unwrap(), n(103.0));

    // Bad text is logged and leaves the formula alone.
    source.set("a +");
    assert_eq!(m.get_formula("f").unwrap().as_deref(), Some("a + 100"));
    assert_eq!(m.get_errors("f").map(|e| e.len()), Some(1));

    m.clear_text_ref("f").unwrap();
    source.set("1");
    assert_eq!(m.get_formula("f").unwrap().as_deref(), Some("a + 100"));
}

/// Illegal names are rejected at creation
#[test]
fn test_illegal_names_rejected() {
    let m = FormulaManager::standard().unwrap();
    assert!(matches!(
        m.create_var("two words", None),
        Err(FormulaError::IllegalName(_))
    ));
    assert!(matches!(
        m.set_thing("a*b", 1.0),
        Err(FormulaError::IllegalName(_))
    ));
    assert!(!m.exists("a*b"));
}
