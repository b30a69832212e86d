use xmd::config::Config;
use xmd::processor::Processor;
use xmd::script::{parse_program, AstValue, Evaluator};

fn run(src: &str) -> (String, Evaluator) {
    let (program, errors) = parse_program(src);
    assert!(errors.is_empty(), "parse errors in {src:?}: {errors:?}");
    let mut ev = Evaluator::new();
    let out = ev.evaluate_program(&program);
    (out, ev)
}

fn value(ev: &Evaluator, name: &str) -> AstValue {
    ev.variable(name)
        .unwrap_or_else(|| panic!("variable '{name}' not set"))
}

// ── Loops ─────────────────────────────────────────────────────────────────────

#[test]
fn empty_collection_loop_is_silent_success() {
    let (out, ev) = run("for x in [] { print(x) }");
    assert_eq!(out, "");
    assert!(!ev.has_error());
    assert!(ev.variable("x").is_none());

    let (out, ev) = run("set empty = []\nfor x in empty\n    print(x)");
    assert_eq!(out, "");
    assert!(!ev.has_error());
}

#[test]
fn undefined_collection_loop_is_error() {
    let (_, ev) = run("for x in undefined_name { print(x) }");
    assert!(ev.has_error());
}

#[test]
fn range_loop_is_inclusive() {
    let (_, ev) = run("set seen = []\nfor i in 1..5 { seen = seen + [i] }");
    let AstValue::Array(items) = value(&ev, "seen") else {
        panic!("expected array");
    };
    let nums: Vec<f64> = items.iter().filter_map(AstValue::as_number).collect();
    assert_eq!(nums, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
}

#[test]
fn break_stops_after_third_iteration() {
    let (out, ev) = run(
        "set n = 0\nfor i in [1, 2, 3, 4, 5] { n += 1; if i == 3 { break } }\nprint(\"done\")",
    );
    assert_eq!(value(&ev, "n"), AstValue::Number(3.0));
    assert_eq!(out, "done\n");
    assert!(!ev.has_error());
}

// ── Truthiness ────────────────────────────────────────────────────────────────

#[test]
fn truthiness_table() {
    let cases = [
        ("\"\"", false),
        ("\"nonempty\"", true),
        ("0", false),
        ("1", true),
        ("[]", false),
        ("[1]", true),
        ("null", false),
        ("{a: 1}", true),
        ("true", true),
        ("false", false),
    ];
    for (expr, want) in cases {
        let (out, _) = run(&format!("set v = {expr}\nif v then print(\"T\") else print(\"F\")"));
        let want = if want { "T\n" } else { "F\n" };
        assert_eq!(out, want, "truthiness of {expr}");
    }
}

// ── Ternary, try/catch, methods ───────────────────────────────────────────────

#[test]
fn ternary_untaken_branch_has_no_effect() {
    let (_, ev) = run(
        "function touch() {\n  touched = true\n  return 0\n}\nset r = true ? \"x\" : touch()\nset s = false ? touch() : \"y\"",
    );
    assert_eq!(value(&ev, "r"), AstValue::string("x"));
    assert_eq!(value(&ev, "s"), AstValue::string("y"));
    assert!(ev.variable("touched").is_none());
}

#[test]
fn ternary_skips_assignment_in_untaken_branch() {
    let (_, ev) = run("set r = true ? \"x\" : (set y = \"z\")");
    assert_eq!(value(&ev, "r"), AstValue::string("x"));
    assert!(ev.variable("y").is_none());

    let (_, ev) = run("set r = false ? \"x\" : (set y = \"z\")");
    assert_eq!(value(&ev, "y"), AstValue::string("z"));
}

#[test]
fn try_catch_yields_thrown_value_and_clears_error() {
    let (program, _) = parse_program("try { throw \"boom\" } catch (e) { e }");
    let mut ev = Evaluator::new();
    assert_eq!(ev.evaluate(&program).unwrap(), AstValue::string("boom"));
    assert!(!ev.has_error());

    let (out, ev) = run("try { throw \"boom\" } catch (e) { set caught = e }\nprint(\"still running\")");
    assert_eq!(out, "still running\n");
    assert_eq!(value(&ev, "caught"), AstValue::string("boom"));
    assert!(!ev.has_error());
}

#[test]
fn successful_try_keeps_earlier_error() {
    let mut p = Processor::default();
    let doc = "<!-- xmd: throw \"early\" -->\n\
               <!-- xmd: try { throw \"inner\" } catch (e) { set got = e } -->\n\
               <!-- xmd: try { set ok = 1 } catch (e) { set never = e } -->";
    let out = p.process(doc);
    assert_eq!(out, "\n\n");
    let ev = p.evaluator();
    assert!(ev.has_error());
    assert_eq!(ev.error_message(), Some("early"));
    assert_eq!(value(ev, "got"), AstValue::string("inner"));
    assert_eq!(value(ev, "ok"), AstValue::Number(1.0));
    assert!(ev.variable("never").is_none());
}

#[test]
fn oversized_builtin_results_are_catchable_errors() {
    let (out, ev) = run("print(\"ab\".repeat(1e19))");
    assert_eq!(out, "");
    assert!(ev.has_error());

    let (out, ev) = run("try { set r = range(0, 1e12) } catch (e) { print(\"too big\") }");
    assert_eq!(out, "too big\n");
    assert!(!ev.has_error());
}

#[test]
fn string_method_on_number_is_error() {
    let (_, ev) = run("set n = 42\nn.upper()");
    assert!(ev.has_error());
}

#[test]
fn same_ast_same_output() {
    let src = "set xs = [\"b\", \"a\"]\nfor i, x in xs\n    print(i + \"=\" + x.upper())\nset o = {k: 1}\nprint(json.stringify(o))";
    let (program, _) = parse_program(src);
    let first = Evaluator::new().evaluate_program(&program);
    let second = Evaluator::new().evaluate_program(&program);
    assert_eq!(first, second);
    assert_eq!(first, "0=B\n1=A\n{\"k\":1}\n");
}

// ── Scenarios ─────────────────────────────────────────────────────────────────

#[test]
fn hello_world() {
    let (out, _) = run("set name = \"World\"\nprint(\"Hello \" + name)");
    assert!(out.contains("Hello World"));
}

#[test]
fn concatenate_in_loop() {
    let (_, ev) = run("set arr = [\"a\", \"b\", \"c\"]\nset result = \"\"\nfor item in arr { result += item }");
    assert_eq!(value(&ev, "result"), AstValue::string("abc"));
}

#[test]
fn loop_times() {
    let (_, ev) = run("set count = 0\nloop 3 times { count += 1 }");
    assert_eq!(value(&ev, "count"), AstValue::Number(3.0));
}

#[test]
fn nested_functions_and_classes() {
    let src = "\
class Counter
    constructor start
        set total = start
    add n
        total += n
        return total

Counter.constructor(10)
Counter.add(5)
print(\"total: \" + total)";
    let (out, ev) = run(src);
    assert!(!ev.has_error(), "{:?}", ev.error_message());
    assert_eq!(out, "15\ntotal: 15\n");
}

#[test]
fn loop_guard_is_catchable() {
    let mut cfg = Config::default();
    cfg.max_loop_iterations = 10;
    let mut ev = Evaluator::with_config(cfg);
    let (program, _) = parse_program("try\n    while true { spin += 1 }\ncatch err\n    print(\"stopped\")");
    let out = ev.evaluate_program(&program);
    assert_eq!(out, "stopped\n");
    assert!(!ev.has_error());
}
