use jsfix::{RuleKind, RuleSettings, apply_source};

fn fix(rule: RuleKind, source: &str) -> String {
    apply_source(rule, source, None, &RuleSettings::default())
        .unwrap()
        .source
}

#[test]
fn leaking_global_is_declared_in_its_function() {
    assert_eq!(
        fix(RuleKind::LeakingGlobalVars, "function test() { i = 0; }"),
        "function test() {\n  var i;\n  i = 0;\n}"
    );
}

#[test]
fn unused_assignment_is_dropped() {
    assert_eq!(
        fix(RuleKind::UnusedAssignedVars, "function test() { i = 0; }"),
        "function test() {}"
    );
}

#[test]
fn unused_declarator_is_removed() {
    assert_eq!(
        fix(RuleKind::NoUnusedVars, "function f(){ var a = 1, b = 2; return a; }"),
        "function f(){ var a = 1; return a; }"
    );
}

#[test]
fn side_effecting_initializer_survives() {
    assert_eq!(
        fix(RuleKind::NoUnusedVars, "function f(){ var a = 1, b = g(); return a; }"),
        "function f(){ var a = 1; g(); return a; }"
    );
}

#[test]
fn for_in_header_declaration_is_promoted() {
    assert_eq!(
        fix(RuleKind::BlockScopedVars, "for (var k in obj) { use(k); }"),
        "var k;\nfor (k in obj) { use(k); }"
    );
}

#[test]
fn regex_statement_after_a_function_is_kept() {
    assert_eq!(
        fix(
            RuleKind::LeakingGlobalVars,
            "function f() { i = 0; }\n/^\\s+/.test(s) && g();"
        ),
        "function f() {\n  var i;\n  i = 0;\n}\n/^\\s+/.test(s) && g();"
    );
}

#[test]
fn every_rule_is_idempotent_on_a_mixed_file() {
    let source = "\
var total_count = 0;
function tally(items, _unused) {
  for (var i = 0; i < items.length; i++) {
    seen = items[i];
    total_count += items[i] > 10 ? 2 : items[i] > 5 ? 1 : 0;
  }
  if (!items.length) {
    reset();
  } else {
    if (seen) {
      report(seen);
    }
  }
  return total_count;
}
";
    for rule in RuleKind::ALL {
        let once = fix(rule, source);
        let twice = fix(rule, &once);
        assert_eq!(twice, once, "{rule} is not idempotent");
        jsfix::SyntaxTree::parse(&once).unwrap_or_else(|err| panic!("{rule} broke the file: {err}"));
    }
}
