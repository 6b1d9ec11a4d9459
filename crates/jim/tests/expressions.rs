use jim::Interp;
use pretty_assertions::assert_eq;

fn expr(expression: &str) -> String {
    let mut interp = Interp::new();
    interp
        .eval(&format!("expr {{{expression}}}"))
        .unwrap_or_else(|e| panic!("expr failed: {e}\nexpression: {expression}"))
}

fn expr_err(expression: &str) -> String {
    let mut interp = Interp::new();
    interp
        .eval(&format!("expr {{{expression}}}"))
        .expect_err("expression should fail")
        .message
}

#[test]
fn integer_arithmetic() {
    assert_eq!(expr("1+2"), "3");
    assert_eq!(expr("7*6"), "42");
    assert_eq!(expr("3/2"), "1");
    assert_eq!(expr("7%3"), "1");
    assert_eq!(expr("10-4-3"), "3");
}

#[test]
fn precedence_and_parentheses() {
    assert_eq!(expr("1+2*3"), "7");
    assert_eq!(expr("(1+2)*3"), "9");
    assert_eq!(expr("2*3%4"), "2");
    assert_eq!(expr("1+2 < 4"), "1");
}

#[test]
fn double_arithmetic_and_promotion() {
    assert_eq!(expr("3/2.0"), "1.5");
    assert_eq!(expr("1+2.5"), "3.5");
    assert_eq!(expr("1.5+1.5"), "3.0");
    assert_eq!(expr("2.0*3"), "6.0");
}

#[test]
fn integer_literal_round_trip() {
    assert_eq!(expr("12345"), "12345");
    assert_eq!(expr("-7"), "-7");
    assert_eq!(expr("0x10"), "16");
}

#[test]
fn shifts_and_rotations() {
    assert_eq!(expr("1<<3"), "8");
    assert_eq!(expr("-8>>1"), "-4");
    assert_eq!(expr("1 <<< 1"), "2");
    // Rotation counts wrap modulo 32.
    assert_eq!(expr("1 <<< 33"), "2");
    assert_eq!(expr("0x80000000 >>> 4"), "134217728");
    assert_eq!(expr("0x80000000 <<< 1"), "1");
}

#[test]
fn integer_only_operators_reject_doubles() {
    assert_eq!(expr_err("1.0 % 2"), "got floating-point value where integer was expected");
    assert_eq!(expr_err("1.5 & 1"), "got floating-point value where integer was expected");
    assert_eq!(expr_err("2.0 << 1"), "got floating-point value where integer was expected");
    assert_eq!(expr_err("~1.5"), "got floating-point value where integer was expected");
}

#[test]
fn division_by_zero() {
    assert_eq!(expr_err("1/0"), "Division by zero");
    assert_eq!(expr_err("1%0"), "Division by zero");
}

#[test]
fn catch_traps_division_by_zero() {
    let mut interp = Interp::new();
    assert_eq!(interp.eval("catch { expr {1/0} } msg").unwrap(), "1");
    assert_eq!(interp.eval("set msg").unwrap(), "Division by zero");
}

#[test]
fn comparisons() {
    assert_eq!(expr("1 < 2"), "1");
    assert_eq!(expr("2 <= 2"), "1");
    assert_eq!(expr("3 > 4"), "0");
    assert_eq!(expr("1 == 1.0"), "1");
    assert_eq!(expr("1 != 1"), "0");
}

#[test]
fn string_comparison_is_bytewise() {
    assert_eq!(expr("\"abc\" eq \"abc\""), "1");
    assert_eq!(expr("\"abc\" ne \"abd\""), "1");
    // Numeric equality and byte equality disagree on purpose.
    assert_eq!(expr("1 eq 1.0"), "0");
    assert_eq!(expr("1 == 1.0"), "1");
}

#[test]
fn logical_operators() {
    assert_eq!(expr("1 && 2"), "1");
    assert_eq!(expr("1 && 0"), "0");
    assert_eq!(expr("0 || 2"), "1");
    assert_eq!(expr("0 || 0"), "0");
    assert_eq!(expr("!0"), "1");
    assert_eq!(expr("!3"), "0");
}

#[test]
fn logical_operands_always_evaluate() {
    // No short-circuit: the right-hand command runs even when the left side
    // already decides the result.
    let mut interp = Interp::new();
    interp.eval("set side 0").unwrap();
    assert_eq!(interp.eval("expr {0 && [incr side]}").unwrap(), "0");
    assert_eq!(interp.eval("set side").unwrap(), "1");
    assert_eq!(interp.eval("expr {1 || [incr side]}").unwrap(), "1");
    assert_eq!(interp.eval("set side").unwrap(), "2");
}

#[test]
fn unary_operators() {
    assert_eq!(expr("-3 + 5"), "2");
    assert_eq!(expr("- -3"), "3");
    assert_eq!(expr("+7"), "7");
    assert_eq!(expr("~0"), "-1");
    assert_eq!(expr("-2.5"), "-2.5");
}

#[test]
fn variables_and_commands_as_operands() {
    let mut interp = Interp::new();
    interp.eval("set x 4").unwrap();
    assert_eq!(interp.eval("expr {$x * 2}").unwrap(), "8");
    assert_eq!(interp.eval("expr {[+ 1 2] * 2}").unwrap(), "6");
    interp.eval("set a(k) 5").unwrap();
    assert_eq!(interp.eval("expr {$a(k) + 1}").unwrap(), "6");
}

#[test]
fn multi_word_expressions_concatenate() {
    let mut interp = Interp::new();
    interp.eval("set i 4").unwrap();
    assert_eq!(interp.eval("expr $i == 4").unwrap(), "1");
}

#[test]
fn conditions_accept_doubles() {
    let mut interp = Interp::new();
    assert_eq!(interp.eval("if {1.5} {set r yes} else {set r no}").unwrap(), "yes");
    assert_eq!(interp.eval("if {0.0} {set r yes} else {set r no}").unwrap(), "no");
}

#[test]
fn parse_errors() {
    assert_eq!(expr_err("1 +"), "syntax error in expression");
    assert_eq!(expr_err("1 2"), "syntax error in expression");
    assert_eq!(expr_err("(1"), "missing close parenthesis");
    assert_eq!(expr_err("1)"), "unexpected close parenthesis");
    assert_eq!(expr_err("1 ? 2 : 3"), "syntax error in expression");
}

#[test]
fn numeric_operand_errors() {
    assert_eq!(expr_err("\"abc\" + 1"), "expected number but got 'abc'");
    assert_eq!(expr_err("99999999999999999999"), "integer value too big to be represented");
}

#[test]
fn arithmetic_commands_promote_like_expr() {
    let mut interp = Interp::new();
    assert_eq!(interp.eval("+ 1 2 3").unwrap(), "6");
    assert_eq!(interp.eval("+ 1 2.5").unwrap(), "3.5");
    assert_eq!(interp.eval("* 2 3 4").unwrap(), "24");
    assert_eq!(interp.eval("- 10 3").unwrap(), "7");
    assert_eq!(interp.eval("- 5").unwrap(), "-5");
    assert_eq!(interp.eval("/ 7 2").unwrap(), "3");
    assert_eq!(interp.eval("/ 7 2.0").unwrap(), "3.5");
    assert_eq!(interp.eval("catch {/ 1 0} msg").unwrap(), "1");
    assert_eq!(interp.eval("set msg").unwrap(), "Division by zero");
}

#[test]
fn cached_expression_reevaluates_per_scope() {
    // The same braced expression value is compiled once and re-run against
    // each call's variables.
    let mut interp = Interp::new();
    interp.eval("proc test n { expr {$n * 2} }").unwrap();
    assert_eq!(interp.eval("test 2").unwrap(), "4");
    assert_eq!(interp.eval("test 21").unwrap(), "42");
}
