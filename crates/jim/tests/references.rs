use jim::Interp;
use pretty_assertions::assert_eq;

fn eval(interp: &mut Interp, script: &str) -> String {
    match interp.eval(script) {
        Ok(result) => result,
        Err(e) => panic!("script failed: {e}\nscript: {script}"),
    }
}

#[test]
fn tokens_are_32_bytes_with_fixed_shape() {
    let mut interp = Interp::new();
    eval(&mut interp, "set r [ref hello]");
    assert_eq!(eval(&mut interp, "string length $r"), "32");
    assert_eq!(eval(&mut interp, "string match {~reference:*:} $r"), "1");
}

#[test]
fn getref_returns_the_stored_value() {
    let mut interp = Interp::new();
    eval(&mut interp, "set r [ref hello]");
    assert_eq!(eval(&mut interp, "getref $r"), "hello");
}

#[test]
fn setref_replaces_the_stored_value() {
    let mut interp = Interp::new();
    eval(&mut interp, "set r [ref old]");
    assert_eq!(eval(&mut interp, "setref $r new"), "new");
    assert_eq!(eval(&mut interp, "getref $r"), "new");
}

#[test]
fn getref_rejects_non_tokens() {
    let mut interp = Interp::new();
    assert_eq!(eval(&mut interp, "catch {getref bogus} msg"), "1");
    assert_eq!(eval(&mut interp, "set msg"), "expected reference but got 'bogus'");
}

#[test]
fn collect_reclaims_unreachable_references() {
    let mut interp = Interp::new();
    eval(&mut interp, "set keep [ref a]");
    eval(&mut interp, "set drop [ref b]");
    eval(&mut interp, "set drop 0");
    assert_eq!(eval(&mut interp, "collect"), "1");
    assert_eq!(eval(&mut interp, "getref $keep"), "a");
    // Nothing else to reclaim on a second pass.
    assert_eq!(eval(&mut interp, "collect"), "0");
}

#[test]
fn collected_reference_is_gone() {
    let mut interp = Interp::new();
    eval(&mut interp, "set r [ref x]");
    eval(&mut interp, "set copy $r");
    eval(&mut interp, "set r 0; set copy 0");
    assert_eq!(eval(&mut interp, "collect"), "1");
}

#[test]
fn token_inside_a_list_keeps_the_reference_alive() {
    let mut interp = Interp::new();
    eval(&mut interp, "set l [list [ref x] tail]");
    assert_eq!(eval(&mut interp, "collect"), "0");
    assert_eq!(eval(&mut interp, "getref [lindex $l 0]"), "x");
}

#[test]
fn token_embedded_in_a_longer_string_counts_as_live() {
    let mut interp = Interp::new();
    eval(&mut interp, "set r [ref x]");
    eval(&mut interp, "set note \"holding $r here\"");
    eval(&mut interp, "set r 0");
    assert_eq!(eval(&mut interp, "collect"), "0");
}

#[test]
fn finalizer_runs_exactly_once_with_token_and_value() {
    let mut interp = Interp::new();
    eval(&mut interp, "set calls {}");
    eval(&mut interp, "proc finalize {token value} { global calls; lappend calls $value }");
    eval(&mut interp, "set r [ref hello finalize]");
    eval(&mut interp, "set saved_token $r");
    eval(&mut interp, "set r 0; set saved_token 0");
    assert_eq!(eval(&mut interp, "collect"), "1");
    assert_eq!(eval(&mut interp, "set calls"), "hello");
    // Already collected: no second invocation.
    eval(&mut interp, "collect");
    assert_eq!(eval(&mut interp, "llength $calls"), "1");
}

#[test]
fn finalizer_receives_the_token() {
    let mut interp = Interp::new();
    eval(&mut interp, "proc finalize {token value} { global seen; set seen $token }");
    eval(&mut interp, "set r [ref payload finalize]");
    let token = eval(&mut interp, "set r");
    eval(&mut interp, "set r 0");
    eval(&mut interp, "collect");
    // The finalizer's captured token now keeps the id marked, but the table
    // entry is gone.
    assert_eq!(eval(&mut interp, "set seen"), token);
    assert_eq!(eval(&mut interp, "catch {getref $seen}"), "1");
}

#[test]
fn finalizer_errors_are_swallowed() {
    let mut interp = Interp::new();
    eval(&mut interp, "proc finalize {token value} { error boom }");
    eval(&mut interp, "set r [ref x finalize]");
    eval(&mut interp, "set r 0");
    assert_eq!(eval(&mut interp, "collect"), "1");
    // The interpreter result survives the failing finalizer.
    assert_eq!(eval(&mut interp, "set after ok"), "ok");
}

#[test]
fn collect_preserves_the_current_result() {
    let mut interp = Interp::new();
    eval(&mut interp, "proc finalize {token value} { set ignored 1 }");
    eval(&mut interp, "set r [ref x finalize]");
    eval(&mut interp, "set r 0");
    eval(&mut interp, "set marker before");
    assert_eq!(eval(&mut interp, "list [set marker] [collect]"), "before 1");
}

#[test]
fn public_collect_entry_point() {
    let mut interp = Interp::new();
    eval(&mut interp, "set r [ref x]");
    eval(&mut interp, "set r 0");
    assert_eq!(interp.collect_garbage(), 1);
}
