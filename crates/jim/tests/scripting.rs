use jim::Interp;
use pretty_assertions::assert_eq;

fn eval(interp: &mut Interp, script: &str) -> String {
    match interp.eval(script) {
        Ok(result) => result,
        Err(e) => panic!("script failed: {e}\nscript: {script}"),
    }
}

fn eval_all(scripts: &[&str]) -> String {
    let mut interp = Interp::new();
    let mut last = String::new();
    for script in scripts {
        last = eval(&mut interp, script);
    }
    last
}

#[test]
fn set_and_get_round_trip() {
    assert_eq!(eval_all(&["set x V", "set x"]), "V");
}

#[test]
fn set_returns_the_value() {
    assert_eq!(eval_all(&["set x 42"]), "42");
}

#[test]
fn interpolation_concatenates_in_token_order() {
    assert_eq!(eval_all(&["set a 1", "set b 2", "set c \"$a-$b\""]), "1-2");
    assert_eq!(eval_all(&["set a x", "set c a$a[set a y]$a"]), "axyy");
}

#[test]
fn braces_suppress_substitution() {
    assert_eq!(eval_all(&["set x {a $b [c]}"]), "a $b [c]");
}

#[test]
fn escapes_apply_outside_braces() {
    assert_eq!(eval_all(&["set x a\\tb"]), "a\tb");
    assert_eq!(eval_all(&["set x \\x41\\x42"]), "AB");
    assert_eq!(eval_all(&["set x \\101"]), "A");
}

#[test]
fn semicolons_separate_commands() {
    assert_eq!(eval_all(&["set a 1; set b 2; set a"]), "1");
}

#[test]
fn comments_only_at_line_start() {
    assert_eq!(eval_all(&["# a comment\nset x 1", "set x"]), "1");
    assert_eq!(eval_all(&["set x a#b"]), "a#b");
}

#[test]
fn if_elseif_else_chain() {
    let script = "proc pick n { if {$n < 0} { set r neg } elseif {$n == 0} then { set r zero } else { set r pos } }";
    assert_eq!(eval_all(&[script, "pick -3"]), "neg");
    assert_eq!(eval_all(&[script, "pick 0"]), "zero");
    assert_eq!(eval_all(&[script, "pick 9"]), "pos");
}

#[test]
fn while_loop_accumulates() {
    let result = eval_all(&["set i 0; set sum 0", "while {$i < 5} { incr sum $i; incr i }", "set sum"]);
    assert_eq!(result, "10");
}

#[test]
fn for_loop_runs_next_after_continue() {
    let result = eval_all(&[
        "set r {}",
        "for {set i 0} {$i < 5} {incr i} { if {$i == 2} {continue}; lappend r $i }",
        "set r",
    ]);
    assert_eq!(result, "0 1 3 4");
}

#[test]
fn foreach_multiple_vars_consume_in_chunks() {
    let result = eval_all(&["set r {}", "foreach {a b} {1 2 3 4} { lappend r $a$b }", "set r"]);
    assert_eq!(result, "12 34");
}

#[test]
fn foreach_pads_missing_elements() {
    let result = eval_all(&["set r {}", "foreach {a b} {1 2 3} { lappend r <$a$b> }", "set r"]);
    assert_eq!(result, "<12> <3>");
}

#[test]
fn break_inside_proc_terminates_caller_loop() {
    let result = eval_all(&[
        "proc brk {} { break }",
        "set r {}",
        "foreach i {1 2 3 4 5} { if {$i == 3} { brk }; lappend r $i }",
        "set r",
    ]);
    assert_eq!(result, "1 2");
}

#[test]
fn continue_inside_proc_skips_caller_iteration() {
    let result = eval_all(&[
        "proc skip {} { continue }",
        "set r {}",
        "foreach i {1 2 3} { if {$i == 2} { skip }; lappend r $i }",
        "set r",
    ]);
    assert_eq!(result, "1 3");
}

#[test]
fn return_unwinds_the_procedure_only() {
    let result = eval_all(&[
        "proc g {} { return 7 }",
        "set r {}",
        "foreach i {1 2 3} { lappend r [g] }",
        "set r",
    ]);
    assert_eq!(result, "7 7 7");
}

#[test]
fn control_flow_delegation_through_return_code() {
    let result = eval_all(&[
        "proc control {cond code} { if {[uplevel 1 expr $cond]} { return -code [catch [list uplevel 1 $code] e] $e } }",
        "set r {}",
        "foreach i {1 2 3 4 5} { control {$i == 4} {break}; lappend r $i }",
        "set r",
    ]);
    assert_eq!(result, "1 2 3");
}

#[test]
fn fibonacci_recursion() {
    let result = eval_all(&[
        "proc fib n { if {$n <= 1} {expr 1} else {expr {[fib [expr {$n-1}]] + [fib [expr {$n-2}]]}} }",
        "fib 10",
    ]);
    assert_eq!(result, "89");
}

#[test]
fn dict_sugar_read_write_and_array_get() {
    let result = eval_all(&["set a(x) 1", "set a(y) 2", "list $a(x) $a(y) [array get a]"]);
    assert_eq!(result, "1 2 {x 1 y 2}");
}

#[test]
fn dict_sugar_key_is_substituted() {
    assert_eq!(eval_all(&["set k x", "set a($k) 5", "set a(x)"]), "5");
    assert_eq!(eval_all(&["set k y", "set a(y) 7", "set a($k)"]), "7");
}

#[test]
fn upvar_links_to_caller_variable() {
    let result = eval_all(&["proc bump v { upvar 1 $v x; incr x 2 }", "set n 5", "bump n", "set n"]);
    assert_eq!(result, "7");
}

#[test]
fn global_links_to_the_top_frame() {
    let result = eval_all(&["set g 1", "proc touch {} { global g; set g 9 }", "touch", "set g"]);
    assert_eq!(result, "9");
}

#[test]
fn uplevel_evaluates_in_the_caller_scope() {
    let result = eval_all(&["proc setter {} { uplevel 1 {set here yes} }", "setter", "set here"]);
    assert_eq!(result, "yes");
}

#[test]
fn list_commands() {
    assert_eq!(eval_all(&["list a {b c} d"]), "a {b c} d");
    assert_eq!(eval_all(&["llength [list a {b c} d]"]), "3");
    assert_eq!(eval_all(&["lindex {a b c} 1"]), "b");
    assert_eq!(eval_all(&["lindex {a b c} end"]), "c");
    assert_eq!(eval_all(&["lindex {a b c} end-1"]), "b");
    assert_eq!(eval_all(&["lindex {a b c} 7"]), "");
    assert_eq!(eval_all(&["lrange {a b c d e} 1 3"]), "b c d");
    assert_eq!(eval_all(&["lrange {a b c} 2 end"]), "c");
}

#[test]
fn lappend_builds_lists_in_place() {
    assert_eq!(eval_all(&["set l {}", "lappend l a", "lappend l {b c}", "set l"]), "a {b c}");
    assert_eq!(eval_all(&["lappend fresh 1 2", "set fresh"]), "1 2");
}

#[test]
fn lset_replaces_elements() {
    assert_eq!(eval_all(&["set l {1 2 3}", "lset l 1 x"]), "1 x 3");
    assert_eq!(eval_all(&["set l {{1 2} {3 4}}", "lset l 1 0 x", "set l"]), "{1 2} {x 4}");
}

#[test]
fn empty_and_quoted_list_elements_round_trip() {
    assert_eq!(eval_all(&["llength [list {} {a b} c]"]), "3");
    assert_eq!(eval_all(&["lindex [list \"a b\" c] 0"]), "a b");
    // list -> string -> list preserves structure
    assert_eq!(eval_all(&["set l [list a {b c}]", "set s \"$l\"", "llength $s"]), "2");
    assert_eq!(eval_all(&["set l [list a {b c}]", "lindex \"$l\" 1"]), "b c");
}

#[test]
fn dict_command_family() {
    assert_eq!(eval_all(&["dict get [dict create a 1 b 2] b"]), "2");
    assert_eq!(eval_all(&["dict get [dict create {k with space} 2] {k with space}"]), "2");
    assert_eq!(eval_all(&["dict size [dict create a 1 b 2]"]), "2");
    assert_eq!(eval_all(&["dict exists [dict create a 1] a"]), "1");
    assert_eq!(eval_all(&["dict exists [dict create a 1] b"]), "0");
    assert_eq!(eval_all(&["dict keys [dict create a 1 b 2]"]), "a b");
    assert_eq!(eval_all(&["dict values [dict create a 1 b 2]"]), "1 2");
    assert_eq!(eval_all(&["dict set d x 1", "dict set d y 2", "dict get $d y"]), "2");
    assert_eq!(eval_all(&["set d [dict create a 1 b 2]", "dict unset d a", "dict keys $d"]), "b");
}

#[test]
fn dict_string_round_trip_preserves_pairs() {
    let result = eval_all(&["set d [dict create a 1 {b c} 2]", "set s \"$d\"", "dict get $s {b c}"]);
    assert_eq!(result, "2");
}

#[test]
fn string_command_family() {
    assert_eq!(eval_all(&["string length {hello}"]), "5");
    assert_eq!(eval_all(&["string index abc 1"]), "b");
    assert_eq!(eval_all(&["string index abc end"]), "c");
    assert_eq!(eval_all(&["string range abcde 1 3"]), "bcd");
    assert_eq!(eval_all(&["string compare a b"]), "-1");
    assert_eq!(eval_all(&["string compare b b"]), "0");
    assert_eq!(eval_all(&["string equal ab ab"]), "1");
    assert_eq!(eval_all(&["string repeat ab 3"]), "ababab");
    assert_eq!(eval_all(&["string tolower AbC"]), "abc");
    assert_eq!(eval_all(&["string toupper AbC"]), "ABC");
    assert_eq!(eval_all(&["string trim {  padded  }"]), "padded");
    assert_eq!(eval_all(&["string trim xxaxx x"]), "a");
}

#[test]
fn string_match_globs() {
    assert_eq!(eval_all(&["string match {a*c} abc"]), "1");
    assert_eq!(eval_all(&["string match {a?c} abc"]), "1");
    assert_eq!(eval_all(&["string match {a?c} abbc"]), "0");
    assert_eq!(eval_all(&["string match {[a-c]x} bx"]), "1");
    assert_eq!(eval_all(&["string match {[^a-c]x} bx"]), "0");
    assert_eq!(eval_all(&["string match {*} {}"]), "1");
}

#[test]
fn append_concatenates_strings() {
    assert_eq!(eval_all(&["set s a", "append s b c", "set s"]), "abc");
    assert_eq!(eval_all(&["append fresh xyz", "set fresh"]), "xyz");
}

#[test]
fn incr_defaults_and_deltas() {
    assert_eq!(eval_all(&["set i 5", "incr i"]), "6");
    assert_eq!(eval_all(&["set i 5", "incr i -2"]), "3");
}

#[test]
fn subst_substitutes_everything_by_default() {
    assert_eq!(eval_all(&["set name World", "subst {Hello $name}"]), "Hello World");
    assert_eq!(eval_all(&["subst {sum=[+ 1 2]}"]), "sum=3");
    assert_eq!(eval_all(&["subst {a\\tb}"]), "a\tb");
}

#[test]
fn subst_flags_disable_classes() {
    assert_eq!(eval_all(&["set name x", "subst -novariables {Hello $name}"]), "Hello $name");
    assert_eq!(eval_all(&["subst -nocommands {sum=[+ 1 2]}"]), "sum=[+ 1 2]");
    assert_eq!(eval_all(&["subst -nobackslashes {a\\tb}"]), "a\\tb");
}

#[test]
fn expand_splices_list_arguments() {
    assert_eq!(eval_all(&["set l {a b}", "list {expand}$l c"]), "a b c");
    assert_eq!(eval_all(&["set l {1 2 3}", "+ {expand}$l"]), "6");
    // Without further tokens the braced word is an ordinary argument.
    assert_eq!(eval_all(&["list {expand}"]), "expand");
}

#[test]
fn eval_command_concatenates_words() {
    assert_eq!(eval_all(&["eval {set x 1}", "set x"]), "1");
    assert_eq!(eval_all(&["eval set y 2", "set y"]), "2");
}

#[test]
fn unknown_handler_receives_the_original_words() {
    let result = eval_all(&[
        "proc unknown {args} { return \"unknown:[lindex $args 0]:[llength $args]\" }",
        "nosuchcmd a b",
    ]);
    assert_eq!(result, "unknown:nosuchcmd:3");
}

#[test]
fn rename_moves_and_deletes_commands() {
    let mut interp = Interp::new();
    eval(&mut interp, "proc foo {} { return ok }");
    eval(&mut interp, "rename foo bar");
    assert_eq!(eval(&mut interp, "bar"), "ok");
    assert_eq!(eval(&mut interp, "catch {foo} msg"), "1");
    assert_eq!(eval(&mut interp, "set msg"), "invalid command name \"foo\"");
    eval(&mut interp, "rename bar {}");
    assert_eq!(eval(&mut interp, "catch {bar}"), "1");
}

#[test]
fn command_cache_survives_redefinition() {
    let result = eval_all(&[
        "proc f {} { return one }",
        "proc caller {} { f }",
        "caller",
        "proc f {} { return two }",
        "caller",
    ]);
    assert_eq!(result, "two");
}

#[test]
fn wrong_number_of_arguments_message() {
    let result = eval_all(&["proc fib n { set n }", "catch {fib} msg", "set msg"]);
    assert_eq!(result, "wrong # args: should be \"fib n\"");
    let result = eval_all(&["proc two {a b} {}", "catch {two 1 2 3} msg", "set msg"]);
    assert_eq!(result, "wrong # args: should be \"two a b\"");
}

#[test]
fn args_catch_all_collects_the_tail() {
    let result = eval_all(&["proc v {first args} { list $first $args }", "v 1 2 3 4"]);
    assert_eq!(result, "1 {2 3 4}");
    assert_eq!(eval_all(&["proc v {first args} { list $first $args }", "v only"]), "only {}");
}

#[test]
fn missing_variable_errors() {
    assert_eq!(eval_all(&["catch {set novar} msg", "set msg"]), "can't read \"novar\": no such variable");
    assert_eq!(eval_all(&["catch {unset novar} msg", "set msg"]), "can't unset \"novar\": no such variable");
}

#[test]
fn unset_forgets_the_variable() {
    let result = eval_all(&["set x 1", "unset x", "catch {set x}"]);
    assert_eq!(result, "1");
}

#[test]
fn catch_maps_interrupts_to_codes() {
    assert_eq!(eval_all(&["catch {error boom} msg"]), "1");
    assert_eq!(eval_all(&["catch {error boom} msg", "set msg"]), "boom");
    assert_eq!(eval_all(&["catch {break}"]), "3");
    assert_eq!(eval_all(&["catch {continue}"]), "4");
    assert_eq!(eval_all(&["catch {return x}"]), "2");
    assert_eq!(eval_all(&["catch {set ok 1}"]), "0");
}

#[test]
fn upvar_cycle_and_sugar_rejections() {
    assert_eq!(
        eval_all(&["catch {upvar 0 a a} msg", "set msg"]),
        "can't upvar from variable to itself"
    );
    assert_eq!(
        eval_all(&["catch {upvar 0 a(x) b} msg", "set msg"]),
        "dict key syntax invalid as link source"
    );
}

#[test]
fn deep_recursion_is_reported() {
    let result = eval_all(&["proc spin {} { spin }", "catch {spin} msg", "set msg"]);
    assert_eq!(result, "too many nested calls. Infinite recursion?");
}

#[test]
fn info_introspection() {
    assert_eq!(eval_all(&["set v 1", "info exists v"]), "1");
    assert_eq!(eval_all(&["info exists missing"]), "0");
    assert_eq!(eval_all(&["proc lvl {} { info level }", "lvl"]), "1");
    assert_eq!(eval_all(&["info level"]), "0");
    assert_eq!(eval_all(&["proc who {a} { info level 1 }", "who z"]), "who z");
    assert_eq!(eval_all(&["proc p {a b} { set a }", "info args p"]), "a b");
    assert_eq!(eval_all(&["proc p {} {set x 1}", "info body p"]), "set x 1");
    let result = eval_all(&["proc mine {} {}", "info procs"]);
    assert_eq!(result, "mine");
    assert_eq!(eval_all(&["info commands lappend"]), "lappend");
}

#[test]
fn debug_introspection_smoke() {
    let mut interp = Interp::new();
    let counts = eval(&mut interp, "debug objcount");
    assert!(counts.contains("used"), "unexpected objcount output: {counts}");
    eval(&mut interp, "set x abc");
    let refcount: i64 = eval(&mut interp, "debug refcount x").parse().unwrap();
    assert!(refcount >= 1, "variable value should be owned: {refcount}");
    // Invalidating a regenerable string rep is transparent.
    eval(&mut interp, "set l [list a b]");
    eval(&mut interp, "debug invstr l");
    assert_eq!(eval(&mut interp, "set l"), "a b");
}

#[test]
fn error_carries_a_stack_trace() {
    let mut interp = Interp::new();
    eval(&mut interp, "proc inner {} { error oops }");
    eval(&mut interp, "proc outer {} { inner }");
    let err = interp.eval("outer").unwrap_err();
    assert_eq!(err.message, "oops");
    let names: Vec<&str> = err.stack_trace.iter().map(|f| f.proc_name.as_str()).collect();
    assert_eq!(names, vec!["inner", "outer"]);
}

#[test]
fn file_attribution_reaches_the_trace() {
    let mut interp = Interp::new();
    interp
        .eval_named("proc broken {} {\n    error bad\n}", "lib.jim")
        .unwrap();
    let err = interp.eval_named("\nbroken", "main.jim").unwrap_err();
    assert_eq!(err.message, "bad");
    assert_eq!(err.stack_trace[0].file, "lib.jim");
    assert_eq!(err.stack_trace[0].line, 2);
}

#[test]
fn exit_surfaces_the_code() {
    let mut interp = Interp::new();
    let err = interp.eval("exit 3").unwrap_err();
    assert_eq!(err.exit_code, Some(3));
}

#[test]
fn host_commands_integrate_with_dispatch() {
    let mut interp = Interp::new();
    interp.register_command("double", |_, args| {
        let n: i64 = args[1].parse().map_err(|_| "expected integer".to_owned())?;
        Ok((n * 2).to_string())
    });
    assert_eq!(eval(&mut interp, "double 21"), "42");
    assert_eq!(eval(&mut interp, "catch {double nope} msg"), "1");
    assert_eq!(eval(&mut interp, "set msg"), "expected integer");
}

#[test]
fn output_writer_captures_puts() {
    let mut interp = Interp::new();
    let out = jim::CollectOutput::new();
    interp.set_output(Box::new(out.clone()));
    eval(&mut interp, "puts hello; puts -nonewline world");
    assert_eq!(out.as_string(), "hello\nworld");
}

#[test]
fn variables_rebind_per_frame() {
    let mut interp = Interp::new();
    eval(&mut interp, "proc echo {x} { set x }");
    assert_eq!(eval(&mut interp, "echo 1"), "1");
    assert_eq!(eval(&mut interp, "echo 2"), "2");
}

#[test]
fn cached_variable_lookups_invalidate_after_unset() {
    let result = eval_all(&[
        "proc probe {} { set v 1; set v; unset v; catch {set v} msg; set msg }",
        "probe",
    ]);
    assert_eq!(result, "can't read \"v\": no such variable");
}

#[test]
fn empty_script_yields_empty_result() {
    assert_eq!(eval_all(&[""]), "");
    assert_eq!(eval_all(&["   \n  ; ;\n"]), "");
}
