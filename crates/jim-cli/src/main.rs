use std::{
    env, fs,
    io::{self, BufRead, Write},
    process::ExitCode,
};

use jim::{Interp, JimError, TokenDialect, pool_smoke_test, tokenize_dump};

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    match args.get(1).map(String::as_str) {
        None => repl(),
        Some("--test-ht") => match pool_smoke_test() {
            Ok(()) => {
                println!("hash table smoke test ok");
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("hash table smoke test failed: {err}");
                ExitCode::FAILURE
            }
        },
        Some(mode @ ("--parse" | "--parse-expr" | "--parse-subst")) => {
            let Some(path) = args.get(2) else {
                eprintln!("usage: interp {mode} FILE");
                return ExitCode::FAILURE;
            };
            let source = match read_file(path) {
                Ok(source) => source,
                Err(err) => {
                    eprintln!("error: {err}");
                    return ExitCode::FAILURE;
                }
            };
            let dialect = match mode {
                "--parse" => TokenDialect::Script,
                "--parse-expr" => TokenDialect::Expression,
                _ => TokenDialect::Subst,
            };
            print!("{}", tokenize_dump(&source, dialect));
            ExitCode::SUCCESS
        }
        Some(path) => run_file(path, &args),
    }
}

fn read_file(path: &str) -> io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn setup_host_vars(interp: &mut Interp, args: &[String]) {
    let argv: Vec<&str> = args.iter().skip(2).map(String::as_str).collect();
    let _ = interp.set_var("argv", &argv.join(" "));
    let _ = interp.set_var("argc", &argv.len().to_string());
    let _ = interp.set_var("argv0", args.get(1).map_or("", String::as_str));
}

fn report(err: &JimError) {
    eprintln!("error: {}", err.message);
    for frame in &err.stack_trace {
        let name = if frame.proc_name.is_empty() { "<script>" } else { &frame.proc_name };
        let file = if frame.file.is_empty() { "?" } else { &frame.file };
        eprintln!("    in {name} ({file}:{})", frame.line);
    }
}

fn run_file(path: &str, args: &[String]) -> ExitCode {
    let source = match read_file(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };
    let mut interp = Interp::new();
    setup_host_vars(&mut interp, args);
    match interp.eval_named(&source, path) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => match err.exit_code {
            Some(code) => ExitCode::from(code.clamp(0, 255) as u8),
            None => {
                report(&err);
                ExitCode::FAILURE
            }
        },
    }
}

fn repl() -> ExitCode {
    let mut interp = Interp::new();
    let _ = interp.set_var("argv", "");
    let _ = interp.set_var("argc", "0");
    let _ = interp.set_var("argv0", "interp");
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("jim> ");
        let _ = io::stdout().flush();
        let Some(Ok(line)) = lines.next() else {
            return ExitCode::SUCCESS;
        };
        if line.trim().is_empty() {
            continue;
        }
        match interp.eval(&line) {
            Ok(result) => {
                if !result.is_empty() {
                    println!("{result}");
                }
            }
            Err(err) => match err.exit_code {
                Some(code) => return ExitCode::from(code.clamp(0, 255) as u8),
                None => report(&err),
            },
        }
    }
}
