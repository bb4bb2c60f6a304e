/// End-to-end tests: Scanner → Parser → Translator → VirtualMachine
use little_duck::compiler::{CompileOptions, Compiler};
use little_duck::runtime::TempStorage;
use little_duck::{Error, ExecutionReport, Program, RuntimeFault, Value, VirtualMachine, VmOptions};

fn compile(source: &str) -> Program {
    Compiler::new(CompileOptions::default())
        .compile(source)
        .unwrap()
}

fn output(source: &str) -> Vec<String> {
    little_duck::run(source).unwrap().output
}

#[test]
fn test_e2e_arithmetic_precedence() {
    let program = compile("program p; var x: int; main { x = 2 + 3 * 4; } end");

    let rendered: Vec<String> = program.quadruples.iter().map(|q| q.to_string()).collect();
    assert_eq!(
        rendered,
        vec![
            "*(17001, 17002, 12000)",
            "+(17000, 12000, 12001)",
            "=(12001, -, 1000)",
            "END(-, -, -)",
        ]
    );

    let mut vm = VirtualMachine::new(&program);
    vm.run().unwrap();
    assert_eq!(vm.global_value("x"), Some(Value::Int(14)));
}

#[test]
fn test_e2e_while_loop() {
    let source = r#"
        program loop;
        var i: int;
        main {
            i = 0;
            while (i < 3) do {
                print(i);
                i = i + 1;
            };
        }
        end
    "#;
    let program = compile(source);
    let mut vm = VirtualMachine::new(&program);
    let report = vm.run().unwrap();

    assert_eq!(report.output, vec!["0", "1", "2"]);
    assert_eq!(vm.global_value("i"), Some(Value::Int(3)));
}

#[test]
fn test_e2e_if_else() {
    let source = r#"
        program branch;
        var a: int;
        main {
            a = 7;
            if (a > 5) { print("big"); } else { print("small"); };
            if (a < 5) { print("tiny"); };
            if (a == 7) { print("seven"); } else { print("other"); }
        }
        end
    "#;
    assert_eq!(output(source), vec!["big", "seven"]);
}

#[test]
fn test_e2e_do_while_runs_at_least_once() {
    let source = r#"
        program repeat;
        var n: int;
        main {
            n = 10;
            do { n = n + 1; } while (n < 5);
            print(n);
            do { n = n - 3; } while (n > 0);
            print(n);
        }
        end
    "#;
    assert_eq!(output(source), vec!["11", "-1"]);
}

#[test]
fn test_e2e_division_is_float() {
    let source = r#"
        program div;
        var f: float;
        main {
            f = 7 / 2;
            print(f, 4 / 2, -f);
        }
        end
    "#;
    assert_eq!(output(source), vec!["3.5", "2.0", "-3.5"]);
}

#[test]
fn test_e2e_string_operations() {
    let source = r#"
        program text;
        var s: string;
        main {
            s = "ab" * 3;
            print(s, "n=" + 2.5, "k=" + 4, "x" + "y");
        }
        end
    "#;
    assert_eq!(output(source), vec!["ababab", "n=2.5", "k=4", "xy"]);
}

#[test]
fn test_e2e_recursive_function() {
    let source = r#"
        program factorial;
        var acc: int;
        void fact(n: int) [
            {
                if (n > 1) {
                    acc = acc * n;
                    fact(n - 1);
                };
            }
        ];
        main {
            acc = 1;
            fact(5);
            print(acc);
        }
        end
    "#;
    assert_eq!(output(source), vec!["120"]);
}

#[test]
fn test_e2e_locals_survive_nested_calls() {
    let source = r#"
        program frames;
        void inner(a: int) [
            var t: int;
            { t = a * 10; print(t); }
        ];
        void outer(a: int) [
            var t: int;
            { t = a; inner(a + 1); print(t); }
        ];
        main { outer(1); }
        end
    "#;
    assert_eq!(output(source), vec!["20", "1"]);
}

#[test]
fn test_e2e_int_argument_widens_to_float_parameter() {
    let source = r#"
        program widen;
        void show(f: float) [ { print(f); } ];
        main { show(3); }
        end
    "#;
    assert_eq!(output(source), vec!["3.0"]);
}

#[test]
fn test_e2e_division_by_zero_is_a_runtime_error() {
    let program = compile("program p; var x: float; main { x = 5 / 0; } end");
    let err = VirtualMachine::new(&program).run().unwrap_err();
    match err {
        Error::RuntimeError { ip, fault } => {
            assert_eq!(ip, 0);
            assert_eq!(fault, RuntimeFault::DivisionByZero);
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_e2e_oversized_repetition_is_a_runtime_error() {
    let program = compile(
        "program p; var s: string; main { s = \"ab\" * 9223372036854775807; } end",
    );
    let err = VirtualMachine::new(&program).run().unwrap_err();
    assert_eq!(
        err,
        Error::RuntimeError {
            ip: 0,
            fault: RuntimeFault::StringTooLong {
                limit: little_duck::runtime::MAX_STRING_LEN,
            },
        }
    );
}

#[test]
fn test_e2e_doubling_concatenation_stops_at_the_limit() {
    let source = r#"
        program grow;
        var s: string;
        main {
            s = "x";
            while (1 < 2) do { s = s + s; };
        }
        end
    "#;
    let err = little_duck::run(source).unwrap_err();
    assert!(matches!(
        err,
        Error::RuntimeError {
            fault: RuntimeFault::StringTooLong { .. },
            ..
        }
    ));
}

#[test]
fn test_e2e_unbounded_recursion_overflows() {
    let program = compile("program p; void f() [ { f(); } ]; main { f(); } end");
    let err = VirtualMachine::new(&program).run().unwrap_err();
    assert!(matches!(
        err,
        Error::RuntimeError {
            fault: RuntimeFault::StackOverflow { limit: 1000 },
            ..
        }
    ));
}

#[test]
fn test_e2e_temp_policies_agree_on_statement_level_calls() {
    let source = r#"
        program temps;
        var total: int;
        void add(n: int) [ { total = total + n * 2; } ];
        main {
            total = 1 + 2;
            add(total + 1);
            print(total * 3 + 1);
        }
        end
    "#;
    let program = compile(source);
    let run = |temp_storage| -> ExecutionReport {
        let options = VmOptions {
            temp_storage,
            ..VmOptions::default()
        };
        VirtualMachine::with_options(&program, options).run().unwrap()
    };
    let per_frame = run(TempStorage::PerFrame);
    let shared = run(TempStorage::SharedClearedOnCall);
    assert_eq!(per_frame.output, vec!["34"]);
    assert_eq!(per_frame.output, shared.output);
}

#[test]
fn test_e2e_comments_are_ignored() {
    let source = r#"
        // leading comment
        program c; # hash comment
        var x: int;
        main {
            /* block
               comment */
            x = 1;
            print(x);
        }
        end
    "#;
    assert_eq!(output(source), vec!["1"]);
}
