/// Persisted program artifacts: a reloaded program runs like the original
use little_duck::compiler::{CompileOptions, Compiler};
use little_duck::{Error, Program, VirtualMachine};

const SOURCE: &str = r#"
program artifact;
var total: int; label: string;
void accumulate(step: int, scale: float) [
    var scaled: float;
    {
        scaled = step * scale;
        total = total + step;
        print(label + scaled);
    }
];
main {
    label = "scaled=";
    total = 0;
    do { accumulate(total + 1, 0.5); } while (total < 10);
    print(total);
}
end
"#;

fn compile() -> Program {
    Compiler::new(CompileOptions::default())
        .compile(SOURCE)
        .unwrap()
}

#[test]
fn test_text_artifact_runs_identically() {
    let program = compile();
    let expected = VirtualMachine::new(&program).run().unwrap();
    assert_eq!(
        expected.output,
        vec!["scaled=0.5", "scaled=1.0", "scaled=2.0", "scaled=4.0", "15"]
    );

    let text = program.to_text();
    assert!(text.starts_with("%%PROGRAM artifact\n"));
    assert!(text.trim_end().ends_with("%%END"));

    let restored = Program::from_text(&text).unwrap();
    let mut vm = VirtualMachine::new(&restored);
    assert_eq!(vm.run().unwrap(), expected);
    assert_eq!(vm.global_value("total"), Some(little_duck::Value::Int(15)));
}

#[test]
fn test_json_artifact_round_trip() {
    let program = compile();
    let json = program.to_json().unwrap();
    let restored = Program::from_json(&json).unwrap();
    assert_eq!(restored, program);
}

#[test]
fn test_malformed_quadruple_line_is_rejected() {
    let text = "%%PROGRAM p\n%%QUADRUPLES\n0:GOTO:-:-\n%%END\n";
    assert!(matches!(
        Program::from_text(text),
        Err(Error::MalformedArtifact { line: 3, .. })
    ));
}
