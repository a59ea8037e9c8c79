use assert_cmd::cargo::cargo_bin_cmd;

fn help_output(args: &[&str]) -> String {
    let assert = cargo_bin_cmd!("wagon").args(args).assert().success();
    String::from_utf8(assert.get_output().stdout.clone()).expect("utf8 help")
}

#[test]
fn top_level_help_lists_commands() {
    let output = help_output(&["--help"]);
    for command in ["create", "validate", "install", "show", "list-files", "get-file"] {
        assert!(output.contains(command), "missing {command}: {output}");
    }
}

#[test]
fn create_help_mentions_usage_and_examples() {
    let output = help_output(&["create", "--help"]);
    assert!(
        output.contains("wagon create <SOURCE> [OPTIONS] [-- <WHEEL_ARG>...]"),
        "create usage missing: {output}"
    );
    for flag in ["--exclude", "--add-file", "--build-tag", "--keep-wheels"] {
        assert!(output.contains(flag), "{flag} flag missing: {output}");
    }
    assert!(
        output.contains("wagon create requests==2.32.3 -o dist"),
        "create example missing: {output}"
    );
}

#[test]
fn validate_help_lists_flags() {
    let output = help_output(&["validate", "--help"]);
    assert!(output.contains("--ignore-platform"), "{output}");
    assert!(output.contains("--upgrade"), "{output}");
}

#[test]
fn unknown_format_is_rejected() {
    let assert = cargo_bin_cmd!("wagon")
        .args(["create", "sample", "-t", "rar"])
        .assert()
        .failure();
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).to_string();
    assert!(stderr.contains("unsupported archive format"), "{stderr}");
}
