use std::collections::HashMap;
use std::io::Write;

use callsite_rewriter::config::{AgentConfig, INTEGRATIONS_ENV, PROCESSES_ENV};
use callsite_rewriter::error::ConfigError;
use callsite_rewriter::integration::{AssemblyRef, MethodPattern, Version, WrapperSpec};
use callsite_rewriter::loader;

const SAMPLE_JSON: &str = r#"[
  {
    "name": "SampleMath",
    "method_replacements": [
      {
        "caller": {},
        "target": { "type": "Sample.Math", "method": "Add" },
        "wrapper": {
          "assembly": "Wrap, Version=1.2.0.0, Culture=neutral, PublicKeyToken=0123456789abcdef",
          "type": "Wrapper.Math",
          "method": "Add",
          "signature": [0, 2, 8, 8, 8]
        }
      },
      {
        "caller": { "assembly": "Sample", "type": "", "method": "Run" },
        "target": { "method": "Sub" },
        "wrapper": {
          "assembly": "Wrap",
          "type": "Wrapper.Math",
          "method": "Sub",
          "signature": [0, 2, 8, 8, 8]
        }
      }
    ]
  },
  { "name": "Empty" }
]"#;

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    move |key| vars.get(key).cloned()
}

fn write_json(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().expect("create temp file");
    file.write_all(contents.as_bytes()).expect("write temp file");
    file
}

#[test]
fn empty_pattern_matches_everything() {
    let any = MethodPattern::any();
    assert!(any.matches("Sample", "Sample.Math", "Add"));
    assert!(any.matches("", "", ""));
    assert!(any.matches_assembly("mscorlib"));

    let blank = MethodPattern::new(Some(""), Some(""), Some(""));
    assert!(blank.matches("Other", "Other.Type", "Anything"));
    assert_eq!(blank.method_name(), None);
}

#[test]
fn method_only_pattern_ignores_type_and_assembly() {
    let pattern = MethodPattern::new(None, None, Some("Add"));
    assert!(pattern.matches("Sample", "Sample.Math", "Add"));
    assert!(pattern.matches("Other", "Other.Calc", "Add"));
    assert!(!pattern.matches("Sample", "Sample.Math", "Sub"));

    let scoped = MethodPattern::new(Some("Sample"), Some("Sample.Math"), Some("Add"));
    assert!(scoped.matches("Sample", "Sample.Math", "Add"));
    assert!(!scoped.matches("Sample", "Other.Math", "Add"));
    assert!(!scoped.matches("Other", "Sample.Math", "Add"));
    assert!(!scoped.matches_assembly("Other"));
}

#[test]
fn parses_assembly_display_names() {
    let full = AssemblyRef::parse("Wrap, Version=1.2.3.4, Culture=en-US, PublicKeyToken=0123456789ABCDEF")
        .expect("parse full name");
    assert_eq!(full.name, "Wrap");
    assert_eq!(
        full.version,
        Version {
            major: 1,
            minor: 2,
            build: 3,
            revision: 4
        }
    );
    assert_eq!(full.locale, "en-US");
    assert_eq!(full.public_key_token, Some([0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef]));
    assert_eq!(
        full.to_string(),
        "Wrap, Version=1.2.3.4, Culture=en-US, PublicKeyToken=0123456789abcdef"
    );

    let neutral = AssemblyRef::parse("Wrap, Culture=neutral, PublicKeyToken=null").expect("parse neutral");
    assert_eq!(neutral, AssemblyRef::new("Wrap"));
    assert_eq!(
        neutral.to_string(),
        "Wrap, Version=0.0.0.0, Culture=neutral, PublicKeyToken=null"
    );

    let short = AssemblyRef::parse("Wrap, Version=2.1").expect("parse short version");
    assert_eq!(short.version.to_string(), "2.1.0.0");
}

#[test]
fn rejects_malformed_assembly_names() {
    for name in [
        "",
        ", Version=1.0.0.0",
        "Wrap, Version",
        "Wrap, Version=1.x",
        "Wrap, Version=1.0.0.0.0",
        "Wrap, PublicKeyToken=abc",
        "Wrap, Flavor=vanilla",
    ] {
        assert!(
            matches!(AssemblyRef::parse(name), Err(ConfigError::AssemblyName { .. })),
            "{name:?} should be rejected"
        );
    }
}

#[test]
fn wrapper_spec_requires_every_field() {
    let assembly = AssemblyRef::new("Wrap");
    let sig = vec![0x00, 0x01, 0x08, 0x08];

    assert!(matches!(
        WrapperSpec::new(AssemblyRef::new(""), "T", "M", sig.clone()),
        Err(ConfigError::IncompleteWrapper("assembly"))
    ));
    assert!(matches!(
        WrapperSpec::new(assembly.clone(), "", "M", sig.clone()),
        Err(ConfigError::IncompleteWrapper("type"))
    ));
    assert!(matches!(
        WrapperSpec::new(assembly.clone(), "T", "", sig.clone()),
        Err(ConfigError::IncompleteWrapper("method"))
    ));
    assert!(matches!(
        WrapperSpec::new(assembly.clone(), "T", "M", Vec::new()),
        Err(ConfigError::IncompleteWrapper("signature"))
    ));

    let a = WrapperSpec::new(assembly.clone(), "T", "M", sig.clone()).expect("wrapper");
    let b = WrapperSpec::new(assembly.clone(), "T", "M", sig).expect("wrapper");
    let other_overload = WrapperSpec::new(assembly, "T", "M", vec![0x00, 0x00, 0x01]).expect("wrapper");
    assert_eq!(a.cache_key(), b.cache_key());
    assert_ne!(a.cache_key(), other_overload.cache_key());
}

#[test]
fn loads_integrations_from_json() {
    let integrations = loader::load_integrations_from_str(SAMPLE_JSON).expect("parse integrations");
    assert_eq!(integrations.len(), 2);
    assert_eq!(integrations[0].name, "SampleMath");
    assert!(integrations[1].method_replacements.is_empty());

    let add = &integrations[0].method_replacements[0];
    assert_eq!(add.caller, MethodPattern::any());
    assert_eq!(add.target.type_name(), Some("Sample.Math"));
    assert_eq!(add.target.method_name(), Some("Add"));
    assert_eq!(add.wrapper.assembly().name, "Wrap");
    assert_eq!(add.wrapper.assembly().version.major, 1);
    assert_eq!(add.wrapper.type_name(), "Wrapper.Math");
    assert_eq!(add.wrapper.signature(), &[0, 2, 8, 8, 8]);

    let sub = &integrations[0].method_replacements[1];
    assert_eq!(sub.caller.assembly(), Some("Sample"));
    assert_eq!(sub.caller.type_name(), None);
    assert!(sub.caller.matches("Sample", "Sample.Program", "Run"));
    assert_eq!(sub.target.type_name(), None);
}

#[test]
fn rejects_incomplete_wrappers_in_json() {
    let missing_signature = r#"[{ "name": "x", "method_replacements": [{
        "target": { "method": "Add" },
        "wrapper": { "assembly": "Wrap", "type": "W", "method": "Add" }
    }]}]"#;
    let err = loader::load_integrations_from_str(missing_signature).expect_err("missing signature");
    assert!(err.to_string().contains("signature"), "{err}");

    let bad_assembly = r#"[{ "name": "x", "method_replacements": [{
        "target": { "method": "Add" },
        "wrapper": { "assembly": "Wrap, Version=one", "type": "W", "method": "Add", "signature": [0] }
    }]}]"#;
    assert!(matches!(
        loader::load_integrations_from_str(bad_assembly),
        Err(ConfigError::Json(_))
    ));
}

#[test]
fn loads_files_in_order_and_names_failing_path() {
    let first = write_json(SAMPLE_JSON);
    let second = write_json(r#"[{ "name": "Second" }]"#);

    let integrations = loader::load_integrations(&[first.path(), second.path()]).expect("load files");
    let names: Vec<&str> = integrations.iter().map(|i| i.name.as_str()).collect();
    assert_eq!(names, vec!["SampleMath", "Empty", "Second"]);

    let broken = write_json("[{ \"name\": ");
    match loader::load_integrations_from_file(broken.path()) {
        Err(ConfigError::Parse { path, .. }) => assert_eq!(path, broken.path()),
        other => panic!("expected parse error, got {other:?}"),
    }

    let dir = tempfile::tempdir().expect("temp dir");
    let missing = dir.path().join("missing.json");
    match loader::load_integrations(&[&missing]) {
        Err(ConfigError::Io { path, .. }) => assert_eq!(path, missing),
        other => panic!("expected io error, got {other:?}"),
    }
}

#[test]
fn config_reads_semicolon_separated_lists() {
    let config = AgentConfig::from_lookup(lookup(&[
        (PROCESSES_ENV, "dotnet.exe; Sample.exe;;"),
        (INTEGRATIONS_ENV, "/opt/a.json;/opt/b.json"),
    ]));
    assert_eq!(config.processes, vec!["dotnet.exe", "Sample.exe"]);
    assert_eq!(config.integration_paths.len(), 2);
    assert!(config.should_attach("Sample.exe"));
    assert!(!config.should_attach("w3wp.exe"));
    assert!(!config.should_attach("sample.exe"));
}

#[test]
fn unset_or_empty_process_list_attaches_everywhere() {
    let unset = AgentConfig::from_lookup(lookup(&[]));
    assert!(unset.processes.is_empty());
    assert!(unset.integration_paths.is_empty());
    assert!(unset.should_attach("anything.exe"));

    let empty = AgentConfig::from_lookup(lookup(&[(PROCESSES_ENV, " ; ")]));
    assert!(empty.should_attach("anything.exe"));
}

#[test]
fn config_loads_configured_integration_files() {
    let file = write_json(SAMPLE_JSON);
    let path = file.path().to_string_lossy().into_owned();
    let config = AgentConfig::from_lookup(lookup(&[(INTEGRATIONS_ENV, path.as_str())]));
    let integrations = config.load_integrations().expect("load");
    assert_eq!(integrations.len(), 2);
}
