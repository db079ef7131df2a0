use super::*;

#[test]
fn stub_round_trips_and_validates() {
    let config: HarnessConfig = serde_json::from_str(&config_stub()).expect("parse stub");
    assert_eq!(config, default_config());
    validate_config(&config).expect("stub is valid");
    assert_eq!(config.timeouts.generation(), Duration::from_millis(13_500));
    assert_eq!(config.timeouts.artifacts(), Duration::from_millis(8_000));
    assert_eq!(config.timeouts.build(), None);
    assert!(config.timeouts.poll_interval().is_zero());
}

#[test]
fn missing_optional_fields_take_defaults() {
    let config: HarnessConfig = serde_json::from_str(
        r#"{
            "schema_version": 1,
            "workspace": "ws",
            "runtimes_dir": "runtimes",
            "test_data_dir": "data",
            "wsdl_file": "address.wsdl",
            "wsdl_url": "http://localhost:3000/helloworld?wsdl",
            "generator": ["gen", "{wsdl}"],
            "timeouts": { "runtime_ms": 1000 }
        }"#,
    )
    .expect("parse config");
    assert_eq!(config.build_tool, "mvn");
    assert_eq!(config.output_dir, "src/main/java");
    assert_eq!(config.jaxrs_endpoint, "http://localhost:8000/jaxrs");
    assert_eq!(config.timeouts.runtime_ms, 1000);
    assert_eq!(config.timeouts.generation_ms, 13_500);
}

#[test]
fn validation_rejects_bad_values() {
    let mut config = default_config();
    config.schema_version = 2;
    assert!(validate_config(&config).is_err());

    let mut config = default_config();
    config.generator.clear();
    assert!(validate_config(&config).is_err());

    let mut config = default_config();
    config.output_dir = "../elsewhere".to_string();
    assert!(validate_config(&config).is_err());

    let mut config = default_config();
    config.timeouts.artifacts_ms = 0;
    let err = validate_config(&config).expect_err("zero timeout");
    assert!(err.to_string().contains("artifacts_ms"));
}

#[test]
fn write_refuses_to_overwrite_without_force() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join("nested").join(CONFIG_FILE_NAME);
    write_config(&path, &default_config(), false).expect("first write");
    assert!(write_config(&path, &default_config(), false).is_err());
    write_config(&path, &default_config(), true).expect("forced write");
    assert_eq!(load_config(&path).expect("load"), default_config());
}

#[test]
fn settings_resolve_relative_to_config_dir() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join(CONFIG_FILE_NAME);
    let mut config = default_config();
    config.manifest = Some(PathBuf::from("package.json"));
    config.generator = vec!["gen".to_string()];
    write_config(&path, &config, false).expect("write");

    let settings = Settings::from_config(load_config(&path).expect("load"), &path)
        .expect("resolve");
    assert_eq!(settings.workspace, temp.path().join(".ui-testing"));
    assert_eq!(settings.test_data_dir, temp.path().join("test-data"));
    assert_eq!(settings.manifest, Some(temp.path().join("package.json")));
    assert_eq!(settings.config_path, path);
}

#[test]
fn generator_placeholders_are_substituted() {
    let temp = tempfile::tempdir().expect("tempdir");
    let path = temp.path().join(CONFIG_FILE_NAME);
    let mut config = default_config();
    config.generator = default_generator();
    let mut settings = Settings::from_config(config, &path).expect("resolve");
    // env overrides must not leak into this assertion
    settings.generator = default_generator();

    let argv = settings.generator_argv("/data/address.wsdl", "spring");
    let output = temp.path().join(".ui-testing").join("src/main/java");
    assert_eq!(
        argv,
        vec![
            "wsdl2rest".to_string(),
            "--wsdl".to_string(),
            "/data/address.wsdl".to_string(),
            "--out".to_string(),
            output.display().to_string(),
            "--camel-context".to_string(),
            "spring".to_string(),
            "--jaxrs".to_string(),
            "http://localhost:8000/jaxrs".to_string(),
        ]
    );
    for placeholder in GENERATOR_PLACEHOLDERS {
        assert!(argv.iter().all(|arg| !arg.contains(placeholder)));
    }
}

#[test]
fn generator_override_uses_shell_words() {
    let argv = parse_generator_override("sh 'my gen.sh' {wsdl}").expect("parse");
    assert_eq!(argv, vec!["sh", "my gen.sh", "{wsdl}"]);
    assert!(parse_generator_override("sh 'unterminated").is_err());
}

#[test]
fn explicit_config_path_wins() {
    let path = resolve_config_path(Some(Path::new("/tmp/custom.json"))).expect("explicit");
    assert_eq!(path, PathBuf::from("/tmp/custom.json"));
}
