use doc_qc::config::Config;

#[test]
fn parse_example_config() {
    let raw = include_str!("../doc-qc.example.toml");
    let cfg: Config = toml::from_str(raw).expect("parse TOML");
    assert_eq!(cfg.chunking.chunk_size, 15_000);
    assert_eq!(cfg.chunking.overlap, 500);
    assert_eq!(cfg.provider.max_fallbacks, 3);
    assert_eq!(cfg.scoring.check_weights, vec![0.5, 0.5]);
    assert!(!cfg.output.out_dir.is_empty());
    assert_eq!(cfg.provider.fallback_models["openai"], vec!["gpt-3.5-turbo", "gpt-4o-mini"]);
}

#[test]
fn partial_sections_fall_back_to_defaults() {
    let cfg: Config = toml::from_str(
        r#"
        [provider]
        model = "gpt-4o-mini"

        [chunking]
        chunk_size = 2000
        "#,
    )
    .expect("parse TOML");
    assert_eq!(cfg.provider.model, "gpt-4o-mini");
    assert_eq!(cfg.provider.max_tokens, 2000);
    assert_eq!(cfg.provider.fallback_models["anthropic"], vec!["claude-3-haiku-20240307"]);
    assert_eq!(cfg.chunking.chunk_size, 2000);
    assert_eq!(cfg.chunking.overlap, 500);
    assert!(cfg.ocr.enabled);
}

#[test]
fn load_from_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("doc-qc.toml");
    std::fs::write(&path, "[logging]\nlevel = \"debug\"\n").expect("write");
    let cfg = Config::load(&path).expect("load");
    assert_eq!(cfg.logging.level, "debug");
    assert!(Config::load(&dir.path().join("missing.toml")).is_err());
}
