use vg_domain::config::Config;

#[test]
fn default_bind_serves_all_interfaces() {
    let config = Config::default();
    assert_eq!(config.server.bind, "0.0.0.0:8080");
}

#[test]
fn explicit_bind_parses() {
    let toml_str = r#"
[server]
bind = "127.0.0.1:3210"
"#;
    let config: Config = toml::from_str(toml_str).unwrap();
    assert_eq!(config.server.bind, "127.0.0.1:3210");
}

#[test]
fn fixed_voice_values_have_spoken_defaults() {
    let config = Config::default();
    assert_eq!(config.llm.stream_timeout_secs, 15);
    assert!(config.voice.greeting_prompt.contains("Greet"));
    assert!(!config.voice.apology_text.is_empty());
}
