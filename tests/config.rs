// ABOUTME: Integration tests for configuration parsing and validation.
// ABOUTME: Tests YAML parsing, file discovery, and env/file secret resolution.

mod support;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tagwatch::config::*;
use tagwatch::model::ContainerResult;
use tagwatch::registry::{RegistryClient, create_registry};
use tagwatch::runtime::RuntimeEndpoint;
use tagwatch::watcher::WatcherConfig;

mod parsing {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = Config::from_yaml("").unwrap();
        assert_eq!(config.log.level, "info");
        assert!(config.registries.is_empty());

        let watchers = config.watchers();
        assert_eq!(watchers.len(), 1);
        assert_eq!(watchers[DEFAULT_WATCHER], WatcherConfig::default());
    }

    #[test]
    fn parse_full_config() {
        let yaml = r#"
log:
  level: debug

watchers:
  local:
    cron: "*/15 * * * *"
    watchall: true
    watchevents: false
  remote:
    host: 10.0.0.2
    port: 2376
    cafile: /certs/ca.pem
    certfile: /certs/cert.pem
    keyfile: /certs/key.pem
    debounce: 30s
    startdelay: 1m

registries:
  hub:
    public: ""
  custom:
    lan:
      url: https://registry.lan
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.log.level, "debug");

        let local = &config.watchers["local"];
        assert_eq!(local.cron, "*/15 * * * *");
        assert!(local.watchall);
        assert!(!local.watchevents);
        assert!(local.watchbydefault);
        assert_eq!(
            local.endpoint().unwrap(),
            RuntimeEndpoint::Socket(PathBuf::from("/var/run/docker.sock"))
        );

        let remote = &config.watchers["remote"];
        assert_eq!(remote.debounce, Duration::from_secs(30));
        assert_eq!(remote.startdelay, Duration::from_secs(60));
        match remote.endpoint().unwrap() {
            RuntimeEndpoint::Tcp { host, port, tls } => {
                assert_eq!(host, "10.0.0.2");
                assert_eq!(port, 2376);
                assert_eq!(tls.unwrap().ca, PathBuf::from("/certs/ca.pem"));
            }
            other => panic!("expected a TCP endpoint, got {other}"),
        }

        assert_eq!(config.registries.len(), 2);
        assert!(config.registries["custom"].contains_key("lan"));
    }

    #[test]
    fn configured_watchers_replace_the_default() {
        let config = Config::from_yaml("watchers:\n  nas:\n    host: nas.lan\n").unwrap();
        let watchers = config.watchers();
        assert_eq!(watchers.keys().collect::<Vec<_>>(), vec!["nas"]);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = Config::from_yaml("watchers:\n  local:\n    cronn: '* * * * *'\n").unwrap_err();
        assert!(err.to_string().contains("cronn"), "got: {err}");
    }

    #[test]
    fn dotted_names_are_rejected() {
        let err = Config::from_yaml("registries:\n  hub:\n    my.hub: ''\n").unwrap_err();
        assert!(err.to_string().contains("my.hub"), "got: {err}");
    }

    #[test]
    fn update_message_is_rendered_per_container() {
        let config = Config::from_yaml(
            "log:\n  update_message: '${container.name} ${container.image.tag.value} -> ${container.result.tag}'\n",
        )
        .unwrap();
        let mut container = support::containers::container("hub.public", "https://registry-1.docker.io/v2", "org/app", "1.0.0");
        container.result = Some(ContainerResult {
            tag: Some("2.0.0".to_string()),
            ..Default::default()
        });

        assert_eq!(
            config.log.render_update(&container).as_deref(),
            Some("app 1.0.0 -> 2.0.0")
        );
        assert_eq!(Config::default().log.render_update(&container), None);
    }

    #[test]
    fn update_message_placeholders_are_checked_at_load() {
        let err = Config::from_yaml("log:\n  update_message: '${process.env.HOME}'\n").unwrap_err();
        assert!(err.to_string().contains("log.update_message"), "got: {err}");
    }

    #[test]
    fn template_is_a_valid_config() {
        let config = Config::from_yaml(template()).unwrap();
        assert!(config.watchers.contains_key("local"));
        assert!(config.registries.contains_key("hub"));
    }
}

mod discovery {
    use super::*;

    #[test]
    fn finds_primary_file_first() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILENAME_ALT), "log:\n  level: warn\n").unwrap();
        std::fs::write(dir.path().join(CONFIG_FILENAME), "log:\n  level: debug\n").unwrap();

        assert_eq!(Config::find(dir.path()), Some(dir.path().join(CONFIG_FILENAME)));
        assert_eq!(Config::discover(dir.path()).unwrap().log.level, "debug");
    }

    #[test]
    fn finds_config_in_dot_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".tagwatch")).unwrap();
        std::fs::write(dir.path().join(CONFIG_FILENAME_DIR), "log:\n  level: trace\n").unwrap();

        assert_eq!(Config::discover(dir.path()).unwrap().log.level, "trace");
    }

    #[test]
    fn missing_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::find(dir.path()).is_none());
        let err = Config::discover(dir.path()).unwrap_err();
        assert!(err.to_string().contains("not found"), "got: {err}");
    }

    #[test]
    fn init_then_discover_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = init_config(dir.path(), false).unwrap();
        assert_eq!(Config::find(dir.path()), Some(path));
        assert!(init_config(dir.path(), false).is_err());
        assert!(init_config(dir.path(), true).is_ok());
    }
}

mod secrets {
    use super::*;
    use support::transport::ScriptedTransport;

    fn client() -> RegistryClient {
        RegistryClient::new(Arc::new(ScriptedTransport::new()))
    }

    #[test]
    fn env_value_resolves_from_environment() {
        let value: ConfigValue = serde_yaml::from_str("env: TAGWATCH_TEST_SECRET").unwrap();
        temp_env::with_var("TAGWATCH_TEST_SECRET", Some("s3cret"), || {
            assert_eq!(value.resolve().unwrap(), "s3cret");
        });
    }

    #[test]
    fn env_value_falls_back_to_default() {
        let value: ConfigValue =
            serde_yaml::from_str("env: TAGWATCH_TEST_UNSET\ndefault: fallback").unwrap();
        temp_env::with_var_unset("TAGWATCH_TEST_UNSET", || {
            assert_eq!(value.resolve().unwrap(), "fallback");
        });
    }

    #[test]
    fn missing_env_value_is_an_error() {
        let value: ConfigValue = serde_yaml::from_str("env: TAGWATCH_TEST_UNSET").unwrap();
        temp_env::with_var_unset("TAGWATCH_TEST_UNSET", || {
            let err = value.resolve().unwrap_err();
            assert!(err.to_string().contains("TAGWATCH_TEST_UNSET"), "got: {err}");
        });
    }

    #[test]
    fn file_value_drops_trailing_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("password");
        std::fs::write(&path, "hunter2\n").unwrap();
        let value = ConfigValue::FromFile { file: path };
        assert_eq!(value.resolve().unwrap(), "hunter2");
    }

    #[test]
    fn registry_credentials_resolve_from_environment() {
        let yaml = "login: me\npassword:\n  env: TAGWATCH_TEST_HUB_PASSWORD\n";
        let value: serde_yaml::Value = serde_yaml::from_str(yaml).unwrap();
        temp_env::with_var("TAGWATCH_TEST_HUB_PASSWORD", Some("from-env"), || {
            let registry = create_registry("hub", "private", &value, client()).unwrap();
            let credentials = registry.auth_pull().unwrap();
            assert_eq!(credentials.username, "me");
            assert_eq!(credentials.password, "from-env");
        });
    }

    #[test]
    fn registry_with_missing_secret_is_rejected() {
        let yaml = "url: https://registry.lan\nlogin: me\npassword:\n  env: TAGWATCH_TEST_UNSET\n";
        let value: serde_yaml::Value = serde_yaml::from_str(yaml).unwrap();
        temp_env::with_var_unset("TAGWATCH_TEST_UNSET", || {
            assert!(create_registry("custom", "lan", &value, client()).is_err());
        });
    }
}
