use super::*;

#[test]
fn env_parse_falls_back_to_default_when_unset() {
    assert_eq!(env_parse("RELAY_TEST_NEVER_SET_PORT", 3000u16), 3000);
    assert_eq!(env_parse("RELAY_TEST_NEVER_SET_DEPTH", 64usize), 64);
}

#[test]
fn env_parse_falls_back_to_default_on_unparsable_value() {
    temp_env::with_var("RELAY_TEST_BAD_PORT", Some("not-a-number"), || {
        assert_eq!(env_parse("RELAY_TEST_BAD_PORT", 3000u16), 3000);
    });
}

#[test]
fn env_parse_reads_a_valid_value() {
    temp_env::with_var("RELAY_TEST_GOOD_PORT", Some("8080"), || {
        assert_eq!(env_parse("RELAY_TEST_GOOD_PORT", 3000u16), 8080);
    });
}

#[test]
fn from_env_defaults_the_credentials_path() {
    temp_env::with_var_unset("SPOTIFY_CREDENTIALS_PATH", || {
        let config = Config::from_env();
        assert_eq!(config.credentials_path, PathBuf::from("spotify_credentials.json"));
    });
}

#[test]
fn from_env_honors_an_explicit_credentials_path() {
    temp_env::with_var("SPOTIFY_CREDENTIALS_PATH", Some("/tmp/creds.json"), || {
        let config = Config::from_env();
        assert_eq!(config.credentials_path, PathBuf::from("/tmp/creds.json"));
    });
}
