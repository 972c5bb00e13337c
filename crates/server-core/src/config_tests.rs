use super::*;
use crate::auth::hash_password;

fn base() -> String {
    format!(
        r#"
        [proxy]
        connect_timeout_secs = 5

        [[users]]
        name = "alice"
        password_hash = "{}"

        [[targets]]
        name = "web01"
        address = "10.0.0.5"
        default_account = "deploy"

        [[accounts]]
        name = "deploy"
        password = "pw"

        [[grants]]
        user = "alice"
        target = "web01"
        accounts = ["deploy"]
        "#,
        hash_password("pw").unwrap()
    )
}

#[test]
fn valid_config_parses() {
    let config = parse_config(&base()).unwrap();
    assert_eq!(config.proxy.connect_timeout_secs, 5);
    assert!(config.proxy.check_access_first);
}

#[test]
fn rejects_dangling_grant() {
    let raw = base() + "\n[[grants]]\nuser = \"alice\"\ntarget = \"db01\"\naccounts = [\"deploy\"]\n";
    let err = parse_config(&raw).unwrap_err();
    assert!(err.to_string().contains("unknown target 'db01'"), "{err}");
}

#[test]
fn rejects_duplicate_accounts() {
    let raw = base() + "\n[[accounts]]\nname = \"deploy\"\n";
    assert!(matches!(parse_config(&raw), Err(ServerError::InvalidConfig(_))));
}

#[test]
fn rejects_conflicting_secrets() {
    let raw = base() + "\n[[accounts]]\nname = \"both\"\npassword = \"a\"\nprivate_key = \"b\"\n";
    let err = parse_config(&raw).unwrap_err();
    assert!(err.to_string().contains("both password and private_key"), "{err}");

    let raw = base() + "\n[[accounts]]\nname = \"pp\"\nkey_passphrase = \"a\"\n";
    assert!(parse_config(&raw).is_err());
}

#[test]
fn rejects_bad_hash_and_zero_timeout() {
    let raw = base().replace("connect_timeout_secs = 5", "connect_timeout_secs = 0");
    assert!(parse_config(&raw).is_err());

    let raw = "[[users]]\nname = \"bob\"\npassword_hash = \"plaintext\"\n";
    assert!(parse_config(raw).is_err());
}

#[test]
fn load_reads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gatekeeper.toml");
    std::fs::write(&path, base()).unwrap();
    let config = load_config(&path).unwrap();
    assert_eq!(config.targets[0].name, "web01");

    assert!(matches!(load_config(&dir.path().join("missing.toml")), Err(ServerError::Io(_))));
}

#[test]
fn malformed_toml_is_a_parse_error() {
    assert!(matches!(parse_config("[[users]\nname="), Err(ServerError::ConfigParse(_))));
}

#[test]
fn log_level_is_validated() {
    let config = parse_config(&(String::from("[server]\nlog_level = \"DEBUG\"\n") + &base())).unwrap();
    assert_eq!(config.server.log_level.as_deref(), Some("DEBUG"));

    let err = parse_config(&(String::from("[server]\nlog_level = \"loud\"\n") + &base())).unwrap_err();
    assert!(err.to_string().contains("server.log_level 'loud'"), "{err}");
}
