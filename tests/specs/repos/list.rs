//! `repos` specs: configured repositories and scheduling knobs.

use crate::prelude::*;

const TWO_REPOS: &str = r#"
[repos."acme/app"]
root = "/srv/checkouts/app"
priority = 2
concurrency_slots = 3

[repos."acme/lib"]
root = "/srv/checkouts/lib"
max_workers = 2
"#;

#[test]
fn repos_json_lists_configured_repos() {
    let root = ControlRoot::new();
    root.file(root.config_path(), TWO_REPOS);

    let out = root.ralph().args(&["repos", "--json"]).passes();
    let value = out.json();
    let repos = value["repos"].as_array().unwrap();
    assert_eq!(repos.len(), 2);
    assert_eq!(repos[0]["repo"], "acme/app");
    assert_eq!(repos[0]["priority"], 2);
    assert_eq!(repos[0]["concurrencySlots"], 3);
    // legacy max_workers feeds the slot fallback chain
    assert_eq!(repos[1]["concurrencySlots"], 2);
}

#[test]
fn repos_text_prints_a_table() {
    let root = ControlRoot::new();
    root.file(root.config_path(), TWO_REPOS);

    root.ralph()
        .args(&["repos"])
        .passes()
        .stdout_has("acme/app")
        .stdout_has("bot/integration");
}

#[test]
fn repos_with_no_config_says_so() {
    ControlRoot::new().ralph().args(&["repos"]).passes().stdout_has("no repositories configured");
}

#[test]
fn invalid_config_is_a_validation_error() {
    let root = ControlRoot::new();
    root.file(
        root.config_path(),
        r#"
[repos."not-a-slug"]
root = "/srv/x"
"#,
    );
    root.ralph().args(&["repos"]).fails().stderr_has("repos.not-a-slug");
}
