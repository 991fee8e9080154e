// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `repos` command: configured repositories and their scheduling knobs.

use ralph_config::Config;
use serde_json::json;

pub fn handle(config_path: &std::path::Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(config_path)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&to_json(&config))?);
    } else {
        print!("{}", render_text(&config));
    }
    Ok(())
}

pub fn to_json(config: &Config) -> serde_json::Value {
    let repos: Vec<serde_json::Value> = config
        .repos
        .iter()
        .map(|(slug, repo)| {
            json!({
                "repo": slug,
                "priority": repo.priority_band().0,
                "concurrencySlots": repo.slots(),
                "botBranch": repo.bot_branch,
                "defaultBranch": repo.default_branch,
                "root": repo.root,
            })
        })
        .collect();
    json!({ "repos": repos, "error": null })
}

pub fn render_text(config: &Config) -> String {
    if config.repos.is_empty() {
        return "no repositories configured\n".to_string();
    }
    let mut out = format!(
        "{:<32} {:>8} {:>5} {:<20} {:<12}\n",
        "REPO", "PRIORITY", "SLOTS", "BOT BRANCH", "DEFAULT",
    );
    for (slug, repo) in &config.repos {
        out.push_str(&format!(
            "{:<32} {:>8} {:>5} {:<20} {:<12}\n",
            slug,
            repo.priority_band().0,
            repo.slots(),
            repo.bot_branch,
            repo.default_branch,
        ));
    }
    out
}

#[cfg(test)]
#[path = "repos_tests.rs"]
mod tests;
