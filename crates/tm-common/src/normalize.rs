use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use unicode_normalization::UnicodeNormalization;

/// Skill alias -> canonical form (O(1) lookup). Keys must already be in
/// folded form (NFKC, lowercase, collapsed whitespace).
static ALIAS_TO_CANONICAL: LazyLock<HashMap<&'static str, &'static str>> = LazyLock::new(|| {
    let aliases: &[(&str, &[&str])] = &[
        ("javascript", &["js", "java script", "ecmascript", "es6"]),
        ("typescript", &["ts", "type script"]),
        ("nodejs", &["node", "node.js", "node js"]),
        ("react", &["react.js", "reactjs", "react js"]),
        ("vue", &["vue.js", "vuejs"]),
        ("angular", &["angularjs", "angular.js"]),
        ("python", &["py", "python3"]),
        ("golang", &["go"]),
        ("csharp", &["c#", ".net", "dotnet"]),
        ("cpp", &["c++"]),
        ("postgresql", &["postgres", "psql", "pgsql"]),
        ("mysql", &["my sql"]),
        ("mongodb", &["mongo"]),
        ("kubernetes", &["k8s", "k8"]),
        ("docker", &["docker ce"]),
        ("aws", &["amazon web services"]),
        ("gcp", &["google cloud", "google cloud platform"]),
        ("azure", &["microsoft azure"]),
        ("machine learning", &["ml"]),
        ("artificial intelligence", &["ai"]),
        ("ci/cd", &["cicd", "ci cd"]),
        ("rest", &["restful", "rest api"]),
    ];

    let mut map = HashMap::new();
    for (canonical, names) in aliases {
        map.insert(*canonical, *canonical);
        for name in *names {
            map.insert(*name, *canonical);
        }
    }
    map
});

fn fold(raw: &str) -> String {
    let folded: String = raw.nfkc().collect::<String>().to_lowercase();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Canonical form of one skill keyword: NFKC fold, lowercase, collapsed
/// whitespace, then alias resolution ("K8s" and "kubernetes" compare equal).
pub fn normalize_skill(raw: &str) -> String {
    let folded = fold(raw);
    match ALIAS_TO_CANONICAL.get(folded.as_str()) {
        Some(canonical) => (*canonical).to_string(),
        None => folded,
    }
}

/// Normalized, de-duplicated skill set for overlap scoring.
pub fn normalize_skill_set(skills: &[String]) -> HashSet<String> {
    skills
        .iter()
        .map(|skill| normalize_skill(skill))
        .filter(|skill| !skill.is_empty())
        .collect()
}

/// Location and region strings compare on the folded form only; there is
/// no alias table for places.
pub fn normalize_place(raw: &str) -> String {
    fold(raw)
}
