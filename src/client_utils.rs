/// Pluralize a Kind the way the API server names its resource collections
///
/// Follows kube-rs' rules (kube-core `discovery::to_plural`, Apache-2.0):
/// already-plural and metrics kinds are special-cased, sibilant endings take
/// `-es`, consonant + `y` becomes `-ies`, everything else takes `-s`.
pub fn pluralize(kind: &str) -> String {
    let word = kind.to_ascii_lowercase();

    match word.as_str() {
        "endpoints" | "endpointslices" => return word,
        "nodemetrics" => return "nodes".to_string(),
        "podmetrics" => return "pods".to_string(),
        _ => {}
    }

    if ["s", "x", "z", "ch", "sh"].iter().any(|s| word.ends_with(s)) {
        return format!("{word}es");
    }

    if let Some(stem) = word.strip_suffix('y') {
        if stem
            .chars()
            .last()
            .is_some_and(|c| !matches!(c, 'a' | 'e' | 'i' | 'o' | 'u'))
        {
            return format!("{stem}ies");
        }
    }

    format!("{word}s")
}

/// Best-effort lower-case singular of a plural resource name
///
/// Only used to label objects and lists the mock server builds itself, where
/// the request carried no `kind`.
pub fn singularize(plural: &str) -> String {
    if let Some(stem) = plural.strip_suffix("ies") {
        format!("{stem}y")
    } else if ["ses", "xes", "zes", "ches", "shes"]
        .iter()
        .any(|s| plural.ends_with(s))
    {
        plural[..plural.len() - 2].to_string()
    } else if let Some(stem) = plural.strip_suffix('s') {
        stem.to_string()
    } else {
        plural.to_string()
    }
}

/// `group/version`, or just `version` for the core group
pub fn api_version(group: &str, version: &str) -> String {
    if group.is_empty() {
        version.to_string()
    } else {
        format!("{}/{}", group, version)
    }
}
