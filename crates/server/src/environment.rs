/// Variables set by common hosting platforms (Render, Heroku, Railway,
/// Vercel, Hugging Face Spaces, Cloud Run, Fly.io, Lambda).
const HOSTED_MARKERS: &[&str] = &[
    "RENDER",
    "DYNO",
    "RAILWAY_ENVIRONMENT",
    "VERCEL",
    "SPACE_ID",
    "K_SERVICE",
    "FLY_APP_NAME",
    "AWS_LAMBDA_FUNCTION_NAME",
];

/// Explicit override, e.g. `MASKWATCH_HOSTED=1`.
const HOSTED_OVERRIDE: &str = "MASKWATCH_HOSTED";

/// Where the server runs, which decides whether server-side capture is
/// possible at all.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Environment {
    pub hosted: bool,
    pub platform: String,
}

impl Environment {
    pub fn detect() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let marker = HOSTED_MARKERS
            .iter()
            .find(|key| lookup(key).is_some_and(|v| !v.is_empty()));
        let forced = lookup(HOSTED_OVERRIDE).is_some_and(|v| is_truthy(&v));

        if let Some(key) = marker {
            log::info!("Hosted environment detected ({key} is set)");
        } else if forced {
            log::info!("Hosted mode forced by {HOSTED_OVERRIDE}");
        }

        Self {
            hosted: marker.is_some() || forced,
            platform: std::env::consts::OS.to_string(),
        }
    }

    pub fn local() -> Self {
        Self {
            hosted: false,
            platform: std::env::consts::OS.to_string(),
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> Environment {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_no_markers_is_local() {
        let env = env_of(&[("HOME", "/home/me")]);
        assert!(!env.hosted);
        assert_eq!(env.platform, std::env::consts::OS);
    }

    #[rstest]
    #[case("RENDER")]
    #[case("DYNO")]
    #[case("RAILWAY_ENVIRONMENT")]
    #[case("VERCEL")]
    #[case("SPACE_ID")]
    #[case("K_SERVICE")]
    #[case("FLY_APP_NAME")]
    #[case("AWS_LAMBDA_FUNCTION_NAME")]
    fn test_platform_marker_means_hosted(#[case] key: &str) {
        assert!(env_of(&[(key, "x")]).hosted);
    }

    #[test]
    fn test_empty_marker_is_ignored() {
        assert!(!env_of(&[("RENDER", "")]).hosted);
    }

    #[rstest]
    #[case("1", true)]
    #[case("true", true)]
    #[case("YES", true)]
    #[case(" on ", true)]
    #[case("0", false)]
    #[case("false", false)]
    #[case("", false)]
    fn test_override(#[case] value: &str, #[case] hosted: bool) {
        assert_eq!(env_of(&[(HOSTED_OVERRIDE, value)]).hosted, hosted);
    }
}
