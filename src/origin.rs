//! Classification of type names by where they come from.

use glob::{MatchOptions, Pattern};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PatternError;

const GLOB_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// A package matcher. Plain text is a prefix that respects package
/// boundaries; text with glob metacharacters is matched segment-wise, `*`
/// inside one package segment and `**` across segments.
#[derive(Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackagePattern {
    source: String,
    glob: Option<Pattern>,
}

impl PackagePattern {
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, class_name: &str) -> bool {
        match &self.glob {
            Some(pattern) => pattern.matches_with(&class_name.replace('.', "/"), GLOB_OPTIONS),
            None => class_name
                .strip_prefix(self.source.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('.')),
        }
    }
}

impl FromStr for PackagePattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let source = s.trim();
        let error = |reason: String| PatternError {
            pattern: s.to_string(),
            reason,
        };
        if source.is_empty() {
            return Err(error("empty pattern".to_string()));
        }
        if source.starts_with('.') || source.ends_with('.') || source.contains("..") {
            return Err(error("empty package segment".to_string()));
        }
        let glob = if source.contains(['*', '?', '[']) {
            let pattern = Pattern::new(&source.replace('.', "/")).map_err(|e| error(e.to_string()))?;
            Some(pattern)
        } else {
            None
        };
        Ok(Self {
            source: source.to_string(),
            glob,
        })
    }
}

impl TryFrom<String> for PackagePattern {
    type Error = PatternError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PackagePattern> for String {
    fn from(value: PackagePattern) -> Self {
        value.source
    }
}

impl PartialEq for PackagePattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for PackagePattern {}

impl fmt::Debug for PackagePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PackagePattern").field(&self.source).finish()
    }
}

impl fmt::Display for PackagePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeOrigin {
    /// Host platform API that is not meant for plugins.
    Internal,
    /// JDK, language runtimes and logging facades.
    Runtime,
    /// Public host platform API.
    Public,
    /// The plugin's own code and its third-party libraries.
    External,
}

impl TypeOrigin {
    pub fn is_host_api(self) -> bool {
        matches!(self, Self::Public | Self::Internal)
    }
}

#[derive(Debug, Clone)]
pub struct OriginClassifier {
    internal: Vec<PackagePattern>,
    runtime: Vec<PackagePattern>,
    host: Vec<PackagePattern>,
}

impl OriginClassifier {
    pub fn new(
        internal: Vec<PackagePattern>,
        runtime: Vec<PackagePattern>,
        host: Vec<PackagePattern>,
    ) -> Self {
        Self {
            internal,
            runtime,
            host,
        }
    }

    pub fn classify(&self, class_name: &str) -> TypeOrigin {
        if self.internal_match(class_name).is_some() {
            TypeOrigin::Internal
        } else if self.runtime.iter().any(|p| p.matches(class_name)) {
            TypeOrigin::Runtime
        } else if self.host.iter().any(|p| p.matches(class_name)) {
            TypeOrigin::Public
        } else {
            TypeOrigin::External
        }
    }

    /// First internal pattern matching `class_name`, in configuration order.
    pub fn internal_match(&self, class_name: &str) -> Option<&PackagePattern> {
        self.internal.iter().find(|p| p.matches(class_name))
    }

    pub fn runtime_packages(&self) -> &[PackagePattern] {
        &self.runtime
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(s: &str) -> PackagePattern {
        s.parse().unwrap()
    }

    #[test]
    fn prefix_respects_package_boundaries() {
        let p = pattern("com.acme.internal");
        assert!(p.matches("com.acme.internal.Helper"));
        assert!(p.matches("com.acme.internal.sub.Thing"));
        assert!(!p.matches("com.acme.internalized.Other"));
        assert!(!p.matches("com.acme.Internal"));
    }

    #[test]
    fn single_star_stays_within_one_package() {
        let p = pattern("com.acme.internal.*");
        assert!(p.matches("com.acme.internal.Helper"));
        assert!(p.matches("com.acme.internal.Helper$Inner"));
        assert!(!p.matches("com.acme.internal.sub.Thing"));
        assert!(!p.matches("com.acme.internalized.Other"));
    }

    #[test]
    fn double_star_spans_packages() {
        let p = pattern("org.gradle.**.internal.**");
        assert!(p.matches("org.gradle.api.internal.AbstractTask"));
        assert!(p.matches("org.gradle.api.tasks.internal.deep.Thing"));
        assert!(!p.matches("org.gradle.api.DefaultTask"));
        assert!(!p.matches("org.gradle.api.internalized.Thing"));
    }

    #[test]
    fn rejects_malformed_patterns() {
        assert!("".parse::<PackagePattern>().is_err());
        assert!("com..acme".parse::<PackagePattern>().is_err());
        assert!("com.[acme".parse::<PackagePattern>().is_err());
    }

    #[test]
    fn internal_wins_over_host() {
        let classifier = OriginClassifier::new(
            vec![pattern("org.gradle.internal")],
            vec![pattern("java")],
            vec![pattern("org.gradle")],
        );
        assert_eq!(
            classifier.classify("org.gradle.internal.Factory"),
            TypeOrigin::Internal
        );
        assert_eq!(classifier.classify("org.gradle.api.Task"), TypeOrigin::Public);
        assert_eq!(classifier.classify("java.lang.String"), TypeOrigin::Runtime);
        assert_eq!(classifier.classify("com.example.MyTask"), TypeOrigin::External);
        assert_eq!(
            classifier
                .internal_match("org.gradle.internal.Factory")
                .map(PackagePattern::as_str),
            Some("org.gradle.internal")
        );
    }

    #[test]
    fn patterns_round_trip_through_toml_strings() {
        #[derive(Deserialize, Serialize)]
        struct Holder {
            patterns: Vec<PackagePattern>,
        }
        let holder: Holder = toml::from_str(r#"patterns = ["a.b", "c.*"]"#).unwrap();
        assert!(holder.patterns[1].matches("c.D"));
        let again: Holder = toml::from_str(&toml::to_string(&holder).unwrap()).unwrap();
        assert_eq!(again.patterns, holder.patterns);
    }
}
