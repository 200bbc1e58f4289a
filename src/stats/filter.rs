use std::collections::HashSet;

/// Set of operation names to show. Empty means every operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpFilter {
    names: HashSet<String>,
}

impl OpFilter {
    /// Build from a comma-separated list such as `"READ, write,GETATTR"`.
    pub fn parse(list: &str) -> Self {
        Self::from_names(list.split(','))
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = names.into_iter()
            .map(|s| s.as_ref().trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        Self { names }
    }

    pub fn is_empty(&self) -> bool { self.names.is_empty() }

    /// Operation names are matched case-insensitively.
    pub fn matches(&self, op: &str) -> bool {
        self.names.is_empty() || self.names.contains(&op.to_uppercase())
    }

    /// Filter names in sorted order, for summaries.
    pub fn names(&self) -> Vec<&str> {
        let mut v: Vec<&str> = self.names.iter().map(String::as_str).collect();
        v.sort();
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_blank_lists_match_everything() {
        for list in ["", "   ", ",,", " , "] {
            let f = OpFilter::parse(list);
            assert!(f.is_empty(), "{list:?}");
            assert!(f.matches("READ"));
        }
    }

    #[test]
    fn trims_and_ignores_case() {
        let f = OpFilter::parse(" read , WRITE ,GetAttr ");
        assert_eq!(f.names(), vec!["GETATTR", "READ", "WRITE"]);
        assert!(f.matches("READ"));
        assert!(f.matches("getattr"));
        assert!(!f.matches("LOOKUP"));
    }

    #[test]
    fn built_from_config_list() {
        let f = OpFilter::from_names(vec!["READ".to_string(), "".to_string()]);
        assert_eq!(f.names(), vec!["READ"]);
    }
}
