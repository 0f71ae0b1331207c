// cooler/uri.rs

use std::path::PathBuf;

use crate::error::{HicdexError, Result};

/// A cooler URI: `<path>[::<group>]`. Without the `::` separator the
/// URI addresses the root group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoolerUri {
    pub path: PathBuf,
    pub group: String,
}

impl CoolerUri {
    pub fn parse(uri: &str) -> Result<Self> {
        let (path, group) = match uri.find("::") {
            Some(i) => (&uri[..i], uri[i + 2..].trim_start_matches('/')),
            None => (uri, ""),
        };
        if path.is_empty() {
            return Err(HicdexError::MalformedQuery {
                query: uri.to_string(),
                reason: "URI has an empty file path".to_string(),
            });
        }
        Ok(Self {
            path: PathBuf::from(path),
            group: group.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            group: String::new(),
        }
    }

    pub fn with_group(&self, group: impl Into<String>) -> Self {
        Self {
            path: self.path.clone(),
            group: group.into(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.group.is_empty()
    }
}

impl std::fmt::Display for CoolerUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}", self.path.display())
        } else {
            write!(f, "{}::/{}", self.path.display(), self.group)
        }
    }
}

impl std::str::FromStr for CoolerUri {
    type Err = HicdexError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let uri = CoolerUri::parse("test.cool").unwrap();
        assert_eq!(uri.path, PathBuf::from("test.cool"));
        assert!(uri.is_root());

        let uri = CoolerUri::parse("test.mcool::/resolutions/100000").unwrap();
        assert_eq!(uri.path, PathBuf::from("test.mcool"));
        assert_eq!(uri.group, "resolutions/100000");

        // Leading and trailing slashes in the group are normalized away
        let uri = CoolerUri::parse("test.mcool::resolutions/100000/").unwrap();
        assert_eq!(uri.group, "resolutions/100000");

        assert!(CoolerUri::parse("::/foo").is_err());
    }

    #[test]
    fn test_display_round_trip() {
        for s in ["test.cool", "test.mcool::/resolutions/5000"] {
            let uri = CoolerUri::parse(s).unwrap();
            assert_eq!(CoolerUri::parse(&uri.to_string()).unwrap(), uri);
        }
    }
}
