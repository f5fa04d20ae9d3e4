//! Document roles and URLs registered before a run.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// What [`Markers::mark`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarkerFlag {
    RootConfig,
    AppConfig,
    BaseUrl,
    AssetsUrl,
    Preload,
    Page,
}

impl MarkerFlag {
    pub fn as_str(self) -> &'static str {
        match self {
            MarkerFlag::RootConfig => "rootConfig",
            MarkerFlag::AppConfig => "appConfig",
            MarkerFlag::BaseUrl => "baseUrl",
            MarkerFlag::AssetsUrl => "assetsUrl",
            MarkerFlag::Preload => "preload",
            MarkerFlag::Page => "page",
        }
    }
}

impl fmt::Display for MarkerFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarkerFlag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rootConfig" => Ok(MarkerFlag::RootConfig),
            "appConfig" => Ok(MarkerFlag::AppConfig),
            "baseUrl" => Ok(MarkerFlag::BaseUrl),
            "assetsUrl" => Ok(MarkerFlag::AssetsUrl),
            "preload" => Ok(MarkerFlag::Preload),
            "page" => Ok(MarkerFlag::Page),
            other => Err(format!("unknown marker flag `{}`", other)),
        }
    }
}

/// Run-scoped registry of document roles.
///
/// Only [`mark`](Markers::mark) mutates it. Preload and page names are
/// append-only and keep registration order; the other flags replace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Markers {
    root_config: Option<String>,
    app_config: Option<String>,
    preload: Vec<String>,
    pages: Vec<String>,
    base_url: String,
    assets_url: String,
}

impl Markers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `value` under `flag`.
    pub fn mark(&mut self, flag: MarkerFlag, value: impl Into<String>) -> &mut Self {
        let value = value.into();
        match flag {
            MarkerFlag::RootConfig => self.root_config = Some(value),
            MarkerFlag::AppConfig => self.app_config = Some(value),
            MarkerFlag::BaseUrl => self.base_url = value,
            MarkerFlag::AssetsUrl => self.assets_url = value,
            MarkerFlag::Preload => self.preload.push(value),
            MarkerFlag::Page => self.pages.push(value),
        }
        self
    }

    pub fn root_config(&self) -> Option<&str> {
        self.root_config.as_deref()
    }

    pub fn app_config(&self) -> Option<&str> {
        self.app_config.as_deref()
    }

    /// Preload page names in registration order.
    pub fn preload(&self) -> &[String] {
        &self.preload
    }

    /// Declared page names in registration order.
    pub fn pages(&self) -> &[String] {
        &self.pages
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn assets_url(&self) -> &str {
        &self.assets_url
    }

    /// Whether `name` is in the declared page list.
    pub fn is_page(&self, name: &str) -> bool {
        self.pages.iter().any(|p| p == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_flags_append_in_order() {
        let mut markers = Markers::new();
        markers
            .mark(MarkerFlag::Page, "SignIn")
            .mark(MarkerFlag::Page, "Dashboard")
            .mark(MarkerFlag::Page, "SignIn")
            .mark(MarkerFlag::Preload, "BaseCSS");
        assert_eq!(markers.pages(), ["SignIn", "Dashboard", "SignIn"]);
        assert_eq!(markers.preload(), ["BaseCSS"]);
        assert!(markers.is_page("Dashboard"));
        assert!(!markers.is_page("BaseCSS"));
    }

    #[test]
    fn test_scalar_flags_replace() {
        let mut markers = Markers::new();
        markers.mark(MarkerFlag::BaseUrl, "https://a.example/");
        markers.mark(MarkerFlag::BaseUrl, "https://b.example/");
        markers.mark(MarkerFlag::RootConfig, "aitmed");
        assert_eq!(markers.base_url(), "https://b.example/");
        assert_eq!(markers.root_config(), Some("aitmed"));
        assert_eq!(markers.app_config(), None);
    }

    #[test]
    fn test_flag_names() {
        for flag in [
            MarkerFlag::RootConfig,
            MarkerFlag::AppConfig,
            MarkerFlag::BaseUrl,
            MarkerFlag::AssetsUrl,
            MarkerFlag::Preload,
            MarkerFlag::Page,
        ] {
            assert_eq!(flag.as_str().parse::<MarkerFlag>(), Ok(flag));
        }
        assert!("pages".parse::<MarkerFlag>().is_err());
    }
}
