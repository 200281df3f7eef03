use serde::Deserialize;

/// Entry-point file that marks a directory as a module candidate
pub const MANIFEST_FILE: &str = "module.toml";

/// Typed contents of a module's `module.toml`
///
/// ```toml
/// display-name = "Caixin"
/// base-url = "https://www.caixin.com/"
/// base-domain = "www.caixin.com"
///
/// [selectors]
/// links = ["div.stitXtuwen_list h4 > a"]
/// title = ["div.article h1", "h1", "title"]
/// content = ["div#the_content"]
/// pub-date = ["div.artInfo"]
/// remove = ["script", "style"]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleManifest {
    #[serde(rename = "display-name", default)]
    pub display_name: Option<String>,

    #[serde(rename = "base-url", default)]
    pub base_url: String,

    #[serde(rename = "base-domain", default)]
    pub base_domain: String,

    /// Whether the module offers the non-blocking fetch capability
    #[serde(rename = "async-fetch", default = "default_async_fetch")]
    pub async_fetch: bool,

    #[serde(default)]
    pub selectors: SelectorSet,
}

fn default_async_fetch() -> bool {
    true
}

/// CSS selectors driving extraction, each list tried in priority order
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SelectorSet {
    /// Anchors on the index page pointing at articles
    pub links: Vec<String>,

    pub title: Vec<String>,

    /// Article body containers
    pub content: Vec<String>,

    #[serde(rename = "pub-date")]
    pub pub_date: Vec<String>,

    /// Elements dropped from the article body
    pub remove: Vec<String>,
}

impl ModuleManifest {
    /// Parses manifest TOML
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}
