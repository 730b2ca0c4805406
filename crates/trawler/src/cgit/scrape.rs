//! cgit page structure.
//!
//! cgit has no API; these selectors match the markup every cgit release
//! renders for the index header, the pager, the repository table and the
//! clone URL rows of a summary page.

use std::collections::HashSet;

use scraper::{Html, Selector};
use url::Url;

use super::error::ScrapeError;

/// Header link to the instance's main index.
pub const MAIN_LINK: &str = "td.main a";

pub const PAGER_LINKS: &str = "ul.pager a";

pub const REPO_LINKS: &str = "td.toplevel-repo a, td.sublevel-repo a";

pub const CLONE_LINKS: &str = "a[rel='vcs-git']";

/// Endpoint schemes in order of preference.
pub const ENDPOINT_PREFERENCE: [&str; 4] = ["https://", "git://", "http://", "ssh://"];

fn selector(css: &'static str) -> Result<Selector, ScrapeError> {
    Selector::parse(css).map_err(|e| ScrapeError::Selector {
        css,
        message: e.to_string(),
    })
}

/// Raw `href` values matching `css`, in document order, without duplicates.
fn hrefs(document: &Html, css: &'static str) -> Result<Vec<String>, ScrapeError> {
    let selector = selector(css)?;
    let mut seen = HashSet::new();
    Ok(document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty() && seen.insert(href.to_string()))
        .map(str::to_string)
        .collect())
}

/// Like [`hrefs`], resolved against `base`. Unresolvable links are skipped.
fn links(document: &Html, css: &'static str, base: &Url) -> Result<Vec<Url>, ScrapeError> {
    let mut seen = HashSet::new();
    Ok(hrefs(document, css)?
        .into_iter()
        .filter_map(|href| match base.join(&href) {
            Ok(mut url) => {
                url.set_fragment(None);
                Some(url)
            }
            Err(e) => {
                tracing::debug!(href = %href, base = %base, error = %e, "Skipping unresolvable link");
                None
            }
        })
        .filter(|url| seen.insert(url.to_string()))
        .collect())
}

/// The main index the header links to, if the page has one.
pub fn main_link(html: &str, base: &Url) -> Result<Option<Url>, ScrapeError> {
    let document = Html::parse_document(html);
    Ok(links(&document, MAIN_LINK, base)?.into_iter().next())
}

/// Listing pages of an index. Empty when the index fits on one page.
pub fn page_links(html: &str, base: &Url) -> Result<Vec<Url>, ScrapeError> {
    let document = Html::parse_document(html);
    links(&document, PAGER_LINKS, base)
}

/// Repository summary pages listed on an index page.
pub fn repo_links(html: &str, base: &Url) -> Result<Vec<Url>, ScrapeError> {
    let document = Html::parse_document(html);
    links(&document, REPO_LINKS, base)
}

/// Clone URLs advertised on a repository summary page, as written.
pub fn clone_aliases(html: &str) -> Result<Vec<String>, ScrapeError> {
    let document = Html::parse_document(html);
    hrefs(&document, CLONE_LINKS)
}

/// First alias matching the scheme preference order, or an empty string.
pub fn canonical_endpoint(aliases: &[String]) -> String {
    ENDPOINT_PREFERENCE
        .iter()
        .find_map(|prefix| aliases.iter().find(|alias| alias.starts_with(prefix)))
        .cloned()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX: &str = r#"
        <table id='header'><tr><td class='main'><a href='/'>index</a></td></tr></table>
        <table class='list'>
          <tr><td class='toplevel-repo'><a title='cgit' href='/cgit/'>cgit</a></td></tr>
          <tr><td class='reposection'>tools</td></tr>
          <tr><td class='sublevel-repo'><a title='tools/ls' href='/tools/ls/'>tools/ls</a></td></tr>
          <tr><td class='toplevel-repo'><a href='/cgit/'>cgit (again)</a></td></tr>
        </table>
        <ul class='pager'>
          <li><a class='current' href='/?ofs=0'>[1]</a></li>
          <li><a href='/?ofs=50'>[2]</a></li>
        </ul>"#;

    const SUMMARY: &str = r#"
        <table class='list'>
          <tr><td colspan='4'><a rel='vcs-git' href='git://git.example.org/cgit' title='cgit Git repository'>git://git.example.org/cgit</a></td></tr>
          <tr><td colspan='4'><a rel='vcs-git' href='https://git.example.org/cgit' title='cgit Git repository'>https://git.example.org/cgit</a></td></tr>
          <tr><td colspan='4'><a href='https://example.org/about'>about</a></td></tr>
        </table>"#;

    fn base() -> Url {
        Url::parse("https://git.example.org/").expect("valid base")
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn finds_main_link_and_pages() {
        let main = main_link(INDEX, &base()).expect("selector").expect("main link");
        assert_eq!(main.as_str(), "https://git.example.org/");

        let pages = page_links(INDEX, &base()).expect("selector");
        let pages: Vec<&str> = pages.iter().map(Url::as_str).collect();
        assert_eq!(
            pages,
            vec!["https://git.example.org/?ofs=0", "https://git.example.org/?ofs=50"]
        );
        assert!(page_links(SUMMARY, &base()).expect("selector").is_empty());
    }

    #[test]
    fn repo_links_cover_both_levels_once() {
        let repos = repo_links(INDEX, &base()).expect("selector");
        let repos: Vec<&str> = repos.iter().map(Url::as_str).collect();
        assert_eq!(
            repos,
            vec!["https://git.example.org/cgit/", "https://git.example.org/tools/ls/"]
        );
    }

    #[test]
    fn clone_aliases_only_take_vcs_links() {
        assert_eq!(
            clone_aliases(SUMMARY).expect("selector"),
            strings(&["git://git.example.org/cgit", "https://git.example.org/cgit"])
        );
    }

    #[test]
    fn canonical_endpoint_follows_scheme_preference() {
        let all = strings(&["ssh://a", "git://a", "http://a", "https://a"]);
        assert_eq!(canonical_endpoint(&all), "https://a");

        let no_http = strings(&["ssh://a", "git://a"]);
        assert_eq!(canonical_endpoint(&no_http), "git://a");

        let plain_http = strings(&["ssh://a", "http://a"]);
        assert_eq!(canonical_endpoint(&plain_http), "http://a");

        let none = strings(&["git@example.org:a.git", "rsync://a"]);
        assert_eq!(canonical_endpoint(&none), "");
        assert_eq!(canonical_endpoint(&[]), "");
    }
}
