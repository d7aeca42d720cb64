//! Repository URL normalization cases.

use haulout_core::repo_ref::normalize;
use rstest::rstest;

#[rstest]
#[case("https://github.com/acme/repo", "acme", "repo")]
#[case("https://github.com/acme/repo.git", "acme", "repo")]
#[case("https://github.com/acme/repo/", "acme", "repo")]
#[case("http://github.com/acme/repo", "acme", "repo")]
#[case("https://www.github.com/acme/repo", "acme", "repo")]
#[case("https://GitHub.com/acme/repo", "acme", "repo")]
#[case("github.com/acme/repo", "acme", "repo")]
#[case("https://github.com/acme/repo/tree/main/src", "acme", "repo")]
#[case("  https://github.com/acme/repo  ", "acme", "repo")]
fn normalizes_github_urls(#[case] url: &str, #[case] owner: &str, #[case] name: &str) {
    let repo = normalize(url).expect("should normalize");
    assert_eq!(repo.owner, owner);
    assert_eq!(repo.name, name);
}

#[rstest]
#[case("")]
#[case("https://github.com")]
#[case("https://github.com/")]
#[case("https://github.com/acme")]
#[case("https://github.com/acme/.git")]
#[case("https://gitlab.com/acme/repo")]
#[case("https://notgithub.com/acme/repo")]
#[case("not a url")]
fn excludes_unparseable_urls(#[case] url: &str) {
    assert!(normalize(url).is_none(), "{url:?} should be excluded");
}

#[test]
fn dot_git_and_plain_forms_share_a_key() {
    let a = normalize("https://github.com/acme/repo.git").expect("a");
    let b = normalize("https://github.com/acme/repo").expect("b");
    assert_eq!(a.key(), b.key());
}
