//! An example of using the [`PathBuilder`] fluent API to construct queries
//! and evaluate them together in one pass.
use xsniff::query::{Condition, PathBuilder, Query, QuerySet};
use xsniff::{SniffOptions, sniff};

fn main() {
    // Construct the query "/catalog/book[@lang='en']"
    let lang = PathBuilder::new().attribute("lang").build();
    let english = PathBuilder::absolute()
        .child("catalog")
        .child("book")
        .filter(vec![Condition::equals(lang, "en")])
        .build();
    assert_eq!("/catalog/book[@lang='en']", english.to_string());

    // Another example: "count(//title)"
    let titles = Query::Function(
        "count".parse().expect("known function"),
        PathBuilder::absolute().descendant("title").build(),
    );
    assert_eq!("count(//title)", titles.to_string());

    let mut set = QuerySet::new();
    set.add(&Query::Path(english)).expect("query compiles");
    set.add(&titles).expect("query compiles");

    let document = r#"<catalog>
        <book lang="en"><title>Dune</title></book>
        <book lang="de"><title>Momo</title></book>
    </catalog>"#;
    let results = sniff(&set, document, &SniffOptions::default()).expect("well-formed document");
    assert_eq!(results.get(0), Some(&["/catalog[1]/book[1]".to_string()][..]));
    assert_eq!(results.get(1), Some(&["2".to_string()][..]));
}
