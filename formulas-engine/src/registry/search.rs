//! Filtering and ordering of the display list.

use crate::nicify::nicify;
use crate::record::FormulaRecord;

/// Which records a listing includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterOptions {
    /// Include records the user has hidden.
    pub show_hidden: bool,
    /// Include records known only from the catalog.
    pub show_online: bool,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            show_hidden: false,
            show_online: true,
        }
    }
}

impl From<crate::config::DisplayConfig> for FilterOptions {
    fn from(display: crate::config::DisplayConfig) -> Self {
        Self {
            show_hidden: display.show_hidden,
            show_online: display.show_online,
        }
    }
}

/// Produce the display list for `query`.
///
/// Records are ordered by `name` (ordinal). A single-word query matches the
/// raw name; a multi-word query requires every word to appear in the
/// nicified name. Matching is case-insensitive substring containment.
pub fn filter<'a, I>(records: I, query: &str, options: FilterOptions) -> Vec<&'a FormulaRecord>
where
    I: IntoIterator<Item = &'a FormulaRecord>,
{
    let mut results: Vec<&FormulaRecord> = records.into_iter().collect();
    results.sort_by(|a, b| a.name.cmp(&b.name));

    if !options.show_hidden {
        results.retain(|r| !r.hidden);
    }
    if !options.show_online {
        results.retain(|r| !r.is_online_only());
    }

    let words: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
    match words.as_slice() {
        [] => {}
        [word] => results.retain(|r| r.name.to_lowercase().contains(word.as_str())),
        _ => results.retain(|r| {
            let nice = nicify(&r.name).to_lowercase();
            words.iter().all(|w| nice.contains(w.as_str()))
        }),
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use std::path::PathBuf;

    fn local(name: &str) -> FormulaRecord {
        let mut record = FormulaRecord::new(name);
        record.local_path = Some(PathBuf::from(format!("/formulas/{name}.cs")));
        record.local_file_exists = true;
        record.installed = true;
        record
    }

    fn online(name: &str) -> FormulaRecord {
        let mut record = FormulaRecord::new(name);
        record.source_url = format!("https://example.com/{name}.cs");
        record
    }

    fn names(results: &[&FormulaRecord]) -> Vec<String> {
        results.iter().map(|r| r.name.clone()).collect()
    }

    const ALL: FilterOptions = FilterOptions {
        show_hidden: true,
        show_online: true,
    };

    #[test]
    fn test_empty_query_returns_everything_sorted() {
        let mut hidden = online("beta");
        hidden.hidden = true;
        let records = vec![online("delta"), local("Alpha"), hidden, local("alpha")];

        let results = filter(&records, "", ALL);
        assert_eq!(names(&results), vec!["Alpha", "alpha", "beta", "delta"]);

        let results = filter(&records, "   ", ALL);
        assert_eq!(results.len(), 4, "whitespace-only query is empty");
    }

    #[test]
    fn test_hidden_records_never_leak() {
        let mut hidden = local("SecretTool");
        hidden.hidden = true;
        let records = vec![hidden, local("OpenTool")];

        for query in ["", "tool", "secret", "Secret Tool", "x"] {
            for show_online in [true, false] {
                let options = FilterOptions {
                    show_hidden: false,
                    show_online,
                };
                let results = filter(&records, query, options);
                assert!(results.iter().all(|r| !r.hidden), "query {query:?}");
            }
        }
    }

    #[test]
    fn test_query_and_online_filter() {
        let records = vec![local("A"), online("B")];

        let results = filter(&records, "a", FilterOptions::default());
        assert_eq!(names(&results), vec!["A"]);

        let results = filter(
            &records,
            "",
            FilterOptions {
                show_hidden: false,
                show_online: false,
            },
        );
        assert_eq!(names(&results), vec!["A"]);
    }

    #[test]
    fn test_local_but_not_loadable_counts_as_local() {
        let mut broken = local("Broken");
        broken.installed = false;
        let records = vec![broken, online("Remote")];
        let options = FilterOptions {
            show_hidden: false,
            show_online: false,
        };
        assert_eq!(names(&filter(&records, "", options)), vec!["Broken"]);
    }

    #[test]
    fn test_single_word_matches_raw_name() {
        let records = vec![local("createPrefabFromSelection"), local("alignObjects")];

        assert_eq!(names(&filter(&records, "PREFAB", ALL)), vec!["createPrefabFromSelection"]);
        // The raw name has no spaces, so a joined word still matches.
        assert_eq!(names(&filter(&records, "prefabfrom", ALL)), vec!["createPrefabFromSelection"]);
    }

    #[test]
    fn test_multiple_words_and_over_nicified_name() {
        let records = vec![
            local("createPrefabFromSelection"),
            local("selectPrefabInstances"),
            local("alignObjects"),
        ];

        assert_eq!(
            names(&filter(&records, "prefab selection", ALL)),
            vec!["createPrefabFromSelection"]
        );
        assert_eq!(
            names(&filter(&records, "prefab select", ALL)),
            vec!["createPrefabFromSelection", "selectPrefabInstances"]
        );
        assert!(filter(&records, "prefab align", ALL).is_empty(), "words are ANDed");
    }

    #[test]
    fn test_accepts_registry_values() {
        let registry: Registry = [local("b"), local("a")]
            .into_iter()
            .map(|r| (r.name.clone(), r))
            .collect();
        assert_eq!(names(&filter(registry.values(), "", ALL)), vec!["a", "b"]);
    }
}
