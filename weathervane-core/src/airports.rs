//! In-memory filtering and sampling over the locally cached airport
//! dataset. Loading and persisting the dataset is the caller's concern;
//! nothing here performs I/O.

use rand::seq::index;

use crate::error::SelectionError;
use crate::model::AirportRecord;

/// Filter criteria; all fields optional, combined with AND. Each textual
/// criterion matches case-insensitively as a substring, so partial queries
/// like "new" match "Newark".
#[derive(Debug, Clone, Default)]
pub struct AirportQuery {
    pub code: Option<String>,
    pub name: Option<String>,
    pub state: Option<String>,
    pub municipality: Option<String>,
}

impl AirportQuery {
    pub fn is_empty(&self) -> bool {
        self.code.is_none()
            && self.name.is_none()
            && self.state.is_none()
            && self.municipality.is_none()
    }
}

/// Conjunctive filter over the dataset. An empty query returns the dataset
/// unchanged; filtering never mutates the `selected` flag.
pub fn filter(dataset: &[AirportRecord], query: &AirportQuery) -> Vec<AirportRecord> {
    dataset.iter().filter(|airport| matches(airport, query)).cloned().collect()
}

fn matches(airport: &AirportRecord, query: &AirportQuery) -> bool {
    criterion_matches(query.code.as_deref(), Some(&airport.code))
        && criterion_matches(query.name.as_deref(), Some(&airport.name))
        && criterion_matches(query.state.as_deref(), airport.region.as_deref())
        && criterion_matches(query.municipality.as_deref(), airport.municipality.as_deref())
}

/// An absent criterion always passes; a present criterion requires the
/// field to exist and contain it, ignoring case.
fn criterion_matches(criterion: Option<&str>, field: Option<&str>) -> bool {
    match criterion {
        None => true,
        Some(needle) => field
            .is_some_and(|haystack| haystack.to_lowercase().contains(&needle.to_lowercase())),
    }
}

/// Pick `n` distinct airports uniformly at random, without replacement.
pub fn sample(dataset: &[AirportRecord], n: usize) -> Result<Vec<AirportRecord>, SelectionError> {
    if n > dataset.len() {
        return Err(SelectionError::InsufficientData {
            requested: n,
            available: dataset.len(),
        });
    }

    let mut rng = rand::rng();
    let picked = index::sample(&mut rng, dataset.len(), n);
    Ok(picked.into_iter().map(|i| dataset[i].clone()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn airport(code: &str, name: &str, municipality: &str, region: &str) -> AirportRecord {
        AirportRecord {
            code: code.to_string(),
            name: name.to_string(),
            municipality: Some(municipality.to_string()),
            region: Some(region.to_string()),
            country: Some("US".to_string()),
            latitude: 0.0,
            longitude: 0.0,
            selected: false,
        }
    }

    fn dataset() -> Vec<AirportRecord> {
        vec![
            airport("KSAN", "San Diego International", "San Diego", "US-CA"),
            airport("KEWR", "Newark Liberty International", "Newark", "US-NJ"),
            airport("KBZN", "Bozeman Yellowstone International", "Bozeman", "US-MT"),
        ]
    }

    #[test]
    fn empty_query_is_identity() {
        let data = dataset();
        let filtered = filter(&data, &AirportQuery::default());
        assert_eq!(filtered, data);
    }

    #[test]
    fn criteria_are_conjunctive() {
        let data = dataset();
        let query = AirportQuery {
            state: Some("CA".to_string()),
            municipality: Some("San".to_string()),
            ..AirportQuery::default()
        };

        let filtered = filter(&data, &query);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].code, "KSAN");
    }

    #[test]
    fn substring_match_is_case_insensitive() {
        let data = dataset();
        let query = AirportQuery { name: Some("new".to_string()), ..AirportQuery::default() };

        let filtered = filter(&data, &query);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].code, "KEWR");
    }

    #[test]
    fn missing_field_fails_a_present_criterion() {
        let mut data = dataset();
        data[0].municipality = None;
        let query =
            AirportQuery { municipality: Some("San".to_string()), ..AirportQuery::default() };

        assert!(filter(&data, &query).is_empty());
    }

    #[test]
    fn filtering_preserves_selected_flags() {
        let mut data = dataset();
        data[1].selected = true;
        let query = AirportQuery { code: Some("k".to_string()), ..AirportQuery::default() };

        let filtered = filter(&data, &query);
        assert_eq!(filtered.len(), 3);
        assert!(filtered.iter().filter(|a| a.selected).count() == 1);
    }

    #[test]
    fn sampling_the_whole_dataset_returns_each_record_once() {
        let data = dataset();
        let mut sampled = sample(&data, data.len()).unwrap();
        sampled.sort_by(|a, b| a.code.cmp(&b.code));

        let mut expected = data.clone();
        expected.sort_by(|a, b| a.code.cmp(&b.code));
        assert_eq!(sampled, expected);
    }

    #[test]
    fn sampling_more_than_available_fails() {
        let data = dataset();
        let err = sample(&data, 5).unwrap_err();
        assert!(matches!(
            err,
            SelectionError::InsufficientData { requested: 5, available: 3 }
        ));
    }

    #[test]
    fn sample_has_no_duplicates() {
        let data = dataset();
        let sampled = sample(&data, 2).unwrap();
        assert_eq!(sampled.len(), 2);
        assert_ne!(sampled[0].code, sampled[1].code);
    }
}
